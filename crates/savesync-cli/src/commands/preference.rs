use savesync_core::storage::PreferenceStore;

use crate::cli::PreferenceCommands;
use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_preference(context: &Context, command: PreferenceCommands) -> Result<(), CliError> {
    let store = context.open_preferences();
    match command {
        PreferenceCommands::Show => match store.load()? {
            Some(preference) => println!("{preference}"),
            None => println!("No remembered strategy; conflicts are prompted."),
        },
        PreferenceCommands::Set { strategy } => {
            let preference = strategy.into();
            store.remember(preference)?;
            println!("Conflicts will be resolved with {preference}.");
        }
        PreferenceCommands::Clear => {
            store.forget()?;
            println!("Remembered strategy cleared.");
        }
    }
    Ok(())
}
