use std::io::{self, BufRead, IsTerminal, Write};

use savesync_core::storage::CloudStore;

use crate::cli::CloudCommands;
use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_cloud(context: &Context, command: CloudCommands) -> Result<(), CliError> {
    match command {
        CloudCommands::Delete { yes } => {
            if !yes && !confirm("Delete the cloud save? [y/N] ")? {
                println!("Cloud save kept.");
                return Ok(());
            }
            context.open_cloud()?.delete().await?;
            println!("Cloud save deleted.");
            Ok(())
        }
    }
}

fn confirm(question: &str) -> Result<bool, CliError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(CliError::InvalidArgument(
            "refusing to delete without a terminal; pass --yes".to_string(),
        ));
    }

    eprint!("{question}");
    io::stderr().flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
