pub mod backups;
pub mod cloud;
pub mod common;
pub mod completions;
pub mod config;
pub mod preference;
pub mod save;
pub mod status;
pub mod sync;
