//! CLI command handlers, one per file.

mod config;
mod run;

pub use config::show_config;
pub use run::run_download;
