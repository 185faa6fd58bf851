//! `bulkdl config` – print where the config lives and what it contains.

use anyhow::Result;
use bulkdl_core::config::{self, BulkConfig};

pub fn show_config(cfg: &BulkConfig) -> Result<()> {
    let path = config::config_path()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
