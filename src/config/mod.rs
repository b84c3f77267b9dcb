mod loader;
mod schema;

pub use loader::{load_config, validate_config};
pub use schema::*;

use anyhow::Result;
use std::path::{Path, PathBuf};

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        loader::load_config(path)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatrelay")
            .join("config.yaml")
    }
}
