use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional site defaults, loaded from `~/.config/nodeseed/config.toml`.
/// Every field is overridable on the command line; a missing file means
/// built-in defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub image: Option<String>,
    pub image_dir: Option<String>,
    pub nameservers: Option<String>,
    pub interface: Option<String>,
    pub os_variant: Option<String>,
    pub bridge: Option<String>,
    pub vm_image_root: Option<String>,
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("nodeseed").join("config.toml"))
    }
}

pub fn load() -> Result<Config> {
    load_from(&Config::path()?)
}

pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
