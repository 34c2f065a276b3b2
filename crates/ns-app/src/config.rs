//! Application configuration file

use std::path::Path;

use anyhow::{Context, Result};
use ns_core::ExplorerConfig;
use ns_data::MemoryBackendConfig;
use ns_views::ViewportConfig;
use serde::{Deserialize, Serialize};

/// Everything `namesampo.toml` can set. Missing sections use their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub explorer: ExplorerConfig,
    pub backend: MemoryBackendConfig,
    pub views: ViewportConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.explorer.validate()?;
        Ok(config)
    }
}
