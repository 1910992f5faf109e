use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use typed_builder::TypedBuilder;

use crate::error::{SignalError, SignalResult};

/// Per-signal settings. Build in code or load from TOML.
///
/// ```toml
/// name = "post_save"
/// capture_panics = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, TypedBuilder)]
#[serde(default, deny_unknown_fields)]
pub struct SignalConfig {
    /// Name attached to every log line the signal emits.
    #[builder(default = String::from("signal"), setter(into))]
    pub name: String,

    /// Whether `send_robust` records receiver panics as failures instead of
    /// letting them unwind. `send` never catches panics.
    #[builder(default = true)]
    pub capture_panics: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SignalConfig {
    pub fn from_toml_str(content: &str) -> SignalResult<Self> {
        toml::from_str(content).map_err(|e| SignalError::Config(e.to_string()))
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<SignalConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = SignalConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
