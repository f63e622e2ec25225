use serde::{Deserialize, Serialize};

use crate::converter::{ConverterConfig, OutputFormat};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Values used when a conversion request leaves them out
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// CRF value, 0-51, lower is better quality
    #[serde(default = "default_quality")]
    pub quality: u8,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: default_quality(),
        }
    }
}

fn default_quality() -> u8 {
    23
}
