use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::{
    batch::DEFAULT_BATCH_SIZE,
    codec::{marker::DEFAULT_SHORTCODES, policy::BailoutPolicy, DomCompiler, MarkerCodec},
    error::PressNativeError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressNativeConfig {
    /// Items per batch-recompiler step.
    pub batch_size: usize,
    /// SQLite cache location; the CLI falls back to `pressnative_cache.db` in the working
    /// directory.
    pub database: Option<PathBuf>,
    pub compiler: CompilerConfig,
    pub markers: MarkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub bailout_class_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub shortcodes: Vec<String>,
}

impl Default for PressNativeConfig {
    fn default() -> Self {
        PressNativeConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            database: None,
            compiler: CompilerConfig::default(),
            markers: MarkerConfig::default(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            bailout_class_patterns: BailoutPolicy::default().class_patterns,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            shortcodes: DEFAULT_SHORTCODES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PressNativeConfig {
    pub fn compiler(&self) -> DomCompiler {
        DomCompiler::new(BailoutPolicy::new(
            self.compiler.bailout_class_patterns.iter().cloned(),
        ))
    }

    pub fn marker_codec(&self) -> Result<MarkerCodec, PressNativeError> {
        MarkerCodec::new(self.markers.shortcodes.iter())
    }

    pub fn validate(&self) -> Result<(), PressNativeError> {
        if self.batch_size == 0 {
            return Err(PressNativeError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        self.marker_codec()?;
        Ok(())
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<PressNativeConfig, PressNativeError>;
    fn set_config(&self, config: &PressNativeConfig) -> Result<(), PressNativeError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<PressNativeConfig, PressNativeError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(PressNativeConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let config: PressNativeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn set_config(&self, config: &PressNativeConfig) -> Result<(), PressNativeError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        config.validate()?;
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
