use crate::error::{MartrelloError, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Runtime settings for the board engine and its backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Upper bound on every persistence call made by the controller
    pub confirmation_timeout_ms: u64,
    /// Base URL of the board API used by the HTTP backend
    pub api_base_url: String,
    /// Root directory of the file backend
    pub data_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: 10_000,
            api_base_url: "http://localhost:3001".to_string(),
            data_dir: PathBuf::from(".martrello"),
        }
    }
}

impl CoreConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.confirmation_timeout_ms == 0 {
            return Err(MartrelloError::Validation(
                "confirmation_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(MartrelloError::Validation(
                "api_base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
