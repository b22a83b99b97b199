use anyhow::Result;
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Persisted defaults, overridden by environment variables and flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Report every newer version instead of only those with the same
    /// number of segments as the deployed tag.
    pub all: bool,
    /// Skip TLS certificate validation.
    pub insecure: bool,
    /// Seconds allowed for each HTTP request.
    pub timeout: u64,
    pub verbose: bool,
}

impl Config {
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("docker-newer-cli");
        path.push("config.json");
        Ok(path)
    }

    /// Applies flag and environment values found in `matches` on top of the
    /// file values.
    pub fn merge_matches(mut self, matches: &ArgMatches) -> Self {
        for (id, field) in [
            ("all", &mut self.all),
            ("insecure", &mut self.insecure),
            ("verbose", &mut self.verbose),
        ] {
            if let Some(value) = explicit_flag(matches, id) {
                *field = value;
            }
        }
        if let Some(timeout) = matches.get_one::<u64>("timeout") {
            self.timeout = *timeout;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            all: false,
            insecure: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            verbose: false,
        }
    }
}

/// The flag's value when it was given on the command line or through its
/// environment variable, `None` when clap only filled in the default.
fn explicit_flag(matches: &ArgMatches, id: &str) -> Option<bool> {
    match matches.value_source(id) {
        Some(clap::parser::ValueSource::DefaultValue) | None => None,
        Some(_) => Some(matches.get_flag(id)),
    }
}
