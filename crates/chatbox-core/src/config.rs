use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::backend::{DEFAULT_ASK_URL, DEFAULT_STREAM_URL};
use crate::protocol::Protocol;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub protocol: Option<String>,
    pub ask_url: Option<String>,
    pub stream_url: Option<String>,
    pub log_level: Option<String>,
    /// Answer from this Pokédex file in-process instead of over HTTP
    pub pokedex: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            protocol: Some(Protocol::default().as_str().to_string()),
            ask_url: None,
            stream_url: None,
            log_level: None,
            pokedex: None,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_default_protocol(path: &Path, protocol: Protocol) -> Result<()> {
        let mut config = Self::load_from(path).unwrap_or_else(|_| Self::new());
        config.protocol = Some(protocol.as_str().to_string());
        config.save_to(path)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatbox").join("config.json"))
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub protocol: Option<String>,
    pub ask_url: Option<String>,
    pub stream_url: Option<String>,
    pub pokedex: Option<PathBuf>,
}

/// Effective backend settings after layering overrides over the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub protocol: Protocol,
    pub ask_url: String,
    pub stream_url: String,
    /// Set when replies come from a local Pokédex rather than the endpoints
    pub pokedex: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::default(),
            ask_url: DEFAULT_ASK_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            pokedex: None,
        }
    }
}

impl Settings {
    pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self> {
        let protocol = match overrides.protocol.as_ref().or(config.protocol.as_ref()) {
            Some(name) => Protocol::from_str(name)
                .ok_or_else(|| anyhow!("Unknown protocol '{}', expected 'json' or 'stream'", name))?,
            None => Protocol::default(),
        };

        let ask_url = overrides.ask_url.clone()
            .or_else(|| config.ask_url.clone())
            .unwrap_or_else(|| DEFAULT_ASK_URL.to_string());

        let stream_url = overrides.stream_url.clone()
            .or_else(|| config.stream_url.clone())
            .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());

        let pokedex = overrides.pokedex.clone().or_else(|| config.pokedex.clone());

        Ok(Self { protocol, ask_url, stream_url, pokedex })
    }
}
