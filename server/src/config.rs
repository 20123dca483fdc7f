//! Server configuration, read from the environment at startup.

use std::path::PathBuf;

use anyhow::{Context, Result};

use chorus_protocol::DEFAULT_ADDR;

pub const ENV_ADDR: &str = "CHORUS_ADDR";
pub const ENV_ENGINE: &str = "CHORUS_ENGINE";
pub const ENV_ENGINE_LOG: &str = "CHORUS_ENGINE_LOG";
pub const ENV_ENGINE_LOG_LEVEL: &str = "CHORUS_ENGINE_LOG_LEVEL";
pub const ENV_ENABLE_ON_START: &str = "CHORUS_ENABLE_ON_START";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub addr: String,
    /// Native engine library. `None` runs the simulated engine.
    pub engine_path: Option<PathBuf>,
    /// Log file handed to the engine on setup
    pub engine_log: Option<PathBuf>,
    pub engine_log_level: i32,
    /// Enable the engine before accepting requests
    pub enable_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            engine_path: None,
            engine_log: None,
            engine_log_level: 0,
            enable_on_start: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset or empty keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get(ENV_ADDR) {
            config.addr = addr;
        }
        config.engine_path = get(ENV_ENGINE).map(PathBuf::from);
        config.engine_log = get(ENV_ENGINE_LOG).map(PathBuf::from);

        if let Some(level) = get(ENV_ENGINE_LOG_LEVEL) {
            config.engine_log_level = level
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer, got {:?}", ENV_ENGINE_LOG_LEVEL, level))?;
        }
        if let Some(flag) = get(ENV_ENABLE_ON_START) {
            config.enable_on_start = parse_flag(&flag)
                .with_context(|| format!("{} must be true or false, got {:?}", ENV_ENABLE_ON_START, flag))?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
