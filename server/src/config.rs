use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub addr: String,
    pub static_dir: PathBuf,
    pub data_dir: PathBuf,
    pub grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            static_dir: PathBuf::from("web/dist"),
            data_dir: PathBuf::from("data"),
            grace: cube4::worker::DEFAULT_GRACE,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("CUBE4_ADDR") {
            config.addr = addr;
        }
        if let Some(dir) = lookup("CUBE4_STATIC_DIR") {
            config.static_dir = dir.into();
        }
        if let Some(dir) = lookup("CUBE4_DATA_DIR") {
            config.data_dir = dir.into();
        }
        if let Some(ms) = lookup("CUBE4_GRACE_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .with_context(|| format!("CUBE4_GRACE_MS must be milliseconds, got {ms:?}"))?;
            config.grace = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
