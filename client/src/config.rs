use std::{fs::File, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "ws://localhost:8989/client";
pub const DEFAULT_RECONNECT: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 10;

/// Optional JSON config file; every field can also come from the command line.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: Option<String>,
    pub wallet: Option<String>,
    pub cores: Option<usize>,
    pub reconnect: Option<u32>,
    pub poll_interval: Option<u64>,
    #[serde(default)]
    pub pin_cores: bool,
}

pub fn load_config_file<P>(config_file: P) -> anyhow::Result<ClientConfig>
where
    P: AsRef<Path>, {
    let path = config_file.as_ref();
    let file = File::open(path).with_context(|| format!("{} config file not found", path.display()))?;
    let config = serde_json::from_reader(file)
        .with_context(|| format!("fail to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_parses() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"wallet": "abc", "cores": 2}"#).unwrap();
        assert_eq!(config.wallet.as_deref(), Some("abc"));
        assert_eq!(config.cores, Some(2));
        assert_eq!(config.url, None);
        assert!(!config.pin_cores);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config_file("/nonexistent/miner.json").is_err());
    }
}
