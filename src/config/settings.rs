use crate::error::{BlockchainError, Result};
use log::warn;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

/// Environment variable naming an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "FLOODCHAIN_CONFIG";

pub const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
pub const BOOTSTRAP_ADDRESS_KEY: &str = "BOOTSTRAP_ADDRESS";
pub const HOP_LIMIT_KEY: &str = "HOP_LIMIT";
pub const MINING_DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";
pub const CONNECT_TIMEOUT_MS_KEY: &str = "CONNECT_TIMEOUT_MS";
pub const CPU_POWER_KEY: &str = "CPU_POWER";
pub const NET_POWER_KEY: &str = "NET_POWER";

const KNOWN_KEYS: [&str; 7] = [
    NODE_ADDRESS_KEY,
    BOOTSTRAP_ADDRESS_KEY,
    HOP_LIMIT_KEY,
    MINING_DIFFICULTY_KEY,
    CONNECT_TIMEOUT_MS_KEY,
    CPU_POWER_KEY,
    NET_POWER_KEY,
];

static DEFAULTS: [(&str, &str); 6] = [
    (NODE_ADDRESS_KEY, "127.0.0.1:8080"),
    (HOP_LIMIT_KEY, "128"),
    (MINING_DIFFICULTY_KEY, "1"),
    (CONNECT_TIMEOUT_MS_KEY, "5000"),
    (CPU_POWER_KEY, "0"),
    (NET_POWER_KEY, "0"),
];

/// Node settings as strings, parsed on read.
///
/// Later sources win: built-in defaults, then the file named by
/// `FLOODCHAIN_CONFIG`, then environment variables.
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let config = Config::with_defaults();
        if let Ok(path) = env::var(CONFIG_FILE_ENV) {
            if let Err(e) = config.load_file(Path::new(&path)) {
                warn!("Ignoring config file {path}: {e}");
            }
        }
        if let Err(e) = config.apply_env() {
            warn!("Ignoring environment overrides: {e}");
        }
        config
    }

    /// Built-in defaults only, no file or environment.
    pub fn with_defaults() -> Config {
        let map = DEFAULTS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config {
            inner: RwLock::new(map),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.inner
            .read()
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire config lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.inner
            .write()
            .map_err(|e| BlockchainError::Lock(format!("Failed to acquire config lock: {e}")))
    }

    /// Merges a flat TOML table. Non-string values are kept in their TOML
    /// rendering, so `HOP_LIMIT = 16` and `HOP_LIMIT = "16"` are the same.
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        self.load_toml(&contents)
    }

    pub fn load_toml(&self, contents: &str) -> Result<()> {
        let table: toml::Table = contents.parse()?;
        let mut values = Vec::with_capacity(table.len());
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Table(_) | toml::Value::Array(_) => {
                    return Err(BlockchainError::Config(format!(
                        "{key} must be a plain value"
                    )))
                }
                other => other.to_string(),
            };
            values.push((key, value));
        }
        self.apply_overrides(values)
    }

    pub fn apply_env(&self) -> Result<()> {
        self.apply_overrides(
            env::vars().filter(|(key, _)| KNOWN_KEYS.contains(&key.as_str())),
        )
    }

    pub fn apply_overrides<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut inner = self.write()?;
        for (key, value) in values {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("Unknown config key {key}");
            }
            inner.insert(key, value);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: String) -> Result<()> {
        self.write()?.insert(key.to_string(), value);
        Ok(())
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let raw = self
            .get(key)?
            .ok_or_else(|| BlockchainError::Config(format!("{key} is not set")))?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| BlockchainError::Config(format!("Invalid {key} {raw:?}: {e}")))
    }

    pub fn get_node_addr(&self) -> Result<String> {
        self.get(NODE_ADDRESS_KEY)?
            .ok_or_else(|| BlockchainError::Config(format!("{NODE_ADDRESS_KEY} is not set")))
    }

    pub fn set_node_addr(&self, addr: String) -> Result<()> {
        self.set(NODE_ADDRESS_KEY, addr)
    }

    /// `None` when this node is the bootstrap node.
    pub fn get_bootstrap_addr(&self) -> Result<Option<String>> {
        Ok(self
            .get(BOOTSTRAP_ADDRESS_KEY)?
            .filter(|addr| !addr.trim().is_empty()))
    }

    pub fn get_hop_limit(&self) -> Result<u32> {
        self.parsed(HOP_LIMIT_KEY)
    }

    pub fn get_mining_difficulty(&self) -> Result<u32> {
        self.parsed(MINING_DIFFICULTY_KEY)
    }

    pub fn get_connect_timeout(&self) -> Result<Duration> {
        self.parsed(CONNECT_TIMEOUT_MS_KEY).map(Duration::from_millis)
    }

    pub fn get_cpu_power(&self) -> Result<i64> {
        self.parsed(CPU_POWER_KEY)
    }

    pub fn get_net_power(&self) -> Result<i64> {
        self.parsed(NET_POWER_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::with_defaults();
        assert_eq!(config.get_node_addr().unwrap(), "127.0.0.1:8080");
        assert_eq!(config.get_hop_limit().unwrap(), 128);
        assert_eq!(config.get_mining_difficulty().unwrap(), 1);
        assert_eq!(
            config.get_connect_timeout().unwrap(),
            Duration::from_millis(5000)
        );
        assert_eq!(config.get_cpu_power().unwrap(), 0);
        assert_eq!(config.get_bootstrap_addr().unwrap(), None);
    }

    #[test]
    fn test_toml_values_of_any_scalar_type() {
        let config = Config::with_defaults();
        config
            .load_toml("HOP_LIMIT = 16\nBOOTSTRAP_ADDRESS = \"10.0.0.1:8080\"\nNET_POWER = \"7\"")
            .unwrap();
        assert_eq!(config.get_hop_limit().unwrap(), 16);
        assert_eq!(config.get_net_power().unwrap(), 7);
        assert_eq!(
            config.get_bootstrap_addr().unwrap().as_deref(),
            Some("10.0.0.1:8080")
        );
    }

    #[test]
    fn test_nested_toml_is_rejected() {
        let config = Config::with_defaults();
        let err = config.load_toml("[network]\nHOP_LIMIT = 3").unwrap_err();
        assert!(matches!(err, BlockchainError::Config(_)));
        assert_eq!(config.get_hop_limit().unwrap(), 128);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = Config::with_defaults();
        config.load_toml("MINING_DIFFICULTY = 2").unwrap();
        config
            .apply_overrides(vec![(MINING_DIFFICULTY_KEY.to_string(), "3".to_string())])
            .unwrap();
        assert_eq!(config.get_mining_difficulty().unwrap(), 3);
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let config = Config::with_defaults();
        config.set(HOP_LIMIT_KEY, "lots".to_string()).unwrap();
        assert!(matches!(
            config.get_hop_limit(),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "NODE_ADDRESS = \"0.0.0.0:9000\"\nCPU_POWER = 4\n").unwrap();

        let config = Config::with_defaults();
        config.load_file(&path).unwrap();
        assert_eq!(config.get_node_addr().unwrap(), "0.0.0.0:9000");
        assert_eq!(config.get_cpu_power().unwrap(), 4);
    }
}
