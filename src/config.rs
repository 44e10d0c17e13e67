//! Configuration file for the bridge
//!
//! TOML, loaded from `<config_dir>/bluefire/bluefire.toml` unless a path is
//! given. Every field has a default, so an empty or missing file is valid.
//! Addresses, modes and PSMs are written as strings (`"00:1A:7D:DA:71:13"`,
//! `"listen"`, `"0x0013"`); PSMs are also accepted as plain integers.
//!
//! ```toml
//! address = "54:4A:16:4D:AC:32"
//! mode = "connect"
//! idle_timeout = 300
//! profile = "fire-tv"
//!
//! [relay]
//! host = "192.168.1.20"
//!
//! [relay.keymap]
//! KEY_KPENTER = "select"
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bluefire_transport::{BdAddr, ConnectionMode, Psm};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::profile::{DeviceProfile, FireTvRemote, KeyMapping, KeyTable, ProfileError, ProfileRegistry};
use crate::relay;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("control_psm and interrupt_psm are both {0}")]
    SamePsm(Psm),
}

// ---------------------------------------------------------------------------
// Custom serde for transport types, written through Display / FromStr
// ---------------------------------------------------------------------------

mod display_fromstr {
    use super::*;

    pub fn serialize<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Deserialize a PSM from either `0x13` / `19` (integer) or `"0x0013"` (string)
fn deserialize_psm<'de, D: Deserializer<'de>>(d: D) -> Result<Psm, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PsmRepr {
        Number(u16),
        Text(String),
    }

    match PsmRepr::deserialize(d)? {
        PsmRepr::Number(n) => Ok(Psm(n)),
        PsmRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn serialize_psm<S: Serializer>(psm: &Psm, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(psm)
}

/// One key of a custom profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub name: String,
    pub mask: u32,
}

/// A profile defined in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub keys: Vec<KeyEntry>,
}

impl ProfileConfig {
    /// Validate and build the table
    pub fn build(&self) -> Result<KeyTable, ProfileError> {
        let keys = self
            .keys
            .iter()
            .map(|k| KeyMapping::new(k.name.clone(), k.mask))
            .collect();
        let display_name = self.display_name.as_deref().unwrap_or(&self.name);
        KeyTable::new(self.name.clone(), display_name, keys)
    }
}

/// Kodi relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host running Kodi; required by the `kodi` command unless given there
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_relay_port")]
    pub port: u16,
    /// Device name announced in the HELO packet
    #[serde(default = "default_relay_name")]
    pub name: String,
    /// Key name -> Kodi button name
    #[serde(default = "relay::default_keymap")]
    pub keymap: BTreeMap<String, String>,
}

fn default_relay_port() -> u16 {
    relay::DEFAULT_PORT
}

fn default_relay_name() -> String {
    "Fire TV Remote".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_relay_port(),
            name: default_relay_name(),
            keymap: relay::default_keymap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Remote address (CONNECT) or local adapter address (LISTEN)
    #[serde(default, with = "display_fromstr")]
    pub address: BdAddr,
    #[serde(default, with = "display_fromstr")]
    pub mode: ConnectionMode,
    #[serde(
        default = "default_control_psm",
        serialize_with = "serialize_psm",
        deserialize_with = "deserialize_psm"
    )]
    pub control_psm: Psm,
    #[serde(
        default = "default_interrupt_psm",
        serialize_with = "serialize_psm",
        deserialize_with = "deserialize_psm"
    )]
    pub interrupt_psm: Psm,
    /// Seconds without input before the session is dropped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
    /// Active profile name
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Additional table-defined profiles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_control_psm() -> Psm {
    Psm::CONTROL
}

fn default_interrupt_psm() -> Psm {
    Psm::INTERRUPT
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_profile() -> String {
    FireTvRemote::NAME.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: BdAddr::ANY,
            mode: ConnectionMode::default(),
            control_psm: default_control_psm(),
            interrupt_psm: default_interrupt_psm(),
            idle_timeout: default_idle_timeout(),
            profile: default_profile(),
            profiles: Vec::new(),
            relay: RelayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bluefire")
            .join("bluefire.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse fine on their own but clash with each other
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_psm == self.interrupt_psm {
            return Err(ConfigError::SamePsm(self.control_psm));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(io_err)?;
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// Builtin profiles plus the ones defined in this file
    pub fn registry(&self) -> Result<ProfileRegistry, ConfigError> {
        let mut registry = ProfileRegistry::with_builtins();
        for profile in &self.profiles {
            registry.register(Arc::new(profile.build()?));
        }
        Ok(registry)
    }

    /// Resolve the active profile
    pub fn active_profile(&self) -> Result<Arc<dyn DeviceProfile>, ConfigError> {
        Ok(self.registry()?.get(&self.profile)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.address, BdAddr::ANY);
        assert_eq!(config.mode, ConnectionMode::Listen);
        assert_eq!(config.control_psm, Psm(0x11));
        assert_eq!(config.interrupt_psm, Psm(0x13));
        assert_eq!(config.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.relay.port, 9777);
        assert_eq!(config.active_profile().unwrap().name(), "fire-tv");
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config.profile, "fire-tv");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.relay.keymap.len(), 12);
    }

    #[test]
    fn test_default_config_serializes() {
        let toml_str = BridgeConfig::default().to_toml().unwrap();
        assert!(toml_str.contains("address = \"00:00:00:00:00:00\""));
        assert!(toml_str.contains("mode = \"listen\""));
        assert!(toml_str.contains("control_psm = \"0x0011\""));
        assert!(toml_str.contains("interrupt_psm = \"0x0013\""));
    }

    #[test]
    fn test_roundtrip() {
        let mut config = BridgeConfig::default();
        config.address = "54:4A:16:4D:AC:32".parse().unwrap();
        config.mode = ConnectionMode::Connect;
        config.interrupt_psm = Psm(0x1001);
        config.relay.host = Some("kodi.local".into());

        let parsed = BridgeConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.address, config.address);
        assert_eq!(parsed.mode, ConnectionMode::Connect);
        assert_eq!(parsed.interrupt_psm, Psm(0x1001));
        assert_eq!(parsed.relay.host.as_deref(), Some("kodi.local"));
    }

    #[test]
    fn test_psm_as_integer() {
        let config = BridgeConfig::from_toml("control_psm = 0x11\ninterrupt_psm = 19").unwrap();
        assert_eq!(config.control_psm, Psm::CONTROL);
        assert_eq!(config.interrupt_psm, Psm::INTERRUPT);
    }

    #[test]
    fn test_invalid_values() {
        assert!(BridgeConfig::from_toml("address = \"not-an-address\"").is_err());
        assert!(BridgeConfig::from_toml("mode = \"sideways\"").is_err());
    }

    #[test]
    fn test_same_psm_rejected() {
        let err = BridgeConfig::from_toml("control_psm = 19\ninterrupt_psm = \"0x13\"")
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::SamePsm(psm) if psm == Psm::INTERRUPT));
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_custom_profile() {
        let toml_str = r#"
profile = "minimal"

[[profiles]]
name = "minimal"
keys = [
    { name = "KEY_OK", mask = 0x000001 },
    { name = "KEY_BACK", mask = 0x000002 },
]
"#;
        let config = BridgeConfig::from_toml(toml_str).unwrap();
        let profile = config.active_profile().unwrap();
        assert_eq!(profile.name(), "minimal");
        assert_eq!(profile.display_name(), "minimal");
        assert_eq!(profile.held(0x03), vec![0, 1]);
        assert_eq!(profile.keys()[1].name, "KEY_BACK");
    }

    #[test]
    fn test_custom_profile_validation() {
        let toml_str = r#"
[[profiles]]
name = "broken"
keys = [{ name = "KEY_OK", mask = 0 }]
"#;
        let config = BridgeConfig::from_toml(toml_str).unwrap();
        assert!(matches!(
            config.active_profile(),
            Err(ConfigError::Profile(ProfileError::ZeroMask(_)))
        ));
    }

    #[test]
    fn test_unknown_profile() {
        let config = BridgeConfig::from_toml("profile = \"nope\"").unwrap();
        assert!(matches!(
            config.active_profile(),
            Err(ConfigError::Profile(ProfileError::UnknownProfile(_)))
        ));
    }

    #[test]
    fn test_load_missing_and_save() {
        let dir = std::env::temp_dir().join(format!("bluefire-config-{}", std::process::id()));
        let path = dir.join("nested").join("bluefire.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.idle_timeout, 300);

        let mut config = config;
        config.idle_timeout = 60;
        config.save(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap().idle_timeout, 60);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_default_path() {
        assert!(BridgeConfig::default_path().ends_with("bluefire/bluefire.toml"));
    }
}
