//! Configuration loading: an optional YAML file provides defaults,
//! environment variables override it, and CLI flags (applied by the
//! composition root in `app`) take final priority.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const ENV_ROOT_KEY_HEX: &str = "KMS_ROOT_KEY_HEX";
pub const ENV_ROOT_KEY_FILE: &str = "KMS_ROOT_KEY_FILE";
pub const ENV_DATA_DIR: &str = "KMS_DATA_DIR";
pub const ENV_ADDR: &str = "KMS_ADDR";

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const APP_DIR: &str = "kmsd";

#[derive(Debug)]
pub enum ConfigError {
    DataDirUnavailable,
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    MissingRootKey,
    InvalidRootKeyHex,
    InvalidAddr(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DataDirUnavailable => {
                write!(f, "unable to determine a data directory")
            }
            ConfigError::Io(err) => write!(f, "filesystem error: {err}"),
            ConfigError::Parse(err) => write!(f, "failed to parse config file: {err}"),
            ConfigError::MissingRootKey => write!(
                f,
                "no root key configured (set {ENV_ROOT_KEY_HEX}, {ENV_ROOT_KEY_FILE}, or root_key_hex/root_key_file in the config file)"
            ),
            ConfigError::InvalidRootKeyHex => write!(f, "root key is not valid hex"),
            ConfigError::InvalidAddr(addr) => write!(f, "invalid bind address: {addr}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Shape of the optional YAML config file. Every field is optional so a
/// minimal or absent file is valid; environment variables fill the rest.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    addr: Option<String>,
    #[serde(default)]
    data_dir: Option<PathBuf>,
    #[serde(default)]
    root_key_hex: Option<String>,
    #[serde(default)]
    root_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: String,
    pub data_dir: PathBuf,
    root_key_hex: Option<String>,
    root_key_file: Option<PathBuf>,
}

impl Settings {
    /// Loads `config_path` (if given) as YAML, then applies environment
    /// variable overrides. CLI-flag overrides are applied afterwards by
    /// the caller via [`Settings::with_addr_override`] and
    /// [`Settings::with_data_dir_override`].
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };

        let addr = std::env::var(ENV_ADDR)
            .ok()
            .or(file.addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let data_dir = std::env::var(ENV_DATA_DIR)
            .ok()
            .map(PathBuf::from)
            .or(file.data_dir)
            .map(Ok)
            .unwrap_or_else(default_data_dir)?;

        let root_key_hex = std::env::var(ENV_ROOT_KEY_HEX).ok().or(file.root_key_hex);
        let root_key_file = std::env::var(ENV_ROOT_KEY_FILE)
            .ok()
            .map(PathBuf::from)
            .or(file.root_key_file);

        Ok(Self {
            addr,
            data_dir,
            root_key_hex,
            root_key_file,
        })
    }

    pub fn with_addr_override(mut self, addr: Option<String>) -> Self {
        if let Some(addr) = addr {
            self.addr = addr;
        }
        self
    }

    pub fn with_data_dir_override(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(data_dir) = data_dir {
            self.data_dir = data_dir;
        }
        self
    }

    /// Resolves the configured root key to raw bytes, reading the key
    /// file if `root_key_file` was given in preference to
    /// `root_key_hex`. Does not validate strength; callers must still run
    /// [`crate::entropy::validate_root_key`]. The returned bytes zero
    /// themselves on drop so no plaintext root key copy outlives its use.
    pub fn resolve_root_key(&self) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        let mut hex = if let Some(path) = &self.root_key_file {
            fs::read_to_string(path)
                .map_err(ConfigError::Io)?
                .trim()
                .to_string()
        } else if let Some(hex) = &self.root_key_hex {
            hex.trim().to_string()
        } else {
            return Err(ConfigError::MissingRootKey);
        };

        let key = decode_hex(&hex).ok_or(ConfigError::InvalidRootKeyHex)?;
        zeroize::Zeroize::zeroize(&mut hex);
        Ok(Zeroizing::new(key))
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir).map_err(ConfigError::Io)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str(&contents).map_err(ConfigError::Parse),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(err) => Err(ConfigError::Io(err)),
    }
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let mut dir = dirs::data_dir().ok_or(ConfigError::DataDirUnavailable)?;
    dir.push(APP_DIR);
    Ok(dir)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_defaults_when_file_absent() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.yaml");
        let settings = Settings::load(Some(&missing)).unwrap();
        assert_eq!(settings.addr, DEFAULT_ADDR);
    }

    #[test]
    fn parses_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "addr: 0.0.0.0:9000\nroot_key_hex: \"00\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.addr, "0.0.0.0:9000");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "addr: 0.0.0.0:9000\n").unwrap();

        unsafe {
            std::env::set_var(ENV_ADDR, "127.0.0.1:1111");
        }
        let settings = Settings::load(Some(&path)).unwrap();
        unsafe {
            std::env::remove_var(ENV_ADDR);
        }
        assert_eq!(settings.addr, "127.0.0.1:1111");
    }

    #[test]
    fn cli_override_wins_over_everything() {
        let settings = Settings::load(None)
            .unwrap()
            .with_addr_override(Some("1.2.3.4:5".to_string()));
        assert_eq!(settings.addr, "1.2.3.4:5");
    }

    #[test]
    fn resolve_root_key_decodes_hex() {
        let mut settings = Settings::load(None).unwrap();
        settings.root_key_hex = Some("00112233".to_string());
        let key = settings.resolve_root_key().unwrap();
        assert_eq!(key.as_slice(), &[0x00, 0x11, 0x22, 0x33]);
    }

    #[test]
    fn resolve_root_key_missing_errors() {
        let settings = Settings::load(None).unwrap();
        let err = settings.resolve_root_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRootKey));
    }
}
