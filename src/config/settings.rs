//! Runtime settings shared by the client and the server

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::keystore::{KeyPaths, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use crate::error::{Result, TransferError};
use crate::transfer::FrameLimits;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_SAVE_DIR: &str = "received_files";

/// Everything a host needs to run a client or a server.
///
/// Loaded from an optional JSON file; unspecified fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Host the client connects to
    pub server_host: String,
    /// Interface the server binds
    pub bind_host: String,
    pub port: u16,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    /// Used when `start` is called without a save directory
    pub save_dir: PathBuf,
    /// Upper bound for reading one frame from a connected client
    pub connection_timeout_secs: u64,
    pub limits: FrameLimits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            private_key_path: PathBuf::from(PRIVATE_KEY_FILE),
            public_key_path: PathBuf::from(PUBLIC_KEY_FILE),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            connection_timeout_secs: 300,
            limits: FrameLimits::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(TransferError::InvalidConfig(format!(
                        "settings file {} does not exist",
                        path.display()
                    )));
                }
                let content = fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_host.trim().is_empty() {
            return Err(TransferError::InvalidConfig("server_host cannot be empty".into()));
        }
        if self.bind_host.trim().is_empty() {
            return Err(TransferError::InvalidConfig("bind_host cannot be empty".into()));
        }
        if self.connection_timeout_secs == 0 {
            return Err(TransferError::InvalidConfig(
                "connection_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` the client dials
    pub fn server_addr(&self) -> String {
        format_addr(&self.server_host, self.port)
    }

    /// `host:port` the server listens on
    pub fn bind_addr(&self) -> String {
        format_addr(&self.bind_host, self.port)
    }

    pub fn key_paths(&self) -> KeyPaths {
        KeyPaths::new(&self.private_key_path, &self.public_key_path)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

fn format_addr(host: &str, port: u16) -> String {
    // Bare IPv6 literals need brackets before the port
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.server_addr(), "127.0.0.1:9999");
        assert_eq!(settings.bind_addr(), "0.0.0.0:9999");
        assert_eq!(settings.save_dir, PathBuf::from("received_files"));
        assert_eq!(settings.key_paths().public_key, PathBuf::from("server_public.pem"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "port": 4000, "limits": { "max_payload_len": 1024 } }"#).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.port, 4000);
        assert_eq!(settings.limits.max_payload_len, 1024);
        assert_eq!(settings.limits.max_filename_len, 4096);
        assert_eq!(settings.server_host, "127.0.0.1");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(Some(&dir.path().join("absent.json")));

        assert!(matches!(result, Err(TransferError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = Settings {
            connection_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_ipv6_addr_bracketed() {
        assert_eq!(format_addr("::1", 9999), "[::1]:9999");
        assert_eq!(format_addr("[::1]", 9999), "[::1]:9999");
    }
}
