//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `rentbridge.toml` in the working directory, or the file named by
//! `RENTBRIDGE_CONFIG`. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use rentbridge_adapter_smartrent::SmartRentConfig;
use rentbridge_app::{LogLevel, Preferences};
use rentbridge_domain::id::RemoteDeviceId;
use rentbridge_domain::local::{LocalDevice, LocalDeviceKind};
use serde::Deserialize;

const DEFAULT_PATH: &str = "rentbridge.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account credentials.
    pub credentials: CredentialsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Which remote API to talk to.
    pub remote: RemoteConfig,
    /// SmartRent endpoints and timings.
    pub smartrent: SmartRentConfig,
    /// Local devices to mirror.
    pub devices: Vec<DeviceConfig>,
}

/// Account email, password and second-factor secret.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub email: String,
    pub password: String,
    /// Base32 shared secret of the authenticator app enrollment.
    pub tfa_secret: String,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("email", &self.email)
            .field("password", &"..")
            .field("tfa_secret", &"..")
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Verbosity of the bridge's own logs.
    pub level: LogLevel,
    /// Full filter directive (`RUST_LOG` syntax); overrides `level`.
    pub filter: Option<String>,
}

/// Remote API selection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// The SmartRent cloud API.
    #[default]
    SmartRent,
    /// The simulated demo account.
    Virtual,
}

/// One local device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: u64,
    pub name: String,
    pub kind: LocalDeviceKind,
    /// Remote device identifier to mirror.
    #[serde(default)]
    pub binding: Option<u64>,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or malformed,
    /// or if the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("RENTBRIDGE_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("RENTBRIDGE_EMAIL") {
            self.credentials.email = val;
        }
        if let Some(val) = var("RENTBRIDGE_PASSWORD") {
            self.credentials.password = val;
        }
        if let Some(val) = var("RENTBRIDGE_TFA_SECRET") {
            self.credentials.tfa_secret = val;
        }
        if let Some(val) = var("RENTBRIDGE_LOG") {
            self.logging.filter = Some(val);
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = Some(val);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for device in &self.devices {
            if !seen.insert(device.id) {
                return Err(ConfigError::Validation(format!(
                    "device id {} is used more than once",
                    device.id
                )));
            }
            if device.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "device {} has no name",
                    device.id
                )));
            }
        }
        Ok(())
    }

    /// The preferences the bridge starts with.
    #[must_use]
    pub fn preferences(&self) -> Preferences {
        Preferences {
            email: self.credentials.email.clone(),
            password: self.credentials.password.clone(),
            tfa_secret: self.credentials.tfa_secret.clone(),
            log_level: self.logging.level,
        }
    }

    /// The `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> String {
        self.logging
            .filter
            .clone()
            .unwrap_or_else(|| format!("rentbridge={}", self.logging.level.as_directive()))
    }

    /// The configured local devices.
    #[must_use]
    pub fn local_devices(&self) -> Vec<Arc<LocalDevice>> {
        self.devices.iter().map(DeviceConfig::build).collect()
    }
}

impl DeviceConfig {
    fn build(&self) -> Arc<LocalDevice> {
        let builder = LocalDevice::builder()
            .id(self.id)
            .name(self.name.clone())
            .kind(self.kind);
        let builder = match self.binding {
            Some(remote) => builder.binding(RemoteDeviceId::new(remote)),
            None => builder,
        };
        Arc::new(builder.build())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
