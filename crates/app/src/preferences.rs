//! Plugin preferences — account credentials and log verbosity.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rentbridge_domain::credential::{CodeGenerator, OneTimeCode};
use rentbridge_domain::error::ConfigurationError;
use serde::{Deserialize, Serialize};

use crate::ports::Credentials;

/// Message shown next to an empty required field.
pub const REQUIRED_MESSAGE: &str = "A value is required!";

/// Log verbosity offered by the configuration surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
}

impl LogLevel {
    /// The matching `tracing` filter directive.
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("debug"),
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// Error parsing a [`LogLevel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unhandled log level: {0}")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            other => Err(UnknownLogLevel(other.to_string())),
        }
    }
}

/// Per-field validation messages, keyed by preference name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, *message))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().copied().collect();
        write!(f, "invalid preferences: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

/// Values of the preferences form.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub email: String,
    pub password: String,
    pub tfa_secret: String,
    pub log_level: LogLevel,
}

impl Preferences {
    /// Check that every required field is filled in.
    ///
    /// # Errors
    ///
    /// Returns one message per empty field.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        for (field, value) in [
            ("email", &self.email),
            ("password", &self.password),
            ("tfa_secret", &self.tfa_secret),
        ] {
            if value.trim().is_empty() {
                errors.0.insert(field, REQUIRED_MESSAGE);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Email and password, if both are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingField`] for the first empty one.
    pub fn credentials(&self) -> Result<Credentials, ConfigurationError> {
        if self.email.trim().is_empty() {
            return Err(ConfigurationError::MissingField { field: "email" });
        }
        if self.password.trim().is_empty() {
            return Err(ConfigurationError::MissingField { field: "password" });
        }
        Ok(Credentials::new(self.email.trim(), self.password.clone()))
    }

    /// A one-time code placeholder backed by the configured secret.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the secret is empty or not base32.
    pub fn one_time_code(&self) -> Result<OneTimeCode, ConfigurationError> {
        let generator = CodeGenerator::from_base32(&self.tfa_secret)?;
        Ok(OneTimeCode::new(Arc::new(generator)))
    }

    /// The code the configured secret produces right now, for display only.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the secret is empty or not base32.
    pub fn preview_code(&self) -> Result<String, ConfigurationError> {
        Ok(CodeGenerator::from_base32(&self.tfa_secret)?.current_code())
    }
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("email", &self.email)
            .field("password", &"..")
            .field("tfa_secret", &"..")
            .field("log_level", &self.log_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> Preferences {
        Preferences {
            email: "me@example.com".to_string(),
            password: "hunter2".to_string(),
            tfa_secret: "JBSWY3DPEHPK3PXP".to_string(),
            log_level: LogLevel::Info,
        }
    }

    #[test]
    fn should_accept_filled_preferences() {
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn should_report_every_empty_field() {
        let errors = Preferences::default().validate().unwrap_err();
        assert_eq!(errors.get("email"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.get("password"), Some(REQUIRED_MESSAGE));
        assert_eq!(errors.get("tfa_secret"), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn should_report_only_the_empty_field() {
        let prefs = Preferences {
            password: String::new(),
            ..filled()
        };
        let errors = prefs.validate().unwrap_err();
        assert_eq!(errors.iter().collect::<Vec<_>>(), vec![("password", REQUIRED_MESSAGE)]);
    }

    #[test]
    fn should_preview_six_digit_code() {
        let code = filled().preview_code().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn should_reject_preview_for_malformed_secret() {
        let prefs = Preferences {
            tfa_secret: "not base32!".to_string(),
            ..filled()
        };
        assert_eq!(prefs.preview_code(), Err(ConfigurationError::MalformedSecret));
    }

    #[test]
    fn should_require_email_for_credentials() {
        let prefs = Preferences {
            email: "  ".to_string(),
            ..filled()
        };
        assert_eq!(
            prefs.credentials(),
            Err(ConfigurationError::MissingField { field: "email" })
        );
    }

    #[test]
    fn should_treat_blank_password_as_missing_in_both_checks() {
        let prefs = Preferences {
            password: " \t".to_string(),
            ..filled()
        };
        assert_eq!(
            prefs.credentials(),
            Err(ConfigurationError::MissingField { field: "password" })
        );
        assert_eq!(prefs.validate().unwrap_err().get("password"), Some(REQUIRED_MESSAGE));
    }

    #[test]
    fn should_keep_password_untrimmed_in_credentials() {
        let prefs = Preferences {
            password: " pass phrase ".to_string(),
            ..filled()
        };
        assert_eq!(
            prefs.credentials(),
            Ok(Credentials::new("me@example.com", " pass phrase "))
        );
    }

    #[test]
    fn should_parse_log_levels() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("trace".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warning.as_directive(), "warn");
    }

    #[test]
    fn should_deserialize_with_defaults() {
        let prefs: Preferences = toml::from_str(r#"email = "me@example.com""#).unwrap();
        assert_eq!(prefs.email, "me@example.com");
        assert_eq!(prefs.log_level, LogLevel::Info);
        assert!(prefs.password.is_empty());
    }

    #[test]
    fn should_not_leak_secrets_in_debug_output() {
        let debug = format!("{:?}", filled());
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("JBSWY3DPEHPK3PXP"));
    }
}
