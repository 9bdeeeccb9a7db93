//! Error types shared across the workspace.
//!
//! Each failure class of the bridge gets its own typed error; the umbrella
//! [`RentBridgeError`] converts from all of them via `#[from]` so callers can
//! propagate with `?` and still match on the precise cause.

use crate::device::DeviceCategory;
use crate::id::{LocalDeviceId, RemoteDeviceId};
use crate::local::LocalDeviceKind;

/// Top-level error for bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum RentBridgeError {
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    #[error("authentication failed")]
    Authentication(#[from] AuthenticationError),

    #[error("device is not bound")]
    UnboundDevice(#[from] UnboundDeviceError),

    #[error("device category mismatch")]
    CategoryMismatch(#[from] CategoryMismatchError),

    #[error("unsupported mode")]
    UnsupportedMode(#[from] UnsupportedModeError),

    #[error("transport error")]
    Transport(#[from] TransportError),

    /// A relative command needs a current value that is not known yet.
    #[error("device {local} has no current {key}")]
    MissingState {
        /// The local device.
        local: LocalDeviceId,
        /// State key that was looked up.
        key: &'static str,
    },

    /// A setpoint that is NaN or infinite.
    #[error("setpoint {value} is not a finite number")]
    InvalidSetpoint {
        /// The rejected value, after any relative adjustment.
        value: f64,
    },
}

/// Missing or malformed credential settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A required preference is empty.
    #[error("{field} is required")]
    MissingField {
        /// Preference key (e.g. `"email"`).
        field: &'static str,
    },

    /// The shared secret is not valid base32.
    #[error("shared secret is not valid base32")]
    MalformedSecret,
}

/// Login failed: bad credentials, bad one-time code, or unreachable API.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    /// The API rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The API rejected the one-time code (wrong secret or clock skew).
    #[error("invalid one-time code")]
    InvalidCode,

    /// The credential settings themselves are unusable.
    #[error("invalid configuration")]
    Configuration(#[from] ConfigurationError),

    /// The login request could not be completed.
    #[error("login request failed")]
    Transport(#[from] TransportError),
}

/// A local device whose binding does not resolve to a remote device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnboundDeviceError {
    /// No binding property is set, or it is not a valid identifier.
    #[error("device {local} has no valid binding")]
    Missing {
        /// The local device.
        local: LocalDeviceId,
    },

    /// The bound identifier is not in the remote device directory.
    #[error("device {local} is bound to unknown remote device {remote}")]
    NotFound {
        /// The local device.
        local: LocalDeviceId,
        /// The configured remote identifier.
        remote: RemoteDeviceId,
    },
}

/// The bound remote device is the wrong category for the requested use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} device cannot be driven by a remote {category}")]
pub struct CategoryMismatchError {
    /// Declared kind of the local device.
    pub kind: LocalDeviceKind,
    /// Category of the resolved remote device.
    pub category: DeviceCategory,
}

/// A host mode that has no remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported {what}: {value}")]
pub struct UnsupportedModeError {
    /// `"hvac mode"` or `"fan mode"`.
    pub what: &'static str,
    /// The offending value, as displayed.
    pub value: String,
}

/// A remote call failed after the session was established.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("connection failed")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The API answered with an unexpected status.
    #[error("unexpected response status {status}")]
    Status {
        /// HTTP-like status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("malformed response")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The remote side does not know the device.
    #[error("remote device {0} not found")]
    DeviceNotFound(RemoteDeviceId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_missing_field() {
        let err = ConfigurationError::MissingField { field: "email" };
        assert_eq!(err.to_string(), "email is required");
    }

    #[test]
    fn should_display_category_mismatch() {
        let err = CategoryMismatchError {
            kind: LocalDeviceKind::Thermostat,
            category: DeviceCategory::Lock,
        };
        assert_eq!(
            err.to_string(),
            "thermostat device cannot be driven by a remote lock"
        );
    }

    #[test]
    fn should_convert_unbound_into_top_level() {
        let err: RentBridgeError = UnboundDeviceError::Missing {
            local: LocalDeviceId::new(7),
        }
        .into();
        assert!(matches!(err, RentBridgeError::UnboundDevice(_)));
    }

    #[test]
    fn should_wrap_configuration_error_in_authentication_error() {
        let err: AuthenticationError = ConfigurationError::MalformedSecret.into();
        assert!(matches!(
            err,
            AuthenticationError::Configuration(ConfigurationError::MalformedSecret)
        ));
    }

    #[test]
    fn should_display_unsupported_mode() {
        let err = UnsupportedModeError {
            what: "hvac mode",
            value: "programHeat".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported hvac mode: programHeat");
    }
}
