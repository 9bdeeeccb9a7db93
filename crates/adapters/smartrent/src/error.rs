//! SmartRent adapter error types.

use rentbridge_domain::error::{AuthenticationError, TransportError};
use rentbridge_domain::id::RemoteDeviceId;
use tokio_tungstenite::tungstenite;

/// Errors raised while talking to the SmartRent API.
#[derive(Debug, thiserror::Error)]
pub enum SmartRentError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// The API answered with a status the adapter does not handle.
    #[error("unexpected response status {status}")]
    Status { status: u16 },

    /// The access token was refused.
    #[error("access token rejected")]
    Unauthorized,

    #[error("malformed payload")]
    Decode(#[from] serde_json::Error),

    #[error("websocket failure")]
    WebSocket(#[source] Box<tungstenite::Error>),

    #[error("invalid URL")]
    Url(#[from] url::ParseError),

    /// A channel reply carried an error status.
    #[error("channel request rejected: {reason}")]
    Rejected { reason: String },

    /// The websocket went away before the request completed.
    #[error("websocket disconnected")]
    Disconnected,

    #[error("device {0} not found")]
    NotFound(RemoteDeviceId),

    /// A login step succeeded without handing out an access token.
    #[error("login response carried no access token")]
    MissingToken,

    /// Logging in again after a refused token failed.
    #[error("re-authentication failed")]
    Reauthentication(#[source] AuthenticationError),
}

impl From<tungstenite::Error> for SmartRentError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl SmartRentError {
    /// Convert into the domain-level [`TransportError`].
    #[must_use]
    pub fn into_domain(self) -> TransportError {
        match self {
            Self::Http(err) if err.is_decode() => TransportError::Decode(Box::new(err)),
            Self::Status { status } => TransportError::Status { status },
            Self::Unauthorized => TransportError::Status { status: 401 },
            Self::Decode(err) => TransportError::Decode(Box::new(err)),
            Self::Rejected { .. } => TransportError::Status { status: 422 },
            Self::NotFound(id) => TransportError::DeviceNotFound(id),
            Self::Reauthentication(AuthenticationError::Transport(err)) => err,
            Self::Reauthentication(_) => TransportError::Status { status: 401 },
            other @ Self::MissingToken => TransportError::Decode(Box::new(other)),
            other @ (Self::Http(_) | Self::WebSocket(_) | Self::Url(_) | Self::Disconnected) => {
                TransportError::Connection(Box::new(other))
            }
        }
    }

    /// Convert a failed login step into an [`AuthenticationError`].
    ///
    /// `refused` is what a rejected step means: bad credentials for the
    /// password step, a bad code for the second-factor step.
    #[must_use]
    pub fn into_authentication(self, refused: AuthenticationError) -> AuthenticationError {
        match self {
            Self::Unauthorized => refused,
            Self::Reauthentication(err) => err,
            other => AuthenticationError::Transport(other.into_domain()),
        }
    }
}

impl From<SmartRentError> for TransportError {
    fn from(err: SmartRentError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_unauthorized_to_status() {
        let err: TransportError = SmartRentError::Unauthorized.into();
        assert!(matches!(err, TransportError::Status { status: 401 }));
    }

    #[test]
    fn should_convert_not_found() {
        let err: TransportError = SmartRentError::NotFound(RemoteDeviceId::new(4)).into();
        assert!(matches!(err, TransportError::DeviceNotFound(id) if id.get() == 4));
    }

    #[test]
    fn should_convert_decode_failure() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: TransportError = SmartRentError::from(json_err).into();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn should_convert_disconnect_to_connection_failure() {
        let err: TransportError = SmartRentError::Disconnected.into();
        assert!(matches!(err, TransportError::Connection(_)));
    }

    #[test]
    fn should_map_refused_login_step() {
        let err = SmartRentError::Unauthorized.into_authentication(AuthenticationError::InvalidCode);
        assert!(matches!(err, AuthenticationError::InvalidCode));

        let err = SmartRentError::Status { status: 500 }
            .into_authentication(AuthenticationError::InvalidCredentials);
        assert!(matches!(
            err,
            AuthenticationError::Transport(TransportError::Status { status: 500 })
        ));
    }

    #[test]
    fn should_unwrap_transport_failure_from_reauthentication() {
        let err: TransportError = SmartRentError::Reauthentication(AuthenticationError::Transport(
            TransportError::Status { status: 503 },
        ))
        .into();
        assert!(matches!(err, TransportError::Status { status: 503 }));
    }
}
