//! Virtual adapter error types.

use rentbridge_domain::error::TransportError;
use rentbridge_domain::id::RemoteDeviceId;

/// Errors raised by the simulated account.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VirtualError {
    /// No simulated device has this identifier.
    #[error("unknown virtual device {0}")]
    UnknownDevice(RemoteDeviceId),

    /// The device does not understand the command.
    #[error("virtual device {device} does not support {command}")]
    UnsupportedCommand {
        device: RemoteDeviceId,
        /// Attribute the command tried to write.
        command: &'static str,
    },
}

impl VirtualError {
    /// Convert into the [`TransportError`] a real API would have produced.
    #[must_use]
    pub fn into_domain(self) -> TransportError {
        match self {
            Self::UnknownDevice(id) => TransportError::DeviceNotFound(id),
            Self::UnsupportedCommand { .. } => TransportError::Status { status: 422 },
        }
    }
}

impl From<VirtualError> for TransportError {
    fn from(err: VirtualError) -> Self {
        err.into_domain()
    }
}
