//! Remote API port — what the bridge needs from a device-control client.
//!
//! Adapters (SmartRent, virtual) implement [`Authenticator`] to open a
//! session and [`RemoteApi`] to talk to it. All methods are asynchronous and
//! are only ever polled on the background executor's worker thread.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::OneTimeCode;
use rentbridge_domain::device::{DeviceUpdate, RemoteDevice};
use rentbridge_domain::error::{AuthenticationError, TransportError};
use rentbridge_domain::id::RemoteDeviceId;

/// Receives push notifications for a subscribed device.
///
/// Called from the transport's task; must not block.
pub type PushHandler = Arc<dyn Fn(DeviceUpdate) + Send + Sync>;

/// Account email and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"..")
            .finish()
    }
}

/// An authenticated connection to the remote API.
pub trait RemoteApi: Send + Sync + 'static {
    /// Every device visible to the account.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<RemoteDevice>, TransportError>> + Send;

    /// The current state of one device.
    fn fetch_device(
        &self,
        id: RemoteDeviceId,
    ) -> impl Future<Output = Result<RemoteDevice, TransportError>> + Send;

    /// Write an attribute on a device.
    ///
    /// Completion means the write was accepted; the resulting state arrives
    /// later as a push notification.
    fn send_command(
        &self,
        id: RemoteDeviceId,
        command: RemoteCommand,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Start delivering push notifications for `id` to `handler`.
    ///
    /// Subscribing again replaces the previous handler.
    fn subscribe(
        &self,
        id: RemoteDeviceId,
        handler: PushHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens a [`RemoteApi`] session.
pub trait Authenticator: Send + Sync + 'static {
    type Api: RemoteApi;

    /// Log in with `credentials`, presenting `code` if the account asks for a
    /// second factor.
    ///
    /// `code` is serialized, and therefore generated, when the request carrying
    /// it is sent.
    fn login(
        &self,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> impl Future<Output = Result<Self::Api, AuthenticationError>> + Send;
}
