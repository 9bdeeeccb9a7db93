//! # rentbridge-adapter-smartrent
//!
//! Talks to the SmartRent cloud API.
//!
//! - REST (reqwest) for login and the device directory. A refused access
//!   token triggers one transparent re-login with a fresh one-time code.
//! - A Phoenix websocket (tokio-tungstenite) for push notifications and
//!   attribute writes, one `devices:{id}` channel per subscribed device.
//!
//! Every future here is polled on the bridge's background worker; the
//! websocket task is spawned onto that same runtime at login.
//!
//! ## Dependency rule
//!
//! Depends on `rentbridge-app` (port traits) and `rentbridge-domain` only.

mod client;
pub mod config;
pub mod error;
pub mod phoenix;
mod socket;
mod wire;

pub use client::AuthenticatedClient;
pub use config::SmartRentConfig;
pub use error::SmartRentError;

use std::future::Future;
use std::sync::Arc;

use rentbridge_app::ports::{Authenticator, Credentials, PushHandler, RemoteApi};
use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::OneTimeCode;
use rentbridge_domain::device::RemoteDevice;
use rentbridge_domain::error::{AuthenticationError, TransportError};
use rentbridge_domain::id::RemoteDeviceId;

use crate::socket::SocketHandle;
use crate::wire::{DeviceRecord, HubRecord};

const HUBS_PATH: &str = "/api/v2/hubs";

/// Opens sessions on the SmartRent API.
#[derive(Debug, Clone, Default)]
pub struct SmartRentAuthenticator {
    config: SmartRentConfig,
}

impl SmartRentAuthenticator {
    #[must_use]
    pub fn new(config: SmartRentConfig) -> Self {
        Self { config }
    }
}

impl Authenticator for SmartRentAuthenticator {
    type Api = SmartRentApi;

    fn login(
        &self,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> impl Future<Output = Result<SmartRentApi, AuthenticationError>> + Send {
        let config = self.config.clone();
        async move {
            let client = AuthenticatedClient::new(&config, credentials, code)
                .map_err(SmartRentError::into_domain)?;
            let client = Arc::new(client);
            client.login().await?;
            let socket = SocketHandle::spawn(Arc::clone(&client), config);
            Ok(SmartRentApi { client, socket })
        }
    }
}

/// An authenticated SmartRent session.
#[derive(Clone)]
pub struct SmartRentApi {
    client: Arc<AuthenticatedClient>,
    socket: SocketHandle,
}

impl SmartRentApi {
    async fn list(client: &AuthenticatedClient) -> Result<Vec<RemoteDevice>, SmartRentError> {
        let hubs: Vec<HubRecord> = client.get(HUBS_PATH).await?;
        let mut devices = Vec::new();
        for hub in hubs {
            let records: Vec<DeviceRecord> = client.get(&format!("{HUBS_PATH}/{}/devices", hub.id)).await?;
            tracing::debug!(hub = hub.id, count = records.len(), "hub devices listed");
            devices.extend(records.into_iter().filter_map(DeviceRecord::into_device));
        }
        Ok(devices)
    }

    async fn fetch(client: &AuthenticatedClient, id: RemoteDeviceId) -> Result<RemoteDevice, SmartRentError> {
        let record: DeviceRecord = match client.get(&format!("/api/v2/devices/{id}")).await {
            Err(SmartRentError::Status { status: 404 }) => return Err(SmartRentError::NotFound(id)),
            other => other?,
        };
        record.into_device().ok_or(SmartRentError::NotFound(id))
    }
}

impl RemoteApi for SmartRentApi {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<RemoteDevice>, TransportError>> + Send {
        let client = Arc::clone(&self.client);
        async move { Ok(Self::list(&client).await?) }
    }

    fn fetch_device(
        &self,
        id: RemoteDeviceId,
    ) -> impl Future<Output = Result<RemoteDevice, TransportError>> + Send {
        let client = Arc::clone(&self.client);
        async move { Ok(Self::fetch(&client, id).await?) }
    }

    fn send_command(
        &self,
        id: RemoteDeviceId,
        command: RemoteCommand,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let socket = self.socket.clone();
        async move {
            tracing::debug!(remote_id = %id, ?command, "writing attribute");
            Ok(socket.write(id, command).await?)
        }
    }

    fn subscribe(
        &self,
        id: RemoteDeviceId,
        handler: PushHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let socket = self.socket.clone();
        async move { Ok(socket.join(id, handler).await?) }
    }
}
