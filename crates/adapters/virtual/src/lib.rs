//! # rentbridge-adapter-virtual
//!
//! A simulated remote account that implements the same ports as the real
//! API. Logins check the password and the one-time code, writes change the
//! simulated devices and come back as push notifications.
//!
//! ## Demo devices
//!
//! | Device | Id | Behaviour |
//! |--------|----|-----------|
//! | Front Door | `1001` | Lock; accepts `locked` writes |
//! | Hallway Thermostat | `1002` | Accepts mode, fan and setpoint writes |
//! | Kitchen Sink | `1003` | Leak sensor; read-only |
//!
//! ## Dependency rule
//!
//! Depends on `rentbridge-app` (port traits) and `rentbridge-domain` only.

mod devices;
pub mod error;

pub use devices::{VirtualDevice, VirtualLeakSensor, VirtualLock, VirtualThermostat};
pub use error::VirtualError;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rentbridge_app::ports::{Authenticator, Credentials, PushHandler, RemoteApi};
use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::{CodeGenerator, OneTimeCode, SharedSecret, TIME_STEP_SECS};
use rentbridge_domain::device::{DeviceUpdate, RemoteDevice};
use rentbridge_domain::error::{AuthenticationError, ConfigurationError, TransportError};
use rentbridge_domain::id::RemoteDeviceId;
use rentbridge_domain::time::unix_seconds;

pub const DEMO_LOCK: RemoteDeviceId = RemoteDeviceId::new(1001);
pub const DEMO_THERMOSTAT: RemoteDeviceId = RemoteDeviceId::new(1002);
pub const DEMO_LEAK_SENSOR: RemoteDeviceId = RemoteDeviceId::new(1003);

/// A simulated account: credentials, second factor and devices.
pub struct VirtualAccount {
    credentials: Credentials,
    generator: CodeGenerator,
    devices: Vec<VirtualDevice>,
    handlers: Mutex<BTreeMap<RemoteDeviceId, PushHandler>>,
}

impl VirtualAccount {
    /// An account with no devices.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the secret cannot key a generator.
    pub fn new(credentials: Credentials, secret: &SharedSecret) -> Result<Self, ConfigurationError> {
        Ok(Self {
            credentials,
            generator: CodeGenerator::new(secret)?,
            devices: Vec::new(),
            handlers: Mutex::new(BTreeMap::new()),
        })
    }

    /// An account holding the three demo devices.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the secret cannot key a generator.
    pub fn demo(credentials: Credentials, secret: &SharedSecret) -> Result<Self, ConfigurationError> {
        Ok(Self::new(credentials, secret)?
            .with_device(VirtualLock::new(DEMO_LOCK, "Front Door"))
            .with_device(VirtualThermostat::new(DEMO_THERMOSTAT, "Hallway Thermostat"))
            .with_device(VirtualLeakSensor::new(DEMO_LEAK_SENSOR, "Kitchen Sink")))
    }

    #[must_use]
    pub fn with_device(mut self, device: impl Into<VirtualDevice>) -> Self {
        self.devices.push(device.into());
        self
    }

    /// Simulate a change made outside the API and push it to the
    /// subscriber, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::UnknownDevice`] for an unknown identifier.
    pub fn report(&self, update: DeviceUpdate) -> Result<(), VirtualError> {
        let device = self.find(update.device_id)?;
        let changes = device.report(update.changes);
        if !changes.is_empty() {
            self.push(DeviceUpdate::new(update.device_id, changes));
        }
        Ok(())
    }

    fn verify(&self, credentials: &Credentials, code: &OneTimeCode) -> Result<(), AuthenticationError> {
        if credentials != &self.credentials {
            return Err(AuthenticationError::InvalidCredentials);
        }
        // Read the code the way it would travel: serialized.
        let presented = serde_json::to_value(code)
            .map_err(|err| TransportError::Decode(Box::new(err)))?;
        let now = unix_seconds();
        let accepted = [now, now.saturating_sub(TIME_STEP_SECS)]
            .into_iter()
            .any(|at| presented.as_str() == Some(self.generator.code_at(at).as_str()));
        if accepted {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidCode)
        }
    }

    fn find(&self, id: RemoteDeviceId) -> Result<&VirtualDevice, VirtualError> {
        self.devices
            .iter()
            .find(|device| device.id() == id)
            .ok_or(VirtualError::UnknownDevice(id))
    }

    fn send_command(&self, id: RemoteDeviceId, command: &RemoteCommand) -> Result<(), VirtualError> {
        let changes = self.find(id)?.handle_command(command)?;
        tracing::debug!(remote_id = %id, ?command, changes = changes.len(), "virtual command applied");
        if !changes.is_empty() {
            self.push(DeviceUpdate::new(id, changes));
        }
        Ok(())
    }

    fn push(&self, update: DeviceUpdate) {
        let handler = self.lock_handlers().get(&update.device_id).cloned();
        if let Some(handler) = handler {
            handler(update);
        }
    }

    fn lock_handlers(&self) -> MutexGuard<'_, BTreeMap<RemoteDeviceId, PushHandler>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Logs in to a [`VirtualAccount`].
#[derive(Clone)]
pub struct VirtualAuthenticator {
    account: Arc<VirtualAccount>,
}

impl VirtualAuthenticator {
    #[must_use]
    pub fn new(account: Arc<VirtualAccount>) -> Self {
        Self { account }
    }

    /// The account behind this authenticator, for simulating changes.
    #[must_use]
    pub fn account(&self) -> &Arc<VirtualAccount> {
        &self.account
    }
}

impl Authenticator for VirtualAuthenticator {
    type Api = VirtualApi;

    fn login(
        &self,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> impl Future<Output = Result<VirtualApi, AuthenticationError>> + Send {
        let account = Arc::clone(&self.account);
        async move {
            account.verify(&credentials, &code)?;
            tracing::debug!(email = %credentials.email, "virtual login accepted");
            Ok(VirtualApi { account })
        }
    }
}

/// An authenticated session on a [`VirtualAccount`].
#[derive(Clone)]
pub struct VirtualApi {
    account: Arc<VirtualAccount>,
}

impl RemoteApi for VirtualApi {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<RemoteDevice>, TransportError>> + Send {
        let account = Arc::clone(&self.account);
        async move { Ok(account.devices.iter().map(VirtualDevice::snapshot).collect()) }
    }

    fn fetch_device(
        &self,
        id: RemoteDeviceId,
    ) -> impl Future<Output = Result<RemoteDevice, TransportError>> + Send {
        let account = Arc::clone(&self.account);
        async move { Ok(account.find(id)?.snapshot()) }
    }

    fn send_command(
        &self,
        id: RemoteDeviceId,
        command: RemoteCommand,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let account = Arc::clone(&self.account);
        async move { Ok(account.send_command(id, &command)?) }
    }

    fn subscribe(
        &self,
        id: RemoteDeviceId,
        handler: PushHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let account = Arc::clone(&self.account);
        async move {
            account.find(id)?;
            account.lock_handlers().insert(id, handler);
            Ok(())
        }
    }
}
