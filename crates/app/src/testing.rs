//! In-memory fakes of the remote ports for unit tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::{CodeGenerator, OneTimeCode};
use rentbridge_domain::device::{DeviceUpdate, RemoteDevice};
use rentbridge_domain::error::{AuthenticationError, TransportError};
use rentbridge_domain::id::RemoteDeviceId;

use crate::ports::{Authenticator, Credentials, PushHandler, RemoteApi};

pub const SECRET: &str = "JBSWY3DPEHPK3PXP";

pub fn code() -> OneTimeCode {
    OneTimeCode::new(Arc::new(CodeGenerator::from_base32(SECRET).unwrap()))
}

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    devices: Vec<RemoteDevice>,
    commands: Vec<(RemoteDeviceId, RemoteCommand)>,
    handlers: BTreeMap<RemoteDeviceId, PushHandler>,
    failing: bool,
    on_fetch: Option<Hook>,
    on_list: Option<Hook>,
}

/// Remote API backed by a vector of devices. Commands are recorded, not
/// applied.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
}

impl FakeApi {
    pub fn with_devices(devices: Vec<RemoteDevice>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().devices = devices;
        api
    }

    /// Insert or replace the remote-side copy of a device.
    pub fn set_remote(&self, device: RemoteDevice) {
        let mut state = self.state.lock().unwrap();
        match state.devices.iter_mut().find(|d| d.id == device.id) {
            Some(slot) => *slot = device,
            None => state.devices.push(device),
        }
    }

    /// Run `hook` after a fetch has read the remote copy, before it returns.
    pub fn on_fetch(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().unwrap().on_fetch = Some(Arc::new(hook));
    }

    /// Run `hook` after a listing has read the remote copies, before it returns.
    pub fn on_list(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().unwrap().on_list = Some(Arc::new(hook));
    }

    pub fn fail_requests(&self) {
        self.state.lock().unwrap().failing = true;
    }

    pub fn commands(&self) -> Vec<(RemoteDeviceId, RemoteCommand)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().handlers.len()
    }

    /// Deliver a push notification to the subscribed handler, if any.
    pub fn push(&self, update: DeviceUpdate) {
        let handler = self
            .state
            .lock()
            .unwrap()
            .handlers
            .get(&update.device_id)
            .cloned();
        if let Some(handler) = handler {
            handler(update);
        }
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.state.lock().unwrap().failing {
            Err(TransportError::Status { status: 503 })
        } else {
            Ok(())
        }
    }
}

impl RemoteApi for FakeApi {
    fn list_devices(&self) -> impl Future<Output = Result<Vec<RemoteDevice>, TransportError>> + Send {
        let result = self
            .check()
            .map(|()| self.state.lock().unwrap().devices.clone());
        let hook = self.state.lock().unwrap().on_list.clone();
        if let Some(hook) = hook {
            hook();
        }
        async { result }
    }

    fn fetch_device(
        &self,
        id: RemoteDeviceId,
    ) -> impl Future<Output = Result<RemoteDevice, TransportError>> + Send {
        let result = self.check().and_then(|()| {
            self.state
                .lock()
                .unwrap()
                .devices
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or(TransportError::DeviceNotFound(id))
        });
        let hook = self.state.lock().unwrap().on_fetch.clone();
        if let Some(hook) = hook {
            hook();
        }
        async { result }
    }

    fn send_command(
        &self,
        id: RemoteDeviceId,
        command: RemoteCommand,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.check().map(|()| {
            self.state.lock().unwrap().commands.push((id, command));
        });
        async { result }
    }

    fn subscribe(
        &self,
        id: RemoteDeviceId,
        handler: PushHandler,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.check().map(|()| {
            self.state.lock().unwrap().handlers.insert(id, handler);
        });
        async { result }
    }
}

/// Accepts any password except `"bad"`.
pub struct FakeAuthenticator {
    api: Option<FakeApi>,
}

impl FakeAuthenticator {
    pub fn new(devices: Vec<RemoteDevice>) -> Self {
        Self {
            api: Some(FakeApi::with_devices(devices)),
        }
    }

    pub fn rejecting() -> Self {
        Self { api: None }
    }
}

impl Authenticator for FakeAuthenticator {
    type Api = FakeApi;

    fn login(
        &self,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> impl Future<Output = Result<FakeApi, AuthenticationError>> + Send {
        let result = match &self.api {
            Some(_) if credentials.password == "bad" => Err(AuthenticationError::InvalidCredentials),
            Some(_) if code.current().len() != 6 => Err(AuthenticationError::InvalidCode),
            Some(api) => Ok(api.clone()),
            None => Err(AuthenticationError::InvalidCredentials),
        };
        async { result }
    }
}
