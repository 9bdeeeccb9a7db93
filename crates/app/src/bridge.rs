//! Host integration — the entry points the home-automation host calls.
//!
//! Every method here runs on the host's control thread. Only
//! [`Bridge::startup`] blocks on the remote API (for the login); everything
//! else either reads the directory or hands work to the background executor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rentbridge_domain::command::Command;
use rentbridge_domain::device::{DeviceCategory, RemoteDevice};
use rentbridge_domain::error::{AuthenticationError, ConfigurationError, RentBridgeError};
use rentbridge_domain::hvac::{FanMode, HvacMode};
use rentbridge_domain::id::{LocalDeviceId, RemoteDeviceId};
use rentbridge_domain::local::{BINDING_PROP, LocalDevice, state};

use crate::executor::{BackgroundExecutor, ErrorChain, ExecutorError, ExecutorState};
use crate::ports::{Authenticator, RemoteApi};
use crate::preferences::{FieldErrors, Preferences};
use crate::services::synchronizer;
use crate::services::{ActionDispatcher, BindingResolver, Planned};
use crate::session::{RemoteSession, UpdateCallback};

/// Shown in device pickers while there is no session.
pub const NO_CONNECTION: &str = "No connection to SmartRent API";

/// Shown in device pickers when nothing matches the filter.
pub const NO_DEVICES: &str = "No SmartRent devices found!";

/// Action on a lock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    Unlock,
    Toggle,
}

/// Action any device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniversalAction {
    RequestStatus,
}

/// Action on a thermostat device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermostatAction {
    SetHvacMode(HvacMode),
    SetFanMode(FanMode),
    SetCoolSetpoint(f64),
    SetHeatSetpoint(f64),
    DecreaseCoolSetpoint(f64),
    IncreaseCoolSetpoint(f64),
    DecreaseHeatSetpoint(f64),
    IncreaseHeatSetpoint(f64),
}

impl From<ThermostatAction> for Command {
    fn from(action: ThermostatAction) -> Self {
        match action {
            ThermostatAction::SetHvacMode(mode) => Self::SetHvacMode(mode),
            ThermostatAction::SetFanMode(mode) => Self::SetFanMode(mode),
            ThermostatAction::SetCoolSetpoint(value) => Self::SetCoolingSetpoint(value),
            ThermostatAction::SetHeatSetpoint(value) => Self::SetHeatingSetpoint(value),
            ThermostatAction::DecreaseCoolSetpoint(delta) => Self::AdjustCoolingSetpoint(-delta),
            ThermostatAction::IncreaseCoolSetpoint(delta) => Self::AdjustCoolingSetpoint(delta),
            ThermostatAction::DecreaseHeatSetpoint(delta) => Self::AdjustHeatingSetpoint(-delta),
            ThermostatAction::IncreaseHeatSetpoint(delta) => Self::AdjustHeatingSetpoint(delta),
        }
    }
}

impl From<UniversalAction> for Command {
    fn from(action: UniversalAction) -> Self {
        match action {
            UniversalAction::RequestStatus => Self::RequestStatus,
        }
    }
}

/// One entry of a device picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOption {
    Device { id: RemoteDeviceId, name: String },
    /// A greyed-out line carrying an explanation.
    Disabled(&'static str),
}

/// Why [`Bridge::startup`] left the integration disabled.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("preferences are incomplete")]
    Configuration(#[from] ConfigurationError),

    #[error("login failed")]
    Authentication(#[from] AuthenticationError),

    #[error("background executor unavailable")]
    Executor(#[from] ExecutorError),
}

/// Why an action was not submitted.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("not connected to the remote API")]
    NotConnected,

    #[error(transparent)]
    Rejected(#[from] RentBridgeError),
}

struct Connection<A> {
    session: Arc<RemoteSession<A>>,
    resolver: BindingResolver<A>,
    dispatcher: ActionDispatcher<A>,
}

impl<A: RemoteApi> Connection<A> {
    /// Register the update callback for `device`, then seed it.
    ///
    /// The seed is read back from the directory after registration, so a push
    /// merged after `resolved` was taken reaches the device either through the
    /// callback or through the seed. Returns the snapshot used as seed.
    fn attach(&self, device: &Arc<LocalDevice>, resolved: RemoteDevice) -> RemoteDevice {
        let watched = Arc::clone(device);
        let callback: UpdateCallback = Arc::new(move |snapshot: &RemoteDevice| {
            if let Err(err) = synchronizer::sync(&watched, snapshot) {
                tracing::error!(device = %watched.name(), error = %err, "synchronization skipped");
            }
        });
        self.session
            .set_update_callback(resolved.id, device.id(), callback);

        let seed = self.session.device(resolved.id).unwrap_or(resolved);
        if let Err(err) = synchronizer::sync(device, &seed) {
            tracing::error!(error = %err, "initial synchronization failed");
        }
        seed
    }
}

/// The host-facing integration object.
pub struct Bridge<Au: Authenticator> {
    authenticator: Arc<Au>,
    preferences: Preferences,
    executor: Arc<BackgroundExecutor>,
    connection: Option<Connection<Au::Api>>,
    started: BTreeMap<LocalDeviceId, RemoteDeviceId>,
}

impl<Au: Authenticator> Bridge<Au> {
    #[must_use]
    pub fn new(authenticator: Au, preferences: Preferences) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            preferences,
            executor: Arc::new(BackgroundExecutor::default()),
            connection: None,
            started: BTreeMap::new(),
        }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Replace the stored preferences; takes effect on the next startup.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// The live session, once logged in.
    pub fn session(&self) -> Option<&Arc<RemoteSession<Au::Api>>> {
        self.connection.as_ref().map(|conn| &conn.session)
    }

    pub fn executor(&self) -> &Arc<BackgroundExecutor> {
        &self.executor
    }

    /// Start the background executor and log in.
    ///
    /// On failure the error is logged and the bridge stays disabled: device
    /// starts fail and actions are rejected until the next startup.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] describing why the bridge is disabled.
    pub fn startup(&mut self) -> Result<(), StartupError> {
        let result = self.connect();
        if let Err(err) = &result {
            tracing::error!(error = %ErrorChain(err), "integration disabled");
        }
        result
    }

    fn connect(&mut self) -> Result<(), StartupError> {
        if self.executor.state() == ExecutorState::Created {
            self.executor.start()?;
        }
        let credentials = self.preferences.credentials()?;
        let code = self.preferences.one_time_code()?;

        let authenticator = Arc::clone(&self.authenticator);
        let session = self.executor.block_on(async move {
            RemoteSession::login(authenticator.as_ref(), credentials, code).await
        })??;

        let session = Arc::new(session);
        self.connection = Some(Connection {
            resolver: BindingResolver::new(Arc::clone(&session)),
            dispatcher: ActionDispatcher::new(Arc::clone(&session), Arc::clone(&self.executor)),
            session,
        });
        tracing::info!("connected");
        Ok(())
    }

    /// Drop the session and stop the background executor.
    pub fn shutdown(&mut self) {
        if let Some(conn) = self.connection.take() {
            for local in self.started.keys() {
                conn.session.clear_subscriber(*local);
            }
        }
        self.started.clear();
        match self.executor.stop() {
            Ok(()) | Err(ExecutorError::Closed) => {}
            Err(err) => tracing::debug!(%err, "executor stop"),
        }
        tracing::info!("shut down");
    }

    /// Start mirroring `device`.
    ///
    /// Resolves the binding, seeds the state from the current snapshot and
    /// subscribes to push notifications. Returns `false`, leaving the state
    /// untouched, when the binding does not resolve to a compatible device.
    #[tracing::instrument(skip_all, fields(device = %device.name()))]
    pub fn device_start_comm(&mut self, device: &Arc<LocalDevice>) -> bool {
        let Some(conn) = &self.connection else {
            tracing::error!("cannot start device without a connection");
            return false;
        };
        let remote = match conn.resolver.resolve_compatible(device) {
            Ok(remote) => remote,
            Err(err) => {
                tracing::error!(error = %ErrorChain(&err), "device not started");
                return false;
            }
        };

        let remote = conn.attach(device, remote);
        self.executor.spawn_detached(
            "start_updates",
            Arc::clone(&conn.session).start_updates(remote.id),
        );

        self.started.insert(device.id(), remote.id);
        tracing::info!(remote_id = %remote.id, category = %remote.category(), "device started");
        true
    }

    /// Stop mirroring `device`.
    pub fn device_stop_comm(&mut self, device: &LocalDevice) {
        self.started.remove(&device.id());
        if let Some(conn) = &self.connection {
            conn.session.clear_subscriber(device.id());
        }
        tracing::debug!(device = %device.name(), "device stopped");
    }

    /// Whether an edit to a device needs a stop/start cycle.
    ///
    /// Only the binding property matters.
    #[must_use]
    pub fn did_device_comm_property_change(original: &LocalDevice, updated: &LocalDevice) -> bool {
        original.prop(BINDING_PROP) != updated.prop(BINDING_PROP)
    }

    /// Lock, unlock or toggle a lock.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when nothing was submitted.
    pub fn action_control_device(
        &self,
        action: LockAction,
        device: &LocalDevice,
    ) -> Result<Planned, ActionError> {
        let locked = match action {
            LockAction::Lock => true,
            LockAction::Unlock => false,
            LockAction::Toggle => !device
                .state(state::ON_OFF_STATE)
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
        };
        self.dispatch(Command::SetLocked(locked), device)
    }

    /// Actions every device supports.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when nothing was submitted.
    pub fn action_control_universal(
        &self,
        action: UniversalAction,
        device: &LocalDevice,
    ) -> Result<Planned, ActionError> {
        self.dispatch(action.into(), device)
    }

    /// Thermostat mode and setpoint changes.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when nothing was submitted.
    pub fn action_control_thermostat(
        &self,
        action: ThermostatAction,
        device: &LocalDevice,
    ) -> Result<Planned, ActionError> {
        self.dispatch(action.into(), device)
    }

    fn dispatch(&self, command: Command, device: &LocalDevice) -> Result<Planned, ActionError> {
        let Some(conn) = &self.connection else {
            tracing::error!(device = %device.name(), %command, "not connected");
            return Err(ActionError::NotConnected);
        };
        Ok(conn.dispatcher.dispatch(command, device)?)
    }

    /// Validate the preferences form.
    ///
    /// # Errors
    ///
    /// Returns one message per empty required field.
    pub fn validate_prefs(form: &Preferences) -> Result<(), FieldErrors> {
        form.validate()
    }

    /// The one-time code the form's secret produces right now.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the secret is empty or malformed.
    pub fn preview_code(form: &Preferences) -> Result<String, ConfigurationError> {
        form.preview_code()
    }

    /// Remote devices for a picker.
    ///
    /// `filter` is a comma-separated list of category names; an empty filter
    /// lists every device. Unknown names are ignored.
    #[must_use]
    pub fn device_options(&self, filter: &str) -> Vec<DeviceOption> {
        let Some(conn) = &self.connection else {
            return vec![DeviceOption::Disabled(NO_CONNECTION)];
        };

        let wanted: Vec<DeviceCategory> = filter
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| match name.parse() {
                Ok(category) => Some(category),
                Err(err) => {
                    tracing::debug!(%err, "ignoring picker filter");
                    None
                }
            })
            .collect();
        let unfiltered = filter.split(',').all(|name| name.trim().is_empty());

        let devices = if unfiltered {
            conn.session.device_list()
        } else {
            DeviceCategory::ALL
                .into_iter()
                .filter(|category| wanted.contains(category))
                .flat_map(|category| conn.session.devices_of_category(category))
                .collect()
        };

        if devices.is_empty() {
            return vec![DeviceOption::Disabled(NO_DEVICES)];
        }
        devices
            .into_iter()
            .map(|device| DeviceOption::Device {
                id: device.id,
                name: device.name,
            })
            .collect()
    }
}

impl<Au: Authenticator> Drop for Bridge<Au> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.shutdown();
        }
    }
}

impl<Au: Authenticator> fmt::Debug for Bridge<Au> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("preferences", &self.preferences)
            .field("connected", &self.is_connected())
            .field("started", &self.started.len())
            .finish_non_exhaustive()
    }
}
