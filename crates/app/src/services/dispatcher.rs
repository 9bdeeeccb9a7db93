//! Action dispatcher — turns host commands into remote calls.
//!
//! Validation happens on the calling thread and its failures are returned.
//! The remote call itself is handed to the background executor and never
//! awaited here; its failure is logged from the worker.

use std::sync::Arc;

use rentbridge_domain::command::{Command, RemoteCommand};
use rentbridge_domain::device::{RemoteDevice, RemoteState};
use rentbridge_domain::error::{CategoryMismatchError, RentBridgeError, UnsupportedModeError};
use rentbridge_domain::id::RemoteDeviceId;
use rentbridge_domain::local::{LocalDevice, state};

use crate::executor::BackgroundExecutor;
use crate::ports::RemoteApi;
use crate::services::BindingResolver;
use crate::session::RemoteSession;

/// What a validated command turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    /// Write an attribute on the remote device.
    Write(RemoteDeviceId, RemoteCommand),
    /// Fetch the remote device and push it through synchronization.
    Refresh(RemoteDeviceId),
}

/// Validates host commands and submits the matching remote calls.
pub struct ActionDispatcher<A> {
    session: Arc<RemoteSession<A>>,
    resolver: BindingResolver<A>,
    executor: Arc<BackgroundExecutor>,
}

impl<A: RemoteApi> ActionDispatcher<A> {
    pub fn new(session: Arc<RemoteSession<A>>, executor: Arc<BackgroundExecutor>) -> Self {
        Self {
            resolver: BindingResolver::new(Arc::clone(&session)),
            session,
            executor,
        }
    }

    /// Validate `command` for `local` and submit it without waiting.
    ///
    /// # Errors
    ///
    /// Returns the validation failure, which is also logged: an unbound
    /// device, a command for the wrong remote category, a mode the remote API
    /// does not support, a relative setpoint change with no current value, or
    /// a setpoint that is not a finite number.
    #[tracing::instrument(skip_all, fields(device = %local.name(), %command))]
    pub fn dispatch(&self, command: Command, local: &LocalDevice) -> Result<Planned, RentBridgeError> {
        let planned = match self.plan(command, local) {
            Ok(planned) => planned,
            Err(err @ RentBridgeError::UnsupportedMode(_)) => {
                tracing::warn!(error = %err, "command not sent");
                return Err(err);
            }
            Err(err) => {
                tracing::error!(error = %err, "command not sent");
                return Err(err);
            }
        };

        let session = Arc::clone(&self.session);
        match planned.clone() {
            Planned::Write(id, write) => {
                tracing::debug!(remote_id = %id, ?write, "sending command");
                self.executor.spawn_detached("send_command", async move {
                    session.send_command(id, write).await
                });
            }
            Planned::Refresh(id) => {
                tracing::debug!(remote_id = %id, "requesting status");
                self.executor.spawn_detached("refresh_device", async move {
                    session.refresh_device(id).await.map(drop)
                });
            }
        }
        Ok(planned)
    }

    /// Translate `command` into the remote call it requires.
    ///
    /// # Errors
    ///
    /// Same as [`dispatch`](Self::dispatch).
    pub fn plan(&self, command: Command, local: &LocalDevice) -> Result<Planned, RentBridgeError> {
        let remote = self.resolver.resolve(local)?;
        if let Some(required) = command.required_category() {
            if remote.category() != required {
                return Err(CategoryMismatchError {
                    kind: local.kind(),
                    category: remote.category(),
                }
                .into());
            }
        }

        let write = match command {
            Command::SetLocked(locked) => RemoteCommand::SetLocked(locked),
            Command::SetHvacMode(mode) => {
                let remote_mode = mode.to_remote().ok_or_else(|| UnsupportedModeError {
                    what: "hvac mode",
                    value: mode.to_string(),
                })?;
                RemoteCommand::SetMode(remote_mode)
            }
            Command::SetFanMode(mode) => RemoteCommand::SetFanMode(mode.to_remote()),
            Command::SetCoolingSetpoint(value) => RemoteCommand::SetCoolingSetpoint(finite(value)?),
            Command::SetHeatingSetpoint(value) => RemoteCommand::SetHeatingSetpoint(finite(value)?),
            Command::AdjustCoolingSetpoint(delta) => RemoteCommand::SetCoolingSetpoint(finite(
                current_setpoint(local, &remote, state::SETPOINT_COOL)? + delta,
            )?),
            Command::AdjustHeatingSetpoint(delta) => RemoteCommand::SetHeatingSetpoint(finite(
                current_setpoint(local, &remote, state::SETPOINT_HEAT)? + delta,
            )?),
            Command::RequestStatus => return Ok(Planned::Refresh(remote.id)),
        };
        Ok(Planned::Write(remote.id, write))
    }
}

fn finite(value: f64) -> Result<f64, RentBridgeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RentBridgeError::InvalidSetpoint { value })
    }
}

/// The local setpoint, falling back to the remote snapshot.
fn current_setpoint(
    local: &LocalDevice,
    remote: &RemoteDevice,
    key: &'static str,
) -> Result<f64, RentBridgeError> {
    let from_remote = || match &remote.state {
        RemoteState::Thermostat(thermostat) if key == state::SETPOINT_COOL => {
            thermostat.cooling_setpoint
        }
        RemoteState::Thermostat(thermostat) => thermostat.heating_setpoint,
        _ => None,
    };
    local
        .state(key)
        .and_then(|value| value.as_f64())
        .or_else(from_remote)
        .ok_or(RentBridgeError::MissingState {
            local: local.id(),
            key,
        })
}
