//! Virtual thermostat — accepts mode, fan and setpoint writes and derives
//! its operating state from the current temperature.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::device::{
    AttributeChange, AttributeValue, DeviceCategory, ONLINE, RemoteDevice, RemoteState,
    ThermostatState, state,
};
use rentbridge_domain::id::RemoteDeviceId;

use crate::error::VirtualError;

const MODES: [&str; 4] = ["cool", "heat", "auto", "off"];
const FAN_MODES: [&str; 2] = ["on", "auto"];

/// A simulated thermostat. Starts heating a 66° room towards 68°.
pub struct VirtualThermostat {
    device: Mutex<RemoteDevice>,
}

impl VirtualThermostat {
    #[must_use]
    pub fn new(id: RemoteDeviceId, name: &str) -> Self {
        let device = RemoteDevice::new(id, name, DeviceCategory::Thermostat)
            .with_attribute(ONLINE, true)
            .with_attribute(state::MODE, "heat")
            .with_attribute(state::FAN_MODE, "auto")
            .with_attribute(state::OPERATING_STATE, "heating")
            .with_attribute(state::COOLING_SETPOINT, 74.0)
            .with_attribute(state::HEATING_SETPOINT, 68.0)
            .with_attribute(state::CURRENT_TEMP, 66.0)
            .with_attribute(state::CURRENT_HUMIDITY, 40.0);
        Self {
            device: Mutex::new(device),
        }
    }

    pub(crate) fn device(&self) -> MutexGuard<'_, RemoteDevice> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a command, returning the attribute changes to push.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::UnsupportedCommand`] for lock writes and for
    /// mode strings a real thermostat would refuse.
    pub fn handle_command(&self, command: &RemoteCommand) -> Result<Vec<AttributeChange>, VirtualError> {
        let mut device = self.device();
        let (name, _) = command.attribute();
        let value = match command {
            RemoteCommand::SetMode(mode) if MODES.contains(mode) => AttributeValue::from(*mode),
            RemoteCommand::SetFanMode(mode) if FAN_MODES.contains(mode) => {
                AttributeValue::from(*mode)
            }
            RemoteCommand::SetCoolingSetpoint(value) | RemoteCommand::SetHeatingSetpoint(value) => {
                AttributeValue::Float(*value)
            }
            RemoteCommand::SetMode(_) | RemoteCommand::SetFanMode(_) | RemoteCommand::SetLocked(_) => {
                return Err(VirtualError::UnsupportedCommand {
                    device: device.id,
                    command: name,
                });
            }
        };

        let mut changes = Vec::new();
        if device.apply_attribute(name, &value) {
            changes.push(AttributeChange::new(name, value));
        }
        let derived = match &device.state {
            RemoteState::Thermostat(thermostat) => Some(operating_state(thermostat)),
            _ => None,
        };
        if let Some(derived) = derived {
            let operating = AttributeValue::from(derived);
            if device.apply_attribute(state::OPERATING_STATE, &operating) {
                changes.push(AttributeChange::new(state::OPERATING_STATE, operating));
            }
        }
        Ok(changes)
    }
}

fn operating_state(thermostat: &ThermostatState) -> &'static str {
    let Some(temp) = thermostat.current_temp else {
        return "idle";
    };
    let mode = thermostat.mode.as_deref();
    let wants_heat = matches!(mode, Some("heat" | "auto"))
        && thermostat.heating_setpoint.is_some_and(|target| temp < target);
    let wants_cool = matches!(mode, Some("cool" | "auto"))
        && thermostat.cooling_setpoint.is_some_and(|target| temp > target);
    if wants_heat {
        "heating"
    } else if wants_cool {
        "cooling"
    } else {
        "idle"
    }
}
