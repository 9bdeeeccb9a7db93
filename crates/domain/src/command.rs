//! Commands — what the host asks for, and what the remote API is sent.

use std::fmt;

use crate::device::DeviceCategory;
use crate::hvac::{FanMode, HvacMode};

/// A host-issued command targeting one local device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetLocked(bool),
    SetHvacMode(HvacMode),
    SetFanMode(FanMode),
    SetCoolingSetpoint(f64),
    SetHeatingSetpoint(f64),
    /// Move the cooling setpoint by a signed delta.
    AdjustCoolingSetpoint(f64),
    /// Move the heating setpoint by a signed delta.
    AdjustHeatingSetpoint(f64),
    /// Fetch the current remote state and push it through synchronization.
    RequestStatus,
}

impl Command {
    /// The remote category this command needs, or `None` if any will do.
    #[must_use]
    pub fn required_category(&self) -> Option<DeviceCategory> {
        match self {
            Self::SetLocked(_) => Some(DeviceCategory::Lock),
            Self::SetHvacMode(_)
            | Self::SetFanMode(_)
            | Self::SetCoolingSetpoint(_)
            | Self::SetHeatingSetpoint(_)
            | Self::AdjustCoolingSetpoint(_)
            | Self::AdjustHeatingSetpoint(_) => Some(DeviceCategory::Thermostat),
            Self::RequestStatus => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetLocked(true) => f.write_str("lock"),
            Self::SetLocked(false) => f.write_str("unlock"),
            Self::SetHvacMode(mode) => write!(f, "set_hvac_mode({mode})"),
            Self::SetFanMode(mode) => write!(f, "set_fan_mode({mode})"),
            Self::SetCoolingSetpoint(v) => write!(f, "set_cooling_setpoint({v})"),
            Self::SetHeatingSetpoint(v) => write!(f, "set_heating_setpoint({v})"),
            Self::AdjustCoolingSetpoint(d) => write!(f, "adjust_cooling_setpoint({d:+})"),
            Self::AdjustHeatingSetpoint(d) => write!(f, "adjust_heating_setpoint({d:+})"),
            Self::RequestStatus => f.write_str("request_status"),
        }
    }
}

/// A write sent to the remote API for one device.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    SetLocked(bool),
    /// Remote mode string (`cool`, `heat`, `auto`, `off`).
    SetMode(&'static str),
    /// Remote fan mode string (`on`, `auto`).
    SetFanMode(&'static str),
    SetCoolingSetpoint(f64),
    SetHeatingSetpoint(f64),
}

impl RemoteCommand {
    /// The attribute name and wire value this command writes.
    #[must_use]
    pub fn attribute(&self) -> (&'static str, String) {
        use crate::device::state;
        match self {
            Self::SetLocked(locked) => (state::LOCKED, locked.to_string()),
            Self::SetMode(mode) => (state::MODE, (*mode).to_string()),
            Self::SetFanMode(mode) => (state::FAN_MODE, (*mode).to_string()),
            Self::SetCoolingSetpoint(v) => (state::COOLING_SETPOINT, format_setpoint(*v)),
            Self::SetHeatingSetpoint(v) => (state::HEATING_SETPOINT, format_setpoint(*v)),
        }
    }
}

/// Whole-degree setpoints are sent without a fractional part.
fn format_setpoint(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
