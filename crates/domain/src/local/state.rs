//! Observable state of a local device — what the host displays.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::RemoteDeviceId;

pub const ONLINE: &str = "online";
pub const BATTERY_LEVEL: &str = "batteryLevel";
pub const ON_OFF_STATE: &str = "onOffState";
pub const LOCK_STATUS: &str = "lockStatus";
pub const HUMIDITY_INPUT: &str = "humidityInput1";
pub const TEMPERATURE_INPUT: &str = "temperatureInput1";
pub const HVAC_COOLER_IS_ON: &str = "hvacCoolerIsOn";
pub const HVAC_HEATER_IS_ON: &str = "hvacHeaterIsOn";
pub const HVAC_FAN_MODE: &str = "hvacFanMode";
pub const HVAC_OPERATION_MODE: &str = "hvacOperationMode";
pub const SETPOINT_COOL: &str = "setpointCool";
pub const SETPOINT_HEAT: &str = "setpointHeat";

/// A single host state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl StateValue {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) | Self::String(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => b.fmt(f),
            Self::Int(i) => i.fmt(f),
            Self::Float(x) => x.fmt(f),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Icon the host shows next to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateImage {
    Locked,
    Unlocked,
}

/// One state field with its value and optional display text.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub key: &'static str,
    pub value: StateValue,
    pub ui_value: Option<String>,
}

/// The full set of observable fields, keyed by state name.
pub type StateVector = BTreeMap<&'static str, StateEntry>;

/// The remote snapshot an update was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSource {
    pub remote: RemoteDeviceId,
    pub revision: u64,
}

/// A batch of state writes applied to a local device in one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub source: Option<UpdateSource>,
    pub entries: Vec<StateEntry>,
    pub image: Option<StateImage>,
}

impl StateUpdate {
    /// An empty update derived from the given remote snapshot.
    #[must_use]
    pub fn from_source(remote: RemoteDeviceId, revision: u64) -> Self {
        Self {
            source: Some(UpdateSource { remote, revision }),
            ..Self::default()
        }
    }

    /// Set `key` to `value`.
    pub fn set(&mut self, key: &'static str, value: impl Into<StateValue>) -> &mut Self {
        self.push(key, value.into(), None)
    }

    /// Set `key` to `value`, with host display text.
    pub fn set_with_ui(
        &mut self,
        key: &'static str,
        value: impl Into<StateValue>,
        ui_value: impl Into<String>,
    ) -> &mut Self {
        self.push(key, value.into(), Some(ui_value.into()))
    }

    /// Set `key` only when `value` is known.
    pub fn set_opt<V: Into<StateValue>>(&mut self, key: &'static str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Select the state icon.
    pub fn image(&mut self, image: StateImage) -> &mut Self {
        self.image = Some(image);
        self
    }

    /// Look up the value written for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    fn push(&mut self, key: &'static str, value: StateValue, ui_value: Option<String>) -> &mut Self {
        self.entries.push(StateEntry {
            key,
            value,
            ui_value,
        });
        self
    }
}
