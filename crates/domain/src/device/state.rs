//! Typed per-category state of a remote device.
//!
//! The wire format is a flat list of `name → value` attributes;
//! [`RemoteState::apply`] folds one attribute into the typed view and
//! [`RemoteState::attributes`] renders the view back.

use std::collections::BTreeMap;

use super::attribute_value::AttributeValue;
use super::category::DeviceCategory;

pub const LOCKED: &str = "locked";
pub const BATTERY_LEVEL: &str = "battery_level";
pub const MODE: &str = "mode";
pub const FAN_MODE: &str = "fan_mode";
pub const OPERATING_STATE: &str = "operating_state";
pub const COOLING_SETPOINT: &str = "cooling_setpoint";
pub const HEATING_SETPOINT: &str = "heating_setpoint";
pub const CURRENT_TEMP: &str = "current_temp";
pub const CURRENT_HUMIDITY: &str = "current_humidity";
pub const LEAK: &str = "leak";
pub const ON: &str = "on";
pub const LEVEL: &str = "level";
pub const MOTION: &str = "motion";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockState {
    pub locked: Option<bool>,
    pub battery_level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermostatState {
    /// Remote HVAC mode string (`cool`, `heat`, `auto`, `off`).
    pub mode: Option<String>,
    /// Remote fan mode string (`on`, `auto`).
    pub fan_mode: Option<String>,
    /// What the unit is doing right now (`cooling`, `heating`, `idle`, …).
    pub operating_state: Option<String>,
    pub cooling_setpoint: Option<f64>,
    pub heating_setpoint: Option<f64>,
    pub current_temp: Option<f64>,
    pub current_humidity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeakSensorState {
    pub leak: Option<bool>,
    pub battery_level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinarySwitchState {
    pub on: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultilevelSwitchState {
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionSensorState {
    pub motion: Option<bool>,
    pub battery_level: Option<i64>,
}

/// Category-specific state; the variant *is* the device category.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteState {
    Lock(LockState),
    Thermostat(ThermostatState),
    LeakSensor(LeakSensorState),
    BinarySwitch(BinarySwitchState),
    MultilevelSwitch(MultilevelSwitchState),
    MotionSensor(MotionSensorState),
}

impl RemoteState {
    /// A state with every attribute unknown.
    #[must_use]
    pub fn empty(category: DeviceCategory) -> Self {
        match category {
            DeviceCategory::Lock => Self::Lock(LockState::default()),
            DeviceCategory::Thermostat => Self::Thermostat(ThermostatState::default()),
            DeviceCategory::LeakSensor => Self::LeakSensor(LeakSensorState::default()),
            DeviceCategory::BinarySwitch => Self::BinarySwitch(BinarySwitchState::default()),
            DeviceCategory::MultilevelSwitch => {
                Self::MultilevelSwitch(MultilevelSwitchState::default())
            }
            DeviceCategory::MotionSensor => Self::MotionSensor(MotionSensorState::default()),
        }
    }

    #[must_use]
    pub fn category(&self) -> DeviceCategory {
        match self {
            Self::Lock(_) => DeviceCategory::Lock,
            Self::Thermostat(_) => DeviceCategory::Thermostat,
            Self::LeakSensor(_) => DeviceCategory::LeakSensor,
            Self::BinarySwitch(_) => DeviceCategory::BinarySwitch,
            Self::MultilevelSwitch(_) => DeviceCategory::MultilevelSwitch,
            Self::MotionSensor(_) => DeviceCategory::MotionSensor,
        }
    }

    /// Fold one attribute into the state.
    ///
    /// Returns `true` when a known attribute changed value. Unknown names and
    /// values of the wrong shape are ignored.
    pub fn apply(&mut self, name: &str, value: &AttributeValue) -> bool {
        match self {
            Self::Lock(s) => match name {
                LOCKED => set(&mut s.locked, value.as_bool()),
                BATTERY_LEVEL => set(&mut s.battery_level, value.as_i64()),
                _ => false,
            },
            Self::Thermostat(s) => match name {
                MODE => set(&mut s.mode, value.as_str().map(str::to_string)),
                FAN_MODE => set(&mut s.fan_mode, value.as_str().map(str::to_string)),
                OPERATING_STATE => {
                    set(&mut s.operating_state, value.as_str().map(str::to_string))
                }
                COOLING_SETPOINT => set(&mut s.cooling_setpoint, value.as_f64()),
                HEATING_SETPOINT => set(&mut s.heating_setpoint, value.as_f64()),
                CURRENT_TEMP => set(&mut s.current_temp, value.as_f64()),
                CURRENT_HUMIDITY => set(&mut s.current_humidity, value.as_f64()),
                _ => false,
            },
            Self::LeakSensor(s) => match name {
                LEAK => set(&mut s.leak, value.as_bool()),
                BATTERY_LEVEL => set(&mut s.battery_level, value.as_i64()),
                _ => false,
            },
            Self::BinarySwitch(s) => match name {
                ON => set(&mut s.on, value.as_bool()),
                _ => false,
            },
            Self::MultilevelSwitch(s) => match name {
                LEVEL => set(&mut s.level, value.as_i64()),
                _ => false,
            },
            Self::MotionSensor(s) => match name {
                MOTION => set(&mut s.motion, value.as_bool()),
                BATTERY_LEVEL => set(&mut s.battery_level, value.as_i64()),
                _ => false,
            },
        }
    }

    /// Render the known attributes back to their wire names.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&'static str, AttributeValue> {
        let mut out = BTreeMap::new();
        let mut put = |name: &'static str, value: Option<AttributeValue>| {
            if let Some(value) = value {
                out.insert(name, value);
            }
        };
        match self {
            Self::Lock(s) => {
                put(LOCKED, s.locked.map(AttributeValue::Bool));
                put(BATTERY_LEVEL, s.battery_level.map(AttributeValue::Int));
            }
            Self::Thermostat(s) => {
                put(MODE, s.mode.clone().map(AttributeValue::String));
                put(FAN_MODE, s.fan_mode.clone().map(AttributeValue::String));
                put(
                    OPERATING_STATE,
                    s.operating_state.clone().map(AttributeValue::String),
                );
                put(COOLING_SETPOINT, s.cooling_setpoint.map(AttributeValue::Float));
                put(HEATING_SETPOINT, s.heating_setpoint.map(AttributeValue::Float));
                put(CURRENT_TEMP, s.current_temp.map(AttributeValue::Float));
                put(CURRENT_HUMIDITY, s.current_humidity.map(AttributeValue::Float));
            }
            Self::LeakSensor(s) => {
                put(LEAK, s.leak.map(AttributeValue::Bool));
                put(BATTERY_LEVEL, s.battery_level.map(AttributeValue::Int));
            }
            Self::BinarySwitch(s) => put(ON, s.on.map(AttributeValue::Bool)),
            Self::MultilevelSwitch(s) => put(LEVEL, s.level.map(AttributeValue::Int)),
            Self::MotionSensor(s) => {
                put(MOTION, s.motion.map(AttributeValue::Bool));
                put(BATTERY_LEVEL, s.battery_level.map(AttributeValue::Int));
            }
        }
        out
    }
}

fn set<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(value) if slot.as_ref() != Some(&value) => {
            *slot = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_category_of_empty_state() {
        for category in DeviceCategory::ALL {
            assert_eq!(RemoteState::empty(category).category(), category);
        }
    }

    #[test]
    fn should_apply_string_encoded_lock_attribute() {
        let mut state = RemoteState::empty(DeviceCategory::Lock);
        assert!(state.apply(LOCKED, &AttributeValue::from("true")));
        assert_eq!(
            state,
            RemoteState::Lock(LockState {
                locked: Some(true),
                battery_level: None,
            })
        );
    }

    #[test]
    fn should_report_no_change_when_value_is_identical() {
        let mut state = RemoteState::empty(DeviceCategory::Thermostat);
        assert!(state.apply(MODE, &AttributeValue::from("heat")));
        assert!(!state.apply(MODE, &AttributeValue::from("heat")));
    }

    #[test]
    fn should_ignore_attributes_of_other_categories() {
        let mut state = RemoteState::empty(DeviceCategory::Lock);
        assert!(!state.apply(MODE, &AttributeValue::from("heat")));
        assert!(state.attributes().is_empty());
    }

    #[test]
    fn should_ignore_values_of_the_wrong_shape() {
        let mut state = RemoteState::empty(DeviceCategory::Thermostat);
        assert!(!state.apply(COOLING_SETPOINT, &AttributeValue::from("warm")));
    }

    #[test]
    fn should_render_applied_thermostat_attributes() {
        let mut state = RemoteState::empty(DeviceCategory::Thermostat);
        state.apply(COOLING_SETPOINT, &AttributeValue::Int(72));
        state.apply(FAN_MODE, &AttributeValue::from("auto"));

        let attrs = state.attributes();
        assert_eq!(attrs.get(COOLING_SETPOINT), Some(&AttributeValue::Float(72.0)));
        assert_eq!(attrs.get(FAN_MODE), Some(&AttributeValue::from("auto")));
        assert_eq!(attrs.len(), 2);
    }
}
