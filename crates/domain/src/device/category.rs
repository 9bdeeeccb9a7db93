//! The closed set of remote device categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of device exposed by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Lock,
    Thermostat,
    LeakSensor,
    BinarySwitch,
    MultilevelSwitch,
    MotionSensor,
}

impl DeviceCategory {
    /// Every category, in picker order.
    pub const ALL: [Self; 6] = [
        Self::Lock,
        Self::Thermostat,
        Self::BinarySwitch,
        Self::MultilevelSwitch,
        Self::LeakSensor,
        Self::MotionSensor,
    ];

    /// The `snake_case` name used in configuration and filters.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Thermostat => "thermostat",
            Self::LeakSensor => "leak_sensor",
            Self::BinarySwitch => "binary_switch",
            Self::MultilevelSwitch => "multilevel_switch",
            Self::MotionSensor => "motion_sensor",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device category {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for DeviceCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_every_category_from_its_name() {
        for category in DeviceCategory::ALL {
            assert_eq!(category.as_str().parse::<DeviceCategory>(), Ok(category));
        }
    }

    #[test]
    fn should_reject_unknown_category() {
        assert!("doorbell".parse::<DeviceCategory>().is_err());
    }

    #[test]
    fn should_serialize_as_snake_case() {
        let json = serde_json::to_string(&DeviceCategory::LeakSensor).unwrap();
        assert_eq!(json, "\"leak_sensor\"");
    }
}
