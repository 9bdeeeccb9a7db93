//! Host-side HVAC enumerations and their mapping to remote mode strings.
//!
//! | Remote `mode` | [`HvacMode`] |      | Remote `fan_mode` | [`FanMode`] |
//! |---------------|--------------|------|-------------------|-------------|
//! | `cool`        | `Cool`       |      | `on`              | `AlwaysOn`  |
//! | `heat`        | `Heat`       |      | `auto`            | `Auto`      |
//! | `auto`        | `HeatCool`   |      |                   |             |
//! | `off`         | `Off`        |      |                   |             |
//!
//! The host also knows schedule-driven "program" modes; those have no remote
//! counterpart and map to `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Thermostat operation mode as the host names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    ProgramHeat,
    ProgramCool,
    ProgramHeatCool,
}

impl HvacMode {
    /// Map a remote `mode` string.
    #[must_use]
    pub fn from_remote(mode: &str) -> Option<Self> {
        match mode {
            "cool" => Some(Self::Cool),
            "heat" => Some(Self::Heat),
            "auto" => Some(Self::HeatCool),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// The remote `mode` string, if the remote API supports this mode.
    #[must_use]
    pub fn to_remote(self) -> Option<&'static str> {
        match self {
            Self::Cool => Some("cool"),
            Self::Heat => Some("heat"),
            Self::HeatCool => Some("auto"),
            Self::Off => Some("off"),
            Self::ProgramHeat | Self::ProgramCool | Self::ProgramHeatCool => None,
        }
    }

    /// Value written to the `hvacOperationMode` state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::HeatCool => "heatCool",
            Self::ProgramHeat => "programHeat",
            Self::ProgramCool => "programCool",
            Self::ProgramHeatCool => "programHeatCool",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thermostat fan mode as the host names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FanMode {
    Auto,
    AlwaysOn,
}

impl FanMode {
    /// Map a remote `fan_mode` string.
    #[must_use]
    pub fn from_remote(mode: &str) -> Option<Self> {
        match mode {
            "on" => Some(Self::AlwaysOn),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    /// The remote `fan_mode` string.
    #[must_use]
    pub fn to_remote(self) -> &'static str {
        match self {
            Self::AlwaysOn => "on",
            Self::Auto => "auto",
        }
    }

    /// Value written to the `hvacFanMode` state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::AlwaysOn => "alwaysOn",
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
