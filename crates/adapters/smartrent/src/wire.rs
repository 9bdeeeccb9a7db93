//! REST payloads and their translation into domain devices.
//!
//! | API `type`            | Category           |
//! |-----------------------|--------------------|
//! | `entry_control`       | lock               |
//! | `thermostat`          | thermostat         |
//! | `sensor_notification` | leak sensor        |
//! | `switch_binary`       | binary switch      |
//! | `switch_multilevel`   | multilevel switch  |
//! | `sensor_binary`       | motion sensor      |

use rentbridge_domain::device::{AttributeValue, DeviceCategory, ONLINE, RemoteDevice, state};
use rentbridge_domain::id::RemoteDeviceId;
use serde::{Deserialize, Serialize};

/// A response body that may or may not be wrapped in `{"data": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Body<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Body<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// `POST /api/v1/sessions` request.
#[derive(Serialize)]
pub(crate) struct SessionRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /api/v1/sessions/tfa` request.
#[derive(Serialize)]
pub(crate) struct TfaRequest<'a, C> {
    pub tfa_api_token: &'a str,
    /// The one-time code, rendered when the body is serialized.
    pub token: &'a C,
}

/// Answer to either login step.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SessionResponse {
    pub access_token: Option<String>,
    pub tfa_api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HubRecord {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AttributeRecord {
    pub name: String,
    pub state: AttributeValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRecord {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub battery_level: Option<i64>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
}

impl DeviceRecord {
    /// The domain device, or `None` for a type the bridge does not model.
    pub(crate) fn into_device(self) -> Option<RemoteDevice> {
        let Some(category) = category_for(&self.kind) else {
            tracing::debug!(remote_id = self.id, kind = %self.kind, "skipping unsupported device type");
            return None;
        };
        let mut device = RemoteDevice::new(RemoteDeviceId::new(self.id), self.name, category);
        device.apply_attribute(ONLINE, &AttributeValue::Bool(self.online));
        if let Some(level) = self.battery_level {
            device.apply_attribute(state::BATTERY_LEVEL, &AttributeValue::Int(level));
        }
        for attribute in &self.attributes {
            device.apply_attribute(&attribute.name, &attribute.state);
        }
        Some(device)
    }
}

/// The category behind an API device `type`.
#[must_use]
pub fn category_for(kind: &str) -> Option<DeviceCategory> {
    match kind {
        "entry_control" => Some(DeviceCategory::Lock),
        "thermostat" => Some(DeviceCategory::Thermostat),
        "sensor_notification" => Some(DeviceCategory::LeakSensor),
        "switch_binary" => Some(DeviceCategory::BinarySwitch),
        "switch_multilevel" => Some(DeviceCategory::MultilevelSwitch),
        "sensor_binary" => Some(DeviceCategory::MotionSensor),
        _ => None,
    }
}
