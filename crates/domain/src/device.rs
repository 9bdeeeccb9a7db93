//! Remote device — a device as known to the remote API.
//!
//! A [`RemoteDevice`] is a snapshot: the remote session owns the live copy in
//! its directory and hands out clones. Every merged change bumps
//! [`revision`](RemoteDevice::revision), which lets consumers discard
//! snapshots older than one they already applied.

mod attribute_value;
mod category;
pub mod state;

pub use attribute_value::AttributeValue;
pub use category::{DeviceCategory, UnknownCategory};
pub use state::{
    BinarySwitchState, LeakSensorState, LockState, MotionSensorState, MultilevelSwitchState,
    RemoteState, ThermostatState,
};

use std::collections::BTreeMap;

use crate::id::RemoteDeviceId;

/// Attribute name carrying the connectivity flag.
pub const ONLINE: &str = "online";

/// A remote device snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDevice {
    pub id: RemoteDeviceId,
    pub name: String,
    pub online: bool,
    pub revision: u64,
    pub state: RemoteState,
}

impl RemoteDevice {
    /// A device with no known attributes.
    #[must_use]
    pub fn new(id: RemoteDeviceId, name: impl Into<String>, category: DeviceCategory) -> Self {
        Self {
            id,
            name: name.into(),
            online: false,
            revision: 0,
            state: RemoteState::empty(category),
        }
    }

    #[must_use]
    pub fn category(&self) -> DeviceCategory {
        self.state.category()
    }

    /// Builder-style helper to seed an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.apply_attribute(name, &value.into());
        self
    }

    /// Fold one wire attribute into the snapshot, bumping the revision if
    /// anything changed.
    pub fn apply_attribute(&mut self, name: &str, value: &AttributeValue) -> bool {
        let changed = if name == ONLINE {
            match value.as_bool() {
                Some(online) if online != self.online => {
                    self.online = online;
                    true
                }
                _ => false,
            }
        } else {
            self.state.apply(name, value)
        };
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Apply every change in `update` and return whether any took effect.
    pub fn apply_update(&mut self, update: &DeviceUpdate) -> bool {
        update
            .changes
            .iter()
            .fold(false, |changed, change| {
                self.apply_attribute(&change.name, &change.value) || changed
            })
    }

    /// Replace the contents with a freshly fetched snapshot.
    ///
    /// The revision keeps counting from the current one so it stays monotonic.
    pub fn merge_snapshot(&mut self, fresh: RemoteDevice) -> bool {
        let changed =
            self.name != fresh.name || self.online != fresh.online || self.state != fresh.state;
        if changed {
            self.name = fresh.name;
            self.online = fresh.online;
            self.state = fresh.state;
            self.revision += 1;
        }
        changed
    }

    /// All known attributes, including `online`, keyed by wire name.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&'static str, AttributeValue> {
        let mut attrs = self.state.attributes();
        attrs.insert(ONLINE, AttributeValue::Bool(self.online));
        attrs
    }
}

/// One attribute change pushed by the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub value: AttributeValue,
}

impl AttributeChange {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A push notification: changes to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub device_id: RemoteDeviceId,
    pub changes: Vec<AttributeChange>,
}

impl DeviceUpdate {
    #[must_use]
    pub fn new(device_id: RemoteDeviceId, changes: Vec<AttributeChange>) -> Self {
        Self { device_id, changes }
    }

    /// A notification carrying a single change.
    #[must_use]
    pub fn single(
        device_id: RemoteDeviceId,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        Self::new(device_id, vec![AttributeChange::new(name, value)])
    }
}
