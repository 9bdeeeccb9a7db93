//! Local device — a device record owned by the host.
//!
//! The host creates and destroys these; the bridge only writes their
//! observable state. All writes go through [`LocalDevice::apply`], which takes
//! the device's lock once per [`StateUpdate`], so a reader never sees half of
//! an update.

pub mod state;

pub use state::{StateEntry, StateImage, StateUpdate, StateValue, StateVector, UpdateSource};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::device::DeviceCategory;
use crate::id::{LocalDeviceId, RemoteDeviceId};
use crate::time::{Timestamp, now};

/// Plugin property holding the bound remote device identifier.
pub const BINDING_PROP: &str = "smartrent-device";

/// Device type the host declared for a local device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalDeviceKind {
    Lock,
    Thermostat,
    /// Any other remote category; only connectivity is mirrored.
    Sensor,
}

impl LocalDeviceKind {
    /// Whether a remote device of `category` can back this kind.
    #[must_use]
    pub fn accepts(self, category: DeviceCategory) -> bool {
        match self {
            Self::Lock => category == DeviceCategory::Lock,
            Self::Thermostat => category == DeviceCategory::Thermostat,
            Self::Sensor => true,
        }
    }
}

impl fmt::Display for LocalDeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => f.write_str("lock"),
            Self::Thermostat => f.write_str("thermostat"),
            Self::Sensor => f.write_str("sensor"),
        }
    }
}

/// What a reader sees of a device's observable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observed {
    pub states: StateVector,
    pub image: Option<StateImage>,
    pub last_source: Option<UpdateSource>,
    pub last_updated: Option<Timestamp>,
}

impl Observed {
    /// Value of `key`, if set.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&StateValue> {
        self.states.get(key).map(|entry| &entry.value)
    }
}

/// A host device record.
#[derive(Debug)]
pub struct LocalDevice {
    id: LocalDeviceId,
    name: String,
    kind: LocalDeviceKind,
    props: BTreeMap<String, String>,
    observed: Mutex<Observed>,
}

impl LocalDevice {
    /// Create a builder for constructing a [`LocalDevice`].
    #[must_use]
    pub fn builder() -> LocalDeviceBuilder {
        LocalDeviceBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> LocalDeviceId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> LocalDeviceKind {
        self.kind
    }

    /// A plugin property.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// The remote device this record is configured to represent.
    ///
    /// `None` when the property is unset, blank, `0` or not numeric.
    #[must_use]
    pub fn binding(&self) -> Option<RemoteDeviceId> {
        self.prop(BINDING_PROP)
            .and_then(|raw| raw.parse::<RemoteDeviceId>().ok())
            .filter(|id| id.get() != 0)
    }

    /// Apply `update` atomically.
    ///
    /// An update derived from an older revision of the same remote device than
    /// the last one applied is dropped; returns whether the update was applied.
    pub fn apply(&self, update: &StateUpdate) -> bool {
        let mut observed = self.lock();
        if let (Some(incoming), Some(last)) = (update.source, observed.last_source) {
            if incoming.remote == last.remote && incoming.revision < last.revision {
                return false;
            }
        }
        for entry in &update.entries {
            observed.states.insert(entry.key, entry.clone());
        }
        if let Some(image) = update.image {
            observed.image = Some(image);
        }
        if update.source.is_some() {
            observed.last_source = update.source;
        }
        observed.last_updated = Some(now());
        true
    }

    /// Consistent copy of the observable state.
    #[must_use]
    pub fn observed(&self) -> Observed {
        self.lock().clone()
    }

    /// Current value of one state field.
    #[must_use]
    pub fn state(&self, key: &str) -> Option<StateValue> {
        self.lock().value(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Step-by-step builder for [`LocalDevice`].
#[derive(Debug)]
pub struct LocalDeviceBuilder {
    id: LocalDeviceId,
    name: String,
    kind: LocalDeviceKind,
    props: BTreeMap<String, String>,
}

impl Default for LocalDeviceBuilder {
    fn default() -> Self {
        Self {
            id: LocalDeviceId::new(0),
            name: String::new(),
            kind: LocalDeviceKind::Sensor,
            props: BTreeMap::new(),
        }
    }
}

impl LocalDeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: u64) -> Self {
        self.id = LocalDeviceId::new(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: LocalDeviceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Shorthand for setting [`BINDING_PROP`].
    #[must_use]
    pub fn binding(self, remote: RemoteDeviceId) -> Self {
        self.prop(BINDING_PROP, remote.to_string())
    }

    #[must_use]
    pub fn build(self) -> LocalDevice {
        LocalDevice {
            id: self.id,
            name: self.name,
            kind: self.kind,
            props: self.props,
            observed: Mutex::new(Observed::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_device() -> LocalDevice {
        LocalDevice::builder()
            .id(1)
            .name("Front Door")
            .kind(LocalDeviceKind::Lock)
            .binding(RemoteDeviceId::new(42))
            .build()
    }

    #[test]
    fn should_parse_binding_property() {
        assert_eq!(lock_device().binding(), Some(RemoteDeviceId::new(42)));
    }

    #[test]
    fn should_treat_zero_or_garbage_binding_as_unbound() {
        let zero = LocalDevice::builder().prop(BINDING_PROP, "0").build();
        let garbage = LocalDevice::builder().prop(BINDING_PROP, "abc").build();
        let missing = LocalDevice::builder().build();
        assert_eq!(zero.binding(), None);
        assert_eq!(garbage.binding(), None);
        assert_eq!(missing.binding(), None);
    }

    #[test]
    fn should_accept_only_matching_categories_for_typed_kinds() {
        assert!(LocalDeviceKind::Lock.accepts(DeviceCategory::Lock));
        assert!(!LocalDeviceKind::Lock.accepts(DeviceCategory::Thermostat));
        assert!(!LocalDeviceKind::Thermostat.accepts(DeviceCategory::Lock));
        assert!(LocalDeviceKind::Sensor.accepts(DeviceCategory::LeakSensor));
    }

    #[test]
    fn should_apply_all_entries_and_image() {
        let device = lock_device();
        let mut update = StateUpdate::from_source(RemoteDeviceId::new(42), 1);
        update
            .set(state::ONLINE, true)
            .set(state::ON_OFF_STATE, true)
            .image(StateImage::Locked);

        assert!(device.apply(&update));

        let observed = device.observed();
        assert_eq!(observed.value(state::ONLINE), Some(&StateValue::Bool(true)));
        assert_eq!(observed.image, Some(StateImage::Locked));
        assert!(observed.last_updated.is_some());
    }

    #[test]
    fn should_drop_update_from_older_revision() {
        let device = lock_device();
        let remote = RemoteDeviceId::new(42);

        let mut newer = StateUpdate::from_source(remote, 5);
        newer.set(state::ON_OFF_STATE, true);
        let mut older = StateUpdate::from_source(remote, 4);
        older.set(state::ON_OFF_STATE, false);

        assert!(device.apply(&newer));
        assert!(!device.apply(&older));
        assert_eq!(device.state(state::ON_OFF_STATE), Some(StateValue::Bool(true)));
    }

    #[test]
    fn should_reapply_update_of_same_revision() {
        let device = lock_device();
        let mut update = StateUpdate::from_source(RemoteDeviceId::new(42), 3);
        update.set(state::BATTERY_LEVEL, 90_i64);

        assert!(device.apply(&update));
        let first = device.observed().states;
        assert!(device.apply(&update));
        assert_eq!(device.observed().states, first);
    }

    #[test]
    fn should_accept_lower_revision_from_another_remote_device() {
        let device = lock_device();
        let mut first = StateUpdate::from_source(RemoteDeviceId::new(42), 9);
        first.set(state::ONLINE, true);
        let mut rebound = StateUpdate::from_source(RemoteDeviceId::new(43), 1);
        rebound.set(state::ONLINE, false);

        assert!(device.apply(&first));
        assert!(device.apply(&rebound));
        assert_eq!(device.state(state::ONLINE), Some(StateValue::Bool(false)));
    }
}
