//! Virtual device implementations — lock, thermostat, leak sensor.
//!
//! Each virtual device keeps its state as a [`RemoteDevice`] so that
//! listings and fetches hand out exactly what the real API would.

mod leak_sensor;
mod lock;
mod thermostat;

pub use leak_sensor::VirtualLeakSensor;
pub use lock::VirtualLock;
pub use thermostat::VirtualThermostat;

use std::sync::MutexGuard;

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::device::{AttributeChange, RemoteDevice};
use rentbridge_domain::id::RemoteDeviceId;

use crate::error::VirtualError;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Lock(VirtualLock),
    Thermostat(VirtualThermostat),
    LeakSensor(VirtualLeakSensor),
}

impl VirtualDevice {
    #[must_use]
    pub fn id(&self) -> RemoteDeviceId {
        self.device().id
    }

    /// Current state, as a listing or fetch would return it.
    #[must_use]
    pub fn snapshot(&self) -> RemoteDevice {
        self.device().clone()
    }

    /// Handle a write, returning the attribute changes to push.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualError::UnsupportedCommand`] if the device refuses it.
    pub fn handle_command(
        &self,
        command: &RemoteCommand,
    ) -> Result<Vec<AttributeChange>, VirtualError> {
        match self {
            Self::Lock(d) => d.handle_command(command),
            Self::Thermostat(d) => d.handle_command(command),
            Self::LeakSensor(d) => d.handle_command(command),
        }
    }

    /// Simulate a change made outside the API (a key turned, a leak, the
    /// room warming up). Returns the changes that took effect.
    pub fn report(&self, changes: Vec<AttributeChange>) -> Vec<AttributeChange> {
        let mut device = self.device();
        changes
            .into_iter()
            .filter(|change| device.apply_attribute(&change.name, &change.value))
            .collect()
    }

    fn device(&self) -> MutexGuard<'_, RemoteDevice> {
        match self {
            Self::Lock(d) => d.device(),
            Self::Thermostat(d) => d.device(),
            Self::LeakSensor(d) => d.device(),
        }
    }
}

impl From<VirtualLock> for VirtualDevice {
    fn from(device: VirtualLock) -> Self {
        Self::Lock(device)
    }
}

impl From<VirtualThermostat> for VirtualDevice {
    fn from(device: VirtualThermostat) -> Self {
        Self::Thermostat(device)
    }
}

impl From<VirtualLeakSensor> for VirtualDevice {
    fn from(device: VirtualLeakSensor) -> Self {
        Self::LeakSensor(device)
    }
}
