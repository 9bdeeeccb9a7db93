//! Virtual lock — responds to `locked` writes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::device::{AttributeChange, DeviceCategory, ONLINE, RemoteDevice, state};
use rentbridge_domain::id::RemoteDeviceId;

use crate::error::VirtualError;

/// A simulated door lock. Starts locked with a full battery.
pub struct VirtualLock {
    device: Mutex<RemoteDevice>,
}

impl VirtualLock {
    #[must_use]
    pub fn new(id: RemoteDeviceId, name: &str) -> Self {
        let device = RemoteDevice::new(id, name, DeviceCategory::Lock)
            .with_attribute(ONLINE, true)
            .with_attribute(state::LOCKED, true)
            .with_attribute(state::BATTERY_LEVEL, 100_i64);
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
    /// Returns [`VirtualError::UnsupportedCommand`] for anything but a lock
    /// write.
    pub fn handle_command(&self, command: &RemoteCommand) -> Result<Vec<AttributeChange>, VirtualError> {
        let mut device = self.device();
        match command {
            RemoteCommand::SetLocked(locked) => {
                let change = AttributeChange::new(state::LOCKED, *locked);
                device.apply_attribute(&change.name, &change.value);
                Ok(vec![change])
            }
            other => Err(VirtualError::UnsupportedCommand {
                device: device.id,
                command: other.attribute().0,
            }),
        }
    }
}
