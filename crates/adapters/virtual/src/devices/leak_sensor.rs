//! Virtual leak sensor — read-only; leaks are simulated through the account.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::device::{AttributeChange, DeviceCategory, ONLINE, RemoteDevice, state};
use rentbridge_domain::id::RemoteDeviceId;

use crate::error::VirtualError;

/// A simulated water leak sensor. Starts dry.
pub struct VirtualLeakSensor {
    device: Mutex<RemoteDevice>,
}

impl VirtualLeakSensor {
    #[must_use]
    pub fn new(id: RemoteDeviceId, name: &str) -> Self {
        let device = RemoteDevice::new(id, name, DeviceCategory::LeakSensor)
            .with_attribute(ONLINE, true)
            .with_attribute(state::LEAK, false)
            .with_attribute(state::BATTERY_LEVEL, 90_i64);
        Self {
            device: Mutex::new(device),
        }
    }

    pub(crate) fn device(&self) -> MutexGuard<'_, RemoteDevice> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sensors accept no writes.
    ///
    /// # Errors
    ///
    /// Always returns [`VirtualError::UnsupportedCommand`].
    pub fn handle_command(&self, command: &RemoteCommand) -> Result<Vec<AttributeChange>, VirtualError> {
        Err(VirtualError::UnsupportedCommand {
            device: self.device().id,
            command: command.attribute().0,
        })
    }
}
