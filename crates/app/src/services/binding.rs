//! Binding resolver — finds the remote device a local device represents.

use std::sync::Arc;

use rentbridge_domain::device::RemoteDevice;
use rentbridge_domain::error::{CategoryMismatchError, RentBridgeError, UnboundDeviceError};
use rentbridge_domain::local::LocalDevice;

use crate::ports::RemoteApi;
use crate::session::RemoteSession;

/// Resolves local devices against the session's directory.
pub struct BindingResolver<A> {
    session: Arc<RemoteSession<A>>,
}

impl<A> Clone for BindingResolver<A> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<A: RemoteApi> BindingResolver<A> {
    pub fn new(session: Arc<RemoteSession<A>>) -> Self {
        Self { session }
    }

    /// Snapshot of the remote device `local` is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`UnboundDeviceError::Missing`] when the binding property is
    /// absent or invalid, and [`UnboundDeviceError::NotFound`] when the
    /// identifier is not in the directory.
    pub fn resolve(&self, local: &LocalDevice) -> Result<RemoteDevice, UnboundDeviceError> {
        let remote = local
            .binding()
            .ok_or(UnboundDeviceError::Missing { local: local.id() })?;
        self.session
            .device(remote)
            .ok_or(UnboundDeviceError::NotFound {
                local: local.id(),
                remote,
            })
    }

    /// Like [`resolve`](Self::resolve), and also require a remote category
    /// the local device's kind can represent.
    ///
    /// # Errors
    ///
    /// Returns [`RentBridgeError::UnboundDevice`] or
    /// [`RentBridgeError::CategoryMismatch`].
    pub fn resolve_compatible(&self, local: &LocalDevice) -> Result<RemoteDevice, RentBridgeError> {
        let remote = self.resolve(local)?;
        if !local.kind().accepts(remote.category()) {
            return Err(CategoryMismatchError {
                kind: local.kind(),
                category: remote.category(),
            }
            .into());
        }
        Ok(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use rentbridge_domain::device::DeviceCategory;
    use rentbridge_domain::id::{LocalDeviceId, RemoteDeviceId};
    use rentbridge_domain::local::{BINDING_PROP, LocalDeviceKind};

    fn resolver() -> BindingResolver<FakeApi> {
        let devices = vec![
            RemoteDevice::new(RemoteDeviceId::new(1), "Front Door", DeviceCategory::Lock),
            RemoteDevice::new(RemoteDeviceId::new(2), "Hall", DeviceCategory::Thermostat),
        ];
        let session = RemoteSession::with_devices(FakeApi::with_devices(devices.clone()), devices);
        BindingResolver::new(Arc::new(session))
    }

    fn local(kind: LocalDeviceKind, binding: &str) -> LocalDevice {
        LocalDevice::builder()
            .id(7)
            .kind(kind)
            .prop(BINDING_PROP, binding)
            .build()
    }

    #[test]
    fn should_resolve_bound_device() {
        let remote = resolver().resolve(&local(LocalDeviceKind::Lock, "1")).unwrap();
        assert_eq!(remote.id, RemoteDeviceId::new(1));
    }

    #[test]
    fn should_fail_when_binding_is_missing() {
        let err = resolver()
            .resolve(&LocalDevice::builder().id(7).build())
            .unwrap_err();
        assert!(matches!(err, UnboundDeviceError::Missing { .. }));
    }

    #[test]
    fn should_fail_when_bound_device_is_unknown() {
        let err = resolver()
            .resolve(&local(LocalDeviceKind::Lock, "404"))
            .unwrap_err();
        assert_eq!(
            err,
            UnboundDeviceError::NotFound {
                local: LocalDeviceId::new(7),
                remote: RemoteDeviceId::new(404),
            }
        );
    }

    #[test]
    fn should_reject_incompatible_category() {
        let err = resolver()
            .resolve_compatible(&local(LocalDeviceKind::Thermostat, "1"))
            .unwrap_err();
        assert!(matches!(err, RentBridgeError::CategoryMismatch(_)));
    }

    #[test]
    fn should_let_sensor_kind_bind_to_any_category() {
        let remote = resolver()
            .resolve_compatible(&local(LocalDeviceKind::Sensor, "2"))
            .unwrap();
        assert_eq!(remote.category(), DeviceCategory::Thermostat);
    }
}
