//! Remote session — the authenticated API plus the device directory.
//!
//! The directory is written from the worker thread (push, refresh, reload) and
//! read from the host's control thread (binding resolution, device pickers).
//! Readers always get owned snapshots. Update callbacks run after the
//! directory lock is released.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::OneTimeCode;
use rentbridge_domain::device::{DeviceCategory, DeviceUpdate, RemoteDevice};
use rentbridge_domain::error::{AuthenticationError, TransportError};
use rentbridge_domain::id::{LocalDeviceId, RemoteDeviceId};

use crate::ports::{Authenticator, Credentials, PushHandler, RemoteApi};

/// Invoked with the latest snapshot whenever a remote device changes.
pub type UpdateCallback = Arc<dyn Fn(&RemoteDevice) + Send + Sync>;

type CallbackTable = BTreeMap<RemoteDeviceId, BTreeMap<LocalDeviceId, UpdateCallback>>;

/// An authenticated remote session and its device directory.
pub struct RemoteSession<A> {
    api: A,
    directory: RwLock<Vec<RemoteDevice>>,
    callbacks: Mutex<CallbackTable>,
    subscribed: Mutex<HashSet<RemoteDeviceId>>,
}

impl<A: RemoteApi> RemoteSession<A> {
    /// Authenticate and load the device directory.
    ///
    /// # Errors
    ///
    /// Every failure, including a failed directory load, is reported as an
    /// [`AuthenticationError`]: without a directory the session is unusable.
    #[tracing::instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login<Au>(
        authenticator: &Au,
        credentials: Credentials,
        code: OneTimeCode,
    ) -> Result<Self, AuthenticationError>
    where
        Au: Authenticator<Api = A>,
    {
        let api = authenticator.login(credentials, code).await?;
        let devices = api.list_devices().await?;
        tracing::info!(devices = devices.len(), "logged in");
        Ok(Self::with_devices(api, devices))
    }

    /// Wrap an already authenticated API with a known directory.
    pub fn with_devices(api: A, devices: Vec<RemoteDevice>) -> Self {
        Self {
            api,
            directory: RwLock::new(devices),
            callbacks: Mutex::new(BTreeMap::new()),
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying API client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Snapshot of every known device, in directory order.
    #[must_use]
    pub fn device_list(&self) -> Vec<RemoteDevice> {
        self.read().clone()
    }

    /// Snapshot of the devices of one category.
    #[must_use]
    pub fn devices_of_category(&self, category: DeviceCategory) -> Vec<RemoteDevice> {
        self.read()
            .iter()
            .filter(|device| device.category() == category)
            .cloned()
            .collect()
    }

    /// Snapshot of one device.
    #[must_use]
    pub fn device(&self, id: RemoteDeviceId) -> Option<RemoteDevice> {
        self.read().iter().find(|device| device.id == id).cloned()
    }

    /// Register `callback` for changes to `remote` on behalf of `subscriber`.
    ///
    /// Several local devices may watch the same remote device; registering
    /// again for the same pair replaces the previous callback.
    pub fn set_update_callback(
        &self,
        remote: RemoteDeviceId,
        subscriber: LocalDeviceId,
        callback: UpdateCallback,
    ) {
        self.lock_callbacks()
            .entry(remote)
            .or_default()
            .insert(subscriber, callback);
    }

    /// Remove the callback `subscriber` registered for `remote`.
    pub fn clear_update_callback(&self, remote: RemoteDeviceId, subscriber: LocalDeviceId) {
        let mut callbacks = self.lock_callbacks();
        if let Some(slot) = callbacks.get_mut(&remote) {
            slot.remove(&subscriber);
            if slot.is_empty() {
                callbacks.remove(&remote);
            }
        }
    }

    /// Remove every callback `subscriber` registered.
    pub fn clear_subscriber(&self, subscriber: LocalDeviceId) {
        let mut callbacks = self.lock_callbacks();
        callbacks.retain(|_, slot| {
            slot.remove(&subscriber);
            !slot.is_empty()
        });
    }

    /// Merge a push notification into the directory and notify watchers.
    ///
    /// Notifications for unknown devices and notifications that change
    /// nothing are ignored.
    pub fn handle_push(&self, update: &DeviceUpdate) {
        let snapshot = {
            let mut directory = self.write();
            let Some(device) = directory.iter_mut().find(|d| d.id == update.device_id) else {
                tracing::debug!(remote_id = %update.device_id, "push for unknown device");
                return;
            };
            if !device.apply_update(update) {
                return;
            }
            device.clone()
        };
        tracing::debug!(remote_id = %snapshot.id, revision = snapshot.revision, "remote device updated");
        self.notify(&snapshot);
    }

    /// Fetch one device, merge it into the directory and notify watchers.
    ///
    /// Watchers are notified even if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the fetch.
    pub async fn refresh_device(&self, id: RemoteDeviceId) -> Result<RemoteDevice, TransportError> {
        let seen = self.device(id).map(|device| device.revision);
        let fresh = self.api.fetch_device(id).await?;
        let (snapshot, _) = self.merge(fresh, seen);
        self.notify(&snapshot);
        Ok(snapshot)
    }

    /// Reload the whole directory.
    ///
    /// Devices that disappeared remotely are kept; their records stay valid
    /// for the lifetime of the session.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the listing.
    pub async fn reload(&self) -> Result<(), TransportError> {
        let seen: BTreeMap<RemoteDeviceId, u64> = self
            .read()
            .iter()
            .map(|device| (device.id, device.revision))
            .collect();
        let devices = self.api.list_devices().await?;
        for fresh in devices {
            let before = seen.get(&fresh.id).copied();
            let (snapshot, changed) = self.merge(fresh, before);
            if changed {
                self.notify(&snapshot);
            }
        }
        Ok(())
    }

    /// Send a write to the remote device.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the call.
    pub async fn send_command(
        &self,
        id: RemoteDeviceId,
        command: RemoteCommand,
    ) -> Result<(), TransportError> {
        self.api.send_command(id, command).await
    }

    /// Ask the transport to deliver push notifications for `id`.
    ///
    /// Subscribing is done once per remote device; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the subscription.
    pub async fn start_updates(self: Arc<Self>, id: RemoteDeviceId) -> Result<(), TransportError> {
        if !self.lock_subscribed().insert(id) {
            return Ok(());
        }
        let session = Arc::downgrade(&self);
        let handler: PushHandler = Arc::new(move |update: DeviceUpdate| {
            if let Some(session) = session.upgrade() {
                session.handle_push(&update);
            }
        });
        if let Err(err) = self.api.subscribe(id, handler).await {
            self.lock_subscribed().remove(&id);
            return Err(err);
        }
        tracing::debug!(remote_id = %id, "subscribed to updates");
        Ok(())
    }

    /// Returns the merged snapshot and whether anything changed.
    ///
    /// `seen` is the revision the directory held when the fetch started. A
    /// record that moved since then already carries a push at least as recent
    /// as `fresh`, so it is kept as is.
    fn merge(&self, fresh: RemoteDevice, seen: Option<u64>) -> (RemoteDevice, bool) {
        let mut directory = self.write();
        let Some(device) = directory.iter_mut().find(|d| d.id == fresh.id) else {
            directory.push(fresh.clone());
            return (fresh, true);
        };
        if seen != Some(device.revision) {
            tracing::debug!(remote_id = %device.id, revision = device.revision, "fetched snapshot superseded by a push");
            return (device.clone(), false);
        }
        let changed = if device.category() == fresh.category() {
            device.merge_snapshot(fresh)
        } else {
            let revision = device.revision + 1;
            *device = RemoteDevice { revision, ..fresh };
            true
        };
        (device.clone(), changed)
    }

    fn notify(&self, snapshot: &RemoteDevice) {
        let callbacks: Vec<UpdateCallback> = self
            .lock_callbacks()
            .get(&snapshot.id)
            .map(|slot| slot.values().cloned().collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(snapshot);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<RemoteDevice>> {
        self.directory.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<RemoteDevice>> {
        self.directory.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, CallbackTable> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribed(&self) -> MutexGuard<'_, HashSet<RemoteDeviceId>> {
        self.subscribed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A> std::fmt::Debug for RemoteSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let devices = self
            .directory
            .read()
            .map_or(0, |directory| directory.len());
        f.debug_struct("RemoteSession")
            .field("devices", &devices)
            .finish_non_exhaustive()
    }
}
