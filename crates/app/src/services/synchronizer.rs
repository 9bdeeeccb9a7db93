//! State synchronizer — mirrors a remote snapshot onto a local device.
//!
//! | Remote attribute   | Local state          | Kinds      |
//! |--------------------|----------------------|------------|
//! | `online`           | `online`             | all        |
//! | `battery_level`    | `batteryLevel`       | lock       |
//! | `locked`           | `onOffState`, `lockStatus`, image | lock |
//! | `current_humidity` | `humidityInput1`     | thermostat |
//! | `operating_state`  | `hvacCoolerIsOn`, `hvacHeaterIsOn` | thermostat |
//! | `fan_mode`         | `hvacFanMode`        | thermostat |
//! | `mode`             | `hvacOperationMode`  | thermostat |
//! | `cooling_setpoint` | `setpointCool`       | thermostat |
//! | `heating_setpoint` | `setpointHeat`       | thermostat |
//! | `current_temp`     | `temperatureInput1`  | thermostat |

use rentbridge_domain::device::{LockState, RemoteDevice, RemoteState, ThermostatState};
use rentbridge_domain::error::CategoryMismatchError;
use rentbridge_domain::hvac::{FanMode, HvacMode};
use rentbridge_domain::local::{LocalDevice, LocalDeviceKind, StateImage, StateUpdate, state};

/// Translate `remote` into the state update for `local`.
///
/// Attributes the remote has not reported yet are left out, so they keep
/// their previous local value.
///
/// # Errors
///
/// Returns [`CategoryMismatchError`] when a lock or thermostat is bound to a
/// remote device of another category.
pub fn build_update(
    local: &LocalDevice,
    remote: &RemoteDevice,
) -> Result<StateUpdate, CategoryMismatchError> {
    let mut update = StateUpdate::from_source(remote.id, remote.revision);
    update.set(state::ONLINE, remote.online);

    match (local.kind(), &remote.state) {
        (LocalDeviceKind::Lock, RemoteState::Lock(lock)) => lock_fields(&mut update, lock),
        (LocalDeviceKind::Thermostat, RemoteState::Thermostat(thermostat)) => {
            thermostat_fields(&mut update, thermostat, local);
        }
        (LocalDeviceKind::Sensor, _) => {}
        (
            kind @ (LocalDeviceKind::Lock | LocalDeviceKind::Thermostat),
            RemoteState::Lock(_)
            | RemoteState::Thermostat(_)
            | RemoteState::LeakSensor(_)
            | RemoteState::BinarySwitch(_)
            | RemoteState::MultilevelSwitch(_)
            | RemoteState::MotionSensor(_),
        ) => {
            return Err(CategoryMismatchError {
                kind,
                category: remote.category(),
            });
        }
    }
    Ok(update)
}

/// Build the update for `local` from `remote` and apply it in one step.
///
/// Returns `Ok(false)` when the snapshot is older than one already applied.
///
/// # Errors
///
/// Returns [`CategoryMismatchError`] without touching the device when the
/// categories do not match.
#[tracing::instrument(skip_all, fields(device = %local.name(), remote_id = %remote.id, revision = remote.revision))]
pub fn sync(local: &LocalDevice, remote: &RemoteDevice) -> Result<bool, CategoryMismatchError> {
    let update = build_update(local, remote)?;
    let applied = local.apply(&update);
    if applied {
        tracing::debug!(fields = update.entries.len(), "state synchronized");
    } else {
        tracing::debug!("stale snapshot ignored");
    }
    Ok(applied)
}

fn lock_fields(update: &mut StateUpdate, lock: &LockState) {
    update.set_opt(state::BATTERY_LEVEL, lock.battery_level);
    if let Some(locked) = lock.locked {
        update.set(state::ON_OFF_STATE, locked);
        if locked {
            update
                .set_with_ui(state::LOCK_STATUS, "locked", "Locked")
                .image(StateImage::Locked);
        } else {
            update
                .set_with_ui(state::LOCK_STATUS, "unlocked", "Unlocked")
                .image(StateImage::Unlocked);
        }
    }
}

fn thermostat_fields(update: &mut StateUpdate, thermostat: &ThermostatState, local: &LocalDevice) {
    let operating = thermostat.operating_state.as_deref();
    update
        .set_opt(state::HUMIDITY_INPUT, thermostat.current_humidity)
        .set(state::HVAC_COOLER_IS_ON, operating == Some("cooling"))
        .set(state::HVAC_HEATER_IS_ON, operating == Some("heating"));

    if let Some(remote) = thermostat.fan_mode.as_deref() {
        match FanMode::from_remote(remote) {
            Some(mode) => {
                update.set(state::HVAC_FAN_MODE, mode.as_str());
            }
            None => tracing::warn!(device = %local.name(), fan_mode = remote, "unknown remote fan mode"),
        }
    }
    if let Some(remote) = thermostat.mode.as_deref() {
        match HvacMode::from_remote(remote) {
            Some(mode) => {
                update.set(state::HVAC_OPERATION_MODE, mode.as_str());
            }
            None => tracing::warn!(device = %local.name(), mode = remote, "unknown remote hvac mode"),
        }
    }

    update
        .set_opt(state::SETPOINT_COOL, thermostat.cooling_setpoint)
        .set_opt(state::SETPOINT_HEAT, thermostat.heating_setpoint)
        .set_opt(state::TEMPERATURE_INPUT, thermostat.current_temp);
}
