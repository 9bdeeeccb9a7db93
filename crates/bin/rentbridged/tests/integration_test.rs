//! End-to-end tests for the full bridge stack.
//!
//! Each test wires a real `Bridge` (background executor, session, resolver,
//! synchronizer, dispatcher) to the virtual adapter's demo account. Changes
//! made on the account come back through the same push path the real API
//! uses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rentbridge_adapter_virtual::{
    DEMO_LEAK_SENSOR, DEMO_LOCK, DEMO_THERMOSTAT, VirtualAccount, VirtualAuthenticator,
};
use rentbridge_app::ports::Credentials;
use rentbridge_app::services::Planned;
use rentbridge_app::{
    ActionError, Bridge, DeviceOption, LockAction, LogLevel, Preferences, StartupError,
    ThermostatAction, UniversalAction,
};
use rentbridge_domain::command::RemoteCommand;
use rentbridge_domain::credential::SharedSecret;
use rentbridge_domain::device::{AttributeChange, DeviceUpdate, state as remote_state};
use rentbridge_domain::error::{AuthenticationError, RentBridgeError};
use rentbridge_domain::hvac::HvacMode;
use rentbridge_domain::id::RemoteDeviceId;
use rentbridge_domain::local::{LocalDevice, LocalDeviceKind, StateValue, state};

const EMAIL: &str = "demo@example.com";
const PASSWORD: &str = "demo";
const SECRET: &str = "JBSWY3DPEHPK3PXP";

fn preferences(password: &str) -> Preferences {
    Preferences {
        email: EMAIL.to_string(),
        password: password.to_string(),
        tfa_secret: SECRET.to_string(),
        log_level: LogLevel::Debug,
    }
}

fn account() -> Arc<VirtualAccount> {
    let secret = SharedSecret::parse(SECRET).unwrap();
    Arc::new(VirtualAccount::demo(Credentials::new(EMAIL, PASSWORD), &secret).unwrap())
}

/// A connected bridge plus the account behind it.
fn connected() -> (Bridge<VirtualAuthenticator>, Arc<VirtualAccount>) {
    let account = account();
    let mut bridge = Bridge::new(
        VirtualAuthenticator::new(Arc::clone(&account)),
        preferences(PASSWORD),
    );
    bridge.startup().unwrap();
    (bridge, account)
}

fn local(id: u64, name: &str, kind: LocalDeviceKind, binding: RemoteDeviceId) -> Arc<LocalDevice> {
    Arc::new(
        LocalDevice::builder()
            .id(id)
            .name(name)
            .kind(kind)
            .binding(binding)
            .build(),
    )
}

fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn should_seed_started_lock_from_remote_state() {
    let (mut bridge, _account) = connected();
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);

    assert!(bridge.device_start_comm(&door));

    assert_eq!(door.state(state::ON_OFF_STATE), Some(StateValue::Bool(true)));
    assert_eq!(door.state(state::LOCK_STATUS), Some(StateValue::from("locked")));
    assert_eq!(door.state(state::BATTERY_LEVEL), Some(StateValue::Int(100)));
    assert_eq!(door.state(state::ONLINE), Some(StateValue::Bool(true)));
}

#[test]
fn should_seed_started_thermostat_from_remote_state() {
    let (mut bridge, _account) = connected();
    let hall = local(2, "Hall", LocalDeviceKind::Thermostat, DEMO_THERMOSTAT);

    assert!(bridge.device_start_comm(&hall));

    assert_eq!(hall.state(state::HVAC_OPERATION_MODE), Some(StateValue::from("heat")));
    assert_eq!(hall.state(state::HVAC_FAN_MODE), Some(StateValue::from("auto")));
    assert_eq!(hall.state(state::HVAC_HEATER_IS_ON), Some(StateValue::Bool(true)));
    assert_eq!(hall.state(state::HVAC_COOLER_IS_ON), Some(StateValue::Bool(false)));
    assert_eq!(hall.state(state::SETPOINT_HEAT), Some(StateValue::Float(68.0)));
}

#[test]
fn should_round_trip_lock_command_through_push() {
    let (mut bridge, _account) = connected();
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);
    assert!(bridge.device_start_comm(&door));

    let planned = bridge
        .action_control_device(LockAction::Unlock, &door)
        .unwrap();
    assert_eq!(planned, Planned::Write(DEMO_LOCK, RemoteCommand::SetLocked(false)));

    eventually("the lock to report unlocked", || {
        door.state(state::ON_OFF_STATE) == Some(StateValue::Bool(false))
    });
    assert_eq!(door.state(state::LOCK_STATUS), Some(StateValue::from("unlocked")));

    bridge.action_control_device(LockAction::Toggle, &door).unwrap();
    eventually("the toggle to lock again", || {
        door.state(state::ON_OFF_STATE) == Some(StateValue::Bool(true))
    });
}

#[test]
fn should_apply_relative_setpoint_change() {
    let (mut bridge, _account) = connected();
    let hall = local(2, "Hall", LocalDeviceKind::Thermostat, DEMO_THERMOSTAT);
    assert!(bridge.device_start_comm(&hall));

    bridge
        .action_control_thermostat(ThermostatAction::IncreaseHeatSetpoint(2.0), &hall)
        .unwrap();

    eventually("the heating setpoint to rise", || {
        hall.state(state::SETPOINT_HEAT) == Some(StateValue::Float(70.0))
    });
}

#[test]
fn should_refresh_on_status_request() {
    let (mut bridge, _account) = connected();
    let sink = local(3, "Kitchen Sink", LocalDeviceKind::Sensor, DEMO_LEAK_SENSOR);
    assert!(bridge.device_start_comm(&sink));

    let planned = bridge
        .action_control_universal(UniversalAction::RequestStatus, &sink)
        .unwrap();
    assert_eq!(planned, Planned::Refresh(DEMO_LEAK_SENSOR));
}

#[test]
fn should_refuse_to_start_unbound_device() {
    let (mut bridge, _account) = connected();
    let unbound = Arc::new(
        LocalDevice::builder()
            .id(9)
            .name("Garage")
            .kind(LocalDeviceKind::Lock)
            .build(),
    );
    let dangling = local(10, "Shed", LocalDeviceKind::Lock, RemoteDeviceId::new(4242));

    assert!(!bridge.device_start_comm(&unbound));
    assert!(!bridge.device_start_comm(&dangling));
    assert!(unbound.observed().states.is_empty());
    assert!(dangling.observed().states.is_empty());
}

#[test]
fn should_refuse_lock_bound_to_thermostat() {
    let (mut bridge, _account) = connected();
    let wrong = local(11, "Confused", LocalDeviceKind::Lock, DEMO_THERMOSTAT);

    assert!(!bridge.device_start_comm(&wrong));
    assert!(wrong.observed().states.is_empty());
}

#[test]
fn should_reject_program_mode_without_remote_change() {
    let (mut bridge, _account) = connected();
    let hall = local(2, "Hall", LocalDeviceKind::Thermostat, DEMO_THERMOSTAT);
    assert!(bridge.device_start_comm(&hall));
    let before = hall.observed();

    let err = bridge
        .action_control_thermostat(ThermostatAction::SetHvacMode(HvacMode::ProgramCool), &hall)
        .unwrap_err();

    assert!(matches!(
        err,
        ActionError::Rejected(RentBridgeError::UnsupportedMode(_))
    ));
    let remote = bridge.session().unwrap().device(DEMO_THERMOSTAT).unwrap();
    assert_eq!(remote.attributes()[remote_state::MODE].as_str(), Some("heat"));
    assert_eq!(hall.observed().states, before.states);
}

#[test]
fn should_keep_concurrent_pushes_per_device() {
    let (mut bridge, account) = connected();
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);
    let hall = local(2, "Hall", LocalDeviceKind::Thermostat, DEMO_THERMOSTAT);
    let sink = local(3, "Kitchen Sink", LocalDeviceKind::Sensor, DEMO_LEAK_SENSOR);
    for device in [&door, &hall, &sink] {
        assert!(bridge.device_start_comm(device));
    }
    // Jobs run in submission order, so this waits for the subscriptions.
    bridge.executor().block_on(async {}).unwrap();

    let writers = vec![
        {
            let account = Arc::clone(&account);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let update = DeviceUpdate::single(DEMO_LOCK, remote_state::LOCKED, i % 2 == 0);
                    account.report(update).unwrap();
                }
            })
        },
        {
            let account = Arc::clone(&account);
            std::thread::spawn(move || {
                for setpoint in 60..=79_i64 {
                    let update = DeviceUpdate::new(
                        DEMO_THERMOSTAT,
                        vec![AttributeChange::new(remote_state::COOLING_SETPOINT, setpoint)],
                    );
                    account.report(update).unwrap();
                }
            })
        },
        {
            let account = Arc::clone(&account);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let update = DeviceUpdate::single(DEMO_LEAK_SENSOR, remote_state::LEAK, i % 2 == 0);
                    account.report(update).unwrap();
                }
            })
        },
    ];
    for writer in writers {
        writer.join().unwrap();
    }

    eventually("the last lock push", || {
        door.state(state::ON_OFF_STATE) == Some(StateValue::Bool(false))
    });
    eventually("the last setpoint push", || {
        hall.state(state::SETPOINT_COOL) == Some(StateValue::Float(79.0))
    });

    assert!(door.state(state::SETPOINT_COOL).is_none());
    assert!(hall.state(state::LOCK_STATUS).is_none());
    let sink_keys: Vec<&str> = sink.observed().states.keys().copied().collect();
    assert_eq!(sink_keys, vec![state::ONLINE]);
}

#[test]
fn should_not_let_refresh_overwrite_newer_push_on_same_device() {
    let (mut bridge, account) = connected();
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);
    assert!(bridge.device_start_comm(&door));
    bridge.executor().block_on(async {}).unwrap();
    let session = Arc::clone(bridge.session().unwrap());

    let refresher = {
        let executor = Arc::clone(bridge.executor());
        let session = Arc::clone(&session);
        std::thread::spawn(move || {
            for _ in 0..50 {
                let session = Arc::clone(&session);
                executor
                    .block_on(async move { session.refresh_device(DEMO_LOCK).await })
                    .unwrap()
                    .unwrap();
            }
        })
    };
    let reporter = {
        let account = Arc::clone(&account);
        std::thread::spawn(move || {
            for i in 0..100 {
                let update = DeviceUpdate::single(DEMO_LOCK, remote_state::LOCKED, i % 2 == 0);
                account.report(update).unwrap();
            }
        })
    };
    reporter.join().unwrap();
    refresher.join().unwrap();

    let remote = session.device(DEMO_LOCK).unwrap();
    assert_eq!(remote.attributes()[remote_state::LOCKED].as_bool(), Some(false));
    assert_eq!(door.state(state::ON_OFF_STATE), Some(StateValue::Bool(false)));
    assert_eq!(door.observed().last_source.unwrap().revision, remote.revision);
}

#[test]
fn should_stay_disabled_after_rejected_login() {
    let account = account();
    let mut bridge = Bridge::new(VirtualAuthenticator::new(account), preferences("wrong"));

    let err = bridge.startup().unwrap_err();

    assert!(matches!(
        err,
        StartupError::Authentication(AuthenticationError::InvalidCredentials)
    ));
    assert!(!bridge.is_connected());
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);
    assert!(!bridge.device_start_comm(&door));
    assert!(matches!(
        bridge.action_control_device(LockAction::Lock, &door),
        Err(ActionError::NotConnected)
    ));
    assert_eq!(
        bridge.device_options(""),
        vec![DeviceOption::Disabled(rentbridge_app::bridge::NO_CONNECTION)]
    );
}

#[test]
fn should_list_device_options_by_category() {
    let (bridge, _account) = connected();

    let locks = bridge.device_options("lock");
    assert_eq!(
        locks,
        vec![DeviceOption::Device {
            id: DEMO_LOCK,
            name: "Front Door".to_string()
        }]
    );

    let names: Vec<String> = bridge
        .device_options("leak_sensor, thermostat")
        .into_iter()
        .filter_map(|option| match option {
            DeviceOption::Device { name, .. } => Some(name),
            DeviceOption::Disabled(_) => None,
        })
        .collect();
    assert_eq!(names, vec!["Hallway Thermostat", "Kitchen Sink"]);

    assert_eq!(
        bridge.device_options("motion_sensor"),
        vec![DeviceOption::Disabled(rentbridge_app::bridge::NO_DEVICES)]
    );
}

#[test]
fn should_stop_mirroring_after_shutdown() {
    let (mut bridge, account) = connected();
    let door = local(1, "Front Door", LocalDeviceKind::Lock, DEMO_LOCK);
    assert!(bridge.device_start_comm(&door));
    bridge.executor().block_on(async {}).unwrap();

    bridge.shutdown();
    account
        .report(DeviceUpdate::single(DEMO_LOCK, remote_state::LOCKED, false))
        .unwrap();

    assert!(!bridge.is_connected());
    assert_eq!(door.state(state::ON_OFF_STATE), Some(StateValue::Bool(true)));
}
