//! # rentbridged — rentbridge daemon
//!
//! Composition root that wires an adapter into the bridge and mirrors the
//! configured devices until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize `tracing` from the configured log level
//! - Pick the remote adapter (`smartrent` or `virtual`)
//! - Log in, start every configured device, wait for Ctrl-C, shut down
//! - On SIGHUP, re-read the configuration and apply the new log filter and
//!   preferences without restarting
//!
//! `rentbridged code` prints the one-time code the configured secret
//! produces right now and exits.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use rentbridge_adapter_smartrent::SmartRentAuthenticator;
use rentbridge_adapter_virtual::{VirtualAccount, VirtualAuthenticator};
use rentbridge_app::ports::Authenticator;
use rentbridge_app::{Bridge, DeviceOption};
use rentbridge_domain::credential::SharedSecret;

use crate::config::{Config, RemoteKind};
use crate::logging::LogControl;

/// Why the daemon woke up.
enum Signal {
    Interrupt,
    Reload,
}

fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    let log = LogControl::init(&config.log_filter());

    match std::env::args().nth(1).as_deref() {
        None => {}
        Some("code") => {
            let code = config
                .preferences()
                .preview_code()
                .context("previewing one-time code")?;
            println!("{code}");
            return Ok(());
        }
        Some(other) => anyhow::bail!("unknown command {other:?}, expected `code`"),
    }

    match config.remote.kind {
        RemoteKind::SmartRent => run(
            SmartRentAuthenticator::new(config.smartrent.clone()),
            &config,
            &log,
        ),
        RemoteKind::Virtual => {
            let prefs = config.preferences();
            let secret = SharedSecret::parse(&prefs.tfa_secret).context("demo account secret")?;
            let account = VirtualAccount::demo(prefs.credentials()?, &secret)?;
            tracing::info!("using the virtual demo account");
            run(VirtualAuthenticator::new(Arc::new(account)), &config, &log)
        }
    }
}

fn run<Au: Authenticator>(authenticator: Au, config: &Config, log: &LogControl) -> anyhow::Result<()> {
    let mut bridge = Bridge::new(authenticator, config.preferences());
    if let Err(errors) = Bridge::<Au>::validate_prefs(bridge.preferences()) {
        for (field, message) in errors.iter() {
            tracing::error!(field, message, "invalid preference");
        }
    }
    bridge.startup().context("starting the bridge")?;

    for option in bridge.device_options("") {
        match option {
            DeviceOption::Device { id, name } => {
                tracing::info!(remote_id = %id, %name, "remote device available");
            }
            DeviceOption::Disabled(message) => tracing::warn!("{message}"),
        }
    }

    let devices = config.local_devices();
    let started = devices
        .iter()
        .filter(|device| bridge.device_start_comm(device))
        .count();
    tracing::info!(started, configured = devices.len(), "devices started");

    loop {
        let signal = bridge
            .executor()
            .block_on(next_signal())?
            .context("waiting for signals")?;
        match signal {
            Signal::Interrupt => break,
            Signal::Reload => reload(&mut bridge, log),
        }
    }

    for device in &devices {
        bridge.device_stop_comm(device);
    }
    bridge.shutdown();
    Ok(())
}

/// Apply a fresh configuration file to the running daemon.
///
/// The log filter changes immediately. New credentials are stored and used
/// by the next startup; devices are not restarted.
fn reload<Au: Authenticator>(bridge: &mut Bridge<Au>, log: &LogControl) {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration reload failed, keeping current settings");
            return;
        }
    };
    if let Err(err) = log.apply(&config.log_filter()) {
        tracing::error!(%err, "log filter not updated");
    }
    bridge.set_preferences(config.preferences());
    tracing::info!("configuration reloaded");
}

async fn next_signal() -> std::io::Result<Signal> {
    #[cfg(unix)]
    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
    #[cfg(unix)]
    let hangup = hangup.recv();
    #[cfg(not(unix))]
    let hangup = std::future::pending::<Option<()>>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| Signal::Interrupt),
        _ = hangup => Ok(Signal::Reload),
    }
}
