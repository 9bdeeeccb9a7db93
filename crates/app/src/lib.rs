//! # rentbridge-app
//!
//! Application layer — the bridge between a synchronous host and an
//! asynchronous remote API.
//!
//! ## Responsibilities
//! - Define **port traits** that remote adapters implement:
//!   - `Authenticator` — open a session with credentials and a one-time code
//!   - `RemoteApi` — list, fetch, command and subscribe to remote devices
//! - Run asynchronous work off the host thread (`BackgroundExecutor`)
//! - Own the **remote session** and its device directory (`RemoteSession`)
//! - Provide the use-cases:
//!   - `BindingResolver` — local device to remote device
//!   - `synchronizer` — remote snapshot to local state
//!   - `ActionDispatcher` — host command to remote call
//! - Expose the host callbacks as one object (`Bridge`)
//!
//! ## Dependency rule
//! Depends on `rentbridge-domain` only (plus `tokio` for the worker runtime).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bridge;
pub mod executor;
pub mod ports;
pub mod preferences;
pub mod services;
pub mod session;

#[cfg(test)]
mod testing;

pub use bridge::{
    ActionError, Bridge, DeviceOption, LockAction, StartupError, ThermostatAction, UniversalAction,
};
pub use executor::{BackgroundExecutor, ExecutorError, ExecutorState, PendingOperation};
pub use preferences::{FieldErrors, LogLevel, Preferences};
pub use session::{RemoteSession, UpdateCallback};
