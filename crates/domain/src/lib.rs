//! # rentbridge-domain
//!
//! Pure domain model for the rentbridge host/remote bridge.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define **remote devices** (the remote API's view: category + attributes)
//! - Define **local devices** (the host's records and their observable state)
//! - Define **commands** (host intents and the remote writes they become)
//! - Generate **one-time codes** from the shared secret
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and performs no IO.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod credential;
pub mod device;
pub mod hvac;
pub mod local;
