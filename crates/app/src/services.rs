//! Application services — binding resolution, state synchronization and
//! command dispatch.

pub mod binding;
pub mod dispatcher;
pub mod synchronizer;

pub use binding::BindingResolver;
pub use dispatcher::{ActionDispatcher, Planned};
