//! Tracing subscriber setup with a filter that can be swapped at runtime.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Handle on the installed filter.
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    /// Install the global subscriber with `directive` as its filter.
    pub fn init(directive: &str) -> Self {
        let (filter, handle) = reload::Layer::new(EnvFilter::new(directive));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        Self { handle }
    }

    /// Replace the filter.
    ///
    /// # Errors
    ///
    /// Fails once the subscriber has been dropped.
    pub fn apply(&self, directive: &str) -> Result<(), reload::Error> {
        self.handle.reload(EnvFilter::new(directive))?;
        tracing::info!(filter = directive, "log filter updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn should_change_enabled_levels_without_reinstalling() {
        let (filter, handle) = reload::Layer::new(EnvFilter::new("rentbridge=info"));
        let control = LogControl { handle };
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "rentbridge_app", Level::INFO));
            assert!(!tracing::enabled!(target: "rentbridge_app", Level::DEBUG));

            control.apply("rentbridge=debug").unwrap();
            assert!(tracing::enabled!(target: "rentbridge_app", Level::DEBUG));

            control.apply("rentbridge=warn").unwrap();
            assert!(!tracing::enabled!(target: "rentbridge_app", Level::INFO));
        });
    }
}
