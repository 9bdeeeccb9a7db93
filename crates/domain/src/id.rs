//! Typed identifier newtypes backed by integers.
//!
//! Both the host and the remote API number their devices with plain
//! integers; the newtypes keep the two spaces from being mixed up.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Access the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of a device on the remote API, stable across reconnects.
    RemoteDeviceId
);

define_id!(
    /// Identifier the host assigned to a [`LocalDevice`](crate::local::LocalDevice).
    LocalDeviceId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = RemoteDeviceId::new(4711);
        let parsed: RemoteDeviceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_trim_whitespace_when_parsing() {
        let parsed: LocalDeviceId = " 12 ".parse().unwrap();
        assert_eq!(parsed.get(), 12);
    }

    #[test]
    fn should_return_error_when_parsing_non_numeric() {
        assert!(RemoteDeviceId::from_str("lock-1").is_err());
    }

    #[test]
    fn should_serialize_as_plain_number() {
        let json = serde_json::to_string(&RemoteDeviceId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
