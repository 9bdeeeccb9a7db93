//! Time-based one-time codes (RFC 6238, HMAC-SHA1, 30 s step, 6 digits).
//!
//! [`OneTimeCode`] is the value that goes into request payloads. It carries
//! no code of its own: serializing it asks the generator for the code of the
//! current time step, so a request built now and sent later still carries a
//! valid code.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde::{Serialize, Serializer};
use sha1::Sha1;

use crate::error::ConfigurationError;
use crate::time::unix_seconds;

type HmacSha1 = Hmac<Sha1>;

/// Length of a time step, in seconds.
pub const TIME_STEP_SECS: u64 = 30;

/// Number of decimal digits in a code.
pub const CODE_DIGITS: u32 = 6;

/// A decoded base32 shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Decode a base32 secret as shown by authenticator enrolment screens.
    ///
    /// Case, inner whitespace and `=` padding are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingField`] for an empty secret and
    /// [`ConfigurationError::MalformedSecret`] when it is not base32.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.is_empty() {
            return Err(ConfigurationError::MissingField {
                field: "tfa_secret",
            });
        }
        let bytes = data_encoding::BASE32_NOPAD
            .decode(cleaned.as_bytes())
            .map_err(|_| ConfigurationError::MalformedSecret)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Generates codes from a [`SharedSecret`].
///
/// Holds only the keyed MAC state, which is cloned per code, so a single
/// generator can be shared between threads without locking.
#[derive(Clone)]
pub struct CodeGenerator {
    mac: HmacSha1,
}

impl CodeGenerator {
    /// Create a generator for `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MalformedSecret`] if the key is rejected.
    pub fn new(secret: &SharedSecret) -> Result<Self, ConfigurationError> {
        let mac = HmacSha1::new_from_slice(&secret.0)
            .map_err(|_| ConfigurationError::MalformedSecret)?;
        Ok(Self { mac })
    }

    /// Parse `raw` and create a generator in one step.
    ///
    /// # Errors
    ///
    /// See [`SharedSecret::parse`].
    pub fn from_base32(raw: &str) -> Result<Self, ConfigurationError> {
        Self::new(&SharedSecret::parse(raw)?)
    }

    /// The code for the current time step.
    #[must_use]
    pub fn current_code(&self) -> String {
        self.code_at(unix_seconds())
    }

    /// The code for the time step containing `unix_secs`.
    #[must_use]
    pub fn code_at(&self, unix_secs: u64) -> String {
        let counter = unix_secs / TIME_STEP_SECS;
        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = usize::from(digest[digest.len() - 1] & 0x0f);
        let truncated = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let code = truncated % 10_u32.pow(CODE_DIGITS);
        format!("{code:0width$}", width = CODE_DIGITS as usize)
    }
}

impl fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("step_secs", &TIME_STEP_SECS)
            .field("digits", &CODE_DIGITS)
            .finish_non_exhaustive()
    }
}

/// Placeholder for a one-time code inside a request payload.
///
/// Serializes to the code of the time step in which serialization happens.
#[derive(Clone)]
pub struct OneTimeCode {
    generator: Arc<CodeGenerator>,
}

impl OneTimeCode {
    /// Wrap a shared generator.
    #[must_use]
    pub fn new(generator: Arc<CodeGenerator>) -> Self {
        Self { generator }
    }

    /// Generate the code right now.
    #[must_use]
    pub fn current(&self) -> String {
        self.generator.current_code()
    }

    /// The generator behind this placeholder.
    #[must_use]
    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }
}

impl fmt::Debug for OneTimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OneTimeCode(..)")
    }
}

impl Serialize for OneTimeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.generator.current_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "12345678901234567890" — the RFC 6238 SHA-1 test key.
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn should_match_rfc6238_vectors() {
        let generator = CodeGenerator::from_base32(RFC_SECRET).unwrap();
        assert_eq!(generator.code_at(59), "287082");
        assert_eq!(generator.code_at(1_111_111_109), "081804");
        assert_eq!(generator.code_at(1_111_111_111), "050471");
        assert_eq!(generator.code_at(1_234_567_890), "005924");
        assert_eq!(generator.code_at(2_000_000_000), "279037");
    }

    #[test]
    fn should_return_same_code_within_one_time_step() {
        let generator = CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap();
        let start = 1_700_000_010;
        assert_eq!(generator.code_at(start), generator.code_at(start + 19));
    }

    #[test]
    fn should_return_different_code_one_step_apart() {
        let generator = CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap();
        let first = generator.code_at(1_700_000_010);
        let second = generator.code_at(1_700_000_040);
        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 6);
        assert!(first.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(first, second);
    }

    #[test]
    fn should_differ_across_many_steps() {
        let generator = CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap();
        let codes: std::collections::HashSet<String> = (0..50)
            .map(|step| generator.code_at(1_600_000_000 + step * TIME_STEP_SECS))
            .collect();
        // 50 six-digit codes colliding more than once is vanishingly unlikely.
        assert!(codes.len() >= 49);
    }

    #[test]
    fn should_accept_lowercase_spaced_and_padded_secret() {
        let plain = CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap();
        let messy = CodeGenerator::from_base32("jbsw y3dp ehpk 3pxp====").unwrap();
        assert_eq!(plain.code_at(1_000), messy.code_at(1_000));
    }

    #[test]
    fn should_reject_empty_secret() {
        assert!(matches!(
            SharedSecret::parse("   "),
            Err(ConfigurationError::MissingField { .. })
        ));
    }

    #[test]
    fn should_reject_non_base32_secret() {
        assert_eq!(
            SharedSecret::parse("not-base32!"),
            Err(ConfigurationError::MalformedSecret)
        );
    }

    #[test]
    fn should_not_leak_secret_in_debug_output() {
        let secret = SharedSecret::parse("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(format!("{secret:?}"), "SharedSecret(..)");
    }

    #[test]
    fn should_serialize_one_time_code_as_current_code() {
        let generator = Arc::new(CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap());
        let code = OneTimeCode::new(Arc::clone(&generator));

        #[derive(Serialize)]
        struct Payload {
            tfa_api_token: &'static str,
            token: OneTimeCode,
        }

        let before = generator.current_code();
        let json = serde_json::to_value(Payload {
            tfa_api_token: "abc",
            token: code,
        })
        .unwrap();
        let after = generator.current_code();

        let token = json["token"].as_str().unwrap();
        assert!(token == before || token == after);
    }

    #[test]
    fn should_generate_codes_from_multiple_threads() {
        let generator = Arc::new(CodeGenerator::from_base32("JBSWY3DPEHPK3PXP").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || generator.code_at(1_700_000_000))
            })
            .collect();
        let codes: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(codes.windows(2).all(|w| w[0] == w[1]));
    }
}
