use crate::config::Config;
use crate::otp::{self, OtpError};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

/// Proof that a one-time code was accepted. Store mutations take `&Unlocked`.
#[derive(Debug)]
pub struct Unlocked {
    _private: (),
}

#[cfg(test)]
impl Unlocked {
    pub(crate) fn for_tests() -> Self {
        Self { _private: () }
    }
}

pub struct Gate {
    secret: Option<Zeroizing<String>>,
}

impl Gate {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            secret: cfg.otp_secret.clone(),
        }
    }

    /// Check `code` at `now` and hand out an `Unlocked` token on success.
    pub fn unlock(&self, code: &str, now: OffsetDateTime) -> Result<Unlocked, OtpError> {
        let secret = self.secret.as_ref().map(|s| s.as_str());
        match otp::check(code, secret, now) {
            Ok(()) => {
                info!("one-time code accepted");
                Ok(Unlocked { _private: () })
            }
            Err(e @ OtpError::Configuration(_)) => {
                error!("otp gate misconfigured: {e}");
                Err(e)
            }
            Err(e) => {
                warn!("one-time code rejected: {e}");
                Err(e)
            }
        }
    }

    /// Unlock using the current wall-clock time.
    pub fn unlock_now(&self, code: &str) -> Result<Unlocked, OtpError> {
        self.unlock(code, OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn gate(secret: Option<&str>) -> Gate {
        Gate::from_config(&Config {
            otp_secret: secret.map(|s| Zeroizing::new(s.to_string())),
            store_dir: PathBuf::from("unused"),
            otp_issuer: "series".to_string(),
        })
    }

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    #[test]
    fn valid_code_unlocks() {
        let g = gate(Some("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
        assert!(g.unlock("287082", at(59)).is_ok());
        // Nothing is remembered between attempts.
        assert!(g.unlock("287082", at(59)).is_ok());
    }

    #[test]
    fn denials_keep_their_kind() {
        let g = gate(Some("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
        assert_eq!(g.unlock("12345", at(59)).unwrap_err(), OtpError::InvalidFormat);
        assert_eq!(
            g.unlock("000000", at(59)).unwrap_err(),
            OtpError::VerificationFailed
        );

        // Typed codes are not trimmed on any path.
        for padded in [" 287082", "287082 ", "287082\n"] {
            assert_eq!(g.unlock(padded, at(59)).unwrap_err(), OtpError::InvalidFormat);
        }

        let unconfigured = gate(None);
        assert!(matches!(
            unconfigured.unlock("287082", at(59)),
            Err(OtpError::Configuration(_))
        ));
    }
}
