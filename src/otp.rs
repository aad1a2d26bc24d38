use rand::RngCore;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use totp_rs::{Algorithm, Secret, TOTP};
use url::Url;
use zeroize::Zeroizing;

pub const DIGITS: usize = 6;
pub const STEP_SECS: i64 = 30;

/// Steps accepted on each side of the current one.
const SKEW_STEPS: i64 = 1;
const NEW_SECRET_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("one-time code must be exactly 6 digits")]
    InvalidFormat,
    #[error("server configuration error: {0}")]
    Configuration(&'static str),
    #[error("invalid one-time code")]
    VerificationFailed,
}

/// A code as typed by the user, already checked to be 6 ASCII digits.
pub struct SubmittedCode(String);

impl SubmittedCode {
    pub fn parse(raw: &str) -> Result<Self, OtpError> {
        if raw.len() == DIGITS && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(OtpError::InvalidFormat)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubmittedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubmittedCode(******)")
    }
}

/// Decoded shared secret. Wiped on drop, never printed.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    /// Secret as read from the process configuration; absence is an operator fault.
    pub fn from_config(raw: Option<&str>) -> Result<Self, OtpError> {
        match raw.map(str::trim) {
            None => Err(OtpError::Configuration("SECRET_OTP is not set")),
            Some("") => Err(OtpError::Configuration("SECRET_OTP is empty")),
            Some(raw) => Self::parse(raw),
        }
    }

    /// Accepts a base32 secret or an `otpauth://totp/` URI carrying one.
    pub fn parse(raw: &str) -> Result<Self, OtpError> {
        let raw = raw.trim();
        if raw.starts_with("otpauth://") {
            Self::from_otpauth(raw)
        } else {
            Self::from_base32(raw)
        }
    }

    pub fn from_base32(text: &str) -> Result<Self, OtpError> {
        let normalized: Zeroizing<String> = Zeroizing::new(
            text.chars()
                .filter(|c| !c.is_whitespace() && *c != '=')
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        );
        if normalized.is_empty() {
            return Err(OtpError::Configuration("SECRET_OTP is empty"));
        }

        let bytes = Secret::Encoded((*normalized).clone())
            .to_bytes()
            .map_err(|_| OtpError::Configuration("SECRET_OTP is not valid base32"))?;
        if bytes.is_empty() {
            return Err(OtpError::Configuration("SECRET_OTP decodes to no bytes"));
        }

        Ok(Self(Zeroizing::new(bytes)))
    }

    // Only the parameters this verifier implements are accepted.
    fn from_otpauth(raw: &str) -> Result<Self, OtpError> {
        let url = Url::parse(raw)
            .map_err(|_| OtpError::Configuration("SECRET_OTP is not a valid otpauth URI"))?;

        if !url.host_str().is_some_and(|h| h.eq_ignore_ascii_case("totp")) {
            return Err(OtpError::Configuration(
                "only otpauth://totp URIs are supported",
            ));
        }

        let mut secret: Option<Zeroizing<String>> = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "secret" => secret = Some(Zeroizing::new(v.into_owned())),
                "digits" if v != "6" => {
                    return Err(OtpError::Configuration("otpauth URI must use 6 digits"));
                }
                "period" if v != "30" => {
                    return Err(OtpError::Configuration(
                        "otpauth URI must use a 30 second period",
                    ));
                }
                "algorithm" if !v.eq_ignore_ascii_case("SHA1") => {
                    return Err(OtpError::Configuration("otpauth URI must use SHA1"));
                }
                _ => {}
            }
        }

        let secret =
            secret.ok_or(OtpError::Configuration("otpauth URI has no secret parameter"))?;
        Self::from_base32(&secret)
    }

    pub fn to_base32(&self) -> Zeroizing<String> {
        Zeroizing::new(Secret::Raw(self.0.to_vec()).to_encoded().to_string())
    }

    fn totp(&self) -> TOTP {
        // Skew is handled by `verify`; short (80-bit) secrets are allowed.
        TOTP::new_unchecked(
            Algorithm::SHA1,
            DIGITS,
            0,
            STEP_SECS as u64,
            self.0.to_vec(),
        )
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Whether `code` matches the step containing `now` or one of its two neighbours.
///
/// Pure: the result depends only on the three arguments. Used steps are not
/// remembered, so a code can be replayed while it stays inside the window.
pub fn verify(code: &SubmittedCode, secret: &SharedSecret, now: OffsetDateTime) -> bool {
    let totp = secret.totp();
    let step = now.unix_timestamp().div_euclid(STEP_SECS);

    (-SKEW_STEPS..=SKEW_STEPS)
        .filter_map(|offset| step.checked_add(offset))
        .filter(|counter| *counter >= 0)
        .any(|counter| totp.check(code.as_str(), counter as u64 * STEP_SECS as u64))
}

/// Full check as done at the request boundary: format, then secret, then code.
pub fn check(code: &str, secret: Option<&str>, now: OffsetDateTime) -> Result<(), OtpError> {
    let code = SubmittedCode::parse(code)?;
    let secret = SharedSecret::from_config(secret)?;

    if verify(&code, &secret, now) {
        Ok(())
    } else {
        Err(OtpError::VerificationFailed)
    }
}

/// Code for the step containing `now`.
pub fn generate(secret: &SharedSecret, now: OffsetDateTime) -> String {
    secret.totp().generate(now.unix_timestamp().max(0) as u64)
}

/// Fresh random secret, base32 without padding.
pub fn new_secret() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; NEW_SECRET_LEN]);
    rand::thread_rng().fill_bytes(&mut *bytes);
    Zeroizing::new(Secret::Raw(bytes.to_vec()).to_encoded().to_string())
}

/// `otpauth://` URI for enrolling the secret in an authenticator app.
///
/// The `issuer:account` label is one percent-encoded path segment, so `?`, `#`
/// or `/` in either part cannot leak into the query or fragment.
pub fn provisioning_uri(
    secret: &SharedSecret,
    issuer: &str,
    account: &str,
) -> Result<String, OtpError> {
    let unusable =
        || OtpError::Configuration("issuer or account is not usable in an otpauth URI");
    let mut url = Url::parse("otpauth://totp/").map_err(|_| unusable())?;
    url.path_segments_mut()
        .map_err(|_| unusable())?
        .pop_if_empty()
        .push(&format!("{issuer}:{account}"));

    let encoded = secret.to_base32();
    url.query_pairs_mut()
        .append_pair("secret", encoded.as_str())
        .append_pair("issuer", issuer)
        .append_pair("algorithm", "SHA1")
        .append_pair("digits", "6")
        .append_pair("period", "30");

    Ok(url.to_string())
}
