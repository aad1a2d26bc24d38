use anyhow::anyhow;
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

pub const SECRET_VAR: &str = "SECRET_OTP";
pub const STORE_DIR_VAR: &str = "SERIES_STORE_DIR";
pub const ISSUER_VAR: &str = "SERIES_OTP_ISSUER";

const DEFAULT_ISSUER: &str = "series";

#[derive(Clone)]
pub struct Config {
    /// Raw `SECRET_OTP` text; only decoded when the gate is used.
    pub otp_secret: Option<Zeroizing<String>>,
    pub store_dir: PathBuf,
    pub otp_issuer: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_dir = match non_empty(STORE_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_store_dir()?,
        };

        Ok(Config {
            otp_secret: lookup(SECRET_VAR).map(Zeroizing::new),
            store_dir,
            otp_issuer: non_empty(ISSUER_VAR).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
        })
    }

    pub fn secret_text(&self) -> Option<&str> {
        self.otp_secret.as_ref().map(|s| s.as_str())
    }

    pub fn table_path(&self) -> PathBuf {
        self.store_dir.join("series.json")
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("otp_secret", &self.otp_secret.as_ref().map(|_| "<redacted>"))
            .field("store_dir", &self.store_dir)
            .field("otp_issuer", &self.otp_issuer)
            .finish()
    }
}

/// ~/.local/share/series-store and the platform equivalents.
fn default_store_dir() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir().ok_or_else(|| anyhow!("cannot get data dir"))?;
    dir.push("series-store");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned()).unwrap()
    }

    #[test]
    fn reads_values_from_lookup() {
        let cfg = from(&[
            (SECRET_VAR, "GEZDGNBVGY3TQOJQ"),
            (STORE_DIR_VAR, "/tmp/series-test"),
            (ISSUER_VAR, "watchlist"),
        ]);
        assert_eq!(cfg.secret_text(), Some("GEZDGNBVGY3TQOJQ"));
        let held: &Zeroizing<String> = cfg.otp_secret.as_ref().unwrap();
        assert_eq!(held.len(), 16);
        assert_eq!(cfg.store_dir, PathBuf::from("/tmp/series-test"));
        assert_eq!(cfg.table_path(), PathBuf::from("/tmp/series-test/series.json"));
        assert_eq!(cfg.otp_issuer, "watchlist");
    }

    #[test]
    fn missing_secret_is_not_a_load_error() {
        let cfg = from(&[(STORE_DIR_VAR, "/tmp/series-test")]);
        assert!(cfg.otp_secret.is_none());
        assert_eq!(cfg.otp_issuer, "series");
    }

    #[test]
    fn debug_redacts_secret() {
        let cfg = from(&[(SECRET_VAR, "GEZDGNBVGY3TQOJQ"), (STORE_DIR_VAR, "/x")]);
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("GEZD"));
        assert!(shown.contains("<redacted>"));
    }
}
