use crate::errors::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// One browser cookie as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Seconds since the epoch; negative for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl CookieRecord {
    /// Session cookies (no expiry, or a negative one) never count as expired.
    pub fn is_expired(&self, now_epoch: f64) -> bool {
        match self.expires {
            Some(expires) if expires >= 0.0 => expires < now_epoch,
            _ => false,
        }
    }
}

/// Reads and writes the per-user serialized cookie set. Cookies that
/// expired since the last run are dropped at load time instead of being
/// injected into the browser.
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `Ok(None)` when no cookie file exists yet.
    pub fn load(&self) -> Result<Option<Vec<CookieRecord>>> {
        if !self.path.exists() {
            info!("No cookies file found at {}", self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let mut cookies: Vec<CookieRecord> = serde_json::from_str(&raw)?;
        let total = cookies.len();
        let now = Utc::now().timestamp() as f64;
        cookies.retain(|cookie| {
            let expired = cookie.is_expired(now);
            if expired {
                debug!("Dropping expired cookie '{}'", cookie.name);
            }
            !expired
        });
        info!(
            "Loaded {} of {total} cookies from {}",
            cookies.len(),
            self.path.display()
        );
        Ok(Some(cookies))
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(cookies)?)?;
        debug!("Saved {} cookies to {}", cookies.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cookies() -> Vec<CookieRecord> {
        vec![
            CookieRecord {
                name: "session_id".to_string(),
                value: "abc123".to_string(),
                domain: ".pracuj.pl".to_string(),
                path: Some("/".to_string()),
                expires: Some(1_900_000_000.0),
                secure: true,
                http_only: true,
            },
            CookieRecord {
                name: "consent".to_string(),
                value: "1".to_string(),
                domain: "login.pracuj.pl".to_string(),
                path: None,
                expires: None,
                secure: false,
                http_only: false,
            },
        ]
    }

    #[test]
    fn round_trips_cookie_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookies").join("main_pracuj_cookies.json"));

        let cookies = sample_cookies();
        store.save(&cookies).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, cookies);
    }

    #[test]
    fn missing_file_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn expired_cookies_are_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookies.json"));

        let mut cookies = sample_cookies();
        cookies[0].expires = Some(1_000_000.0);
        store.save(&cookies).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "consent");
    }

    #[test]
    fn session_cookies_never_expire() {
        let session = CookieRecord {
            name: "sid".to_string(),
            value: "x".to_string(),
            domain: ".pracuj.pl".to_string(),
            path: None,
            expires: Some(-1.0),
            secure: false,
            http_only: false,
        };
        assert!(!session.is_expired(2_000_000_000.0));
    }
}
