//! Durable client-side session cache.
//!
//! Holds the bearer token plus a denormalized profile snapshot so a restart
//! of the client does not require re-login within the server-side validity
//! window. The cache is never authoritative: the gateway's record is. On
//! every state change the file is fully rewritten or fully removed; partial
//! updates would risk showing a profile inconsistent with the held token.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserProfile;

/// Directory name under the user config dir
const APP_DIR: &str = "gravitime";
/// Cache file name
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSession {
    pub token: String,
    pub user: UserProfile,
    pub saved_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn new(token: String, user: UserProfile) -> Self {
        Self {
            token,
            user,
            saved_at: Utc::now(),
        }
    }
}

pub struct SessionCache {
    dir: PathBuf,
}

impl SessionCache {
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join(APP_DIR);
        Ok(Self { dir })
    }

    /// Use an explicit directory instead of the user config dir.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn load(&self) -> Result<Option<CachedSession>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&path).context("Failed to read cached session")?;
        let session: CachedSession =
            serde_json::from_str(&contents).context("Failed to parse cached session")?;
        Ok(Some(session))
    }

    /// Full rewrite of the cache file.
    pub fn save(&self, session: &CachedSession) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(self.session_path(), contents)?;
        Ok(())
    }

    /// Full removal; called on logout and on any authorization failure.
    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CachedSession {
        CachedSession::new(
            "ab".repeat(32),
            UserProfile {
                uid: 7,
                email: "a@b.com".to_string(),
                name: "Ann".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn save_load_clear_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SessionCache::with_dir(tmp.path().join("gravitime"));

        assert!(cache.load().unwrap().is_none());

        let session = sample();
        cache.save(&session).unwrap();
        let loaded = cache.load().unwrap().expect("cached session");
        assert_eq!(loaded.token, session.token);
        assert_eq!(loaded.user.uid, 7);

        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
        // clearing an already-empty cache is fine
        cache.clear().unwrap();
    }
}
