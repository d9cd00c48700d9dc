use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::profile::UserProfile;
use crate::error::{GatewayError, GatewayResult};

pub type SessionToken = String;

/// Server-side session state: the authoritative record behind a bearer token.
/// Exists only between a successful login and expiry or explicit logout.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A freshly issued session, token included.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub record: SessionRecord,
}

/// Keyed session storage. The gateway only ever needs put/get/remove plus a
/// bulk expiry sweep, so an external store (e.g. a distributed cache) can be
/// substituted without touching call sites.
pub trait SessionStore: Send + Sync {
    fn put(&self, token: &str, record: SessionRecord);
    fn get(&self, token: &str) -> Option<SessionRecord>;
    /// Update an existing record's expiry in place, as one atomic operation.
    /// Must never insert: a token removed by logout or expiry stays removed.
    /// Returns whether a record was present.
    fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> bool;
    fn remove(&self, token: &str) -> bool;
    /// Drop every record already expired at `now`; returns how many were removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;
    fn len(&self) -> usize;
}

/// Process-local store. All map operations take the lock synchronously and
/// complete without crossing an await point, so the `RwLock` is the only
/// exclusion needed under the multi-threaded runtime.
#[derive(Default)]
pub struct MemorySessionStore {
    map: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, token: &str, record: SessionRecord) {
        self.map.write().insert(token.to_string(), record);
    }

    fn get(&self, token: &str) -> Option<SessionRecord> {
        self.map.read().get(token).cloned()
    }

    fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        match self.map.write().get_mut(token) {
            Some(record) => {
                record.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    fn remove(&self, token: &str) -> bool {
        self.map.write().remove(token).is_some()
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.map.write();
        let before = map.len();
        map.retain(|_, rec| !rec.is_expired_at(now));
        before - map.len()
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }
}

/// Generate a bearer token: 256 bits of CSPRNG output as 64 lowercase hex chars.
/// Entropy failure is propagated; an all-zero credential must never be minted.
fn generate_token() -> GatewayResult<SessionToken> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf)
        .map_err(|e| GatewayError::Internal(format!("token entropy unavailable: {e}")))?;
    let mut token = String::with_capacity(64);
    for b in &buf {
        let _ = write!(&mut token, "{:02x}", b);
    }
    Ok(token)
}

/// Owns the session table for the process lifetime. Nothing is persisted:
/// a restart invalidates every outstanding token.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    pub ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl_secs: i64) -> Self {
        Self::with_store(Arc::new(MemorySessionStore::new()), ttl_secs)
    }

    pub fn with_store(store: Arc<dyn SessionStore>, ttl_secs: i64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Mint a token and insert a record expiring a full TTL from now.
    pub fn issue(&self, profile: UserProfile) -> GatewayResult<Session> {
        let now = Utc::now();
        let token = generate_token()?;
        let record = SessionRecord {
            profile,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.put(&token, record.clone());
        debug!(
            target: "auth",
            "session issued uid={} ttl_secs={}",
            record.profile.uid,
            self.ttl.num_seconds()
        );
        Ok(Session { token, record })
    }

    /// Look the token up; unknown or past-expiry counts as not-found.
    /// An expired record is removed on the spot, never returned as valid.
    pub fn validate(&self, token: &str) -> Option<SessionRecord> {
        let record = self.store.get(token)?;
        if record.is_expired_at(Utc::now()) {
            self.store.remove(token);
            return None;
        }
        Some(record)
    }

    /// Reset a live record's expiry to now + TTL. Unknown tokens are a no-op,
    /// so activity keeps a session alive indefinitely while pure inactivity
    /// for one TTL window ends it. The update is a single in-place store
    /// operation: a token removed by a concurrent logout or expiry cannot be
    /// re-inserted here.
    pub fn extend(&self, token: &str) {
        self.store.touch(token, Utc::now() + self.ttl);
    }

    /// validate + extend composition used by every protected endpoint.
    pub fn verify(&self, token: &str) -> Option<SessionRecord> {
        let record = self.validate(token)?;
        self.extend(token);
        Some(record)
    }

    /// Unconditional removal; logging out an absent token is not an error.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.store.remove(token);
        if removed {
            debug!(target: "auth", "session removed on logout");
        }
        removed
    }

    /// Drop every expired record. Bounds memory growth from abandoned tokens
    /// that would otherwise only be reaped lazily on their next lookup.
    pub fn sweep(&self) -> usize {
        self.store.sweep(Utc::now())
    }

    pub fn live_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Forwards to a `MemorySessionStore` while counting operations, so tests
    /// can pin down which store calls a manager operation is made of.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemorySessionStore,
        puts: AtomicUsize,
        gets: AtomicUsize,
        touches: AtomicUsize,
    }

    impl SessionStore for RecordingStore {
        fn put(&self, token: &str, record: SessionRecord) {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(token, record)
        }
        fn get(&self, token: &str) -> Option<SessionRecord> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(token)
        }
        fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
            self.touches.fetch_add(1, Ordering::SeqCst);
            self.inner.touch(token, expires_at)
        }
        fn remove(&self, token: &str) -> bool {
            self.inner.remove(token)
        }
        fn sweep(&self, now: DateTime<Utc>) -> usize {
            self.inner.sweep(now)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    fn profile(uid: i64) -> UserProfile {
        UserProfile {
            uid,
            email: format!("user{uid}@example.com"),
            name: "Test User".to_string(),
            ..Default::default()
        }
    }

    fn backdated_record(uid: i64, expired_secs_ago: i64) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            profile: profile(uid),
            created_at: now - Duration::seconds(expired_secs_ago + 10),
            expires_at: now - Duration::seconds(expired_secs_ago),
        }
    }

    #[test]
    fn tokens_are_64_hex_and_unique() {
        let sm = SessionManager::new(3600);
        let a = sm.issue(profile(1)).unwrap();
        let b = sm.issue(profile(1)).unwrap();
        for s in [&a, &b] {
            assert_eq!(s.token.len(), 64);
            assert!(s.token.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn validate_returns_live_record() {
        let sm = SessionManager::new(3600);
        let s = sm.issue(profile(7)).unwrap();
        let rec = sm.validate(&s.token).expect("live session");
        assert_eq!(rec.profile.uid, 7);
        assert!(rec.expires_at > rec.created_at);
        assert!(sm.validate("unknown-token").is_none());
    }

    #[test]
    fn expired_record_is_removed_on_validate() {
        let store = Arc::new(MemorySessionStore::new());
        let sm = SessionManager::with_store(store.clone(), 3600);
        store.put("tok", backdated_record(7, 1));
        assert!(sm.validate("tok").is_none());
        // lazy cleanup happened: the record is gone, not just hidden
        assert!(store.get("tok").is_none());
    }

    #[test]
    fn extend_resets_expiry_forward() {
        let store = Arc::new(MemorySessionStore::new());
        let sm = SessionManager::with_store(store.clone(), 3600);
        let s = sm.issue(profile(1)).unwrap();
        let mut soon = s.record.clone();
        soon.expires_at = Utc::now() + Duration::seconds(5);
        store.put(&s.token, soon.clone());

        sm.extend(&s.token);
        let after = store.get(&s.token).unwrap();
        assert!(after.expires_at > soon.expires_at);
        // unknown token: no-op, nothing inserted
        sm.extend("unknown-token");
        assert!(store.get("unknown-token").is_none());
    }

    #[test]
    fn verify_extends_the_session() {
        let store = Arc::new(MemorySessionStore::new());
        let sm = SessionManager::with_store(store.clone(), 3600);
        let s = sm.issue(profile(1)).unwrap();
        let mut soon = s.record.clone();
        soon.expires_at = Utc::now() + Duration::seconds(5);
        store.put(&s.token, soon.clone());

        let rec = sm.verify(&s.token).expect("valid");
        assert_eq!(rec.profile.uid, 1);
        assert!(store.get(&s.token).unwrap().expires_at > soon.expires_at);
    }

    #[test]
    fn logout_is_idempotent() {
        let sm = SessionManager::new(3600);
        let s = sm.issue(profile(1)).unwrap();
        assert!(sm.logout(&s.token));
        assert!(sm.validate(&s.token).is_none());
        // second logout on the same token is still fine
        assert!(!sm.logout(&s.token));
    }

    #[test]
    fn extend_after_logout_does_not_resurrect() {
        let store = Arc::new(MemorySessionStore::new());
        let sm = SessionManager::with_store(store.clone(), 3600);
        let s = sm.issue(profile(1)).unwrap();
        assert!(sm.logout(&s.token));
        // a TTL refresh racing the logout must not bring the record back
        sm.extend(&s.token);
        assert!(sm.validate(&s.token).is_none());
        assert!(store.get(&s.token).is_none());
    }

    #[test]
    fn extend_is_a_single_in_place_store_update() {
        let store = Arc::new(RecordingStore::default());
        let sm = SessionManager::with_store(store.clone(), 3600);
        let s = sm.issue(profile(1)).unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        sm.extend(&s.token);
        // no read-modify-write pair a concurrent removal could interleave with
        assert_eq!(store.touches.load(Ordering::SeqCst), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sweep_drops_only_expired_records() {
        let store = Arc::new(MemorySessionStore::new());
        let sm = SessionManager::with_store(store.clone(), 3600);
        let live = sm.issue(profile(1)).unwrap();
        store.put("stale-a", backdated_record(2, 60));
        store.put("stale-b", backdated_record(3, 1));

        assert_eq!(sm.sweep(), 2);
        assert_eq!(sm.live_count(), 1);
        assert!(sm.validate(&live.token).is_some());
    }
}
