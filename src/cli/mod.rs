//! Thin command-line client for the gateway.
//!
//! Mirrors what the browser frontend does with localStorage: login persists
//! the token plus a profile snapshot in a local cache, protected calls attach
//! the bearer token, and any 401 discards the cache so the next action forces
//! a fresh login.

pub mod connectivity;
pub mod session_cache;

use std::path::PathBuf;

use anyhow::Result;

pub use connectivity::{DownloadOutcome, GatewayClient, VerifyOutcome};
pub use session_cache::{CachedSession, SessionCache};

/// Default filename when `download` is not given a destination.
const DEFAULT_DOWNLOAD_NAME: &str = "GraviTime_v1.0.apk";

pub async fn run_login(base: &str, email: &str, password: &str) -> Result<()> {
    let client = GatewayClient::new(base)?;
    let (token, user) = client.login(email, password).await?;
    let cache = SessionCache::new()?;
    cache.save(&CachedSession::new(token, user.clone()))?;
    println!("Logged in as {} (uid {})", user.email, user.uid);
    Ok(())
}

pub async fn run_verify(base: &str) -> Result<()> {
    let cache = SessionCache::new()?;
    let Some(session) = cache.load()? else {
        println!("Not connected (no cached session)");
        return Ok(());
    };
    let client = GatewayClient::new(base)?;
    match client.verify(&session.token).await? {
        VerifyOutcome::Valid(user) => {
            println!("Session valid: {} (uid {})", user.email, user.uid);
        }
        VerifyOutcome::Unauthorized => {
            // server no longer recognizes the token: local cache is stale
            cache.clear()?;
            println!("Session expired; cached credentials cleared. Please log in again.");
        }
    }
    Ok(())
}

pub async fn run_download(base: &str, dest: Option<PathBuf>) -> Result<()> {
    let cache = SessionCache::new()?;
    let Some(session) = cache.load()? else {
        println!("Not connected; log in first");
        return Ok(());
    };
    let dest = dest.unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_NAME));
    let client = GatewayClient::new(base)?;
    match client.download_apk(&session.token, &dest).await? {
        DownloadOutcome::Saved(bytes) => {
            println!("Saved {} ({} bytes)", dest.display(), bytes);
        }
        DownloadOutcome::Unauthorized => {
            cache.clear()?;
            println!("Session expired; cached credentials cleared. Please log in again.");
        }
        DownloadOutcome::Missing => {
            println!("The APK is not available on the server");
        }
    }
    Ok(())
}

pub async fn run_logout(base: &str) -> Result<()> {
    let cache = SessionCache::new()?;
    if let Some(session) = cache.load()? {
        let client = GatewayClient::new(base)?;
        // best effort: the cache is cleared even if the gateway is unreachable
        if let Err(e) = client.logout(&session.token).await {
            eprintln!("Warning: server logout failed: {e}");
        }
    }
    cache.clear()?;
    println!("Logged out");
    Ok(())
}

/// Local-only view of the cached session; no server round-trip.
pub fn run_status() -> Result<()> {
    let cache = SessionCache::new()?;
    match cache.load()? {
        Some(session) => {
            println!(
                "Cached session for {} (uid {}), saved at {}",
                session.user.email, session.user.uid, session.saved_at
            );
        }
        None => println!("No cached session"),
    }
    Ok(())
}
