use std::path::Path;

use anyhow::{anyhow, Context, Result};
use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::identity::UserProfile;

/// Result of a protected call: the caller must treat `Unauthorized` as "the
/// gateway has forgotten this token" and discard any local cache.
#[derive(Debug)]
pub enum VerifyOutcome {
    Valid(UserProfile),
    Unauthorized,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    /// Bytes written to the destination file.
    Saved(u64),
    Unauthorized,
    Missing,
}

/// HTTP client for the gateway's own API surface.
#[derive(Clone)]
pub struct GatewayClient {
    base: Url,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).context("invalid gateway URL")?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { base, client })
    }

    /// POST /api/auth/login, returning the minted token and profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserProfile)> {
        let url = self.base.join("/api/auth/login")?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let msg = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("login failed");
            return Err(anyhow!("login failed: {} (HTTP {})", msg, status));
        }
        let token = body
            .get("token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow!("login response missing token"))?
            .to_string();
        let user: UserProfile = serde_json::from_value(
            body.get("userData")
                .cloned()
                .ok_or_else(|| anyhow!("login response missing userData"))?,
        )
        .context("malformed userData in login response")?;
        Ok((token, user))
    }

    /// GET /api/auth/verify with the bearer token.
    pub async fn verify(&self, token: &str) -> Result<VerifyOutcome> {
        let url = self.base.join("/api/auth/verify")?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if status == StatusCode::UNAUTHORIZED {
            return Ok(VerifyOutcome::Unauthorized);
        }
        if !status.is_success() {
            return Err(anyhow!("verify failed: HTTP {}", status));
        }
        let user: UserProfile = serde_json::from_value(
            body.get("userData")
                .cloned()
                .ok_or_else(|| anyhow!("verify response missing userData"))?,
        )?;
        Ok(VerifyOutcome::Valid(user))
    }

    /// POST /api/auth/logout. Succeeds regardless of token state.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let url = self.base.join("/api/auth/logout")?;
        let resp = self.client.post(url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("logout failed: HTTP {}", resp.status()));
        }
        Ok(())
    }

    /// GET /api/download/apk, saving the stream to `dest`.
    pub async fn download_apk(&self, token: &str, dest: &Path) -> Result<DownloadOutcome> {
        let url = self.base.join("/api/download/apk")?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => Ok(DownloadOutcome::Unauthorized),
            StatusCode::NOT_FOUND => Ok(DownloadOutcome::Missing),
            status if status.is_success() => {
                let bytes = resp.bytes().await.context("failed to read APK body")?;
                std::fs::write(dest, &bytes)
                    .with_context(|| format!("failed to write {}", dest.display()))?;
                Ok(DownloadOutcome::Saved(bytes.len() as u64))
            }
            status => Err(anyhow!("download failed: HTTP {}", status)),
        }
    }
}
