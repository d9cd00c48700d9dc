//! JSON-RPC client for the Odoo identity provider.
//!
//! Odoo owns the credential store; the gateway only forwards login/password
//! to `/web/session/authenticate` and reads back the session info. The call
//! carries a bounded timeout so a dead upstream surfaces as `Upstream`
//! instead of hanging the request. No retries: a single failed call is
//! surfaced immediately.

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::identity::UserProfile;

/// Clone is cheap: reqwest::Client is an Arc over a connection pool.
#[derive(Clone)]
pub struct OdooClient {
    client: reqwest::Client,
    host: String,
    db: String,
}

impl OdooClient {
    pub fn new(host: &str, db: &str, timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            db: db.to_string(),
        })
    }

    pub fn from_config(cfg: &GatewayConfig) -> GatewayResult<Self> {
        Self::new(
            &cfg.odoo_host,
            &cfg.odoo_db,
            Duration::from_secs(cfg.odoo_timeout_secs),
        )
    }

    /// Monotonically-ish increasing JSON-RPC request id (unix seconds).
    fn request_id() -> i64 {
        Utc::now().timestamp()
    }

    /// Forward credentials to Odoo and return the sanitized profile.
    pub async fn authenticate(&self, login: &str, password: &str) -> GatewayResult<UserProfile> {
        let url = format!("{}/web/session/authenticate", self.host);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "db": self.db,
                "login": login,
                "password": password,
            },
            "id": Self::request_id(),
        });

        debug!(target: "auth", "authenticating {} against {}", login, self.host);
        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("odoo request failed: {e}");
                GatewayError::Upstream(e.to_string())
            })?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("malformed odoo response: {e}")))?;

        parse_session_info(&body, login, &self.db)
    }
}

/// Interpret an Odoo JSON-RPC envelope. An `error` object or a missing
/// principal id both count as authentication failure; Odoo encodes absent
/// optional fields as `false`, so everything is read defensively off the
/// raw value rather than deserialized into a rigid struct.
fn parse_session_info(body: &Value, login: &str, fallback_db: &str) -> GatewayResult<UserProfile> {
    if let Some(err) = body.get("error") {
        let message = err
            .get("data")
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("Authentication failed");
        return Err(GatewayError::AuthenticationFailed(message.to_string()));
    }

    let result = body.get("result");
    let Some(uid) = result.and_then(|r| r.get("uid")).and_then(|v| v.as_i64()) else {
        return Err(GatewayError::AuthenticationFailed(
            "Invalid credentials".to_string(),
        ));
    };

    let str_field = |key: &str| -> Option<String> {
        result
            .and_then(|r| r.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    Ok(UserProfile {
        uid,
        email: login.to_string(),
        name: str_field("name").unwrap_or_default(),
        username: str_field("username").unwrap_or_else(|| login.to_string()),
        partner_display_name: str_field("partner_display_name").unwrap_or_default(),
        partner_id: result
            .and_then(|r| r.get("partner_id"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0),
        db: str_field("db").unwrap_or_else(|| fallback_db.to_string()),
        server_version: str_field("server_version").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_result_maps_to_profile() {
        let body = json!({
            "jsonrpc": "2.0",
            "result": {
                "uid": 7,
                "name": "Ann",
                "username": "ann",
                "partner_display_name": "Ann Person",
                "partner_id": 42,
                "db": "prod",
                "server_version": "17.0"
            }
        });
        let p = parse_session_info(&body, "a@b.com", "fallback").unwrap();
        assert_eq!(p.uid, 7);
        assert_eq!(p.email, "a@b.com");
        assert_eq!(p.name, "Ann");
        assert_eq!(p.username, "ann");
        assert_eq!(p.partner_id, 42);
        assert_eq!(p.db, "prod");
        assert_eq!(p.server_version, "17.0");
    }

    #[test]
    fn false_fields_fall_back_to_defaults() {
        // Odoo represents null-ish fields as `false`
        let body = json!({
            "result": {
                "uid": 3,
                "name": false,
                "username": false,
                "partner_display_name": false,
                "partner_id": false,
                "db": false,
                "server_version": false
            }
        });
        let p = parse_session_info(&body, "a@b.com", "appdb").unwrap();
        assert_eq!(p.uid, 3);
        assert_eq!(p.name, "");
        assert_eq!(p.username, "a@b.com");
        assert_eq!(p.partner_id, 0);
        assert_eq!(p.db, "appdb");
    }

    #[test]
    fn error_envelope_passes_message_through() {
        let body = json!({
            "error": { "data": { "message": "Access Denied" } }
        });
        let err = parse_session_info(&body, "a@b.com", "db").unwrap_err();
        match err {
            GatewayError::AuthenticationFailed(msg) => assert_eq!(msg, "Access Denied"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_envelope_without_message_is_generic() {
        let body = json!({ "error": { "code": 100 } });
        let err = parse_session_info(&body, "a@b.com", "db").unwrap_err();
        match err {
            GatewayError::AuthenticationFailed(msg) => assert_eq!(msg, "Authentication failed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_uid_is_invalid_credentials() {
        let body = json!({ "result": { "uid": false } });
        let err = parse_session_info(&body, "a@b.com", "db").unwrap_err();
        match err {
            GatewayError::AuthenticationFailed(msg) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
