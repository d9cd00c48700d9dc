use serde::{Deserialize, Serialize};

/// Sanitized view of an authenticated user, as returned to clients under
/// `userData`. The `db` and `server_version` tags are opaque passthrough
/// strings from the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: i64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub partner_display_name: String,
    #[serde(default)]
    pub partner_id: i64,
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub server_version: String,
}
