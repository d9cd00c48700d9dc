//! Unified gateway error model and HTTP mapping helpers.
//! One taxonomy is shared by the Odoo upstream client, the session layer and
//! the HTTP handlers; the handlers translate it into stable JSON envelopes.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Malformed client input; no upstream call is made.
    #[error("{0}")]
    InvalidRequest(String),
    /// The identity provider explicitly rejected the credentials.
    #[error("{0}")]
    AuthenticationFailed(String),
    /// Missing, unknown or expired bearer token.
    #[error("{0}")]
    Unauthorized(String),
    /// Network or parse failure while talking to the identity provider.
    #[error("upstream failure: {0}")]
    Upstream(String),
    /// A requested static asset is absent on this node.
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::AuthenticationFailed(_) => 401,
            GatewayError::Unauthorized(_) => 401,
            GatewayError::NotFound(_) => 404,
            GatewayError::Upstream(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Upstream(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
