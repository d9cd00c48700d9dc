//! Gateway configuration sourced from the environment.
//!
//! Every knob has a default so a bare `gravitime-gateway serve` works against
//! the hosted Odoo instance. A `.env` file is honored when present (loaded in
//! `main` via dotenvy, matching the original deployment).

use std::path::PathBuf;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Base URL of the Odoo instance owning the credential store.
    pub odoo_host: String,
    /// Fixed application database identifier sent with every auth call.
    pub odoo_db: String,
    /// Session TTL in seconds; refreshed on every validated access.
    pub session_timeout_secs: i64,
    /// Bound on a single upstream authentication round-trip.
    pub odoo_timeout_secs: u64,
    /// Background expiry-sweep interval; `<= 0` disables the sweeper.
    pub sweep_interval_secs: i64,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    /// Location of the gated APK on the serving node.
    pub apk_path: PathBuf,
    /// Filename suggested in the download's content-disposition.
    pub apk_filename: String,
    /// Deployment environment; "development" echoes internal error detail.
    pub env: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            odoo_host: "https://ipl-pfe-2025-groupe03.odoo.com".to_string(),
            odoo_db: "ipl-pfe-2025-groupe03-main-26038800".to_string(),
            session_timeout_secs: 3600,
            odoo_timeout_secs: 30,
            sweep_interval_secs: 60,
            cors_origins: vec!["http://localhost:5173".to_string()],
            apk_path: PathBuf::from("public/gravitime.apk"),
            apk_filename: "GraviTime_v1.0.apk".to_string(),
            env: "development".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            odoo_host: env_or("ODOO_HOST", &defaults.odoo_host),
            odoo_db: env_or("ODOO_DB", &defaults.odoo_db),
            session_timeout_secs: std::env::var("SESSION_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_timeout_secs),
            odoo_timeout_secs: std::env::var("ODOO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.odoo_timeout_secs),
            sweep_interval_secs: std::env::var("SESSION_SWEEP_INTERVAL_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            cors_origins: parse_origins(&env_or("CORS_ORIGIN", "http://localhost:5173")),
            apk_path: PathBuf::from(env_or("APK_PATH", "public/gravitime.apk")),
            apk_filename: env_or("APK_FILENAME", &defaults.apk_filename),
            env: env_or("GATEWAY_ENV", &defaults.env),
        }
    }

    pub fn dev_mode(&self) -> bool {
        self.env == "development"
    }
}

/// Split a comma-separated origin list, dropping empty entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_split_and_trim() {
        let origins = parse_origins("http://localhost:5173, https://gravitime.app ,");
        assert_eq!(
            origins,
            vec![
                "http://localhost:5173".to_string(),
                "https://gravitime.app".to_string()
            ]
        );
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.session_timeout_secs, 3600);
        assert!(cfg.dev_mode());
        assert_eq!(cfg.apk_filename, "GraviTime_v1.0.apk");
    }
}
