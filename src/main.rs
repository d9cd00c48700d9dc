use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gravitime_gateway::cli;
use gravitime_gateway::config::GatewayConfig;

fn usage() -> &'static str {
    "usage: gravitime-gateway [serve | login <email> <password> | verify | download [dest] | logout | status]"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");
    let base = std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

    match command {
        "serve" => {
            let config = GatewayConfig::from_env();
            let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
            info!(
                target: "gravitime",
                "GraviTime gateway: RUST_LOG='{}', port={}, env='{}'",
                rust_log, config.port, config.env
            );
            gravitime_gateway::server::run(config).await
        }
        "login" => {
            let (Some(email), Some(password)) = (args.get(2), args.get(3)) else {
                anyhow::bail!("login needs <email> <password>\n{}", usage());
            };
            cli::run_login(&base, email, password).await
        }
        "verify" => cli::run_verify(&base).await,
        "download" => cli::run_download(&base, args.get(2).map(PathBuf::from)).await,
        "logout" => cli::run_logout(&base).await,
        "status" => cli::run_status(),
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("{}", usage());
            std::process::exit(2);
        }
    }
}
