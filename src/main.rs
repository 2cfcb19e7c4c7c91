use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bidicdp::config::Config;
use bidicdp::session_manager;

#[tokio::main]
async fn main() {
    let config = Arc::new(Config::parse());

    let filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = session_manager::serve(config).await {
        tracing::error!(%err, "bidi session manager exited with an error");
        std::process::exit(1);
    }
}
