use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = argpanel::Config::parse();
    tracing::info!(api_url = %config.api_url, session_file = ?config.session_file, "starting");

    argpanel::run_gui(config).map_err(|e| anyhow::anyhow!("{e}")).context("running the GUI")
}
