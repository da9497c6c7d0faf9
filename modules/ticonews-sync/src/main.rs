use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ticonews_common::{Config, Shutdown};
use ticonews_sync::Synchronizer;

#[derive(Parser)]
#[command(about = "CRHoy daily index synchronizer")]
struct Args {
    /// Run exactly one cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ticonews=info".parse()?))
        .init();

    let args = Args::parse();

    info!("ticonews synchronizer starting...");

    let config = Config::sync_from_env();
    config.log_redacted();

    let pool = ticonews_store::connect(&config.database_url).await?;
    ticonews_store::migrate(&pool).await?;

    let shutdown = Shutdown::new();
    shutdown.listen();

    let synchronizer = Synchronizer::new(pool, config, shutdown)?;
    synchronizer.run(args.once).await?;

    info!("Synchronizer exited cleanly");
    Ok(())
}
