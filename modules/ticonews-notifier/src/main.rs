use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ticonews_common::{Config, Shutdown};
use ticonews_notifier::Notifier;

#[derive(Parser)]
#[command(about = "ticonews channel notifier")]
struct Args {
    /// Run one publication cycle immediately and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ticonews=info".parse()?))
        .init();

    let args = Args::parse();

    info!("ticonews notifier starting...");

    let config = Config::notifier_from_env();
    config.log_redacted();

    let pool = ticonews_store::connect(&config.database_url).await?;
    ticonews_store::migrate(&pool).await?;

    let shutdown = Shutdown::new();
    shutdown.listen();

    let notifier = Notifier::new(pool, config, shutdown);
    notifier.run(args.once).await?;

    info!("Notifier exited cleanly");
    Ok(())
}
