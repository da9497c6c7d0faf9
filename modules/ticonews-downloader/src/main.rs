use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, RateLimiter};
use ticonews_common::{Config, Shutdown};
use ticonews_downloader::analysis::EngineSessions;
use ticonews_downloader::Downloader;

#[derive(Parser)]
#[command(about = "CRHoy article downloader and analyzer")]
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

    info!("ticonews downloader starting...");

    let config = Config::downloader_from_env();
    config.log_redacted();

    if config.llm.engine != "claude" {
        bail!("Unsupported LLM engine '{}'", config.llm.engine);
    }

    let pool = ticonews_store::connect(&config.database_url).await?;
    ticonews_store::migrate(&pool).await?;

    let mut limiter = RateLimiter::new()
        .register(
            config.llm.basic.model.as_str(),
            config.llm.basic.request_limit,
            config.llm.basic.request_limit_period,
        )
        .register(
            config.llm.light.model.as_str(),
            config.llm.light.request_limit,
            config.llm.light.request_limit_period,
        );
    if let Some(supplementary) = &config.llm.supplementary {
        limiter = limiter.register(
            supplementary.model.as_str(),
            supplementary.request_limit,
            supplementary.request_limit_period,
        );
    }

    let engine = Claude::new(&config.llm.api_key, Arc::new(limiter));
    let sessions = EngineSessions::new(engine, config.llm.clone());

    let shutdown = Shutdown::new();
    shutdown.listen();

    let downloader = Downloader::new(pool, config, shutdown, sessions)?;
    downloader.run(args.once).await?;

    info!("Downloader exited cleanly");
    Ok(())
}
