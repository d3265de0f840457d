//! incfeed: incidence update notifier.
//! Runs one or more notifier tabs in-process; tabs elect a single poller
//! through the shared state database and fan updates out to each other.

use clap::Parser;

mod cli;
mod cmd_status;
mod cmd_watch;
mod context;
mod http_feed;

fn init_tracing() {
    let filter = std::env::var("INCFEED_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    init_tracing();

    let store_path = args.store_path.unwrap_or_else(cli::default_store_path);

    match args.command {
        cli::Command::Watch(opts) => {
            let base = cli::load_config(args.config.as_deref())?;
            let config = opts.notifier_config(base)?;
            tracing::info!(
                poll_ms = config.poll_interval_ms,
                heartbeat_ms = config.heartbeat_interval_ms,
                lease_ttl_ms = config.lease_ttl_ms,
                "incfeed starting"
            );
            cmd_watch::cmd_watch(&store_path, config, &opts).await?;
        }
        cli::Command::Status(opts) => {
            cmd_status::cmd_status(&store_path, &opts)?;
        }
        cli::Command::Logout(opts) => {
            cmd_status::cmd_logout(&store_path, &opts)?;
        }
    }

    Ok(())
}
