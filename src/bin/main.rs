use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bmp_rib::{Collector, CollectorConfig, CollectorError};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};

/// bmp-rib collects routes from BMP exporters into an in-memory RIB.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// Path to a TOML configuration file. Defaults are used when absent.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on for BMP connections, overriding the configuration.
    #[clap(short, long)]
    listen: Option<SocketAddr>,

    /// Log collector metrics as JSON every given number of seconds, 0 to disable.
    #[clap(long, default_value = "60")]
    stats_interval: u64,

    /// Show debug logs (additive for trace logs)
    #[clap(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

async fn run(opts: Opts) -> Result<(), CollectorError> {
    let mut config = match &opts.config {
        Some(path) => CollectorConfig::from_file(path)?,
        None => CollectorConfig::default(),
    };
    if let Some(listen) = opts.listen {
        config.listen = listen;
    }

    let collector = Arc::new(Collector::new(config));
    let listener = collector.listen().await?;

    let signal_collector = collector.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("stopping bmp-rib...");
        }
        signal_collector.stop();
    });

    if opts.stats_interval > 0 {
        let stats_collector = collector.clone();
        let period = Duration::from_secs(opts.stats_interval);
        tokio::spawn(async move {
            let cancel = stats_collector.cancellation_token();
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                match serde_json::to_string(&stats_collector.metrics().snapshot()) {
                    Ok(stats) => info!(
                        "{} peers, {} routes: {}",
                        stats_collector.peers(),
                        stats_collector.routes(),
                        stats
                    ),
                    Err(err) => log::warn!("cannot serialize metrics: {}", err),
                }
            }
        });
    }

    collector.serve(listener).await
}

fn main() {
    let opts: Opts = Opts::parse();

    let (crate_level, other_level) = match opts.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Warn),
    };
    Builder::new()
        .filter(Some("bmp_rib"), crate_level)
        .filter(None, other_level)
        .parse_default_env()
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("cannot start runtime: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = runtime.block_on(run(opts)) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
