use std::sync::Arc;

use clap::Parser;
use dideban::alerts::{AlertSender, LogSender, WebhookSender};
use dideban::config::{read_config_file, Config};
use dideban::probes::ProbeDispatcher;
use dideban::storage::{validators, MemoryBackend};
use dideban::Engine;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![("dideban", LevelFilter::DEBUG)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };

    // Validator defaults are installed once, before anything validates
    let defaults = config.probe_defaults();
    validators::install_defaults(defaults.clone());

    let storage = Arc::new(MemoryBackend::new());
    let dispatcher = Arc::new(ProbeDispatcher::with_standard_probes(&defaults));
    let alerter: Arc<dyn AlertSender> = match &config.alert.webhook_url {
        Some(url) => Arc::new(WebhookSender::new(
            url.clone(),
            std::time::Duration::from_secs(config.alert.timeout_seconds),
        )?),
        None => Arc::new(LogSender),
    };

    let engine = Engine::new(config.scheduler.clone(), storage, dispatcher, alerter);
    engine.start().await?;

    info!("monitoring active, press Ctrl+C to shut down");
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping engine"),
        Err(err) => error!("unable to listen for shutdown signal: {err}"),
    }

    engine.stop().await;
    info!("engine stopped, exiting");

    Ok(())
}
