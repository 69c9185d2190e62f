use std::sync::Arc;

use clap::Parser;
use kvsniff::{
    capture::CaptureSource,
    error::Result,
    flow::registry::FlowRegistry,
    format::FormatPlan,
    packet::dispatcher::Dispatcher,
    runtime::{cli::Cli, conf::Conf},
    stats::{
        aggregate::{Aggregator, SniffStats},
        reporter::Reporter,
    },
};
use tokio::{signal, sync::mpsc, task};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Capacity of the channel between the capture loop and the dispatcher.
const FRAME_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let conf = Conf::from_cli(Cli::parse())?;
    init_tracing();

    info!("initializing sniffing on {}:{}", conf.interface, conf.port);

    let plan = Arc::new(FormatPlan::compile(&conf.format));
    let aggregator = Arc::new(Aggregator::default());
    let stats = Arc::new(SniffStats::new());

    let source = CaptureSource::open(&conf)?;

    let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let capture_task = task::spawn_blocking(move || source.run(frames_tx));

    let registry = FlowRegistry::new(
        Arc::clone(&plan),
        Arc::clone(&aggregator),
        Arc::clone(&stats),
        conf.verbose,
    );
    let dispatcher = Dispatcher::new(conf.port, registry, frames_rx);
    let dispatch_task = tokio::spawn(dispatcher.run());

    let reporter = Reporter::new(
        conf.report_period,
        conf.display_count,
        Arc::clone(&aggregator),
        Arc::clone(&stats),
    );
    tokio::spawn(reporter.run());

    info!("waiting for packets - press ctrl+c to exit");

    tokio::select! {
        res = capture_task => {
            res??;
            Ok(())
        }
        res = dispatch_task => {
            res??;
            Ok(())
        }
        res = signal::ctrl_c() => {
            res?;
            info!("exiting");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
