use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use wakatime_exporter::log_filter::LogFilter;
use wakatime_exporter::server::{self, AppState};
use wakatime_exporter::{CollectorRegistry, Exporter, Opts};

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    tracing_subscriber::registry()
        .with(tracing_logfmt::layer().with_filter(LogFilter::new(opts.log_level)))
        .init();

    if let Err(err) = run(opts).await {
        error!(error = %err, "wakatime_exporter failed");
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting wakatime_exporter");

    let inputs = opts.common_inputs()?;
    let addr = opts.socket_addr()?;
    let metrics_path = opts.metrics_path()?.to_owned();

    let mut registry = CollectorRegistry::builtin();
    if opts.disable_default_collectors {
        registry.disable_defaults();
    }
    for name in registry.names() {
        info!(
            collector = name,
            enabled = registry.is_default_enabled(name).unwrap_or_default(),
            "registered collector"
        );
    }

    let self_metrics = if opts.disable_exporter_metrics {
        None
    } else {
        let handle = PrometheusBuilder::new().install_recorder()?;
        wakatime_exporter::init_metrics();
        Some(handle)
    };

    let state = Arc::new(AppState {
        exporter: Exporter::new(registry, inputs)?,
        metrics_path,
        self_metrics,
    });
    let app = server::router(state);

    info!(address = %addr, "listening");
    axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
