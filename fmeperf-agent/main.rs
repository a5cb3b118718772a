use axum::{response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fmeperf::{
    CollectorConfig, EventSelector, ExportConfig, FmeDevice, FmeMetricExporter, FmePerfError,
    FmePmu, MetricCollector, Result,
};

#[derive(Parser, Debug)]
#[command(name = "fmeperf")]
#[command(about = "Performance counter exporter for FPGA Management Engines")]
struct Args {
    #[arg(long, help = "PCI address of the FPGA PF (e.g. 0000:5e:00.0); first one found if omitted")]
    device: Option<String>,

    #[arg(long, help = "CPU the counters are read from (default: first online CPU)")]
    cpu: Option<u32>,

    #[arg(
        long = "event",
        help = "Event to export, NAME or NAME@PORT for per-port events (can be specified multiple times; default: all global events)",
        action = clap::ArgAction::Append
    )]
    events: Vec<String>,

    #[arg(long, help = "Collection interval in milliseconds")]
    interval_ms: Option<u64>,

    #[arg(long, help = "Address the /metrics endpoint listens on (default: 0.0.0.0:8080)")]
    listen: Option<SocketAddr>,

    #[arg(long, help = "Load configuration from a JSON file (command-line options override it)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Print the configuration as JSON and exit")]
    dump_config: bool,

    #[arg(long, help = "List the events of the device and exit")]
    list: bool,

    #[arg(long, requires = "list", help = "Print the event listing as JSON")]
    json: bool,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows register selects and feature list walking)"
    )]
    verbose: bool,
}

struct AppState {
    fme_exporter: Option<Arc<FmeMetricExporter>>,
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    fmeperf::gather_metrics!(buffer, encoder, state.fme_exporter, "FME");

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

/// Explain the usual reason a device cannot be opened
fn report_open_error(e: &FmePerfError) {
    if let FmePerfError::MmioError(fmeperf_raw::MmioError::OpenFailed { path, source }) = e {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            eprintln!(
                "\n⚠️  ERROR: Permission denied mapping {}\n\nMapping PCI resources requires root.\n",
                path.display()
            );
        }
    }
}

/// Build the configuration from a file or auto-detection, then apply CLI overrides
fn build_config(args: &Args) -> Result<ExportConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            ExportConfig::load(path)?
        }
        None => ExportConfig::auto_detect(),
    };

    if let Some(device) = &args.device {
        config.device = Some(device.parse()?);
    }
    if let Some(cpu) = args.cpu {
        config.cpu = cpu;
    }
    if !args.events.is_empty() {
        config.events = args
            .events
            .iter()
            .map(|s| s.parse::<EventSelector>())
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(ms) = args.interval_ms {
        if ms == 0 {
            return Err(FmePerfError::ConfigError(
                "--interval-ms must be positive".to_string(),
            ));
        }
        config.interval = Duration::from_millis(ms);
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    Ok(config)
}

fn print_events(pmu: &FmePmu, json: bool) -> Result<()> {
    let info = pmu.info();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    for group in info.attribute_groups.iter().filter(|g| g.name == "events") {
        for attr in &group.attributes {
            println!("  {}/{}/  [{}]", info.name, attr.name, attr.value);
        }
    }
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    tracing::info!("Installing signal handlers...");

    let ctrl_c = async {
        tracing::debug!("Waiting for Ctrl+C...");
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl+C received!"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        tracing::debug!("Waiting for SIGTERM...");
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("SIGTERM received!");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    tracing::warn!("Shutdown signal received, initiating graceful shutdown...");
    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging based on verbose flag, RUST_LOG wins when set
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = build_config(&args)?;

    if args.dump_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let device = match config.device {
        Some(address) => FmeDevice::open(address),
        None => {
            tracing::info!("Auto-detecting FPGA device...");
            FmeDevice::discover()
        }
    }
    .inspect_err(report_open_error)?;

    let pmu = Arc::new(device.attach(config.cpu, config.poll_timeout)?);

    if args.list {
        return print_events(&pmu, args.json);
    }

    let selectors = config.selectors(pmu.catalog());
    tracing::info!(
        "Monitoring {} events on {} (cpu {})",
        selectors.len(),
        device.address(),
        pmu.cpu()
    );

    let fme_exporter = Arc::new(FmeMetricExporter::new(Arc::clone(&pmu), &selectors)?);

    let cancel_token = CancellationToken::new();
    let collector = MetricCollector::new(
        Arc::clone(&fme_exporter),
        CollectorConfig {
            interval: config.interval,
        },
    );
    let collection_handle = collector.start(cancel_token.clone());

    let app_state = Arc::new(AppState {
        fme_exporter: Some(fme_exporter),
    });

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(app_state);

    tracing::warn!("Starting HTTP server on {}", config.listen);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("Server shutdown complete, waiting for collection loop to finish...");

    if let Err(e) = collection_handle.await {
        tracing::error!("Collection loop failed: {}", e);
    }

    tracing::info!("All events closed, exiting");

    Ok(())
}
