use anyhow::Context;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use clap::{Parser, Subcommand};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use switchtec::common::{pci, MappedWindow, PciAddress};
use switchtec::events::{kind_by_name, parse_flags};
use switchtec::{
    Device, DeviceConfig, DeviceMetricExporter, EventIndex, EventPoller, EventSource, ServeConfig,
};
use switchtec_raw::layout::mrpc::PAYLOAD_SIZE;
use switchtec_raw::EventFlags;

#[derive(Parser, Debug)]
#[command(name = "switchtec")]
#[command(about = "Control-plane agent for Switchtec PCIe fabric switches")]
struct Args {
    #[arg(long, help = "PCI address of the management endpoint (default: first found)")]
    device: Option<String>,

    #[arg(short, long, help = "Enable verbose logging (shows every MRPC register step)")]
    verbose: bool,

    #[arg(long, help = "MRPC timeout in milliseconds (overrides SWITCHTEC_TIMEOUT_MS)")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List switch endpoints found in sysfs
    List,

    /// Print partition, system and flash information
    Info,

    /// Show event summaries, optionally changing event enables first
    Events {
        #[arg(long, help = "Service pending events before printing")]
        dispatch: bool,

        #[arg(long, value_name = "KIND", help = "Event kind to enable (e.g. link_state)")]
        enable: Option<String>,

        #[arg(long, value_name = "KIND", help = "Event kind to disable")]
        disable: Option<String>,

        #[arg(long, default_value = "log,cli,irq", help = "Comma-separated log,cli,irq,fatal")]
        flags: String,

        #[arg(long, help = "Partition or PFF index (default: every index)")]
        index: Option<usize>,
    },

    /// Run one MRPC command and print its output
    Mrpc {
        #[arg(value_parser = parse_u32, help = "Command id (decimal or 0x hex)")]
        cmd: u32,

        #[arg(value_parser = parse_u8, help = "Input payload bytes")]
        bytes: Vec<u8>,

        #[arg(long, default_value_t = PAYLOAD_SIZE, help = "Output bytes to return")]
        output_len: usize,
    },

    /// Poll events and serve /metrics, /health and /events
    Serve {
        #[arg(long, help = "Listen address (default 0.0.0.0:8080)")]
        listen: Option<SocketAddr>,
    },
}

fn parse_u32(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("{s}: {e}"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_u32(s)?;
    u8::try_from(value).map_err(|_| format!("{s}: byte out of range"))
}

struct AppState {
    device: Arc<Device>,
    exporter: Option<Arc<DeviceMetricExporter>>,
}

#[derive(Serialize)]
struct HealthReport {
    alive: bool,
    death_reason: Option<&'static str>,
    partition: usize,
    partition_count: usize,
    pff_count: usize,
    local_pffs: Vec<usize>,
    event_count: u64,
    mrpc_busy: bool,
    mrpc_queued: usize,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    switchtec::gather_metrics!(buffer, encoder, state.exporter, "device");

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let device = &state.device;
    let topology = device.topology();
    let report = HealthReport {
        alive: device.is_alive(),
        death_reason: device.death_reason().map(|r| r.name()),
        partition: topology.partition(),
        partition_count: topology.partition_count(),
        pff_count: topology.pff_count(),
        local_pffs: topology.local().iter().collect(),
        event_count: device.events().event_count(),
        mrpc_busy: device.mrpc().is_busy(),
        mrpc_queued: device.mrpc().queued(),
    };
    let status = if report.alive {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn events_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let device = Arc::clone(&state.device);
    match tokio::task::spawn_blocking(move || device.events().snapshot()).await {
        Ok(Ok(snapshot)) => Json(snapshot).into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Ctrl+C received!");
    };

    #[cfg(unix)]
    let terminate = async {
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("Shutdown signal received, initiating graceful shutdown...");
    cancel_token.cancel();
}

fn device_config(args: &Args) -> DeviceConfig {
    let config = DeviceConfig::from_env();
    match args.timeout_ms {
        Some(ms) => config.with_timeout(Duration::from_millis(ms)),
        None => config,
    }
}

fn open_device(args: &Args) -> anyhow::Result<Device> {
    let address = args
        .device
        .as_deref()
        .map(str::parse::<PciAddress>)
        .transpose()?;
    let endpoint = pci::find_management(address)?;
    tracing::info!("Using management endpoint {}", endpoint.address);

    let window = MappedWindow::open(&endpoint.resource0())
        .with_context(|| format!("mapping BAR0 of {}", endpoint.address))?;
    Ok(Device::probe(Arc::new(window), device_config(args))?)
}

fn list() -> anyhow::Result<()> {
    let endpoints = pci::discover()?;
    if endpoints.is_empty() {
        println!("No Switchtec endpoints found");
    }
    for endpoint in endpoints {
        println!(
            "{}  {:<10}  device 0x{:04x}",
            endpoint.address,
            endpoint.kind.name(),
            endpoint.device_id
        );
    }
    Ok(())
}

fn info(device: &Device) -> anyhow::Result<()> {
    let topology = device.topology();
    println!(
        "Partition {} of {}, {} PFFs, local PFFs {:?}",
        topology.partition(),
        topology.partition_count(),
        topology.pff_count(),
        topology.local().iter().collect::<Vec<_>>()
    );

    let sys_info = device.sys_info()?;
    println!("Firmware {}", sys_info.firmware_version_string());
    println!("{}", serde_json::to_string_pretty(&sys_info)?);
    println!("{}", serde_json::to_string_pretty(&device.flash_info()?)?);
    Ok(())
}

fn events(
    device: &Device,
    dispatch: bool,
    enable: Option<&str>,
    disable: Option<&str>,
    flags: &str,
    index: Option<usize>,
) -> anyhow::Result<()> {
    let flags: EventFlags =
        parse_flags(flags).with_context(|| format!("invalid event flags: {flags}"))?;
    let source = |name: &str| -> anyhow::Result<EventSource> {
        let kind = kind_by_name(name).with_context(|| format!("unknown event kind: {name}"))?;
        Ok(EventSource {
            kind,
            index: index.map_or(EventIndex::All, EventIndex::One),
        })
    };

    if let Some(name) = enable {
        let written = device.events().enable(source(name)?, flags)?;
        println!("Enabled {name} on {written} source(s)");
    }
    if let Some(name) = disable {
        let written = device.events().disable(source(name)?, flags)?;
        println!("Disabled {name} on {written} source(s)");
    }
    if dispatch {
        println!("Serviced {} event(s)", device.events().dispatch_all()?);
    }

    println!("{}", serde_json::to_string_pretty(&device.events().snapshot()?)?);
    Ok(())
}

fn mrpc(device: &Device, cmd: u32, input: &[u8], output_len: usize) -> anyhow::Result<()> {
    let output = device.execute(cmd, input, output_len)?;
    for chunk in output.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{}", line.join(" "));
    }
    Ok(())
}

async fn serve(device: Device, config: ServeConfig) -> anyhow::Result<()> {
    let device = Arc::new(device);
    let cancel_token = CancellationToken::new();

    let exporter = match DeviceMetricExporter::new(Arc::clone(&device)) {
        Ok(exporter) => Some(Arc::new(exporter)),
        Err(e) => {
            tracing::error!("Failed to initialize device exporter: {}", e);
            None
        }
    };

    let poll_handle = EventPoller::new(Arc::clone(&device), exporter.clone()).start(cancel_token.clone());

    let app_state = Arc::new(AppState { device, exporter });
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/events", get(events_handler))
        .with_state(app_state);

    tracing::warn!("Starting HTTP server on {}", config.listen);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    tracing::info!("Server shutdown complete, waiting for event poller to finish...");
    if let Err(e) = poll_handle.await {
        tracing::error!("Event poller task failed: {}", e);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Command::List = args.command {
        return list();
    }

    let device = open_device(&args)?;
    match &args.command {
        Command::List => Ok(()),
        Command::Info => info(&device),
        Command::Events {
            dispatch,
            enable,
            disable,
            flags,
            index,
        } => events(
            &device,
            *dispatch,
            enable.as_deref(),
            disable.as_deref(),
            flags,
            *index,
        ),
        Command::Mrpc {
            cmd,
            bytes,
            output_len,
        } => mrpc(&device, *cmd, bytes, *output_len),
        Command::Serve { listen } => {
            let mut config = ServeConfig::default();
            if let Some(listen) = listen {
                config.listen = *listen;
            }
            serve(device, config).await
        }
    }
}
