//! frame-relay - broadcast a piped image stream to WebSocket viewers
//!
//! Reads concatenated JPEG or PNG images from stdin, splits them into frames
//! and sends every frame to all clients connected to `/ws`. Any other path is
//! served from the static directory, which usually holds a viewer page.
//!
//! # Usage
//!
//! ```bash
//! # MJPEG from a webcam, viewer page in ./static
//! ffmpeg -f v4l2 -i /dev/video0 -f image2pipe -c:v mjpeg - \
//!     | frame-relay -l :8080 --static-dir static
//!
//! # PNG screenshots with CRC checking
//! ffmpeg -f x11grab -i :0 -f image2pipe -c:v png - \
//!     | frame-relay -s png --verify-crc
//!
//! # Debug logging (overrides -v)
//! RUST_LOG=frame_relay=debug frame-relay
//! ```
//!
//! When stdin ends the HTTP server keeps running; stop it with Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing_subscriber::EnvFilter;

use frame_relay::relay::config::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_REGISTRATION_CAPACITY};
use frame_relay::relay::FrameSender;
use frame_relay::server::parse_listen_addr;
use frame_relay::{
    run_ingest, ImageFormat, Relay, RelayConfig, RelayServer, RelayStats, ServerConfig,
};

/// Read buffer in front of stdin
const STDIN_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Broadcast a piped JPEG/PNG stream to WebSocket viewers
#[derive(Parser, Debug)]
#[command(name = "frame-relay", version, about)]
struct Args {
    /// Address to listen on (`:8080`, `8080` or `host:port`)
    #[arg(short = 'l', long, default_value = ":8080", value_parser = parse_listen_addr)]
    listen: SocketAddr,

    /// Input image format: jpg, jpeg or png
    #[arg(short = 's', long, default_value = "jpg")]
    format: ImageFormat,

    /// Viewer queue depth; each new frame still replaces a pending one
    #[arg(short = 'q', long, default_value_t = 1)]
    queue: usize,

    /// Log verbosity: 1 error, 2 warn, 3 info, 4 debug, 5 trace
    #[arg(short = 'v', long, default_value_t = 3)]
    verbosity: u8,

    /// Largest accepted frame in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Viewers that may wait for admission at once
    #[arg(long, default_value_t = DEFAULT_REGISTRATION_CAPACITY)]
    registration_capacity: usize,

    /// Directory served on every path except /ws
    #[arg(long, default_value = ".")]
    static_dir: PathBuf,

    /// Maximum concurrent viewers (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,

    /// Check PNG chunk checksums and stop on a mismatch
    #[arg(long)]
    verify_crc: bool,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value_t = 30)]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbosity);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 | 1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> frame_relay::Result<()> {
    let relay_config = RelayConfig::with_format(args.format)
        .mailbox_capacity(args.queue)
        .registration_capacity(args.registration_capacity)
        .max_frame_size(args.max_frame_size)
        .verify_checksums(args.verify_crc);

    let (relay, dispatcher, intake) = Relay::new(relay_config.clone())?;
    let stats = Arc::clone(relay.stats());

    tokio::spawn(dispatcher.run());
    tokio::spawn(async move {
        let stdin = BufReader::with_capacity(STDIN_BUFFER_SIZE, tokio::io::stdin());
        ingest_until_end(stdin, &relay_config, intake, stats).await;
    });

    let server_config = ServerConfig::with_addr(args.listen)
        .static_dir(args.static_dir)
        .max_connections(args.max_connections)
        .stats_interval(Duration::from_secs(args.stats_interval));

    RelayServer::new(server_config, relay)
        .run_until(shutdown_signal())
        .await
}

/// Run ingest to completion and report how it ended
///
/// Returns `true` when the input closed cleanly between frames.
async fn ingest_until_end<R>(
    reader: R,
    config: &RelayConfig,
    intake: FrameSender,
    stats: Arc<RelayStats>,
) -> bool
where
    R: AsyncBufRead + Unpin,
{
    match run_ingest(reader, config, intake, stats).await {
        Ok(()) => {
            tracing::info!("Input ended cleanly; still serving static files");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Input failed; still serving static files");
            false
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
