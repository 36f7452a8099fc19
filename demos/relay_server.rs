//! Frame relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR] [--mirror] [--font PATH]
//!
//! Examples:
//!   cargo run --example relay_server                     # binds to 0.0.0.0:8000
//!   cargo run --example relay_server localhost           # binds to 127.0.0.1:8000
//!   cargo run --example relay_server 127.0.0.1:9000      # binds to 127.0.0.1:9000
//!   cargo run --example relay_server -- --mirror         # flips every frame horizontally
//!
//! Clients connect to ws://HOST:PORT/image_process and send
//!   {"image": "data:image/jpeg;base64,...", "bboxes": [...], "seg_image": "..."}
//! The server answers with {"image": "...", "seg_image": "..."} at a steady
//! cadence. Sending the text "close" ends the session.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use frame_relay::error::ProcessorError;
use frame_relay::media::Frame;
use frame_relay::processor::{FnProcessor, PassthroughProcessor, ProcessParams};
use frame_relay::{FrameProcessor, FrameServer, ServerConfig};

const DEFAULT_PORT: u16 = 8000;

/// Parse bind address from command line argument
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8000
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8000
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR] [--mirror] [--font PATH]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8000)");
    eprintln!("  --mirror     Flip frames horizontally instead of passing them through");
    eprintln!("  --font PATH  TrueType font for labels and timestamps");
}

fn mirror(frame: &Frame, _params: &ProcessParams) -> Result<Frame, ProcessorError> {
    let flipped = image::imageops::flip_horizontal(&frame.to_image());
    Ok(Frame::from_image(flipped))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut bind_addr = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT));
    let mut use_mirror = false;
    let mut font_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mirror" => use_mirror = true,
            "--font" => match iter.next() {
                Some(path) => font_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("Error: --font needs a path");
                    print_usage();
                    std::process::exit(1);
                }
            },
            other => match parse_bind_addr(other) {
                Ok(addr) => bind_addr = addr,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    eprintln!();
                    print_usage();
                    std::process::exit(1);
                }
            },
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::with_addr(bind_addr);
    if let Some(path) = font_path {
        config = config.font_path(path);
    }

    let processor: Arc<dyn FrameProcessor> = if use_mirror {
        Arc::new(FnProcessor::new("mirror", mirror))
    } else {
        Arc::new(PassthroughProcessor)
    };

    println!("Starting frame relay on ws://{}{}", config.bind_addr, config.path);
    println!("Processor: {}", processor.name());
    println!();

    let server = Arc::new(FrameServer::with_shared_processor(config, processor));

    // Periodic stats
    let registry = Arc::clone(server.registry());
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            let stats = registry.server_stats().await;
            if stats.active_sessions > 0 {
                println!(
                    "Stats: sessions={}/{} received={} sent={}",
                    stats.active_sessions, stats.total_sessions, stats.frames_received, stats.frames_sent
                );
            }
        }
    });

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    stats_task.abort();
    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
