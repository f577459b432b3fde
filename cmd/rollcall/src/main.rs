//! rollcall - attendance server.
//!
//! Hosts streaming attendance sessions on `/ws/start_attendance` and the
//! single-image endpoints (`/process_class_image`, `/get_embedding`).

mod config;
mod detector;
mod server;
mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::detector::HttpFaceDetector;
use crate::server::AppState;

/// Attendance server for face-embedding roll calls.
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Attendance server for face-embedding roll calls")]
struct Args {
    /// Config file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file (e.g. :5000)
    #[arg(short, long)]
    addr: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = match &args.config {
        Some(path) => config::load(path)?,
        None => ServerConfig::default(),
    };
    let addr = config::resolve_addr(
        args.addr.as_deref(),
        cfg.addr.as_deref(),
        std::env::var("PORT").ok(),
    )?;

    let roster = cfg.roster_source()?;
    let detector = Arc::new(HttpFaceDetector::new(
        &cfg.detector.url,
        cfg.detector.timeout(),
    )?);
    let state = AppState::new(roster, detector, cfg.session.to_session_config());

    info!(%addr, detector = %cfg.detector.url, "starting rollcall");
    server::serve(addr, state).await
}
