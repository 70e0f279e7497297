use clap::Parser;
use loadprobe_target::{RouteConfig, RoutesFile, Target, TargetConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loadprobe-target")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    address: SocketAddr,

    /// Path to a JSON file with `routes` and an optional `fallback`.
    #[arg(long)]
    routes: Option<std::path::PathBuf>,

    /// Status returned for unmatched requests when no routes file sets one.
    #[arg(long, default_value_t = 200)]
    status: u16,

    /// Delay applied to unmatched requests, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let file: RoutesFile = match &args.routes {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => RoutesFile::default(),
    };

    let mut config = TargetConfig::new(args.address)
        .with_fallback(file.fallback.unwrap_or_else(|| RouteConfig::new(args.status, args.delay_ms)));
    config.routes = file.routes;

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(Target::new(config).run(ready_tx));
    if let Ok(addr) = ready_rx.await {
        println!("loadprobe-target listening on {addr}");
    }
    server.await?
}
