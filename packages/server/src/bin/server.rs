//! Ride-dispatch server.
//!
//! Accepts WebSocket connections from drivers and riders and serves the
//! dispatch HTTP API.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin ridelink-server
//! cargo run --bin ridelink-server -- --host 0.0.0.0 --port 3000 --offer-timeout-secs 10
//! ```

use std::time::Duration;

use clap::Parser;
use ridelink_server::{
    ui::{Server, state::AppState},
    usecase::{DEFAULT_CALL_TIMEOUT, DispatchConfig, UnreachablePolicy},
};
use ridelink_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "ridelink-server")]
#[command(about = "Realtime ride-dispatch server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds a driver has to answer a ride offer
    #[arg(long, default_value = "20")]
    offer_timeout_secs: u64,

    /// Number of candidate drivers offered per dispatch (1-5)
    #[arg(long, default_value = "5")]
    max_candidates: usize,

    /// Skip candidates without a live connection instead of failing the dispatch
    #[arg(long)]
    skip_unreachable: bool,

    /// Seconds a callee has to answer an incoming call
    #[arg(long, default_value_t = DEFAULT_CALL_TIMEOUT.as_secs())]
    call_timeout_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "debug")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let policy = if args.skip_unreachable {
        UnreachablePolicy::Skip
    } else {
        UnreachablePolicy::FailFast
    };
    let config = DispatchConfig::new(
        Duration::from_secs(args.offer_timeout_secs),
        args.max_candidates,
        policy,
    );
    tracing::info!(
        offer_timeout_secs = args.offer_timeout_secs,
        max_candidates = config.max_candidates,
        ?policy,
        call_timeout_secs = args.call_timeout_secs,
        "dispatch configured"
    );

    let call_timeout = Duration::from_secs(args.call_timeout_secs);
    let server = Server::new(AppState::in_memory(config, call_timeout));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
