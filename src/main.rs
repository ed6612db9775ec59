//! auction-gateway - HTTP/WS gateway for the AuctionSystem contract.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auction_gateway::{
    api,
    contract::{detect_provider, AuctionSystemClient, EthRpcClient},
    service::{run_refresh_loop, AuctionService},
    store::AuctionStore,
};

#[derive(Parser, Debug)]
#[command(name = "auction-gateway")]
#[command(about = "Auction Gateway - listing views and transactions for the AuctionSystem contract")]
struct Args {
    /// JSON-RPC endpoint of the node holding the sender account
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    /// Deployed AuctionSystem contract address
    #[arg(
        long,
        env = "CONTRACT_ADDRESS",
        default_value = "0x79d56F8f0866d8E42F4f3B2e0dd59e5B21c5960C"
    )]
    contract_address: String,

    /// Account transactions are sent from (defaults to the node's first unlocked account)
    #[arg(long, env = "SENDER_ACCOUNT")]
    sender_account: Option<String>,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Snapshot refresh cadence in seconds
    #[arg(long, env = "REFRESH_INTERVAL_SECS", default_value = "15")]
    refresh_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let rpc = EthRpcClient::new(args.rpc_url.clone());
    let provider = detect_provider(&rpc, args.sender_account.clone())
        .await
        .with_context(|| format!("failed to reach JSON-RPC provider at {}", args.rpc_url))?;
    info!(
        account = %provider.account,
        network = %provider.network_id,
        contract = %args.contract_address,
        "connected to provider"
    );

    let contract = AuctionSystemClient::new(rpc, args.contract_address, provider.account);
    let service = Arc::new(AuctionService::new(Arc::new(contract), AuctionStore::new()));

    match service.refresh().await {
        Ok(count) => info!(auctions = count, "initial snapshot loaded"),
        Err(err) => warn!(error = %err, "initial refresh failed; starting with an empty snapshot"),
    }

    tokio::spawn(run_refresh_loop(service.clone(), args.refresh_interval_secs));

    let app = api::create_router(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;
    info!(port = args.port, "auction gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auction_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
