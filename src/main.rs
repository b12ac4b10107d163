//! LearnCard Network brain service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use lcn_brain::{
    config::Args,
    db::MongoClient,
    did::{DidCacheConfig, DidDocCache, DistributedLock, MemoryDidCache, MemoryLock, MongoDidCache, MongoLock},
    graph::{GraphStore, MemoryGraph, MongoGraph},
    identity::{DidCapability, DidResolver, Ed25519Identity},
    logging,
    nats::NatsClient,
    notifications::{LoggingSink, NatsSink, NotificationSink},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init_tracing(&args.log_level, args.log_json);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  LearnCard Network brain");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Domain: {}", args.domain_name.as_deref().unwrap_or("(from Host header)"));
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("NATS: {}", args.nats.nats_url);
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("======================================");

    let resolver = Arc::new(DidResolver::new());
    let identity: Arc<dyn DidCapability> = match &args.seed {
        Some(seed) => Arc::new(Ed25519Identity::from_hex_seed(seed, resolver)?),
        None => {
            warn!("No SEED configured (dev mode), using an ephemeral server identity");
            Arc::new(Ed25519Identity::from_seed(ephemeral_seed(), resolver))
        }
    };
    info!("Server DID: {}", identity.did());

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing in memory): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (graph, cache, lock, backend): (
        Arc<dyn GraphStore>,
        Arc<dyn DidDocCache>,
        Arc<dyn DistributedLock>,
        &'static str,
    ) = match &mongo {
        Some(client) => (
            Arc::new(MongoGraph::new(client).await?),
            Arc::new(MongoDidCache::new(client, args.did_cache_ttl()).await?),
            Arc::new(MongoLock::new(client, args.did_lock_ttl(), args.did_lock_wait()).await?),
            "mongodb",
        ),
        None => (
            Arc::new(MemoryGraph::new()),
            Arc::new(MemoryDidCache::new(DidCacheConfig {
                ttl: args.did_cache_ttl(),
                ..Default::default()
            })),
            Arc::new(MemoryLock::new(args.did_lock_wait())),
            "memory",
        ),
    };

    // Connect to NATS (optional in dev mode)
    let sink: Arc<dyn NotificationSink> = match NatsClient::new(&args.nats, "lcn-brain").await {
        Ok(client) => {
            info!("NATS connected successfully");
            Arc::new(NatsSink::new(client))
        }
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, logging notifications): {}", e);
                Arc::new(LoggingSink)
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (state, dispatcher) =
        AppState::new(args, graph, identity, cache, lock, sink, backend).await?;
    let state = Arc::new(state);

    let result = server::run(state).await;
    dispatcher.abort();

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// Random seed for a server identity that lives as long as the process
fn ephemeral_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    seed[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    seed
}
