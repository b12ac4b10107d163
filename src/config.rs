//! Configuration for the brain service
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// LearnCard Network brain
#[derive(Parser, Debug, Clone)]
#[command(name = "lcn-brain")]
#[command(about = "LearnCard Network brain: credential transfer, claim hooks and DID documents")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Public domain of this network (e.g. "network.learncard.com").
    /// When unset the request's Host header is used.
    #[arg(long, env = "DOMAIN_NAME")]
    pub domain_name: Option<String>,

    /// Hex-encoded 32-byte seed of the server identity (required in production)
    #[arg(long, env = "SEED")]
    pub seed: Option<String>,

    /// Enable development mode (in-memory fallbacks, generated secrets)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "lcn_brain")]
    pub mongodb_db: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// How long generated DID documents stay cached
    #[arg(long, env = "DID_CACHE_TTL_SECS", default_value = "3600")]
    pub did_cache_ttl_secs: u64,

    /// Expiry of a held DID generation lock
    #[arg(long, env = "DID_LOCK_TTL_MS", default_value = "10000")]
    pub did_lock_ttl_ms: u64,

    /// How long a request waits for a DID generation lock
    #[arg(long, env = "DID_LOCK_WAIT_MS", default_value = "5000")]
    pub did_lock_wait_ms: u64,

    /// Capacity of the notification outbox
    #[arg(long, env = "NOTIFICATION_QUEUE_SIZE", default_value = "1024")]
    pub notification_queue_size: usize,

    /// Request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    pub fn did_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.did_cache_ttl_secs)
    }

    pub fn did_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.did_lock_ttl_ms)
    }

    pub fn did_lock_wait(&self) -> Duration {
        Duration::from_millis(self.did_lock_wait_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.seed.is_none() {
                return Err("SEED is required in production mode".to_string());
            }
        }

        if let Some(seed) = &self.seed {
            if seed.len() != 64 || !seed.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("SEED must be 64 hex characters".to_string());
            }
        }

        if self.did_lock_wait_ms == 0 {
            return Err("DID_LOCK_WAIT_MS must be greater than zero".to_string());
        }

        if self.did_lock_ttl_ms < self.did_lock_wait_ms {
            return Err("DID_LOCK_TTL_MS must be at least DID_LOCK_WAIT_MS".to_string());
        }

        if self.notification_queue_size == 0 {
            return Err("NOTIFICATION_QUEUE_SIZE must be greater than zero".to_string());
        }

        Ok(())
    }
}
