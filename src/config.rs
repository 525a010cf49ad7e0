//! Configuration for skilltree
//!
//! CLI arguments with environment variable fallbacks, read through clap.
//! A `.env` file in the working directory is loaded first by `main`.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::types::SkillTreeError;

/// Persistence backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process memory, lost on restart
    Memory,
    /// MongoDB (replica set required for transactions)
    Mongo,
}

/// Skilltree - gamified skill tracking API
#[derive(Parser, Debug, Clone)]
#[command(name = "skilltree")]
#[command(about = "Gamified skill tracking API with XP and levels")]
pub struct Args {
    /// Identifier for this server instance, recorded in the activity log
    #[arg(long, env = "INSTANCE_ID", default_value_t = Uuid::new_v4())]
    pub instance_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Development mode: fixed JWT secret, in-memory store unless overridden
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Storage backend; defaults to memory in dev mode and mongo otherwise
    #[arg(long, env = "STORE", value_enum)]
    pub store: Option<StoreKind>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "skilltree")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required outside dev mode)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// JSONL file receiving achievement and XP events
    #[arg(long, env = "ACTIVITY_LOG")]
    pub activity_log: Option<PathBuf>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "65536")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Backend in effect after applying the dev-mode default
    pub fn store_kind(&self) -> StoreKind {
        self.store.unwrap_or(if self.dev_mode {
            StoreKind::Memory
        } else {
            StoreKind::Mongo
        })
    }

    /// Token signer for this configuration
    pub fn jwt_validator(&self) -> Result<JwtValidator, SkillTreeError> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), self.jwt_expiry_seconds),
            (None, true) => Ok(JwtValidator::new_dev()),
            (None, false) => Err(SkillTreeError::Config(
                "JWT_SECRET is required outside dev mode".into(),
            )),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required outside dev mode".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than zero".to_string());
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}
