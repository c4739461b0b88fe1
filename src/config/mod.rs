//! Configuration module for the club content backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Which document store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StoreBackend::Sqlite),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

/// Credentials for the account created on first start.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub secret: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Document store backend
    pub store: StoreBackend,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Administrator account ensured at startup
    pub bootstrap_admin: Option<BootstrapAdmin>,
    /// How long a signed-in session stays valid
    pub session_ttl: Duration,
    /// How long a notification stays queued before auto-dismissal
    pub notification_ttl: Duration,
    /// Write bundled fallback content that is missing from the store
    pub seed_on_start: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let store = match env::var("CLUB_STORE") {
            Ok(raw) => StoreBackend::from_str(&raw).ok_or_else(|| {
                AppError::Validation(format!("Invalid CLUB_STORE value: {}", raw))
            })?,
            Err(_) => StoreBackend::Sqlite,
        };

        let db_path = env::var("CLUB_DB_PATH")
            .unwrap_or_else(|_| "./data/club.sqlite".to_string())
            .into();

        let bind_addr = env::var("CLUB_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid CLUB_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("CLUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let bootstrap_admin = match (env::var("CLUB_ADMIN_EMAIL"), env::var("CLUB_ADMIN_SECRET")) {
            (Ok(email), Ok(secret)) if !email.trim().is_empty() && !secret.is_empty() => {
                Some(BootstrapAdmin {
                    email: email.trim().to_string(),
                    secret,
                })
            }
            _ => None,
        };

        let session_minutes = parse_u64("CLUB_SESSION_TTL_MINUTES", 720)?;
        let notification_ms = parse_u64("CLUB_NOTIFICATION_TTL_MS", 3000)?;

        let seed_on_start = env::var("CLUB_SEED_ON_START")
            .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            store,
            db_path,
            bind_addr,
            log_level,
            bootstrap_admin,
            session_ttl: Duration::from_secs(session_minutes * 60),
            notification_ttl: Duration::from_millis(notification_ms),
            seed_on_start,
        })
    }
}

fn parse_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid {} value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
