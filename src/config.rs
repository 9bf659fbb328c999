/// Configuration management for Lumenforge
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub blob_directory: PathBuf,
}

/// Media retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Base time-to-live for generated images, in seconds
    pub image_base_ttl_secs: i64,
    /// Base time-to-live for generated videos, in seconds
    pub video_base_ttl_secs: i64,
    /// How often the expiration sweep runs, in seconds
    pub sweep_interval_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Email of the single account allowed through the admin gateway
    pub superadmin_email: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("LUMEN_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("LUMEN_PORT")
            .unwrap_or_else(|_| "8710".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env::var("LUMEN_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("LUMEN_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let db_path = env::var("LUMEN_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("ledger.sqlite"));
        let max_connections = env::var("LUMEN_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let blob_directory = env::var("LUMEN_BLOB_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("blobs"));

        let image_base_ttl_secs = env::var("LUMEN_IMAGE_BASE_TTL_SECS")
            .unwrap_or_else(|_| "1209600".to_string()) // 14 days
            .parse()
            .unwrap_or(1_209_600);
        let video_base_ttl_secs = env::var("LUMEN_VIDEO_BASE_TTL_SECS")
            .unwrap_or_else(|_| "1209600".to_string()) // 14 days
            .parse()
            .unwrap_or(1_209_600);
        let sweep_interval_secs = env::var("LUMEN_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".to_string()) // Daily
            .parse()
            .unwrap_or(86_400);

        let jwt_secret = env::var("LUMEN_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let superadmin_email = env::var("LUMEN_SUPERADMIN_EMAIL")
            .map_err(|_| AppError::Validation("Superadmin email required".to_string()))?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            database: DatabaseConfig {
                path: db_path,
                max_connections,
            },
            storage: StorageConfig { blob_directory },
            retention: RetentionConfig {
                image_base_ttl_secs,
                video_base_ttl_secs,
                sweep_interval_secs,
            },
            auth: AuthConfig {
                jwt_secret,
                superadmin_email,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if !self.auth.superadmin_email.contains('@') {
            return Err(AppError::Validation(
                "Superadmin email must be a valid address".to_string(),
            ));
        }

        if self.retention.image_base_ttl_secs <= 0 || self.retention.video_base_ttl_secs <= 0 {
            return Err(AppError::Validation(
                "Base TTLs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
