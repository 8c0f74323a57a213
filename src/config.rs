//! Configuration management for Image Vault.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `VAULT_` prefix.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use image_vault::config::{Cli, Command};
//!
//! match Cli::parse().command {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::AddUser(config) => println!("Adding {}", config.name),
//!     Command::Sweep(config) => println!("Sweeping after {} min", config.older_than),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `VAULT_HOST` - Server bind address (default: 0.0.0.0)
//! - `VAULT_PORT` - Server port (default: 3000)
//! - `VAULT_DATABASE` - SQLite database path (default: image-vault.db)
//! - `VAULT_S3_BUCKET` - S3 bucket for image blobs (required for `serve`)
//! - `VAULT_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `VAULT_S3_REGION` - AWS region (default: us-east-1)
//! - `VAULT_TOKEN_SECRET` - HMAC secret for bearer tokens (required for `serve`)
//! - `VAULT_TOKEN_TTL` - Token lifetime in seconds (default: 3600)
//! - `VAULT_MAX_UPLOAD_BYTES` - Largest accepted image (default: 4000000)
//! - `VAULT_DISPLAY_OFFSET_HOURS` - Offset for display times and hour counts (default: -5)
//! - `VAULT_API_PREFIX` - Path the API is mounted under (default: /apiv1)
//! - `VAULT_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::auth::MAX_TOKEN_TTL;
use crate::image::DEFAULT_DISPLAY_OFFSET_HOURS;
use crate::server::DEFAULT_MAX_UPLOAD_BYTES;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default SQLite database path.
pub const DEFAULT_DATABASE: &str = "image-vault.db";

/// Default token lifetime in seconds (1 hour).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default API prefix.
pub const DEFAULT_API_PREFIX: &str = "/apiv1";

/// Default age, in minutes, after which a reservation counts as orphaned.
pub const DEFAULT_SWEEP_AGE_MINUTES: u64 = 60;

/// Shortest secret accepted for signing tokens.
pub const MIN_SECRET_LEN: usize = 16;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Vault - JPEG upload, gallery and statistics service.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-vault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API server.
    Serve(ServeConfig),

    /// Create a user in the credential store.
    AddUser(AddUserConfig),

    /// Remove reservations whose upload never completed.
    Sweep(SweepConfig),
}

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "VAULT_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "VAULT_PORT")]
    pub port: u16,

    /// Path the API routes are mounted under. Use "/" for the root.
    #[arg(long, default_value = DEFAULT_API_PREFIX, env = "VAULT_API_PREFIX")]
    pub api_prefix: String,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// SQLite database holding users and image records.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "VAULT_DATABASE")]
    pub database: String,

    /// S3 bucket receiving the converted images.
    #[arg(long, env = "VAULT_S3_BUCKET")]
    pub s3_bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "VAULT_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "VAULT_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Secret key for signing bearer tokens.
    #[arg(long, env = "VAULT_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,

    /// Token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS, env = "VAULT_TOKEN_TTL")]
    pub token_ttl: u64,

    // =========================================================================
    // Image Configuration
    // =========================================================================
    /// Largest accepted image in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "VAULT_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Hours added to upload times for display and hourly counts.
    #[arg(
        long,
        default_value_t = DEFAULT_DISPLAY_OFFSET_HOURS,
        env = "VAULT_DISPLAY_OFFSET_HOURS",
        allow_hyphen_values = true
    )]
    pub display_offset_hours: i32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "VAULT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.token_secret.as_deref() {
            None => {
                return Err(
                    "No token secret provided. Set --token-secret or VAULT_TOKEN_SECRET"
                        .to_string(),
                )
            }
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(format!(
                    "Token secret must be at least {} bytes",
                    MIN_SECRET_LEN
                ))
            }
            Some(_) => {}
        }

        if self.s3_bucket.is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or VAULT_S3_BUCKET".to_string(),
            );
        }

        if self.database.is_empty() {
            return Err("database path must not be empty".to_string());
        }

        if self.token_ttl == 0 {
            return Err("token_ttl must be greater than 0".to_string());
        }

        if self.token_ttl > MAX_TOKEN_TTL.as_secs() {
            return Err(format!(
                "token_ttl must be at most {} seconds",
                MAX_TOKEN_TTL.as_secs()
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        if !(-23..=23).contains(&self.display_offset_hours) {
            return Err("display_offset_hours must be between -23 and 23".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the token secret, or an empty string if unset (call validate() first).
    pub fn token_secret_or_empty(&self) -> &str {
        self.token_secret.as_deref().unwrap_or("")
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl)
    }
}

/// Options for `add-user`.
#[derive(Args, Debug, Clone)]
pub struct AddUserConfig {
    /// Name of the new user.
    pub name: String,

    /// Password for the new user.
    #[arg(long, env = "VAULT_NEW_USER_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// SQLite database holding users and image records.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "VAULT_DATABASE")]
    pub database: String,
}

impl AddUserConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("user name must not be empty".to_string());
        }
        if self.password.is_empty() {
            return Err("password must not be empty".to_string());
        }
        Ok(())
    }
}

/// Options for `sweep`.
#[derive(Args, Debug, Clone)]
pub struct SweepConfig {
    /// Remove reservations older than this many minutes.
    #[arg(long, default_value_t = DEFAULT_SWEEP_AGE_MINUTES)]
    pub older_than: u64,

    /// SQLite database holding users and image records.
    #[arg(long, default_value = DEFAULT_DATABASE, env = "VAULT_DATABASE")]
    pub database: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SweepConfig {
    pub fn older_than(&self) -> Duration {
        Duration::from_secs(self.older_than.saturating_mul(60))
    }
}

// =============================================================================
// Tests
// =============================================================================
