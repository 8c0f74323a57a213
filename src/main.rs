//! Image Vault - JPEG upload, gallery and statistics service.
//!
//! This binary starts the HTTP server or runs one of the maintenance commands.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_vault::{
    auth::{hash_password, AuthService, TokenSigner},
    config::{AddUserConfig, Cli, Command, ServeConfig, SweepConfig},
    create_s3_client,
    image::{display_offset, ImageService},
    server::{create_router, AppState, RouterConfig},
    store::{sweep_reservations, MetadataStore, SqliteStore},
    S3ObjectStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::AddUser(config) => run_add_user(config).await,
        Command::Sweep(config) => run_sweep(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Image Vault v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Database: {}", config.database);
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!("  Token lifetime: {}s", config.token_ttl);
    info!("  Display offset: {}h", config.display_offset_hours);

    let store = match SqliteStore::open(&config.database) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open database '{}': {}", config.database, e);
            return ExitCode::FAILURE;
        }
    };

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let objects = S3ObjectStore::new(s3_client, config.s3_bucket.clone());

    info!("Connecting to S3...");
    if let Err(e) = objects.check_bucket().await {
        error!("Failed to reach bucket '{}': {}", objects.bucket(), e);
        error!("Please check:");
        error!("  - Your AWS credentials are configured correctly");
        error!("  - The bucket '{}' exists and is accessible", objects.bucket());
        error!("  - The S3 endpoint is correct (if using MinIO/custom S3)");
        return ExitCode::FAILURE;
    }
    info!("  Connected successfully");

    let Some(offset) = display_offset(config.display_offset_hours) else {
        error!("Invalid display offset: {}", config.display_offset_hours);
        return ExitCode::FAILURE;
    };

    let signer = TokenSigner::new(config.token_secret_or_empty(), config.token_ttl());
    let auth = AuthService::new(Arc::clone(&store), signer);
    let images = ImageService::new(store, Arc::new(objects)).with_display_offset(offset);

    let router = create_router(AppState::new(auth, images), build_router_config(&config));

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on http://{}", addr);
    info!("  curl http://{}/health", addr);

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the serve options.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_api_prefix(config.api_prefix.as_str())
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Add User Command
// =============================================================================

async fn run_add_user(config: AddUserConfig) -> ExitCode {
    init_logging(false);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let store = match SqliteStore::open(&config.database) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: failed to open database '{}': {}", config.database, e);
            return ExitCode::FAILURE;
        }
    };

    let password_hash = match hash_password(&config.password) {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let name = config.name.trim();
    match store.insert_user(name, &password_hash).await {
        Ok(id) => {
            println!("Created user '{}' with id {}", name, id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Sweep Command
// =============================================================================

async fn run_sweep(config: SweepConfig) -> ExitCode {
    init_logging(config.verbose);

    let store = match SqliteStore::open(&config.database) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open database '{}': {}", config.database, e);
            return ExitCode::FAILURE;
        }
    };

    match sweep_reservations(&store, config.older_than()).await {
        Ok(removed) => {
            info!(
                removed = removed,
                older_than_minutes = config.older_than,
                "Swept orphaned reservations"
            );
            println!("Removed {} orphaned reservation(s)", removed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Sweep failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_vault=debug,tower_http=debug"
    } else {
        "image_vault=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
