//! # Image Vault
//!
//! An authenticated image upload service. Users log in, upload JPEG images
//! that are converted to PNG and stored in S3-compatible object storage, then
//! browse, filter and delete them alongside per-hour and per-user upload
//! counts.
//!
//! ## Architecture
//!
//! - [`auth`] - Password checks and signed bearer tokens
//! - [`store`] - Metadata store for users and image records (SQLite)
//! - [`storage`] - Blob storage for converted images (S3)
//! - [`mod@image`] - Conversion, filter parsing and the image request flows
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use image_vault::{
//!     create_router, create_s3_client, AppState, AuthService, ImageService, RouterConfig,
//!     S3ObjectStore, SqliteStore, TokenSigner, DEFAULT_TOKEN_TTL,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SqliteStore::open("image-vault.db").unwrap());
//!     let client = create_s3_client(None, "us-east-1").await;
//!     let objects = Arc::new(S3ObjectStore::new(client, "my-images"));
//!
//!     let signer = TokenSigner::new("a-long-random-secret", DEFAULT_TOKEN_TTL);
//!     let state = AppState::new(
//!         AuthService::new(Arc::clone(&store), signer),
//!         ImageService::new(store, objects),
//!     );
//!
//!     let router = create_router(state, RouterConfig::new().with_api_prefix("/apiv1"));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod image;
pub mod server;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use auth::{AuthService, Claims, Session, TokenSigner, DEFAULT_TOKEN_TTL};
pub use config::{AddUserConfig, Cli, Command, ServeConfig, SweepConfig};
pub use error::{AuthError, ConvertError, FilterError, ImageError, ObjectStoreError, StoreError};
pub use image::{
    DeleteOutcome, FilterParams, ImageQueryResult, ImageService, PngConverter, StoredImage,
    UploadRequest,
};
pub use server::{create_router, ApiResponse, AppState, AuthUser, RouterConfig};
pub use storage::{create_s3_client, MemoryObjectStore, ObjectStore, S3ObjectStore};
pub use store::{
    HourlyCount, Image, ImageFilter, ImageId, ImageRecord, MetadataStore, OwnerCount,
    SqliteStore, User, UserId, UserSummary,
};
