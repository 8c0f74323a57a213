//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /health                       - Health check (public)
//! {prefix}/user/login   POST    - Login (public)
//! {prefix}/user         GET     - List users (protected)
//! {prefix}/image        GET     - List images and counts (protected)
//! {prefix}/image        POST    - Upload an image (protected)
//! {prefix}/image/{id}   DELETE  - Delete an image (protected)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::new(auth_service, image_service);
//! let config = RouterConfig::new().with_api_prefix("/apiv1");
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::auth_middleware;
use super::handlers::{
    delete_image_handler, health_handler, list_images_handler, login_handler, upload_handler,
    users_handler, AppState, DEFAULT_MAX_UPLOAD_BYTES,
};
use crate::storage::ObjectStore;
use crate::store::MetadataStore;

/// Allowance for multipart boundaries and the text fields on top of the
/// image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Path the API routes are nested under (None = mounted at the root)
    pub api_prefix: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Largest accepted image payload in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_prefix: None,
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }
}

impl RouterConfig {
    /// Routes at the root, any CORS origin, 4 MB uploads, tracing on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nest the API routes under `prefix` (e.g. `/apiv1`).
    ///
    /// An empty prefix or `/` mounts them at the root.
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            None
        } else if trimmed.starts_with('/') {
            Some(trimmed.to_string())
        } else {
            Some(format!("/{}", trimmed))
        };
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
///
/// The upload limit in `config` overrides the one on `state`.
pub fn create_router<M, O>(state: AppState<M, O>, config: RouterConfig) -> Router
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let state = state.with_max_upload_bytes(config.max_upload_bytes);
    let signer = state.auth.signer().clone();

    let protected_routes = Router::new()
        .route("/user", get(users_handler::<M, O>))
        .route(
            "/image",
            get(list_images_handler::<M, O>).post(upload_handler::<M, O>),
        )
        .route("/image/{id}", delete(delete_image_handler::<M, O>))
        .layer(middleware::from_fn_with_state(signer, auth_middleware));

    let api_routes: Router = Router::new()
        .merge(protected_routes)
        .route("/user/login", post(login_handler::<M, O>))
        .layer(DefaultBodyLimit::max(
            config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .with_state(state);

    let router = match &config.api_prefix {
        Some(prefix) => Router::new().nest(prefix, api_routes),
        None => api_routes,
    };

    let router = router
        .route("/health", get(health_handler))
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
