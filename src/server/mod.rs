//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        /user/login   /user   /image   /image/{id}               │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (envelope)  │  │  (bearer)   │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!        AuthService                     ImageService
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{auth_middleware, extract_token, AuthUser};
pub use handlers::{
    parse_upload_date, ApiResponse, AppState, HealthResponse, ImageListParams, LoginRequest,
    DEFAULT_MAX_UPLOAD_BYTES, MSG_CANNOT_PASS, MSG_FAIL_TOKEN, MSG_INCORRECT_PASSWORD, MSG_OK,
    MSG_SERVER_ERROR, MSG_UNAUTHORIZED,
};
pub use routes::{create_router, RouterConfig};
