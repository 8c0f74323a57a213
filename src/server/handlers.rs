//! HTTP request handlers.
//!
//! # Endpoints
//!
//! - `POST /user/login` - Exchange credentials for a token
//! - `GET /user` - List users
//! - `POST /image` - Upload a JPEG (multipart)
//! - `GET /image` - List images with hourly and per-owner counts
//! - `DELETE /image/{id}` - Delete an image owned by the caller
//! - `GET /health` - Health check
//!
//! Every response uses the same envelope, `{"message": ..., "data": ...}`.
//! Internal failure detail is logged and never returned to the client.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::auth::AuthUser;
use crate::auth::{AuthService, Session};
use crate::error::{AuthError, ConvertError, ImageError};
use crate::image::{FilterParams, ImageQueryResult, ImageService, UploadRequest};
use crate::storage::ObjectStore;
use crate::store::{MetadataStore, UserSummary};

/// Default cap on the size of an uploaded image, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 4_000_000;

pub const MSG_OK: &str = "ok";
pub const MSG_SERVER_ERROR: &str = "server error";
pub const MSG_FAIL_TOKEN: &str = "fail token";
pub const MSG_UNAUTHORIZED: &str = "Unauthorized";
pub const MSG_INCORRECT_PASSWORD: &str = "incorrect password";
pub const MSG_CANNOT_PASS: &str = "cannot pass";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
pub struct AppState<M, O> {
    pub auth: AuthService<M>,
    pub images: ImageService<M, O>,

    /// Largest accepted image payload in bytes
    pub max_upload_bytes: usize,
}

impl<M: MetadataStore, O: ObjectStore> AppState<M, O> {
    pub fn new(auth: AuthService<M>, images: ImageService<M, O>) -> Self {
        Self {
            auth,
            images,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

impl<M, O> Clone for AppState<M, O> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            images: self.images.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// `{"message":"ok","data":...}`
    pub fn ok(data: T) -> Self {
        Self {
            message: MSG_OK.to_string(),
            data: Some(data),
        }
    }

    /// An envelope carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Query parameters for the image listing.
#[derive(Debug, Deserialize)]
pub struct ImageListParams {
    /// JSON-encoded filter, see [`FilterParams`]
    #[serde(default)]
    pub filter: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Responses
// =============================================================================

fn server_error(error_type: &str, detail: impl std::fmt::Display) -> Response {
    warn!(
        error_type = error_type,
        status = StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "Rejected request: {}",
        detail
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::message(MSG_SERVER_ERROR)),
    )
        .into_response()
}

impl IntoResponse for ImageError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ImageError::NotOwner { .. } => (StatusCode::UNAUTHORIZED, "not_owner", MSG_UNAUTHORIZED),
            ImageError::NotFound(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "not_found",
                MSG_SERVER_ERROR,
            ),
            ImageError::InvalidImageId(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_image_id",
                MSG_SERVER_ERROR,
            ),
            ImageError::UnknownOwner(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unknown_owner",
                MSG_SERVER_ERROR,
            ),
            ImageError::InvalidUpload(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "invalid_upload",
                MSG_SERVER_ERROR,
            ),
            ImageError::BadFilter(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "bad_filter",
                MSG_SERVER_ERROR,
            ),
            ImageError::Convert(ConvertError::UnsupportedFormat { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unsupported_format",
                MSG_SERVER_ERROR,
            ),
            ImageError::Convert(ConvertError::Decode(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "decode_error",
                MSG_SERVER_ERROR,
            ),
            ImageError::Convert(ConvertError::Encode(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                MSG_SERVER_ERROR,
            ),
            ImageError::ReservationLost(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "reservation_lost",
                MSG_SERVER_ERROR,
            ),
            ImageError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                MSG_SERVER_ERROR,
            ),
            ImageError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                MSG_SERVER_ERROR,
            ),
        };

        // The envelope folds caller mistakes into "server error"; the log
        // level still tells them apart
        match &self {
            ImageError::NotFound(_) | ImageError::InvalidImageId(_) => debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                self
            ),
            ImageError::NotOwner { .. }
            | ImageError::UnknownOwner(_)
            | ImageError::InvalidUpload(_)
            | ImageError::BadFilter(_)
            | ImageError::Convert(ConvertError::UnsupportedFormat { .. })
            | ImageError::Convert(ConvertError::Decode(_)) => warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self
            ),
            _ => error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            ),
        }

        (status, Json(ApiResponse::<()>::message(message))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /user/login`
pub async fn login_handler<M, O>(
    State(state): State<AppState<M, O>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return server_error("invalid_request", rejection.body_text()),
    };

    match state.auth.login(&request.name, &request.password).await {
        Ok(session) => Json(ApiResponse::<Session>::ok(session)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /user`
pub async fn users_handler<M, O>(
    State(state): State<AppState<M, O>>,
) -> Result<Json<ApiResponse<Vec<UserSummary>>>, AuthError>
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let users = state.auth.list_users().await?;
    Ok(Json(ApiResponse::ok(users)))
}

/// Fields collected from the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    user: Option<String>,
    date: Option<String>,
    filename: Option<String>,
    image: Option<Bytes>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ImageError> {
    let mut form = UploadForm::default();
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ImageError::InvalidUpload(e.body_text())
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("user") => form.user = Some(field.text().await.map_err(invalid)?),
            Some("date") => form.date = Some(field.text().await.map_err(invalid)?),
            Some("image") => {
                form.filename = field.file_name().map(str::to_string);
                form.image = Some(field.bytes().await.map_err(invalid)?);
            }
            other => debug!(field = ?other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Parse the client's epoch-millisecond upload time. Fractional values are
/// truncated.
pub fn parse_upload_date(raw: &str) -> Result<DateTime<Utc>, ImageError> {
    let raw = raw.trim();
    let millis = match raw.parse::<i64>() {
        Ok(millis) => millis,
        Err(_) => {
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ImageError::InvalidUpload(format!("invalid date: {:?}", raw)))?;
            value.trunc() as i64
        }
    };

    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ImageError::InvalidUpload(format!("date out of range: {}", millis)))
}

/// `POST /image`
pub async fn upload_handler<M, O>(
    State(state): State<AppState<M, O>>,
    Extension(caller): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<()>>, ImageError>
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let multipart = multipart.map_err(|e| ImageError::InvalidUpload(e.body_text()))?;
    let form = read_upload_form(multipart).await?;

    let data = form
        .image
        .ok_or_else(|| ImageError::InvalidUpload("missing image field".to_string()))?;
    if data.len() > state.max_upload_bytes {
        return Err(ImageError::InvalidUpload(format!(
            "image is {} bytes, limit is {}",
            data.len(),
            state.max_upload_bytes
        )));
    }

    let raw_date = form
        .date
        .ok_or_else(|| ImageError::InvalidUpload("missing date field".to_string()))?;
    let uploaded_at = parse_upload_date(&raw_date)?;

    let owner_name = match form.user.filter(|u| !u.trim().is_empty()) {
        Some(user) => {
            if user != caller.name {
                warn!(
                    owner = %user,
                    caller = %caller.name,
                    "Upload owner differs from authenticated user"
                );
            }
            user
        }
        None => caller.name,
    };

    let request = UploadRequest {
        owner_name,
        uploaded_at,
        original_filename: form.filename.unwrap_or_default(),
        data,
    };
    state.images.ingest(request).await?;

    Ok(Json(ApiResponse::message(MSG_OK)))
}

/// `GET /image?filter={...}`
pub async fn list_images_handler<M, O>(
    State(state): State<AppState<M, O>>,
    Query(params): Query<ImageListParams>,
) -> Result<Json<ApiResponse<ImageQueryResult>>, ImageError>
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let filter = FilterParams::parse(params.filter.as_deref())?;
    let result = state.images.query(&filter).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// `DELETE /image/{id}`
pub async fn delete_image_handler<M, O>(
    State(state): State<AppState<M, O>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ImageError>
where
    M: MetadataStore + 'static,
    O: ObjectStore + 'static,
{
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| ImageError::InvalidImageId(id.clone()))?;

    state.images.delete(id, &caller.name).await?;
    Ok(Json(ApiResponse::message(MSG_OK)))
}

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
