use thiserror::Error;

/// Errors from the blob store (S3 or S3-compatible storage)
#[derive(Debug, Clone, Error)]
pub enum ObjectStoreError {
    /// The object could not be written
    #[error("Upload of '{key}' failed: {reason}")]
    UploadFailed { key: String, reason: String },

    /// The object could not be removed
    #[error("Delete of '{key}' failed: {reason}")]
    DeleteFailed { key: String, reason: String },
}

/// Errors from the metadata store holding users and image records
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Error reported by the database engine
    #[error("Database error: {0}")]
    Database(String),

    /// A user with the same name already exists
    #[error("User already exists: {0}")]
    DuplicateUser(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Errors raised while authenticating a user or checking a bearer token
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No user record matches the supplied name
    #[error("No such user: {0}")]
    NoSuchUser(String),

    /// The supplied password does not match the stored hash
    #[error("Wrong password")]
    WrongPassword,

    /// The request carried no `authorization` header
    #[error("Missing token")]
    MissingToken,

    /// The token is malformed or its signature does not match
    #[error("Invalid token")]
    InvalidToken,

    /// The token was valid but its lifetime is over
    #[error("Token expired at {expired_at} (current time: {current_time})")]
    Expired { expired_at: u64, current_time: u64 },

    /// Password hashing failed
    #[error("Password hashing failed: {0}")]
    Hash(String),

    /// Credential store could not be read
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from JPEG validation and PNG re-encoding
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    /// Payload is not a JPEG stream
    #[error("Unsupported image format: {detected}")]
    UnsupportedFormat { detected: String },

    /// JPEG stream could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// PNG encoding failed
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Errors from parsing the `filter` query parameter
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// The parameter is not a JSON object of the expected shape
    #[error("Malformed filter: {0}")]
    Malformed(String),

    /// A date bound is not in `YYYY-MM-DD` form
    #[error("Invalid date for '{field}': {value}")]
    InvalidDate { field: &'static str, value: String },

    /// The owner id is neither the all-owners sentinel nor an integer
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
}

/// Errors from the image ingestion, query and deletion services
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// The named owner has no user record
    #[error("Unknown owner: {0}")]
    UnknownOwner(String),

    /// The upload request is missing a field or carries an unusable one
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// The query filter could not be parsed
    #[error("Bad filter: {0}")]
    BadFilter(#[from] FilterError),

    /// The image id in the request path is not a valid identifier
    #[error("Invalid image id: {0}")]
    InvalidImageId(String),

    /// No image record with this id exists
    #[error("Image not found: {0}")]
    NotFound(i64),

    /// The requesting user does not own the image
    #[error("User '{user}' does not own image {image_id}")]
    NotOwner { image_id: i64, user: String },

    /// The reservation disappeared before the upload could be recorded
    #[error("Reservation {0} was removed during upload")]
    ReservationLost(i64),

    /// Image conversion failed
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Blob store operation failed
    #[error(transparent)]
    Storage(#[from] ObjectStoreError),

    /// Metadata store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
