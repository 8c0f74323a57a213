//! Image ingestion, listing and deletion.
//!
//! - [`convert`]: JPEG validation and PNG re-encoding
//! - [`filter`]: the client's `filter` query parameter
//! - [`ImageService`]: the three request flows plus the reservation sweep

pub mod convert;
pub mod filter;
mod service;

pub use convert::{is_jpeg, PngConverter};
pub use filter::FilterParams;
pub use service::{
    display_offset, storage_key_for, DeleteOutcome, ImageQueryResult, ImageService, ImageView,
    OwnerName, StoredImage, UploadRequest, DEFAULT_DISPLAY_OFFSET_HOURS,
};
