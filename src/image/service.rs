//! Image ingestion, query and deletion.
//!
//! # Ingestion sequence
//!
//! ```text
//! resolve owner ─▶ reserve record ─▶ convert ─▶ put blob ─▶ set storage key
//!                       │               │           │              │
//!                       │               ▼           ▼              ▼
//!                       └──────── release reservation ◀──── (+ delete blob)
//! ```
//!
//! The record is reserved first so its id can be embedded in the storage key.
//! Any failure after the reservation releases it, leaving no record behind.
//! If the final update fails the blob is removed as well.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::convert::PngConverter;
use super::filter::FilterParams;
use crate::error::ImageError;
use crate::storage::{ObjectStore, PNG_CONTENT_TYPE};
use crate::store::{
    reservation_cutoff, HourlyCount, ImageId, ImageRecord, MetadataStore, NewImage, OwnerCount,
    User,
};

/// Default display offset (UTC-5), in hours.
pub const DEFAULT_DISPLAY_OFFSET_HOURS: i32 = -5;

/// Format used for the shifted display timestamp.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage key for the blob of image `id`.
pub fn storage_key_for(id: ImageId) -> String {
    format!("images/{}.png", id)
}

/// Build a fixed display offset from whole hours. Returns `None` outside
/// ±23 hours.
pub fn display_offset(hours: i32) -> Option<FixedOffset> {
    if !(-23..=23).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(hours * 3600)
}

// =============================================================================
// Requests and Results
// =============================================================================

/// An inbound upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_name: String,
    /// Client-supplied upload time
    pub uploaded_at: DateTime<Utc>,
    pub original_filename: String,
    /// Raw JPEG payload
    pub data: Bytes,
}

/// A successfully ingested image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub id: ImageId,
    pub storage_key: String,
}

/// Owner annotation on a listed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerName {
    pub name: String,
}

/// An image as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageView {
    pub id: ImageId,
    pub storage_key: Option<String>,
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
    /// Upload time on the shifted display clock
    pub display_date: String,
    pub user: OwnerName,
}

/// Records plus both aggregations for one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageQueryResult {
    #[serde(rename = "dataImages")]
    pub images: Vec<ImageView>,
    #[serde(rename = "countImages")]
    pub hourly_counts: Vec<HourlyCount>,
    #[serde(rename = "countImagesByUsers")]
    pub owner_counts: Vec<OwnerCount>,
}

/// What a successful delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Blob and record removed
    Deleted,
    /// Only a reservation record existed and it was removed
    ReservationReleased,
}

// =============================================================================
// Image Service
// =============================================================================

/// Coordinates the metadata store, the object store and the converter.
pub struct ImageService<M, O> {
    store: Arc<M>,
    objects: Arc<O>,
    converter: PngConverter,
    display_offset: FixedOffset,
}

impl<M, O> Clone for ImageService<M, O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            objects: Arc::clone(&self.objects),
            converter: self.converter.clone(),
            display_offset: self.display_offset,
        }
    }
}

impl<M: MetadataStore, O: ObjectStore> ImageService<M, O> {
    /// Create a service using the default UTC-5 display offset.
    pub fn new(store: Arc<M>, objects: Arc<O>) -> Self {
        let display_offset = display_offset(DEFAULT_DISPLAY_OFFSET_HOURS)
            .unwrap_or_else(|| Utc.fix());
        Self {
            store,
            objects,
            converter: PngConverter::new(),
            display_offset,
        }
    }

    /// Use a different display offset for listed timestamps and hour buckets.
    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.display_offset = offset;
        self
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    /// Store an uploaded JPEG as PNG and record it under its owner.
    pub async fn ingest(&self, request: UploadRequest) -> Result<StoredImage, ImageError> {
        let owner = self.resolve_owner(&request.owner_name).await?;

        let id = self
            .store
            .reserve_image(&NewImage {
                owner_id: owner.id,
                uploaded_at: request.uploaded_at,
                original_filename: request.original_filename.clone(),
                created_at: Utc::now(),
            })
            .await?;
        debug!(image_id = id, user = %owner.name, "Reserved image record");

        match self.persist_blob(id, &request.data).await {
            Ok(storage_key) => {
                info!(
                    image_id = id,
                    user = %owner.name,
                    storage_key = %storage_key,
                    filename = %request.original_filename,
                    "Stored image"
                );
                Ok(StoredImage { id, storage_key })
            }
            Err(e) => {
                self.release_reservation(id).await;
                Err(e)
            }
        }
    }

    /// Convert, upload and record the key. On an update failure the blob is
    /// removed before returning; the caller releases the reservation.
    async fn persist_blob(&self, id: ImageId, data: &[u8]) -> Result<String, ImageError> {
        let png = self.converter.convert(data)?;
        let storage_key = storage_key_for(id);

        self.objects
            .put(&storage_key, png, PNG_CONTENT_TYPE)
            .await?;

        let updated = match self.store.set_storage_key(id, &storage_key).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ImageError::ReservationLost(id)),
            Err(e) => Err(e.into()),
        };

        if let Err(e) = updated {
            if let Err(delete_err) = self.objects.delete(&storage_key).await {
                warn!(
                    image_id = id,
                    storage_key = %storage_key,
                    error = %delete_err,
                    "Failed to remove blob after metadata update failure"
                );
            }
            return Err(e);
        }

        Ok(storage_key)
    }

    async fn release_reservation(&self, id: ImageId) {
        match self.store.delete_image(id).await {
            Ok(_) => debug!(image_id = id, "Released reservation"),
            Err(e) => warn!(image_id = id, error = %e, "Failed to release reservation"),
        }
    }

    async fn resolve_owner(&self, name: &str) -> Result<User, ImageError> {
        self.store
            .find_user_by_name(name)
            .await?
            .ok_or_else(|| ImageError::UnknownOwner(name.to_string()))
    }

    // -------------------------------------------------------------------------
    // Query
    // -------------------------------------------------------------------------

    /// List matching images with hourly and per-owner counts.
    ///
    /// The three results come from independent statements and may disagree
    /// if a write lands between them.
    pub async fn query(&self, params: &FilterParams) -> Result<ImageQueryResult, ImageError> {
        let filter = params.resolve()?;
        let offset_secs = i64::from(self.display_offset.local_minus_utc());

        let records = self.store.find_images(&filter).await?;
        let hourly_counts = self.store.count_by_hour(&filter, offset_secs).await?;
        let owner_counts = self.store.count_by_owner(&filter).await?;

        debug!(
            images = records.len(),
            hours = hourly_counts.len(),
            owners = owner_counts.len(),
            "Image query"
        );

        Ok(ImageQueryResult {
            images: records.into_iter().map(|r| self.view(r)).collect(),
            hourly_counts,
            owner_counts,
        })
    }

    fn view(&self, record: ImageRecord) -> ImageView {
        let display_date = record
            .uploaded_at
            .with_timezone(&self.display_offset)
            .format(DISPLAY_FORMAT)
            .to_string();

        ImageView {
            id: record.id,
            storage_key: record.storage_key,
            original_filename: record.original_filename,
            uploaded_at: record.uploaded_at,
            display_date,
            user: OwnerName {
                name: record.owner_name,
            },
        }
    }

    // -------------------------------------------------------------------------
    // Deletion
    // -------------------------------------------------------------------------

    /// Delete image `id` on behalf of `requester`.
    ///
    /// The blob goes first; if that fails the record is kept so it still
    /// addresses the blob.
    pub async fn delete(&self, id: ImageId, requester: &str) -> Result<DeleteOutcome, ImageError> {
        let user = self.resolve_owner(requester).await?;

        let image = self
            .store
            .find_image(id)
            .await?
            .ok_or(ImageError::NotFound(id))?;

        if image.owner_id != user.id {
            return Err(ImageError::NotOwner {
                image_id: id,
                user: user.name,
            });
        }

        let outcome = match &image.storage_key {
            Some(key) => {
                self.objects.delete(key).await?;
                DeleteOutcome::Deleted
            }
            None => DeleteOutcome::ReservationReleased,
        };

        if !self.store.delete_image(id).await? {
            // A concurrent delete got there first
            debug!(image_id = id, "Image record already removed");
        }

        info!(image_id = id, user = %user.name, outcome = ?outcome, "Deleted image");
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Remove reservations created more than `older_than` ago.
    pub async fn sweep_orphans(&self, older_than: Duration) -> Result<u64, ImageError> {
        self.sweep_orphans_before(reservation_cutoff(older_than)).await
    }

    /// Remove reservations created before `cutoff`.
    pub async fn sweep_orphans_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ImageError> {
        let removed = self.store.delete_reservations_before(cutoff).await?;
        info!(removed = removed, cutoff = %cutoff, "Swept orphaned reservations");
        Ok(removed)
    }
}
