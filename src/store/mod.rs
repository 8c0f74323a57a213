//! Metadata store for users and image records.
//!
//! The store is the single owner of the two document collections the service
//! reads: the credential collection (users) and the image collection. All
//! filtering, joining and grouping is delegated to the backing engine.
//!
//! # Image lifecycle
//!
//! ```text
//!   reserve_image()          set_storage_key()          delete_image()
//! ─────────────────▶ reserved ────────────────▶ durable ───────────────▶ gone
//!   (storage_key = NULL)       (storage_key =            (blob removed first)
//!                               "images/<id>.png")
//! ```
//!
//! A reservation that never reaches `durable` is removed either by the
//! ingestion compensation path, by its owner, or by
//! [`MetadataStore::delete_reservations_before`].

mod sqlite;

pub use sqlite::SqliteStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;

/// Identifier of a user record.
pub type UserId = i64;

/// Identifier of an image record.
pub type ImageId = i64;

// =============================================================================
// Records
// =============================================================================

/// A user record as held in the credential collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// A user record without the password hash, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

/// An image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: ImageId,
    pub owner_id: UserId,
    /// Client-supplied upload time
    pub uploaded_at: DateTime<Utc>,
    pub original_filename: String,
    /// `None` while the record is only a reservation
    pub storage_key: Option<String>,
    /// Server time the reservation was made
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// Whether the blob for this record has been stored.
    pub fn is_durable(&self) -> bool {
        self.storage_key.is_some()
    }
}

/// Fields for a new image reservation.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub owner_id: UserId,
    pub uploaded_at: DateTime<Utc>,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
}

/// An image record joined with its owner's display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: ImageId,
    pub storage_key: Option<String>,
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub owner_name: String,
}

/// Number of images uploaded during one hour of the (shifted) day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    pub hour: u32,
    #[serde(rename = "totalImages")]
    pub total_images: u64,
}

/// Number of images uploaded by one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerCount {
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    #[serde(rename = "totalImages")]
    pub total_images: u64,
    #[serde(rename = "user")]
    pub owner_name: String,
}

/// Resolved selection over the image collection.
///
/// Bounds are half-open: `from <= uploaded_at < until`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
}

// =============================================================================
// Store Trait
// =============================================================================

/// Access to the user and image collections.
///
/// Implementations must be safe to share across request handlers; no
/// cross-call transaction is assumed by callers.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up a user by exact name.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// List every user, without password hashes.
    async fn list_users(&self) -> Result<Vec<UserSummary>, StoreError>;

    /// Create a user. Fails with [`StoreError::DuplicateUser`] on a name clash.
    async fn insert_user(&self, name: &str, password_hash: &str) -> Result<UserId, StoreError>;

    /// Insert an image record with no storage key and return its new id.
    async fn reserve_image(&self, image: &NewImage) -> Result<ImageId, StoreError>;

    /// Record the storage key of a reservation.
    ///
    /// Returns `false` if no record with this id exists any more.
    async fn set_storage_key(&self, id: ImageId, key: &str) -> Result<bool, StoreError>;

    /// Fetch an image record by id.
    async fn find_image(&self, id: ImageId) -> Result<Option<Image>, StoreError>;

    /// Remove an image record. Returns `false` if nothing was removed.
    async fn delete_image(&self, id: ImageId) -> Result<bool, StoreError>;

    /// Image records matching the filter, joined with owner names.
    ///
    /// Records whose owner no longer exists are omitted.
    async fn find_images(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, StoreError>;

    /// Matching records grouped by hour of day after shifting upload times
    /// by `offset_secs`. Hours with no records are absent.
    async fn count_by_hour(
        &self,
        filter: &ImageFilter,
        offset_secs: i64,
    ) -> Result<Vec<HourlyCount>, StoreError>;

    /// Matching records grouped by owner, annotated with the owner's name.
    async fn count_by_owner(&self, filter: &ImageFilter) -> Result<Vec<OwnerCount>, StoreError>;

    /// Remove reservations (records with no storage key) created before
    /// `cutoff`. Returns the number removed.
    async fn delete_reservations_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Remove reservations created more than `older_than` ago.
///
/// Returns the number removed.
pub async fn sweep_reservations<M: MetadataStore + ?Sized>(
    store: &M,
    older_than: Duration,
) -> Result<u64, StoreError> {
    store.delete_reservations_before(reservation_cutoff(older_than)).await
}

/// The creation time before which a reservation counts as orphaned.
pub fn reservation_cutoff(older_than: Duration) -> DateTime<Utc> {
    let age = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
