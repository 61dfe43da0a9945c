use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::audit::AuditEntry;
use super::domain::{
    ApplicationId, Listing, ListingId, TenantApplication, Unit, UnitId,
};

/// Storage abstraction over the marketplace collections (units, listings,
/// tenant applications, audit trail).
///
/// The mutating operations that accept an [`AuditEntry`] are grouped writes:
/// the row change, the unit back-reference, and the audit entry commit
/// together or not at all. Implementations provide that atomicity however
/// their backing store does (row transaction, single mutex, ...).
pub trait MarketplaceStore: Send + Sync {
    fn unit(&self, id: &UnitId) -> Result<Option<Unit>, StoreError>;
    fn upsert_unit(&self, unit: Unit) -> Result<(), StoreError>;

    fn listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError>;
    fn listing_for_unit(&self, unit_id: &UnitId) -> Result<Option<Listing>, StoreError>;
    fn listings(&self) -> Result<Vec<Listing>, StoreError>;

    /// Insert a listing, set the owning unit's back-reference, and append
    /// the audit entry as one atomic write. Fails with [`StoreError::Conflict`]
    /// when the unit already references a listing.
    fn insert_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError>;

    /// Delete a listing, clear the unit back-reference, and append the audit
    /// entry atomically.
    fn delete_listing(&self, listing_id: &ListingId, entry: AuditEntry)
        -> Result<(), StoreError>;

    /// Replace a listing row and append the audit entry atomically.
    fn update_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError>;

    fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError>;
    fn audit_for_unit(&self, unit_id: &UnitId) -> Result<Vec<AuditEntry>, StoreError>;

    fn insert_application(&self, application: TenantApplication) -> Result<(), StoreError>;
    fn application(&self, id: &ApplicationId)
        -> Result<Option<TenantApplication>, StoreError>;
    fn pending_applications(&self, unit_id: &UnitId)
        -> Result<Vec<TenantApplication>, StoreError>;
    fn update_application(&self, application: TenantApplication) -> Result<(), StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail/SMS adapters). Fire-and-forget from
/// the caller's perspective: publish failures are logged, never propagated.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: ListingNotice) -> Result<(), NotifyError>;
}

/// Templated notification payload keyed by recipient and reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingNotice {
    pub template: String,
    pub recipient: String,
    pub unit_id: UnitId,
    pub application_id: Option<ApplicationId>,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
