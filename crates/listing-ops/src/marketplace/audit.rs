use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, ListingId, ListingStatus, UnitId};

/// Action tag on an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ListingCreated,
    ListingRemoved,
    StatusChanged,
    MaintenanceStarted,
    MaintenanceEnded,
    AutoActivated,
    AutoExpired,
    TransitionRejected,
    BulkSummary,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ListingCreated => "listing_created",
            Self::ListingRemoved => "listing_removed",
            Self::StatusChanged => "status_changed",
            Self::MaintenanceStarted => "maintenance_started",
            Self::MaintenanceEnded => "maintenance_ended",
            Self::AutoActivated => "auto_activated",
            Self::AutoExpired => "auto_expired",
            Self::TransitionRejected => "transition_rejected",
            Self::BulkSummary => "bulk_summary",
        }
    }
}

/// Immutable record of one listing state change. Appended only; never
/// mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// `None` only for batch-level summary entries, which belong to no
    /// single unit.
    pub unit_id: Option<UnitId>,
    pub listing_id: Option<ListingId>,
    pub action: AuditAction,
    pub previous_status: Option<ListingStatus>,
    pub new_status: Option<ListingStatus>,
    pub actor: ActorId,
    pub reason: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry for a committed transition on a single listing.
    pub fn transition(
        action: AuditAction,
        unit_id: UnitId,
        listing_id: ListingId,
        previous_status: Option<ListingStatus>,
        new_status: ListingStatus,
        actor: ActorId,
    ) -> Self {
        Self {
            unit_id: Some(unit_id),
            listing_id: Some(listing_id),
            action,
            previous_status,
            new_status: Some(new_status),
            actor,
            reason: None,
            metadata: BTreeMap::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Entry recording a transition the table rejected. Nothing else is
    /// persisted alongside it.
    pub fn rejected_transition(
        unit_id: UnitId,
        listing_id: ListingId,
        current_status: ListingStatus,
        requested_status: ListingStatus,
        actor: ActorId,
    ) -> Self {
        let mut entry = Self::transition(
            AuditAction::TransitionRejected,
            unit_id,
            listing_id,
            Some(current_status),
            requested_status,
            actor,
        );
        entry.metadata.insert("outcome".to_string(), "rejected".to_string());
        entry
    }

    /// Summary entry covering a whole bulk batch. Carries no single status
    /// change; counts live in the metadata bag.
    pub fn bulk_summary(
        actor: ActorId,
        total: usize,
        succeeded: usize,
        failed: usize,
        rolled_back: bool,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("total".to_string(), total.to_string());
        metadata.insert("succeeded".to_string(), succeeded.to_string());
        metadata.insert("failed".to_string(), failed.to_string());
        metadata.insert("rolled_back".to_string(), rolled_back.to_string());

        Self {
            unit_id: None,
            listing_id: None,
            action: AuditAction::BulkSummary,
            previous_status: None,
            new_status: None,
            actor,
            reason: None,
            metadata,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
