use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::audit::AuditEntry;
use super::domain::{
    ActorId, Listing, ListingDraft, ListingStatus, MaintenanceRequest, OrgId, UnitId,
};
use super::lifecycle::ListingLifecycleService;
use super::repository::{MarketplaceStore, NotificationPublisher};

/// Failure density (percent of the batch) at or above which the coordinator
/// treats the batch as systemically broken and rolls back its successes.
const ROLLBACK_THRESHOLD_PERCENT: usize = 50;

/// One requested action within a multi-unit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    List,
    Unlist,
    Suspend,
    MaintenanceStart,
    MaintenanceEnd,
}

/// Ephemeral per-unit request; exists only for the duration of a batch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperation {
    pub unit_id: UnitId,
    pub action: BulkAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<ListingDraft>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub unit_id: UnitId,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Batch response. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub successful: Vec<UnitId>,
    pub failed: Vec<BulkFailure>,
    pub summary: BulkSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    #[error("bulk request rejected: {0}")]
    InvalidInput(String),
    #[error("bulk batch failed systemically ({failed} of {total} operations); completed operations were rolled back")]
    TransactionFailed { total: usize, failed: usize },
}

impl BulkError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::TransactionFailed { .. } => "TRANSACTION_FAILED",
        }
    }
}

/// Inverse of one committed bulk step, recorded at execution time and
/// replayed in reverse order when the batch is rolled back.
#[derive(Debug)]
enum Compensation {
    RemoveCreated {
        unit_id: UnitId,
    },
    RecreateRemoved {
        unit_id: UnitId,
        snapshot: ListingSnapshot,
    },
    RestoreStatus {
        unit_id: UnitId,
        status: ListingStatus,
    },
    EndMaintenance {
        unit_id: UnitId,
        restore: ListingStatus,
    },
    RestartMaintenance {
        unit_id: UnitId,
        note: Option<String>,
    },
}

/// Field snapshot of a listing taken before a bulk step mutates it. A
/// re-created listing gets a fresh id; only the advertised content survives.
#[derive(Debug, Clone)]
struct ListingSnapshot {
    title: String,
    description: String,
    price: f64,
    available_on: Option<NaiveDate>,
    expires_on: Option<NaiveDate>,
}

impl From<&Listing> for ListingSnapshot {
    fn from(listing: &Listing) -> Self {
        Self {
            title: listing.title.clone(),
            description: listing.description.clone(),
            price: listing.price,
            available_on: listing.available_on,
            expires_on: listing.expires_on,
        }
    }
}

impl ListingSnapshot {
    fn into_draft(self) -> ListingDraft {
        ListingDraft {
            title: Some(self.title),
            description: Some(self.description),
            price: Some(self.price),
            available_on: self.available_on,
            expires_on: self.expires_on,
        }
    }
}

/// Fans a batch of per-unit requests out to the lifecycle manager, tracks
/// partial success, and compensates committed steps when failures reach the
/// rollback threshold.
pub struct BulkCoordinator<S, N> {
    lifecycle: Arc<ListingLifecycleService<S, N>>,
    store: Arc<S>,
}

impl<S, N> BulkCoordinator<S, N>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(lifecycle: Arc<ListingLifecycleService<S, N>>, store: Arc<S>) -> Self {
        Self { lifecycle, store }
    }

    /// Apply a batch of operations strictly sequentially, one unit at a time.
    ///
    /// Failures collect per unit without aborting the batch. If, once the
    /// batch has run, failures reach [`ROLLBACK_THRESHOLD_PERCENT`] of a
    /// multi-operation batch, every committed step is compensated in reverse
    /// order and the whole batch reports `TRANSACTION_FAILED`.
    pub fn bulk_apply(
        &self,
        operations: Vec<BulkOperation>,
        actor: &ActorId,
        org: &OrgId,
    ) -> Result<BulkResult, BulkError> {
        if operations.is_empty() {
            return Err(BulkError::InvalidInput("empty batch".to_string()));
        }

        let mut seen = HashSet::new();
        for operation in &operations {
            if !seen.insert(operation.unit_id.clone()) {
                return Err(BulkError::InvalidInput(format!(
                    "duplicate unit {} in batch",
                    operation.unit_id
                )));
            }
        }

        let total = operations.len();
        let mut successful = Vec::new();
        let mut failed: Vec<BulkFailure> = Vec::new();
        let mut compensations: Vec<Compensation> = Vec::new();

        for operation in operations {
            let unit_id = operation.unit_id.clone();

            match self.store.unit(&unit_id) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    failed.push(BulkFailure {
                        unit_id,
                        code: "UNIT_NOT_FOUND",
                        message: "unit not found".to_string(),
                    });
                    continue;
                }
                Err(err) => {
                    failed.push(BulkFailure {
                        unit_id,
                        code: "VALIDATION_FAILED",
                        message: err.to_string(),
                    });
                    continue;
                }
            }

            // Snapshot before mutating so the inverse action can be recorded
            // alongside the success.
            let snapshot = match self.store.listing_for_unit(&unit_id) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    failed.push(BulkFailure {
                        unit_id,
                        code: "VALIDATION_FAILED",
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match self.dispatch(&operation, snapshot.as_ref(), actor, org) {
                Ok(compensation) => {
                    successful.push(unit_id);
                    compensations.push(compensation);
                }
                Err(failure) => failed.push(failure),
            }
        }

        let rollback = total > 1 && failed.len() * 100 >= total * ROLLBACK_THRESHOLD_PERCENT;

        if rollback {
            warn!(
                total,
                failed = failed.len(),
                "bulk failure density at rollback threshold; compensating committed operations"
            );
            self.compensate(compensations, actor, org);
        }

        let summary = AuditEntry::bulk_summary(
            actor.clone(),
            total,
            successful.len(),
            failed.len(),
            rollback,
        );
        if let Err(err) = self.store.append_audit(summary) {
            warn!(error = %err, "failed to record bulk summary audit entry");
        }

        if rollback {
            return Err(BulkError::TransactionFailed {
                total,
                failed: failed.len(),
            });
        }

        info!(
            total,
            succeeded = successful.len(),
            failed = failed.len(),
            "bulk batch completed"
        );

        Ok(BulkResult {
            summary: BulkSummary {
                total,
                succeeded: successful.len(),
                failed: failed.len(),
            },
            successful,
            failed,
        })
    }

    fn dispatch(
        &self,
        operation: &BulkOperation,
        snapshot: Option<&Listing>,
        actor: &ActorId,
        org: &OrgId,
    ) -> Result<Compensation, BulkFailure> {
        let unit_id = operation.unit_id.clone();
        let fail = |err: super::lifecycle::ListingError| BulkFailure {
            unit_id: operation.unit_id.clone(),
            code: err.code(),
            message: err.to_string(),
        };

        match operation.action {
            BulkAction::List => {
                let draft = operation.draft.clone().unwrap_or_default();
                self.lifecycle
                    .create_listing(&unit_id, draft, actor, org)
                    .map_err(fail)?;
                Ok(Compensation::RemoveCreated { unit_id })
            }
            BulkAction::Unlist => {
                let snapshot = snapshot.map(ListingSnapshot::from);
                self.lifecycle
                    .remove_listing(&unit_id, actor, Some("bulk unlist".to_string()))
                    .map_err(fail)?;
                // remove_listing succeeded, so a listing was present.
                let snapshot = snapshot.ok_or_else(|| BulkFailure {
                    unit_id: unit_id.clone(),
                    code: "LISTING_NOT_FOUND",
                    message: "listing disappeared mid-batch".to_string(),
                })?;
                Ok(Compensation::RecreateRemoved { unit_id, snapshot })
            }
            BulkAction::Suspend => {
                let listing = snapshot.ok_or_else(|| BulkFailure {
                    unit_id: unit_id.clone(),
                    code: "LISTING_NOT_FOUND",
                    message: "unit has no listing".to_string(),
                })?;
                let previous = listing.status;
                self.lifecycle
                    .update_status(
                        &listing.id,
                        ListingStatus::Suspended,
                        actor,
                        Some("bulk suspend".to_string()),
                    )
                    .map_err(fail)?;
                Ok(Compensation::RestoreStatus {
                    unit_id,
                    status: previous,
                })
            }
            BulkAction::MaintenanceStart => {
                let previous = snapshot.map(|listing| listing.status);
                self.lifecycle
                    .start_maintenance(
                        MaintenanceRequest {
                            unit_id: unit_id.clone(),
                            note: Some("bulk maintenance".to_string()),
                        },
                        actor,
                    )
                    .map_err(fail)?;
                Ok(Compensation::EndMaintenance {
                    unit_id,
                    restore: previous.unwrap_or(ListingStatus::Active),
                })
            }
            BulkAction::MaintenanceEnd => {
                let note = snapshot
                    .and_then(|listing| listing.maintenance.as_ref())
                    .and_then(|window| window.note.clone());
                self.lifecycle
                    .end_maintenance(&unit_id, actor, None, Some("bulk maintenance end".to_string()))
                    .map_err(fail)?;
                Ok(Compensation::RestartMaintenance { unit_id, note })
            }
        }
    }

    /// Best-effort saga rollback: inverses run in reverse order, and a
    /// failing inverse is logged and skipped rather than halting the replay.
    fn compensate(&self, compensations: Vec<Compensation>, actor: &ActorId, org: &OrgId) {
        for compensation in compensations.into_iter().rev() {
            let result = match compensation {
                Compensation::RemoveCreated { ref unit_id } => self
                    .lifecycle
                    .remove_listing(unit_id, actor, Some("bulk rollback".to_string())),
                Compensation::RecreateRemoved {
                    ref unit_id,
                    ref snapshot,
                } => {
                    let mut draft = snapshot.clone().into_draft();
                    // An availability date that lapsed while the batch ran
                    // would fail re-validation; restore as available now.
                    let today = chrono::Utc::now().date_naive();
                    if draft.available_on.is_some_and(|date| date < today) {
                        draft.available_on = None;
                    }
                    self.lifecycle
                        .create_listing(unit_id, draft, actor, org)
                        .map(|_| ())
                }
                Compensation::RestoreStatus {
                    ref unit_id,
                    status,
                } => self
                    .lifecycle
                    .listing_for_unit(unit_id)
                    .and_then(|listing| {
                        self.lifecycle.update_status(
                            &listing.id,
                            status,
                            actor,
                            Some("bulk rollback".to_string()),
                        )
                    })
                    .map(|_| ()),
                Compensation::EndMaintenance {
                    ref unit_id,
                    restore,
                } => self
                    .lifecycle
                    .end_maintenance(
                        unit_id,
                        actor,
                        Some(restore),
                        Some("bulk rollback".to_string()),
                    )
                    .map(|_| ()),
                Compensation::RestartMaintenance { ref unit_id, ref note } => self
                    .lifecycle
                    .start_maintenance(
                        MaintenanceRequest {
                            unit_id: unit_id.clone(),
                            note: note.clone(),
                        },
                        actor,
                    )
                    .map(|_| ()),
            };

            if let Err(err) = result {
                warn!(error = %err, "bulk rollback step failed; continuing");
            }
        }
    }
}
