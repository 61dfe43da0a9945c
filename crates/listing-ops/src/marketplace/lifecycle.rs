use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use super::audit::{AuditAction, AuditEntry};
use super::cache::UnitCache;
use super::domain::{
    ActorId, LeaseState, Listing, ListingDraft, ListingId, ListingStatus, MaintenanceRequest,
    MaintenanceWindow, OrgId, Unit, UnitId,
};
use super::guard::ConsistencyGuard;
use super::repository::{MarketplaceStore, NotificationPublisher, StoreError};
use super::transitions::is_valid_transition;

const TITLE_MIN_CHARS: usize = 3;
const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MIN_CHARS: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 1000;

static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("lst-{id:06}"))
}

/// Error raised by lifecycle operations. Every variant maps to a closed
/// machine-readable code via [`ListingError::code`].
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("unit {0} not found")]
    UnitNotFound(UnitId),
    #[error("unit {0} has an active or pending lease")]
    UnitHasActiveLease(UnitId),
    #[error("unit {unit_id} already has listing {listing_id}")]
    UnitAlreadyListed {
        unit_id: UnitId,
        listing_id: ListingId,
    },
    #[error("unit {unit_id} is missing data needed to draft a listing: {detail}")]
    InvalidUnitData { unit_id: UnitId, detail: String },
    #[error("listing validation failed: {0}")]
    ValidationFailed(String),
    #[error("listing {0} not found")]
    ListingNotFound(ListingId),
    #[error("unit {0} has no listing")]
    NoListingForUnit(UnitId),
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition {
        from: ListingStatus,
        to: ListingStatus,
    },
    #[error("unit {0} is not in maintenance")]
    NotInMaintenance(UnitId),
    #[error("listing cleanup failed: {0}")]
    CleanupFailed(String),
}

impl ListingError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnitNotFound(_) => "UNIT_NOT_FOUND",
            Self::UnitHasActiveLease(_) => "UNIT_HAS_ACTIVE_LEASE",
            Self::UnitAlreadyListed { .. } => "UNIT_ALREADY_LISTED",
            Self::InvalidUnitData { .. } => "INVALID_UNIT_DATA",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::ListingNotFound(_) | Self::NoListingForUnit(_) => "LISTING_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotInMaintenance(_) => "NOT_IN_MAINTENANCE",
            Self::CleanupFailed(_) => "CLEANUP_FAILED",
        }
    }
}

/// Tuning knobs for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Prices above this are accepted with a logged warning.
    pub price_warning_ceiling: f64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            price_warning_ceiling: 50_000.0,
        }
    }
}

/// Result of one time-based sweep run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepOutcome {
    pub activated: Vec<ListingId>,
    pub expired: Vec<ListingId>,
}

/// Creates, removes, and transitions individual listings. Enforces the
/// transition table, writes the audit trail, and notifies the application
/// consistency guard after every committed change.
pub struct ListingLifecycleService<S, N> {
    store: Arc<S>,
    guard: ConsistencyGuard<S, N>,
    cache: Arc<dyn UnitCache>,
    policy: LifecyclePolicy,
}

impl<S, N> ListingLifecycleService<S, N>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        notices: Arc<N>,
        cache: Arc<dyn UnitCache>,
        policy: LifecyclePolicy,
    ) -> Self {
        let guard = ConsistencyGuard::new(store.clone(), notices);
        Self {
            store,
            guard,
            cache,
            policy,
        }
    }

    /// Create a listing for a unit. The listing row, the unit back-reference,
    /// and the audit entry commit atomically; on any failure nothing is
    /// persisted.
    pub fn create_listing(
        &self,
        unit_id: &UnitId,
        draft: ListingDraft,
        actor: &ActorId,
        org: &OrgId,
    ) -> Result<Listing, ListingError> {
        let unit = self
            .lookup_unit(unit_id)?
            .ok_or_else(|| ListingError::UnitNotFound(unit_id.clone()))?;

        if !matches!(unit.lease_state, LeaseState::Vacant) {
            return Err(ListingError::UnitHasActiveLease(unit_id.clone()));
        }

        if let Some(listing_id) = unit.listing_id.clone() {
            return Err(ListingError::UnitAlreadyListed {
                unit_id: unit_id.clone(),
                listing_id,
            });
        }

        let today = Utc::now().date_naive();
        let resolved = resolve_draft(&unit, draft)?;
        validate_resolved(&resolved, today)?;

        if resolved.price > self.policy.price_warning_ceiling {
            warn!(
                unit = %unit_id,
                price = resolved.price,
                ceiling = self.policy.price_warning_ceiling,
                "listing price exceeds warning ceiling"
            );
        }

        let status = match resolved.available_on {
            Some(date) if date > today => ListingStatus::ComingSoon,
            _ => ListingStatus::Active,
        };

        let now = Utc::now();
        let listing = Listing {
            id: next_listing_id(),
            unit_id: unit_id.clone(),
            status,
            title: resolved.title,
            description: resolved.description,
            price: resolved.price,
            available_on: resolved.available_on,
            expires_on: resolved.expires_on,
            maintenance: None,
            created_at: now,
            updated_at: now,
            created_by: actor.clone(),
        };

        let entry = AuditEntry::transition(
            AuditAction::ListingCreated,
            unit_id.clone(),
            listing.id.clone(),
            None,
            status,
            actor.clone(),
        )
        .with_metadata("org", org.0.clone())
        .with_metadata("price", format!("{:.2}", listing.price));

        self.store
            .insert_listing(listing.clone(), entry)
            .map_err(|err| match err {
                // A concurrent create won the race; surface it the way a
                // uniqueness constraint would.
                StoreError::Conflict => {
                    ListingError::ValidationFailed("unit is already listed".to_string())
                }
                other => {
                    warn!(unit = %unit_id, error = %other, "listing insert failed");
                    ListingError::ValidationFailed(other.to_string())
                }
            })?;

        self.cache.invalidate(unit_id);
        self.notify_guard(unit_id, status, None, Some("listing created"));

        Ok(listing)
    }

    /// Remove a unit's listing, returning the unit to `Private`.
    pub fn remove_listing(
        &self,
        unit_id: &UnitId,
        actor: &ActorId,
        reason: Option<String>,
    ) -> Result<(), ListingError> {
        let _unit = self
            .lookup_unit(unit_id)?
            .ok_or_else(|| ListingError::UnitNotFound(unit_id.clone()))?;

        let listing = self
            .store
            .listing_for_unit(unit_id)
            .map_err(store_read_error)?
            .ok_or_else(|| ListingError::NoListingForUnit(unit_id.clone()))?;

        let previous = listing.status;
        let entry = AuditEntry::transition(
            AuditAction::ListingRemoved,
            unit_id.clone(),
            listing.id.clone(),
            Some(previous),
            ListingStatus::Private,
            actor.clone(),
        )
        .with_reason(reason.clone());

        self.store.delete_listing(&listing.id, entry).map_err(|err| {
            warn!(unit = %unit_id, listing = %listing.id, error = %err, "listing removal failed");
            ListingError::CleanupFailed(err.to_string())
        })?;

        self.cache.invalidate(unit_id);
        self.notify_guard(
            unit_id,
            ListingStatus::Private,
            Some(previous),
            reason.as_deref(),
        );

        Ok(())
    }

    /// Transition a listing to a new status, enforcing the transition table.
    /// A rejected transition persists nothing except an explicit rejection
    /// audit entry.
    pub fn update_status(
        &self,
        listing_id: &ListingId,
        new_status: ListingStatus,
        actor: &ActorId,
        reason: Option<String>,
    ) -> Result<Listing, ListingError> {
        let listing = self
            .store
            .listing(listing_id)
            .map_err(store_read_error)?
            .ok_or_else(|| ListingError::ListingNotFound(listing_id.clone()))?;

        self.apply_transition(listing, new_status, AuditAction::StatusChanged, actor, reason)
    }

    /// Take a unit's listing into `Maintenance`, recording the status to
    /// restore afterwards on the listing itself.
    pub fn start_maintenance(
        &self,
        request: MaintenanceRequest,
        actor: &ActorId,
    ) -> Result<Listing, ListingError> {
        let listing = self
            .store
            .listing_for_unit(&request.unit_id)
            .map_err(store_read_error)?
            .ok_or_else(|| ListingError::NoListingForUnit(request.unit_id.clone()))?;

        let previous = listing.status;
        if !is_valid_transition(previous, ListingStatus::Maintenance) {
            return Err(ListingError::InvalidTransition {
                from: previous,
                to: ListingStatus::Maintenance,
            });
        }

        let mut updated = listing;
        updated.status = ListingStatus::Maintenance;
        updated.maintenance = Some(MaintenanceWindow {
            previous_status: previous,
            started_at: Utc::now(),
            note: request.note.clone(),
        });
        updated.updated_at = Utc::now();

        let entry = AuditEntry::transition(
            AuditAction::MaintenanceStarted,
            updated.unit_id.clone(),
            updated.id.clone(),
            Some(previous),
            ListingStatus::Maintenance,
            actor.clone(),
        )
        .with_reason(request.note);

        self.commit_update(updated, entry, Some(previous))
    }

    /// End a maintenance window. With no explicit restore status the listing
    /// returns to the status recorded when maintenance started.
    pub fn end_maintenance(
        &self,
        unit_id: &UnitId,
        actor: &ActorId,
        restore_status: Option<ListingStatus>,
        reason: Option<String>,
    ) -> Result<Listing, ListingError> {
        let listing = self
            .store
            .listing_for_unit(unit_id)
            .map_err(store_read_error)?
            .ok_or_else(|| ListingError::NoListingForUnit(unit_id.clone()))?;

        let window = match (&listing.status, &listing.maintenance) {
            (ListingStatus::Maintenance, Some(window)) => window.clone(),
            _ => return Err(ListingError::NotInMaintenance(unit_id.clone())),
        };

        let target = restore_status.unwrap_or(window.previous_status);
        if !is_valid_transition(ListingStatus::Maintenance, target) {
            return Err(ListingError::InvalidTransition {
                from: ListingStatus::Maintenance,
                to: target,
            });
        }

        let mut updated = listing;
        updated.status = target;
        updated.maintenance = None;
        updated.updated_at = Utc::now();

        let entry = AuditEntry::transition(
            AuditAction::MaintenanceEnded,
            updated.unit_id.clone(),
            updated.id.clone(),
            Some(ListingStatus::Maintenance),
            target,
            actor.clone(),
        )
        .with_reason(reason);

        self.commit_update(updated, entry, Some(ListingStatus::Maintenance))
    }

    /// Periodic sweep: activate `ComingSoon` listings whose availability date
    /// has arrived and expire `Active` listings whose expiration date has
    /// passed. Running the sweep twice with no intervening change is a no-op
    /// the second time.
    pub fn process_time_based_transitions(
        &self,
        today: NaiveDate,
        actor: &ActorId,
    ) -> Result<SweepOutcome, ListingError> {
        let listings = self.store.listings().map_err(store_read_error)?;
        let mut outcome = SweepOutcome::default();

        for listing in listings {
            match listing.status {
                ListingStatus::ComingSoon
                    if listing.available_on.is_some_and(|date| date <= today) =>
                {
                    let id = listing.id.clone();
                    match self.apply_transition(
                        listing,
                        ListingStatus::Active,
                        AuditAction::AutoActivated,
                        actor,
                        Some("availability date reached".to_string()),
                    ) {
                        Ok(_) => outcome.activated.push(id),
                        Err(err) => {
                            warn!(listing = %id, error = %err, "auto-activation failed; continuing sweep")
                        }
                    }
                }
                ListingStatus::Active
                    if listing.expires_on.is_some_and(|date| date < today) =>
                {
                    let id = listing.id.clone();
                    match self.apply_transition(
                        listing,
                        ListingStatus::Expired,
                        AuditAction::AutoExpired,
                        actor,
                        Some("expiration date passed".to_string()),
                    ) {
                        Ok(_) => outcome.expired.push(id),
                        Err(err) => {
                            warn!(listing = %id, error = %err, "auto-expiry failed; continuing sweep")
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(outcome)
    }

    pub fn listing_for_unit(&self, unit_id: &UnitId) -> Result<Listing, ListingError> {
        self.store
            .listing_for_unit(unit_id)
            .map_err(store_read_error)?
            .ok_or_else(|| ListingError::NoListingForUnit(unit_id.clone()))
    }

    pub fn audit_trail(&self, unit_id: &UnitId) -> Result<Vec<AuditEntry>, ListingError> {
        self.store.audit_for_unit(unit_id).map_err(store_read_error)
    }

    fn apply_transition(
        &self,
        listing: Listing,
        new_status: ListingStatus,
        action: AuditAction,
        actor: &ActorId,
        reason: Option<String>,
    ) -> Result<Listing, ListingError> {
        let previous = listing.status;

        if !is_valid_transition(previous, new_status) {
            let rejection = AuditEntry::rejected_transition(
                listing.unit_id.clone(),
                listing.id.clone(),
                previous,
                new_status,
                actor.clone(),
            )
            .with_reason(reason);
            if let Err(err) = self.store.append_audit(rejection) {
                warn!(listing = %listing.id, error = %err, "failed to record rejected transition");
            }
            return Err(ListingError::InvalidTransition {
                from: previous,
                to: new_status,
            });
        }

        let mut updated = listing;
        updated.status = new_status;
        // Entering maintenance through any path opens a window; leaving it
        // through any path closes the window.
        updated.maintenance = if new_status == ListingStatus::Maintenance {
            Some(MaintenanceWindow {
                previous_status: previous,
                started_at: Utc::now(),
                note: reason.clone(),
            })
        } else {
            None
        };
        updated.updated_at = Utc::now();

        let entry = AuditEntry::transition(
            action,
            updated.unit_id.clone(),
            updated.id.clone(),
            Some(previous),
            new_status,
            actor.clone(),
        )
        .with_reason(reason);

        self.commit_update(updated, entry, Some(previous))
    }

    fn commit_update(
        &self,
        listing: Listing,
        entry: AuditEntry,
        previous: Option<ListingStatus>,
    ) -> Result<Listing, ListingError> {
        let reason = entry.reason.clone();
        self.store
            .update_listing(listing.clone(), entry)
            .map_err(|err| {
                warn!(listing = %listing.id, error = %err, "listing update failed");
                ListingError::ValidationFailed(err.to_string())
            })?;

        self.cache.invalidate(&listing.unit_id);
        self.notify_guard(&listing.unit_id, listing.status, previous, reason.as_deref());

        Ok(listing)
    }

    /// Cache-first unit lookup. Misses fall through to the store and warm
    /// the cache.
    fn lookup_unit(&self, unit_id: &UnitId) -> Result<Option<Unit>, ListingError> {
        if let Some(unit) = self.cache.get(unit_id) {
            return Ok(Some(unit));
        }

        let unit = self.store.unit(unit_id).map_err(store_read_error)?;
        if let Some(unit) = &unit {
            self.cache.put(unit.clone());
        }
        Ok(unit)
    }

    /// Guard failures never fail the committed transition; they are logged
    /// and the caller's result stands.
    fn notify_guard(
        &self,
        unit_id: &UnitId,
        new_status: ListingStatus,
        previous: Option<ListingStatus>,
        reason: Option<&str>,
    ) {
        if let Err(err) = self
            .guard
            .on_status_change(unit_id, new_status, previous, reason)
        {
            warn!(unit = %unit_id, error = %err, "application consistency guard failed");
        }
    }
}

fn store_read_error(err: StoreError) -> ListingError {
    warn!(error = %err, "marketplace store read failed");
    ListingError::ValidationFailed(err.to_string())
}

struct ResolvedDraft {
    title: String,
    description: String,
    price: f64,
    available_on: Option<NaiveDate>,
    expires_on: Option<NaiveDate>,
}

/// Fill missing draft fields from unit attributes with deterministic
/// templates.
fn resolve_draft(unit: &Unit, draft: ListingDraft) -> Result<ResolvedDraft, ListingError> {
    let title = match draft.title {
        Some(title) => title,
        None => format!(
            "{} Bed / {} Bath at {}",
            unit.bedrooms, unit.bathrooms, unit.property_code
        ),
    };

    let description = match draft.description {
        Some(description) => description,
        None => format!(
            "{} bedroom, {} bathroom home at {} renting for ${:.0} per month. \
             Contact the leasing office to schedule a tour.",
            unit.bedrooms, unit.bathrooms, unit.property_code, unit.market_rent
        ),
    };

    let price = match draft.price {
        Some(price) => price,
        None => {
            if unit.market_rent <= 0.0 {
                return Err(ListingError::InvalidUnitData {
                    unit_id: unit.id.clone(),
                    detail: "no market rent on file to derive a price".to_string(),
                });
            }
            unit.market_rent
        }
    };

    Ok(ResolvedDraft {
        title,
        description,
        price,
        available_on: draft.available_on,
        expires_on: draft.expires_on,
    })
}

fn validate_resolved(resolved: &ResolvedDraft, today: NaiveDate) -> Result<(), ListingError> {
    let title_len = resolved.title.chars().count();
    if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
        return Err(ListingError::ValidationFailed(format!(
            "title must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters, found {title_len}"
        )));
    }

    let description_len = resolved.description.chars().count();
    if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
        return Err(ListingError::ValidationFailed(format!(
            "description must be between {DESCRIPTION_MIN_CHARS} and {DESCRIPTION_MAX_CHARS} characters, found {description_len}"
        )));
    }

    if !(resolved.price > 0.0) {
        return Err(ListingError::ValidationFailed(
            "price must be positive".to_string(),
        ));
    }

    if let Some(available_on) = resolved.available_on {
        if available_on < today {
            return Err(ListingError::ValidationFailed(
                "availability date is in the past".to_string(),
            ));
        }
    }

    if let (Some(available_on), Some(expires_on)) = (resolved.available_on, resolved.expires_on) {
        if expires_on <= available_on {
            return Err(ListingError::ValidationFailed(
                "expiration date must be after the availability date".to_string(),
            ));
        }
    }

    Ok(())
}
