use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::marketplace::audit::{AuditAction, AuditEntry};
use crate::marketplace::bulk::{BulkAction, BulkCoordinator, BulkError, BulkOperation};
use crate::marketplace::cache::TtlUnitCache;
use crate::marketplace::domain::{
    ApplicationId, LeaseState, Listing, ListingDraft, ListingId, ListingStatus, TenantApplication,
    Unit, UnitId,
};
use crate::marketplace::lifecycle::{LifecyclePolicy, ListingLifecycleService};
use crate::marketplace::memory::{InMemoryMarketplaceStore, InMemoryNotificationPublisher};
use crate::marketplace::repository::{MarketplaceStore, StoreError};

fn op(unit: &UnitId, action: BulkAction) -> BulkOperation {
    BulkOperation {
        unit_id: unit.clone(),
        action,
        draft: None,
    }
}

#[test]
fn empty_batch_is_rejected() {
    let harness = harness();

    let err = harness
        .bulk
        .bulk_apply(Vec::new(), &actor(), &org())
        .expect_err("empty batch must fail");

    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn duplicate_unit_ids_are_rejected() {
    let harness = harness();
    let unit_id = seed_unit(&harness.store, "u-1", LeaseState::Vacant);

    let err = harness
        .bulk
        .bulk_apply(
            vec![
                op(&unit_id, BulkAction::List),
                op(&unit_id, BulkAction::Unlist),
            ],
            &actor(),
            &org(),
        )
        .expect_err("duplicate units must fail");

    assert_eq!(err.code(), "INVALID_INPUT");
}

#[test]
fn partial_failure_below_threshold_reports_detail_without_rollback() {
    let harness = harness();

    let mut operations = Vec::new();
    let mut listed = Vec::new();
    for index in 0..7 {
        let unit_id = seed_unit(&harness.store, &format!("u-ok-{index}"), LeaseState::Vacant);
        operations.push(op(&unit_id, BulkAction::List));
        listed.push(unit_id);
    }
    for index in 0..3 {
        operations.push(op(&UnitId(format!("u-ghost-{index}")), BulkAction::List));
    }

    let result = harness
        .bulk
        .bulk_apply(operations, &actor(), &org())
        .expect("partial success is still success");

    assert_eq!(result.summary.total, 10);
    assert_eq!(result.summary.succeeded, 7);
    assert_eq!(result.summary.failed, 3);
    assert_eq!(result.successful.len(), 7);
    assert!(result
        .failed
        .iter()
        .all(|failure| failure.code == "UNIT_NOT_FOUND"));

    // No rollback: every listed unit kept its listing.
    for unit_id in listed {
        assert!(harness.lifecycle.listing_for_unit(&unit_id).is_ok());
    }

    let summary = harness
        .store
        .audit_entries()
        .into_iter()
        .find(|entry| entry.action == AuditAction::BulkSummary)
        .expect("summary entry written");
    assert_eq!(summary.metadata.get("rolled_back").map(String::as_str), Some("false"));
}

#[test]
fn failure_density_at_threshold_rolls_back_created_listings() {
    let harness = harness();

    let mut operations = Vec::new();
    let mut listed = Vec::new();
    for index in 0..4 {
        let unit_id = seed_unit(&harness.store, &format!("u-ok-{index}"), LeaseState::Vacant);
        operations.push(op(&unit_id, BulkAction::List));
        listed.push(unit_id);
    }
    for index in 0..6 {
        operations.push(op(&UnitId(format!("u-ghost-{index}")), BulkAction::List));
    }

    let err = harness
        .bulk
        .bulk_apply(operations, &actor(), &org())
        .expect_err("60% failure density must fail the batch");

    match err {
        BulkError::TransactionFailed { total, failed } => {
            assert_eq!(total, 10);
            assert_eq!(failed, 6);
        }
        other => panic!("expected transaction failure, got {other}"),
    }

    // Every committed create was compensated away.
    for unit_id in listed {
        assert!(harness.lifecycle.listing_for_unit(&unit_id).is_err());
    }

    let summary = harness
        .store
        .audit_entries()
        .into_iter()
        .find(|entry| entry.action == AuditAction::BulkSummary)
        .expect("summary entry written");
    assert_eq!(summary.metadata.get("rolled_back").map(String::as_str), Some("true"));
}

#[test]
fn rollback_recreates_removed_listings_from_their_snapshot() {
    let harness = harness();
    let unit_id = seed_unit(&harness.store, "u-keep", LeaseState::Vacant);
    let original = harness
        .lifecycle
        .create_listing(
            &unit_id,
            ListingDraft {
                title: Some("Corner two-bed with river view".to_string()),
                price: Some(1425.0),
                ..ListingDraft::default()
            },
            &actor(),
            &org(),
        )
        .expect("listing created");

    let operations = vec![
        op(&unit_id, BulkAction::Unlist),
        op(&UnitId("u-ghost-0".to_string()), BulkAction::Unlist),
        op(&UnitId("u-ghost-1".to_string()), BulkAction::Unlist),
    ];

    let err = harness
        .bulk
        .bulk_apply(operations, &actor(), &org())
        .expect_err("two of three failing crosses the threshold");
    assert_eq!(err.code(), "TRANSACTION_FAILED");

    let restored = harness
        .lifecycle
        .listing_for_unit(&unit_id)
        .expect("listing restored by rollback");
    assert_eq!(restored.title, "Corner two-bed with river view");
    assert_eq!(restored.price, 1425.0);
    // Compensation re-creates; it cannot resurrect the original row.
    assert_ne!(restored.id, original.id);
}

#[test]
fn mixed_actions_dispatch_to_their_lifecycle_operations() {
    let harness = harness();
    let to_suspend = seed_unit(&harness.store, "u-suspend", LeaseState::Vacant);
    let to_maintain = seed_unit(&harness.store, "u-maintain", LeaseState::Vacant);
    let to_list = seed_unit(&harness.store, "u-list", LeaseState::Vacant);

    for unit_id in [&to_suspend, &to_maintain] {
        harness
            .lifecycle
            .create_listing(unit_id, ListingDraft::default(), &actor(), &org())
            .expect("listing created");
    }

    let result = harness
        .bulk
        .bulk_apply(
            vec![
                op(&to_suspend, BulkAction::Suspend),
                op(&to_maintain, BulkAction::MaintenanceStart),
                op(&to_list, BulkAction::List),
            ],
            &actor(),
            &org(),
        )
        .expect("batch succeeds");

    assert_eq!(result.summary.succeeded, 3);
    assert_eq!(
        harness
            .lifecycle
            .listing_for_unit(&to_suspend)
            .expect("listing")
            .status,
        ListingStatus::Suspended
    );
    assert_eq!(
        harness
            .lifecycle
            .listing_for_unit(&to_maintain)
            .expect("listing")
            .status,
        ListingStatus::Maintenance
    );
    assert_eq!(
        harness
            .lifecycle
            .listing_for_unit(&to_list)
            .expect("listing")
            .status,
        ListingStatus::Active
    );
}

/// Store wrapper whose listing reads can be switched off mid-test.
struct UnreliableStore {
    inner: InMemoryMarketplaceStore,
    fail_listing_reads: AtomicBool,
}

impl MarketplaceStore for UnreliableStore {
    fn unit(&self, id: &UnitId) -> Result<Option<Unit>, StoreError> {
        self.inner.unit(id)
    }

    fn upsert_unit(&self, unit: Unit) -> Result<(), StoreError> {
        self.inner.upsert_unit(unit)
    }

    fn listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        self.inner.listing(id)
    }

    fn listing_for_unit(&self, unit_id: &UnitId) -> Result<Option<Listing>, StoreError> {
        if self.fail_listing_reads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("listing index offline".to_string()));
        }
        self.inner.listing_for_unit(unit_id)
    }

    fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        self.inner.listings()
    }

    fn insert_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner.insert_listing(listing, entry)
    }

    fn delete_listing(&self, listing_id: &ListingId, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner.delete_listing(listing_id, entry)
    }

    fn update_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner.update_listing(listing, entry)
    }

    fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner.append_audit(entry)
    }

    fn audit_for_unit(&self, unit_id: &UnitId) -> Result<Vec<AuditEntry>, StoreError> {
        self.inner.audit_for_unit(unit_id)
    }

    fn insert_application(&self, application: TenantApplication) -> Result<(), StoreError> {
        self.inner.insert_application(application)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<TenantApplication>, StoreError> {
        self.inner.application(id)
    }

    fn pending_applications(&self, unit_id: &UnitId) -> Result<Vec<TenantApplication>, StoreError> {
        self.inner.pending_applications(unit_id)
    }

    fn update_application(&self, application: TenantApplication) -> Result<(), StoreError> {
        self.inner.update_application(application)
    }
}

#[test]
fn snapshot_read_failures_surface_as_per_unit_validation_failures() {
    let store = Arc::new(UnreliableStore {
        inner: InMemoryMarketplaceStore::new(),
        fail_listing_reads: AtomicBool::new(false),
    });
    let notices = Arc::new(InMemoryNotificationPublisher::default());
    let cache = Arc::new(TtlUnitCache::new(Duration::from_secs(300)));
    let lifecycle = Arc::new(ListingLifecycleService::new(
        store.clone(),
        notices,
        cache,
        LifecyclePolicy::default(),
    ));
    let bulk = BulkCoordinator::new(lifecycle.clone(), store.clone());

    let unit_id = seed_unit(&store.inner, "u-flaky", LeaseState::Vacant);
    lifecycle
        .create_listing(&unit_id, ListingDraft::default(), &actor(), &org())
        .expect("listing created while reads work");

    store.fail_listing_reads.store(true, Ordering::Relaxed);
    let result = bulk
        .bulk_apply(vec![op(&unit_id, BulkAction::Unlist)], &actor(), &org())
        .expect("single op batch returns a result");

    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.failed[0].code, "VALIDATION_FAILED");
    assert!(result.failed[0].message.contains("listing index offline"));

    // The listing itself was never touched.
    store.fail_listing_reads.store(false, Ordering::Relaxed);
    let listing = lifecycle
        .listing_for_unit(&unit_id)
        .expect("listing still present");
    assert_eq!(listing.status, ListingStatus::Active);
}

#[test]
fn units_named_batch_keep_their_audit_trail_to_themselves() {
    let harness = harness();
    let unit_id = seed_unit(&harness.store, "batch", LeaseState::Vacant);

    harness
        .bulk
        .bulk_apply(vec![op(&unit_id, BulkAction::List)], &actor(), &org())
        .expect("batch succeeds");

    let entries = harness.store.audit_for_unit(&unit_id).expect("audit reads");
    assert!(entries
        .iter()
        .any(|entry| entry.action == AuditAction::ListingCreated));
    assert!(entries
        .iter()
        .all(|entry| entry.action != AuditAction::BulkSummary));
}

#[test]
fn single_operation_batches_never_roll_back() {
    let harness = harness();

    let result = harness.bulk.bulk_apply(
        vec![op(&UnitId("u-ghost".to_string()), BulkAction::List)],
        &actor(),
        &org(),
    );

    // 100% failure, but a batch of one reports per-unit detail instead of
    // a systemic transaction failure.
    let result = result.expect("single op batch returns a result");
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.summary.succeeded, 0);
}
