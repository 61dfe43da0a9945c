use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use listing_ops::marketplace::{
    ActorId, ApplicationId, ApplicationStatus, AuditAction, InMemoryMarketplaceStore,
    InMemoryNotificationPublisher, LeaseState, LifecyclePolicy, ListingDraft,
    ListingLifecycleService, ListingStatus, MaintenanceRequest, MarketplaceStore, OrgId,
    TenantApplication, TtlUnitCache, Unit, UnitId,
};

type Lifecycle = ListingLifecycleService<InMemoryMarketplaceStore, InMemoryNotificationPublisher>;

fn marketplace() -> (Arc<InMemoryMarketplaceStore>, Arc<Lifecycle>) {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let notices = Arc::new(InMemoryNotificationPublisher::default());
    let cache = Arc::new(TtlUnitCache::new(Duration::from_secs(300)));
    let lifecycle = Arc::new(ListingLifecycleService::new(
        store.clone(),
        notices,
        cache,
        LifecyclePolicy::default(),
    ));
    (store, lifecycle)
}

fn seed_unit(store: &InMemoryMarketplaceStore, id: &str) -> UnitId {
    let unit_id = UnitId(id.to_string());
    store
        .upsert_unit(Unit {
            id: unit_id.clone(),
            property_code: "ELM".to_string(),
            bedrooms: 2,
            bathrooms: 1,
            market_rent: 1_250.0,
            lease_state: LeaseState::Vacant,
            listing_id: None,
        })
        .expect("unit seeds");
    unit_id
}

fn actor() -> ActorId {
    ActorId("mgr-avery".to_string())
}

fn org() -> OrgId {
    OrgId("org-elmwood".to_string())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[test]
fn lifecycle_round_trip_leaves_a_complete_audit_trail() {
    let (store, lifecycle) = marketplace();
    let unit_id = seed_unit(&store, "unit-elm-301");

    let listing = lifecycle
        .create_listing(&unit_id, ListingDraft::default(), &actor(), &org())
        .expect("vacant unit lists");
    assert_eq!(listing.status, ListingStatus::Active);

    lifecycle
        .update_status(
            &listing.id,
            ListingStatus::Suspended,
            &actor(),
            Some("owner hold".to_string()),
        )
        .expect("active listing suspends");

    lifecycle
        .start_maintenance(
            MaintenanceRequest {
                unit_id: unit_id.clone(),
                note: Some("repaint".to_string()),
            },
            &actor(),
        )
        .expect("suspended listing enters maintenance");

    let restored = lifecycle
        .end_maintenance(&unit_id, &actor(), None, None)
        .expect("maintenance ends");
    assert_eq!(
        restored.status,
        ListingStatus::Suspended,
        "default restore target is the pre-maintenance status"
    );

    lifecycle
        .remove_listing(&unit_id, &actor(), Some("unit sold".to_string()))
        .expect("listing removes");

    let actions: Vec<_> = store
        .audit_for_unit(&unit_id)
        .expect("audit reads")
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::ListingCreated,
            AuditAction::StatusChanged,
            AuditAction::MaintenanceStarted,
            AuditAction::MaintenanceEnded,
            AuditAction::ListingRemoved,
        ]
    );

    let unit = store
        .unit(&unit_id)
        .expect("unit reads")
        .expect("unit still present");
    assert!(unit.listing_id.is_none(), "removal clears the back-reference");
}

#[test]
fn coming_soon_listings_activate_when_their_date_arrives() {
    let (store, lifecycle) = marketplace();
    let unit_id = seed_unit(&store, "unit-elm-302");

    let draft = ListingDraft {
        available_on: Some(today() + ChronoDuration::days(5)),
        ..ListingDraft::default()
    };
    let listing = lifecycle
        .create_listing(&unit_id, draft, &actor(), &org())
        .expect("future availability lists");
    assert_eq!(listing.status, ListingStatus::ComingSoon);

    let outcome = lifecycle
        .process_time_based_transitions(today() + ChronoDuration::days(5), &actor())
        .expect("sweep runs");
    assert_eq!(outcome.activated, vec![listing.id]);
    assert!(outcome.expired.is_empty());

    let refreshed = lifecycle
        .listing_for_unit(&unit_id)
        .expect("listing reads back");
    assert_eq!(refreshed.status, ListingStatus::Active);

    let auto_entries = store
        .audit_for_unit(&unit_id)
        .expect("audit reads")
        .into_iter()
        .filter(|entry| entry.action == AuditAction::AutoActivated)
        .count();
    assert_eq!(auto_entries, 1);
}

#[test]
fn removing_a_listing_rejects_its_pending_applications() {
    let (store, lifecycle) = marketplace();
    let unit_id = seed_unit(&store, "unit-elm-303");
    lifecycle
        .create_listing(&unit_id, ListingDraft::default(), &actor(), &org())
        .expect("listing creates");

    let application_id = ApplicationId("app-elm-001".to_string());
    store
        .insert_application(TenantApplication {
            id: application_id.clone(),
            unit_id: unit_id.clone(),
            applicant_name: "Rowan Ellis".to_string(),
            applicant_email: "rowan@example.com".to_string(),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
        })
        .expect("application seeds");

    lifecycle
        .remove_listing(&unit_id, &actor(), None)
        .expect("listing removes");

    let application = store
        .application(&application_id)
        .expect("application reads")
        .expect("application still stored");
    assert_eq!(application.status, ApplicationStatus::Rejected);
}

#[test]
fn double_listing_attempts_do_not_disturb_the_existing_listing() {
    let (store, lifecycle) = marketplace();
    let unit_id = seed_unit(&store, "unit-elm-304");

    let first = lifecycle
        .create_listing(&unit_id, ListingDraft::default(), &actor(), &org())
        .expect("first create succeeds");
    let audit_before = store.audit_for_unit(&unit_id).expect("audit reads").len();

    let second = lifecycle.create_listing(&unit_id, ListingDraft::default(), &actor(), &org());
    assert!(second.is_err(), "second create on the same unit is refused");

    let current = lifecycle
        .listing_for_unit(&unit_id)
        .expect("listing reads back");
    assert_eq!(current.id, first.id);
    let audit_after = store.audit_for_unit(&unit_id).expect("audit reads").len();
    assert_eq!(audit_before, audit_after, "a refused create writes nothing");
}
