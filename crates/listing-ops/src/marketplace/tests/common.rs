use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use crate::marketplace::bulk::BulkCoordinator;
use crate::marketplace::cache::TtlUnitCache;
use crate::marketplace::domain::{
    ActorId, ApplicationId, ApplicationStatus, LeaseState, OrgId, TenantApplication, Unit, UnitId,
};
use crate::marketplace::lifecycle::{LifecyclePolicy, ListingLifecycleService};
use crate::marketplace::memory::{InMemoryMarketplaceStore, InMemoryNotificationPublisher};
use crate::marketplace::repository::MarketplaceStore;

pub(super) type Lifecycle =
    ListingLifecycleService<InMemoryMarketplaceStore, InMemoryNotificationPublisher>;
pub(super) type Bulk = BulkCoordinator<InMemoryMarketplaceStore, InMemoryNotificationPublisher>;

pub(super) struct Harness {
    pub store: Arc<InMemoryMarketplaceStore>,
    pub notices: Arc<InMemoryNotificationPublisher>,
    pub lifecycle: Arc<Lifecycle>,
    pub bulk: Arc<Bulk>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let notices = Arc::new(InMemoryNotificationPublisher::default());
    let cache = Arc::new(TtlUnitCache::new(Duration::from_secs(300)));
    let lifecycle = Arc::new(ListingLifecycleService::new(
        store.clone(),
        notices.clone(),
        cache,
        LifecyclePolicy::default(),
    ));
    let bulk = Arc::new(BulkCoordinator::new(lifecycle.clone(), store.clone()));

    Harness {
        store,
        notices,
        lifecycle,
        bulk,
    }
}

pub(super) fn actor() -> ActorId {
    ActorId("mgr-sandra".to_string())
}

pub(super) fn org() -> OrgId {
    OrgId("org-riverfront".to_string())
}

pub(super) fn seed_unit(store: &InMemoryMarketplaceStore, id: &str, lease_state: LeaseState) -> UnitId {
    let unit_id = UnitId(id.to_string());
    store
        .upsert_unit(Unit {
            id: unit_id.clone(),
            property_code: "RIVER".to_string(),
            bedrooms: 2,
            bathrooms: 1,
            market_rent: 1180.0,
            lease_state,
            listing_id: None,
        })
        .expect("unit seeds");
    unit_id
}

pub(super) fn seed_pending_application(
    store: &InMemoryMarketplaceStore,
    unit_id: &UnitId,
    suffix: &str,
) -> ApplicationId {
    let id = ApplicationId(format!("app-{suffix}"));
    store
        .insert_application(TenantApplication {
            id: id.clone(),
            unit_id: unit_id.clone(),
            applicant_name: "Jordan Reyes".to_string(),
            applicant_email: format!("jordan+{suffix}@example.com"),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
        })
        .expect("application seeds");
    id
}

pub(super) fn days_from_today(days: i64) -> NaiveDate {
    Utc::now().date_naive() + ChronoDuration::days(days)
}
