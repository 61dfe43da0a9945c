use chrono::NaiveDate;
use listing_ops::config::MarketplaceConfig;
use listing_ops::marketplace::{
    BulkCoordinator, InMemoryMarketplaceStore, InMemoryNotificationPublisher, LeaseState,
    LifecyclePolicy, ListingLifecycleService, MarketplaceStore, StoreError, TtlUnitCache, Unit,
    UnitId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Lifecycle =
    ListingLifecycleService<InMemoryMarketplaceStore, InMemoryNotificationPublisher>;
pub(crate) type Bulk = BulkCoordinator<InMemoryMarketplaceStore, InMemoryNotificationPublisher>;

pub(crate) struct Marketplace {
    pub(crate) store: Arc<InMemoryMarketplaceStore>,
    pub(crate) notices: Arc<InMemoryNotificationPublisher>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) bulk: Arc<Bulk>,
}

/// Assemble the marketplace services around a fresh in-memory store.
pub(crate) fn build_marketplace(config: &MarketplaceConfig) -> Marketplace {
    let store = Arc::new(InMemoryMarketplaceStore::new());
    let notices = Arc::new(InMemoryNotificationPublisher::default());
    let cache = Arc::new(TtlUnitCache::new(config.cache_ttl()));
    let lifecycle = Arc::new(ListingLifecycleService::new(
        store.clone(),
        notices.clone(),
        cache,
        LifecyclePolicy {
            price_warning_ceiling: config.price_warning_ceiling,
        },
    ));
    let bulk = Arc::new(BulkCoordinator::new(lifecycle.clone(), store.clone()));

    Marketplace {
        store,
        notices,
        lifecycle,
        bulk,
    }
}

/// Seed a small portfolio so the in-memory service is usable out of the box.
/// Returns the seeded unit ids in insertion order.
pub(crate) fn seed_sample_units(
    store: &InMemoryMarketplaceStore,
) -> Result<Vec<UnitId>, StoreError> {
    let units = [
        ("unit-ash-101", "ASHBY", 1, 1, 1_050.0, LeaseState::Vacant),
        ("unit-ash-102", "ASHBY", 2, 1, 1_340.0, LeaseState::Vacant),
        ("unit-riv-201", "RIVER", 2, 2, 1_625.0, LeaseState::Vacant),
        ("unit-riv-202", "RIVER", 3, 2, 1_980.0, LeaseState::Active),
        ("unit-riv-203", "RIVER", 1, 1, 1_100.0, LeaseState::Pending),
    ];

    let mut seeded = Vec::with_capacity(units.len());
    for (id, property_code, bedrooms, bathrooms, market_rent, lease_state) in units {
        let unit_id = UnitId(id.to_string());
        store.upsert_unit(Unit {
            id: unit_id.clone(),
            property_code: property_code.to_string(),
            bedrooms,
            bathrooms,
            market_rent,
            lease_state,
            listing_id: None,
        })?;
        seeded.push(unit_id);
    }

    Ok(seeded)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
