use std::collections::HashMap;
use std::sync::Mutex;

use super::audit::AuditEntry;
use super::domain::{
    ApplicationId, ApplicationStatus, Listing, ListingId, TenantApplication, Unit, UnitId,
};
use super::repository::{
    ListingNotice, MarketplaceStore, NotificationPublisher, NotifyError, StoreError,
};

#[derive(Default)]
struct StoreInner {
    units: HashMap<UnitId, Unit>,
    listings: HashMap<ListingId, Listing>,
    applications: HashMap<ApplicationId, TenantApplication>,
    audit: Vec<AuditEntry>,
}

/// Reference store backed by process memory. One mutex guards all four
/// collections, which is what makes the grouped commit operations atomic.
#[derive(Default)]
pub struct InMemoryMarketplaceStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryMarketplaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full audit trail in append order, primarily for demos and tests.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .audit
            .clone()
    }
}

impl MarketplaceStore for InMemoryMarketplaceStore {
    fn unit(&self, id: &UnitId) -> Result<Option<Unit>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.units.get(id).cloned())
    }

    fn upsert_unit(&self, unit: Unit) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.units.insert(unit.id.clone(), unit);
        Ok(())
    }

    fn listing(&self, id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.listings.get(id).cloned())
    }

    fn listing_for_unit(&self, unit_id: &UnitId) -> Result<Option<Listing>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let listing_id = match inner.units.get(unit_id).and_then(|unit| unit.listing_id.as_ref()) {
            Some(listing_id) => listing_id,
            None => return Ok(None),
        };
        Ok(inner.listings.get(listing_id).cloned())
    }

    fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut listings: Vec<Listing> = inner.listings.values().cloned().collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listings)
    }

    fn insert_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        let unit = inner
            .units
            .get(&listing.unit_id)
            .ok_or(StoreError::NotFound)?;
        if unit.listing_id.is_some() {
            return Err(StoreError::Conflict);
        }
        if inner.listings.contains_key(&listing.id) {
            return Err(StoreError::Conflict);
        }

        let unit_id = listing.unit_id.clone();
        let listing_id = listing.id.clone();
        inner.listings.insert(listing_id.clone(), listing);
        if let Some(unit) = inner.units.get_mut(&unit_id) {
            unit.listing_id = Some(listing_id);
        }
        inner.audit.push(entry);
        Ok(())
    }

    fn delete_listing(
        &self,
        listing_id: &ListingId,
        entry: AuditEntry,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        let listing = inner
            .listings
            .remove(listing_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(unit) = inner.units.get_mut(&listing.unit_id) {
            unit.listing_id = None;
        }
        inner.audit.push(entry);
        Ok(())
    }

    fn update_listing(&self, listing: Listing, entry: AuditEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        if !inner.listings.contains_key(&listing.id) {
            return Err(StoreError::NotFound);
        }
        inner.listings.insert(listing.id.clone(), listing);
        inner.audit.push(entry);
        Ok(())
    }

    fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.audit.push(entry);
        Ok(())
    }

    fn audit_for_unit(&self, unit_id: &UnitId) -> Result<Vec<AuditEntry>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .audit
            .iter()
            .filter(|entry| entry.unit_id.as_ref() == Some(unit_id))
            .cloned()
            .collect())
    }

    fn insert_application(&self, application: TenantApplication) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.applications.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        inner
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<TenantApplication>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.applications.get(id).cloned())
    }

    fn pending_applications(
        &self,
        unit_id: &UnitId,
    ) -> Result<Vec<TenantApplication>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut pending: Vec<TenantApplication> = inner
            .applications
            .values()
            .filter(|application| {
                &application.unit_id == unit_id
                    && application.status == ApplicationStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(pending)
    }

    fn update_application(&self, application: TenantApplication) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if !inner.applications.contains_key(&application.id) {
            return Err(StoreError::NotFound);
        }
        inner
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }
}

/// Notification sink that records every notice, for demos and assertions.
#[derive(Default)]
pub struct InMemoryNotificationPublisher {
    events: Mutex<Vec<ListingNotice>>,
}

impl InMemoryNotificationPublisher {
    pub fn events(&self) -> Vec<ListingNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

impl NotificationPublisher for InMemoryNotificationPublisher {
    fn publish(&self, notice: ListingNotice) -> Result<(), NotifyError> {
        let mut guard = self.events.lock().expect("notice mutex poisoned");
        guard.push(notice);
        Ok(())
    }
}
