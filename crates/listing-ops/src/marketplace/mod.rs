//! Marketplace listing lifecycle: the status state machine, audit trail,
//! application consistency guard, and bulk-operation coordinator.
//!
//! The lifecycle manager is the only writer of listing state; every change
//! goes through the transition table, lands in the audit log, and is relayed
//! to the consistency guard so pending tenant applications stay coherent
//! with what the marketplace is actually showing.

pub mod audit;
pub mod bulk;
pub mod cache;
pub mod domain;
pub mod guard;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use audit::{AuditAction, AuditEntry};
pub use bulk::{
    BulkAction, BulkCoordinator, BulkError, BulkFailure, BulkOperation, BulkResult, BulkSummary,
};
pub use cache::{NoopUnitCache, TtlUnitCache, UnitCache};
pub use domain::{
    ActorId, ApplicationId, ApplicationStatus, LeaseState, Listing, ListingDraft, ListingId,
    ListingStatus, MaintenanceRequest, MaintenanceWindow, OrgId, TenantApplication, Unit, UnitId,
};
pub use guard::{ConsistencyGuard, GuardAction, GuardOutcome};
pub use lifecycle::{
    LifecyclePolicy, ListingError, ListingLifecycleService, SweepOutcome,
};
pub use memory::{InMemoryMarketplaceStore, InMemoryNotificationPublisher};
pub use repository::{
    ListingNotice, MarketplaceStore, NotificationPublisher, NotifyError, StoreError,
};
pub use router::{marketplace_router, MarketplaceHandles};
pub use transitions::{allowed_successors, is_valid_transition};
