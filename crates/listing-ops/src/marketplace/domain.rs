use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace visibility state of a unit's listing.
///
/// `Private` is the implicit initial state: the unit exists but has never
/// been listed (or its listing was removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Private,
    Pending,
    ComingSoon,
    Active,
    Suspended,
    Maintenance,
    Expired,
}

impl ListingStatus {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Private,
            Self::Pending,
            Self::ComingSoon,
            Self::Active,
            Self::Suspended,
            Self::Maintenance,
            Self::Expired,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Private => "Private",
            Self::Pending => "Pending",
            Self::ComingSoon => "Coming Soon",
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Maintenance => "Maintenance",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lease occupancy state of a unit. A unit with a pending or active lease
/// may not acquire a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseState {
    Vacant,
    Pending,
    Active,
}

/// A rentable physical space belonging to a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub property_code: String,
    pub bedrooms: u8,
    pub bathrooms: u8,
    pub market_rent: f64,
    pub lease_state: LeaseState,
    /// Back-reference to the unit's current listing, if any. A unit carries
    /// at most one listing at a time.
    pub listing_id: Option<ListingId>,
}

/// Open maintenance window on a listing. Stores the status to restore when
/// maintenance ends, so it never has to be reconstructed from history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub previous_status: ListingStatus,
    pub started_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A unit's marketplace-visible advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub unit_id: UnitId,
    pub status: ListingStatus,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub available_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
    pub maintenance: Option<MaintenanceWindow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: ActorId,
}

/// Caller-supplied listing fields. Anything left unset is filled from the
/// unit's attributes with deterministic templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub available_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Prospective tenant application tied to a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantApplication {
    pub id: ApplicationId,
    pub unit_id: UnitId,
    pub applicant_name: String,
    pub applicant_email: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Request payload for moving a unit's listing into maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub unit_id: UnitId,
    pub note: Option<String>,
}
