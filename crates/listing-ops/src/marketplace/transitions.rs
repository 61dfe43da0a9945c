use super::domain::ListingStatus;

/// Allowed successor statuses for a listing, as a fixed adjacency table.
///
/// The table is data, not policy: callers that need to veto a transition for
/// business reasons do so before consulting it. Self-transitions are never
/// listed and therefore never valid.
pub const fn allowed_successors(from: ListingStatus) -> &'static [ListingStatus] {
    use ListingStatus::*;

    match from {
        Private => &[Active, Pending, ComingSoon],
        Pending => &[Active, Private, ComingSoon],
        ComingSoon => &[Active, Private, Suspended],
        Active => &[Private, Suspended, Expired, Maintenance],
        Suspended => &[Active, Private, Maintenance],
        Expired => &[Active, Private, ComingSoon],
        Maintenance => &[Active, Private, Suspended],
    }
}

/// Pure lookup against the adjacency table. No side effects; disallowed
/// pairs (including unlisted self-transitions) return false.
pub fn is_valid_transition(from: ListingStatus, to: ListingStatus) -> bool {
    allowed_successors(from).contains(&to)
}
