use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::domain::{ApplicationId, ApplicationStatus, ListingStatus, UnitId};
use super::repository::{ListingNotice, MarketplaceStore, NotificationPublisher, StoreError};

/// Action taken on one pending application in response to a listing status
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GuardAction {
    Rejected {
        application_id: ApplicationId,
        reason: String,
    },
    /// Status left untouched; the applicant was alerted out of band.
    Notified {
        application_id: ApplicationId,
    },
    Maintained {
        application_id: ApplicationId,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GuardOutcome {
    pub applications_affected: usize,
    pub actions: Vec<GuardAction>,
}

/// Reacts to listing status changes by rejecting, alerting, or leaving alone
/// the pending applications on the affected unit.
///
/// Idempotent by construction: only `Pending` rows are selected, so
/// re-applying the same transition finds nothing left to touch.
pub struct ConsistencyGuard<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
}

impl<S, N> ConsistencyGuard<S, N>
where
    S: MarketplaceStore,
    N: NotificationPublisher,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self { store, notices }
    }

    pub fn on_status_change(
        &self,
        unit_id: &UnitId,
        new_status: ListingStatus,
        previous_status: Option<ListingStatus>,
        reason: Option<&str>,
    ) -> Result<GuardOutcome, StoreError> {
        let pending = self.store.pending_applications(unit_id)?;
        let mut outcome = GuardOutcome::default();

        for mut application in pending {
            let action = match new_status {
                ListingStatus::Private => {
                    let rejection = reason
                        .map(str::to_string)
                        .unwrap_or_else(|| "unit removed from marketplace".to_string());
                    application.status = ApplicationStatus::Rejected;
                    self.store.update_application(application.clone())?;
                    self.dispatch(
                        "application_rejected",
                        &application.applicant_email,
                        unit_id,
                        &application.id,
                        &rejection,
                    );
                    outcome.applications_affected += 1;
                    GuardAction::Rejected {
                        application_id: application.id,
                        reason: rejection,
                    }
                }
                ListingStatus::Expired => {
                    let rejection = "listing expired".to_string();
                    application.status = ApplicationStatus::Rejected;
                    self.store.update_application(application.clone())?;
                    self.dispatch(
                        "application_rejected",
                        &application.applicant_email,
                        unit_id,
                        &application.id,
                        &rejection,
                    );
                    outcome.applications_affected += 1;
                    GuardAction::Rejected {
                        application_id: application.id,
                        reason: rejection,
                    }
                }
                ListingStatus::Maintenance | ListingStatus::Suspended => {
                    self.dispatch(
                        "listing_unavailable_notice",
                        &application.applicant_email,
                        unit_id,
                        &application.id,
                        reason.unwrap_or("listing temporarily unavailable"),
                    );
                    outcome.applications_affected += 1;
                    GuardAction::Notified {
                        application_id: application.id,
                    }
                }
                ListingStatus::Active => GuardAction::Maintained {
                    application_id: application.id,
                },
                other => {
                    warn!(
                        unit = %unit_id,
                        status = other.label(),
                        previous = ?previous_status,
                        "no consistency rule for listing status; leaving application untouched"
                    );
                    GuardAction::Maintained {
                        application_id: application.id,
                    }
                }
            };

            outcome.actions.push(action);
        }

        Ok(outcome)
    }

    /// Fire-and-forget notification; transport failures are logged only.
    fn dispatch(
        &self,
        template: &str,
        recipient: &str,
        unit_id: &UnitId,
        application_id: &ApplicationId,
        reason: &str,
    ) {
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), reason.to_string());

        let notice = ListingNotice {
            template: template.to_string(),
            recipient: recipient.to_string(),
            unit_id: unit_id.clone(),
            application_id: Some(application_id.clone()),
            details,
        };

        if let Err(err) = self.notices.publish(notice) {
            warn!(unit = %unit_id, application = %application_id, error = %err, "notification dispatch failed");
        }
    }
}
