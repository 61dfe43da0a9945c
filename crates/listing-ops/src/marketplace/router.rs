use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::bulk::{BulkCoordinator, BulkError, BulkOperation};
use super::domain::{
    ActorId, ListingDraft, ListingId, ListingStatus, MaintenanceRequest, OrgId, UnitId,
};
use super::lifecycle::{ListingError, ListingLifecycleService};
use super::repository::{MarketplaceStore, NotificationPublisher};

/// Shared handles behind every marketplace endpoint. Constructed once at
/// application start and passed in explicitly; nothing here is global.
pub struct MarketplaceHandles<S, N> {
    pub lifecycle: Arc<ListingLifecycleService<S, N>>,
    pub bulk: Arc<BulkCoordinator<S, N>>,
}

impl<S, N> Clone for MarketplaceHandles<S, N> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: self.lifecycle.clone(),
            bulk: self.bulk.clone(),
        }
    }
}

/// Router builder exposing the listing lifecycle and bulk endpoints. All
/// bodies share the `{ success, data?, error?, message? }` envelope.
pub fn marketplace_router<S, N>(handles: MarketplaceHandles<S, N>) -> Router
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/units/:unit_id/listing",
            post(create_listing_handler::<S, N>)
                .get(listing_handler::<S, N>)
                .delete(remove_listing_handler::<S, N>),
        )
        .route(
            "/api/v1/units/:unit_id/maintenance",
            post(start_maintenance_handler::<S, N>).delete(end_maintenance_handler::<S, N>),
        )
        .route(
            "/api/v1/units/:unit_id/audit",
            get(audit_trail_handler::<S, N>),
        )
        .route(
            "/api/v1/listings/:listing_id/status",
            post(update_status_handler::<S, N>),
        )
        .route("/api/v1/listings/bulk", post(bulk_handler::<S, N>))
        .route("/api/v1/listings/sweep", post(sweep_handler::<S, N>))
        .with_state(handles)
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub actor: String,
    pub org: String,
    #[serde(flatten)]
    pub draft: ListingDraft,
}

#[derive(Debug, Deserialize)]
pub struct RemoveListingRequest {
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ListingStatus,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartMaintenanceRequest {
    pub actor: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndMaintenanceRequest {
    pub actor: String,
    #[serde(default)]
    pub restore_status: Option<ListingStatus>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub actor: String,
    pub org: String,
    pub operations: Vec<BulkOperation>,
}

#[derive(Debug, Deserialize)]
pub struct SweepRequest {
    pub actor: String,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

fn ok(status: StatusCode, data: impl serde::Serialize) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

fn listing_error(err: ListingError) -> Response {
    let status = match &err {
        ListingError::UnitNotFound(_)
        | ListingError::ListingNotFound(_)
        | ListingError::NoListingForUnit(_) => StatusCode::NOT_FOUND,
        ListingError::UnitAlreadyListed { .. }
        | ListingError::UnitHasActiveLease(_)
        | ListingError::InvalidTransition { .. }
        | ListingError::NotInMaintenance(_) => StatusCode::CONFLICT,
        ListingError::InvalidUnitData { .. } | ListingError::ValidationFailed(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ListingError::CleanupFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = Json(json!({
        "success": false,
        "error": err.code(),
        "message": err.to_string(),
    }));
    (status, body).into_response()
}

fn bulk_error(err: BulkError) -> Response {
    let status = match &err {
        BulkError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BulkError::TransactionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = Json(json!({
        "success": false,
        "error": err.code(),
        "message": err.to_string(),
    }));
    (status, body).into_response()
}

async fn create_listing_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
    Json(request): Json<CreateListingRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = handles.lifecycle.create_listing(
        &UnitId(unit_id),
        request.draft,
        &ActorId(request.actor),
        &OrgId(request.org),
    );

    match result {
        Ok(listing) => ok(StatusCode::CREATED, listing),
        Err(err) => listing_error(err),
    }
}

async fn listing_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    match handles.lifecycle.listing_for_unit(&UnitId(unit_id)) {
        Ok(listing) => ok(StatusCode::OK, listing),
        Err(err) => listing_error(err),
    }
}

async fn remove_listing_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
    Json(request): Json<RemoveListingRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let unit_id = UnitId(unit_id);
    match handles
        .lifecycle
        .remove_listing(&unit_id, &ActorId(request.actor), request.reason)
    {
        Ok(()) => ok(
            StatusCode::OK,
            json!({ "unit_id": unit_id, "status": ListingStatus::Private }),
        ),
        Err(err) => listing_error(err),
    }
}

async fn update_status_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(listing_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = handles.lifecycle.update_status(
        &ListingId(listing_id),
        request.status,
        &ActorId(request.actor),
        request.reason,
    );

    match result {
        Ok(listing) => ok(StatusCode::OK, listing),
        Err(err) => listing_error(err),
    }
}

async fn start_maintenance_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
    Json(request): Json<StartMaintenanceRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = handles.lifecycle.start_maintenance(
        MaintenanceRequest {
            unit_id: UnitId(unit_id),
            note: request.note,
        },
        &ActorId(request.actor),
    );

    match result {
        Ok(listing) => ok(StatusCode::OK, listing),
        Err(err) => listing_error(err),
    }
}

async fn end_maintenance_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
    Json(request): Json<EndMaintenanceRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = handles.lifecycle.end_maintenance(
        &UnitId(unit_id),
        &ActorId(request.actor),
        request.restore_status,
        request.reason,
    );

    match result {
        Ok(listing) => ok(StatusCode::OK, listing),
        Err(err) => listing_error(err),
    }
}

async fn audit_trail_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Path(unit_id): Path<String>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    match handles.lifecycle.audit_trail(&UnitId(unit_id)) {
        Ok(entries) => ok(StatusCode::OK, entries),
        Err(err) => listing_error(err),
    }
}

async fn bulk_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Json(request): Json<BulkRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let result = handles.bulk.bulk_apply(
        request.operations,
        &ActorId(request.actor),
        &OrgId(request.org),
    );

    match result {
        Ok(outcome) => ok(StatusCode::OK, outcome),
        Err(err) => bulk_error(err),
    }
}

async fn sweep_handler<S, N>(
    State(handles): State<MarketplaceHandles<S, N>>,
    Json(request): Json<SweepRequest>,
) -> Response
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let today = request.today.unwrap_or_else(|| Utc::now().date_naive());
    match handles
        .lifecycle
        .process_time_based_transitions(today, &ActorId(request.actor))
    {
        Ok(outcome) => ok(StatusCode::OK, outcome),
        Err(err) => listing_error(err),
    }
}
