//! HTTP API for Cohort.
//!
//! Handlers are thin: decode, run the engine call on the blocking pool,
//! encode. Engine errors become `{ "kind": ..., "error": ... }` bodies with a
//! status code chosen by [`ErrorKind`].

use crate::engine::{
    DealDetail, DealView, Engine, GroupStatusView, LockOutcome, RedemptionView,
};
use crate::error::{Error, ErrorKind, Result};
use crate::models::{
    ActivityRecord, Deal, Group, GroupStatus, NewDeal, Notification, Redemption,
};
use crate::node::CohortState;
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cohort_tiers::Progress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<CohortState>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Deals
        .route("/api/v1/deals", get(list_deals).post(create_deal))
        .route("/api/v1/deals/:id", get(get_deal))
        // Groups
        .route("/api/v1/groups", post(create_group))
        .route("/api/v1/groups/:id", get(get_group))
        .route("/api/v1/groups/:id/join", post(join_group))
        .route("/api/v1/groups/:id/lock", post(lock_group))
        .route("/api/v1/groups/:id/cancel", post(cancel_group))
        .route("/api/v1/invites/:token", get(get_invite))
        // Redemptions
        .route("/api/v1/redemptions/:code", get(get_redemption))
        .route("/api/v1/redemptions/:code/redeem", post(redeem))
        // Participant feeds
        .route("/api/v1/participants/:id/notifications", get(list_notifications))
        .route("/api/v1/participants/:id/activity", get(list_activity))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An engine error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    error: String,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::TransientStore => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        if kind == ErrorKind::Internal {
            tracing::error!("request failed: {}", self.0);
        }
        let body = ErrorBody {
            kind: kind.as_str(),
            error: self.0.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

/// `Json` whose rejection is a validation error in the API's error shape.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError(Error::InvalidInput(e.body_text())))?;
        Ok(ApiJson(value))
    }
}

/// `Path` whose rejection is a validation error in the API's error shape.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError(Error::InvalidInput(e.body_text())))?;
        Ok(ApiPath(value))
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Run a synchronous engine call off the async workers.
async fn blocking<T, F>(state: &AppState, op: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| Error::Internal(format!("engine task failed: {}", e)))?;
    Ok(result?)
}

// --- Health ---

async fn health() -> &'static str {
    "OK"
}

// --- Deals ---

async fn list_deals(State(state): State<AppState>) -> ApiResult<Vec<DealView>> {
    blocking(&state, |engine| engine.list_active_deals())
        .await
        .map(Json)
}

async fn create_deal(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewDeal>,
) -> std::result::Result<(StatusCode, Json<Deal>), ApiError> {
    let deal = blocking(&state, move |engine| engine.create_deal(req)).await?;
    Ok((StatusCode::CREATED, Json(deal)))
}

async fn get_deal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<DealDetail> {
    blocking(&state, move |engine| engine.deal_detail(id))
        .await
        .map(Json)
}

// --- Groups ---

#[derive(Debug, Deserialize)]
struct CreateGroupRequest {
    deal_id: u64,
    host_id: String,
    /// Unix seconds
    expires_at: u64,
}

async fn create_group(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> std::result::Result<(StatusCode, Json<Group>), ApiError> {
    let group = blocking(&state, move |engine| {
        engine.create_group(req.deal_id, &req.host_id, req.expires_at)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn get_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<GroupStatusView> {
    blocking(&state, move |engine| engine.group_status(id))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    participant_id: String,
    pledge_units: Option<u32>,
}

async fn join_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(req): ApiJson<JoinRequest>,
) -> ApiResult<Progress> {
    blocking(&state, move |engine| {
        engine.join(id, &req.participant_id, req.pledge_units)
    })
    .await
    .map(Json)
}

async fn lock_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<LockOutcome> {
    blocking(&state, move |engine| engine.lock(id))
        .await
        .map(Json)
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    group_id: u64,
    status: GroupStatus,
}

async fn cancel_group(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<CancelResponse> {
    let status = blocking(&state, move |engine| engine.cancel_or_expire(id)).await?;
    Ok(Json(CancelResponse {
        group_id: id,
        status,
    }))
}

async fn get_invite(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
) -> ApiResult<GroupStatusView> {
    blocking(&state, move |engine| engine.group_by_invite(&token))
        .await
        .map(Json)
}

// --- Redemptions ---

async fn get_redemption(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<RedemptionView> {
    blocking(&state, move |engine| engine.redemption(&code))
        .await
        .map(Json)
}

async fn redeem(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Redemption> {
    blocking(&state, move |engine| engine.redeem(&code))
        .await
        .map(Json)
}

// --- Participant feeds ---

async fn list_notifications(
    State(state): State<AppState>,
    ApiPath(participant_id): ApiPath<String>,
) -> ApiResult<Vec<Notification>> {
    blocking(&state, move |engine| engine.notifications(&participant_id))
        .await
        .map(Json)
}

async fn list_activity(
    State(state): State<AppState>,
    ApiPath(participant_id): ApiPath<String>,
) -> ApiResult<Vec<ActivityRecord>> {
    blocking(&state, move |engine| engine.activity(&participant_id))
        .await
        .map(Json)
}
