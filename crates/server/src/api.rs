//! Admin and public JSON API for quotations.
//!
//! - `GET    /api/quotations`                  list with status / email filters and paging
//! - `POST   /api/quotations`                  create a draft with items
//! - `GET    /api/quotations/stats/summary`    totals per status
//! - `GET    /api/quotations/{id}`             quotation with items and activity log
//! - `PUT    /api/quotations/{id}`             update fields, optionally replace items
//! - `DELETE /api/quotations/{id}`             hard delete
//! - `PUT    /api/quotations/{id}/status`      status change with audit entry
//! - `POST   /api/quotations/{id}/clone`       new version from this quotation
//! - `PUT    /api/quotations/{id}/share`       enable or disable the public link
//! - `GET    /api/quotations/share/{token}`    public read by share token
//! - `GET    /api/price-estimator/item-price`  catalog price for one item and duration
//! - `GET    /api/price-estimator/all-items`   every priceable catalog entry, grouped by source

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use estimator_core::aggregator::{NewQuotationRequest, QuotationPatch};
use estimator_core::domain::read_model::{QuotationListParams, ShareState};
use estimator_core::errors::{ApplicationError, DomainError, InterfaceError};
use estimator_core::lifecycle::{StatusChangeInput, StatusChangeRequest};
use estimator_core::resolver::{ItemPriceQuery, ResolvedPrice};
use estimator_core::{
    CatalogListing, CatalogPriceResolver, QuotationDetail, QuotationId, QuotationPage, QuotationQuery,
    QuotationService, QuotationStats, QuotationWithItems, SharedQuotation, StatusChangeOutcome,
};
use estimator_db::DbPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{deadline, health};

#[derive(Clone)]
pub struct AppState {
    service: Arc<QuotationService>,
    resolver: CatalogPriceResolver,
    db_pool: DbPool,
}

impl AppState {
    pub fn new(service: Arc<QuotationService>, resolver: CatalogPriceResolver, db_pool: DbPool) -> Self {
        Self { service, resolver, db_pool }
    }

    pub fn service(&self) -> &QuotationService {
        &self.service
    }
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let health = health::router(state.db_pool.clone());

    Router::new()
        .route("/api/quotations", get(list_quotations).post(create_quotation))
        .route("/api/quotations/stats/summary", get(quotation_stats))
        .route("/api/quotations/share/{token}", get(shared_quotation))
        .route(
            "/api/quotations/{id}",
            get(get_quotation).put(update_quotation).delete(delete_quotation),
        )
        .route("/api/quotations/{id}/status", put(set_status))
        .route("/api/quotations/{id}/clone", post(clone_quotation))
        .route("/api/quotations/{id}/share", put(toggle_share))
        .route("/api/price-estimator/item-price", get(item_price))
        .route("/api/price-estimator/all-items", get(all_items))
        .with_state(state)
        .merge(health)
        .layer(middleware::from_fn_with_state(request_timeout, deadline::enforce_deadline))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CloneBody {
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShareToggle {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
    pub quote_id: QuotationId,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

/// Caller-facing failure. Server faults expose only the generic message and
/// the correlation id; the cause stays in the logs.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Gone { .. } => StatusCode::GONE,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self(InterfaceError::ServiceUnavailable {
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        })
    }

    fn bad_body(rejection: JsonRejection) -> Self {
        ApplicationError::validation(format!("malformed request body: {}", rejection.body_text())).into()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } | InterfaceError::NotFound { message, .. } => {
                Some(message.clone())
            }
            _ => None,
        };

        if status.is_server_error() {
            error!(
                event_name = "http.request_failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            debug!(
                event_name = "http.request_rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_id(raw: &str) -> Result<QuotationId, ApiError> {
    Ok(raw.parse::<QuotationId>()?)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_quotations(
    State(state): State<AppState>,
    Query(params): Query<QuotationListParams>,
) -> Result<Json<QuotationPage>, ApiError> {
    let query = QuotationQuery::try_from(params)?;
    Ok(Json(state.service.list(query).await?))
}

async fn create_quotation(
    State(state): State<AppState>,
    payload: Result<Json<NewQuotationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuotationWithItems>), ApiError> {
    let Json(request) = payload.map_err(ApiError::bad_body)?;
    let created = state.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn quotation_stats(State(state): State<AppState>) -> Result<Json<QuotationStats>, ApiError> {
    Ok(Json(state.service.stats().await?))
}

async fn get_quotation(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QuotationDetail>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.get(id).await?))
}

async fn update_quotation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<QuotationPatch>, JsonRejection>,
) -> Result<Json<QuotationWithItems>, ApiError> {
    let id = parse_id(&id)?;
    let Json(patch) = payload.map_err(ApiError::bad_body)?;
    Ok(Json(state.service.update(id, patch).await?))
}

async fn delete_quotation(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.service.delete(id).await?;
    Ok(Json(DeletedResponse { message: "Quotation deleted successfully".to_string(), quote_id: id }))
}

async fn set_status(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<StatusChangeInput>, JsonRejection>,
) -> Result<Json<StatusChangeOutcome>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload.map_err(ApiError::bad_body)?;
    let request = StatusChangeRequest::try_from(input)?;
    Ok(Json(state.service.set_status(id, request).await?))
}

async fn clone_quotation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<QuotationWithItems>), ApiError> {
    let id = parse_id(&id)?;
    // The body is optional for clones.
    let body: CloneBody = if body.iter().all(u8::is_ascii_whitespace) {
        CloneBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|error| {
            ApiError::from(ApplicationError::validation(format!("malformed request body: {error}")))
        })?
    };

    let cloned = state.service.clone_quotation(id, body.created_by).await?;
    Ok((StatusCode::CREATED, Json(cloned)))
}

async fn toggle_share(
    Path(id): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<ShareToggle>, JsonRejection>,
) -> Result<Json<ShareState>, ApiError> {
    let id = parse_id(&id)?;
    let Json(toggle) = payload.map_err(ApiError::bad_body)?;
    Ok(Json(state.service.toggle_share(id, toggle.enabled).await?))
}

async fn shared_quotation(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SharedQuotation>, ApiError> {
    Ok(Json(state.service.get_by_token(&token).await?))
}

async fn item_price(
    State(state): State<AppState>,
    Query(query): Query<ItemPriceQuery>,
) -> Result<Json<ResolvedPrice>, ApiError> {
    Ok(Json(state.resolver.resolve_query(query).await?))
}

async fn all_items(State(state): State<AppState>) -> Result<Json<CatalogListing>, ApiError> {
    Ok(Json(state.resolver.list_all().await?))
}
