//! Quotation HTTP surface.
//!
//! `POST /quotation` stores a `processing` record and returns immediately;
//! the pipeline runs on a background task and overwrites the record when it
//! finishes. Clients poll `GET /quotation/{id}`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use renoquote_agent::runtime::{ConfiguredExtractor, ConfiguredSafety};
use renoquote_core::domain::catalog::AliasEntry;
use renoquote_core::errors::{ApplicationError, InterfaceError};
use renoquote_core::{
    AliasResolver, CatalogEntryId, PipelineState, QuotationId, QuotationPipeline, QuotationRecord,
    SessionId, Tenant,
};
use renoquote_db::{QuotationRepository, SqlCatalogRepository, TenantRepository};

pub const DEFAULT_TENANT: &str = "Homeez";
const API_CLIENT_NAME: &str = "API User";

pub type ServerPipeline =
    QuotationPipeline<ConfiguredSafety, ConfiguredExtractor, Arc<SqlCatalogRepository>>;
pub type ServerResolver = AliasResolver<Arc<SqlCatalogRepository>>;

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<ServerPipeline>,
    pub resolver: Arc<ServerResolver>,
    pub tenants: Arc<dyn TenantRepository>,
    pub quotations: Arc<dyn QuotationRepository>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub transcript: String,
    #[serde(default = "default_tenant")]
    pub tenant_name: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuotationResponse {
    pub quotation_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub suspense_text: String,
    pub target_item_id: String,
    #[serde(default = "default_tenant")]
    pub tenant_name: String,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub status: &'static str,
    pub alias: AliasEntry,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    correlation_id: String,
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

/// Wraps `InterfaceError` so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. }
            | InterfaceError::NotFound { message, .. } => message.clone(),
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                String::new()
            }
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

fn application_error(error: impl Into<ApplicationError>, correlation_id: &str) -> ApiError {
    let error = error.into();
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );
    ApiError(error.into_interface(correlation_id))
}

async fn find_tenant(state: &ApiState, name: &str, correlation_id: &str) -> Result<Tenant, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "tenant_name must not be empty".to_string(),
            correlation_id: correlation_id.to_string(),
        }));
    }

    state
        .tenants
        .find_by_name(name)
        .await
        .map_err(|error| application_error(error, correlation_id))?
        .ok_or_else(|| {
            ApiError(InterfaceError::NotFound {
                message: format!("tenant `{name}` not found"),
                correlation_id: correlation_id.to_string(),
            })
        })
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/quotation", post(create_quotation))
        .route("/quotation/{id}", get(get_quotation))
        .route("/resolve", post(resolve_suspense))
        .with_state(state)
}

pub async fn create_quotation(
    State(state): State<ApiState>,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<Json<CreateQuotationResponse>, ApiError> {
    let correlation_id = correlation_id();
    let tenant = find_tenant(&state, &request.tenant_name, &correlation_id).await?;

    let record = QuotationRecord::processing(
        QuotationId(Uuid::new_v4().to_string()),
        tenant.id,
        SessionId(Uuid::new_v4().to_string()),
        API_CLIENT_NAME,
        request.transcript,
    );
    state
        .quotations
        .save(&record)
        .await
        .map_err(|error| application_error(error, &correlation_id))?;

    info!(
        event_name = "api.quotation.accepted",
        correlation_id = %correlation_id,
        quotation_id = %record.id.0,
        tenant_id = %record.tenant_id,
        "quotation accepted for processing"
    );

    let response = CreateQuotationResponse {
        quotation_id: record.id.0.clone(),
        status: record.status.as_str().to_string(),
    };
    tokio::spawn(process_quotation(state, record));
    Ok(Json(response))
}

/// Runs the pipeline for a stored `processing` record and saves the outcome.
pub async fn process_quotation(state: ApiState, mut record: QuotationRecord) {
    let initial = PipelineState::new(
        record.tenant_id.clone(),
        record.session_id.clone(),
        record.transcript.clone(),
    );
    let outcome = state.pipeline.run(initial).await;

    if let Err(error) = record.record_outcome(&outcome) {
        error!(
            event_name = "api.quotation.transition_failed",
            quotation_id = %record.id.0,
            error = %error,
            "could not record pipeline outcome"
        );
        return;
    }
    if let Err(error) = state.quotations.save(&record).await {
        error!(
            event_name = "api.quotation.save_failed",
            quotation_id = %record.id.0,
            error = %error,
            "could not persist pipeline outcome"
        );
        return;
    }

    info!(
        event_name = "api.quotation.processed",
        quotation_id = %record.id.0,
        status = record.status.as_str(),
        items = record.items.len(),
        suspense_items = record.suspense_items.len(),
        "quotation processed"
    );
}

pub async fn get_quotation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<QuotationRecord>, ApiError> {
    let correlation_id = correlation_id();
    state
        .quotations
        .find_by_id(&QuotationId(id.clone()))
        .await
        .map_err(|error| application_error(error, &correlation_id))?
        .map(Json)
        .ok_or_else(|| {
            ApiError(InterfaceError::NotFound {
                message: format!("quotation `{id}` not found"),
                correlation_id,
            })
        })
}

pub async fn resolve_suspense(
    State(state): State<ApiState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let correlation_id = correlation_id();
    let tenant = find_tenant(&state, &request.tenant_name, &correlation_id).await?;

    let alias = state
        .resolver
        .resolve(&tenant.id, &request.suspense_text, &CatalogEntryId(request.target_item_id))
        .await
        .map_err(|error| application_error(error, &correlation_id))?;

    Ok(Json(ResolveResponse { status: "resolved", alias }))
}
