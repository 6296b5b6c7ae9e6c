use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use studyboard_core::account::{AccountDeletion, DeletionError};
use studyboard_core::auth::{Session, SessionCache};
use studyboard_core::config::Settings;
use studyboard_core::dashboard::feedback::DEFAULT_RECENT_FEEDBACK;
use studyboard_core::dashboard::{CollectionKind, Dashboard, DayDetails, ReviewWithUser};
use studyboard_core::domain::financial::{DayBucket, FinancialSummary, SeriesOrder};
use studyboard_core::financial::{AggregateError, FinancialAggregator, TimeWindow};
use studyboard_core::store::SortDirection;
use studyboard_core::time::calendar;

#[derive(Clone)]
pub struct AppState {
    pub backend: Option<Backend>,
    pub settings: Arc<Settings>,
}

#[derive(Clone)]
pub struct Backend {
    pub aggregator: FinancialAggregator,
    pub dashboard: Dashboard,
    pub sessions: Arc<SessionCache>,
    pub account: AccountDeletion,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "document store not configured")
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not signed in")
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Upstream failures are reported to sentry and surfaced with their message.
    fn upstream(err: anyhow::Error) -> Self {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "upstream request failed");
        Self::new(StatusCode::BAD_GATEWAY, format!("{err:#}"))
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::InvalidWindow { .. } => Self::bad_request(err.to_string()),
            AggregateError::Upstream(_) => {
                let message = err.to_string();
                Self::upstream(anyhow::Error::new(err)).with_message(message)
            }
        }
    }
}

impl From<DeletionError> for ApiError {
    fn from(err: DeletionError) -> Self {
        match err {
            DeletionError::MissingUserId => Self::bad_request(err.to_string()),
            DeletionError::NotConfigured | DeletionError::Failed(_) => {
                sentry_anyhow::capture_anyhow(&anyhow::Error::new(err));
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process account deletion request",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn healthz() -> &'static str {
    "ok"
}

fn backend(state: &AppState) -> Result<&Backend, ApiError> {
    state.backend.as_ref().ok_or_else(ApiError::unavailable)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn require_session(backend: &Backend, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = bearer_token(headers).ok_or_else(ApiError::unauthorized)?;
    backend
        .sessions
        .current_session(token)
        .await
        .map_err(ApiError::upstream)?
        .ok_or_else(ApiError::unauthorized)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let session = require_session(backend(state)?, headers).await?;
    if !state.settings.is_admin_email(&session.email) {
        tracing::warn!(user_id = %session.user_id, "non-admin session rejected");
        return Err(ApiError::new(StatusCode::FORBIDDEN, "admin access required"));
    }
    Ok(session)
}

pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Session> {
    let session = require_session(backend(&state)?, &headers).await?;
    Ok(Json(session))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let backend = backend(&state)?;
    let token = bearer_token(&headers).ok_or_else(ApiError::unauthorized)?;
    backend
        .sessions
        .end_session(token)
        .await
        .map_err(ApiError::upstream)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DeletionRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    message: &'static str,
}

/// Public: users request deletion of their own account by id. The deletion
/// function confirms with the account owner before removing anything.
pub async fn request_account_deletion(
    State(state): State<AppState>,
    Json(req): Json<DeletionRequest>,
) -> ApiResult<MessageBody> {
    let backend = backend(&state)?;
    backend.account.request(req.user_id.as_deref()).await?;
    Ok(Json(MessageBody {
        message: "Account deletion request processed successfully",
    }))
}

#[derive(Debug, Deserialize)]
pub struct FinancialsParams {
    window: Option<i64>,
    order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FinancialsResponse {
    window: TimeWindow,
    order: SeriesOrder,
    summary: FinancialSummary,
    buckets: Vec<DayBucket>,
}

pub async fn get_financials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FinancialsParams>,
) -> ApiResult<FinancialsResponse> {
    require_admin(&state, &headers).await?;
    let backend = backend(&state)?;

    let window = match params.window {
        Some(days) => TimeWindow::new(days)?,
        None => TimeWindow::default(),
    };
    let order = parse_order(params.order.as_deref())?;

    let buckets = backend
        .aggregator
        .aggregate_at(window, chrono::Utc::now(), order)
        .await?;

    Ok(Json(FinancialsResponse {
        window,
        order,
        summary: FinancialSummary::from_buckets(&buckets),
        buckets,
    }))
}

fn parse_order(raw: Option<&str>) -> Result<SeriesOrder, ApiError> {
    match raw {
        Some(s) => s
            .parse::<SeriesOrder>()
            .map_err(|e| ApiError::bad_request(e.to_string())),
        None => Ok(SeriesOrder::default()),
    }
}

pub async fn get_day_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(date): Path<String>,
) -> ApiResult<DayDetails> {
    require_admin(&state, &headers).await?;
    let backend = backend(&state)?;

    let day = calendar::parse_day(&date).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let details = backend
        .dashboard
        .day_details(day)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(details))
}

#[derive(Debug, Deserialize)]
pub struct RecentFeedbackParams {
    limit: Option<u32>,
}

pub async fn get_recent_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RecentFeedbackParams>,
) -> ApiResult<Vec<ReviewWithUser>> {
    require_admin(&state, &headers).await?;
    let backend = backend(&state)?;

    let reviews = backend
        .dashboard
        .recent_feedback(params.limit.unwrap_or(DEFAULT_RECENT_FEEDBACK))
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
pub struct CollectionParams {
    limit: Option<u32>,
    order: Option<String>,
}

pub async fn get_collection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(params): Query<CollectionParams>,
) -> ApiResult<Vec<serde_json::Value>> {
    require_admin(&state, &headers).await?;
    let backend = backend(&state)?;

    let kind = name
        .parse::<CollectionKind>()
        .map_err(|e| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))?;
    // Tables default to newest first.
    let direction = match params.order.as_deref() {
        None => SortDirection::Desc,
        Some(raw) => match parse_order(Some(raw))? {
            SeriesOrder::Ascending => SortDirection::Asc,
            SeriesOrder::Descending => SortDirection::Desc,
        },
    };

    let docs = backend
        .dashboard
        .list_collection(kind, params.limit, direction)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(docs))
}
