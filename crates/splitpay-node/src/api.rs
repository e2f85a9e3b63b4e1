//! HTTP API server for the Splitpay node.
//!
//! Provides REST endpoints for payment link issuance and lookup, the gateway
//! webhook, the manual payout trigger, and payout profiles. Authentication is
//! handled upstream; the caller's recipient id arrives in [`RECIPIENT_HEADER`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use splitpay_core::{
    Cents, CoreError, PaymentRequest, PaymentRequestId, PayoutStatus, RecipientId,
    RecipientPayoutProfile,
};
use splitpay_crypto::SIGNATURE_HEADER;
use splitpay_settlement::{
    IssueRequest, LegOutcome, PayoutAttempt, SettlementError, SettlementOutcome, StatusChange,
    WebhookOutcome,
};

use crate::state::AppState;

/// Header carrying the authenticated recipient id.
pub const RECIPIENT_HEADER: &str = "x-recipient-id";

// --- Request / response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_secs: u64,
    pub gateway: String,
    pub payout_provider: String,
}

#[derive(Deserialize)]
pub struct CreatePaymentRequestBody {
    pub amount_cents: Cents,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

#[derive(Deserialize)]
pub struct TriggerPayoutBody {
    pub payment_request_id: String,
}

#[derive(Serialize)]
pub struct PayoutResponse {
    pub payment_request_id: PaymentRequestId,
    pub payout_status: PayoutStatus,
    pub platform_fee_cents: Option<Cents>,
    pub payout_amount_cents: Option<Cents>,
    pub payout_provider_ref: Option<String>,
    pub platform_payout_ref: Option<String>,
    pub payout_error: Option<String>,
    pub legs: Vec<LegOutcome>,
}

impl From<SettlementOutcome> for PayoutResponse {
    fn from(outcome: SettlementOutcome) -> Self {
        let req = outcome.payment_request;
        Self {
            payment_request_id: req.id,
            payout_status: req.payout_status,
            platform_fee_cents: req.platform_fee_cents,
            payout_amount_cents: req.payout_amount_cents,
            payout_provider_ref: req.payout_provider_ref,
            platform_payout_ref: req.platform_payout_ref,
            payout_error: req.payout_error,
            legs: outcome.legs,
        }
    }
}

#[derive(Deserialize)]
pub struct PayoutProfileBody {
    pub payout_destination: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn settlement_error(e: SettlementError) -> ApiError {
    let status = match &e {
        SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::Core(
            CoreError::InvalidPaymentTransition { .. } | CoreError::InvalidPayoutTransition { .. },
        ) => StatusCode::CONFLICT,
        SettlementError::Core(_)
        | SettlementError::Validation(_)
        | SettlementError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        SettlementError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        SettlementError::Forbidden { .. } => StatusCode::FORBIDDEN,
        SettlementError::MissingPayoutDestination(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SettlementError::Conflict(_) => StatusCode::CONFLICT,
        SettlementError::Gateway(_) => StatusCode::BAD_GATEWAY,
        SettlementError::Storage(_) | SettlementError::Internal(_) => {
            tracing::error!(error = %e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn recipient_from(headers: &HeaderMap) -> Result<RecipientId, ApiError> {
    headers
        .get(RECIPIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(RecipientId::new)
        .ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                format!("missing {RECIPIENT_HEADER} header"),
            )
        })
}

/// The acting recipient, who must be the one named in the path.
fn profile_owner(headers: &HeaderMap, path_recipient: String) -> Result<RecipientId, ApiError> {
    let caller = recipient_from(headers)?;
    let target = RecipientId::new(path_recipient);
    if caller != target {
        tracing::warn!(
            target: "splitpay::security",
            caller = %caller,
            recipient = %target,
            "Payout profile access by non-owner"
        );
        return Err(api_error(
            StatusCode::FORBIDDEN,
            format!("{caller} may not access the payout profile of {target}"),
        ));
    }
    Ok(target)
}

fn parse_id(raw: &str) -> Result<PaymentRequestId, ApiError> {
    raw.parse()
        .map_err(|e: CoreError| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

// --- Handlers ---

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        gateway: state.gateway_id.clone(),
        payout_provider: state.provider_id.clone(),
    })
}

async fn handle_create_payment_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentRequestBody>,
) -> Result<(StatusCode, Json<PaymentRequest>), ApiError> {
    let recipient_id = recipient_from(&headers)?;
    let request = state
        .issuer
        .issue(IssueRequest {
            recipient_id,
            amount_cents: body.amount_cents,
            description: body.description,
        })
        .await
        .map_err(settlement_error)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn handle_get_payment_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentRequest>, ApiError> {
    let id = parse_id(&id)?;
    match state.store.get(id).await.map_err(settlement_error)? {
        Some(request) => Ok(Json(request)),
        None => Err(settlement_error(SettlementError::NotFound(id))),
    }
}

async fn handle_cancel_payment_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PaymentRequest>, ApiError> {
    let id = parse_id(&id)?;
    let recipient_id = recipient_from(&headers)?;
    match state
        .issuer
        .cancel(id, &recipient_id)
        .await
        .map_err(settlement_error)?
    {
        StatusChange::Applied(request) => Ok(Json(request)),
        StatusChange::Unchanged(request) => Err(api_error(
            StatusCode::CONFLICT,
            format!("payment request is {}, only pending requests can be cancelled", request.status),
        )),
    }
}

async fn handle_gateway_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let outcome = state
        .ingestor
        .ingest(&body, signature)
        .await
        .map_err(settlement_error)?;
    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}

async fn handle_trigger_payout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TriggerPayoutBody>,
) -> Result<Json<PayoutResponse>, ApiError> {
    let id = parse_id(&body.payment_request_id)?;
    match state
        .settlement
        .trigger_payout(id)
        .await
        .map_err(settlement_error)?
    {
        PayoutAttempt::Finished(outcome) => Ok(Json(outcome.into())),
        PayoutAttempt::AlreadyInProgress => Err(api_error(
            StatusCode::CONFLICT,
            "payout already in progress",
        )),
        PayoutAttempt::NotEligible(reason) => Err(api_error(
            StatusCode::CONFLICT,
            format!("payout not eligible: {reason}"),
        )),
    }
}

async fn handle_get_payout_profile(
    State(state): State<Arc<AppState>>,
    Path(recipient): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RecipientPayoutProfile>, ApiError> {
    let recipient_id = profile_owner(&headers, recipient)?;
    state
        .store
        .get_profile(&recipient_id)
        .await
        .map_err(settlement_error)?
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("no payout profile for {recipient_id}"),
            )
        })
}

async fn handle_put_payout_profile(
    State(state): State<Arc<AppState>>,
    Path(recipient): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PayoutProfileBody>,
) -> Result<Json<RecipientPayoutProfile>, ApiError> {
    let recipient_id = profile_owner(&headers, recipient)?;
    let existing = state
        .store
        .get_profile(&recipient_id)
        .await
        .map_err(settlement_error)?
        .unwrap_or_else(|| RecipientPayoutProfile::new(recipient_id.clone()));

    let mut profile = existing
        .with_destination(&body.payout_destination)
        .map_err(|e| settlement_error(e.into()))?;
    if let Some(name) = body.display_name.filter(|n| !n.trim().is_empty()) {
        profile.display_name = Some(name.trim().to_string());
    }

    state
        .store
        .put_profile(profile.clone())
        .await
        .map_err(settlement_error)?;
    tracing::info!(recipient = %recipient_id, "Payout destination saved");
    Ok(Json(profile))
}

// --- Server ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/v1/payment-requests",
            post(handle_create_payment_request),
        )
        .route(
            "/api/v1/payment-requests/{id}",
            get(handle_get_payment_request),
        )
        .route(
            "/api/v1/payment-requests/{id}/cancel",
            post(handle_cancel_payment_request),
        )
        .route("/api/v1/webhooks/gateway", post(handle_gateway_webhook))
        .route("/api/v1/payouts/trigger", post(handle_trigger_payout))
        .route(
            "/api/v1/recipients/{id}/payout-profile",
            get(handle_get_payout_profile).put(handle_put_payout_profile),
        )
        .with_state(state)
}

pub async fn start_api_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listen_addr = listener.local_addr()?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
        })
        .await?;
    tracing::info!("HTTP API server stopped");
    Ok(())
}
