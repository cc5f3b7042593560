// HTTP API routes: creature collection, recruitment, and battles.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::arena::{self, ArenaError};
use crate::auth::{self, AuthUser, Claims};
use crate::creature::{Creature, CreatureProfile, StatBlock};
use crate::gateway::{Analysis, BattleGateway, InferenceGateway};
use crate::metrics;
use crate::rate_limit::{RateLimitType, RateLimiter};
use crate::store::{Account, Store, StoreError};

/// Largest accepted image payload after base64 decoding.
const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Request body cap. Must leave headroom above `MAX_IMAGE_BYTES` for the
/// base64 inflation (4/3) and the JSON envelope, so oversized images reach
/// the handler's own check instead of the framework's 413.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Base64 JPEG, with or without a data-URL header.
    pub image: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitRequest {
    pub species: String,
    pub description: String,
    pub stats: StatBlock,
    pub image: String,
    pub nickname: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRequest {
    pub fighter_id: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub inference: Arc<dyn InferenceGateway>,
    pub battles: Arc<dyn BattleGateway>,
    pub rate_limiter: RateLimiter,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: StoreError) -> impl IntoResponse {
    tracing::error!("Store error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Load the account behind the claims and require the verification flag.
async fn require_verified(state: &AppState, claims: &Claims) -> Result<Account, Response> {
    match state.store.get_account(&claims.sub).await {
        Ok(Some(account)) if account.is_verified => Ok(account),
        Ok(Some(_)) => {
            Err(json_error(StatusCode::FORBIDDEN, "Account not verified").into_response())
        }
        Ok(None) => Err(json_error(StatusCode::UNAUTHORIZED, "Account not found").into_response()),
        Err(e) => Err(internal_error(e).into_response()),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/verify", post(auth::verify))
        .route("/api/auth/logout", post(auth::logout))
        // Creatures
        .route("/api/creatures", get(list_creatures).post(recruit_creature))
        .route("/api/creatures/mine", get(my_creatures))
        .route("/api/creatures/analyze", post(analyze_image))
        // Battles
        .route("/api/battles", post(start_battle))
        // Rankings
        .route("/api/rankings", get(rankings))
        // Camera JPEGs arrive base64-encoded and routinely exceed axum's
        // default 2 MB body limit.
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

// ── Creature handlers ─────────────────────────────────────────────────

async fn list_creatures(State(state): State<AppState>, _auth: AuthUser) -> impl IntoResponse {
    match state.store.list_creatures().await {
        Ok(creatures) => (StatusCode::OK, Json(json!(creatures))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn my_creatures(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match state.store.list_creatures().await {
        Ok(creatures) => {
            let mine: Vec<Creature> = creatures
                .into_iter()
                .filter(|c| c.owner_id == auth.0.sub)
                .collect();
            (StatusCode::OK, Json(json!(mine))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

async fn analyze_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if let Err(resp) = require_verified(&state, &auth.0).await {
        return resp;
    }

    if let Err(e) = state
        .rate_limiter
        .check_limit(&auth.0.sub, RateLimitType::Analysis)
    {
        return json_error(StatusCode::TOO_MANY_REQUESTS, &e.to_string()).into_response();
    }

    // Reject payloads the model service would choke on before spending a call.
    let raw = req.image.rsplit(',').next().unwrap_or(&req.image);
    match base64::engine::general_purpose::STANDARD.decode(raw) {
        Ok(bytes) if bytes.len() <= MAX_IMAGE_BYTES => {}
        Ok(_) => return json_error(StatusCode::BAD_REQUEST, "Image too large").into_response(),
        Err(_) => {
            return json_error(StatusCode::BAD_REQUEST, "Image payload is not valid base64")
                .into_response();
        }
    }

    let timer = metrics::GATEWAY_CALL_DURATION_SECONDS
        .with_label_values(&["analysis"])
        .start_timer();
    let result = state.inference.analyze_image(&req.image).await;
    timer.observe_duration();

    match result {
        Ok(Analysis::Accepted(profile)) => (
            StatusCode::OK,
            Json(json!({
                "isBug": true,
                "species": profile.species,
                "description": profile.description,
                "stats": profile.stats,
            })),
        )
            .into_response(),
        Ok(Analysis::Rejected { insult }) => {
            metrics::ANALYSIS_REJECTIONS_TOTAL.inc();
            (
                StatusCode::OK,
                Json(json!({ "isBug": false, "insult": insult })),
            )
                .into_response()
        }
        Err(e) => {
            // Retryable: nothing was persisted, the user can resubmit.
            tracing::error!("Image analysis failed: {e}");
            metrics::GATEWAY_ERRORS_TOTAL
                .with_label_values(&["analysis"])
                .inc();
            json_error(
                StatusCode::BAD_GATEWAY,
                "Failed to analyze image. The bug might be too powerful for our sensors.",
            )
            .into_response()
        }
    }
}

async fn recruit_creature(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<RecruitRequest>,
) -> impl IntoResponse {
    let account = match require_verified(&state, &auth.0).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    if req.species.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "species is required").into_response();
    }

    let creature = Creature::recruit(
        uuid::Uuid::new_v4().to_string(),
        &account.id,
        &account.username,
        CreatureProfile {
            species: req.species,
            description: req.description,
            stats: req.stats,
        },
        req.image,
        req.nickname,
    );

    match state.store.create_creature(&creature).await {
        Ok(()) => {
            metrics::RECRUITS_TOTAL.inc();
            (StatusCode::CREATED, Json(json!(creature))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

// ── Battle handler ────────────────────────────────────────────────────

async fn start_battle(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<BattleRequest>,
) -> impl IntoResponse {
    let account = match require_verified(&state, &auth.0).await {
        Ok(a) => a,
        Err(resp) => return resp,
    };

    if let Err(e) = state
        .rate_limiter
        .check_limit(&auth.0.sub, RateLimitType::Battles)
    {
        return json_error(StatusCode::TOO_MANY_REQUESTS, &e.to_string()).into_response();
    }

    let fighter = match state.store.get_creature(&req.fighter_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "Fighter not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    };

    if fighter.owner_id != account.id {
        return json_error(StatusCode::FORBIDDEN, "You do not own this bug").into_response();
    }

    let timer = metrics::GATEWAY_CALL_DURATION_SECONDS
        .with_label_values(&["battle"])
        .start_timer();
    let result = arena::run_battle(state.store.as_ref(), state.battles.as_ref(), &fighter).await;
    timer.observe_duration();

    match result {
        Ok(report) => (StatusCode::OK, Json(json!(report))).into_response(),
        Err(ArenaError::NoEligibleOpponents) => {
            json_error(StatusCode::CONFLICT, &ArenaError::NoEligibleOpponents.to_string())
                .into_response()
        }
        Err(ArenaError::Store(e)) => internal_error(e).into_response(),
    }
}

// ── Rankings ──────────────────────────────────────────────────────────

async fn rankings(State(state): State<AppState>, _auth: AuthUser) -> impl IntoResponse {
    match state.store.list_creatures().await {
        Ok(mut creatures) => {
            creatures.sort_by(|a, b| b.wins.cmp(&a.wins));
            (StatusCode::OK, Json(json!(creatures))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}
