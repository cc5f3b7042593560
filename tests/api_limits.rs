// Request-level tests for the analyze endpoint's image size handling:
// bodies larger than axum's 2 MB default must still reach the handler,
// and the handler's own cap must answer in the JSON error shape.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use bug_arena_backend::api::{router, AppState};
use bug_arena_backend::auth::{create_token, hash_password};
use bug_arena_backend::creature::{Creature, CreatureProfile, StatBlock};
use bug_arena_backend::gateway::{
    Analysis, BattleGateway, BattleOutcome, GatewayError, InferenceGateway,
};
use bug_arena_backend::rate_limit::RateLimiter;
use bug_arena_backend::store::memory::MemoryStore;
use bug_arena_backend::store::{Account, AccountStore};

/// Accepts every image with a canned profile.
struct AcceptingInference;

#[async_trait]
impl InferenceGateway for AcceptingInference {
    async fn analyze_image(&self, _image_base64: &str) -> Result<Analysis, GatewayError> {
        Ok(Analysis::Accepted(CreatureProfile {
            species: "Carabus auratus".into(),
            description: "Fast on its feet.".into(),
            stats: StatBlock {
                strength: 40,
                attack: 40,
                size: 30,
                willingness_to_live: 60,
                stamina: 50,
                agility: 80,
                quantity: 1,
            },
        }))
    }
}

struct UnusedBattle;

#[async_trait]
impl BattleGateway for UnusedBattle {
    async fn simulate_battle(
        &self,
        _fighter: &Creature,
        _opponent: &Creature,
    ) -> Result<BattleOutcome, GatewayError> {
        Err(GatewayError::Transport("not under test".into()))
    }
}

/// A state with one verified account; returns the app and a bearer token.
async fn app_with_verified_user() -> (axum::Router, String) {
    let store = MemoryStore::new();
    store
        .register(Account {
            id: "u1".into(),
            email: "photographer@arena.io".into(),
            username: "photographer".into(),
            is_verified: true,
            password_hash: hash_password("password123").unwrap(),
        })
        .await
        .unwrap();

    let token = create_token("u1", "photographer").unwrap();
    let state = AppState {
        store: Arc::new(store),
        inference: Arc::new(AcceptingInference),
        battles: Arc::new(UnusedBattle),
        rate_limiter: RateLimiter::new(),
    };
    (router(state), token)
}

fn analyze_request(token: &str, image: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/creatures/analyze")
        .header("Authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(format!("{{\"image\":\"{image}\"}}")))
        .unwrap()
}

#[tokio::test]
async fn test_camera_sized_photo_reaches_the_handler() {
    let (app, token) = app_with_verified_user().await;

    // 4 MB of base64 (3 MB decoded): over axum's 2 MB default body limit,
    // under the handler's image cap.
    let image = "A".repeat(4 * 1024 * 1024);
    let response = app.oneshot(analyze_request(&token, &image)).await.unwrap();

    assert_ne!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["isBug"], true);
    assert_eq!(json["species"], "Carabus auratus");
}

#[tokio::test]
async fn test_oversized_image_gets_the_handler_error_shape() {
    let (app, token) = app_with_verified_user().await;

    // 12 MB of base64 decodes to 9 MB, over the 8 MiB image cap but still
    // within the body limit, so the handler answers rather than the framework.
    let image = "A".repeat(12 * 1024 * 1024);
    let response = app.oneshot(analyze_request(&token, &image)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Image too large");
}

#[tokio::test]
async fn test_invalid_base64_rejected_before_the_model() {
    let (app, token) = app_with_verified_user().await;

    let response = app
        .oneshot(analyze_request(&token, "not!!valid@@base64"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Image payload is not valid base64");
}
