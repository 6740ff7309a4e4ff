//! Request handlers for the rating API

use crate::auth::IdentityProvider;
use crate::error::RatingError;
use crate::rating::RatingAggregator;
use crate::types::{ItemType, RatingStats, UserId};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header carrying the caller's identity, set by the upstream auth proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for the rating API
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<RatingAggregator>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Body of a rating submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRatingRequest {
    pub rating: i64,
    #[serde(default)]
    pub item_type: ItemType,
}

/// The caller's own rating of an item (0 when anonymous or unrated)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRatingResponse {
    pub rating: u8,
}

/// Error payload returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/items/{item_id}/rating", get(get_item_rating).put(submit_rating))
        .route("/items/{item_id}/rating/me", get(get_my_rating))
        .with_state(state)
}

/// Resolve the caller's identity: the request header wins, the injected
/// provider supplies the ambient identity otherwise
fn resolve_identity(headers: &HeaderMap, state: &ApiState) -> Option<UserId> {
    match headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
        Some(id) if !id.is_empty() => Some(id.to_string()),
        _ => state.identity.current_user_id(),
    }
}

/// Map a submission failure to an HTTP status
fn error_status(error: &anyhow::Error) -> StatusCode {
    match RatingError::from_anyhow(error) {
        Some(RatingError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        Some(RatingError::InvalidRating { .. }) => StatusCode::BAD_REQUEST,
        Some(RatingError::StoreUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Root endpoint handler - shows service information
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "tasting-room",
        "version": crate::VERSION,
        "endpoints": [
            "/items/{item_id}/rating",
            "/items/{item_id}/rating/me"
        ]
    }))
}

/// Published rating statistics for an item. Never fails: unknown items and
/// store outages degrade to the zero value or the last mirrored copy.
async fn get_item_rating(
    State(state): State<ApiState>,
    Path(item_id): Path<String>,
) -> Json<RatingStats> {
    debug!("Stats requested for item '{}'", item_id);
    Json(state.aggregator.load_rating_stats(&item_id).await)
}

/// The caller's own rating of an item
async fn get_my_rating(
    State(state): State<ApiState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
) -> Json<UserRatingResponse> {
    let user_id = resolve_identity(&headers, &state);
    let rating = state
        .aggregator
        .load_user_rating(user_id.as_deref(), &item_id)
        .await;

    Json(UserRatingResponse { rating })
}

/// Submit the caller's rating of an item; responds with the refreshed stats
async fn submit_rating(
    State(state): State<ApiState>,
    Path(item_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SubmitRatingRequest>,
) -> Result<Json<RatingStats>, (StatusCode, Json<ErrorResponse>)> {
    let user_id = resolve_identity(&headers, &state);

    match state
        .aggregator
        .submit_rating(user_id.as_deref(), &item_id, request.rating, request.item_type)
        .await
    {
        Ok(()) => Ok(Json(state.aggregator.get_rating_stats(&item_id))),
        Err(e) => {
            warn!("Rating submission for item '{}' failed: {}", item_id, e);
            Err((
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticIdentityProvider;
    use crate::rating::AggregatorConfig;
    use crate::store::InMemoryDocumentStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt; // for oneshot

    fn create_test_router() -> Router {
        let aggregator = Arc::new(RatingAggregator::new(
            Arc::new(InMemoryDocumentStore::new()),
            AggregatorConfig::default(),
        ));
        router(ApiState {
            aggregator,
            identity: Arc::new(StaticIdentityProvider::anonymous()),
        })
    }

    fn put_rating(item_id: &str, user: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("PUT")
            .uri(format!("/items/{}/rating", item_id))
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn response_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_read_back() {
        let app = create_test_router();

        let response = app
            .clone()
            .oneshot(put_rating("item1", Some("u1"), r#"{"rating": 4}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stats = response_json(response).await;
        assert_eq!(stats["average_rating"], 4.0);
        assert_eq!(stats["total_ratings"], 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/item1/rating")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = response_json(response).await;
        assert_eq!(stats["total_ratings"], 1);
    }

    #[tokio::test]
    async fn test_anonymous_submission_is_unauthorized() {
        let app = create_test_router();

        let response = app
            .oneshot(put_rating("item1", None, r#"{"rating": 4}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("signed in"));
    }

    #[tokio::test]
    async fn test_out_of_range_rating_is_bad_request() {
        let app = create_test_router();

        for body in [r#"{"rating": 0}"#, r#"{"rating": 6}"#] {
            let response = app
                .clone()
                .oneshot(put_rating("item1", Some("u1"), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_my_rating_round_trip() {
        let app = create_test_router();

        app.clone()
            .oneshot(put_rating("item1", Some("u1"), r#"{"rating": 5}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/items/item1/rating/me")
                    .header(USER_ID_HEADER, "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["rating"], 5);

        // A different caller has no rating
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/item1/rating/me")
                    .header(USER_ID_HEADER, "u2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["rating"], 0);
    }

    #[tokio::test]
    async fn test_unknown_item_stats_are_zero() {
        let app = create_test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/unseen/rating")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stats = response_json(response).await;
        assert_eq!(stats["average_rating"], 0.0);
        assert_eq!(stats["total_ratings"], 0);
    }

    #[tokio::test]
    async fn test_ambient_identity_from_provider() {
        let aggregator = Arc::new(RatingAggregator::new(
            Arc::new(InMemoryDocumentStore::new()),
            AggregatorConfig::default(),
        ));
        let app = router(ApiState {
            aggregator,
            identity: Arc::new(StaticIdentityProvider::signed_in("dev-user")),
        });

        // No header: the injected provider's identity is used
        let response = app
            .clone()
            .oneshot(put_rating("item1", None, r#"{"rating": 3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/items/item1/rating/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response_json(response).await;
        assert_eq!(body["rating"], 3);
    }

    #[tokio::test]
    async fn test_meal_plan_item_type_accepted() {
        let app = create_test_router();

        let response = app
            .oneshot(put_rating(
                "plan1",
                Some("u1"),
                r#"{"rating": 5, "item_type": "meal_plan"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
