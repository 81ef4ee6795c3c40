mod chat;
mod health;
mod metrics;
mod quota;
mod sessions;

pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use quota::quota_handler;
pub use sessions::{history_handler, reset_handler};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/quota", get(quota_handler))
        .route("/api/sessions/{id}", get(history_handler))
        .route("/api/sessions/{id}/reset", post(reset_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use httpmock::{Method::POST, MockServer};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::rate_limit::{QuotaPolicy, RateLimiter};
    use crate::session::SessionStore;
    use crate::upstream::ChatClient;

    // nothing listens here; tests that use it never reach upstream
    const NO_UPSTREAM: &str = "http://127.0.0.1:9";

    fn test_state(anonymous: u32, authenticated: u32, api_url: &str) -> Arc<AppState> {
        test_state_with_timeout(anonymous, authenticated, api_url, Duration::from_secs(5))
    }

    fn test_state_with_timeout(
        anonymous: u32,
        authenticated: u32,
        api_url: &str,
        timeout: Duration,
    ) -> Arc<AppState> {
        let policy = QuotaPolicy::uniform(anonymous, authenticated, Duration::from_secs(3600)).unwrap();
        Arc::new(AppState {
            limiter: RateLimiter::new(policy),
            sessions: SessionStore::new(),
            upstream: ChatClient::new(api_url, "test-client", timeout).unwrap(),
            identity_header: "x-authenticated-user".to_string(),
            session_idle: Duration::from_secs(3600),
        })
    }

    fn chat_request(user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .header(header::USER_AGENT, "test-agent");
        if let Some(user) = user {
            builder = builder.header("x-authenticated-user", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-authenticated-user", user);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_denies_after_limit_with_retry_after() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .header("x-client-version", "test-client")
                    .json_body_partial(r#"{"guest_mode": true}"#);
                then.status(200).json_body(json!({ "response": "hi there" }));
            })
            .await;
        let app = router(test_state(2, 5, &server.base_url()));

        for expected_remaining in [1, 0] {
            let resp = app
                .clone()
                .oneshot(chat_request(None, json!({ "message": "hello" })))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let body = json_body(resp).await;
            assert_eq!(body["response"], "hi there");
            assert_eq!(body["remaining"], expected_remaining);
        }

        let resp = app
            .clone()
            .oneshot(chat_request(None, json!({ "message": "one more" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry: u64 = resp.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!(retry > 3500 && retry <= 3600, "retry after {}", retry);
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["error"], true);

        upstream.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn invalid_message_does_not_spend_quota() {
        let state = test_state(1, 1, NO_UPSTREAM);
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(chat_request(None, json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["message"], "Message cannot be empty");
        assert_eq!(state.limiter.active_windows(), 0);

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "javascript:alert(1)" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.limiter.active_windows(), 0);
    }

    #[tokio::test]
    async fn authenticated_history_is_private() {
        let server = MockServer::start_async().await;
        let upstream = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .json_body_partial(r#"{"guest_mode": false, "message": "a &lt;b&gt;"}"#);
                then.status(200).json_body(json!({ "response": "answer" }));
            })
            .await;
        let app = router(test_state(1, 5, &server.base_url()));

        let resp = app
            .clone()
            .oneshot(chat_request(Some("alice"), json!({ "message": "a <b>" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["remaining"], 4);
        let session_id = body["session_id"].as_str().unwrap().to_string();
        upstream.assert_async().await;

        let uri = format!("/api/sessions/{}", session_id);
        let resp = app.clone().oneshot(get_request(&uri, Some("alice"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let history = json_body(resp).await;
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "a &lt;b&gt;");
        assert_eq!(messages[1]["role"], "assistant");

        let resp = app.oneshot(get_request(&uri, Some("bob"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_issues_new_session() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200).json_body(json!({ "response": "ok" }));
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let resp = app
            .clone()
            .oneshot(chat_request(Some("carol"), json!({ "message": "first" })))
            .await
            .unwrap();
        let old_id = json_body(resp).await["session_id"].as_str().unwrap().to_string();

        let reset = Request::builder()
            .method("POST")
            .uri(format!("/api/sessions/{}/reset", old_id))
            .header("x-authenticated-user", "carol")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(reset).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let new_id = json_body(resp).await["session_id"].as_str().unwrap().to_string();
        assert_ne!(new_id, old_id);

        let resp = app
            .clone()
            .oneshot(get_request(&format!("/api/sessions/{}", new_id), Some("carol")))
            .await
            .unwrap();
        assert!(json_body(resp).await["messages"].as_array().unwrap().is_empty());

        let resp = app
            .oneshot(get_request(&format!("/api/sessions/{}", old_id), Some("carol")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_bad_gateway() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(500).body("boom");
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "UPSTREAM_ERROR");
        assert_eq!(body["message"], "boom");
    }

    #[tokio::test]
    async fn upstream_error_message_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(503)
                    .json_body(json!({ "message": "Model is overloaded", "code": 17 }));
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(resp).await["message"], "Model is overloaded");
    }

    #[tokio::test]
    async fn bearer_token_is_forwarded_and_upstream_401_asks_for_login() {
        let server = MockServer::start_async().await;
        let accepted = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .header("authorization", "Bearer good-token");
                then.status(200).json_body(json!({ "response": "welcome" }));
            })
            .await;
        let rejected = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat")
                    .header("authorization", "Bearer stale-token");
                then.status(401).json_body(json!({ "message": "token expired" }));
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let mut req = chat_request(Some("frank"), json!({ "message": "hi" }));
        req.headers_mut().insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_static("Bearer good-token"),
        );
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        accepted.assert_async().await;

        let mut req = chat_request(Some("frank"), json!({ "message": "hi again" }));
        req.headers_mut().insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_static("Bearer stale-token"),
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "AUTH_FAILED");
        assert_eq!(body["message"], "Authentication failed. Please log in again.");
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_timeout_maps_to_gateway_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .json_body(json!({ "response": "too late" }));
            })
            .await;
        let app = router(test_state_with_timeout(
            5,
            5,
            &server.base_url(),
            Duration::from_millis(300),
        ));

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "UPSTREAM_TIMEOUT");
        assert_eq!(body["message"], "Request timed out. Please try again.");
    }

    #[tokio::test]
    async fn foreign_session_id_does_not_spend_quota() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200).json_body(json!({ "response": "ok" }));
            })
            .await;
        let state = test_state(5, 5, &server.base_url());
        let app = router(state.clone());

        let resp = app
            .clone()
            .oneshot(chat_request(Some("alice"), json!({ "message": "mine" })))
            .await
            .unwrap();
        let alice_session = json_body(resp).await["session_id"].clone();

        let resp = app
            .clone()
            .oneshot(chat_request(
                Some("bob"),
                json!({ "message": "let me in", "session_id": alice_session }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get_request("/api/quota", Some("bob"))).await.unwrap();
        assert_eq!(json_body(resp).await["used"], 0);
        assert_eq!(state.limiter.active_windows(), 1);
    }

    #[tokio::test]
    async fn upstream_rate_limit_is_passed_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(429).header("Retry-After", "120");
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[header::RETRY_AFTER], "120");
    }

    #[tokio::test]
    async fn upstream_rate_limit_without_hint_says_later() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(429);
            })
            .await;
        let app = router(test_state(5, 5, &server.base_url()));

        let resp = app
            .oneshot(chat_request(None, json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().get(header::RETRY_AFTER).is_none());
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "UPSTREAM_RATE_LIMITED");
        assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");
    }

    #[tokio::test]
    async fn quota_endpoint_reports_usage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat");
                then.status(200).json_body(json!({ "response": "ok" }));
            })
            .await;
        let app = router(test_state(10, 50, &server.base_url()));

        let resp = app.clone().oneshot(get_request("/api/quota", Some("dave"))).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["kind"], "authenticated");
        assert_eq!(body["remaining"], 50);
        assert_eq!(body["message"], "50 questions remaining");
        assert!(body["reset_in_secs"].is_null());

        app.clone()
            .oneshot(chat_request(Some("dave"), json!({ "message": "q" })))
            .await
            .unwrap();

        let resp = app.oneshot(get_request("/api/quota", Some("dave"))).await.unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["used"], 1);
        assert_eq!(body["remaining"], 49);
        assert!(body["message"].as_str().unwrap().starts_with("49 questions remaining. Resets in"));
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        let app = router(test_state(1, 1, NO_UPSTREAM));

        let resp = app.clone().oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "healthy");

        crate::metrics::REQUEST_TOTAL.inc_by(0.0);
        let resp = app.oneshot(get_request("/metrics", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("gateway_chat_requests_total"));
    }
}
