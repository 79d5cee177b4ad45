//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/weather", get(handlers::get_weather))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use skyproxy_core::clock::ManualClock;
    use skyproxy_core::error::FetchError;
    use skyproxy_core::traits::WeatherFetcher;
    use skyproxy_core::types::WeatherPayload;
    use skyproxy_limiter::RateLimitConfig;

    use crate::config::ApiConfig;

    struct StubFetcher {
        calls: AtomicUsize,
        result: std::result::Result<WeatherPayload, FetchError>,
        delay: Duration,
    }

    impl StubFetcher {
        fn ok() -> Arc<Self> {
            Self::with_result(Ok(serde_json::from_value(forecast()).unwrap()))
        }

        fn failing(err: FetchError) -> Arc<Self> {
            Self::with_result(Err(err))
        }

        fn with_result(result: std::result::Result<WeatherPayload, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherFetcher for StubFetcher {
        async fn fetch(&self) -> std::result::Result<WeatherPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.result.clone()
        }

        fn describe(&self) -> String {
            "stub".into()
        }
    }

    fn forecast() -> Value {
        json!({
            "latitude": 52.52,
            "longitude": 13.41,
            "current": { "temperature_2m": 15.5 },
            "hourly": { "temperature_2m": [14.0, 15.5, 16.2] }
        })
    }

    fn app_with(config: ApiConfig, fetcher: Arc<StubFetcher>) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let state = AppState::with_parts(config, fetcher, clock.clone()).unwrap();
        (create_router(Arc::new(state)), clock)
    }

    fn app(fetcher: Arc<StubFetcher>) -> Router {
        app_with(ApiConfig::default(), fetcher).0
    }

    fn weather_request() -> Request<Body> {
        Request::builder()
            .uri("/api/weather")
            .body(Body::empty())
            .unwrap()
    }

    fn weather_request_from(peer: &str) -> Request<Body> {
        let mut request = weather_request();
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app(StubFetcher::ok());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["upstream"], "stub");
        assert_eq!(body["rate_limiter"]["policy"], "fixed_window");
        assert_eq!(body["cache"]["ttl_seconds"], 300);
    }

    #[tokio::test]
    async fn test_weather_passes_payload_through() {
        let app = app(StubFetcher::ok());

        let response = app.oneshot(weather_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(body_json(response).await, forecast());
    }

    #[tokio::test]
    async fn test_repeated_requests_fetch_once() {
        let fetcher = StubFetcher::ok();
        let app = app(fetcher.clone());

        for _ in 0..5 {
            let response = app.clone().oneshot(weather_request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let fetcher = StubFetcher::ok();
        let (app, clock) = app_with(ApiConfig::default(), fetcher.clone());

        app.clone().oneshot(weather_request()).await.unwrap();
        clock.advance(Duration::from_secs(300));
        app.oneshot(weather_request()).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher {
            calls: AtomicUsize::new(0),
            result: Ok(serde_json::from_value(forecast()).unwrap()),
            delay: Duration::from_millis(50),
        });
        let app = app(fetcher.clone());

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20 {
            let app = app.clone();
            tasks.spawn(async move {
                app.oneshot(weather_request_from(&format!("198.51.100.{i}:4000")))
                    .await
                    .unwrap()
                    .status()
            });
        }
        while let Some(status) = tasks.join_next().await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_over_quota() {
        let config = ApiConfig {
            rate_limit: RateLimitConfig::per_window(2, 60),
            ..Default::default()
        };
        let fetcher = StubFetcher::ok();
        let (app, _clock) = app_with(config, fetcher.clone());

        for _ in 0..2 {
            let response = app.clone().oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Too many requests");
        assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");

        // Rejected requests never reach the upstream.
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_recovers_after_window() {
        let config = ApiConfig {
            rate_limit: RateLimitConfig::per_window(1, 60),
            ..Default::default()
        };
        let (app, clock) = app_with(config, StubFetcher::ok());

        app.clone().oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
        let response = app.clone().oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        clock.advance(Duration::from_secs(60));
        let response = app.oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_client() {
        let config = ApiConfig {
            rate_limit: RateLimitConfig::per_window(1, 60),
            ..Default::default()
        };
        let (app, _clock) = app_with(config, StubFetcher::ok());

        let first = app.clone().oneshot(weather_request_from("192.0.2.1:1000")).await.unwrap();
        let again = app.clone().oneshot(weather_request_from("192.0.2.1:1001")).await.unwrap();
        let other = app.oneshot(weather_request_from("192.0.2.2:1000")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_only_when_trusted() {
        let forwarded = |ip: &str| {
            let mut request = weather_request_from("10.0.0.1:1000");
            request
                .headers_mut()
                .insert("x-forwarded-for", ip.parse().unwrap());
            request
        };

        let config = ApiConfig {
            rate_limit: RateLimitConfig::per_window(1, 60),
            trust_forwarded_for: true,
            ..Default::default()
        };
        let (app, _clock) = app_with(config.clone(), StubFetcher::ok());
        let a = app.clone().oneshot(forwarded("203.0.113.1")).await.unwrap();
        let b = app.oneshot(forwarded("203.0.113.2")).await.unwrap();
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);

        let untrusted = ApiConfig {
            trust_forwarded_for: false,
            ..config
        };
        let (app, _clock) = app_with(untrusted, StubFetcher::ok());
        let a = app.clone().oneshot(forwarded("203.0.113.1")).await.unwrap();
        let b = app.oneshot(forwarded("203.0.113.2")).await.unwrap();
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_transport_error_is_gateway_timeout() {
        let fetcher = StubFetcher::failing(FetchError::Transport("connection refused".into()));
        let app = app(fetcher.clone());

        let response = app.clone().oneshot(weather_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Gateway timeout");
        assert_eq!(
            body["message"],
            "Unable to reach weather service. Please try again later."
        );

        // Nothing was cached, so the next request tries again.
        app.oneshot(weather_request()).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_upstream_status_is_bad_gateway() {
        let app = app(StubFetcher::failing(FetchError::UpstreamStatus {
            status: 500,
            message: "oops".into(),
        }));

        let response = app.oneshot(weather_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Bad gateway");
        assert_eq!(
            body["message"],
            "Weather service returned an error. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_parse_error_is_internal() {
        let app = app(StubFetcher::failing(FetchError::Parse("eof".into())));

        let response = app.oneshot(weather_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(
            body["message"],
            "An unexpected error occurred. Please try again later."
        );
    }

    #[tokio::test]
    async fn test_post_not_allowed() {
        let app = app(StubFetcher::ok());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/weather")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
