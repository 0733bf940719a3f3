//! API middleware.

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics;

pub type ClientRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Upper bound on tracked clients.
const MAX_RATE_LIMITER_ENTRIES: usize = 10_000;

/// Per-client rate limiters, expired after `ttl`.
#[derive(Clone)]
pub struct RateLimiterCache {
    limiters: Arc<RwLock<HashMap<IpAddr, (Arc<ClientRateLimiter>, Instant)>>>,
    quota: Quota,
    ttl: Duration,
}

impl RateLimiterCache {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: Arc::new(RwLock::new(HashMap::new())),
            quota: Quota::per_second(rps),
            ttl: Duration::from_secs(3600),
        }
    }

    async fn limiter_for(&self, ip: IpAddr) -> Arc<ClientRateLimiter> {
        if let Some((limiter, _)) = self.limiters.read().await.get(&ip) {
            return Arc::clone(limiter);
        }

        let mut limiters = self.limiters.write().await;
        if let Some((limiter, _)) = limiters.get(&ip) {
            return Arc::clone(limiter);
        }
        if limiters.len() >= MAX_RATE_LIMITER_ENTRIES {
            let now = Instant::now();
            limiters.retain(|_, (_, created)| now.duration_since(*created) < self.ttl);
            if limiters.len() >= MAX_RATE_LIMITER_ENTRIES {
                warn!("Rate limiter cache full, resetting {} entries", limiters.len());
                limiters.clear();
            }
        }

        let limiter = Arc::new(RateLimiter::direct(self.quota));
        limiters.insert(ip, (Arc::clone(&limiter), Instant::now()));
        limiter
    }

    /// Whether `ip` may make another request now.
    pub async fn check(&self, ip: IpAddr) -> bool {
        self.limiter_for(ip).await.check().is_ok()
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(600));

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Propagate or assign `X-Request-ID`.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

/// Request ID attached by [`request_id`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(request).await;

    if uri.path() != "/health" {
        info!(
            method = %method,
            uri = %uri,
            status = %response.status(),
            duration_ms = %start.elapsed().as_millis(),
            request_id = %request_id,
            "Request completed"
        );
    }
    response
}

/// Per-client rate limiting for the submission route.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = extract_client_ip(&request) {
        if !rate_limiter.check(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", "1")],
                Json(serde_json::json!({"error": "Rate limit exceeded"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Client IP from proxy headers, falling back to the peer address.
fn extract_client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| -> Option<IpAddr> {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok())
    };

    header_ip("X-Forwarded-For")
        .or_else(|| header_ip("X-Real-IP"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
}
