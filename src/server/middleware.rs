use super::AppState;
use crate::error::ApiError;
use crate::rate_limit::{whole_seconds, RateLimitDecision};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};

const PRODUCTION_CSP: &str = "default-src 'self'; \
     script-src 'self' 'unsafe-inline' https://cdn.tailwindcss.com; \
     style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
     font-src 'self' https://fonts.gstatic.com data:; \
     img-src 'self' data: https:; \
     connect-src 'self'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'self'; \
     object-src 'none'; \
     upgrade-insecure-requests";

const HSTS: &str = "max-age=31536000; includeSubDomains";

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Identify the caller for rate limiting.
///
/// Behind one trusted proxy hop (production) the right-most
/// `X-Forwarded-For` entry is the address that proxy saw; otherwise the
/// socket peer is used. Callers sharing a NAT or proxy share a key.
pub fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.rsplit(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| {
            tracing::warn!("Could not determine client address for rate limiting");
            "unknown".to_string()
        })
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request, state.config.production);

    match state.limiter.check(&key) {
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            insert_rate_limit_headers(
                response.headers_mut(),
                limit,
                remaining,
                whole_seconds(reset_after),
            );
            response
        }
        RateLimitDecision::Limited { limit, retry_after } => {
            let retry_after = whole_seconds(retry_after);
            tracing::warn!(client = %key, retry_after, "Rate limit exceeded");
            let mut response = ApiError::RateLimited { retry_after }.into_response();
            insert_rate_limit_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: u64) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(reset));
}

/// Reject cross-origin callers that are not on the allow-list.
///
/// Requests without an `Origin` header (same-origin navigation, curl,
/// health probes) pass through.
pub async fn enforce_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.config.origin_allowed(o))
            .unwrap_or(false);

        if !allowed {
            tracing::warn!(origin = ?origin, "Rejected request from disallowed origin");
            return ApiError::CorsRejected.into_response();
        }
    }

    next.run(request).await
}

pub async fn security_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        header::X_DNS_PREFETCH_CONTROL,
        HeaderValue::from_static("off"),
    );
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("origin-agent-cluster"),
        HeaderValue::from_static("?1"),
    );
    headers.insert(
        HeaderName::from_static("x-permitted-cross-domain-policies"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS),
    );

    // Development serves the dev bundle with inline scripts, so no CSP there.
    if state.config.production {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(PRODUCTION_CSP),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: [u8; 4], forwarded: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/generate-image");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    #[test]
    fn test_client_key_uses_peer_ip() {
        let request = request_from([192, 168, 1, 7], Some("203.0.113.9"));
        assert_eq!(client_key(&request, false), "192.168.1.7");
    }

    #[test]
    fn test_client_key_trusts_last_forwarded_hop() {
        let request = request_from([10, 0, 0, 1], Some("198.51.100.1, 203.0.113.9"));
        assert_eq!(client_key(&request, true), "203.0.113.9");
    }

    #[test]
    fn test_client_key_ignores_garbage_forwarded_header() {
        let request = request_from([10, 0, 0, 1], Some("not-an-ip"));
        assert_eq!(client_key(&request, true), "10.0.0.1");
    }

    #[test]
    fn test_client_key_without_connect_info() {
        let request = axum::http::Request::builder()
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request, false), "unknown");
    }
}
