use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::auth::{SESSION_COOKIE, SessionToken};
use super::{ApiError, AppState};

/// GET /api/admin/metrics
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
) -> Result<String, ApiError> {
    state.auth_service().require_admin(&token).await?;

    Ok(state.prometheus_handle.as_ref().map_or_else(
        || "Metrics not enabled or failed to initialize".to_string(),
        metrics_exporter_prometheus::PrometheusHandle::render,
    ))
}

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Where the caller's credential came from, if anywhere.
fn credential_source(req: &Request) -> &'static str {
    let headers = req.headers();
    let has_cookie = headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(SESSION_COOKIE));

    if has_cookie {
        "cookie"
    } else if headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "))
    {
        "bearer"
    } else {
        "none"
    }
}

fn auth_outcome(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "denied",
        StatusCode::FORBIDDEN => "forbidden",
        s if s.is_server_error() => "error",
        s if s.is_client_error() => "rejected",
        _ => "granted",
    }
}

/// Per-request span and metrics. Handlers record `user_id` on the span once
/// a session resolves.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

    let method = req.method().clone();
    // Matched route keeps label cardinality bounded
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |mp| mp.as_str().to_string());
    let credential = credential_source(&req);

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        route = %route,
        credential,
        user_id = tracing::field::Empty,
    );

    async move {
        let mut response = next.run(req).await;
        let status = response.status();

        metrics::counter!(
            "authkeep_http_requests_total",
            "method" => method.to_string(),
            "route" => route.clone(),
            "status" => status.as_u16().to_string(),
        )
        .increment(1);
        metrics::histogram!("authkeep_http_request_duration_seconds", "route" => route.clone())
            .record(start.elapsed().as_secs_f64());

        if route.starts_with("/api/auth/") || route.starts_with("/api/admin/") {
            metrics::counter!(
                "authkeep_auth_requests_total",
                "route" => route.clone(),
                "credential" => credential,
                "outcome" => auth_outcome(status),
            )
            .increment(1);
        }

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        if status.is_server_error() {
            warn!(
                event = "request_failed",
                status = status.as_u16(),
                elapsed_ms,
                "Request failed"
            );
        } else {
            info!(
                event = "request_completed",
                status = status.as_u16(),
                elapsed_ms,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

pub async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_credential_source() {
        let req = Request::builder()
            .header("cookie", "theme=dark; session_token=abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(credential_source(&req), "cookie");

        let req = Request::builder()
            .header("authorization", "Bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(credential_source(&req), "bearer");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(credential_source(&req), "none");
    }

    #[test]
    fn test_auth_outcome_labels() {
        assert_eq!(auth_outcome(StatusCode::OK), "granted");
        assert_eq!(auth_outcome(StatusCode::CREATED), "granted");
        assert_eq!(auth_outcome(StatusCode::UNAUTHORIZED), "denied");
        assert_eq!(auth_outcome(StatusCode::FORBIDDEN), "forbidden");
        assert_eq!(auth_outcome(StatusCode::CONFLICT), "rejected");
        assert_eq!(auth_outcome(StatusCode::SERVICE_UNAVAILABLE), "error");
    }
}
