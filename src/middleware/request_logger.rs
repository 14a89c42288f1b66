use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware that logs every request, records HTTP metrics
/// and tags the response with a request id
pub async fn request_logger_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();
    // Route template keeps metric label cardinality bounded
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let user = extract_user_info(request.headers());
    let start = Instant::now();

    debug!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        user = user.as_deref().unwrap_or("anonymous"),
        "Incoming request"
    );

    let mut response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route
    )
    .record(duration.as_secs_f64());

    match status {
        status if status.is_server_error() => {
            error!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request failed with server error"
            );
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                "Request rejected by access control"
            );
        }
        status if status.is_client_error() => {
            debug!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request failed with client error"
            );
        }
        _ => {
            info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request completed"
            );
        }
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// User id and name from the bearer token, for log context only
fn extract_user_info(headers: &HeaderMap) -> Option<String> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct LogClaims {
        sub: String,
        name: Option<String>,
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))?;

    // Signature is not checked here; the auth middleware does that
    jsonwebtoken::dangerous::insecure_decode::<LogClaims>(token)
        .ok()
        .map(|data| match data.claims.name {
            Some(name) => format!("{}({})", data.claims.sub, name),
            None => data.claims.sub,
        })
}
