use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::api::ApiError;

/// Drops the in-flight handler once `limit` elapses and answers 503. Any open
/// transaction in the dropped future rolls back.
pub async fn enforce_deadline(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                event_name = "http.deadline_exceeded",
                method = %method,
                path = %path,
                limit_ms = limit.as_millis() as u64,
                "request exceeded its deadline"
            );
            ApiError::unavailable(format!("request exceeded {}ms deadline", limit.as_millis()))
                .into_response()
        }
    }
}
