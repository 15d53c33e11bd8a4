use std::any::Any;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::errors::{AppError, ErrorReport};
use crate::state::AppState;

/// Logs every error produced below it and renders the `{error:{message}}`
/// envelope, adding the stack outside production.
pub async fn error_responder(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let ip = state
        .rate_limiter
        .client_ip(request.headers(), connect_info.map(|ConnectInfo(addr)| addr))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let status = response.status();
    tracing::error!("{} - {} - {} - {} - {}", status.as_u16(), report.message, uri, method, ip);
    tracing::error!("{}", report.stack);

    if state.config.is_production() {
        return response;
    }

    let body = json!({
        "error": {
            "message": report.message,
            "stack": report.stack,
        }
    });

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body.to_string()))
}

/// Turns a handler panic into an internal error so it reaches the responder.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!("Handler panicked: {}", detail);
    AppError::internal("Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panic_becomes_internal_error_report() {
        let response = handle_panic(Box::new("boom"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "Internal Server Error");
    }
}
