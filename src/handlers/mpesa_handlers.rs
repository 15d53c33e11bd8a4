// handlers/mpesa_handlers.rs
use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::models::mpesa::{CallbackData, StkPushRequest};
use crate::state::AppState;

const MISSING_FIELDS: &str = "Amount and phone number are required.";

/// Accepts JSON and urlencoded form bodies. Any other content type, or a
/// body that does not parse, is validated like an empty object.
fn read_stk_push_body(headers: &HeaderMap, body: &[u8]) -> StkPushRequest {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => StkPushRequest::from_form(body),
        "application/json" => StkPushRequest::from_json(body),
        other if other.ends_with("+json") => StkPushRequest::from_json(body),
        _ => StkPushRequest::default(),
    }
}

// C2B Handlers
pub async fn initiate_stk_push(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let request = read_stk_push_body(&headers, &body);

    if !request.has_required_fields() {
        return Err(AppError::invalid_data(MISSING_FIELDS));
    }

    let result = state.mpesa_service.initiate_stk_push(&request).await?;
    Ok(Json(result))
}

pub async fn mpesa_callback(body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            let pretty = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            info!("Received M-Pesa callback: {}", pretty);

            if let Ok(data) = serde_json::from_value::<CallbackData>(payload) {
                let callback = data.body.stk_callback;
                info!(
                    merchant_request_id = %callback.merchant_request_id,
                    checkout_request_id = %callback.checkout_request_id,
                    result_code = callback.result_code,
                    result_desc = %callback.result_desc,
                    receipt = ?callback.metadata_value("MpesaReceiptNumber"),
                    amount = ?callback.metadata_value("Amount"),
                    "STK callback outcome"
                );
            }
        }
        Err(_) if body.is_empty() => info!("Received M-Pesa callback with an empty body"),
        Err(e) => warn!(
            "Received M-Pesa callback that is not valid JSON ({}): {}",
            e,
            String::from_utf8_lossy(&body)
        ),
    }

    Json(json!({ "message": "Callback received successfully." }))
}

pub async fn get_access_token(State(state): State<AppState>) -> Result<Json<Value>> {
    let token = state.mpesa_service.get_access_token().await?;
    Ok(Json(json!({ "accessToken": token })))
}
