use axum::response::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::errors::AppError;

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "message": "M-Pesa Processor is running.",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn not_found() -> AppError {
    AppError::not_found("Not Found - The requested resource does not exist")
}
