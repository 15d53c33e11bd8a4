// services/mpesa_service.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::MpesaConfig;
use crate::errors::{AppError, Result};
use crate::models::mpesa::{is_present, StkPushRequest};

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const DEFAULT_ACCOUNT_REFERENCE: &str = "Test";
const DEFAULT_TRANSACTION_DESC: &str = "Payment for service";

const TOKEN_FAILED: &str = "Could not retrieve M-Pesa access token.";
const STK_PUSH_FAILED: &str = "Failed to initiate STK Push.";

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct StkPushPayload {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: Value,
    #[serde(rename = "PartyA")]
    pub party_a: Value,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: Value,
    #[serde(rename = "CallBackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(rename = "AccountReference")]
    pub account_reference: Value,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: Value,
}

#[derive(Debug, Clone)]
pub struct MpesaService {
    config: MpesaConfig,
    client: Client,
}

impl MpesaService {
    pub fn new(config: MpesaConfig) -> std::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(MpesaService { config, client })
    }

    pub async fn get_access_token(&self) -> Result<String> {
        let (key, secret) = match (&self.config.consumer_key, &self.config.consumer_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => {
                error!("M-Pesa consumer key or secret is not defined in environment variables.");
                return Err(AppError::configuration("M-Pesa credentials not configured."));
            }
        };

        debug!("Requesting new access token");
        let encoded_auth = base64.encode(format!("{}:{}", key, secret));

        let response = self
            .client
            .get(self.config.auth_url())
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to get M-Pesa access token: {}", e);
                AppError::upstream(TOKEN_FAILED)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get M-Pesa access token: {} - {}", status, body);
            return Err(AppError::upstream(TOKEN_FAILED));
        }

        let auth_response: AuthResponse = response.json().await.map_err(|e| {
            error!("Failed to get M-Pesa access token: unreadable response: {}", e);
            AppError::upstream(TOKEN_FAILED)
        })?;

        debug!(expires_in = ?auth_response.expires_in, "Access token obtained");
        Ok(auth_response.access_token)
    }

    // C2B: Customer to Business
    pub async fn initiate_stk_push(&self, request: &StkPushRequest) -> Result<Value> {
        let access_token = self.get_access_token().await?;
        let timestamp = stk_timestamp(Utc::now());
        let payload = self.build_stk_payload(request, timestamp)?;

        info!(
            amount = %payload.amount,
            phone = %payload.phone_number,
            "Initiating STK push"
        );

        let response = self
            .client
            .post(self.config.stk_push_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("STK Push failed: {}", e);
                AppError::upstream(STK_PUSH_FAILED)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("STK Push failed: {} - {}", status, body);
            return Err(AppError::upstream(STK_PUSH_FAILED));
        }

        let body: Value = response.json().await.map_err(|e| {
            error!("STK Push failed: unreadable response: {}", e);
            AppError::upstream(STK_PUSH_FAILED)
        })?;

        info!("STK Push initiated successfully: {}", body);
        Ok(body)
    }

    pub fn build_stk_payload(&self, request: &StkPushRequest, timestamp: String) -> Result<StkPushPayload> {
        let (short_code, passkey) = match (&self.config.short_code, &self.config.passkey) {
            (Some(short_code), Some(passkey)) => (short_code, passkey),
            _ => {
                error!("M-Pesa passkey or shortcode is not defined.");
                return Err(AppError::configuration(
                    "M-Pesa passkey or shortcode not configured.",
                ));
            }
        };

        let password = generate_password(short_code, passkey, &timestamp);
        let phone = request.phone.clone().unwrap_or(Value::Null);

        Ok(StkPushPayload {
            business_short_code: short_code.clone(),
            password,
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount: request.amount.clone().unwrap_or(Value::Null),
            party_a: phone.clone(),
            party_b: short_code.clone(),
            phone_number: phone,
            callback_url: self.config.callback_url.clone(),
            account_reference: or_default(request.account_reference.as_ref(), DEFAULT_ACCOUNT_REFERENCE),
            transaction_desc: or_default(request.transaction_desc.as_ref(), DEFAULT_TRANSACTION_DESC),
        })
    }
}

/// `YYYYMMDDHHmmss` in UTC.
pub fn stk_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

pub fn generate_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

fn or_default(value: Option<&Value>, default: &str) -> Value {
    match value {
        Some(v) if is_present(Some(v)) => v.clone(),
        _ => Value::String(default.to_string()),
    }
}
