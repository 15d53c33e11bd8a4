use serde::Deserialize;
use serde_json::{Map, Value};

/// Inbound body of `POST /api/mpesa/stk-push`.
///
/// Fields are kept as raw JSON so they reach the provider exactly as the
/// client sent them.
#[derive(Debug, Default, Clone)]
pub struct StkPushRequest {
    pub amount: Option<Value>,
    pub phone: Option<Value>,
    pub account_reference: Option<Value>,
    pub transaction_desc: Option<Value>,
}

impl StkPushRequest {
    /// Reads a JSON body. Only a JSON object carries fields; arrays, scalars
    /// and unparseable input give an empty request.
    pub fn from_json(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self::from_fields(fields),
            _ => Self::default(),
        }
    }

    /// Reads an `application/x-www-form-urlencoded` body. Values stay strings
    /// and a repeated key keeps its last value.
    pub fn from_form(body: &[u8]) -> Self {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            Ok(pairs) => Self::from_fields(
                pairs
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ),
            Err(_) => Self::default(),
        }
    }

    fn from_fields(mut fields: Map<String, Value>) -> Self {
        StkPushRequest {
            amount: fields.remove("amount"),
            phone: fields.remove("phone"),
            account_reference: fields.remove("accountReference"),
            transaction_desc: fields.remove("transactionDesc"),
        }
    }

    pub fn has_required_fields(&self) -> bool {
        is_present(self.amount.as_ref()) && is_present(self.phone.as_ref())
    }
}

/// A value is present unless it is missing, null, false, zero or an empty string.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

// Documented shape of an STK push result notification. Only used for logging.
#[derive(Debug, Deserialize)]
pub struct CallbackData {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl StkCallback {
    pub fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}
