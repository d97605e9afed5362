//! Decrypted request and plaintext response shapes of the flow endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_PROTOCOL_VERSION: &str = "3.0";
pub const SUCCESS_SCREEN: &str = "SUCCESS";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecryptedRequest {
    #[serde(default)]
    pub version: Option<String>,
    pub action: String,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub flow_token: Option<String>,
}

impl DecryptedRequest {
    pub fn data(&self) -> Map<String, Value> {
        self.data.clone().unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_PROTOCOL_VERSION)
    }

    /// `flow_completed` may arrive as a boolean or as the string `"true"`.
    pub fn flow_completed(&self) -> bool {
        match self.data.as_ref().and_then(|data| data.get("flow_completed")) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Platform error notifications carry an `error` key in `data`.
    pub fn is_error_notification(&self) -> bool {
        self.data.as_ref().is_some_and(|data| data.contains_key("error"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub data: Value,
}

impl FlowResponse {
    pub fn screen(version: &str, screen: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { version: Some(version.to_owned()), screen: Some(screen.into()), data: Value::Object(data) }
    }

    pub fn pong() -> Self {
        Self { version: None, screen: None, data: json!({"status": "active"}) }
    }

    pub fn acknowledged() -> Self {
        Self { version: None, screen: None, data: json!({"acknowledged": true}) }
    }

    pub fn success(flow_token: &str) -> Self {
        Self {
            version: None,
            screen: Some(SUCCESS_SCREEN.to_owned()),
            data: json!({
                "extension_message_response": {"params": {"flow_token": flow_token}}
            }),
        }
    }
}
