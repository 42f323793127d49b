use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope shared by every resource endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl ApiResponse {
    pub fn new(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    /// Envelope with an empty object as `data`
    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(message, serde_json::json!({}))
    }
}
