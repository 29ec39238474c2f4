use serde::{Deserialize, Serialize};

use crate::models::social::Provider;

/// An untrusted message delivered from another window.
///
/// `origin` is reported by the window system, not by the sender; it is the
/// only field that may be trusted before the payload is validated.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: String,
    pub data: serde_json::Value,
}

/// Cross-window OAuth callback message:
/// `{type: "<provider>_callback", success, error?, ...}`.
///
/// Nothing in here is authoritative — a successful message only triggers a
/// re-fetch of the connection set from the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_user: Option<String>,
}

impl CallbackMessage {
    /// Whether `data` carries the `type` tag expected from `provider`'s
    /// popup. Messages with other tags are unrelated traffic and must be
    /// left alone.
    pub fn tag_matches(provider: Provider, data: &serde_json::Value) -> bool {
        data.get("type").and_then(|tag| tag.as_str()) == Some(provider.message_type().as_str())
    }

    /// Strict shape validation of a tag-matched message. `success` is
    /// required; a tag-matched message without it is malformed and is
    /// rejected rather than guessed at.
    pub fn from_value(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(data.clone())
    }

    /// Failure message posted from the popup back to its opener.
    pub fn failure(provider: Provider, error: impl Into<String>) -> Self {
        Self {
            message_type: provider.message_type(),
            success: false,
            error: Some(error.into()),
            instagram_username: None,
            instagram_user_id: None,
            page_name: None,
            app_user: None,
        }
    }
}
