use serde::{Deserialize, Serialize};

use crate::models::{DeliveryResult, Visibility};

// -- Slash commands --

/// Form body the platform posts for a slash command.
///
/// Fields the bot does not use (`token`, `api_app_id`, ...) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommandForm {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub response_url: String,
}

/// Synchronous reply to a slash command, and the body posted to `response_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashResponse {
    pub response_type: Visibility,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
}

impl SlashResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: Visibility::Ephemeral,
            text: text.into(),
            replace_original: None,
        }
    }

    /// Follow-up body that replaces the placeholder ack.
    pub fn followup(result: &DeliveryResult) -> Self {
        Self {
            response_type: result.visibility,
            text: result.text.clone(),
            replace_original: Some(true),
        }
    }
}

impl From<DeliveryResult> for SlashResponse {
    fn from(result: DeliveryResult) -> Self {
        Self {
            response_type: result.visibility,
            text: result.text,
            replace_original: None,
        }
    }
}

// -- Events API --

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification { challenge: String },
    EventCallback {
        #[serde(default)]
        event: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

// -- Health --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub configured: ConfiguredCredentials,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfiguredCredentials {
    pub slack_bot_token: bool,
    pub gemini_api_key: bool,
}
