use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::ts::MessageTs;

/// What a command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Everything in the last 24 hours, posted to the channel.
    Summary,
    /// Only what the invoker has not seen yet, posted privately.
    Unread,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Unread => "unread",
        }
    }
}

/// Who gets to see a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    InChannel,
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

/// Message as returned by the platform's history endpoint, before filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub ts: MessageTs,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A qualifying message with its author resolved to a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub ts: MessageTs,
    pub channel_id: String,
    pub user_id: String,
    pub author_name: String,
    pub text: String,
}

/// One page of channel history.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<RawMessage>,
    pub next_cursor: Option<String>,
}

/// Profile fields used to label authors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    /// First non-blank of display name, real name, handle; else `User_<id>`.
    pub fn label(&self, user_id: &str) -> String {
        [&self.display_name, &self.real_name, &self.name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_name(user_id))
    }
}

pub fn placeholder_name(user_id: &str) -> String {
    format!("User_{}", user_id)
}

/// A parsed slash command, one per inbound request.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub request_id: String,
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub team_id: String,
    pub response_url: String,
    pub received_at: Instant,
    pub mode: Mode,
    /// Channel name with markers stripped; `None` when the argument was empty.
    pub target: Option<String>,
}

/// Terminal payload of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub text: String,
    pub visibility: Visibility,
}

impl DeliveryResult {
    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: Visibility::InChannel,
        }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            visibility: Visibility::Ephemeral,
        }
    }
}
