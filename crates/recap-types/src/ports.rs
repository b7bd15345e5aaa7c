//! Collaborator seams. Adapter crates implement these; the executor only
//! ever sees the traits, which keeps it testable without a network.

use async_trait::async_trait;

use crate::api::SlashResponse;
use crate::error::{DeliveryError, PlatformError};
use crate::models::{Channel, ChannelMessage, HistoryPage, UserProfile};
use crate::ts::MessageTs;

/// The chat platform's Web API.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Find a channel by (case-insensitive) name.
    async fn find_channel(&self, name: &str) -> Result<Option<Channel>, PlatformError>;

    /// Whether the bot user belongs to `channel_id`.
    async fn bot_is_member(&self, channel_id: &str) -> Result<bool, PlatformError>;

    /// One page of history, newest first, no older than `oldest`.
    async fn history_page(
        &self,
        channel_id: &str,
        oldest: MessageTs,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<HistoryPage, PlatformError>;

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, PlatformError>;
}

/// Text-in, text-out condensation. Never fails: errors become a fallback text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        messages: &[ChannelMessage],
        channel_name: &str,
        invoker: Option<&str>,
    ) -> String;
}

/// Posts a payload to a one-shot callback address.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, response_url: &str, body: &SlashResponse) -> Result<(), DeliveryError>;
}
