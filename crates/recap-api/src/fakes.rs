//! In-process collaborators for executor and handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use recap_types::api::SlashResponse;
use recap_types::error::{DeliveryError, PlatformError};
use recap_types::models::{Channel, ChannelMessage, HistoryPage, RawMessage, UserProfile};
use recap_types::ports::{ChatPlatform, ResponseSink, Summarizer};
use recap_types::ts::MessageTs;

pub fn raw(ts: MessageTs, user: &str, text: &str) -> RawMessage {
    RawMessage {
        kind: Some("message".into()),
        ts,
        user: Some(user.into()),
        text: Some(text.into()),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakePlatform {
    channels: Vec<Channel>,
    members: HashSet<String>,
    history: Mutex<Vec<RawMessage>>,
    profiles: HashMap<String, String>,
    failing_profiles: HashSet<String>,
    history_error: Option<String>,
    lookup_delay: Duration,
    /// Every call of any kind.
    pub calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    /// `oldest` argument of each history call.
    pub history_oldest: Mutex<Vec<MessageTs>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel the bot belongs to.
    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.push(Channel {
            id: id.into(),
            name: name.into(),
        });
        self.members.insert(id.into());
        self
    }

    pub fn with_foreign_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.push(Channel {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// History in platform order; served as-is, page by page.
    pub fn with_history(self, messages: Vec<RawMessage>) -> Self {
        *self.history.lock().unwrap() = messages;
        self
    }

    pub fn post(&self, msg: RawMessage) {
        self.history.lock().unwrap().push(msg);
    }

    pub fn with_profile(mut self, user_id: &str, display_name: &str) -> Self {
        self.profiles.insert(user_id.into(), display_name.into());
        self
    }

    pub fn with_failing_profile(mut self, user_id: &str) -> Self {
        self.failing_profiles.insert(user_id.into());
        self
    }

    pub fn failing_history(mut self, code: &str) -> Self {
        self.history_error = Some(code.into());
        self
    }

    /// Slow down channel lookups.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn find_channel(&self, name: &str) -> Result<Option<Channel>, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        Ok(self
            .channels
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn bot_is_member(&self, channel_id: &str) -> Result<bool, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.contains(channel_id))
    }

    async fn history_page(
        &self,
        _channel_id: &str,
        oldest: MessageTs,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<HistoryPage, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history_oldest.lock().unwrap().push(oldest);

        if let Some(code) = &self.history_error {
            return Err(PlatformError::api("conversations.history", code.clone()));
        }

        let visible: Vec<RawMessage> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.ts >= oldest)
            .cloned()
            .collect();

        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (start + limit).min(visible.len());
        Ok(HistoryPage {
            messages: visible[start..end].to_vec(),
            next_cursor: (end < visible.len()).then(|| end.to_string()),
        })
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_profiles.contains(user_id) {
            return Err(PlatformError::api("users.info", "user_not_found"));
        }
        Ok(UserProfile {
            display_name: self.profiles.get(user_id).cloned(),
            ..Default::default()
        })
    }
}

/// Echoes its input as `author: text` lines so tests can read what it saw.
#[derive(Default)]
pub struct EchoSummarizer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(
        &self,
        messages: &[ChannelMessage],
        channel_name: &str,
        invoker: Option<&str>,
    ) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if messages.is_empty() {
            return match invoker {
                Some(user) => format!("@{user} is all caught up in #{channel_name}"),
                None => format!("no activity in #{channel_name}"),
            };
        }
        messages
            .iter()
            .map(|m| format!("{}: {}", m.author_name, m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Records every delivery; optionally rejects them all.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<(String, SlashResponse)>>,
    reject: bool,
}

impl RecordingSink {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn deliveries(&self) -> Vec<(String, SlashResponse)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn deliver(&self, response_url: &str, body: &SlashResponse) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .unwrap()
            .push((response_url.to_string(), body.clone()));
        if self.reject {
            return Err(DeliveryError::Rejected {
                status: 404,
                body: "expired_url".into(),
            });
        }
        Ok(())
    }
}
