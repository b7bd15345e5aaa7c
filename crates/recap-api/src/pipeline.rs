//! Paginated history retrieval, filtering, ordering and author enrichment.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use recap_types::PlatformError;
use recap_types::models::{ChannelMessage, RawMessage, placeholder_name};
use recap_types::ports::ChatPlatform;
use recap_types::ts::MessageTs;

/// Lookback for summaries, and the ceiling on how far back an unread check may reach.
pub const WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub page_size: usize,
    /// Pause before requesting the next page.
    pub page_delay: Duration,
    /// Pause after each author lookup that missed the per-run cache.
    pub author_lookup_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            page_delay: Duration::from_millis(500),
            author_lookup_delay: Duration::from_millis(100),
        }
    }
}

/// Which messages qualify.
#[derive(Debug, Clone)]
pub enum Window {
    /// Everything in the last 24 hours.
    Summary,
    /// Strictly after `cursor`, not authored by `invoker`, still within 24 hours.
    Unread { cursor: MessageTs, invoker: String },
}

#[derive(Debug, Default)]
pub struct Fetched {
    /// Qualifying messages, oldest first.
    pub messages: Vec<RawMessage>,
    /// Newest qualifying timestamp; `None` when nothing qualified.
    pub newest: Option<MessageTs>,
    pub pages: usize,
}

impl Window {
    /// Lower bound passed to the platform. Inclusive there; exclusivity is
    /// enforced by [`Window::admits`].
    fn oldest(&self, now: DateTime<Utc>) -> MessageTs {
        let floor = MessageTs::from_datetime(now - chrono::Duration::hours(WINDOW_HOURS));
        match self {
            Self::Summary => floor,
            Self::Unread { cursor, .. } => floor.max(*cursor),
        }
    }

    fn admits(&self, msg: &RawMessage, floor: MessageTs, now: MessageTs) -> bool {
        if msg.kind.as_deref().unwrap_or("message") != "message"
            || msg.bot_id.is_some()
            || msg.subtype.is_some()
        {
            return false;
        }
        let Some(user) = msg.user.as_deref().filter(|u| !u.is_empty()) else {
            return false;
        };
        if msg.ts < floor {
            return false;
        }

        match self {
            Self::Summary => true,
            Self::Unread { cursor, invoker } => {
                msg.ts > *cursor && msg.ts <= now && user != invoker.as_str()
            }
        }
    }
}

/// Walk every history page for `channel_id` and keep what `window` admits.
pub async fn fetch_messages(
    platform: &dyn ChatPlatform,
    channel_id: &str,
    window: &Window,
    now: DateTime<Utc>,
    settings: &FetchSettings,
) -> Result<Fetched, PlatformError> {
    let oldest = window.oldest(now);
    let now_ts = MessageTs::from_datetime(now);

    let mut fetched = Fetched::default();
    let mut cursor: Option<String> = None;
    let mut seen = 0usize;

    loop {
        if fetched.pages > 0 {
            tokio::time::sleep(settings.page_delay).await;
        }

        let page = platform
            .history_page(channel_id, oldest, cursor.as_deref(), settings.page_size)
            .await?;
        fetched.pages += 1;
        seen += page.messages.len();

        for msg in page.messages {
            if window.admits(&msg, oldest, now_ts) {
                fetched.newest = fetched.newest.max(Some(msg.ts));
                fetched.messages.push(msg);
            }
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    fetched.messages.sort_by_key(|m| m.ts);

    debug!(
        "Fetched {} pages from {}: {} of {} messages qualify",
        fetched.pages,
        channel_id,
        fetched.messages.len(),
        seen
    );
    Ok(fetched)
}

/// Resolve authors to display names, one lookup per distinct author.
///
/// A failed lookup labels that author `User_<id>` and never aborts the run.
pub async fn enrich_authors(
    platform: &dyn ChatPlatform,
    channel_id: &str,
    messages: Vec<RawMessage>,
    settings: &FetchSettings,
) -> Vec<ChannelMessage> {
    let mut names: HashMap<String, String> = HashMap::new();
    let mut enriched = Vec::with_capacity(messages.len());

    for msg in messages {
        let user_id = msg.user.unwrap_or_default();

        let author_name = match names.get(&user_id) {
            Some(name) => name.clone(),
            None => {
                let name = match platform.user_profile(&user_id).await {
                    Ok(profile) => profile.label(&user_id),
                    Err(e) => {
                        warn!("Author lookup for {} failed: {}", user_id, e);
                        placeholder_name(&user_id)
                    }
                };
                names.insert(user_id.clone(), name.clone());
                tokio::time::sleep(settings.author_lookup_delay).await;
                name
            }
        };

        enriched.push(ChannelMessage {
            ts: msg.ts,
            channel_id: channel_id.to_string(),
            user_id,
            author_name,
            text: msg.text.unwrap_or_default(),
        });
    }

    debug!(
        "Resolved {} distinct authors for {} messages",
        names.len(),
        enriched.len()
    );
    enriched
}
