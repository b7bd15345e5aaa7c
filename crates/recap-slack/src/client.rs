//! Slack Web API client used by the fetch pipeline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use recap_types::PlatformError;
use recap_types::models::{Channel, HistoryPage, RawMessage, UserProfile};
use recap_types::ports::ChatPlatform;
use recap_types::ts::MessageTs;
use recap_types::truncate_chars;

/// Codes that mean "the bot cannot see this channel" rather than a failure.
const NOT_A_MEMBER_CODES: &[&str] = &["channel_not_found", "not_in_channel"];

#[derive(Debug, Clone)]
pub struct SlackClientConfig {
    pub api_base: String,
    pub bot_token: String,
    pub request_timeout: Duration,
    pub page_size: usize,
    /// Pause between pages of a paginated listing.
    pub page_delay: Duration,
    /// How long a resolved channel name stays cached.
    pub channel_cache_ttl: Duration,
}

impl Default for SlackClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://slack.com/api".to_string(),
            bot_token: String::new(),
            request_timeout: Duration::from_secs(10),
            page_size: 200,
            page_delay: Duration::from_millis(500),
            channel_cache_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthTestResponse {
    user_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ConversationsListResponse {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct ConversationsMembersResponse {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct ConversationsHistoryResponse {
    #[serde(default)]
    messages: Vec<RawMessage>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    name: Option<String>,
    profile: SlackProfile,
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    user: SlackUser,
}

impl ResponseMetadata {
    fn into_cursor(self) -> Option<String> {
        self.next_cursor.filter(|c| !c.trim().is_empty())
    }
}

pub struct SlackClient {
    http: reqwest::Client,
    config: SlackClientConfig,
    bot_user_id: OnceCell<String>,
    /// lowercase name -> (channel, resolved at)
    channel_cache: Mutex<HashMap<String, (Channel, Instant)>>,
}

impl SlackClient {
    pub fn new(mut config: SlackClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("failed to create slack api client")?;

        config.api_base = config.api_base.trim_end_matches('/').to_string();
        config.bot_token = config.bot_token.trim().to_string();
        config.page_size = config.page_size.clamp(1, 1000);

        Ok(Self {
            http,
            config,
            bot_user_id: OnceCell::new(),
            channel_cache: Mutex::new(HashMap::new()),
        })
    }

    /// The bot's own user id, resolved once via `auth.test`.
    pub async fn bot_user_id(&self) -> Result<&str, PlatformError> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let resp: AuthTestResponse = self.call("auth.test", &[]).await?;
                info!("Bot user ID: {}", resp.user_id);
                Ok::<_, PlatformError>(resp.user_id)
            })
            .await?;
        Ok(id.as_str())
    }

    fn cached_channel(&self, name: &str) -> Option<Channel> {
        let mut cache = self.channel_cache.lock().ok()?;
        match cache.get(name) {
            Some((channel, at)) if at.elapsed() < self.config.channel_cache_ttl => {
                Some(channel.clone())
            }
            Some(_) => {
                cache.remove(name);
                None
            }
            None => None,
        }
    }

    fn remember_channel(&self, name: String, channel: Channel) {
        if let Ok(mut cache) = self.channel_cache.lock() {
            cache.insert(name, (channel, Instant::now()));
        }
    }

    async fn page_pause(&self) {
        if !self.config.page_delay.is_zero() {
            tokio::time::sleep(self.config.page_delay).await;
        }
    }

    /// GET a Web API method and unwrap the `{ok, error}` envelope.
    async fn call<T>(&self, method: &str, query: &[(&str, String)]) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(format!("{}/{}", self.config.api_base, method))
            .bearer_auth(&self.config.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|e| PlatformError::Transport {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Transport {
                method: method.to_string(),
                reason: format!("status {}: {}", status.as_u16(), truncate_chars(&body, 200)),
            });
        }

        let value: Value = response.json().await.map_err(|e| PlatformError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(PlatformError::api(method, code));
        }

        serde_json::from_value(value).map_err(|e| PlatformError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn find_channel(&self, name: &str) -> Result<Option<Channel>, PlatformError> {
        let clean = name.trim().trim_start_matches('#').trim().to_lowercase();
        if clean.is_empty() {
            warn!("Empty channel name provided");
            return Ok(None);
        }

        if let Some(channel) = self.cached_channel(&clean) {
            debug!("Found cached channel ID for #{}: {}", clean, channel.id);
            return Ok(Some(channel));
        }

        let mut cursor = String::new();
        let mut pages = 0usize;
        loop {
            pages += 1;
            let resp: ConversationsListResponse = self
                .call(
                    "conversations.list",
                    &[
                        ("types", "public_channel,private_channel".to_string()),
                        ("exclude_archived", "true".to_string()),
                        ("limit", self.config.page_size.to_string()),
                        ("cursor", cursor.clone()),
                    ],
                )
                .await?;

            debug!("Retrieved {} channels on page {}", resp.channels.len(), pages);

            if let Some(found) = resp
                .channels
                .into_iter()
                .find(|c| c.name.to_lowercase() == clean)
            {
                let channel = Channel {
                    id: found.id,
                    name: found.name,
                };
                info!("Found channel #{}: {}", clean, channel.id);
                self.remember_channel(clean, channel.clone());
                return Ok(Some(channel));
            }

            match resp.response_metadata.into_cursor() {
                Some(next) => cursor = next,
                None => break,
            }
            self.page_pause().await;
        }

        warn!("Channel #{} not found after searching {} pages", clean, pages);
        Ok(None)
    }

    async fn bot_is_member(&self, channel_id: &str) -> Result<bool, PlatformError> {
        let bot_id = self.bot_user_id().await?.to_string();

        let mut cursor = String::new();
        loop {
            let result: Result<ConversationsMembersResponse, _> = self
                .call(
                    "conversations.members",
                    &[
                        ("channel", channel_id.to_string()),
                        ("limit", self.config.page_size.to_string()),
                        ("cursor", cursor.clone()),
                    ],
                )
                .await;

            let resp = match result {
                Ok(resp) => resp,
                Err(e) if e.code().is_some_and(|c| NOT_A_MEMBER_CODES.contains(&c)) => {
                    info!("Bot is not a member of channel {}: {}", channel_id, e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };

            if resp.members.iter().any(|m| *m == bot_id) {
                debug!("Bot {} is a member of {}", bot_id, channel_id);
                return Ok(true);
            }

            match resp.response_metadata.into_cursor() {
                Some(next) => cursor = next,
                None => break,
            }
            self.page_pause().await;
        }

        info!("Bot {} not listed in members of {}", bot_id, channel_id);
        Ok(false)
    }

    async fn history_page(
        &self,
        channel_id: &str,
        oldest: MessageTs,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<HistoryPage, PlatformError> {
        let resp: ConversationsHistoryResponse = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel_id.to_string()),
                    ("oldest", oldest.to_string()),
                    ("limit", limit.clamp(1, 1000).to_string()),
                    ("cursor", cursor.unwrap_or_default().to_string()),
                ],
            )
            .await?;

        Ok(HistoryPage {
            messages: resp.messages,
            next_cursor: resp.response_metadata.into_cursor(),
        })
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, PlatformError> {
        let resp: UsersInfoResponse = self
            .call("users.info", &[("user", user_id.to_string())])
            .await?;

        Ok(UserProfile {
            display_name: resp.user.profile.display_name,
            real_name: resp.user.profile.real_name,
            name: resp.user.name,
        })
    }
}
