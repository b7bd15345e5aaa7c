pub mod fallback;
pub mod gemini;
pub mod prompt;

pub use gemini::{GeminiClient, GeminiConfig, SummarizerError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use recap_types::models::ChannelMessage;
use recap_types::ports::Summarizer;

/// Summarizer backed by Gemini, degrading to the aggregate fallback.
///
/// Built without a client (no API key configured) it only ever produces
/// the fallback text.
pub struct GeminiSummarizer {
    client: Option<GeminiClient>,
}

impl GeminiSummarizer {
    pub fn new(client: Option<GeminiClient>) -> Self {
        if client.is_none() {
            warn!("No Gemini API key configured, summaries will use basic activity reports");
        }
        Self { client }
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(
        &self,
        messages: &[ChannelMessage],
        channel_name: &str,
        invoker: Option<&str>,
    ) -> String {
        let now = Utc::now();

        if messages.is_empty() {
            return match invoker {
                Some(user) => fallback::all_caught_up(channel_name, user, now),
                None => fallback::no_activity(channel_name, now),
            };
        }

        let Some(client) = &self.client else {
            return fallback::aggregate(messages, channel_name, invoker, now);
        };

        let prompt = match invoker {
            Some(user) => prompt::unread_prompt(messages, channel_name, user),
            None => prompt::summary_prompt(messages, channel_name),
        };

        info!("Sending {} messages from #{} to Gemini", messages.len(), channel_name);

        match client.generate(&prompt).await {
            Ok(summary) => {
                let header = match invoker {
                    Some(_) => String::new(),
                    None => format!("*Summary Report for #{channel_name}*\n\n"),
                };
                format!(
                    "{header}{summary}\n\n{}",
                    fallback::footer(messages.len(), invoker, now)
                )
            }
            Err(e) => {
                error!("Gemini summarization failed: {}", e);
                fallback::aggregate(messages, channel_name, invoker, now)
            }
        }
    }
}
