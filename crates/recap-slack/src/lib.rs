//! Slack adapters: the Web API client behind [`recap_types::ports::ChatPlatform`]
//! and the `response_url` poster behind [`recap_types::ports::ResponseSink`].

pub mod client;
pub mod webhook;

pub use client::{SlackClient, SlackClientConfig};
pub use webhook::WebhookClient;
