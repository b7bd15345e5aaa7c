use std::fmt;

use recap_types::models::{DeliveryResult, Mode};
use recap_types::truncate_chars;

/// Longest piece of technical detail shown to a user.
pub const MAX_DETAIL_CHARS: usize = 100;

/// Points of the background state machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ParseTarget,
    ResolveChannel,
    VerifyMembership,
    FetchMessages,
    EnrichAuthors,
    Summarize,
    Deliver,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ParseTarget => "parse_target",
            Self::ResolveChannel => "resolve_channel",
            Self::VerifyMembership => "verify_membership",
            Self::FetchMessages => "fetch_messages",
            Self::EnrichAuthors => "enrich_authors",
            Self::Summarize => "summarize",
            Self::Deliver => "deliver",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one invocation. Every variant renders to a private reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("no channel given")]
    Usage { mode: Mode },

    #[error("channel #{channel} not found")]
    Lookup { channel: String },

    #[error("bot is not a member of #{channel}")]
    Permission { channel: String },

    #[error("{stage} failed for #{channel}: {detail}")]
    Transient {
        stage: Stage,
        channel: String,
        detail: String,
    },

    #[error("unknown command {0}")]
    UnknownCommand(String),
}

impl CommandError {
    pub fn transient(stage: Stage, channel: &str, err: impl fmt::Display) -> Self {
        Self::Transient {
            stage,
            channel: channel.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Usage { .. } | Self::UnknownCommand(_) => Stage::ParseTarget,
            Self::Lookup { .. } => Stage::ResolveChannel,
            Self::Permission { .. } => Stage::VerifyMembership,
            Self::Transient { stage, .. } => *stage,
        }
    }

    /// The invoker-only reply describing this failure.
    pub fn to_result(&self) -> DeliveryResult {
        DeliveryResult::ephemeral(self.user_text())
    }

    fn user_text(&self) -> String {
        match self {
            Self::Usage { mode } => {
                let (what, command) = match mode {
                    Mode::Summary => ("to summarize", "/summary"),
                    Mode::Unread => ("to check for unread messages", "/unread"),
                };
                format!(
                    "Please specify a channel {what}.\n\n\
                     Usage: `{command} #channel-name`\n\
                     Examples:\n\
                     • `{command} #general`\n\
                     • `{command} general`"
                )
            }
            Self::Lookup { channel } => format!(
                "I couldn't find the channel #{channel}.\n\n\
                 Please make sure:\n\
                 • The channel name is spelled correctly\n\
                 • The channel exists and is accessible\n\
                 • You have permission to view the channel"
            ),
            Self::Permission { channel } => format!(
                "I need to be added to #{channel} first.\n\n\
                 Please type `/invite @recap` in #{channel}, then try the command again."
            ),
            Self::Transient {
                stage,
                channel,
                detail,
            } => format!(
                "Failed to {} for #{channel}. Please try again in a few moments.\n\n\
                 Technical error: {}",
                stage_action(*stage),
                truncate_chars(detail, MAX_DETAIL_CHARS)
            ),
            Self::UnknownCommand(command) => format!(
                "Unknown command: {command}\n\n\
                 Available commands:\n\
                 • `/summary #channel-name` - summary of the last 24 hours\n\
                 • `/unread #channel-name` - what you missed since you last checked"
            ),
        }
    }
}

fn stage_action(stage: Stage) -> &'static str {
    match stage {
        Stage::ResolveChannel => "look up the channel",
        Stage::VerifyMembership => "check bot membership",
        Stage::FetchMessages => "fetch messages",
        Stage::EnrichAuthors => "resolve message authors",
        Stage::Summarize => "summarize messages",
        _ => "process the command",
    }
}
