//! Deterministic texts that need no model: empty results, the aggregate
//! fallback used when generation is unavailable, and the report footer.

use chrono::{DateTime, Utc};
use recap_types::models::ChannelMessage;

const MAX_CONTRIBUTORS: usize = 5;
const RECENT_MESSAGES: usize = 3;
const EXCERPT_CHARS: usize = 50;

const RULE: &str = "────────────────────────────────";

pub fn no_activity(channel_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "*Summary Report for #{channel_name}*\n\n\
         *Channel Status:*\n\
         • No messages found in the last 24 hours\n\
         • Channel appears to be inactive during this period\n\n\
         {RULE}\n\
         *Report Details:* No recent activity to analyze\n\
         *Generated:* {}\n\
         {RULE}",
        stamp(now)
    )
}

pub fn all_caught_up(channel_name: &str, user: &str, now: DateTime<Utc>) -> String {
    format!(
        "*Unread Messages Summary for #{channel_name}*\n\n\
         *Current Status:*\n\
         • No unread messages\n\
         • You're all caught up with recent activity!\n\n\
         {RULE}\n\
         *Catch-up Report:* No unread messages to analyze\n\
         *Personalized for:* @{user}\n\
         *Generated:* {}\n\
         {RULE}",
        stamp(now)
    )
}

/// Counts and a short excerpt, built when the model cannot be used.
pub fn aggregate(
    messages: &[ChannelMessage],
    channel_name: &str,
    invoker: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let authors = distinct_authors(messages);
    let mut contributors = authors
        .iter()
        .take(MAX_CONTRIBUTORS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > MAX_CONTRIBUTORS {
        contributors.push_str("...");
    }

    let count = messages.len();
    let (header, count_line, people_line) = match invoker {
        Some(_) => (
            format!("*Unread Messages Summary for #{channel_name}*\n\n*What You Missed:*"),
            format!("• {count} new messages since you were last active"),
            format!("• {} team members were active", authors.len()),
        ),
        None => (
            format!("*Summary Report for #{channel_name}*\n\n*Activity Overview:*"),
            format!("• {count} messages exchanged in the last 24 hours"),
            format!("• {} team members participated", authors.len()),
        ),
    };

    format!(
        "{header}\n{count_line}\n{people_line}\n• Contributors: {contributors}\n\n\
         *Recent Activity:*\n{}\n\n\
         *Note:* AI summarization temporarily unavailable - showing basic activity\n\n{}",
        recent_excerpt(messages),
        footer(count, invoker, now)
    )
}

/// Closing block appended to every generated report.
pub fn footer(message_count: usize, invoker: Option<&str>, now: DateTime<Utc>) -> String {
    match invoker {
        Some(user) => format!(
            "{RULE}\n*Catch-up Report:* {message_count} unread messages analyzed\n\
             *Personalized for:* @{user}\n*Generated:* {}\n{RULE}",
            stamp(now)
        ),
        None => format!(
            "{RULE}\n*Report Details:* {message_count} messages analyzed | Last 24 hours\n\
             *Generated:* {}\n{RULE}",
            stamp(now)
        ),
    }
}

fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Author names in first-seen order.
fn distinct_authors(messages: &[ChannelMessage]) -> Vec<String> {
    let mut seen = Vec::new();
    for m in messages {
        if !seen.contains(&m.author_name) {
            seen.push(m.author_name.clone());
        }
    }
    seen
}

fn recent_excerpt(messages: &[ChannelMessage]) -> String {
    if messages.is_empty() {
        return "• No recent messages to display".to_string();
    }

    let start = messages.len().saturating_sub(RECENT_MESSAGES);
    messages[start..]
        .iter()
        .map(|m| {
            let mut text: String = m.text.chars().take(EXCERPT_CHARS).collect();
            if m.text.chars().count() > EXCERPT_CHARS {
                text.push_str("...");
            }
            format!(
                "• [{}] @{}: {}",
                m.ts.to_datetime().format("%H:%M"),
                m.author_name,
                text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
