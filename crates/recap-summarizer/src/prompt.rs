use recap_types::models::ChannelMessage;

/// `[HH:MM] @name: text` per message, UTC. Blank messages are left out.
pub fn conversation_lines(messages: &[ChannelMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| {
            format!(
                "[{}] @{}: {}",
                m.ts.to_datetime().format("%H:%M"),
                m.author_name,
                m.text
            )
        })
        .collect()
}

pub fn summary_prompt(messages: &[ChannelMessage], channel_name: &str) -> String {
    let conversation = conversation_lines(messages).join("\n");
    format!(
        "Summarize the following conversation from the #{channel} channel.

CONVERSATION:
{conversation}

FORMAT:
- Slack mrkdwn only: *bold* section headers, one point per line starting with a bullet (•)
- Sections: *Key Topics*, *Decisions & Action Items*, *Open Questions*, *Most Active Contributors*, and *Urgent Items* only when there are any
- Concise and business appropriate

CONTEXT:
- Channel: #{channel}
- Messages: {count}
- Period: last 24 hours",
        channel = channel_name,
        conversation = conversation,
        count = messages.len(),
    )
}

pub fn unread_prompt(messages: &[ChannelMessage], channel_name: &str, user: &str) -> String {
    let conversation = conversation_lines(messages).join("\n");
    format!(
        "Summarize the following UNREAD messages from #{channel} for @{user}, who is catching up after being away.

UNREAD CONVERSATION:
{conversation}

FORMAT:
- Slack mrkdwn only: *bold* section headers, one point per line starting with a bullet (•)
- Start with the header *Unread Messages Summary for #{channel}*
- Sections: *What You Missed*, *Mentions & Responses*, *Action Items & Decisions*, *Questions Needing Attention*, *Current Discussion Status*, and *Urgent Items* only when there are any
- Focus on what affects @{user}

CONTEXT:
- Channel: #{channel}
- Unread messages: {count}
- Reader: @{user}",
        channel = channel_name,
        user = user,
        conversation = conversation,
        count = messages.len(),
    )
}
