use std::time::Instant;

use recap_types::api::SlashCommandForm;
use recap_types::models::{CommandInvocation, Mode};

pub const SUMMARY_COMMAND: &str = "/summary";
pub const UNREAD_COMMAND: &str = "/unread";

const UNREAD_KEYWORD: &str = "unread";

/// Mode requested by a command, or `None` when the command is not ours.
pub fn detect_mode(command: &str, text: &str) -> Option<Mode> {
    let command = command.trim();
    if command == UNREAD_COMMAND || has_unread_keyword(text) {
        Some(Mode::Unread)
    } else if command == SUMMARY_COMMAND {
        Some(Mode::Summary)
    } else {
        None
    }
}

fn has_unread_keyword(text: &str) -> bool {
    text.split_whitespace()
        .any(|word| word.eq_ignore_ascii_case(UNREAD_KEYWORD))
}

/// Channel name from the argument text.
///
/// Accepts `general`, `#general` and platform mentions (`<#C0123|general>`),
/// ignoring the `unread` keyword. Returned lowercase; `None` when nothing is left.
pub fn parse_target(text: &str) -> Option<String> {
    let word = text
        .split_whitespace()
        .find(|word| !word.eq_ignore_ascii_case(UNREAD_KEYWORD))?;

    let name = match word.strip_prefix("<#").and_then(|w| w.strip_suffix('>')) {
        Some(mention) => match mention.split_once('|') {
            Some((_, name)) if !name.trim().is_empty() => name,
            Some((id, _)) => id,
            None => mention,
        },
        None => word,
    };

    let name = name.trim().trim_start_matches('#').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Turn the platform's form into an invocation. `None` for commands we do not serve.
pub fn parse_invocation(form: SlashCommandForm, request_id: String) -> Option<CommandInvocation> {
    let mode = detect_mode(&form.command, &form.text)?;
    let target = parse_target(&form.text);

    Some(CommandInvocation {
        request_id,
        command: form.command.trim().to_string(),
        text: form.text.trim().to_string(),
        user_id: form.user_id,
        user_name: form.user_name,
        channel_id: form.channel_id,
        team_id: form.team_id,
        response_url: form.response_url,
        received_at: Instant::now(),
        mode,
        target,
    })
}
