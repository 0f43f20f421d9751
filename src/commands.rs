//! Bot command parsing and the canned replies that go with them.

use crate::platform::Keyboard;

/// A parsed slash command. The name is matched case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Audit { contract_address: Option<String> },
    Stats,
    Settings,
    Cancel,
    Unknown(String),
}

impl Command {
    /// Parse a message text starting with `/`. Returns None for anything else.
    ///
    /// `bot_username` lets `/start@my_bot` resolve to `/start` in group chats.
    /// The command token ends at the first whitespace of any kind, so a newline
    /// or tab separates the argument just like a space.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        if !text.starts_with('/') {
            return None;
        }

        let (token, rest) = match text.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (text, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());

        let lowered = token.to_lowercase();
        let name = match (lowered.split_once('@'), bot_username) {
            (Some((bare, mention)), Some(own)) if mention.eq_ignore_ascii_case(own) => bare,
            _ => lowered.as_str(),
        };

        let command = match name {
            "/start" => Command::Start,
            "/help" => Command::Help,
            "/audit" => Command::Audit {
                contract_address: argument,
            },
            "/stats" => Command::Stats,
            "/settings" => Command::Settings,
            "/cancel" => Command::Cancel,
            _ => Command::Unknown(token.to_string()),
        };
        Some(command)
    }
}

pub const SETTINGS_LANGUAGE: &str = "set_lang";
pub const SETTINGS_NOTIFICATIONS: &str = "set_notif";
pub const SETTINGS_PRIVACY: &str = "set_privacy";

/// Longest slice of an unknown command echoed back to the user.
const MAX_ECHOED_COMMAND: usize = 64;

pub fn welcome_text(bot_username: Option<&str>) -> String {
    let greeting = match bot_username {
        Some(name) => format!("👋 Welcome to <b>@{}</b>!", escape_html(name)),
        None => "👋 Welcome!".to_string(),
    };
    format!(
        "{greeting}\n\n\
         I audit smart contracts for common vulnerabilities and report what I find.\n\n\
         Send /audit followed by a contract address to get started, or /help to see \
         everything I can do."
    )
}

pub fn help_text() -> &'static str {
    "<b>Available commands</b>\n\n\
     /start - Show the welcome message\n\
     /help - Show this command reference\n\
     /audit &lt;address&gt; - Audit a smart contract\n\
     /stats - Show your audit statistics\n\
     /settings - Configure language, notifications and privacy\n\
     /cancel - Cancel the current operation"
}

pub fn audit_usage_text() -> &'static str {
    "⚠️ Please provide a contract address.\n\n\
     Usage: <code>/audit &lt;contract_address&gt;</code>\n\
     Example: <code>/audit 0x1234...abcd</code>"
}

pub fn audit_started_text(contract_address: &str) -> String {
    format!(
        "🔍 Starting audit for <code>{}</code>...\n\nI'll send the report when it's ready.",
        escape_html(contract_address)
    )
}

pub fn stats_pending_text() -> &'static str {
    "📊 Fetching your statistics..."
}

pub fn settings_text() -> &'static str {
    "⚙️ <b>Settings</b>\n\nChoose what you want to configure:"
}

pub fn settings_keyboard() -> Keyboard {
    Keyboard::default()
        .with_choice("🌐 Language", SETTINGS_LANGUAGE)
        .with_choice("🔔 Notifications", SETTINGS_NOTIFICATIONS)
        .with_choice("🔒 Privacy", SETTINGS_PRIVACY)
}

pub fn cancelled_text() -> &'static str {
    "❌ Operation cancelled."
}

pub fn unknown_command_text(token: &str) -> String {
    let shown: String = token.chars().take(MAX_ECHOED_COMMAND).collect();
    format!(
        "❓ Unknown command: {}\n\nUse /help to see the available commands.",
        escape_html(&shown)
    )
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
