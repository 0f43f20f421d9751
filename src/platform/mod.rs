pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// One inbound event from the platform, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

/// What an update carries. Anything the bot does not act on is `Unsupported`.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(IncomingMessage),
    Callback(CallbackInteraction),
    Unsupported,
}

/// A text message received in a chat
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    /// Raw message text, possibly empty or whitespace
    pub text: String,
}

/// A tap on an inline keyboard choice
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackInteraction {
    /// Opaque token needed to acknowledge the tap
    pub interaction_id: String,
    pub origin_chat_id: i64,
    pub user_id: i64,
    /// Payload the bot attached to the choice when it sent the keyboard
    pub payload: String,
}

/// Labeled choices attached to an outgoing message, one per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Keyboard {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub label: String,
    pub payload: String,
}

impl Keyboard {
    pub fn with_choice(mut self, label: impl Into<String>, payload: impl Into<String>) -> Self {
        self.choices.push(Choice {
            label: label.into(),
            payload: payload.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}

/// Outbound operations against the messaging platform.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_bot_identity(&self) -> Result<BotIdentity>;

    /// Safe to repeat with the same URL.
    async fn register_webhook(&self, url: &str) -> Result<()>;

    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>)
        -> Result<()>;

    async fn acknowledge_interaction(&self, interaction_id: &str, note: Option<&str>)
        -> Result<()>;
}
