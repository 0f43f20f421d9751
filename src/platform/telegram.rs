use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters, SetWebhookSetters};
use teloxide::requests::Requester;
use teloxide::types::{
    CallbackQuery, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, ParseMode,
};
use teloxide::Bot;
use tracing::debug;

use crate::config::TelegramConfig;
use crate::platform::{
    BotIdentity, CallbackInteraction, IncomingMessage, Keyboard, Transport, Update, UpdateKind,
};

/// Decode a webhook request body into an [`Update`].
pub fn decode_update(body: &[u8]) -> Result<Update> {
    let raw: teloxide::types::Update =
        serde_json::from_slice(body).context("Failed to decode Telegram update")?;
    Ok(raw.into())
}

impl From<teloxide::types::Update> for Update {
    fn from(raw: teloxide::types::Update) -> Self {
        let kind = match raw.kind {
            teloxide::types::UpdateKind::Message(msg) => message_kind(&msg),
            teloxide::types::UpdateKind::CallbackQuery(query) => callback_kind(query),
            _ => UpdateKind::Unsupported,
        };

        Update {
            update_id: i64::from(raw.id.0),
            kind,
        }
    }
}

/// Only text messages with a known sender are routed.
fn message_kind(msg: &Message) -> UpdateKind {
    match (msg.from.as_ref(), msg.text()) {
        (Some(user), Some(text)) => UpdateKind::Message(IncomingMessage {
            chat_id: msg.chat.id.0,
            user_id: user.id.0 as i64,
            username: user.username.clone(),
            text: text.to_string(),
        }),
        _ => UpdateKind::Unsupported,
    }
}

/// Taps on inline-mode keyboards carry no origin chat and are not routed.
fn callback_kind(query: CallbackQuery) -> UpdateKind {
    let Some(origin) = query.message.as_ref() else {
        return UpdateKind::Unsupported;
    };

    UpdateKind::Callback(CallbackInteraction {
        interaction_id: query.id.to_string(),
        origin_chat_id: origin.chat().id.0,
        user_id: query.from.id.0 as i64,
        payload: query.data.unwrap_or_default(),
    })
}

fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.choices.iter().map(|choice| {
        vec![InlineKeyboardButton::callback(
            choice.label.clone(),
            choice.payload.clone(),
        )]
    }))
}

/// Thin binding to the Telegram Bot API. Holds only the token and endpoint,
/// so one instance can be shared across concurrent updates.
pub struct TelegramClient {
    bot: Bot,
    secret_token: Option<String>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let mut builder = teloxide::net::default_reqwest_settings();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        let api_url = reqwest::Url::parse(&config.api_url)
            .with_context(|| format!("Invalid Bot API URL: {}", config.api_url))?;
        let bot = Bot::with_client(config.bot_token.clone(), client).set_api_url(api_url);

        Ok(Self {
            bot,
            secret_token: config.secret_token.clone(),
        })
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn fetch_bot_identity(&self) -> Result<BotIdentity> {
        debug!("Calling Telegram Bot API: getMe");
        let me = self.bot.get_me().await.context("getMe request failed")?;
        let username = me
            .user
            .username
            .clone()
            .context("getMe returned a bot without a username")?;
        Ok(BotIdentity {
            id: me.user.id.0 as i64,
            username,
        })
    }

    async fn register_webhook(&self, url: &str) -> Result<()> {
        debug!("Calling Telegram Bot API: setWebhook");
        let url = reqwest::Url::parse(url)
            .with_context(|| format!("Invalid webhook URL: {}", url))?;

        let mut request = self.bot.set_webhook(url);
        if let Some(secret) = &self.secret_token {
            request = request.secret_token(secret.clone());
        }
        request.await.context("setWebhook request failed")?;
        Ok(())
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("Refusing to send an empty message to chat {}", chat_id);
        }
        debug!("Calling Telegram Bot API: sendMessage");

        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_keyboard(keyboard));
        }
        request.await.context("sendMessage request failed")?;
        Ok(())
    }

    async fn acknowledge_interaction(&self, interaction_id: &str, note: Option<&str>) -> Result<()> {
        debug!("Calling Telegram Bot API: answerCallbackQuery");

        let mut request = self
            .bot
            .answer_callback_query(teloxide::types::CallbackQueryId(interaction_id.to_string()))
            .show_alert(false);
        if let Some(note) = note {
            request = request.text(note);
        }
        request.await.context("answerCallbackQuery request failed")?;
        Ok(())
    }
}
