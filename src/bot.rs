use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::commands::{self, Command};
use crate::events::{DomainEvent, EventBus};
use crate::platform::{
    BotIdentity, CallbackInteraction, IncomingMessage, Transport, Update, UpdateKind,
};

/// Routes each inbound update to exactly one handling path.
///
/// Holds no per-update state, so one instance serves concurrent updates.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    events: EventBus,
    webhook_url: String,
    identity: OnceLock<BotIdentity>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, events: EventBus, webhook_url: String) -> Self {
        Self {
            transport,
            events,
            webhook_url,
            identity: OnceLock::new(),
        }
    }

    /// Fetch the bot identity and register the webhook. Must succeed before serving.
    ///
    /// Meant to run once at startup. A repeated call registers the webhook again
    /// but keeps the identity stored by the first call.
    pub async fn initialize(&self) -> Result<BotIdentity> {
        let identity = self
            .transport
            .fetch_bot_identity()
            .await
            .context("Failed to fetch bot identity")?;
        info!("Authorized as @{} ({})", identity.username, identity.id);

        self.transport
            .register_webhook(&self.webhook_url)
            .await
            .with_context(|| format!("Failed to register webhook {}", self.webhook_url))?;
        info!("Webhook registered at {}", self.webhook_url);

        if let Err(fresh) = self.identity.set(identity.clone()) {
            if let Some(stored) = self.identity.get().filter(|stored| **stored != fresh) {
                warn!(
                    "Bot identity changed from @{} to @{}, keeping @{}",
                    stored.username, fresh.username, stored.username
                );
            }
        }
        Ok(identity)
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.identity.get().map(|identity| identity.username.as_str())
    }

    /// Handle one update. Never fails: routing errors become [`DomainEvent::Error`].
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let span = info_span!("update", update_id);

        let outcome = self.route(update).instrument(span).await;
        match outcome {
            Ok(Some(event)) => {
                self.events.publish(update_id, event);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Failed to handle update {}: {:#}", update_id, e);
                self.events.publish(
                    update_id,
                    DomainEvent::Error {
                        cause: format!("{:#}", e),
                    },
                );
            }
        }
    }

    async fn route(&self, update: Update) -> Result<Option<DomainEvent>> {
        match update.kind {
            UpdateKind::Message(msg) => self.handle_message(msg).await,
            UpdateKind::Callback(callback) => Ok(Some(self.handle_callback(callback).await)),
            UpdateKind::Unsupported => {
                debug!("Ignoring unsupported update");
                Ok(None)
            }
        }
    }

    async fn handle_message(&self, msg: IncomingMessage) -> Result<Option<DomainEvent>> {
        info!(
            "Message from {} ({}) in chat {}: {}",
            msg.username.as_deref().unwrap_or("-"),
            msg.user_id,
            msg.chat_id,
            msg.text
        );

        match Command::parse(&msg.text, self.bot_username()) {
            Some(command) => self.handle_command(&msg, command).await,
            None => Ok(Some(DomainEvent::Message {
                chat_id: msg.chat_id,
                text: msg.text,
                user_id: msg.user_id,
                username: msg.username,
            })),
        }
    }

    async fn handle_command(
        &self,
        msg: &IncomingMessage,
        command: Command,
    ) -> Result<Option<DomainEvent>> {
        let chat_id = msg.chat_id;
        debug!("Dispatching command {:?}", command);

        match command {
            Command::Start => {
                self.reply(chat_id, &commands::welcome_text(self.bot_username()))
                    .await?;
                Ok(None)
            }
            Command::Help => {
                self.reply(chat_id, commands::help_text()).await?;
                Ok(None)
            }
            Command::Audit {
                contract_address: None,
            } => {
                self.reply(chat_id, commands::audit_usage_text()).await?;
                Ok(None)
            }
            Command::Audit {
                contract_address: Some(contract_address),
            } => {
                self.reply(chat_id, &commands::audit_started_text(&contract_address))
                    .await?;
                Ok(Some(DomainEvent::AuditRequest {
                    chat_id,
                    contract_address,
                }))
            }
            Command::Stats => {
                self.reply(chat_id, commands::stats_pending_text()).await?;
                Ok(Some(DomainEvent::StatsRequest {
                    chat_id,
                    user_id: msg.user_id,
                }))
            }
            Command::Settings => {
                let keyboard = commands::settings_keyboard();
                self.transport
                    .send_text(chat_id, commands::settings_text(), Some(&keyboard))
                    .await
                    .with_context(|| format!("Failed to send settings to chat {}", chat_id))?;
                Ok(None)
            }
            Command::Cancel => {
                self.reply(chat_id, commands::cancelled_text()).await?;
                Ok(None)
            }
            Command::Unknown(token) => {
                self.reply(chat_id, &commands::unknown_command_text(&token))
                    .await?;
                Ok(None)
            }
        }
    }

    /// Acknowledge first, then report. A failed acknowledgement is only logged.
    async fn handle_callback(&self, callback: CallbackInteraction) -> DomainEvent {
        info!(
            "Callback from {} in chat {}: {}",
            callback.user_id, callback.origin_chat_id, callback.payload
        );

        if let Err(e) = self
            .transport
            .acknowledge_interaction(&callback.interaction_id, None)
            .await
        {
            warn!(
                "Failed to acknowledge callback {}: {:#}",
                callback.interaction_id, e
            );
        }

        DomainEvent::Callback {
            chat_id: callback.origin_chat_id,
            data: callback.payload,
            user_id: callback.user_id,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        self.transport
            .send_text(chat_id, text, None)
            .await
            .with_context(|| format!("Failed to send reply to chat {}", chat_id))
    }
}
