//! Outbound alert delivery over the Bot API.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

use rainbot_alerts::{DeliveryError, Transport};
use rainbot_core::types::RecipientId;

/// [`Transport`] that sends plain-text messages to a chat id.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
        self.bot
            .send_message(ChatId(recipient.get()), text)
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

/// Map a Bot API failure onto the permanent/transient split.
///
/// Only errors that say the chat is gone for good count as unreachable.
pub fn classify(err: &RequestError) -> DeliveryError {
    match err {
        RequestError::Api(api) if is_permanent(api) => DeliveryError::Unreachable(api.to_string()),
        other => DeliveryError::Transient(other.to_string()),
    }
}

fn is_permanent(err: &ApiError) -> bool {
    matches!(
        err,
        ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
            | ApiError::ChatNotFound
            | ApiError::UserNotFound
    )
}
