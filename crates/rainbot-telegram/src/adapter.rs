//! Telegram channel adapter.
//!
//! Wraps a teloxide `Bot` + `Dispatcher` and drives the long-polling event loop.
//! Long polling, so no public URL is required.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use rainbot_alerts::AlertService;
use rainbot_core::config::TelegramConfig;

use crate::error::TelegramError;
use crate::handler::{handle_message, BotName, Command};
use crate::transport::TelegramTransport;

pub struct TelegramAdapter {
    bot: Bot,
    service: Arc<AlertService>,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig, service: Arc<AlertService>) -> Result<Self, TelegramError> {
        if config.bot_token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        Ok(Self {
            bot: Bot::new(config.bot_token.trim()),
            service,
        })
    }

    /// Outbound transport sharing this adapter's bot client.
    pub fn transport(&self) -> TelegramTransport {
        TelegramTransport::new(self.bot.clone())
    }

    /// Connect to Telegram and drive the long-polling loop until the
    /// dispatcher shuts down (it installs its own ctrl-c handler).
    pub async fn run(self) -> Result<(), TelegramError> {
        let me = self.bot.get_me().await?;
        let name = BotName(me.user.username.clone().unwrap_or_default());
        info!(bot = %name.0, "Telegram: connected");

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Telegram: failed to register command list");
        }

        info!("Telegram: starting long-polling dispatcher");
        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.service, name])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram: dispatcher stopped");
        Ok(())
    }
}
