//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};
use tracing::{debug, warn};

use rainbot_alerts::{AlertService, InboundEvent};
use rainbot_core::types::RecipientId;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Rain alerts for your location.")]
pub enum Command {
    #[command(description = "say hello")]
    Start,
    #[command(description = "how to use this bot")]
    Help,
    #[command(description = "stop the daily alert")]
    Stop,
    #[command(description = "today's forecast for your location")]
    Forecast,
    #[command(description = "what I know about you")]
    Reflection,
}

impl From<Command> for InboundEvent {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => InboundEvent::Start,
            Command::Help => InboundEvent::Help,
            Command::Stop => InboundEvent::Stop,
            Command::Forecast => InboundEvent::Forecast,
            Command::Reflection => InboundEvent::Reflection,
        }
    }
}

/// The bot's own username, for recognising `/cmd@name` in group chats.
#[derive(Clone, Debug, Default)]
pub struct BotName(pub String);

/// Classify a message by its text and shared location.
///
/// Returns `None` for messages the bot should ignore: empty ones and commands
/// addressed to a different bot. Unknown commands get the help text.
pub fn parse_event(
    text: Option<&str>,
    location: Option<(f64, f64)>,
    bot_name: &str,
) -> Option<InboundEvent> {
    if let Some((lat, lng)) = location {
        return Some(InboundEvent::Location { lat, lng });
    }

    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    if !text.starts_with('/') {
        return Some(InboundEvent::Text(text.to_string()));
    }

    match Command::parse(text, bot_name) {
        Ok(cmd) => Some(cmd.into()),
        Err(ParseError::WrongBotName(_)) => None,
        Err(_) => Some(InboundEvent::Help),
    }
}

/// Runs for every incoming `Message`: classify, hand to the service, reply.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    service: Arc<AlertService>,
    me: BotName,
) -> ResponseResult<()> {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        return Ok(());
    }

    let location = msg.location().map(|l| (l.latitude, l.longitude));
    let Some(event) = parse_event(msg.text(), location, &me.0) else {
        return Ok(());
    };

    let recipient = RecipientId(msg.chat.id.0);
    debug!(%recipient, ?event, "telegram: inbound event");
    let reply = service.handle(recipient, event).await;

    if let Err(e) = bot.send_message(msg.chat.id, reply).await {
        warn!(%recipient, error = %e, "telegram: failed to send reply");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<InboundEvent> {
        parse_event(Some(text), None, "rainbot")
    }

    #[test]
    fn commands() {
        assert_eq!(parse("/start"), Some(InboundEvent::Start));
        assert_eq!(parse("/stop"), Some(InboundEvent::Stop));
        assert_eq!(parse("/forecast"), Some(InboundEvent::Forecast));
        assert_eq!(parse("/reflection"), Some(InboundEvent::Reflection));
        assert_eq!(parse("/help"), Some(InboundEvent::Help));
    }

    #[test]
    fn command_addressed_by_name() {
        assert_eq!(parse("/stop@rainbot"), Some(InboundEvent::Stop));
        assert_eq!(parse("/stop@otherbot"), None);
    }

    #[test]
    fn unknown_command_gets_help() {
        assert_eq!(parse("/settings"), Some(InboundEvent::Help));
    }

    #[test]
    fn plain_text_is_passed_through() {
        assert_eq!(
            parse("  7:30 pm "),
            Some(InboundEvent::Text("7:30 pm".to_string()))
        );
        assert_eq!(parse("   "), None);
        assert_eq!(parse_event(None, None, "rainbot"), None);
    }

    #[test]
    fn location_wins_over_caption() {
        assert_eq!(
            parse_event(Some("here"), Some((51.5, -0.12)), "rainbot"),
            Some(InboundEvent::Location {
                lat: 51.5,
                lng: -0.12
            })
        );
    }
}
