use async_trait::async_trait;
use rainbot_core::types::RecipientId;
use thiserror::Error;

/// Why a message could not be delivered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient blocked the bot, left, or no longer exists. Permanent.
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    /// Network trouble, rate limits, server errors. Worth trying next time.
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

/// Outbound side of a chat platform.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError>;
}
