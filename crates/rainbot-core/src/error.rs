use thiserror::Error;

#[derive(Debug, Error)]
pub enum RainbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid location: lat={lat}, lng={lng}")]
    InvalidLocation { lat: f64, lng: f64 },
}

impl RainbotError {
    /// Short error code string used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            RainbotError::Config(_) => "CONFIG_ERROR",
            RainbotError::InvalidLocation { .. } => "INVALID_LOCATION",
        }
    }
}

pub type Result<T> = std::result::Result<T, RainbotError>;
