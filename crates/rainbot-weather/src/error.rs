/// Errors produced by the forecast client and the time zone resolver.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("forecast request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("forecast service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode forecast response: {0}")]
    Decode(String),

    #[error("forecast response contained no entry for today")]
    EmptyForecast,

    #[error("no time zone found for lat={lat}, lng={lng}")]
    Unresolved { lat: f64, lng: f64 },
}

pub type Result<T> = std::result::Result<T, WeatherError>;
