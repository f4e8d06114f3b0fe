use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RainbotError, Result};

/// Addressable end user: the chat identifier messages are delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl RecipientId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for RecipientId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// WGS84 coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Build a location, rejecting NaN and out-of-range coordinates.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(RainbotError::InvalidLocation { lat, lng });
        }
        Ok(Self { lat, lng })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

/// Data handed to the dispatch handler when a trigger fires.
///
/// Coordinates are a snapshot taken when the schedule was set; a later
/// location update does not change them until a new time is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub recipient: RecipientId,
    pub lat: f64,
    pub lng: f64,
}

/// A recurring daily trigger at a local wall-clock time in an IANA zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Primary key: one trigger per recipient.
    pub recipient: RecipientId,
    pub hour: u8,
    pub minute: u8,
    /// IANA timezone name, e.g. `Europe/London`.
    pub timezone: String,
    pub payload: TriggerPayload,
}

impl Trigger {
    pub fn daily(
        recipient: RecipientId,
        hour: u8,
        minute: u8,
        timezone: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            recipient,
            hour,
            minute,
            timezone: timezone.into(),
            payload: TriggerPayload {
                recipient,
                lat: location.lat,
                lng: location.lng,
            },
        }
    }

    /// `HH:MM:SS` rendering of the local fire time.
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}:00", self.hour, self.minute)
    }
}

/// Today's forecast for one point. Never persisted or cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    /// WMO weather interpretation code.
    pub code: u16,
    pub description: String,
    /// Daily maximum temperature in °C.
    pub high_c: f64,
}

impl ForecastSummary {
    /// Message text sent to a recipient.
    pub fn render(&self) -> String {
        format!("{}\nMax Temp. {:.0}°C", self.description, self.high_c)
    }
}
