//! Inbound recipient commands, independent of the chat platform.
//!
//! A platform adapter turns each incoming message into an [`InboundEvent`],
//! calls [`AlertService::handle`] and sends back the returned reply.

use std::sync::Arc;

use chrono::Timelike;
use rainbot_core::types::{Location, RecipientId, Trigger};
use rainbot_scheduler::Scheduler;
use rainbot_store::Store;
use rainbot_weather::{ForecastClient, TimeZoneResolver};
use tracing::{error, info, warn};

use crate::error::{AlertError, Result};
use crate::timeparse::parse_time_of_day;

pub const GREETING: &str =
    "Give me your location! And set the time to receive notifications about upcoming rain";
pub const HELP: &str = "Share your location, then send the time you want the daily alert, \
e.g. 7:30 or 7:30 PM.\n\
/forecast - today's forecast for your location\n\
/reflection - what I know about you\n\
/stop - stop the daily alert";
pub const LOCATION_SAVED: &str = "+";
pub const NEED_LOCATION: &str = "First give me your location..";
pub const BAD_LOCATION: &str = "That location doesn't look right, try sharing it again";
pub const BAD_TIME: &str =
    "I couldn't read a time from that. Send something like 7:30, 19:30 or 7:30 PM";
pub const NO_TIMEZONE: &str =
    "Could not determine your time zone from your location. Try sharing a location on land";
pub const STOPPED: &str = "Okay, give me new alert time to resume..";
pub const NOTHING_TO_STOP: &str = "You have no alerts scheduled. Send me a time to set one";
pub const FORECAST_UNAVAILABLE: &str = "Forecast is unavailable right now, try again later";
pub const SOMETHING_WRONG: &str = "Something wrong:(";

/// One message from a recipient, already classified by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Start,
    Help,
    Stop,
    Forecast,
    Reflection,
    Location { lat: f64, lng: f64 },
    /// Anything else; interpreted as an alert time if it parses as one.
    Text(String),
}

pub struct AlertService {
    store: Arc<dyn Store>,
    scheduler: Arc<Scheduler>,
    resolver: Arc<dyn TimeZoneResolver>,
    forecast: Arc<dyn ForecastClient>,
}

impl AlertService {
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Arc<Scheduler>,
        resolver: Arc<dyn TimeZoneResolver>,
        forecast: Arc<dyn ForecastClient>,
    ) -> Self {
        Self {
            store,
            scheduler,
            resolver,
            forecast,
        }
    }

    /// Handle one event and return the reply text.
    pub async fn handle(&self, recipient: RecipientId, event: InboundEvent) -> String {
        match event {
            InboundEvent::Start => GREETING.to_string(),
            InboundEvent::Help => HELP.to_string(),
            InboundEvent::Location { lat, lng } => self.save_location(recipient, lat, lng),
            InboundEvent::Text(text) => match self.set_alert_time(recipient, &text).await {
                Ok(trigger) => format!("Alert time: {}, {}", trigger.time_label(), trigger.timezone),
                Err(e) => reply_for(recipient, &e),
            },
            InboundEvent::Stop => match self.scheduler.remove(recipient) {
                Ok(true) => STOPPED.to_string(),
                Ok(false) => NOTHING_TO_STOP.to_string(),
                Err(e) => reply_for(recipient, &AlertError::Scheduler(e)),
            },
            InboundEvent::Forecast => match self.forecast_now(recipient).await {
                Ok(text) => text,
                Err(e) => reply_for(recipient, &e),
            },
            InboundEvent::Reflection => match self.reflection(recipient) {
                Ok(text) => text,
                Err(e) => reply_for(recipient, &e),
            },
        }
    }

    fn save_location(&self, recipient: RecipientId, lat: f64, lng: f64) -> String {
        let Ok(location) = Location::new(lat, lng) else {
            return BAD_LOCATION.to_string();
        };
        match self.store.set_location(recipient, location) {
            Ok(()) => {
                info!(%recipient, "location updated");
                LOCATION_SAVED.to_string()
            }
            Err(e) => reply_for(recipient, &AlertError::Store(e)),
        }
    }

    /// Parse `text`, resolve the recipient's zone and create or replace
    /// their trigger. Nothing changes unless every step succeeds.
    ///
    /// The polygon lookup is CPU-bound and runs on the blocking pool.
    pub async fn set_alert_time(&self, recipient: RecipientId, text: &str) -> Result<Trigger> {
        let location = self
            .store
            .get_location(recipient)?
            .ok_or(AlertError::NoLocation)?;
        let time = parse_time_of_day(text)?;

        let resolver = Arc::clone(&self.resolver);
        let timezone =
            tokio::task::spawn_blocking(move || resolver.resolve(location.lat, location.lng))
                .await?
                .map_err(AlertError::Unresolved)?;

        // hour/minute come from a NaiveTime, so they always fit.
        let trigger = Trigger::daily(
            recipient,
            time.hour() as u8,
            time.minute() as u8,
            timezone,
            location,
        );
        self.scheduler.upsert(trigger.clone())?;
        Ok(trigger)
    }

    async fn forecast_now(&self, recipient: RecipientId) -> Result<String> {
        let location = self
            .store
            .get_location(recipient)?
            .ok_or(AlertError::NoLocation)?;
        let forecast = self
            .forecast
            .today(location.lat, location.lng)
            .await
            .map_err(AlertError::Forecast)?;
        Ok(forecast.render())
    }

    fn reflection(&self, recipient: RecipientId) -> Result<String> {
        let mut text = match self.store.get_location(recipient)? {
            Some(location) => format!("Your location: {location}"),
            None => "Your location: unknown".to_string(),
        };
        if let Some(trigger) = self.scheduler.get(recipient) {
            text.push_str(&format!(
                "\nAlert time: {}, {}",
                trigger.time_label(),
                trigger.timezone
            ));
        }
        Ok(text)
    }
}

fn reply_for(recipient: RecipientId, err: &AlertError) -> String {
    match err {
        AlertError::NoLocation => NEED_LOCATION.to_string(),
        AlertError::TimeParse { .. } => BAD_TIME.to_string(),
        AlertError::Unresolved(e) => {
            warn!(%recipient, error = %e, "time zone lookup failed; trigger unchanged");
            NO_TIMEZONE.to_string()
        }
        AlertError::Forecast(e) => {
            warn!(%recipient, error = %e, "on-demand forecast failed");
            FORECAST_UNAVAILABLE.to_string()
        }
        AlertError::Store(e) => {
            error!(%recipient, error = %e, "store operation failed");
            SOMETHING_WRONG.to_string()
        }
        AlertError::Scheduler(e) => {
            error!(%recipient, error = %e, "scheduler operation failed");
            SOMETHING_WRONG.to_string()
        }
        AlertError::Task(e) => {
            error!(%recipient, error = %e, "background task failed");
            SOMETHING_WRONG.to_string()
        }
    }
}
