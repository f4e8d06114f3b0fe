//! Collaborator fakes shared by this crate's tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rainbot_core::types::{ForecastSummary, RecipientId};
use rainbot_scheduler::{Fire, Scheduler};
use rainbot_store::MemoryStore;
use rainbot_weather::{ForecastClient, TimeZoneResolver, WeatherError};
use tokio::sync::mpsc;

use crate::transport::{DeliveryError, Transport};

/// Returns `code` for every lookup, or fails when `None`.
pub struct FakeForecast {
    pub code: Option<u16>,
    pub calls: AtomicUsize,
}

impl FakeForecast {
    pub fn new(code: Option<u16>) -> Self {
        Self {
            code,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastClient for FakeForecast {
    async fn today(&self, _lat: f64, _lng: f64) -> rainbot_weather::Result<ForecastSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let code = self.code.ok_or(WeatherError::EmptyForecast)?;
        Ok(ForecastSummary {
            code,
            description: rainbot_weather::wmo::describe(code).to_string(),
            high_c: 14.0,
        })
    }
}

/// Resolves every point to the same zone, or to nothing.
pub struct FakeResolver(pub Option<&'static str>);

impl TimeZoneResolver for FakeResolver {
    fn resolve(&self, lat: f64, lng: f64) -> rainbot_weather::Result<String> {
        self.0
            .map(str::to_string)
            .ok_or(WeatherError::Unresolved { lat, lng })
    }
}

/// Records sends; optionally fails every one with `fail`.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(RecipientId, String)>>,
    pub fail: Option<DeliveryError>,
}

impl RecordingTransport {
    pub fn failing(err: DeliveryError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: Some(err),
        }
    }

    pub fn sent(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, recipient: RecipientId, text: &str) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient, text.to_string()));
        match &self.fail {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

pub fn scheduler() -> (Arc<Scheduler>, mpsc::Receiver<Fire>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let (tx, rx) = mpsc::channel(16);
    let scheduler = Arc::new(Scheduler::new(store.clone(), tx, Duration::from_millis(10)));
    (scheduler, rx, store)
}
