//! Trigger fire handler.
//!
//! For each fire: fetch today's forecast for the trigger's snapshot
//! coordinates, ask the policy, deliver if warranted. A recipient that has
//! become unreachable loses its trigger; every other failure only costs this
//! one fire.

use std::sync::Arc;

use rainbot_core::types::TriggerPayload;
use rainbot_scheduler::{Fire, Scheduler};
use rainbot_weather::ForecastClient;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::policy::AlertPolicy;
use crate::transport::{DeliveryError, Transport};

/// What a single fire ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Forecast lookup failed; the next scheduled fire tries again.
    Skipped,
    /// Forecast did not warrant an alert.
    Quiet,
    Delivered,
    /// Recipient unreachable; trigger removed.
    Deregistered,
    /// Delivery failed (transiently, or removal failed); trigger kept.
    DeliveryFailed,
}

pub struct Dispatcher {
    forecast: Arc<dyn ForecastClient>,
    policy: AlertPolicy,
    transport: Arc<dyn Transport>,
    scheduler: Arc<Scheduler>,
}

impl Dispatcher {
    pub fn new(
        forecast: Arc<dyn ForecastClient>,
        policy: AlertPolicy,
        transport: Arc<dyn Transport>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            forecast,
            policy,
            transport,
            scheduler,
        }
    }

    /// Handle one fire. Never fails; the outcome is for logging and tests.
    pub async fn fire(&self, payload: TriggerPayload) -> FireOutcome {
        let recipient = payload.recipient;

        let forecast = match self.forecast.today(payload.lat, payload.lng).await {
            Ok(f) => f,
            Err(e) => {
                warn!(%recipient, error = %e, "forecast lookup failed; skipping this fire");
                return FireOutcome::Skipped;
            }
        };

        if !self.policy.should_alert(&forecast) {
            debug!(%recipient, code = forecast.code, "no alert needed");
            return FireOutcome::Quiet;
        }

        match self.transport.send(recipient, &forecast.render()).await {
            Ok(()) => {
                info!(%recipient, code = forecast.code, "alert delivered");
                FireOutcome::Delivered
            }
            Err(DeliveryError::Unreachable(reason)) => {
                warn!(%recipient, %reason, "recipient unreachable; removing trigger");
                match self.scheduler.remove(recipient) {
                    Ok(_) => FireOutcome::Deregistered,
                    Err(e) => {
                        error!(%recipient, error = %e, "failed to remove trigger for unreachable recipient");
                        FireOutcome::DeliveryFailed
                    }
                }
            }
            Err(DeliveryError::Transient(reason)) => {
                warn!(%recipient, %reason, "alert delivery failed; keeping trigger");
                FireOutcome::DeliveryFailed
            }
        }
    }

    /// Drain fired triggers, running each in its own task so one slow or
    /// failing recipient never holds up another.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Fire>) {
        info!("dispatch loop started");
        while let Some(fire) = rx.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                let outcome = dispatcher.fire(fire.trigger.payload).await;
                debug!(recipient = %fire.trigger.recipient, ?outcome, "fire handled");
            });
        }
        info!("dispatch loop exiting (channel closed)");
    }
}
