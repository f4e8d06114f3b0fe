use std::collections::BTreeSet;

use rainbot_core::config::AlertsConfig;
use rainbot_core::types::ForecastSummary;

/// Decides whether a forecast is worth a notification.
///
/// Built once from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicy {
    codes: BTreeSet<u16>,
    always: bool,
}

impl AlertPolicy {
    pub fn new(config: &AlertsConfig) -> Self {
        Self {
            codes: config.codes.iter().copied().collect(),
            always: config.always,
        }
    }

    /// True if the condition code is in the alert set, or alerts are
    /// unconditional.
    pub fn should_alert(&self, forecast: &ForecastSummary) -> bool {
        self.always || self.codes.contains(&forecast.code)
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(&AlertsConfig::default())
    }
}
