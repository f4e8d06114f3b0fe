//! Coordinates → IANA time zone name.
//!
//! Resolution is exact point-in-polygon first. If the point falls outside
//! every zone polygon, nearby points on rings of growing radius are probed
//! and the first hit wins. If nothing is found the result is
//! [`WeatherError::Unresolved`]; there is no silent UTC fallback.

use chrono_tz::Tz;
use tracing::{debug, warn};
use tzf_rs::DefaultFinder;

use crate::error::{Result, WeatherError};

/// Probe radii in degrees for the nearest-zone fallback.
const NEAREST_RADII: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 4.0];
/// Compass bearings probed on each ring.
const BEARINGS: usize = 8;

pub trait TimeZoneResolver: Send + Sync {
    fn resolve(&self, lat: f64, lng: f64) -> Result<String>;
}

/// Exact point lookup. Returns `None` when no zone polygon contains the point.
pub trait PointLookup: Send + Sync {
    fn zone_at(&self, lat: f64, lng: f64) -> Option<String>;
}

/// Polygon lookup backed by the `tzf-rs` embedded dataset.
pub struct TzfLookup {
    finder: DefaultFinder,
}

impl TzfLookup {
    /// Loads the embedded polygon data; takes a moment, build once.
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }
}

impl Default for TzfLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl PointLookup for TzfLookup {
    fn zone_at(&self, lat: f64, lng: f64) -> Option<String> {
        let name = self.finder.get_tz_name(lng, lat);
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// [`TimeZoneResolver`] with exact lookup and nearest-zone fallback.
pub struct ZoneResolver<L: PointLookup = TzfLookup> {
    lookup: L,
}

impl ZoneResolver<TzfLookup> {
    pub fn tzf() -> Self {
        Self::new(TzfLookup::new())
    }
}

impl<L: PointLookup> ZoneResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    fn nearest(&self, lat: f64, lng: f64) -> Option<String> {
        for radius in NEAREST_RADII {
            for i in 0..BEARINGS {
                let angle = (i as f64) * std::f64::consts::TAU / BEARINGS as f64;
                let plat = (lat + radius * angle.sin()).clamp(-90.0, 90.0);
                let plng = wrap_lng(lng + radius * angle.cos());
                if let Some(name) = self.lookup.zone_at(plat, plng) {
                    debug!(lat, lng, radius, zone = %name, "nearest zone fallback");
                    return Some(name);
                }
            }
        }
        None
    }
}

impl<L: PointLookup> TimeZoneResolver for ZoneResolver<L> {
    fn resolve(&self, lat: f64, lng: f64) -> Result<String> {
        let in_range = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !in_range {
            return Err(WeatherError::Unresolved { lat, lng });
        }

        let name = self
            .lookup
            .zone_at(lat, lng)
            .or_else(|| self.nearest(lat, lng))
            .ok_or(WeatherError::Unresolved { lat, lng })?;

        // The scheduler needs a zone chrono-tz knows about.
        if name.parse::<Tz>().is_err() {
            warn!(lat, lng, zone = %name, "lookup returned an unknown zone name");
            return Err(WeatherError::Unresolved { lat, lng });
        }
        Ok(name)
    }
}

fn wrap_lng(lng: f64) -> f64 {
    if lng > 180.0 {
        lng - 360.0
    } else if lng < -180.0 {
        lng + 360.0
    } else {
        lng
    }
}
