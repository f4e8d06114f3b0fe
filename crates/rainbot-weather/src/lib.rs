//! Weather lookups and time zone resolution for recipient coordinates.

pub mod error;
pub mod forecast;
pub mod timezone;
pub mod wmo;

pub use error::{Result, WeatherError};
pub use forecast::{ForecastClient, OpenMeteoClient};
pub use timezone::{PointLookup, TimeZoneResolver, TzfLookup, ZoneResolver};
