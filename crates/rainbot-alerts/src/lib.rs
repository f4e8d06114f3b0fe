//! Alert logic: when to notify, what to say, and how recipients drive it.
//!
//! - [`timeparse`]: free-form text → local time of day
//! - [`policy`]: forecast → notify or not
//! - [`dispatch`]: the trigger fire handler
//! - [`service`]: inbound recipient commands
//! - [`transport`]: outbound delivery seam implemented per chat platform

pub mod dispatch;
pub mod error;
pub mod policy;
pub mod service;
pub mod timeparse;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{Dispatcher, FireOutcome};
pub use error::{AlertError, Result};
pub use policy::AlertPolicy;
pub use service::{AlertService, InboundEvent};
pub use timeparse::parse_time_of_day;
pub use transport::{DeliveryError, Transport};
