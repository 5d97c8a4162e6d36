//! Alert rules and the checks between a probe value and a notification
//!
//! A rule triggers when [`evaluate`] holds for the probe value. A triggered
//! rule is then admitted or dropped by the [`AlertGate`], which combines the
//! instance allow-list, the optional alert hours window and the
//! per-(probe, channel) [`AlertTracker`].

pub mod condition;
pub mod gate;
pub mod rule;
pub mod tracker;
pub mod window;

pub use condition::evaluate;
pub use gate::{Admission, AlertGate};
pub use rule::{AlertHours, AlertRule, Operator, ERROR_CATEGORY};
pub use tracker::{AlertTracker, SendClaim};
pub use window::is_within_window;
