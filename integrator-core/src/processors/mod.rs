//! Background processors owned by the broker lifecycle, and the trigger
//! actions the broker runs after each cascade.

pub mod notifier;
pub mod triggers;
