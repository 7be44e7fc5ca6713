//! Event records, the in-memory event store and the notification channel.

mod channels;
mod store;
mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, NotificationReceiver, NotificationSender, notification_channel,
};
pub use store::{EventQuery, EventStore};
pub use types::{EventValidationError, NewEvent};

pub use integrator_sdk::objects::{EventRecord, Payload, Priority};
