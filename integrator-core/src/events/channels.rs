//! Channel between the broker and the background notifier.

use integrator_sdk::objects::EventRecord;
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// Large enough to absorb bursts while keeping memory bounded. When the
/// buffer is full the broker drops the notification instead of waiting.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for appended event records.
pub type NotificationSender = mpsc::Sender<EventRecord>;
/// Receiver handle for appended event records.
pub type NotificationReceiver = mpsc::Receiver<EventRecord>;

/// Create a new notification channel.
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
