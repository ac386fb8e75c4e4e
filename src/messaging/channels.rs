// Communication channels lock-free
// Notifications can be forwarded to another thread through a ring buffer

use crate::messaging::notification::{Notification, NotificationSink};
use ringbuf::{
    HeapRb,
    traits::{Producer, Split},
};

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Sink pushing notifications into a ring buffer
///
/// A full buffer drops the notification.
pub struct RingSink {
    producer: NotificationProducer,
    dropped: usize,
}

impl RingSink {
    pub fn new(producer: NotificationProducer) -> Self {
        Self {
            producer,
            dropped: 0,
        }
    }

    /// Number of notifications lost to a full buffer
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl NotificationSink for RingSink {
    fn deliver(&mut self, notification: &Notification) {
        if self.producer.try_push(notification.clone()).is_err() {
            self.dropped += 1;
            log::warn!(
                "Notification channel full, dropped {:?} ({} total)",
                notification,
                self.dropped
            );
        }
    }
}
