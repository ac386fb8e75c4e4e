// Messaging - change notifications from the event store to editors

pub mod channels;
pub mod dispatcher;
pub mod notification;

pub use channels::{NotificationConsumer, NotificationProducer, RingSink, create_notification_channel};
pub use dispatcher::{ChangeDispatcher, DirtyRange};
pub use notification::{Notification, NotificationSink};
