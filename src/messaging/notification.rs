// Change notifications emitted by the dispatcher

use crate::part::PartId;
use crate::track::TrackId;

/// Batched change notification for editors and views
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Events of a part changed inside `[tick, tick + duration)`,
    /// for notes between `min_note` and `max_note`
    RangeChanged {
        part: PartId,
        tick: u32,
        duration: u32,
        min_note: i32,
        max_note: i32,
    },
    /// The placements or the length of a part changed
    LinksChanged { part: PartId },
    /// The placement list of a track changed
    TrackChanged { track: TrackId },
}

impl Notification {
    /// Part concerned by this notification, if any
    pub fn part(&self) -> Option<PartId> {
        match self {
            Self::RangeChanged { part, .. } | Self::LinksChanged { part } => Some(*part),
            Self::TrackChanged { .. } => None,
        }
    }

    /// True if the range covers `tick` and `note`
    pub fn covers(&self, tick: u32, note: i32) -> bool {
        match self {
            Self::RangeChanged {
                tick: start,
                duration,
                min_note,
                max_note,
                ..
            } => {
                tick >= *start
                    && (tick as u64) < *start as u64 + *duration as u64
                    && (*min_note..=*max_note).contains(&note)
            }
            _ => false,
        }
    }
}

/// Receiver of dispatched notifications
pub trait NotificationSink: Send {
    fn deliver(&mut self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: FnMut(&Notification) + Send,
{
    fn deliver(&mut self, notification: &Notification) {
        self(notification)
    }
}
