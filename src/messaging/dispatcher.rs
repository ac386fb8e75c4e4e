// Change dispatcher - batches dirty ranges and link changes per part
//
// Edits register the touched part here; one dispatch() per UI tick turns all
// pending registrations into a single notification per part and queue.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::notification::{Notification, NotificationSink};
use crate::part::PartId;
use crate::sequencer::note::{MAX_NOTE, MAX_TICK, MIN_NOTE};
use crate::track::TrackId;

/// Accumulated dirty area of one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRange {
    pub tick: u32,
    pub bound: u32,
    pub min_note: i32,
    pub max_note: i32,
}

impl DirtyRange {
    /// Inverted range, widened by the first merge
    pub const EMPTY: Self = Self {
        tick: MAX_TICK,
        bound: 0,
        min_note: MAX_NOTE,
        max_note: MIN_NOTE,
    };

    pub fn merge(&mut self, tick: u32, bound: u32, min_note: i32, max_note: i32) {
        self.tick = self.tick.min(tick);
        self.bound = self.bound.max(bound);
        self.min_note = self.min_note.min(min_note);
        self.max_note = self.max_note.max(max_note);
    }

    fn into_notification(self, part: PartId) -> Option<Notification> {
        (self.min_note <= self.max_note && self.tick < self.bound).then(|| {
            Notification::RangeChanged {
                part,
                tick: self.tick,
                duration: self.bound - self.tick,
                min_note: self.min_note,
                max_note: self.max_note,
            }
        })
    }
}

impl Default for DirtyRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Default)]
struct PendingQueues {
    range_order: Vec<PartId>,
    ranges: HashMap<PartId, DirtyRange>,
    links: Vec<PartId>,
    links_queued: HashSet<PartId>,
    tracks: Vec<TrackId>,
}

impl PendingQueues {
    fn is_empty(&self) -> bool {
        self.range_order.is_empty() && self.links.is_empty() && self.tracks.is_empty()
    }
}

#[derive(Default)]
struct DispatcherInner {
    pending: Mutex<PendingQueues>,
    sinks: Mutex<Vec<Box<dyn NotificationSink>>>,
}

/// Shared handle to the notification batching queues
///
/// Cloning yields another handle to the same queues.
#[derive(Clone, Default)]
pub struct ChangeDispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for ChangeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDispatcher")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, PendingQueues> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener for every future dispatch
    pub fn subscribe(&self, sink: impl NotificationSink + 'static) {
        self.inner
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(sink));
    }

    /// Widen the dirty range of a part, registering it on first touch
    pub fn queue_range(&self, part: PartId, tick: u32, bound: u32, min_note: i32, max_note: i32) {
        let mut pending = self.pending();
        if !pending.ranges.contains_key(&part) {
            pending.range_order.push(part);
        }
        pending
            .ranges
            .entry(part)
            .or_insert(DirtyRange::EMPTY)
            .merge(tick, bound, min_note, max_note);
    }

    /// Queue a links-changed notification for a part
    pub fn queue_links(&self, part: PartId) {
        let mut pending = self.pending();
        if pending.links_queued.insert(part) {
            pending.links.push(part);
        }
    }

    /// Queue a track-changed notification
    pub fn queue_track_changed(&self, track: TrackId) {
        let mut pending = self.pending();
        if !pending.tracks.contains(&track) {
            pending.tracks.push(track);
        }
    }

    /// Drop everything pending for a part that is going away
    pub fn forget_part(&self, part: PartId) {
        let mut pending = self.pending();
        if pending.ranges.remove(&part).is_some() {
            pending.range_order.retain(|&p| p != part);
        }
        if pending.links_queued.remove(&part) {
            pending.links.retain(|&p| p != part);
        }
    }

    /// Pending dirty range of a part
    pub fn pending_range(&self, part: PartId) -> Option<DirtyRange> {
        self.pending().ranges.get(&part).copied()
    }

    /// True while notifications are waiting for the next dispatch
    pub fn is_armed(&self) -> bool {
        !self.pending().is_empty()
    }

    /// Flush all queues
    ///
    /// Range notifications come first, in registration order, then link
    /// changes, then track changes. Every subscribed sink receives each
    /// notification; the full batch is also returned.
    pub fn dispatch(&self) -> Vec<Notification> {
        let queues = std::mem::take(&mut *self.pending());

        let mut batch = Vec::with_capacity(
            queues.range_order.len() + queues.links.len() + queues.tracks.len(),
        );
        for part in &queues.range_order {
            if let Some(notification) = queues
                .ranges
                .get(part)
                .and_then(|range| range.into_notification(*part))
            {
                batch.push(notification);
            }
        }
        batch.extend(
            queues
                .links
                .iter()
                .map(|&part| Notification::LinksChanged { part }),
        );
        batch.extend(
            queues
                .tracks
                .iter()
                .map(|&track| Notification::TrackChanged { track }),
        );

        if !batch.is_empty() {
            log::debug!("Dispatching {} change notifications", batch.len());
            let mut sinks = self
                .inner
                .sinks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for notification in &batch {
                for sink in sinks.iter_mut() {
                    sink.deliver(notification);
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesces_per_part() {
        let dispatcher = ChangeDispatcher::new();
        dispatcher.queue_range(1, 100, 200, 60, 60);
        dispatcher.queue_range(1, 50, 120, 72, 72);
        dispatcher.queue_range(1, 300, 301, 48, 48);
        assert!(dispatcher.is_armed());

        let batch = dispatcher.dispatch();
        assert_eq!(
            batch,
            vec![Notification::RangeChanged {
                part: 1,
                tick: 50,
                duration: 251,
                min_note: 48,
                max_note: 72,
            }]
        );
        assert!(!dispatcher.is_armed());
        assert!(dispatcher.dispatch().is_empty());
    }

    #[test]
    fn test_order_and_links() {
        let dispatcher = ChangeDispatcher::new();
        dispatcher.queue_links(2);
        dispatcher.queue_range(2, 0, 10, 1, 1);
        dispatcher.queue_range(1, 0, 10, 1, 1);
        dispatcher.queue_links(2);
        dispatcher.queue_track_changed(7);

        let batch = dispatcher.dispatch();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch[0].part(), Some(2));
        assert_eq!(batch[1].part(), Some(1));
        assert_eq!(batch[2], Notification::LinksChanged { part: 2 });
        assert_eq!(batch[3], Notification::TrackChanged { track: 7 });
    }

    #[test]
    fn test_forget_part() {
        let dispatcher = ChangeDispatcher::new();
        dispatcher.queue_range(3, 0, 10, 1, 1);
        dispatcher.queue_links(3);
        dispatcher.forget_part(3);
        assert!(!dispatcher.is_armed());
        assert!(dispatcher.dispatch().is_empty());
    }

    #[test]
    fn test_empty_note_range_is_silent() {
        let dispatcher = ChangeDispatcher::new();
        dispatcher.queue_range(1, 0, 10, MAX_NOTE, MIN_NOTE);
        assert!(dispatcher.dispatch().is_empty());
    }

    #[test]
    fn test_sinks_receive_batch() {
        let dispatcher = ChangeDispatcher::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = received.clone();
        dispatcher.subscribe(move |n: &Notification| sink_received.lock().unwrap().push(n.clone()));

        dispatcher.queue_links(4);
        dispatcher.dispatch();
        assert_eq!(
            *received.lock().unwrap(),
            vec![Notification::LinksChanged { part: 4 }]
        );
    }
}
