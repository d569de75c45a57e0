//! Fixed-capacity queues between the pipeline units, one per overflow policy.
//!
//! Each queue is a [`crossbeam::channel::bounded`] channel.  The wrapper is
//! the producer side and is cheap to clone; the consumer side is the plain
//! [`Receiver`] returned next to it.  Producers never block: a full channel is
//! handled by the wrapper's policy.  Consumers block on [`Receiver::recv`],
//! which returns an error once every producer has been dropped and the
//! channel is empty, or poll with [`Receiver::try_iter`].
//!
//! | Wrapper | On overflow |
//! |---|---|
//! | [`InboundQueue`] | Hands the item back so the caller can reject it (busy) |
//! | [`OutboundQueue`] | Drops the newest item and logs a warning |
//! | [`SampleQueue`] | Purges every buffered item, then retries the new one |

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// Inbound
// ────────────────────────────────────────────────────────────────────────────

/// Busy-reject policy: the producer gets the item back and answers for it.
pub struct InboundQueue<T> {
    tx: Sender<T>,
}

impl<T> Clone for InboundQueue<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> InboundQueue<T> {
    /// A queue holding at most `capacity` items, and its consumer.
    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Queue `item`, or hand it back when the consumer is saturated or gone.
    ///
    /// # Errors
    ///
    /// Returns the rejected item.
    pub fn offer(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => item,
            TrySendError::Disconnected(item) => {
                debug!("inbound consumer gone");
                item
            }
        })
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outbound
// ────────────────────────────────────────────────────────────────────────────

/// Drop-newest policy: an item that does not fit is discarded with a warning.
pub struct OutboundQueue<T> {
    tx: Sender<T>,
}

impl<T> Clone for OutboundQueue<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> OutboundQueue<T> {
    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Queue `item`.  Returns `false` when it was dropped.
    pub fn push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(capacity = self.tx.capacity(), "outbound queue full; dropping message");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("outbound consumer gone; dropping message");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Samples
// ────────────────────────────────────────────────────────────────────────────

/// Prefer-freshest policy: on overflow the backlog is purged and the new item
/// is queued alone.
pub struct SampleQueue<T> {
    tx: Sender<T>,
    backlog: Receiver<T>,
}

impl<T> Clone for SampleQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            backlog: self.backlog.clone(),
        }
    }
}

impl<T> SampleQueue<T> {
    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(capacity);
        let queue = Self {
            tx,
            backlog: rx.clone(),
        };
        (queue, rx)
    }

    /// Queue `item`, purging the backlog first if it does not fit.  Returns
    /// the number of purged items.
    pub fn push(&self, item: T) -> usize {
        let item = match self.tx.try_send(item) {
            Ok(()) => return 0,
            Err(TrySendError::Full(item)) => item,
            Err(TrySendError::Disconnected(_)) => return 0,
        };
        let purged = self.backlog.try_iter().count();
        warn!(purged, "sample queue full; purging");
        if self.tx.try_send(item).is_err() {
            warn!("sample queue refilled during purge; dropping sample");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn fifo_order_is_preserved() {
        let (q, rx) = OutboundQueue::bounded(3);
        for i in 0..3 {
            assert!(q.push(i));
        }
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn blocking_recv_wakes_on_offer() {
        let (q, rx) = InboundQueue::bounded(2);
        let consumer = thread::spawn(move || rx.recv().ok());
        thread::sleep(Duration::from_millis(20));
        q.offer(7).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn dropping_producers_releases_consumer_after_drain() {
        let (q, rx) = InboundQueue::bounded(2);
        q.offer(1u8).unwrap();
        let other = q.clone();
        drop(q);
        drop(other);
        assert_eq!(rx.recv().ok(), Some(1));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn offer_to_gone_consumer_hands_item_back() {
        let (q, rx) = InboundQueue::bounded(2);
        drop(rx);
        assert_eq!(q.offer("late"), Err("late"));
    }

    #[test]
    fn inbound_rejects_third_item_without_growing() {
        let (q, _rx) = InboundQueue::bounded(2);
        q.offer(1).unwrap();
        q.offer(2).unwrap();

        let start = Instant::now();
        assert_eq!(q.offer(3), Err(3));
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn outbound_drops_newest() {
        let (q, rx) = OutboundQueue::bounded(2);
        assert!(q.push("a"));
        assert!(q.push("b"));
        assert!(!q.push("c"));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(q.is_empty());
    }

    #[test]
    fn sample_overflow_purges_then_retries() {
        let (q, rx) = SampleQueue::bounded(4);
        for i in 0..4 {
            assert_eq!(q.push(i), 0);
        }
        assert_eq!(q.len(), 4);

        assert_eq!(q.push(99), 4);
        assert_eq!(q.len(), 1);
        assert_eq!(rx.try_recv().ok(), Some(99));
    }

    #[test]
    fn clones_share_the_channel() {
        let (producer, rx) = OutboundQueue::bounded(4);
        let other = producer.clone();
        producer.push(5);
        other.push(6);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![5, 6]);
    }
}
