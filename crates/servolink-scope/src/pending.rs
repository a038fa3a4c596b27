use std::collections::VecDeque;
use std::time::Duration;

/// What an outstanding request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    /// Telemetry read, stamped when it was sent.
    Telemetry { sent_at: Duration },
    /// Sentinel read; its reply marks a known point in the request stream.
    Sentinel,
}

/// An outstanding request in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    /// Position in the request sequence since acquisition started.
    pub slot: u64,
    pub kind: PendingKind,
}

/// A telemetry request paired with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matched {
    pub slot: u64,
    pub sent_at: Duration,
    /// Ignored sentinels dropped from the head to reach this request.
    pub sentinels_skipped: usize,
}

/// FIFO of requests that have been sent and not yet answered.
///
/// Replies are matched strictly in order. When the controller silently
/// ignores a request, the queue runs ahead of the replies until the next
/// sentinel reply shows how far: every telemetry entry still in front of
/// that sentinel is stale.
#[derive(Debug)]
pub struct PendingQueue {
    entries: VecDeque<PendingRequest>,
    next_slot: u64,
    capacity: usize,
    overflowed: u64,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_slot: 0,
            capacity: capacity.max(1),
            overflowed: 0,
        }
    }

    pub fn push_telemetry(&mut self, sent_at: Duration) -> u64 {
        self.push(PendingKind::Telemetry { sent_at })
    }

    pub fn push_sentinel(&mut self) -> u64 {
        self.push(PendingKind::Sentinel)
    }

    fn push(&mut self, kind: PendingKind) -> u64 {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.overflowed += 1;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.push_back(PendingRequest { slot, kind });
        slot
    }

    /// Match a telemetry reply to the oldest telemetry request.
    ///
    /// Sentinels found at the head were themselves ignored by the controller
    /// and are dropped on the way.
    pub fn pop_telemetry(&mut self) -> Option<Matched> {
        let mut sentinels_skipped = 0;
        while let Some(entry) = self.entries.pop_front() {
            match entry.kind {
                PendingKind::Telemetry { sent_at } => {
                    return Some(Matched {
                        slot: entry.slot,
                        sent_at,
                        sentinels_skipped,
                    })
                }
                PendingKind::Sentinel => sentinels_skipped += 1,
            }
        }
        None
    }

    /// Realign on a sentinel reply.
    ///
    /// Removes the oldest sentinel and every telemetry request queued before
    /// it, returning how many telemetry requests were discarded. `None` when
    /// no sentinel is outstanding; the queue is left untouched.
    pub fn resync(&mut self) -> Option<usize> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.kind == PendingKind::Sentinel)?;
        self.entries.drain(..=position);
        Some(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn front(&self) -> Option<&PendingRequest> {
        self.entries.front()
    }

    /// Requests dropped because the queue was full.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Empty the queue and restart slot numbering.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_slot = 0;
        self.overflowed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn telemetry_pops_in_send_order() {
        let mut queue = PendingQueue::new(16);
        queue.push_telemetry(ms(1));
        queue.push_telemetry(ms(2));

        let first = queue.pop_telemetry().unwrap();
        assert_eq!((first.slot, first.sent_at, first.sentinels_skipped), (0, ms(1), 0));
        assert_eq!(queue.pop_telemetry().unwrap().sent_at, ms(2));
        assert!(queue.pop_telemetry().is_none());
    }

    #[test]
    fn resync_discards_requests_ahead_of_sentinel() {
        let mut queue = PendingQueue::new(16);
        for n in 0..5 {
            queue.push_telemetry(ms(n));
        }
        queue.push_sentinel();
        queue.push_telemetry(ms(10));

        // Two replies arrived; the other three requests were ignored.
        queue.pop_telemetry();
        queue.pop_telemetry();
        assert_eq!(queue.resync(), Some(3));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_telemetry().unwrap().sent_at, ms(10));
    }

    #[test]
    fn resync_in_step_discards_nothing() {
        let mut queue = PendingQueue::new(16);
        queue.push_telemetry(ms(0));
        queue.push_sentinel();
        queue.pop_telemetry();
        assert_eq!(queue.resync(), Some(0));
        assert!(queue.is_empty());
    }

    #[test]
    fn resync_without_sentinel_is_a_no_op() {
        let mut queue = PendingQueue::new(16);
        queue.push_telemetry(ms(0));
        assert_eq!(queue.resync(), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn ignored_sentinel_is_skipped_by_telemetry() {
        let mut queue = PendingQueue::new(16);
        queue.push_sentinel();
        queue.push_telemetry(ms(7));
        let matched = queue.pop_telemetry().unwrap();
        assert_eq!((matched.slot, matched.sentinels_skipped), (1, 1));
    }

    #[test]
    fn full_queue_drops_oldest() {
        let mut queue = PendingQueue::new(2);
        queue.push_telemetry(ms(0));
        queue.push_telemetry(ms(1));
        queue.push_telemetry(ms(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.overflowed(), 1);
        assert_eq!(queue.front().map(|e| e.slot), Some(1));

        queue.clear();
        assert_eq!(queue.push_sentinel(), 0);
    }
}
