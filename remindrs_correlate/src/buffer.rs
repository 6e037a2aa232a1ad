//! Per-user single-slot correlation buffer.
//!
//! The buffer holds at most one unconsumed message per user. It is a plain
//! data structure with single-threaded semantics; the [`Correlator`] guards
//! it with a mutex and never yields inside a buffer transition.
//!
//! [`Correlator`]: crate::correlator::Correlator

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// An inbound text message before correlation.
#[derive(Debug, Clone)]
pub struct Arrival<O> {
    /// Buffer key; messages of different users never interact.
    pub user_id: i64,
    /// Raw text or caption.
    pub content: String,
    /// Provenance flag; only opposite-provenance messages pair.
    pub is_forwarded: bool,
    /// Display name of the original author, when forwarded.
    pub forward_author: Option<String>,
    /// Transport reply context, carried through to the sink.
    pub origin: O,
}

/// A buffered arrival waiting for its counterpart.
#[derive(Debug)]
pub struct BufferedMessage<O> {
    pub user_id: i64,
    pub content: String,
    pub is_forwarded: bool,
    pub forward_author: Option<String>,
    /// Monotonic arrival timestamp; drives pairing-window eligibility and
    /// garbage collection.
    pub enqueued_at: Instant,
    pub origin: O,
    /// Set true exactly once when a pairing match claims this entry.
    consumed: bool,
    /// Identity token; the deferred check refuses entries it did not
    /// schedule.
    seq: u64,
}

impl<O> BufferedMessage<O> {
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed
    }

    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

/// Mapping from user id to the single live entry for that user.
#[derive(Debug)]
pub struct CorrelationBuffer<O> {
    slots: HashMap<i64, BufferedMessage<O>>,
    next_seq: u64,
}

impl<O> Default for CorrelationBuffer<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> CorrelationBuffer<O> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Store an arrival, overwriting any prior entry for the user, and
    /// return the identity token of the new entry.
    pub fn put(&mut self, arrival: Arrival<O>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(
            arrival.user_id,
            BufferedMessage {
                user_id: arrival.user_id,
                content: arrival.content,
                is_forwarded: arrival.is_forwarded,
                forward_author: arrival.forward_author,
                enqueued_at: Instant::now(),
                origin: arrival.origin,
                consumed: false,
                seq,
            },
        );
        seq
    }

    /// Current entry for the user, without removing it.
    #[must_use]
    pub fn peek(&self, user_id: i64) -> Option<&BufferedMessage<O>> {
        self.slots.get(&user_id)
    }

    /// Return-and-remove the current entry for the user.
    pub fn take(&mut self, user_id: i64) -> Option<BufferedMessage<O>> {
        self.slots.remove(&user_id)
    }

    /// Remove and return the entry only if it is still the one identified by
    /// `seq` and has not been consumed. The deferred solo check's guarded
    /// take: a pair match or a later arrival makes it a no-op.
    pub fn take_if(&mut self, user_id: i64, seq: u64) -> Option<BufferedMessage<O>> {
        match self.slots.get(&user_id) {
            Some(entry) if entry.seq == seq && !entry.consumed => self.slots.remove(&user_id),
            _ => None,
        }
    }

    /// Flag the current entry as claimed, if present and unconsumed.
    /// Returns whether the flag was newly set; `false` means a competing
    /// path already owns the entry (or there is none). Whichever path sets
    /// the flag is responsible for removing the entry.
    pub fn mark_consumed(&mut self, user_id: i64) -> bool {
        match self.slots.get_mut(&user_id) {
            Some(entry) if !entry.consumed => {
                entry.consumed = true;
                true
            }
            _ => false,
        }
    }

    /// Drop every entry older than `max_age`, consumed or not. Reclaims
    /// entries orphaned by a failed resolution path.
    pub fn sweep(&mut self, max_age: Duration) {
        self.slots
            .retain(|_, entry| entry.enqueued_at.elapsed() <= max_age);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn arrival(user_id: i64, content: &str, is_forwarded: bool) -> Arrival<u32> {
        Arrival {
            user_id,
            content: content.to_string(),
            is_forwarded,
            forward_author: None,
            origin: 0,
        }
    }

    #[tokio::test]
    async fn put_overwrites_single_slot() {
        let mut buf = CorrelationBuffer::new();
        buf.put(arrival(1, "first", false));
        buf.put(arrival(1, "second", false));

        assert_eq!(buf.len(), 1);
        assert_eq!(buf.peek(1).unwrap().content, "second");
    }

    #[tokio::test]
    async fn take_if_rejects_superseded_seq() {
        let mut buf = CorrelationBuffer::new();
        let old_seq = buf.put(arrival(1, "first", false));
        let new_seq = buf.put(arrival(1, "second", false));

        assert!(buf.take_if(1, old_seq).is_none());
        assert_eq!(buf.take_if(1, new_seq).unwrap().content, "second");
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn mark_consumed_is_exactly_once() {
        let mut buf = CorrelationBuffer::new();
        buf.put(arrival(1, "msg", false));

        assert!(buf.mark_consumed(1));
        assert!(!buf.mark_consumed(1));
        assert!(!buf.mark_consumed(2));
    }

    #[tokio::test]
    async fn take_if_refuses_consumed_entries() {
        let mut buf = CorrelationBuffer::new();
        let seq = buf.put(arrival(1, "msg", false));
        assert!(buf.mark_consumed(1));

        assert!(buf.take_if(1, seq).is_none());
        // The consuming path still removes it with a plain take.
        assert!(buf.take(1).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_old_entries_including_consumed_orphans() {
        let mut buf = CorrelationBuffer::new();
        buf.put(arrival(1, "stale", false));
        buf.mark_consumed(1);
        tokio::time::advance(Duration::from_secs(61)).await;
        buf.put(arrival(2, "fresh", false));

        buf.sweep(Duration::from_secs(60));

        assert!(buf.peek(1).is_none());
        assert!(buf.peek(2).is_some());
    }

    /// Concurrent claim of the same entry: exactly one caller wins.
    #[tokio::test]
    async fn concurrent_mark_consumed_has_one_winner() {
        let buf = Arc::new(Mutex::new(CorrelationBuffer::new()));
        buf.lock().unwrap().put(arrival(1, "msg", false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let buf = Arc::clone(&buf);
            handles.push(tokio::spawn(async move {
                buf.lock().unwrap().mark_consumed(1)
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
