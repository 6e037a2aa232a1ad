//! The pairing resolver.
//!
//! Per-user state machine driven by message arrivals: `EMPTY` (no buffered
//! message) -> `WAITING` (one message buffered, solo check pending) ->
//! `EMPTY` (resolved by pair-merge or solo timeout). Every buffer
//! transition happens inside one mutex critical section with no await
//! point, which is the per-user serialization the exactly-once guarantee
//! rests on; sink calls always run outside the lock.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::buffer::{Arrival, BufferedMessage, CorrelationBuffer};
use crate::debounce;

/// Timing knobs for the resolver.
#[derive(Debug, Clone, Copy)]
pub struct CorrelatorConfig {
    /// How long a buffered message stays eligible for pairing.
    pub link_timeout: Duration,
    /// How long an unpaired message waits before solo processing. Must be
    /// shorter than `link_timeout`.
    pub solo_wait: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            link_timeout: Duration::from_secs(30),
            solo_wait: Duration::from_secs(15),
        }
    }
}

/// Resolved correlation output handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelatedMessage<O> {
    /// A plain message with no partner.
    Plain { text: String, origin: O },
    /// A forwarded message with no explanation.
    Forwarded {
        text: String,
        author: Option<String>,
        origin: O,
    },
    /// An explanation merged with its forwarded counterpart. `origin` is
    /// the explanation side's reply context.
    Paired {
        explanation: String,
        forwarded_text: String,
        forward_author: Option<String>,
        origin: O,
    },
}

/// Consumer of resolved input; implemented by the reminder assembler.
///
/// `deliver` must handle its own failures: errors never propagate back into
/// the correlation core.
#[async_trait]
pub trait CorrelationSink<O>: Send + Sync {
    async fn deliver(&self, message: CorrelatedMessage<O>);
}

#[async_trait]
impl<O, T> CorrelationSink<O> for Arc<T>
where
    O: Send + 'static,
    T: CorrelationSink<O> + ?Sized,
{
    async fn deliver(&self, message: CorrelatedMessage<O>) {
        (**self).deliver(message).await;
    }
}

/// Outcome of one lock-held buffer transition.
enum Decision<O> {
    /// The arrival claimed a buffered counterpart.
    Pair {
        existing: BufferedMessage<O>,
        arrival: Arrival<O>,
    },
    /// The arrival was buffered; a solo check is due for `seq`.
    Buffered { user_id: i64, seq: u64 },
}

struct Inner<O, S> {
    buffer: Mutex<CorrelationBuffer<O>>,
    config: CorrelatorConfig,
    sink: S,
}

/// Pairing resolver over a shared [`CorrelationBuffer`].
pub struct Correlator<O, S> {
    inner: Arc<Inner<O, S>>,
}

impl<O, S> Clone for Correlator<O, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O, S> Correlator<O, S>
where
    O: Send + 'static,
    S: CorrelationSink<O> + Send + Sync + 'static,
{
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, CorrelatorConfig::default())
    }

    pub fn with_config(sink: S, config: CorrelatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Mutex::new(CorrelationBuffer::new()),
                config,
                sink,
            }),
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, CorrelationBuffer<O>> {
        self.inner
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Process one inbound message: merge with a waiting counterpart, or
    /// buffer it and schedule the deferred solo check.
    pub async fn on_message(&self, arrival: Arrival<O>) {
        let config = self.inner.config;
        let user_id = arrival.user_id;

        let decision = {
            let mut buf = self.lock_buffer();
            buf.sweep(2 * config.link_timeout);

            let pairable = buf.peek(user_id).is_some_and(|entry| {
                entry.enqueued_at.elapsed() < config.link_timeout
                    && entry.is_forwarded != arrival.is_forwarded
                    && !entry.is_consumed()
            });

            if pairable && buf.mark_consumed(user_id) {
                // The path that set the consumed flag removes the entry.
                if let Some(existing) = buf.take(user_id) {
                    Decision::Pair { existing, arrival }
                } else {
                    // Lost race: the entry vanished under us; treat the
                    // arrival as fresh.
                    let seq = buf.put(arrival);
                    Decision::Buffered { user_id, seq }
                }
            } else {
                let seq = buf.put(arrival);
                Decision::Buffered { user_id, seq }
            }
        };

        match decision {
            Decision::Pair { existing, arrival } => {
                debug!("user {user_id}: merged arrival with buffered counterpart");
                self.inner.sink.deliver(merge(existing, arrival)).await;
            }
            Decision::Buffered { user_id, seq } => {
                debug!("user {user_id}: buffered (seq {seq}), solo check in {:?}", config.solo_wait);
                let this = self.clone();
                debounce::after(config.solo_wait, async move {
                    this.solo_check(user_id, seq).await;
                });
            }
        }
    }

    /// Deferred single-message check. A no-op when the scheduled entry was
    /// paired away, superseded, or consumed in the meantime.
    async fn solo_check(&self, user_id: i64, seq: u64) {
        let entry = self.lock_buffer().take_if(user_id, seq);

        let Some(entry) = entry else {
            debug!("user {user_id}: solo check for seq {seq} is stale, skipping");
            return;
        };

        debug!("user {user_id}: no partner arrived, processing solo");
        let message = if entry.is_forwarded {
            CorrelatedMessage::Forwarded {
                text: entry.content,
                author: entry.forward_author,
                origin: entry.origin,
            }
        } else {
            CorrelatedMessage::Plain {
                text: entry.content,
                origin: entry.origin,
            }
        };
        self.inner.sink.deliver(message).await;
    }
}

/// Merge a buffered entry with the arrival that claimed it. The
/// non-forwarded side is the explanation and supplies the reply context;
/// the forwarded side supplies content and attribution.
fn merge<O>(existing: BufferedMessage<O>, arrival: Arrival<O>) -> CorrelatedMessage<O> {
    if arrival.is_forwarded {
        CorrelatedMessage::Paired {
            explanation: existing.content,
            forwarded_text: arrival.content,
            forward_author: arrival.forward_author,
            origin: existing.origin,
        }
    } else {
        CorrelatedMessage::Paired {
            explanation: arrival.content,
            forwarded_text: existing.content,
            forward_author: existing.forward_author,
            origin: arrival.origin,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    type Events = Arc<Mutex<Vec<CorrelatedMessage<&'static str>>>>;

    struct RecordingSink {
        events: Events,
    }

    #[async_trait]
    impl CorrelationSink<&'static str> for RecordingSink {
        async fn deliver(&self, message: CorrelatedMessage<&'static str>) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
        }
    }

    fn correlator() -> (Correlator<&'static str, RecordingSink>, Events) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            events: Arc::clone(&events),
        };
        (Correlator::new(sink), events)
    }

    fn plain(user_id: i64, text: &str, origin: &'static str) -> Arrival<&'static str> {
        Arrival {
            user_id,
            content: text.to_string(),
            is_forwarded: false,
            forward_author: None,
            origin,
        }
    }

    fn forwarded(
        user_id: i64,
        text: &str,
        author: &str,
        origin: &'static str,
    ) -> Arrival<&'static str> {
        Arrival {
            user_id,
            content: text.to_string(),
            is_forwarded: true,
            forward_author: Some(author.to_string()),
            origin,
        }
    }

    fn recorded(events: &Events) -> Vec<CorrelatedMessage<&'static str>> {
        events.lock().unwrap().clone()
    }

    /// Lone plain message: exactly one solo call, after the solo wait and
    /// not before.
    #[tokio::test(start_paused = true)]
    async fn lone_plain_message_processes_solo_after_wait() {
        let (correlator, events) = correlator();

        correlator.on_message(plain(1, "remind me to call mom", "m1")).await;

        sleep(Duration::from_secs(14)).await;
        assert!(recorded(&events).is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(
            recorded(&events),
            vec![CorrelatedMessage::Plain {
                text: "remind me to call mom".to_string(),
                origin: "m1",
            }]
        );
    }

    /// Explanation then forward within the pairing window: one merged call,
    /// no solo call for either.
    #[tokio::test(start_paused = true)]
    async fn plain_then_forwarded_merge_into_one_pair() {
        let (correlator, events) = correlator();

        correlator.on_message(plain(1, "call back the client", "m1")).await;
        sleep(Duration::from_secs(10)).await;
        correlator
            .on_message(forwarded(1, "hey, call me when you can", "Alice", "m2"))
            .await;

        // Let any stale solo checks fire.
        sleep(Duration::from_secs(60)).await;

        assert_eq!(
            recorded(&events),
            vec![CorrelatedMessage::Paired {
                explanation: "call back the client".to_string(),
                forwarded_text: "hey, call me when you can".to_string(),
                forward_author: Some("Alice".to_string()),
                origin: "m1",
            }]
        );
    }

    /// Reverse order: the forward waits, the explanation claims it. Reply
    /// context comes from the explanation side.
    #[tokio::test(start_paused = true)]
    async fn forwarded_then_plain_merge_into_one_pair() {
        let (correlator, events) = correlator();

        correlator
            .on_message(forwarded(1, "meeting moved to Friday", "Bob", "m1"))
            .await;
        sleep(Duration::from_secs(3)).await;
        correlator.on_message(plain(1, "update my calendar", "m2")).await;

        sleep(Duration::from_secs(60)).await;

        assert_eq!(
            recorded(&events),
            vec![CorrelatedMessage::Paired {
                explanation: "update my calendar".to_string(),
                forwarded_text: "meeting moved to Friday".to_string(),
                forward_author: Some("Bob".to_string()),
                origin: "m2",
            }]
        );
    }

    /// Same provenance never pairs: the newcomer replaces the buffered
    /// entry, which is never processed.
    #[tokio::test(start_paused = true)]
    async fn same_provenance_supersedes_without_processing_the_old_one() {
        let (correlator, events) = correlator();

        correlator.on_message(forwarded(1, "message X", "Alice", "m1")).await;
        sleep(Duration::from_secs(5)).await;
        correlator.on_message(forwarded(1, "message Y", "Bob", "m2")).await;

        sleep(Duration::from_secs(60)).await;

        assert_eq!(
            recorded(&events),
            vec![CorrelatedMessage::Forwarded {
                text: "message Y".to_string(),
                author: Some("Bob".to_string()),
                origin: "m2",
            }]
        );
    }

    /// A message arriving right after a merge sees an empty slot and is
    /// evaluated fresh.
    #[tokio::test(start_paused = true)]
    async fn message_after_merge_starts_fresh() {
        let (correlator, events) = correlator();

        correlator.on_message(plain(1, "reply to this", "m1")).await;
        sleep(Duration::from_secs(1)).await;
        correlator.on_message(forwarded(1, "original", "Alice", "m2")).await;
        sleep(Duration::from_secs(1)).await;
        correlator.on_message(forwarded(1, "another forward", "Carol", "m3")).await;

        sleep(Duration::from_secs(60)).await;

        let events = recorded(&events);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CorrelatedMessage::Paired { .. }));
        assert_eq!(
            events[1],
            CorrelatedMessage::Forwarded {
                text: "another forward".to_string(),
                author: Some("Carol".to_string()),
                origin: "m3",
            }
        );
    }

    /// Different users never interact: each gets its own solo resolution.
    #[tokio::test(start_paused = true)]
    async fn users_are_independent() {
        let (correlator, events) = correlator();

        correlator.on_message(plain(1, "user one task", "m1")).await;
        correlator.on_message(forwarded(2, "user two forward", "Dave", "m2")).await;

        sleep(Duration::from_secs(60)).await;

        let mut events = recorded(&events);
        events.sort_by_key(|e| match e {
            CorrelatedMessage::Plain { .. } => 0,
            CorrelatedMessage::Forwarded { .. } => 1,
            CorrelatedMessage::Paired { .. } => 2,
        });
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CorrelatedMessage::Plain { .. }));
        assert!(matches!(events[1], CorrelatedMessage::Forwarded { .. }));
    }

    /// A partner arriving after the solo wait finds the slot already
    /// resolved and starts its own cycle.
    #[tokio::test(start_paused = true)]
    async fn partner_after_solo_wait_does_not_pair() {
        let (correlator, events) = correlator();

        correlator.on_message(plain(1, "too early", "m1")).await;
        sleep(Duration::from_secs(20)).await;
        correlator.on_message(forwarded(1, "too late", "Eve", "m2")).await;

        sleep(Duration::from_secs(60)).await;

        let events = recorded(&events);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CorrelatedMessage::Plain { .. }));
        assert!(matches!(events[1], CorrelatedMessage::Forwarded { .. }));
    }
}
