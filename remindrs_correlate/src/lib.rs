#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Message correlation for explanation + forwarded-message pairing.
//!
//! A user creating a reminder from someone else's message sends two
//! temporally-close messages: an explanation ("call this guy back
//! tomorrow") and the forwarded message itself, in either order. This crate
//! decides, for a stream of independent arrivals, whether two messages merge
//! into one reminder or each stands alone — without blocking the transport
//! and without losing or double-processing a message under concurrent
//! arrivals.
//!
//! The pieces:
//! - [`CorrelationBuffer`] — per-user single-slot store of the most recent
//!   unconsumed message.
//! - [`debounce::after`] — fire-and-forget delayed re-check; no cancellation,
//!   stale wake-ups are no-ops.
//! - [`Correlator`] — the pairing resolver; on each arrival it merges,
//!   buffers, or supersedes, and hands resolved input to a
//!   [`CorrelationSink`].

pub mod buffer;
pub mod correlator;
pub mod debounce;

pub use buffer::{Arrival, BufferedMessage, CorrelationBuffer};
pub use correlator::{CorrelatedMessage, CorrelationSink, Correlator, CorrelatorConfig};
