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

//! Telegram front end of the reminder assistant.
//!
//! Inbound text runs through the correlation core before assembly; voice
//! notes are transcribed and assembled directly; button presses update the
//! stored rows. Two background loops deliver due reminders and the weekly
//! review of undated ones.

mod assembler;
mod bot;
mod command;
mod error;
mod handler;
mod keyboard;
mod notify;

pub use assembler::ReminderAssembler;
pub use bot::ReminderBot;
pub use command::Command;
pub use error::{Error, Result};
