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

//! Language-understanding providers.
//!
//! [`OpenAiInterpreter`] implements the [`remindrs_core::Interpreter`]
//! oracle over the OpenAI API: chat completions for reminder extraction and
//! Whisper for voice transcription.

pub mod openai;
pub mod retry;

pub use openai::OpenAiInterpreter;
pub use retry::retry_with_backoff;
