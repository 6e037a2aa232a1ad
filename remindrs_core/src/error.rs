//! Error taxonomy shared by every collaborator.
//!
//! The four kinds map one-to-one onto the failure surfaces of the system:
//! interpretation (the oracle found nothing usable), validation (the oracle
//! found something unusable), persistence (the row store), and transport
//! (message delivery). [`Error::user_message`] is the single place that
//! turns any of them into text shown to the user.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("interpretation failed: {0}")]
    Interpretation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("transport failed: {0}")]
    Transport(String),
}

impl Error {
    /// Plain-language text for the user, with accepted-input examples where
    /// they help.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Interpretation(reason) => format!(
                "Could not create reminder: {reason}\n\n\
                 Examples:\n\
                 - \"Remind me tomorrow at 15:00 about the meeting\"\n\
                 - \"Call mom in 2 hours\""
            ),
            Self::Validation(reason) => format!("Could not create reminder: {reason}"),
            Self::Persistence(_) => "Error saving reminder. Please try again.".to_string(),
            Self::Transport(_) => "Error sending message. Please try again.".to_string(),
        }
    }
}
