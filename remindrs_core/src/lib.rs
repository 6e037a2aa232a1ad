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

use async_trait::async_trait;
use chrono::NaiveDateTime;

pub mod error;
pub mod reminder;
pub mod time;

pub use error::{Error, Result};
pub use reminder::{
    DATETIME_FORMAT, DraftIssue, NewReminder, ReminderDraft, ReminderField, ReminderRow,
    ReminderStatus, validate_draft, validate_draft_at,
};
pub use time::{local_to_utc, resolve_tz};

/// Hint appended to the original message when the first extraction produced a
/// time that already passed. One bounded retry only.
const RECOMPUTE_HINT: &str = "IMPORTANT: The previous calculation resulted in a past time. \
Recalculate to get the NEAREST FUTURE date/time while preserving the original intent.";

/// Natural-language interpretation oracle.
///
/// Turns free-form user text into a structured [`ReminderDraft`] and
/// transcribes voice notes. Implementations live in `remindrs_providers`;
/// the trait keeps the rest of the system testable with fakes.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Extract a reminder from user text. `Ok(None)` means the oracle found
    /// no reminder signal at all.
    async fn extract(&self, text: &str) -> Result<Option<ReminderDraft>>;

    /// Extract a reminder from forwarded content the user gave no
    /// explanation for. The task description is derived from the content.
    async fn extract_forwarded(&self, forwarded_text: &str) -> Result<Option<ReminderDraft>>;

    /// Transcribe a voice note (OGG/Opus bytes). `Ok(None)` means the audio
    /// produced no usable text.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<Option<String>>;

    /// Timezone used when a draft carries an unparseable timezone name.
    fn default_timezone(&self) -> &str;

    /// Extract and validate in one step.
    ///
    /// A past due time triggers exactly one retry with an explicit
    /// recompute-a-future-time hint before the failure is surfaced.
    async fn extract_checked(&self, text: &str) -> Result<ReminderDraft> {
        let draft = self
            .extract(text)
            .await?
            .ok_or_else(|| Error::Interpretation("no reminder found in message".to_string()))?;

        match validate_draft(&draft, self.default_timezone()) {
            Ok(()) => return Ok(draft),
            Err(DraftIssue::PastTime) => {}
            Err(issue) => return Err(Error::Validation(issue.to_string())),
        }

        let retry_text = format!("{text}\n\n{RECOMPUTE_HINT}");
        let draft = self
            .extract(&retry_text)
            .await?
            .ok_or_else(|| Error::Interpretation("no reminder found in message".to_string()))?;

        validate_draft(&draft, self.default_timezone())
            .map_err(|issue| Error::Validation(issue.to_string()))?;

        Ok(draft)
    }
}

/// Row-oriented reminder store.
///
/// The backing table uses one row per reminder:
/// `datetime | text | timezone | sent | status | comment | forward_author | user_id`.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Append a reminder, returning its 1-based row number.
    async fn append(&self, reminder: &NewReminder) -> Result<u32>;

    /// Overwrite a single cell of an existing row.
    async fn update_cell(&self, row: u32, field: ReminderField, value: &str) -> Result<()>;

    /// Rows with a due time that have not been delivered yet.
    async fn list_due_candidates(&self) -> Result<Vec<ReminderRow>>;

    /// Rows without a due time whose status is still open.
    async fn list_undated(&self) -> Result<Vec<ReminderRow>>;

    /// Read back a single row, if it exists.
    async fn get(&self, row: u32) -> Result<Option<ReminderRow>>;

    async fn mark_sent(&self, row: u32) -> Result<()> {
        self.update_cell(row, ReminderField::Sent, "TRUE").await
    }

    async fn update_status(&self, row: u32, status: ReminderStatus) -> Result<()> {
        self.update_cell(row, ReminderField::Status, status.as_str())
            .await
    }

    async fn update_due(&self, row: u32, due: NaiveDateTime) -> Result<()> {
        let value = due.format(DATETIME_FORMAT).to_string();
        self.update_cell(row, ReminderField::DueAt, &value).await
    }
}
