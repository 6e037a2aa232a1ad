//! Reminder domain types and draft validation.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::time::{local_to_utc, resolve_tz};

/// Wall-clock format used in the store's `datetime` column.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Structured output of the interpretation oracle.
///
/// `due_at` is wall-clock time in `timezone`, not UTC; a `None` due time is
/// a valid "timeless" reminder that joins the weekly review pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderDraft {
    pub text: String,
    pub due_at: Option<NaiveDateTime>,
    pub timezone: String,
}

/// Append request for the store: a validated draft plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub text: String,
    pub due_at: Option<NaiveDateTime>,
    pub timezone: String,
    pub comment: Option<String>,
    pub forward_author: Option<String>,
    pub user_id: Option<i64>,
}

impl NewReminder {
    /// Build an append request from a draft, without forwarded provenance.
    #[must_use]
    pub fn from_draft(draft: ReminderDraft, user_id: Option<i64>) -> Self {
        Self {
            text: draft.text,
            due_at: draft.due_at,
            timezone: draft.timezone,
            comment: None,
            forward_author: None,
            user_id,
        }
    }

    /// Attach the forwarded content this reminder was created from.
    #[must_use]
    pub fn with_forwarded(mut self, comment: String, author: Option<String>) -> Self {
        self.comment = Some(comment);
        self.forward_author = author;
        self
    }
}

/// Lifecycle status of a stored reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderStatus {
    #[default]
    Open,
    Done,
    NotDone,
    Canceled,
}

impl ReminderStatus {
    /// Cell representation; `Open` is the empty cell.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "",
            Self::Done => "done",
            Self::NotDone => "not_done",
            Self::Canceled => "canceled",
        }
    }

    /// Parse a cell value; anything unrecognized reads as `Open`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "done" => Self::Done,
            "not_done" => Self::NotDone,
            "canceled" => Self::Canceled,
            _ => Self::Open,
        }
    }

    /// Done and canceled reminders leave the weekly review pool.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}

/// Single-cell update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderField {
    DueAt,
    Sent,
    Status,
}

/// A reminder row read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRow {
    /// 1-based row number, used as the row id in button callbacks.
    pub row: u32,
    pub text: String,
    pub due_at: Option<NaiveDateTime>,
    pub timezone: String,
    pub sent: bool,
    pub status: ReminderStatus,
    pub comment: Option<String>,
    pub forward_author: Option<String>,
    pub user_id: Option<i64>,
}

impl ReminderRow {
    /// The due instant in UTC, resolving the row's timezone name with
    /// `default_tz` as fallback. `None` for timeless rows.
    #[must_use]
    pub fn due_at_utc(&self, default_tz: &str) -> Option<DateTime<Utc>> {
        let due = self.due_at?;
        let tz = resolve_tz(&self.timezone, default_tz);
        Some(local_to_utc(due, tz))
    }
}

/// Why a draft failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftIssue {
    EmptyText,
    PastTime,
}

impl std::fmt::Display for DraftIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "missing reminder text"),
            Self::PastTime => write!(f, "reminder time is in the past"),
        }
    }
}

/// Validate a draft against the current time.
pub fn validate_draft(draft: &ReminderDraft, default_tz: &str) -> Result<(), DraftIssue> {
    validate_draft_at(draft, Utc::now(), default_tz)
}

/// Validate a draft against an explicit `now` (UTC). A draft without a due
/// time is always valid; a due time is compared as wall-clock in the draft's
/// timezone.
pub fn validate_draft_at(
    draft: &ReminderDraft,
    now: DateTime<Utc>,
    default_tz: &str,
) -> Result<(), DraftIssue> {
    if draft.text.trim().is_empty() {
        return Err(DraftIssue::EmptyText);
    }

    let Some(due) = draft.due_at else {
        return Ok(());
    };

    let tz = resolve_tz(&draft.timezone, default_tz);
    let local_now = now.with_timezone(&tz).naive_local();
    if due < local_now {
        return Err(DraftIssue::PastTime);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft(text: &str, due_at: Option<NaiveDateTime>) -> ReminderDraft {
        ReminderDraft {
            text: text.to_string(),
            due_at,
            timezone: "Europe/Moscow".to_string(),
        }
    }

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn timeless_draft_is_valid() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert!(validate_draft_at(&draft("Buy milk", None), now, "UTC").is_ok());
    }

    #[test]
    fn empty_text_is_invalid() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            validate_draft_at(&draft("  ", None), now, "UTC"),
            Err(DraftIssue::EmptyText)
        );
    }

    #[test]
    fn past_time_is_invalid_in_draft_timezone() {
        // 12:00 UTC is 15:00 in Moscow; 14:00 Moscow wall-clock already passed.
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let d = draft("Call mom", Some(naive("2025-06-01 14:00:00")));
        assert_eq!(validate_draft_at(&d, now, "UTC"), Err(DraftIssue::PastTime));
    }

    #[test]
    fn future_time_is_valid() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let d = draft("Call mom", Some(naive("2025-06-01 16:00:00")));
        assert!(validate_draft_at(&d, now, "UTC").is_ok());
    }

    #[test]
    fn unknown_timezone_falls_back_to_default() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut d = draft("Call mom", Some(naive("2025-06-01 12:30:00")));
        d.timezone = "Not/AZone".to_string();
        // With UTC fallback, 12:30 is still ahead of 12:00.
        assert!(validate_draft_at(&d, now, "UTC").is_ok());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            ReminderStatus::Open,
            ReminderStatus::Done,
            ReminderStatus::NotDone,
            ReminderStatus::Canceled,
        ] {
            assert_eq!(ReminderStatus::parse(status.as_str()), status);
        }
        assert_eq!(ReminderStatus::parse("  DONE "), ReminderStatus::Done);
        assert_eq!(ReminderStatus::parse("garbage"), ReminderStatus::Open);
    }

    #[test]
    fn due_at_utc_converts_wall_clock() {
        let row = ReminderRow {
            row: 2,
            text: "Standup".to_string(),
            due_at: Some(naive("2025-06-01 15:00:00")),
            timezone: "Europe/Moscow".to_string(),
            sent: false,
            status: ReminderStatus::Open,
            comment: None,
            forward_author: None,
            user_id: None,
        };
        let utc = row.due_at_utc("UTC").unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }
}
