//! Background delivery: the minute due-reminder sweep and the weekly
//! review of undated reminders. Both loops only read the store and send
//! messages; they never touch the correlation core.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use remindrs_core::ReminderRow;
use std::time::Duration;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html::escape;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info};

use crate::keyboard;
use crate::{ReminderBot, Result};

pub(crate) fn spawn_loops(bot: ReminderBot) {
    tokio::spawn(due_sweep_loop(bot.clone()));
    tokio::spawn(weekly_review_loop(bot));
}

async fn due_sweep_loop(bot: ReminderBot) {
    let mut ticker = interval(Duration::from_secs(60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = deliver_due(&bot).await {
            error!("Due-reminder sweep failed: {e}");
        }
    }
}

/// Send every reminder whose time has arrived, marking each as sent.
/// Per-row failures are logged and do not stop the sweep.
async fn deliver_due(bot: &ReminderBot) -> Result<()> {
    let rows = bot.store.list_due_candidates().await?;
    let now = Utc::now();

    for row in rows {
        let Some(due) = row.due_at_utc(bot.timezone_name()) else {
            continue;
        };
        if due > now {
            continue;
        }

        match send_due_notification(bot, &row).await {
            Ok(()) => {
                if let Err(e) = bot.store.mark_sent(row.row).await {
                    error!("Failed to mark row {} as sent: {e}", row.row);
                }
            }
            Err(e) => error!("Failed to deliver reminder at row {}: {e}", row.row),
        }
    }

    Ok(())
}

async fn send_due_notification(bot: &ReminderBot, row: &ReminderRow) -> Result<()> {
    bot.bot
        .send_message(bot.chat_for(row), format_due(row))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard::reminder_actions(row.row))
        .await?;

    let head: String = row.text.chars().take(50).collect();
    info!("Sent reminder: {head}...");
    Ok(())
}

async fn weekly_review_loop(bot: ReminderBot) {
    loop {
        let now = Utc::now().with_timezone(&bot.tz());
        let next = next_occurrence(now, bot.review_weekday, bot.review_hour);
        let wait = (next - now)
            .to_std()
            .unwrap_or_else(|_| Duration::from_secs(60));
        info!("Next weekly review at {next}");
        sleep(wait).await;

        if let Err(e) = run_weekly_review(&bot).await {
            error!("Weekly review failed: {e}");
        }

        // Step past the scheduled minute before recomputing.
        sleep(Duration::from_secs(60)).await;
    }
}

async fn run_weekly_review(bot: &ReminderBot) -> Result<()> {
    let rows = bot.store.list_undated().await?;
    info!("Weekly review: {} undated reminder(s)", rows.len());

    for row in rows {
        let request = bot
            .bot
            .send_message(bot.chat_for(&row), format_review(&row))
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard::timeless_reminder_actions(row.row));
        if let Err(e) = request.await {
            error!("Failed to send weekly review for row {}: {e}", row.row);
        }
        sleep(Duration::from_secs(1)).await;
    }

    Ok(())
}

/// Notification text for a fired reminder (HTML).
fn format_due(row: &ReminderRow) -> String {
    let mut parts = vec![format!("<b>Reminder:</b>\n\n{}", escape(&row.text))];

    if let Some(comment) = &row.comment {
        parts.push(format!("\n\n<b>Original message:</b>\n{}", escape(comment)));
        if let Some(author) = &row.forward_author {
            parts.push(format!("\n<b>From:</b> {}", escape(author)));
        }
    }

    parts.concat()
}

/// Weekly review prompt for an undated reminder (HTML).
fn format_review(row: &ReminderRow) -> String {
    let mut parts = vec![format!(
        "<b>Weekly review:</b>\n\n<b>Task:</b> {}\n\nIs this still relevant?",
        escape(&row.text)
    )];

    if let Some(comment) = &row.comment {
        let head: String = comment.chars().take(100).collect();
        parts.push(format!("\n\n<b>Original:</b> {}...", escape(&head)));
    }

    parts.concat()
}

/// The next wall-clock occurrence of `weekday` at `hour:00` strictly after
/// `now`.
fn next_occurrence(now: DateTime<Tz>, weekday: Weekday, hour: u32) -> DateTime<Tz> {
    let tz = now.timezone();

    for offset in 0..=7 {
        let date = now.date_naive() + ChronoDuration::days(offset);
        if date.weekday() != weekday {
            continue;
        }
        let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        let Some(candidate) = tz.from_local_datetime(&naive).earliest() else {
            continue;
        };
        if candidate > now {
            return candidate;
        }
    }

    now + ChronoDuration::days(7)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use remindrs_core::ReminderStatus;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn next_occurrence_midweek() {
        // 2025-06-04 is a Wednesday.
        let next = next_occurrence(at(2025, 6, 4, 12, 0), Weekday::Sun, 10);
        assert_eq!(next, at(2025, 6, 8, 10, 0));
    }

    #[test]
    fn next_occurrence_same_day_before_hour() {
        // 2025-06-08 is a Sunday.
        let next = next_occurrence(at(2025, 6, 8, 8, 0), Weekday::Sun, 10);
        assert_eq!(next, at(2025, 6, 8, 10, 0));
    }

    #[test]
    fn next_occurrence_same_day_after_hour_rolls_a_week() {
        let next = next_occurrence(at(2025, 6, 8, 11, 0), Weekday::Sun, 10);
        assert_eq!(next, at(2025, 6, 15, 10, 0));
    }

    fn row(text: &str, comment: Option<&str>, author: Option<&str>) -> ReminderRow {
        ReminderRow {
            row: 3,
            text: text.to_string(),
            due_at: None,
            timezone: "UTC".to_string(),
            sent: false,
            status: ReminderStatus::Open,
            comment: comment.map(ToString::to_string),
            forward_author: author.map(ToString::to_string),
            user_id: None,
        }
    }

    #[test]
    fn due_notification_includes_forwarded_context() {
        let text = format_due(&row("Call back", Some("original text"), Some("Alice")));
        assert!(text.starts_with("<b>Reminder:</b>"));
        assert!(text.contains("original text"));
        assert!(text.contains("<b>From:</b> Alice"));
    }

    #[test]
    fn due_notification_without_comment_is_minimal() {
        let text = format_due(&row("Call back", None, None));
        assert!(!text.contains("Original message"));
    }

    #[test]
    fn review_prompt_asks_about_relevance() {
        let text = format_review(&row("Buy milk", None, None));
        assert!(text.contains("Is this still relevant?"));
    }
}
