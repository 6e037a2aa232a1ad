//! Inline keyboards and their callback data.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Buttons attached to a fired reminder notification.
#[must_use]
pub fn reminder_actions(row: u32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        InlineKeyboardButton::callback("Done", format!("done_{row}")),
        InlineKeyboardButton::callback("Cancel", format!("cancel_{row}")),
    ]])
}

/// Buttons attached to a weekly review of an undated reminder.
#[must_use]
pub fn timeless_reminder_actions(row: u32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Still relevant", format!("relevant_{row}")),
            InlineKeyboardButton::callback("No longer needed", format!("cancel_{row}")),
        ],
        vec![InlineKeyboardButton::callback(
            "Set deadline",
            format!("settime_{row}"),
        )],
    ])
}

/// Single OK button acknowledging a created reminder.
#[must_use]
pub fn confirm_creation() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback("OK", "confirm_ok")]])
}

/// Parsed callback data from a button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Done(u32),
    NotDone(u32),
    Relevant(u32),
    Cancel(u32),
    SetTime(u32),
    Confirm,
}

impl CallbackAction {
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == "confirm_ok" {
            return Some(Self::Confirm);
        }

        let (action, row) = data.rsplit_once('_')?;
        let row: u32 = row.parse().ok()?;
        match action {
            "done" => Some(Self::Done(row)),
            "notdone" => Some(Self::NotDone(row)),
            "relevant" => Some(Self::Relevant(row)),
            "cancel" => Some(Self::Cancel(row)),
            "settime" => Some(Self::SetTime(row)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_row_actions() {
        assert_eq!(CallbackAction::parse("done_5"), Some(CallbackAction::Done(5)));
        assert_eq!(
            CallbackAction::parse("notdone_12"),
            Some(CallbackAction::NotDone(12))
        );
        assert_eq!(
            CallbackAction::parse("settime_3"),
            Some(CallbackAction::SetTime(3))
        );
        assert_eq!(CallbackAction::parse("confirm_ok"), Some(CallbackAction::Confirm));
    }

    #[test]
    fn rejects_malformed_data() {
        assert_eq!(CallbackAction::parse("done_"), None);
        assert_eq!(CallbackAction::parse("done_x"), None);
        assert_eq!(CallbackAction::parse("unknown_5"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }

    #[test]
    fn keyboards_carry_row_numbers() {
        let kb = timeless_reminder_actions(7);
        let all: Vec<_> = kb.inline_keyboard.iter().flatten().collect();
        assert_eq!(all.len(), 3);
    }
}
