use teloxide::types::BotCommand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    fn all() -> Vec<BotCommand> {
        vec![
            BotCommand {
                command: "start".to_string(),
                description: "Start the reminder bot".to_string(),
            },
            BotCommand {
                command: "help".to_string(),
                description: "Show usage help".to_string(),
            },
        ]
    }

    #[must_use]
    pub fn bot_commands() -> Vec<BotCommand> {
        Self::all()
    }

    #[must_use]
    pub fn parse_from_text(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();

        // Remove bot mention if present (e.g., "/start@my_bot")
        let text = text.split('@').next().unwrap_or(&text).to_string();

        match text.as_str() {
            "/start" => Some(Self::Start),
            "/help" => Some(Self::Help),
            _ => None,
        }
    }

    #[must_use]
    pub const fn welcome_text() -> &'static str {
        r"Hello! I'm a smart reminder bot.

You can:
- Send me text messages with reminders
- Send voice messages
- Forward messages to create reminders from them

Examples:
- 'Remind me tomorrow at 15:00 about the meeting'
- 'Call mom in 2 hours'
- 'On the 10th' (means 10th of current month)
- 'On Sunday' (nearest Sunday)

Use /help for more info."
    }

    #[must_use]
    pub const fn help_text() -> &'static str {
        r"<b>How to use:</b>

<b>Text messages:</b>
Just write what you need to be reminded about with time/date.

<b>Voice messages:</b>
Send a voice message - I'll transcribe it and create a reminder.

<b>Forwarded messages:</b>
- Forward a message alone - I'll create a reminder from its content
- Send an explanation first, then forward - the reminder uses your explanation

<b>Time formats:</b>
- 'in 2 hours', 'in 30 minutes'
- 'tomorrow at 15:00'
- 'on the 10th' (current month)
- 'on Sunday' (nearest)

<b>After a reminder fires:</b>
You'll get buttons to mark it as done or cancel it.

<b>Reminders without time:</b>
Will be stored and reviewed weekly."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_mentions() {
        assert_eq!(Command::parse_from_text("/start"), Some(Command::Start));
        assert_eq!(Command::parse_from_text("/help@my_bot"), Some(Command::Help));
        assert_eq!(Command::parse_from_text("  /HELP "), Some(Command::Help));
        assert_eq!(Command::parse_from_text("remind me later"), None);
    }
}
