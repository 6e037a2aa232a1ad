//! Turns resolved correlation output into stored reminders and replies.
//!
//! Every path sends a short status reply first and edits it with the
//! outcome, so the user sees progress while the oracle and the store are
//! consulted. Nothing is persisted when interpretation or validation fails.

use async_trait::async_trait;
use remindrs_core::{
    Error, Interpreter, NewReminder, ReminderDraft, ReminderStore, validate_draft,
};
use remindrs_correlate::{CorrelatedMessage, CorrelationSink};
use std::sync::Arc;
use teloxide::payloads::EditMessageTextSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, Message, ParseMode};
use teloxide::utils::html::escape;
use tracing::{info, warn};

use crate::Result;
use crate::keyboard;

/// Reminder assembly over the interpretation oracle and the row store.
pub struct ReminderAssembler {
    bot: Bot,
    interpreter: Arc<dyn Interpreter>,
    store: Arc<dyn ReminderStore>,
}

impl ReminderAssembler {
    pub fn new(bot: Bot, interpreter: Arc<dyn Interpreter>, store: Arc<dyn ReminderStore>) -> Self {
        Self {
            bot,
            interpreter,
            store,
        }
    }

    async fn send_status(&self, origin: &Message, text: &str) -> Result<Message> {
        Ok(self.bot.send_message(origin.chat.id, text).await?)
    }

    async fn edit_plain(&self, status: &Message, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(status.chat.id, status.id, text)
            .await?;
        Ok(())
    }

    async fn edit_html(
        &self,
        status: &Message,
        text: String,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = self
            .bot
            .edit_message_text(status.chat.id, status.id, text)
            .parse_mode(ParseMode::Html);
        match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(())
    }

    /// Persist a validated draft and confirm to the user.
    async fn store_and_confirm(
        &self,
        status: &Message,
        draft: ReminderDraft,
        reminder: NewReminder,
        transcript: Option<&str>,
        forwarded: Option<(&str, Option<&str>)>,
    ) -> Result<()> {
        match self.store.append(&reminder).await {
            Ok(row) => {
                info!("Created reminder at row {row}: {}", draft.text);
                self.edit_html(
                    status,
                    format_created(&draft, transcript, forwarded),
                    Some(keyboard::confirm_creation()),
                )
                .await
            }
            Err(e) => {
                warn!("Failed to persist reminder: {e}");
                self.edit_plain(status, &e.user_message()).await
            }
        }
    }

    async fn assemble_plain(&self, text: &str, origin: &Message) -> Result<()> {
        let status = self.send_status(origin, "Processing...").await?;

        let draft = match self.interpreter.extract_checked(text).await {
            Ok(draft) => draft,
            Err(e) => return self.edit_plain(&status, &e.user_message()).await,
        };

        let reminder = NewReminder::from_draft(draft.clone(), sender_id(origin));
        self.store_and_confirm(&status, draft, reminder, None, None)
            .await
    }

    async fn assemble_forwarded(
        &self,
        text: &str,
        author: Option<String>,
        origin: &Message,
    ) -> Result<()> {
        let status = self
            .send_status(origin, "Processing forwarded message...")
            .await?;

        let draft = match self.interpreter.extract_forwarded(text).await {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                return self
                    .edit_plain(
                        &status,
                        "Could not create reminder from forwarded message.\n\
                         Try adding an explanation message before forwarding.",
                    )
                    .await;
            }
            Err(e) => return self.edit_plain(&status, &e.user_message()).await,
        };

        // Undated forwarded reminders are allowed into the weekly pool; a
        // dated one must still carry a future time.
        if let Err(issue) = validate_draft(&draft, self.interpreter.default_timezone()) {
            if draft.due_at.is_some() {
                let e = Error::Validation(issue.to_string());
                return self.edit_plain(&status, &e.user_message()).await;
            }
        }

        let reminder = NewReminder::from_draft(draft.clone(), sender_id(origin))
            .with_forwarded(text.to_string(), author.clone());
        self.store_and_confirm(
            &status,
            draft,
            reminder,
            None,
            Some((text, author.as_deref())),
        )
        .await
    }

    async fn assemble_pair(
        &self,
        explanation: &str,
        forwarded_text: &str,
        forward_author: Option<String>,
        origin: &Message,
    ) -> Result<()> {
        let status = self.send_status(origin, "Processing message pair...").await?;

        let draft = match self.interpreter.extract_checked(explanation).await {
            Ok(draft) => draft,
            Err(e) => return self.edit_plain(&status, &e.user_message()).await,
        };

        let reminder = NewReminder::from_draft(draft.clone(), sender_id(origin))
            .with_forwarded(forwarded_text.to_string(), forward_author.clone());
        self.store_and_confirm(
            &status,
            draft,
            reminder,
            None,
            Some((forwarded_text, forward_author.as_deref())),
        )
        .await
    }

    /// Voice path: the handler already sent a status message showing the
    /// transcript; create the reminder from the transcribed text.
    pub async fn assemble_transcribed(
        &self,
        transcript: &str,
        status: &Message,
        user_id: Option<i64>,
    ) -> Result<()> {
        let draft = match self.interpreter.extract_checked(transcript).await {
            Ok(draft) => draft,
            Err(e) => {
                return self
                    .edit_html(
                        status,
                        format!(
                            "<b>Transcribed:</b>\n<i>{}</i>\n\n{}",
                            escape(transcript),
                            escape(&e.user_message())
                        ),
                        None,
                    )
                    .await;
            }
        };

        let reminder = NewReminder::from_draft(draft.clone(), user_id);
        self.store_and_confirm(status, draft, reminder, Some(transcript), None)
            .await
    }
}

#[async_trait]
impl CorrelationSink<Message> for ReminderAssembler {
    async fn deliver(&self, message: CorrelatedMessage<Message>) {
        let result = match message {
            CorrelatedMessage::Plain { text, origin } => {
                self.assemble_plain(&text, &origin).await
            }
            CorrelatedMessage::Forwarded {
                text,
                author,
                origin,
            } => self.assemble_forwarded(&text, author, &origin).await,
            CorrelatedMessage::Paired {
                explanation,
                forwarded_text,
                forward_author,
                origin,
            } => {
                self.assemble_pair(&explanation, &forwarded_text, forward_author, &origin)
                    .await
            }
        };

        if let Err(e) = result {
            warn!("Reminder assembly failed: {e}");
        }
    }
}

/// Numeric sender id of a message, when it has one.
fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Confirmation text for a created reminder (HTML).
fn format_created(
    draft: &ReminderDraft,
    transcript: Option<&str>,
    forwarded: Option<(&str, Option<&str>)>,
) -> String {
    let mut parts = vec!["<b>Reminder created!</b>\n".to_string()];

    if let Some(transcript) = transcript {
        parts.push(format!("<b>Voice:</b> <i>{}</i>\n", escape(transcript)));
    }

    parts.push(format!("<b>Task:</b> {}", escape(&draft.text)));

    if let Some(due) = draft.due_at {
        parts.push(format!("\n<b>Time:</b> {}", due.format("%d.%m.%Y at %H:%M")));
        parts.push(format!("\n<b>Timezone:</b> {}", escape(&draft.timezone)));
    } else {
        parts.push("\n<i>No time set - will be reviewed weekly</i>".to_string());
    }

    if let Some((text, author)) = forwarded {
        parts.push(format!(
            "\n\n<b>Original message:</b> {}",
            escape(&preview(text, 100))
        ));
        if let Some(author) = author {
            parts.push(format!("\n<b>From:</b> {}", escape(author)));
        }
    }

    parts.concat()
}

/// First `limit` characters, with an ellipsis when truncated.
fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut short: String = text.chars().take(limit).collect();
    short.push_str("...");
    short
}
