//! Update handlers: commands, text, voice, and button callbacks.

use remindrs_core::ReminderStatus;
use remindrs_correlate::Arrival;
use teloxide::net::Download;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{Message, MessageOrigin, ParseMode};
use teloxide::utils::html::escape;
use tracing::{info, warn};

use crate::keyboard::CallbackAction;
use crate::{Command, ReminderBot, Result};

/// Route an inbound message to the voice or text pipeline.
pub async fn dispatch_message(bot: ReminderBot, msg: Message) -> Result<()> {
    if msg.voice().is_some() {
        return handle_voice(bot, msg).await;
    }
    handle_message(bot, msg).await
}

/// Handle a text (or captioned) message: commands and pending deadline
/// input are intercepted, everything else enters the correlation core.
pub async fn handle_message(bot: ReminderBot, msg: Message) -> Result<()> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(text) = msg.text().or_else(|| msg.caption()).map(ToString::to_string) else {
        return Ok(());
    };

    if let Some(cmd) = Command::parse_from_text(&text) {
        return handle_command(bot, msg, cmd).await;
    }

    if let Some(row) = bot.take_pending_time(user_id) {
        return handle_time_input(&bot, &msg, user_id, row, &text).await;
    }

    let is_forwarded = msg.forward_origin().is_some();
    let head: String = text.chars().take(50).collect();
    info!("Message from {user_id}: forwarded={is_forwarded}, text={head}...");

    let forward_author = is_forwarded.then(|| forward_author(&msg));
    bot.correlator
        .on_message(Arrival {
            user_id,
            content: text,
            is_forwarded,
            forward_author,
            origin: msg,
        })
        .await;

    Ok(())
}

async fn handle_command(bot: ReminderBot, msg: Message, cmd: Command) -> Result<()> {
    let username = msg
        .from
        .as_ref()
        .and_then(|u| u.username.as_deref())
        .unwrap_or("unknown");

    match cmd {
        Command::Start => {
            info!("[@{username}] Command: /start");
            bot.bot
                .send_message(msg.chat.id, Command::welcome_text())
                .await?;
        }
        Command::Help => {
            info!("[@{username}] Command: /help");
            bot.bot
                .send_message(msg.chat.id, Command::help_text())
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }

    Ok(())
}

/// The user was asked for a deadline for an undated reminder; interpret
/// their answer and update the row. On failure the pending state is
/// restored so they can try again.
async fn handle_time_input(
    bot: &ReminderBot,
    msg: &Message,
    user_id: i64,
    row: u32,
    text: &str,
) -> Result<()> {
    info!("Deadline input from {user_id} for row {row}: {text}");

    let prompt = format!("Remind me {text}");
    let due = match bot.interpreter.extract_checked(&prompt).await {
        Ok(draft) => draft.due_at,
        Err(e) => {
            warn!("Deadline interpretation failed: {e}");
            None
        }
    };

    let Some(due) = due else {
        bot.bot
            .send_message(
                msg.chat.id,
                format!("Could not parse time from: {text}\nPlease try again with a clearer format."),
            )
            .await?;
        bot.begin_time_input(user_id, row);
        return Ok(());
    };

    match bot.store.update_due(row, due).await {
        Ok(()) => {
            bot.bot
                .send_message(
                    msg.chat.id,
                    format!("Deadline set: <b>{}</b>", due.format("%d.%m.%Y at %H:%M")),
                )
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            warn!("Failed to update deadline for row {row}: {e}");
            bot.bot
                .send_message(msg.chat.id, "Error updating reminder. Please try again.")
                .await?;
        }
    }

    Ok(())
}

/// Voice notes bypass the correlation buffer: transcribe, show the
/// transcript, then assemble from the text.
pub async fn handle_voice(bot: ReminderBot, msg: Message) -> Result<()> {
    let Some(voice) = msg.voice() else {
        return Ok(());
    };
    let user_id = sender_id(&msg);
    info!("Voice message from {user_id:?}, duration: {:?}", voice.duration);

    let status = bot
        .bot
        .send_message(msg.chat.id, "Transcribing voice message...")
        .await?;

    let file = bot.bot.get_file(voice.file.id.clone()).await?;
    let mut audio = Vec::new();
    bot.bot.download_file(&file.path, &mut audio).await?;

    let transcript = match bot.interpreter.transcribe(audio).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            bot.bot
                .edit_message_text(
                    status.chat.id,
                    status.id,
                    "Could not transcribe voice message. Please try again or send text.",
                )
                .await?;
            return Ok(());
        }
        Err(e) => {
            warn!("Transcription failed: {e}");
            bot.bot
                .edit_message_text(
                    status.chat.id,
                    status.id,
                    "Error processing voice message.",
                )
                .await?;
            return Ok(());
        }
    };

    bot.bot
        .edit_message_text(
            status.chat.id,
            status.id,
            format!(
                "<b>Transcribed:</b>\n<i>{}</i>\n\nProcessing reminder...",
                escape(&transcript)
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;

    bot.assembler
        .assemble_transcribed(&transcript, &status, user_id)
        .await
}

/// Handle inline button callbacks.
pub async fn handle_callback(bot: ReminderBot, query: CallbackQuery) -> Result<()> {
    bot.bot.answer_callback_query(query.id.clone()).await?;

    let Some(data) = query.data.clone() else {
        return Ok(());
    };
    info!("Callback from {}: {data}", query.from.id);

    let Some(action) = CallbackAction::parse(&data) else {
        warn!("Unknown callback data: {data}");
        return Ok(());
    };
    let Some(message) = query.message else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let current = message
        .regular_message()
        .and_then(Message::text)
        .unwrap_or_default()
        .to_string();

    let edit_with_suffix = |suffix: &str| {
        bot.bot
            .edit_message_text(
                chat_id,
                message_id,
                format!("{}\n\n{suffix}", escape(&current)),
            )
            .parse_mode(ParseMode::Html)
    };

    let outcome: Result<()> = match action {
        CallbackAction::Done(row) => {
            let update = bot.store.update_status(row, ReminderStatus::Done).await;
            match update {
                Ok(()) => {
                    edit_with_suffix("<b>Status: Done</b>").await?;
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        CallbackAction::NotDone(row) => {
            let update = bot.store.update_status(row, ReminderStatus::NotDone).await;
            match update {
                Ok(()) => {
                    edit_with_suffix("<b>Status: Not done</b>").await?;
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        CallbackAction::Cancel(row) => {
            let update = bot.store.update_status(row, ReminderStatus::Canceled).await;
            match update {
                Ok(()) => {
                    edit_with_suffix("<b>Canceled</b>").await?;
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        CallbackAction::Relevant(_row) => {
            edit_with_suffix("<i>Marked as still relevant</i>").await?;
            Ok(())
        }
        CallbackAction::SetTime(row) => {
            if let Ok(user_id) = i64::try_from(query.from.id.0) {
                bot.begin_time_input(user_id, row);
            }
            edit_with_suffix("<i>Please send the deadline (e.g., 'tomorrow at 15:00')</i>")
                .await?;
            Ok(())
        }
        CallbackAction::Confirm => {
            bot.bot
                .edit_message_reply_markup(chat_id, message_id)
                .await?;
            Ok(())
        }
    };

    if let Err(e) = outcome {
        warn!("Error handling callback {data}: {e}");
        bot.bot
            .edit_message_text(chat_id, message_id, "Error processing action.")
            .await
            .ok();
    }

    Ok(())
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Display name of the author a forwarded message originally came from.
fn forward_author(msg: &Message) -> String {
    match msg.forward_origin() {
        Some(MessageOrigin::User { sender_user, .. }) => {
            let name = sender_user.full_name();
            if !name.is_empty() {
                name
            } else if let Some(username) = &sender_user.username {
                format!("@{username}")
            } else {
                sender_user.id.to_string()
            }
        }
        Some(MessageOrigin::HiddenUser {
            sender_user_name, ..
        }) => sender_user_name.clone(),
        Some(MessageOrigin::Chat { sender_chat, .. }) => sender_chat
            .title()
            .map_or_else(|| "Unknown".to_string(), |t| format!("Chat: {t}")),
        Some(MessageOrigin::Channel { chat, .. }) => chat
            .title()
            .map_or_else(|| "Unknown".to_string(), |t| format!("Channel: {t}")),
        None => "Unknown".to_string(),
    }
}
