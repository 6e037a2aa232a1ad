//! OpenAI-backed implementation of the interpretation oracle.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use remindrs_core::{DATETIME_FORMAT, Error, Interpreter, ReminderDraft, Result, resolve_tz};
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::retry::retry_with_backoff;

/// Reminder extraction and voice transcription over the OpenAI API.
pub struct OpenAiInterpreter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timezone: String,
}

impl OpenAiInterpreter {
    pub fn new(api_key: String, timezone: String) -> Self {
        info!("Creating OpenAiInterpreter");
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timezone,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Send one chat-completion request and return the raw response text.
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let request = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text},
            ],
            "temperature": 0.1,
            "max_tokens": 300,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Interpretation(format!("language service unavailable: {e}")))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Interpretation(format!("invalid language service reply: {e}")))?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                Error::Interpretation("invalid response format: missing content".to_string())
            })
    }

    fn extraction_prompt(&self) -> String {
        let tz = resolve_tz(&self.timezone, "UTC");
        let now = Utc::now().with_timezone(&tz);
        let current = now.format(DATETIME_FORMAT);
        let weekday = now.format("%A");
        let timezone = &self.timezone;

        format!(
            r#"You are a precise date/time extraction assistant for a reminder bot.

CURRENT DATE AND TIME: {current} ({timezone})
CURRENT DAY OF WEEK: {weekday}

Your task: Extract reminder information from user messages, keeping the
reminder text in the user's language.

RULES FOR DATE/TIME CALCULATION:

1. RELATIVE TIME: "in X hours/minutes/days" = current time + X;
   "in half an hour" = current time + 30 minutes.
2. SPECIFIC DATES WITHOUT YEAR: "on the 10th" = 10th of the CURRENT month
   if not passed, otherwise NEXT month; month names mean the NEAREST future
   occurrence.
3. DAYS OF WEEK: "on Sunday" = NEAREST FUTURE occurrence; "next Monday" =
   next week's Monday.
4. COMPLEX EXPRESSIONS: "X hours before <event>" = event time - X hours.
5. NO TIME SPECIFIED: if the message has no time/date information at all,
   return datetime: null.
6. DEFAULT TIME: a date without a time means 09:00 that day.

CRITICAL: Never return a past date/time. Always calculate relative to {current}.

EXTRACT:
1. text: the reminder content (what to remind about), starting with a capital letter
2. datetime: "YYYY-MM-DD HH:MM:SS" or null if no time is specified
3. timezone: "{timezone}"

Return ONLY a JSON object:
{{"text": "reminder text", "datetime": "YYYY-MM-DD HH:MM:SS" or null, "timezone": "{timezone}"}}"#
        )
    }
}

#[async_trait]
impl Interpreter for OpenAiInterpreter {
    async fn extract(&self, text: &str) -> Result<Option<ReminderDraft>> {
        let system_prompt = self.extraction_prompt();

        info!("Requesting reminder extraction: model={}", self.model);
        let base_delays: [u64; 4] = [2, 4, 6, 8];
        let content =
            retry_with_backoff(|| self.complete(&system_prompt, text), &base_delays, 3).await?;

        parse_draft(&content, &self.timezone)
    }

    async fn extract_forwarded(&self, forwarded_text: &str) -> Result<Option<ReminderDraft>> {
        let prompt = format!(
            "Convert this forwarded message into a short, actionable reminder task.\n\
             Do NOT include words like \"remind\" - just the action itself.\n\
             If there's a date/time mentioned, extract it. If not, datetime should be null.\n\n\
             Forwarded message: {forwarded_text}"
        );
        self.extract(&prompt).await
    }

    async fn transcribe(&self, audio: Vec<u8>) -> Result<Option<String>> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        info!("Transcribing voice note ({} bytes)", audio.len());
        let base_delays: [u64; 2] = [2, 4];
        let response = retry_with_backoff(
            || async {
                let part = reqwest::multipart::Part::bytes(audio.clone())
                    .file_name("voice.ogg")
                    .mime_str("audio/ogg")
                    .map_err(|e| Error::Interpretation(format!("bad audio payload: {e}")))?;
                let form = reqwest::multipart::Form::new()
                    .text("model", "whisper-1")
                    .part("file", part);

                self.client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .multipart(form)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| {
                        Error::Interpretation(format!("transcription service unavailable: {e}"))
                    })?
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| {
                        Error::Interpretation(format!("invalid transcription reply: {e}"))
                    })
            },
            &base_delays,
            1,
        )
        .await?;

        let text = response["text"].as_str().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        info!("Transcribed voice note: {text}");
        Ok(Some(text))
    }

    fn default_timezone(&self) -> &str {
        &self.timezone
    }
}

/// Strip the markdown code fences some models wrap JSON replies in.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the oracle's JSON reply into a draft. `Ok(None)` when the reply is
/// null or carries no task text.
fn parse_draft(raw: &str, fallback_tz: &str) -> Result<Option<ReminderDraft>> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| Error::Interpretation(format!("unparseable oracle reply: {e}")))?;

    if value.is_null() {
        return Ok(None);
    }

    let Some(text) = value["text"].as_str().map(str::trim).filter(|t| !t.is_empty()) else {
        warn!("Oracle reply is missing reminder text: {cleaned}");
        return Ok(None);
    };

    let due_at = match value["datetime"].as_str() {
        None => None,
        Some(s) => Some(
            NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map_err(|_| Error::Validation("invalid datetime format".to_string()))?,
        ),
    };

    let timezone = value["timezone"]
        .as_str()
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback_tz)
        .to_string();

    Ok(Some(ReminderDraft {
        text: text.to_string(),
        due_at,
        timezone,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn parses_full_draft() {
        let draft = parse_draft(
            r#"{"text": "Call mom", "datetime": "2030-01-10 15:00:00", "timezone": "Europe/Moscow"}"#,
            "UTC",
        )
        .unwrap()
        .unwrap();

        assert_eq!(draft.text, "Call mom");
        assert_eq!(
            draft.due_at.unwrap().format(DATETIME_FORMAT).to_string(),
            "2030-01-10 15:00:00"
        );
        assert_eq!(draft.timezone, "Europe/Moscow");
    }

    #[test]
    fn null_datetime_means_timeless() {
        let draft = parse_draft(r#"{"text": "Buy milk", "datetime": null}"#, "UTC")
            .unwrap()
            .unwrap();
        assert!(draft.due_at.is_none());
        assert_eq!(draft.timezone, "UTC");
    }

    #[test]
    fn null_reply_means_no_reminder() {
        assert!(parse_draft("null", "UTC").unwrap().is_none());
    }

    #[test]
    fn missing_text_means_no_reminder() {
        assert!(parse_draft(r#"{"datetime": null}"#, "UTC").unwrap().is_none());
    }

    #[test]
    fn bad_datetime_is_a_validation_error() {
        let err = parse_draft(r#"{"text": "Call", "datetime": "tomorrow"}"#, "UTC").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn garbage_reply_is_an_interpretation_error() {
        let err = parse_draft("I could not parse that", "UTC").unwrap_err();
        assert!(matches!(err, Error::Interpretation(_)));
    }

    #[test]
    fn extraction_prompt_names_the_timezone() {
        let interpreter =
            OpenAiInterpreter::new("key".to_string(), "Europe/Moscow".to_string());
        let prompt = interpreter.extraction_prompt();
        assert!(prompt.contains("Europe/Moscow"));
        assert!(prompt.contains("CURRENT DAY OF WEEK"));
    }
}
