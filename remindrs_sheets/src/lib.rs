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

//! Google Sheets implementation of the reminder store.
//!
//! One worksheet, one reminder per row:
//!
//! | datetime | text | timezone | sent | status | comment | forward_author | user_id |
//! |----------|------|----------|------|--------|---------|----------------|---------|
//!
//! Row 1 is the header; row numbers used as reminder ids are 1-based sheet
//! rows, so data starts at row 2.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use remindrs_core::{
    DATETIME_FORMAT, Error, NewReminder, ReminderField, ReminderRow, ReminderStatus,
    ReminderStore, Result,
};
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

pub mod auth;

pub use auth::{ServiceAccountKey, TokenProvider};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
/// First data row; row 1 is the header.
const FIRST_DATA_ROW: u32 = 2;

/// Column letter for a single-cell update.
const fn column(field: ReminderField) -> &'static str {
    match field {
        ReminderField::DueAt => "A",
        ReminderField::Sent => "D",
        ReminderField::Status => "E",
    }
}

/// Reminder store backed by one Google Sheets worksheet.
pub struct SheetsStore {
    client: Client,
    auth: TokenProvider,
    spreadsheet_id: String,
    worksheet: String,
}

impl SheetsStore {
    /// Connect using a service-account credentials file.
    pub fn from_credentials_file(
        credentials: &Path,
        spreadsheet_id: String,
        worksheet: String,
    ) -> Result<Self> {
        let key = ServiceAccountKey::from_file(credentials)?;
        info!("Connected to Google Sheets: {spreadsheet_id}/{worksheet}");
        let client = Client::new();
        Ok(Self {
            auth: TokenProvider::new(client.clone(), key),
            client,
            spreadsheet_id,
            worksheet,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{API_BASE}/{}/values/{}!{range}",
            self.spreadsheet_id, self.worksheet
        )
    }

    async fn get_range(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Persistence(format!("sheet read failed: {e}")))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Persistence(format!("invalid sheet response: {e}")))?;

        let rows = response["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(rows)
    }

    /// Read every data row, skipping rows that fail to decode.
    async fn all_rows(&self) -> Result<Vec<ReminderRow>> {
        let rows = self.get_range(&format!("A{FIRST_DATA_ROW}:H")).await?;
        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, cells)| {
                let row_number = FIRST_DATA_ROW + u32::try_from(i).unwrap_or(u32::MAX);
                decode_row(row_number, cells)
            })
            .collect())
    }
}

#[async_trait]
impl ReminderStore for SheetsStore {
    async fn append(&self, reminder: &NewReminder) -> Result<u32> {
        let token = self.auth.token().await?;
        let cells = encode_row(reminder);

        info!("Adding reminder row: {cells:?}");
        let response = self
            .client
            .post(format!(
                "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
                self.values_url("A:H")
            ))
            .bearer_auth(token)
            .json(&json!({ "values": [cells] }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Persistence(format!("sheet append failed: {e}")))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Persistence(format!("invalid append response: {e}")))?;

        response["updates"]["updatedRange"]
            .as_str()
            .and_then(row_from_range)
            .ok_or_else(|| Error::Persistence("append response has no updated range".to_string()))
    }

    async fn update_cell(&self, row: u32, field: ReminderField, value: &str) -> Result<()> {
        let token = self.auth.token().await?;
        let cell = format!("{}{row}", column(field));

        self.client
            .put(format!(
                "{}?valueInputOption=RAW",
                self.values_url(&cell)
            ))
            .bearer_auth(token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Persistence(format!("sheet update failed: {e}")))?;

        info!("Updated row {row} cell {cell} to {value:?}");
        Ok(())
    }

    async fn list_due_candidates(&self) -> Result<Vec<ReminderRow>> {
        Ok(self
            .all_rows()
            .await?
            .into_iter()
            .filter(|r| r.due_at.is_some() && !r.sent)
            .collect())
    }

    async fn list_undated(&self) -> Result<Vec<ReminderRow>> {
        Ok(self
            .all_rows()
            .await?
            .into_iter()
            .filter(|r| r.due_at.is_none() && !r.status.is_closed())
            .collect())
    }

    async fn get(&self, row: u32) -> Result<Option<ReminderRow>> {
        let rows = self.get_range(&format!("A{row}:H{row}")).await?;
        Ok(rows.first().and_then(|cells| decode_row(row, cells)))
    }
}

/// Serialize an append request into the 8-column row layout.
fn encode_row(reminder: &NewReminder) -> Vec<String> {
    vec![
        reminder
            .due_at
            .map(|d| d.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
        reminder.text.clone(),
        reminder.timezone.clone(),
        "FALSE".to_string(),
        String::new(),
        reminder.comment.clone().unwrap_or_default(),
        reminder.forward_author.clone().unwrap_or_default(),
        reminder.user_id.map(|id| id.to_string()).unwrap_or_default(),
    ]
}

/// Decode one sheet row. Returns `None` for rows without task text or with
/// an unreadable datetime cell.
fn decode_row(row_number: u32, cells: &[String]) -> Option<ReminderRow> {
    let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or_default();

    let text = cell(1).trim();
    if text.is_empty() {
        return None;
    }

    let due_at = match cell(0).trim() {
        "" => None,
        s => match NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
            Ok(d) => Some(d),
            Err(_) => {
                warn!("Row {row_number}: unreadable datetime cell {s:?}, skipping row");
                return None;
            }
        },
    };

    let optional = |i: usize| {
        let v = cell(i).trim();
        (!v.is_empty()).then(|| v.to_string())
    };

    Some(ReminderRow {
        row: row_number,
        text: text.to_string(),
        due_at,
        timezone: cell(2).trim().to_string(),
        sent: cell(3).trim().eq_ignore_ascii_case("true"),
        status: ReminderStatus::parse(cell(4)),
        comment: optional(5),
        forward_author: optional(6),
        user_id: optional(7).and_then(|v| v.parse().ok()),
    })
}

/// Extract the 1-based row number from an A1 range like `reminders!A5:H5`.
fn row_from_range(range: &str) -> Option<u32> {
    let cell = range.rsplit('!').next()?.split(':').next()?;
    let digits: String = cell.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
