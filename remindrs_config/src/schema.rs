use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub providers: ProvidersConfig,
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    pub token: String,
    /// Chat that receives due-reminder notifications and weekly reviews.
    pub chat_id: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SheetsConfig {
    /// Path to the service-account credentials JSON.
    pub credentials: String,
    pub spreadsheet_id: String,
    #[serde(default = "SheetsConfig::default_worksheet")]
    pub worksheet: String,
}

impl SheetsConfig {
    fn default_worksheet() -> String {
        "reminders".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemindersConfig {
    #[serde(default = "RemindersConfig::default_timezone")]
    pub timezone: String,
    /// How long a buffered message stays eligible for pairing with a
    /// forwarded counterpart, in seconds.
    #[serde(default = "RemindersConfig::default_link_timeout")]
    pub link_timeout_secs: u64,
    /// How long an unpaired message waits before it is processed solo.
    #[serde(default = "RemindersConfig::default_solo_wait")]
    pub solo_wait_secs: u64,
    /// Weekday of the undated-reminder review ("sun", "monday", ...).
    #[serde(default = "RemindersConfig::default_review_weekday")]
    pub weekly_review_weekday: String,
    /// Local hour (0-23) of the weekly review.
    #[serde(default = "RemindersConfig::default_review_hour")]
    pub weekly_review_hour: u32,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            timezone: Self::default_timezone(),
            link_timeout_secs: Self::default_link_timeout(),
            solo_wait_secs: Self::default_solo_wait(),
            weekly_review_weekday: Self::default_review_weekday(),
            weekly_review_hour: Self::default_review_hour(),
        }
    }
}

impl RemindersConfig {
    fn default_timezone() -> String {
        "Europe/Moscow".to_string()
    }

    const fn default_link_timeout() -> u64 {
        30
    }

    const fn default_solo_wait() -> u64 {
        15
    }

    fn default_review_weekday() -> String {
        "sun".to_string()
    }

    const fn default_review_hour() -> u32 {
        10
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "telegram": {
    "token": "your-telegram-bot-token-here",
    "chat_id": 0
  },
  "providers": {
    "openai": {
      "api_key": "your-openai-api-key-here"
    }
  },
  "sheets": {
    "credentials": "credentials.json",
    "spreadsheet_id": "your-spreadsheet-id-here",
    "worksheet": "reminders"
  },
  "reminders": {
    "timezone": "Europe/Moscow",
    "link_timeout_secs": 30,
    "solo_wait_secs": 15,
    "weekly_review_weekday": "sun",
    "weekly_review_hour": 10
  }
}"#;

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("remindrs");

        let config_path = config_dir.join("config.json");

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'remindrs init' to create config.",
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("remindrs");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Next steps:");
        println!("   1. Add your Telegram bot token and the chat id for notifications");
        println!("   2. Add your OpenAI API key");
        println!("   3. Point \"sheets.credentials\" at a service-account JSON with");
        println!("      access to the reminders spreadsheet");
        println!("   4. Run 'remindrs bot' to start the bot");
        println!();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn template_parses() {
        let config: Config = serde_json::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.sheets.worksheet, "reminders");
        assert_eq!(config.reminders.link_timeout_secs, 30);
        assert!(config.reminders.solo_wait_secs < config.reminders.link_timeout_secs);
    }

    #[test]
    fn reminder_section_is_optional() {
        let config: Config = serde_json::from_str(
            r#"{
              "telegram": {"token": "t", "chat_id": 1},
              "providers": {"openai": {"api_key": "k"}},
              "sheets": {"credentials": "c.json", "spreadsheet_id": "s"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.reminders.timezone, "Europe/Moscow");
        assert_eq!(config.reminders.weekly_review_weekday, "sun");
        assert_eq!(config.reminders.weekly_review_hour, 10);
        assert_eq!(config.sheets.worksheet, "reminders");
    }
}
