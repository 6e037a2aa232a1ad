use crate::command::CommandStrategy;
use remindrs_config::Config;
use remindrs_core::{Interpreter, ReminderStore};
use remindrs_providers::OpenAiInterpreter;
use remindrs_sheets::SheetsStore;
use remindrs_telegram::ReminderBot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Strategy for running the Telegram bot.
pub struct BotStrategy;

impl CommandStrategy for BotStrategy {
    type Input = ();

    async fn execute(&self, (): ()) -> anyhow::Result<()> {
        let config = Config::load()?;

        if config.telegram.token.is_empty() {
            anyhow::bail!("Telegram bot token not configured. Set \"telegram.token\" in config");
        }
        if config.providers.openai.api_key.is_empty() {
            anyhow::bail!("OpenAI API key not configured. Set \"providers.openai.api_key\" in config");
        }

        info!("Starting Telegram bot...");

        let interpreter: Arc<dyn Interpreter> = Arc::new(OpenAiInterpreter::new(
            config.providers.openai.api_key.clone(),
            config.reminders.timezone.clone(),
        ));

        // A relative credentials path is looked up next to the config file.
        let credentials = PathBuf::from(&config.sheets.credentials);
        let credentials = if credentials.is_absolute() {
            credentials
        } else {
            Config::ensure_config_dir()?.join(credentials)
        };

        let store: Arc<dyn ReminderStore> = Arc::new(SheetsStore::from_credentials_file(
            &credentials,
            config.sheets.spreadsheet_id.clone(),
            config.sheets.worksheet.clone(),
        )?);

        let bot = ReminderBot::new(
            config.telegram.token.clone(),
            config.telegram.chat_id,
            interpreter,
            store,
            &config.reminders,
        )?;

        info!("Telegram bot is running. Press Ctrl+C to stop.");
        bot.run().await?;

        Ok(())
    }
}
