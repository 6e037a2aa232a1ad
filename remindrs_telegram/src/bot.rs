use chrono::Weekday;
use chrono_tz::Tz;
use remindrs_config::RemindersConfig;
use remindrs_core::{Interpreter, ReminderRow, ReminderStore, resolve_tz};
use remindrs_correlate::{Correlator, CorrelatorConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::Message;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::assembler::ReminderAssembler;
use crate::command::Command;
use crate::{Error, Result};

/// Telegram reminder bot: correlation core, assembler, and delivery loops
/// behind one dispatcher.
pub struct ReminderBot {
    /// Teloxide bot instance
    pub bot: Bot,
    pub(crate) interpreter: Arc<dyn Interpreter>,
    pub(crate) store: Arc<dyn ReminderStore>,
    pub(crate) assembler: Arc<ReminderAssembler>,
    pub(crate) correlator: Correlator<Message, Arc<ReminderAssembler>>,
    /// Users currently asked to type a deadline for an undated reminder,
    /// mapped to the row awaiting the time.
    pending_time: Arc<Mutex<HashMap<i64, u32>>>,
    /// Fallback chat for notifications when a row carries no user id.
    notify_chat: ChatId,
    timezone_name: String,
    tz: Tz,
    pub(crate) review_weekday: Weekday,
    pub(crate) review_hour: u32,
}

impl ReminderBot {
    /// Create a new reminder bot.
    pub fn new(
        token: String,
        notify_chat_id: i64,
        interpreter: Arc<dyn Interpreter>,
        store: Arc<dyn ReminderStore>,
        reminders: &RemindersConfig,
    ) -> Result<Self> {
        if reminders.solo_wait_secs >= reminders.link_timeout_secs {
            return Err(Error::Config(format!(
                "solo_wait_secs ({}) must be shorter than link_timeout_secs ({})",
                reminders.solo_wait_secs, reminders.link_timeout_secs
            )));
        }

        let bot = Bot::new(token);
        let assembler = Arc::new(ReminderAssembler::new(
            bot.clone(),
            Arc::clone(&interpreter),
            Arc::clone(&store),
        ));
        let correlator = Correlator::with_config(
            Arc::clone(&assembler),
            CorrelatorConfig {
                link_timeout: Duration::from_secs(reminders.link_timeout_secs),
                solo_wait: Duration::from_secs(reminders.solo_wait_secs),
            },
        );

        let review_weekday = reminders.weekly_review_weekday.parse().unwrap_or_else(|_| {
            warn!(
                "Unknown weekly_review_weekday {:?}, using Sunday",
                reminders.weekly_review_weekday
            );
            Weekday::Sun
        });

        Ok(Self {
            bot,
            interpreter,
            store,
            assembler,
            correlator,
            pending_time: Arc::new(Mutex::new(HashMap::new())),
            notify_chat: ChatId(notify_chat_id),
            tz: resolve_tz(&reminders.timezone, "UTC"),
            timezone_name: reminders.timezone.clone(),
            review_weekday,
            review_hour: reminders.weekly_review_hour.min(23),
        })
    }

    #[must_use]
    pub fn timezone_name(&self) -> &str {
        &self.timezone_name
    }

    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Notification target for a stored row.
    pub(crate) fn chat_for(&self, row: &ReminderRow) -> ChatId {
        row.user_id.map_or(self.notify_chat, ChatId)
    }

    /// Start waiting for the user to type a deadline for `row`.
    pub(crate) fn begin_time_input(&self, user_id: i64, row: u32) {
        self.pending_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, row);
    }

    /// Claim a pending deadline input, if one is active for the user.
    pub(crate) fn take_pending_time(&self, user_id: i64) -> Option<u32> {
        self.pending_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
    }

    /// Test connection to the Telegram API with exponential backoff retry.
    /// Starts at 2s, increases by 2s each attempt, max 10s delay.
    /// Retries indefinitely until the connection succeeds.
    async fn test_connection(&self) -> Result<()> {
        const INITIAL_DELAY_SECS: u64 = 2;
        const MAX_DELAY_SECS: u64 = 10;

        let mut attempt = 1u64;
        loop {
            match self.bot.get_me().await {
                Ok(me) => {
                    info!(
                        "Connected to Telegram API: @{} (id: {})",
                        me.user
                            .username
                            .clone()
                            .unwrap_or_else(|| "no username".to_string()),
                        me.user.id
                    );
                    return Ok(());
                }
                Err(e) => {
                    let delay_secs = (INITIAL_DELAY_SECS * attempt).min(MAX_DELAY_SECS);
                    warn!("Connection attempt {attempt} failed: {e}. Retrying in {delay_secs}s...");
                    if attempt == 1 {
                        warn!("This may be due to:");
                        warn!("  - Network connectivity issues");
                        warn!("  - Firewall blocking api.telegram.org");
                        warn!("  - Invalid bot token");
                        warn!("  - Telegram API being temporarily unavailable");
                    }
                    sleep(Duration::from_secs(delay_secs)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run the bot: delivery loops plus the update dispatcher.
    pub async fn run(self) -> Result<()> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::dptree;
        use teloxide::types::Update;

        self.test_connection().await?;

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!("Failed to register bot commands: {e}");
        }

        crate::notify::spawn_loops(self.clone());

        let bot = self.bot.clone();

        let schema = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let this = self.clone();
                move |_bot: Bot, msg: Message| {
                    let this = this.clone();
                    async move { crate::handler::dispatch_message(this, msg).await }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let this = self.clone();
                move |_bot: Bot, query: CallbackQuery| {
                    let this = this.clone();
                    async move { crate::handler::handle_callback(this, query).await }
                }
            }));

        Dispatcher::builder(bot, schema)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

impl Clone for ReminderBot {
    fn clone(&self) -> Self {
        Self {
            bot: self.bot.clone(),
            interpreter: Arc::clone(&self.interpreter),
            store: Arc::clone(&self.store),
            assembler: Arc::clone(&self.assembler),
            correlator: self.correlator.clone(),
            pending_time: Arc::clone(&self.pending_time),
            notify_chat: self.notify_chat,
            tz: self.tz,
            timezone_name: self.timezone_name.clone(),
            review_weekday: self.review_weekday,
            review_hour: self.review_hour,
        }
    }
}
