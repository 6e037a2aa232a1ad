use crate::command::CommandStrategy;
use remindrs_config::Config;

/// Strategy for creating the configuration template.
pub struct InitStrategy;

impl CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, (): ()) -> anyhow::Result<()> {
        Config::create_config()
    }
}
