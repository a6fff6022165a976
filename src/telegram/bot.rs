//! Bot instance creation and the command menu.

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use unic_langid::LanguageIdentifier;

use crate::core::config::{self, Config};
use crate::i18n;

/// Commands shown in the Telegram menu, with their description keys.
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "cmd-start"),
    ("upload", "cmd-upload"),
    ("files", "cmd-files"),
    ("topup", "cmd-topup"),
    ("admin", "cmd-admin"),
];

/// Creates a Bot instance with the custom or the default API URL.
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config.telegram_token.clone(), client);

    let bot = match &config.bot_api_url {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid bot_api_url: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

pub fn command_list(lang: &LanguageIdentifier) -> Vec<BotCommand> {
    COMMANDS
        .iter()
        .map(|(name, key)| BotCommand::new(*name, i18n::t(lang, key)))
        .collect()
}

/// Registers the command menu: Russian by default, English for `en` clients.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(command_list(&i18n::DEFAULT_LANG)).await?;
    bot.set_my_commands(command_list(&i18n::lang_from_code("en")))
        .language_code("en")
        .await?;
    Ok(())
}
