use std::sync::Arc;

use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::prelude::*;
use unic_langid::LanguageIdentifier;

use crate::i18n;
use crate::server::{DownloadEvent, EventReceiver};
use crate::storage::db::{self, DbPool};

/// Localized download notice for the file owner.
pub fn format_download_notice(lang: &LanguageIdentifier, event: &DownloadEvent) -> String {
    let mut args = FluentArgs::new();
    args.set("file", event.file_name.clone());
    args.set("slug", event.slug.clone());
    args.set("ip", event.ip.clone());
    args.set("city", event.location.city.clone());
    args.set("country", event.location.country.clone());
    args.set("device", event.agent.device());
    args.set("os", event.agent.os());
    args.set("browser", event.agent.browser());
    i18n::t_args(lang, "download-notify", &args)
}

/// Drains download events until every sender is gone.
///
/// Owners are notified in the default language; the language of their last
/// message is not stored.
pub async fn run_download_notifications(bot: Bot, db_pool: Arc<DbPool>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        let owner = match db::get_connection(&db_pool) {
            Ok(conn) => db::get_telegram_id(&conn, event.owner_id),
            Err(e) => {
                log::error!("Failed to get DB connection for download notification: {}", e);
                continue;
            }
        };
        let chat_id = match owner {
            Ok(Some(telegram_id)) => ChatId(telegram_id),
            Ok(None) => {
                log::warn!("Owner {} of {} not found, notification dropped", event.owner_id, event.slug);
                continue;
            }
            Err(e) => {
                log::error!("Failed to resolve owner {}: {}", event.owner_id, e);
                continue;
            }
        };

        let text = format_download_notice(&i18n::DEFAULT_LANG, &event);
        if let Err(e) = bot.send_message(chat_id, text).await {
            log::error!("Failed to send download notification to {}: {}", chat_id, e);
        } else {
            log::info!("🔔 Download of {} reported to {}", event.slug, chat_id);
        }
    }
    log::info!("Download notification channel closed");
}
