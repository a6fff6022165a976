//! Fetches uploaded documents from the Bot API file endpoint.

use std::path::Path;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::conversation::DocumentSource;
use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Where a local Bot API server keeps its files inside the container.
const LOCAL_API_PREFIX: &str = "/var/lib/telegram-bot-api/";

/// `{base}/file/bot{token}/{file_path}`.
pub fn build_file_url(base: &Url, token: &str, file_path: &str) -> AppResult<Url> {
    let mut url = base.clone();
    let normalized = if base.as_str().contains("api.telegram.org") {
        file_path
    } else {
        file_path.strip_prefix(LOCAL_API_PREFIX).unwrap_or(file_path)
    };

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AppError::Config("Bot API URL cannot be a base URL".to_string()))?;
        segments.pop_if_empty();
        segments.push("file");
        segments.push(&format!("bot{token}"));
        for seg in normalized.split('/').filter(|s| !s.is_empty()) {
            segments.push(seg);
        }
    }
    Ok(url)
}

/// [`DocumentSource`] backed by the bot's own file endpoint.
pub struct TelegramDocumentSource {
    bot: Bot,
    client: reqwest::Client,
}

impl TelegramDocumentSource {
    pub fn new(bot: Bot) -> AppResult<Self> {
        // Large documents take longer than any fixed request timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(config::network::timeout())
            .build()?;
        Ok(Self { bot, client })
    }
}

#[async_trait]
impl DocumentSource for TelegramDocumentSource {
    async fn fetch(&self, file_ref: &str, dest: &Path) -> AppResult<u64> {
        let file = self.bot.get_file(FileId(file_ref.to_string())).await?;
        let file_url = build_file_url(&self.bot.api_url(), self.bot.token(), &file.path)?;

        let tmp_path = dest.with_file_name(format!(
            "{}.part",
            dest.file_name().and_then(|n| n.to_str()).unwrap_or("download")
        ));

        let mut resp = self.client.get(file_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Telegram file download failed (path={}, status={}): {}",
                file.path, status, body
            )));
        }

        let mut written = 0u64;
        let result: AppResult<()> = async {
            let mut dst = tokio::fs::File::create(&tmp_path).await?;
            while let Some(chunk) = resp.chunk().await? {
                dst.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            dst.flush().await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(e);
        }
        tokio::fs::rename(&tmp_path, dest).await?;

        log::info!(
            "📦 Document saved to {:?} ({} bytes, {:.2} MB)",
            dest,
            written,
            written as f64 / (1024.0 * 1024.0)
        );
        Ok(written)
    }
}
