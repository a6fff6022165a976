//! Upload flow: document, display name, slug, notify choice, finalize.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::engine::{money, Ctx, Engine};
use super::session::{Flow, PendingUpload, UploadStep};
use super::types::{DocumentRef, Keyboard, Reply};
use crate::core::error::AppResult;
use crate::core::pricing;
use crate::storage::db;
use crate::storage::files::{self, FileInsertError, NewFile};

/// Paths the delivery endpoint serves itself.
const RESERVED_SLUGS: &[&str] = &["health"];

/// A slug is 1 to 64 characters of `[A-Za-z0-9._-]`, not only dots.
pub fn is_valid_slug(slug: &str) -> bool {
    lazy_regex::regex_is_match!(r"^[A-Za-z0-9._-]{1,64}$", slug)
        && !slug.chars().all(|c| c == '.')
        && !RESERVED_SLUGS.contains(&slug)
}

/// Random at-rest name, unrelated to the public slug.
pub fn new_storage_name(user_id: i64) -> String {
    format!("{}_{}", user_id, Uuid::new_v4().simple())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("⚠️ Failed to remove {:?}: {}", path, e);
        }
    }
}

impl Engine {
    pub(super) fn upload_prompt(&self, ctx: &Ctx) -> Vec<Reply> {
        vec![Reply::text(ctx.tr(
            "upload-send-file",
            &[("price", money(self.config.price_upload))],
        ))]
    }

    /// A document arrived outside any other flow.
    pub(super) fn start_upload(&self, ctx: &Ctx, document: DocumentRef) -> Vec<Reply> {
        if matches!(self.sessions.peek(ctx.telegram_id), Some(Flow::Upload(_))) {
            return vec![Reply::text(ctx.t("upload-finish-current"))];
        }

        let cost = pricing::upload_cost_for(&self.config, document.size);
        if ctx.user.balance < cost {
            return vec![Reply::text(ctx.tr(
                "upload-insufficient",
                &[("cost", money(cost)), ("balance", money(ctx.user.balance))],
            ))];
        }

        log::info!(
            "📥 User {} started upload of {:?} ({} bytes, cost {:.2})",
            ctx.telegram_id,
            document.file_name,
            document.size,
            cost
        );
        self.sessions.start(
            ctx.telegram_id,
            Flow::Upload(PendingUpload {
                document,
                cost,
                step: UploadStep::AwaitingName,
            }),
        );
        vec![Reply::text(ctx.tr("upload-ask-name", &[("cost", money(cost))]))]
    }

    /// Advances a pending upload. The flow was taken out of the store; it is
    /// put back whenever the user stays in it.
    pub(super) async fn upload_step(&self, ctx: &Ctx, mut pending: PendingUpload, text: &str) -> AppResult<Vec<Reply>> {
        let id = ctx.telegram_id;
        match pending.step.clone() {
            UploadStep::AwaitingName => {
                let name = text.trim();
                if name.is_empty() {
                    let prompt = ctx.tr("upload-ask-name", &[("cost", money(pending.cost))]);
                    self.sessions.put(id, Flow::Upload(pending));
                    return Ok(vec![Reply::text(prompt)]);
                }
                pending.step = UploadStep::AwaitingSlug { name: name.to_string() };
                self.sessions.put(id, Flow::Upload(pending));
                Ok(vec![self.ask_slug(ctx)])
            }
            UploadStep::AwaitingSlug { name } => {
                let slug = text.trim();
                if !is_valid_slug(slug) {
                    self.sessions.put(id, Flow::Upload(pending));
                    return Ok(vec![Reply::text(ctx.t("upload-invalid-slug"))]);
                }
                pending.step = UploadStep::AwaitingNotify {
                    name,
                    slug: slug.to_string(),
                };
                self.sessions.put(id, Flow::Upload(pending));
                Ok(vec![Reply::with_keyboard(
                    ctx.t("upload-ask-notify"),
                    Keyboard::Reply(vec![vec![ctx.t("upload-notify-yes"), ctx.t("upload-notify-no")]]),
                )])
            }
            UploadStep::AwaitingNotify { name, slug } => {
                let notify = text.trim().to_lowercase() == ctx.t("upload-notify-yes").to_lowercase();
                self.finalize_upload(ctx, pending, name, slug, notify).await
            }
        }
    }

    fn ask_slug(&self, ctx: &Ctx) -> Reply {
        let domain = self.config.domain.trim_end_matches('/').to_string();
        Reply::text(ctx.tr("upload-ask-slug", &[("domain", domain)]))
    }

    /// Fetch, then insert and debit in one transaction. Any failure after the
    /// fetch removes the stored bytes.
    async fn finalize_upload(
        &self,
        ctx: &Ctx,
        pending: PendingUpload,
        name: String,
        slug: String,
        notify: bool,
    ) -> AppResult<Vec<Reply>> {
        let storage_dir = PathBuf::from(&self.config.file_storage_path);
        tokio::fs::create_dir_all(&storage_dir).await?;

        let storage_name = new_storage_name(ctx.user.id);
        let dest = storage_dir.join(&storage_name);

        let written = match self.documents.fetch(&pending.document.file_ref, &dest).await {
            Ok(written) => written,
            Err(e) => {
                log::error!("❌ Failed to fetch document for user {}: {}", ctx.telegram_id, e);
                remove_quietly(&dest).await;
                return Ok(vec![Reply::with_keyboard(ctx.t("upload-save-error"), Keyboard::Remove)]);
            }
        };

        let link = self.config.public_link(&slug);
        let inserted = match db::get_connection(&self.db) {
            Ok(mut conn) => files::insert_paid_file(
                &mut conn,
                &NewFile {
                    user_id: ctx.user.id,
                    local_name: &name,
                    storage_name: &storage_name,
                    link: &link,
                    notify,
                    size: written as i64,
                },
                pending.cost,
            ),
            Err(e) => {
                log::error!("❌ No database connection to save file for user {}: {}", ctx.telegram_id, e);
                remove_quietly(&dest).await;
                return Ok(vec![Reply::with_keyboard(ctx.t("upload-save-error"), Keyboard::Remove)]);
            }
        };

        match inserted {
            Ok(file_id) => {
                log::info!(
                    "✅ User {} uploaded file {} as {} ({} bytes, charged {:.2})",
                    ctx.telegram_id,
                    file_id,
                    link,
                    written,
                    pending.cost
                );
                Ok(vec![Reply::with_keyboard(
                    ctx.tr("upload-done", &[("link", link)]),
                    Keyboard::Remove,
                )])
            }
            Err(FileInsertError::LinkTaken) => {
                remove_quietly(&dest).await;
                self.sessions.put(
                    ctx.telegram_id,
                    Flow::Upload(PendingUpload {
                        step: UploadStep::AwaitingSlug { name },
                        ..pending
                    }),
                );
                Ok(vec![Reply::with_keyboard(ctx.t("upload-link-taken"), Keyboard::Remove)])
            }
            Err(FileInsertError::Database(e)) => {
                log::error!("❌ Failed to save file for user {}: {}", ctx.telegram_id, e);
                remove_quietly(&dest).await;
                Ok(vec![Reply::with_keyboard(ctx.t("upload-save-error"), Keyboard::Remove)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("report-2024.pdf"));
        assert!(is_valid_slug("a"));
        assert!(is_valid_slug(&"x".repeat(64)));

        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug(&"x".repeat(65)));
        assert!(!is_valid_slug("with space"));
        assert!(!is_valid_slug("slash/inside"));
        assert!(!is_valid_slug("кириллица"));
        assert!(!is_valid_slug(".."));
        assert!(!is_valid_slug("health"));
    }

    #[test]
    fn storage_names_are_unique_and_prefixed() {
        let a = new_storage_name(7);
        let b = new_storage_name(7);
        assert_ne!(a, b);
        assert!(a.starts_with("7_"));
        assert_eq!(a.len(), 2 + 32);
    }
}
