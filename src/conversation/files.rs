//! File list, per-file controls, link rename, log export and delete.

use std::path::Path;

use chrono::NaiveDateTime;

use super::engine::{money, Ctx, Engine};
use super::session::Flow;
use super::types::{Button, Keyboard, Reply};
use super::upload::is_valid_slug;
use crate::core::config::pagination::FILES_PER_PAGE;
use crate::core::error::AppResult;
use crate::storage::files::{self, FileInsertError, FileRecord};
use crate::storage::{db, download_log};

/// Human-readable size.
pub fn format_size(bytes: i64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    let b = bytes.max(0) as f64;
    if b >= GIB {
        format!("{:.2} GB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats an SQLite `YYYY-MM-DD HH:MM:SS` timestamp for display.
fn format_created(raw: &str) -> String {
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        Ok(dt) => format!("{} UTC", dt.format("%d.%m.%Y %H:%M")),
        Err(_) => raw.to_string(),
    }
}

/// Returns the slice bounds and the number of pages; `page` is clamped.
fn page_bounds(total: usize, page: usize) -> (usize, usize, usize, usize) {
    let pages = total.div_ceil(FILES_PER_PAGE).max(1);
    let page = page.min(pages - 1);
    let start = page * FILES_PER_PAGE;
    let end = (start + FILES_PER_PAGE).min(total);
    (page, start, end, pages)
}

fn nav_row(ctx: &Ctx, action: &str, page: usize, pages: usize, back: &str) -> Vec<Button> {
    let mut row = Vec::new();
    if page > 0 {
        row.push(Button::callback("◀️", format!("{action}:{}", page - 1)));
    }
    if page + 1 < pages {
        row.push(Button::callback("▶️", format!("{action}:{}", page + 1)));
    }
    row.push(Button::callback(ctx.t("back-button"), back));
    row
}

impl Engine {
    fn can_manage(&self, ctx: &Ctx, file: &FileRecord) -> bool {
        file.user_id == ctx.user.id || self.is_admin(ctx)
    }

    /// Looks the file up and checks the caller may touch it. On `Err` the
    /// replies are final: a toast for a missing file, nothing for a stranger.
    fn managed_file(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Result<FileRecord, Vec<Reply>>> {
        let conn = db::get_connection(&self.db)?;
        match files::get_file_by_storage_name(&conn, storage_name)? {
            None => Ok(Err(vec![Reply::Toast(ctx.t("file-not-found"))])),
            Some(file) if !self.can_manage(ctx, &file) => Ok(Err(Vec::new())),
            Some(file) => Ok(Ok(file)),
        }
    }

    /// The caller's own files, `FILES_PER_PAGE` per page.
    pub(super) fn file_list(&self, ctx: &Ctx, page: usize, edit: bool) -> AppResult<Vec<Reply>> {
        let all = {
            let conn = db::get_connection(&self.db)?;
            files::list_files(&conn, ctx.user.id)?
        };

        let (text, keyboard) = if all.is_empty() {
            (
                ctx.t("files-empty"),
                Keyboard::Inline(vec![vec![Button::callback(ctx.t("back-button"), "back")]]),
            )
        } else {
            let (page, start, end, pages) = page_bounds(all.len(), page);
            let mut rows: Vec<Vec<Button>> = all[start..end]
                .iter()
                .map(|f| vec![Button::callback(f.local_name.clone(), format!("manage:{}", f.storage_name))])
                .collect();
            rows.push(nav_row(ctx, "files", page, pages, "back"));
            (
                ctx.tr(
                    "files-title",
                    &[("page", (page + 1).to_string()), ("pages", pages.to_string())],
                ),
                Keyboard::Inline(rows),
            )
        };

        Ok(vec![if edit {
            Reply::edit(text, keyboard)
        } else {
            Reply::with_keyboard(text, keyboard)
        }])
    }

    /// Every stored file, labelled by link. Admin only.
    pub(super) fn admin_file_list(&self, ctx: &Ctx, page: usize) -> AppResult<Vec<Reply>> {
        if !self.is_admin(ctx) {
            return Ok(Vec::new());
        }
        let all = {
            let conn = db::get_connection(&self.db)?;
            files::list_all_files(&conn)?
        };
        if all.is_empty() {
            return Ok(vec![Reply::edit(
                ctx.t("files-empty"),
                Keyboard::Inline(vec![vec![Button::callback(ctx.t("back-button"), "admin")]]),
            )]);
        }

        let (page, start, end, pages) = page_bounds(all.len(), page);
        let mut rows: Vec<Vec<Button>> = all[start..end]
            .iter()
            .map(|f| {
                let mark = if f.notify { "🔔" } else { "🔕" };
                vec![Button::callback(
                    format!("{mark} {}", f.link),
                    format!("manage:{}", f.storage_name),
                )]
            })
            .collect();
        rows.push(nav_row(ctx, "a_files", page, pages, "admin"));

        Ok(vec![Reply::edit(
            ctx.tr(
                "admin-files-title",
                &[
                    ("count", all.len().to_string()),
                    ("page", (page + 1).to_string()),
                    ("pages", pages.to_string()),
                ],
            ),
            Keyboard::Inline(rows),
        )])
    }

    /// Details and controls for one file.
    pub(super) fn manage_view(&self, ctx: &Ctx, file: &FileRecord, edit: bool) -> Reply {
        let storage = &file.storage_name;
        let back = if file.user_id == ctx.user.id { "files:0" } else { "a_files:0" };
        let keyboard = Keyboard::Inline(vec![
            vec![
                Button::callback(ctx.t("file-link-button"), format!("link:{storage}")),
                Button::callback(ctx.t("file-notify-button"), format!("notify:{storage}")),
            ],
            vec![
                Button::callback(ctx.t("file-logs-button"), format!("logs:{storage}")),
                Button::callback(ctx.t("file-delete-button"), format!("delete:{storage}")),
            ],
            vec![Button::callback(ctx.t("back-button"), back)],
        ]);
        let notify = if file.notify {
            ctx.t("notify-state-on")
        } else {
            ctx.t("notify-state-off")
        };
        let text = ctx.tr(
            "file-details",
            &[
                ("name", file.local_name.clone()),
                ("link", file.link.clone()),
                ("size", format_size(file.size)),
                ("created", format_created(&file.created_at)),
                ("notify", notify),
            ],
        );
        if edit {
            Reply::edit(text, keyboard)
        } else {
            Reply::with_keyboard(text, keyboard)
        }
    }

    /// `manage:<storage>`
    pub(super) fn manage(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Vec<Reply>> {
        Ok(match self.managed_file(ctx, storage_name)? {
            Ok(file) => vec![self.manage_view(ctx, &file, true)],
            Err(replies) => replies,
        })
    }

    /// `notify:<storage>`
    pub(super) fn toggle_notify(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Vec<Reply>> {
        let mut file = match self.managed_file(ctx, storage_name)? {
            Ok(file) => file,
            Err(replies) => return Ok(replies),
        };
        file.notify = !file.notify;
        {
            let conn = db::get_connection(&self.db)?;
            files::set_notify(&conn, file.id, file.notify)?;
        }
        let toast = if file.notify { "notify-enabled" } else { "notify-disabled" };
        Ok(vec![Reply::Toast(ctx.t(toast)), self.manage_view(ctx, &file, true)])
    }

    /// `link:<storage>` starts the single-shot rename.
    pub(super) fn start_rename(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Vec<Reply>> {
        let file = match self.managed_file(ctx, storage_name)? {
            Ok(file) => file,
            Err(replies) => return Ok(replies),
        };
        self.sessions.start(
            ctx.telegram_id,
            Flow::RenameLink {
                storage_name: file.storage_name,
            },
        );
        let domain = self.config.domain.trim_end_matches('/').to_string();
        Ok(vec![Reply::text(ctx.tr("rename-ask", &[("domain", domain)]))])
    }

    /// Consumes the message following `link:`. The request is already
    /// cleared, whatever the outcome.
    pub(super) fn rename_link(&self, ctx: &Ctx, storage_name: &str, text: &str) -> AppResult<Vec<Reply>> {
        let slug = text.trim();
        if !is_valid_slug(slug) {
            return Ok(vec![Reply::text(ctx.t("rename-invalid"))]);
        }
        let conn = db::get_connection(&self.db)?;
        let Some(file) = files::get_file_by_storage_name(&conn, storage_name)? else {
            return Ok(vec![Reply::text(ctx.t("file-not-found"))]);
        };
        if !self.can_manage(ctx, &file) {
            return Ok(Vec::new());
        }

        let link = self.config.public_link(slug);
        match files::update_link(&conn, file.id, &link) {
            Ok(()) => {
                log::info!("🔗 File {} moved from {} to {}", file.id, file.link, link);
                Ok(vec![Reply::text(ctx.tr("rename-done", &[("link", link)]))])
            }
            Err(FileInsertError::LinkTaken) => Ok(vec![Reply::text(ctx.t("rename-taken"))]),
            Err(FileInsertError::Database(e)) => Err(e.into()),
        }
    }

    /// `logs:<storage>` sends the download log as CSV.
    pub(super) fn export_logs(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Vec<Reply>> {
        let file = match self.managed_file(ctx, storage_name)? {
            Ok(file) => file,
            Err(replies) => return Ok(replies),
        };
        let entries = {
            let conn = db::get_connection(&self.logs)?;
            download_log::list_entries(&conn, file.id)?
        };
        if entries.is_empty() {
            return Ok(vec![Reply::Toast(ctx.t("logs-empty"))]);
        }
        Ok(vec![Reply::Document {
            file_name: format!("downloads_{}.csv", file.id),
            content: download_log::to_csv(&entries).into_bytes(),
            caption: Some(ctx.tr(
                "logs-caption",
                &[("name", file.local_name.clone()), ("count", entries.len().to_string())],
            )),
        }])
    }

    /// `delete:<storage>`: bytes, row, log table, then the refund.
    ///
    /// The refund is credited even when the bytes could not be removed.
    pub(super) async fn delete_file(&self, ctx: &Ctx, storage_name: &str) -> AppResult<Vec<Reply>> {
        let file = match self.managed_file(ctx, storage_name)? {
            Ok(file) => file,
            Err(replies) => return Ok(replies),
        };

        let path = Path::new(&self.config.file_storage_path).join(&file.storage_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("⚠️ Could not remove stored bytes {:?}: {}", path, e);
        }

        let deleted = {
            let conn = db::get_connection(&self.db)?;
            files::delete_file(&conn, file.id)?
        };
        // Owner and admin may press delete at the same time; only one refunds.
        if !deleted {
            log::debug!("File {} was already deleted", file.id);
            return Ok(vec![Reply::Toast(ctx.t("file-not-found"))]);
        }
        match db::get_connection(&self.logs) {
            Ok(conn) => {
                if let Err(e) = download_log::drop_log(&conn, file.id) {
                    log::warn!("⚠️ Could not drop download log of file {}: {}", file.id, e);
                }
            }
            Err(e) => log::warn!("⚠️ Download log database unavailable: {}", e),
        }
        // Refunded even when the bytes could not be removed; not one transaction with the delete.
        {
            let conn = db::get_connection(&self.db)?;
            db::adjust_balance(&conn, file.user_id, self.config.price_refund)?;
        }
        log::info!(
            "🗑 File {} ({}) deleted by {}, refunded {:.2} to user {}",
            file.id,
            file.link,
            ctx.telegram_id,
            self.config.price_refund,
            file.user_id
        );

        let mut replies = vec![Reply::Toast(
            ctx.tr("file-deleted", &[("refund", money(self.config.price_refund))]),
        )];
        if file.user_id == ctx.user.id {
            replies.extend(self.file_list(ctx, 0, true)?);
        } else {
            replies.extend(self.admin_file_list(ctx, 0)?);
        }
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn created_dates() {
        assert_eq!(format_created("2024-03-09 17:05:44"), "09.03.2024 17:05 UTC");
        assert_eq!(format_created("yesterday"), "yesterday");
    }

    #[test]
    fn pagination_clamps() {
        assert_eq!(page_bounds(0, 0), (0, 0, 0, 1));
        assert_eq!(page_bounds(8, 0), (0, 0, 8, 1));
        assert_eq!(page_bounds(9, 1), (1, 8, 9, 2));
        assert_eq!(page_bounds(9, 7), (1, 8, 9, 2));
    }
}
