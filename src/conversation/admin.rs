//! Admin panel and single-shot admin input.
//!
//! Everything here is silently ignored for anyone but the configured admin.

use super::engine::{money, Ctx, Engine};
use super::session::{AdminAction, Flow};
use super::types::{Button, Keyboard, Reply};
use crate::core::error::AppResult;
use crate::storage::{db, files};

/// Parses an admin amount; a comma works as the decimal separator.
fn parse_admin_amount(field: &str) -> Option<f64> {
    field.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Engine {
    pub(super) fn admin_panel(&self, ctx: &Ctx, edit: bool) -> Vec<Reply> {
        if !self.is_admin(ctx) {
            return Vec::new();
        }
        let keyboard = Keyboard::Inline(vec![
            vec![Button::callback(ctx.t("admin-userinfo-button"), "a_userinfo")],
            vec![
                Button::callback(ctx.t("admin-addbal-button"), "a_addbal"),
                Button::callback(ctx.t("admin-setbal-button"), "a_setbal"),
            ],
            vec![Button::callback(ctx.t("admin-files-button"), "a_files:0")],
            vec![Button::callback(ctx.t("back-button"), "back")],
        ]);
        let text = ctx.t("admin-title");
        if edit {
            vec![Reply::edit(text, keyboard)]
        } else {
            vec![Reply::with_keyboard(text, keyboard)]
        }
    }

    pub(super) fn admin_prompt(&self, ctx: &Ctx, action: AdminAction) -> Vec<Reply> {
        if !self.is_admin(ctx) {
            return Vec::new();
        }
        self.sessions.start(ctx.telegram_id, Flow::AdminInput(action));
        let key = match action {
            AdminAction::UserInfo => "admin-ask-userinfo",
            AdminAction::AddBalance => "admin-ask-addbal",
            AdminAction::SetBalance => "admin-ask-setbal",
        };
        vec![Reply::text(ctx.t(key))]
    }

    /// Consumes one message for a pending admin action. The action has already
    /// been cleared, whatever the outcome here.
    pub(super) fn admin_input(&self, ctx: &Ctx, action: AdminAction, text: &str) -> AppResult<Vec<Reply>> {
        if !self.is_admin(ctx) {
            return Ok(Vec::new());
        }

        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != action.arity() {
            return Ok(vec![Reply::text(ctx.t("admin-bad-input"))]);
        }
        let Ok(target_tg) = fields[0].parse::<i64>() else {
            return Ok(vec![Reply::text(ctx.t("admin-bad-input"))]);
        };
        let amount = match action {
            AdminAction::UserInfo => None,
            AdminAction::AddBalance | AdminAction::SetBalance => match parse_admin_amount(fields[1]) {
                Some(amount) => Some(amount),
                None => return Ok(vec![Reply::text(ctx.t("admin-bad-input"))]),
            },
        };

        let conn = db::get_connection(&self.db)?;
        let Some(target) = db::get_user(&conn, target_tg)? else {
            return Ok(vec![Reply::text(ctx.t("admin-user-not-found"))]);
        };

        match (action, amount) {
            (AdminAction::AddBalance, Some(delta)) => db::adjust_balance(&conn, target.id, delta)?,
            (AdminAction::SetBalance, Some(value)) => db::set_balance(&conn, target.id, value)?,
            _ => {
                let file_count = files::count_files(&conn, target.id)?;
                let paid = db::total_payments(&conn, target.id)?;
                return Ok(vec![Reply::text(ctx.tr(
                    "admin-user-info",
                    &[
                        ("id", target.id.to_string()),
                        ("telegram", target.telegram_id.to_string()),
                        ("balance", money(target.balance)),
                        ("files", file_count.to_string()),
                        ("paid", money(paid)),
                    ],
                ))]);
            }
        }

        let balance = db::get_balance(&conn, target.id)?;
        log::info!(
            "👮 Admin {} changed balance of {} to {:.2} ({:?})",
            ctx.telegram_id,
            target.telegram_id,
            balance,
            action
        );
        Ok(vec![Reply::text(ctx.tr(
            "admin-balance-updated",
            &[("telegram", target.telegram_id.to_string()), ("balance", money(balance))],
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_amounts() {
        assert_eq!(parse_admin_amount("50"), Some(50.0));
        assert_eq!(parse_admin_amount("-2,5"), Some(-2.5));
        assert_eq!(parse_admin_amount("x"), None);
        assert_eq!(parse_admin_amount("inf"), None);
    }
}
