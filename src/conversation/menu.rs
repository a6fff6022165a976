//! Main menu.

use super::engine::{money, Ctx, Engine};
use super::types::{Button, Keyboard, Reply};

/// Substitutes `%%bal%%`, `%%price%%` and `%%refund%%` in the menu template.
pub fn render_menu_text(template: &str, balance: f64, price: f64, refund: f64) -> String {
    template
        .replace("%%bal%%", &money(balance))
        .replace("%%price%%", &money(price))
        .replace("%%refund%%", &money(refund))
}

impl Engine {
    pub(super) fn main_menu_keyboard(&self, ctx: &Ctx) -> Keyboard {
        let mut rows = vec![
            vec![Button::callback(ctx.t("menu-upload"), "upload")],
            vec![Button::callback(ctx.t("menu-files"), "myfiles")],
            vec![Button::callback(ctx.t("menu-topup"), "topup")],
        ];
        if self.is_admin(ctx) {
            rows.push(vec![Button::callback(ctx.t("menu-admin"), "admin")]);
        }
        Keyboard::Inline(rows)
    }

    /// The menu message; `edit` replaces the message whose button was pressed.
    pub(super) fn main_menu(&self, ctx: &Ctx, edit: bool) -> Vec<Reply> {
        let text = render_menu_text(
            &self.config.menu_text,
            ctx.user.balance,
            self.config.price_upload,
            self.config.price_refund,
        );
        let keyboard = self.main_menu_keyboard(ctx);
        if edit {
            vec![Reply::edit(text, keyboard)]
        } else {
            vec![Reply::with_keyboard(text, keyboard)]
        }
    }
}
