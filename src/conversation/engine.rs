//! Routes every inbound unit to exactly one handler.

use std::sync::Arc;

use fluent_templates::fluent_bundle::FluentArgs;
use unic_langid::LanguageIdentifier;

use super::invoices::InvoiceBook;
use super::session::{AdminAction, Flow, SessionStore};
use super::types::{DocumentSource, Inbound, InboundKind, Reply};
use crate::core::config::Config;
use crate::core::error::AppResult;
use crate::i18n;
use crate::payments::PaymentGateway;
use crate::storage::db::{self, DbPool, User};
use crate::storage::files;

/// Slash commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Upload,
    Files,
    Topup,
    Admin,
}

impl Command {
    /// Recognizes `/cmd`, `/cmd@botname` and `/cmd args`.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        match name.as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "upload" => Some(Command::Upload),
            "files" => Some(Command::Files),
            "topup" => Some(Command::Topup),
            "admin" => Some(Command::Admin),
            _ => None,
        }
    }
}

/// Who is talking and in which language.
pub(crate) struct Ctx {
    pub telegram_id: i64,
    pub user: User,
    pub lang: LanguageIdentifier,
}

impl Ctx {
    pub fn t(&self, key: &str) -> String {
        i18n::t(&self.lang, key)
    }

    pub fn tr(&self, key: &str, values: &[(&str, String)]) -> String {
        let mut args = FluentArgs::new();
        for (name, value) in values {
            args.set(*name, value.clone());
        }
        i18n::t_args(&self.lang, key, &args)
    }
}

pub(crate) fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// The conversation engine.
///
/// Per-user ordering comes from the caller: updates of one chat must be fed
/// one at a time, in arrival order.
pub struct Engine {
    pub(super) config: Arc<Config>,
    pub(super) db: Arc<DbPool>,
    pub(super) logs: Arc<DbPool>,
    pub(super) payments: PaymentGateway,
    pub(super) documents: Arc<dyn DocumentSource>,
    pub(super) sessions: SessionStore,
    pub(super) invoices: InvoiceBook,
}

impl Engine {
    pub fn new(
        config: Arc<Config>,
        db: Arc<DbPool>,
        logs: Arc<DbPool>,
        payments: PaymentGateway,
        documents: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            config,
            db,
            logs,
            payments,
            documents,
            sessions: SessionStore::new(),
            invoices: InvoiceBook::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn invoices(&self) -> &InvoiceBook {
        &self.invoices
    }

    pub(super) fn is_admin(&self, ctx: &Ctx) -> bool {
        self.config.is_admin(ctx.telegram_id)
    }

    /// Handles one inbound unit. Internal failures are logged and answered
    /// with a generic message; the flow that failed is already cleared.
    pub async fn handle(&self, inbound: Inbound) -> Vec<Reply> {
        let lang = i18n::lang_for(inbound.language_code.as_deref());
        match self.dispatch(&inbound, lang.clone()).await {
            Ok(replies) => replies,
            Err(e) => {
                log::error!("❌ Failed to handle update from {}: {}", inbound.telegram_id, e);
                let text = i18n::t(&lang, "error-generic");
                match inbound.kind {
                    InboundKind::Callback(_) => vec![Reply::Toast(text)],
                    _ => vec![Reply::text(text)],
                }
            }
        }
    }

    async fn dispatch(&self, inbound: &Inbound, lang: LanguageIdentifier) -> AppResult<Vec<Reply>> {
        let user = {
            let conn = db::get_connection(&self.db)?;
            db::get_or_create_user(&conn, inbound.telegram_id)?
        };
        let ctx = Ctx {
            telegram_id: inbound.telegram_id,
            user,
            lang,
        };

        match &inbound.kind {
            InboundKind::Callback(data) => self.on_callback(&ctx, data).await,
            _ => self.on_message(&ctx, inbound).await,
        }
    }

    async fn on_message(&self, ctx: &Ctx, inbound: &Inbound) -> AppResult<Vec<Reply>> {
        let id = ctx.telegram_id;
        let text = inbound.message_text();
        let document = match &inbound.kind {
            InboundKind::Document(doc) => Some(doc),
            _ => None,
        };

        let command = Command::parse(text);

        // Documents and commands never feed a flow's text input.
        if document.is_none() && command.is_none() {
            if let Some(Flow::Topup(step)) = self.sessions.take_if(id, |f| matches!(f, Flow::Topup(_))) {
                return self.topup_step(ctx, step, text).await;
            }
            if let Some(Flow::AdminInput(action)) = self.sessions.take_if(id, |f| matches!(f, Flow::AdminInput(_))) {
                return self.admin_input(ctx, action, text);
            }
        }

        if let Some(command) = command {
            // A command abandons pending amount, provider or admin input.
            if let Some(flow) = self
                .sessions
                .take_if(id, |f| matches!(f, Flow::Topup(_) | Flow::AdminInput(_)))
            {
                log::debug!("User {} left {} flow with a command", id, flow.name());
            }
            return self.on_command(ctx, command);
        }

        if document.is_none() {
            if let Some(Flow::Upload(pending)) = self.sessions.take_if(id, |f| matches!(f, Flow::Upload(_))) {
                return self.upload_step(ctx, pending, text).await;
            }
            if let Some(Flow::RenameLink { storage_name }) =
                self.sessions.take_if(id, |f| matches!(f, Flow::RenameLink { .. }))
            {
                return self.rename_link(ctx, &storage_name, text);
            }
        }

        if let Some(doc) = document {
            return Ok(self.start_upload(ctx, doc.clone()));
        }

        let name = text.trim();
        if !name.is_empty() {
            let file = {
                let conn = db::get_connection(&self.db)?;
                files::get_file_by_local_name(&conn, ctx.user.id, name)?
            };
            if let Some(file) = file {
                return Ok(vec![self.manage_view(ctx, &file, false)]);
            }
        }

        Ok(self.main_menu(ctx, false))
    }

    fn on_command(&self, ctx: &Ctx, command: Command) -> AppResult<Vec<Reply>> {
        match command {
            Command::Start | Command::Help => Ok(self.main_menu(ctx, false)),
            Command::Upload => Ok(self.upload_prompt(ctx)),
            Command::Files => self.file_list(ctx, 0, false),
            Command::Topup => Ok(self.open_topup(ctx)),
            Command::Admin => Ok(self.admin_panel(ctx, false)),
        }
    }

    async fn on_callback(&self, ctx: &Ctx, data: &str) -> AppResult<Vec<Reply>> {
        let (action, arg) = match data.split_once(':') {
            Some((action, arg)) => (action, Some(arg)),
            None => (data, None),
        };

        match (action, arg) {
            ("upload", _) => Ok(self.upload_prompt(ctx)),
            ("myfiles", _) => self.file_list(ctx, 0, true),
            ("files", page) => self.file_list(ctx, parse_page(page), true),
            ("back", _) => Ok(self.main_menu(ctx, true)),
            ("topup", _) => Ok(self.open_topup(ctx)),
            ("checkpay", Some(invoice_id)) => self.check_payment(ctx, invoice_id).await,
            ("admin", _) => Ok(self.admin_panel(ctx, true)),
            ("a_userinfo", _) => Ok(self.admin_prompt(ctx, AdminAction::UserInfo)),
            ("a_addbal", _) => Ok(self.admin_prompt(ctx, AdminAction::AddBalance)),
            ("a_setbal", _) => Ok(self.admin_prompt(ctx, AdminAction::SetBalance)),
            ("a_files", page) => self.admin_file_list(ctx, parse_page(page)),
            ("manage", Some(storage)) => self.manage(ctx, storage),
            ("notify", Some(storage)) => self.toggle_notify(ctx, storage),
            ("link", Some(storage)) => self.start_rename(ctx, storage),
            ("logs", Some(storage)) => self.export_logs(ctx, storage),
            ("delete", Some(storage)) => self.delete_file(ctx, storage).await,
            _ => {
                log::debug!("Ignoring unknown callback {:?} from {}", data, ctx.telegram_id);
                Ok(Vec::new())
            }
        }
    }
}

fn parse_page(arg: Option<&str>) -> usize {
    arg.and_then(|p| p.parse().ok()).unwrap_or(0)
}
