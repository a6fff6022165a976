//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use filedrop::conversation::{DocumentRef, DocumentSource, Engine, Inbound, Reply};
use filedrop::core::{AppError, AppResult, Config};
use filedrop::payments::{Invoice, PaymentError, PaymentGateway, PaymentProvider, ProviderTag};
use filedrop::storage::{create_log_pool, create_pool, db, DbPool};

pub const USER: i64 = 111;
pub const OTHER_USER: i64 = 222;
pub const ADMIN: i64 = 999;
pub const DOMAIN: &str = "https://files.test";

/// Document source that writes fixed bytes and counts fetches.
pub struct StubSource {
    pub content: Vec<u8>,
    pub fetches: AtomicUsize,
    pub fail: AtomicBool,
}

impl StubSource {
    pub fn new(content: &[u8]) -> Self {
        Self {
            content: content.to_vec(),
            fetches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for StubSource {
    async fn fetch(&self, _file_ref: &str, dest: &Path) -> AppResult<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Validation("stub fetch failure".into()));
        }
        tokio::fs::write(dest, &self.content).await?;
        Ok(self.content.len() as u64)
    }
}

/// Provider that issues sequential invoices and reports `paid` on demand.
pub struct StubProvider {
    pub tag: ProviderTag,
    pub min: Option<f64>,
    pub paid: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_check: AtomicBool,
    pub issued: AtomicUsize,
}

impl StubProvider {
    pub fn new(tag: ProviderTag, min: Option<f64>) -> Self {
        Self {
            tag,
            min,
            paid: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            fail_check: AtomicBool::new(false),
            issued: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    fn min_topup(&self) -> Option<f64> {
        self.min
    }

    async fn create_invoice(&self, _amount: f64) -> Result<Invoice, PaymentError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected {
                body: r#"{"ok":false}"#.into(),
            });
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Invoice {
            pay_url: format!("https://pay.test/{}/{}", self.tag, n),
            invoice_id: format!("{}-{}", self.tag, n),
            provider: self.tag,
        })
    }

    async fn check_invoice(&self, _invoice_id: &str) -> Result<bool, PaymentError> {
        if self.fail_check.load(Ordering::SeqCst) {
            return Err(PaymentError::Status {
                status: 502,
                body: "Bad Gateway".into(),
            });
        }
        Ok(self.paid.load(Ordering::SeqCst))
    }

    async fn self_check(&self) -> Result<String, PaymentError> {
        Ok("stub".into())
    }
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        telegram_token: "1:test".into(),
        database_path: dir.join("main.db").to_string_lossy().into_owned(),
        logs_database_path: dir.join("logs.db").to_string_lossy().into_owned(),
        file_storage_path: dir.join("files").to_string_lossy().into_owned(),
        domain: DOMAIN.into(),
        admin_id: ADMIN,
        price_upload: 1.0,
        price_refund: 0.5,
        price_per_chunk: 1.0,
        max_file_size: 100 * 1024 * 1024,
        menu_text: "Balance: %%bal%%".into(),
        ..Config::default()
    }
}

/// Complete engine environment: temporary databases, stub source and providers.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub engine: Engine,
    pub db: Arc<DbPool>,
    pub logs: Arc<DbPool>,
    pub source: Arc<StubSource>,
    pub providers: Vec<Arc<StubProvider>>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_providers(vec![Arc::new(StubProvider::new(ProviderTag::CryptoBot, Some(0.1)))])
    }

    pub fn with_providers(providers: Vec<Arc<StubProvider>>) -> Self {
        Self::build(providers, |_| {})
    }

    pub fn build(providers: Vec<Arc<StubProvider>>, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mut config = test_config(dir.path());
        tweak(&mut config);

        let db = Arc::new(create_pool(&config.database_path).expect("main pool"));
        let logs = Arc::new(create_log_pool(&config.logs_database_path).expect("log pool"));
        let source = Arc::new(StubSource::new(b"hello world"));
        let gateway = PaymentGateway::new(
            providers
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn PaymentProvider>)
                .collect(),
        );
        let engine = Engine::new(
            Arc::new(config),
            Arc::clone(&db),
            Arc::clone(&logs),
            gateway,
            Arc::clone(&source) as Arc<dyn DocumentSource>,
        );

        Self {
            dir,
            engine,
            db,
            logs,
            source,
            providers,
        }
    }

    pub async fn text(&self, user: i64, text: &str) -> Vec<Reply> {
        self.engine.handle(Inbound::text(user, text)).await
    }

    pub async fn press(&self, user: i64, data: &str) -> Vec<Reply> {
        self.engine.handle(Inbound::callback(user, data)).await
    }

    pub async fn document(&self, user: i64, size: u64) -> Vec<Reply> {
        let doc = DocumentRef {
            file_ref: "tg-file-1".into(),
            file_name: Some("report.pdf".into()),
            size,
        };
        self.engine.handle(Inbound::document(user, doc)).await
    }

    pub fn balance(&self, user: i64) -> f64 {
        let conn = db::get_connection(&self.db).expect("connection");
        let user = db::get_or_create_user(&conn, user).expect("user");
        user.balance
    }

    pub fn set_balance(&self, user: i64, value: f64) {
        let conn = db::get_connection(&self.db).expect("connection");
        let user = db::get_or_create_user(&conn, user).expect("user");
        db::set_balance(&conn, user.id, value).expect("set balance");
    }

    pub fn internal_id(&self, user: i64) -> i64 {
        let conn = db::get_connection(&self.db).expect("connection");
        db::get_or_create_user(&conn, user).expect("user").id
    }

    pub fn storage_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("files")
    }

    /// Runs the whole upload flow with the given answers.
    pub async fn upload(&self, user: i64, name: &str, slug: &str, notify: &str) -> Vec<Reply> {
        self.document(user, 11).await;
        self.text(user, name).await;
        self.text(user, slug).await;
        self.text(user, notify).await
    }
}

/// Concatenated text of every reply, for substring assertions.
pub fn all_text(replies: &[Reply]) -> String {
    replies
        .iter()
        .filter_map(|r| r.as_text())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Callback data of every inline button in the replies.
pub fn callback_data(replies: &[Reply]) -> Vec<String> {
    use filedrop::conversation::{Button, Keyboard};
    replies
        .iter()
        .filter_map(|r| r.keyboard())
        .flat_map(|k| match k {
            Keyboard::Inline(rows) => rows
                .iter()
                .flatten()
                .filter_map(|b| match b {
                    Button::Callback { data, .. } => Some(data.clone()),
                    Button::Url { .. } => None,
                })
                .collect(),
            _ => Vec::new(),
        })
        .collect()
}
