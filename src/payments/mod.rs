//! Payment providers behind one invoicing contract.
//!
//! Both providers issue an invoice for an amount and later report whether it
//! was paid. Their wire formats differ; each implementation absorbs its own.
//! No retries, caching or rate limiting happen at this layer.

pub mod cryptobot;
pub mod xrocket;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::core::config::{self, Config};

pub use cryptobot::CryptoBot;
pub use xrocket::XRocket;

/// Canonical tag of the provider that issued an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ProviderTag {
    #[strum(serialize = "crypto")]
    CryptoBot,
    #[strum(serialize = "xrocket")]
    XRocket,
}

impl ProviderTag {
    /// Name shown on buttons
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderTag::CryptoBot => "CryptoBot",
            ProviderTag::XRocket => "xRocket",
        }
    }

    /// Parses the provider choice typed by a user (case-insensitive).
    pub fn from_alias(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "cryptobot" | "crypto" => Some(ProviderTag::CryptoBot),
            "xrocket" | "rocket" => Some(ProviderTag::XRocket),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment provider {0} is not configured")]
    NotConfigured(ProviderTag),

    #[error("no payment provider configured")]
    NoProvider,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cannot decode provider response ({source}): {body}")]
    Decode {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("provider rejected the request: {body}")]
    Rejected { body: String },

    #[error("invoice {0} not found at provider")]
    UnknownInvoice(String),
}

/// An issued invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub pay_url: String,
    pub invoice_id: String,
    pub provider: ProviderTag,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;

    /// Smallest accepted top-up, `None` when unrestricted.
    fn min_topup(&self) -> Option<f64>;

    async fn create_invoice(&self, amount: f64) -> Result<Invoice, PaymentError>;

    /// `true` only when the provider reports the invoice as paid.
    async fn check_invoice(&self, invoice_id: &str) -> Result<bool, PaymentError>;

    /// Lightweight connectivity probe. Returns a short description of the account.
    async fn self_check(&self) -> Result<String, PaymentError>;
}

/// Invoice ids arrive as numbers from one API generation and strings from another.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RemoteId {
    Num(i64),
    Str(String),
}

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteId::Num(n) => write!(f, "{n}"),
            RemoteId::Str(s) => f.write_str(s),
        }
    }
}

/// Reads the body and decodes it, keeping the raw text for error reports.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(PaymentError::Status {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| PaymentError::Decode { body, source })
}

pub(crate) fn min_or_none(min: f64) -> Option<f64> {
    (min > 0.0).then_some(min)
}

/// Two decimals, as both providers expect.
pub(crate) fn round_amount(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Provider selection and the normalized invoicing contract.
#[derive(Clone, Default)]
pub struct PaymentGateway {
    providers: Vec<Arc<dyn PaymentProvider>>,
}

impl PaymentGateway {
    pub fn new(providers: Vec<Arc<dyn PaymentProvider>>) -> Self {
        Self { providers }
    }

    /// Builds every provider whose token is configured. CryptoBot comes first.
    pub fn from_config(config: &Config) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config::network::timeout())
            .build()?;

        let mut providers: Vec<Arc<dyn PaymentProvider>> = Vec::new();
        if config.cryptobot_enabled() {
            providers.push(Arc::new(CryptoBot::new(
                client.clone(),
                &config.cryptobot_api_url,
                &config.cryptobot_token,
                &config.invoice_currency,
                config.cryptobot_min_topup,
            )));
        }
        if config.xrocket_enabled() {
            providers.push(Arc::new(XRocket::new(
                client,
                &config.xrocket_api_url,
                &config.xrocket_token,
                &config.invoice_currency,
                config.xrocket_min_topup,
            )));
        }
        Ok(Self { providers })
    }

    /// Tags of configured providers, in priority order.
    pub fn configured(&self) -> Vec<ProviderTag> {
        self.providers.iter().map(|p| p.tag()).collect()
    }

    pub fn provider(&self, tag: ProviderTag) -> Option<&Arc<dyn PaymentProvider>> {
        self.providers.iter().find(|p| p.tag() == tag)
    }

    /// Explicit choice must be configured; no choice picks the first configured one.
    pub fn select(&self, tag: Option<ProviderTag>) -> Result<&Arc<dyn PaymentProvider>, PaymentError> {
        match tag {
            Some(tag) => self.provider(tag).ok_or(PaymentError::NotConfigured(tag)),
            None => self.providers.first().ok_or(PaymentError::NoProvider),
        }
    }

    pub async fn create_invoice(&self, amount: f64, tag: Option<ProviderTag>) -> Result<Invoice, PaymentError> {
        let provider = self.select(tag)?;
        let invoice = provider.create_invoice(amount).await?;
        log::info!(
            "🧾 Invoice {} created at {} for {:.2}",
            invoice.invoice_id,
            invoice.provider,
            amount
        );
        Ok(invoice)
    }

    pub async fn check_invoice(&self, invoice_id: &str, tag: ProviderTag) -> Result<bool, PaymentError> {
        self.select(Some(tag))?.check_invoice(invoice_id).await
    }

    /// Probes every configured provider and logs the outcome. Never fails.
    pub async fn self_check_all(&self) -> Vec<(ProviderTag, Result<String, PaymentError>)> {
        let mut results = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let result = provider.self_check().await;
            match &result {
                Ok(info) => log::info!("✅ {} reachable: {}", provider.tag().display_name(), info),
                Err(e) => log::warn!("⚠️ {} self-check failed: {}", provider.tag().display_name(), e),
            }
            results.push((provider.tag(), result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tags_round_trip_through_strings() {
        assert_eq!(ProviderTag::CryptoBot.to_string(), "crypto");
        assert_eq!(ProviderTag::XRocket.as_ref(), "xrocket");
        assert_eq!(ProviderTag::from_str("xrocket").unwrap(), ProviderTag::XRocket);
        assert!(ProviderTag::from_str("paypal").is_err());
    }

    #[test]
    fn aliases_are_case_insensitive() {
        assert_eq!(ProviderTag::from_alias("CryptoBot"), Some(ProviderTag::CryptoBot));
        assert_eq!(ProviderTag::from_alias(" crypto "), Some(ProviderTag::CryptoBot));
        assert_eq!(ProviderTag::from_alias("xRocket"), Some(ProviderTag::XRocket));
        assert_eq!(ProviderTag::from_alias("ROCKET"), Some(ProviderTag::XRocket));
        assert_eq!(ProviderTag::from_alias("ton"), None);
    }

    #[test]
    fn empty_gateway_has_no_provider() {
        let gateway = PaymentGateway::default();
        assert!(matches!(gateway.select(None), Err(PaymentError::NoProvider)));
        assert!(matches!(
            gateway.select(Some(ProviderTag::XRocket)),
            Err(PaymentError::NotConfigured(ProviderTag::XRocket))
        ));
    }

    #[test]
    fn from_config_respects_tokens() {
        let cfg = Config {
            xrocket_token: "key".into(),
            ..Config::default()
        };
        let gateway = PaymentGateway::from_config(&cfg).unwrap();
        assert_eq!(gateway.configured(), vec![ProviderTag::XRocket]);
        assert_eq!(gateway.select(None).unwrap().tag(), ProviderTag::XRocket);
    }

    #[test]
    fn remote_ids_render_plainly() {
        let n: RemoteId = serde_json::from_str("42").unwrap();
        let s: RemoteId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(n.to_string(), "42");
        assert_eq!(s.to_string(), "abc");
    }

    #[test]
    fn zero_minimum_means_none() {
        assert_eq!(min_or_none(0.0), None);
        assert_eq!(min_or_none(0.1), Some(0.1));
        assert_eq!(round_amount(1.005_1), 1.01);
    }
}
