//! CryptoBot (Crypto Pay API).
//!
//! Auth header `Crypto-Pay-Token`, form-encoded requests, `{ok, result}` envelope.

use async_trait::async_trait;
use serde::Deserialize;

use super::{min_or_none, read_json, round_amount, Invoice, PaymentError, PaymentProvider, ProviderTag, RemoteId};

const AUTH_HEADER: &str = "Crypto-Pay-Token";

pub struct CryptoBot {
    client: reqwest::Client,
    base_url: String,
    token: String,
    currency: String,
    min_topup: f64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedInvoice {
    invoice_id: RemoteId,
    pay_url: Option<String>,
    bot_invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceStatus {
    status: String,
}

/// `getInvoices` returns either a bare list or `{items: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InvoiceList {
    Items { items: Vec<InvoiceStatus> },
    List(Vec<InvoiceStatus>),
}

impl InvoiceList {
    fn into_first(self) -> Option<InvoiceStatus> {
        match self {
            InvoiceList::Items { items } => items.into_iter().next(),
            InvoiceList::List(list) => list.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    app_id: Option<i64>,
}

impl<T> Envelope<T> {
    /// Unwraps `result`, treating `ok: false` or a missing result as a rejection.
    fn into_result(self, raw: &str) -> Result<T, PaymentError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(PaymentError::Rejected { body: raw.to_string() }),
        }
    }
}

impl CryptoBot {
    pub fn new(client: reqwest::Client, base_url: &str, token: &str, currency: &str, min_topup: f64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            currency: currency.to_string(),
            min_topup,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request.header(AUTH_HEADER, &self.token).send().await?;
        let raw: serde_json::Value = read_json(response).await?;
        let text = raw.to_string();
        let envelope: Envelope<T> =
            serde_json::from_value(raw).map_err(|source| PaymentError::Decode { body: text.clone(), source })?;
        envelope.into_result(&text)
    }
}

#[async_trait]
impl PaymentProvider for CryptoBot {
    fn tag(&self) -> ProviderTag {
        ProviderTag::CryptoBot
    }

    fn min_topup(&self) -> Option<f64> {
        min_or_none(self.min_topup)
    }

    async fn create_invoice(&self, amount: f64) -> Result<Invoice, PaymentError> {
        let amount = format!("{:.2}", round_amount(amount));
        let request = self
            .client
            .post(self.url("createInvoice"))
            .form(&[("asset", self.currency.as_str()), ("amount", amount.as_str())]);

        let created: CreatedInvoice = self.call(request).await?;
        let pay_url = created
            .pay_url
            .or(created.bot_invoice_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PaymentError::Rejected {
                body: "invoice without payment URL".to_string(),
            })?;

        Ok(Invoice {
            pay_url,
            invoice_id: created.invoice_id.to_string(),
            provider: ProviderTag::CryptoBot,
        })
    }

    async fn check_invoice(&self, invoice_id: &str) -> Result<bool, PaymentError> {
        let request = self
            .client
            .post(self.url("getInvoices"))
            .form(&[("invoice_ids", invoice_id)]);

        let list: InvoiceList = self.call(request).await?;
        let invoice = list
            .into_first()
            .ok_or_else(|| PaymentError::UnknownInvoice(invoice_id.to_string()))?;
        Ok(invoice.status == "paid")
    }

    async fn self_check(&self) -> Result<String, PaymentError> {
        let info: AppInfo = self.call(self.client.get(self.url("getMe"))).await?;
        Ok(match (info.name, info.app_id) {
            (Some(name), Some(id)) => format!("{name} (app {id})"),
            (Some(name), None) => name,
            (None, Some(id)) => format!("app {id}"),
            (None, None) => "ok".to_string(),
        })
    }
}
