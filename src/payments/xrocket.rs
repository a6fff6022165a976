//! xRocket Pay.
//!
//! Auth header `Rocket-Pay-Key`, JSON requests, `{success, data}` envelope.
//! The older `{ok, result}` envelope is still decoded but logged as a legacy
//! response each time it shows up.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{min_or_none, read_json, round_amount, Invoice, PaymentError, PaymentProvider, ProviderTag, RemoteId};

const AUTH_HEADER: &str = "Rocket-Pay-Key";

pub struct XRocket {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    currency: String,
    min_topup: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Current {
        success: bool,
        data: Option<T>,
    },
    Legacy {
        ok: bool,
        result: Option<T>,
    },
}

impl<T> Envelope<T> {
    fn into_result(self, raw: &str) -> Result<T, PaymentError> {
        let (accepted, payload) = match self {
            Envelope::Current { success, data } => (success, data),
            Envelope::Legacy { ok, result } => {
                log::warn!("⚠️ xRocket answered with the legacy ok/result envelope");
                (ok, result)
            }
        };
        match (accepted, payload) {
            (true, Some(payload)) => Ok(payload),
            _ => Err(PaymentError::Rejected { body: raw.to_string() }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TgInvoice {
    id: RemoteId,
    /// Current field name
    link: Option<String>,
    /// Legacy field name
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppInfo {
    #[serde(default)]
    name: Option<String>,
}

impl XRocket {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, currency: &str, min_topup: f64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            currency: currency.to_string(),
            min_topup,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = request.header(AUTH_HEADER, &self.api_key).send().await?;
        let raw: serde_json::Value = read_json(response).await?;
        let text = raw.to_string();
        let envelope: Envelope<T> =
            serde_json::from_value(raw).map_err(|source| PaymentError::Decode { body: text.clone(), source })?;
        envelope.into_result(&text)
    }
}

#[async_trait]
impl PaymentProvider for XRocket {
    fn tag(&self) -> ProviderTag {
        ProviderTag::XRocket
    }

    fn min_topup(&self) -> Option<f64> {
        min_or_none(self.min_topup)
    }

    async fn create_invoice(&self, amount: f64) -> Result<Invoice, PaymentError> {
        let body = json!({
            "amount": round_amount(amount),
            "currency": self.currency,
            "numPayments": 1,
        });
        let request = self
            .client
            .post(format!("{}/tg-invoices", self.base_url))
            .json(&body);

        let invoice: TgInvoice = self.call(request).await?;
        let pay_url = invoice
            .link
            .or(invoice.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PaymentError::Rejected {
                body: "invoice without payment link".to_string(),
            })?;

        Ok(Invoice {
            pay_url,
            invoice_id: invoice.id.to_string(),
            provider: ProviderTag::XRocket,
        })
    }

    async fn check_invoice(&self, invoice_id: &str) -> Result<bool, PaymentError> {
        let request = self.client.get(format!(
            "{}/tg-invoices/{}",
            self.base_url,
            urlencoding::encode(invoice_id)
        ));
        let invoice: TgInvoice = self.call(request).await?;
        Ok(invoice.status.as_deref() == Some("paid"))
    }

    async fn self_check(&self) -> Result<String, PaymentError> {
        let info: AppInfo = self
            .call(self.client.get(format!("{}/app/info", self.base_url)))
            .await?;
        Ok(info.name.unwrap_or_else(|| "ok".to_string()))
    }
}
