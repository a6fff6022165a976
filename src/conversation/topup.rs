//! Top-up flow and payment confirmation.

use super::engine::{money, Ctx, Engine};
use super::invoices::PendingInvoice;
use super::session::{Flow, TopupStep};
use super::types::{Button, Keyboard, Reply};
use crate::core::config;
use crate::core::error::AppResult;
use crate::payments::ProviderTag;
use crate::storage::db;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// Not a number
    Invalid,
    NotPositive,
    TooLarge,
}

/// Parses the first token of `input` as an amount. A comma works as the
/// decimal separator.
pub fn parse_amount(input: &str) -> Result<f64, AmountError> {
    let token = input.split_whitespace().next().ok_or(AmountError::Invalid)?;
    let value: f64 = token.replace(',', ".").parse().map_err(|_| AmountError::Invalid)?;
    if !value.is_finite() {
        return Err(AmountError::Invalid);
    }
    if value <= 0.0 {
        return Err(AmountError::NotPositive);
    }
    if value > config::topup::CEILING {
        return Err(AmountError::TooLarge);
    }
    Ok(value)
}

impl Engine {
    fn provider_keyboard(&self) -> Keyboard {
        Keyboard::Reply(vec![self
            .payments
            .configured()
            .iter()
            .map(|tag| tag.display_name().to_string())
            .collect()])
    }

    pub(super) fn open_topup(&self, ctx: &Ctx) -> Vec<Reply> {
        if self.payments.configured().is_empty() {
            return vec![Reply::text(ctx.t("topup-unavailable"))];
        }
        self.sessions.start(ctx.telegram_id, Flow::Topup(TopupStep::AwaitingAmount));
        vec![Reply::text(ctx.tr(
            "topup-ask-amount",
            &[("currency", self.config.invoice_currency.clone())],
        ))]
    }

    /// The flow was taken out of the store; every path that keeps the user in
    /// it puts it back.
    pub(super) async fn topup_step(&self, ctx: &Ctx, step: TopupStep, text: &str) -> AppResult<Vec<Reply>> {
        match step {
            TopupStep::AwaitingAmount => {
                let amount = match parse_amount(text) {
                    Ok(amount) => amount,
                    Err(AmountError::Invalid) => return Ok(vec![Reply::text(ctx.t("topup-invalid-amount"))]),
                    Err(AmountError::NotPositive) => return Ok(vec![Reply::text(ctx.t("topup-not-positive"))]),
                    Err(AmountError::TooLarge) => {
                        return Ok(vec![Reply::text(ctx.tr(
                            "topup-too-large",
                            &[("max", money(config::topup::CEILING))],
                        ))])
                    }
                };

                let configured = self.payments.configured();
                if configured.len() > 1 {
                    self.sessions
                        .put(ctx.telegram_id, Flow::Topup(TopupStep::AwaitingProvider { amount }));
                    return Ok(vec![Reply::with_keyboard(
                        ctx.t("topup-choose-provider"),
                        self.provider_keyboard(),
                    )]);
                }
                self.issue_invoice(ctx, amount, configured.first().copied()).await
            }
            TopupStep::AwaitingProvider { amount } => {
                let Some(tag) = ProviderTag::from_alias(text) else {
                    self.sessions
                        .put(ctx.telegram_id, Flow::Topup(TopupStep::AwaitingProvider { amount }));
                    return Ok(vec![Reply::with_keyboard(
                        ctx.t("topup-unknown-provider"),
                        self.provider_keyboard(),
                    )]);
                };
                let mut replies = vec![Reply::with_keyboard(
                    ctx.tr("topup-provider-chosen", &[("provider", tag.display_name().to_string())]),
                    Keyboard::Remove,
                )];
                replies.extend(self.issue_invoice(ctx, amount, Some(tag)).await?);
                Ok(replies)
            }
        }
    }

    async fn issue_invoice(&self, ctx: &Ctx, amount: f64, tag: Option<ProviderTag>) -> AppResult<Vec<Reply>> {
        let provider = match self.payments.select(tag) {
            Ok(provider) => provider,
            Err(e) => {
                log::error!("❌ Cannot pick a payment provider: {}", e);
                return Ok(vec![Reply::text(ctx.t("topup-invoice-error"))]);
            }
        };

        if let Some(min) = provider.min_topup() {
            if amount < min {
                return Ok(vec![Reply::text(ctx.tr("topup-below-min", &[("min", money(min))]))]);
            }
        }

        match self.payments.create_invoice(amount, Some(provider.tag())).await {
            Ok(invoice) => {
                self.invoices.register(
                    &invoice.invoice_id,
                    PendingInvoice {
                        user_id: ctx.user.id,
                        amount,
                        provider: invoice.provider,
                    },
                );
                let keyboard = Keyboard::Inline(vec![
                    vec![Button::url(ctx.t("topup-pay-button"), invoice.pay_url.clone())],
                    vec![Button::callback(
                        ctx.t("topup-check-button"),
                        format!("checkpay:{}", invoice.invoice_id),
                    )],
                ]);
                Ok(vec![Reply::with_keyboard(
                    ctx.tr(
                        "topup-invoice",
                        &[
                            ("amount", money(amount)),
                            ("currency", self.config.invoice_currency.clone()),
                            ("url", invoice.pay_url),
                        ],
                    ),
                    keyboard,
                )])
            }
            Err(e) => {
                log::error!("❌ Invoice creation at {} failed: {}", provider.tag(), e);
                Ok(vec![Reply::text(ctx.t("topup-invoice-error"))])
            }
        }
    }

    /// `checkpay:<invoice id>`
    pub(super) async fn check_payment(&self, ctx: &Ctx, invoice_id: &str) -> AppResult<Vec<Reply>> {
        let pending = match self.invoices.get(invoice_id) {
            Some(pending) if pending.user_id == ctx.user.id => pending,
            _ => return Ok(vec![Reply::Toast(ctx.t("pay-not-found"))]),
        };

        match self.payments.check_invoice(invoice_id, pending.provider).await {
            Ok(true) => {
                let balance = {
                    let mut conn = db::get_connection(&self.db)?;
                    db::credit_payment(&mut conn, pending.user_id, pending.amount)?
                };
                // Credit and forget are separate steps, not one transaction.
                self.invoices.remove(invoice_id);
                log::info!(
                    "💰 Invoice {} paid, credited {:.2} to user {}",
                    invoice_id,
                    pending.amount,
                    ctx.telegram_id
                );
                Ok(vec![
                    Reply::Toast(ctx.t("pay-confirmed")),
                    Reply::text(ctx.tr(
                        "pay-credited",
                        &[("amount", money(pending.amount)), ("balance", money(balance))],
                    )),
                ])
            }
            Ok(false) => Ok(vec![Reply::Toast(ctx.t("pay-pending"))]),
            Err(e) => {
                log::error!("❌ Checking invoice {} failed: {}", invoice_id, e);
                Ok(vec![Reply::Toast(ctx.t("pay-check-error"))])
            }
        }
    }
}
