//! Balance top-ups: crypto invoices, provider webhooks and the promo code

pub mod crypto_pay;
pub mod rates;

pub use crypto_pay::CryptoPayClient;
pub use rates::{ExchangeRateClient, ExchangeRateService};

use crate::{
    common::{
        traits::{Invoice, InvoiceProvider, InvoiceRequest},
        types::{rub_to_minor, CryptoAsset, ExchangeRate, PaymentTransaction, TransactionStatus},
    },
    errors::{CaseboxError, CaseboxResult, LedgerError},
    ledger::Ledger,
    storage::OptimizedStorage,
    store::transactions::{find_by_invoice, mark_paid_once},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const PROMO_CODE: &str = "YANMAIZI";

const INVOICE_PAID: &str = "invoice_paid";

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// This delivery moved the transaction to Paid and credited the user
    Credited { transaction_id: String, amount: i64 },
    /// The transaction was already settled; nothing changed
    Duplicate,
    /// Not an `invoice_paid` event
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PromoRedemption {
    pub transaction: PaymentTransaction,
    pub new_balance: i64,
    pub added_amount: i64,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    update_type: String,
    #[serde(default)]
    payload: Value,
}

pub struct PaymentGateway {
    provider: Arc<dyn InvoiceProvider>,
    ledger: Ledger,
    storage: OptimizedStorage,
    success_redirect_url: String,
}

impl PaymentGateway {
    pub fn new(
        provider: Arc<dyn InvoiceProvider>,
        ledger: Ledger,
        storage: OptimizedStorage,
        success_redirect_url: String,
    ) -> Self {
        Self {
            provider,
            ledger,
            storage,
            success_redirect_url,
        }
    }

    /// Create a provider invoice at `rate` and record it as Pending.
    ///
    /// The minor-unit credit is fixed here; a later webhook credits exactly
    /// that amount.
    pub async fn create_invoice(
        &self,
        steam_id: &str,
        amount_usd: f64,
        asset: &str,
        rate: &ExchangeRate,
    ) -> CaseboxResult<(PaymentTransaction, Invoice)> {
        if !(amount_usd.is_finite() && amount_usd > 0.0) {
            return Err(CaseboxError::InvalidInput("Amount must be positive".to_string()));
        }
        let asset: CryptoAsset = asset.parse().map_err(CaseboxError::InvalidInput)?;
        let user = self.ledger.get_user(steam_id)?;

        let amount_rub = rate.convert(amount_usd);
        let credit_amount = rub_to_minor(amount_rub)?;
        if credit_amount <= 0 {
            return Err(CaseboxError::InvalidInput("Amount is too small".to_string()));
        }

        let request = InvoiceRequest {
            asset,
            amount_usd,
            description: format!("Balance top-up for {}", user.username),
            paid_btn_url: self.success_redirect_url.clone(),
            payload: steam_id.to_string(),
        };
        let invoice = self.provider.create_invoice(&request).await?;

        let tx = PaymentTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: steam_id.to_string(),
            invoice_id: Some(invoice.invoice_id.clone()),
            amount_usd,
            amount_rub,
            credit_amount,
            crypto_currency: asset.to_string(),
            crypto_amount: Some(invoice.amount),
            status: TransactionStatus::Pending,
            exchange_rate: rate.rate,
            created_at: Utc::now(),
            paid_at: None,
            is_promocode: false,
        };
        self.ledger.record_payment_transaction(&tx)?;

        info!(
            steam_id,
            invoice_id = %invoice.invoice_id,
            amount_usd,
            asset = %asset,
            "🧾 Invoice created"
        );
        Ok((tx, invoice))
    }

    /// Apply a provider notification. Replays of a settled invoice are no-ops.
    pub fn ingest_webhook(&self, body: &Value) -> CaseboxResult<WebhookOutcome> {
        let envelope: WebhookEnvelope = serde_json::from_value(body.clone())
            .map_err(|e| CaseboxError::InvalidInput(format!("Malformed webhook: {}", e)))?;

        if envelope.update_type != INVOICE_PAID {
            info!(update_type = %envelope.update_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let invoice_id = match envelope.payload.get("invoice_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(CaseboxError::InvalidInput("Webhook payload has no invoice_id".to_string())),
        };

        let tx = find_by_invoice(&self.storage, &invoice_id)?
            .ok_or_else(|| CaseboxError::not_found("Transaction", invoice_id.clone()))?;

        let Some(paid) = mark_paid_once(&self.storage, &tx.id, Utc::now())? else {
            info!(invoice_id = %invoice_id, "Duplicate invoice_paid delivery");
            return Ok(WebhookOutcome::Duplicate);
        };

        match self.ledger.adjust_balance(&paid.user_id, paid.credit_amount)? {
            Some(balance) => info!(
                steam_id = %paid.user_id,
                invoice_id = %invoice_id,
                amount = paid.credit_amount,
                balance,
                "💰 Invoice paid, balance credited"
            ),
            None => warn!(
                steam_id = %paid.user_id,
                invoice_id = %invoice_id,
                "Invoice paid for a user that no longer exists"
            ),
        }

        Ok(WebhookOutcome::Credited {
            transaction_id: paid.id,
            amount: paid.credit_amount,
        })
    }

    /// Redeem the promo code for `amount_rub` reference-currency units
    pub fn apply_promo_code(&self, steam_id: &str, code: &str, amount_rub: f64) -> CaseboxResult<PromoRedemption> {
        if code != PROMO_CODE {
            return Err(CaseboxError::InvalidInput("Invalid promocode".to_string()));
        }
        if !(amount_rub.is_finite() && amount_rub > 0.0) {
            return Err(CaseboxError::InvalidInput("Amount must be positive".to_string()));
        }

        let added_amount = rub_to_minor(amount_rub)?;
        let user = self.ledger.get_user(steam_id)?;
        if user.balance.checked_add(added_amount).is_none() {
            return Err(LedgerError::BalanceOverflow {
                balance: user.balance,
                delta: added_amount,
            }
            .into());
        }

        // History entry is written before the credit
        let transaction = self.ledger.record_promo_redemption(steam_id, amount_rub)?;
        let new_balance = self.ledger.credit(steam_id, transaction.credit_amount)?;

        info!(steam_id, added_amount, new_balance, "🎟️ Promo code applied");
        Ok(PromoRedemption {
            transaction,
            new_balance,
            added_amount,
        })
    }

    /// Probe the provider with the configured token
    pub async fn check_provider(&self) -> CaseboxResult<Value> {
        self.provider.get_me().await
    }
}
