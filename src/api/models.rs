//! API Data Models
//!
//! Request and response bodies. Balances are minor units throughout;
//! `amount_usd` and `amount_rub` are reference-currency floats.

use crate::{
    common::types::{InventoryItem, PaymentTransaction, RateOrigin},
    games::types::{Case, CaseItem},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginUrlResponse {
    pub login_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddBalanceRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub new_balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<PaymentTransaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeRateResponse {
    pub usd_to_rub: f64,
    pub updated_at: DateTime<Utc>,
    pub source: RateOrigin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount_usd: f64,
    pub crypto_currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub transaction_id: String,
    pub invoice_id: String,
    pub pay_url: String,
    pub amount_usd: f64,
    pub amount_rub: f64,
    pub crypto_amount: f64,
    pub crypto_currency: String,
    pub exchange_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromoCodeRequest {
    pub promo_code: String,
    pub amount_rub: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromoCodeResponse {
    pub success: bool,
    pub message: String,
    pub new_balance: i64,
    /// As requested, in reference-currency units
    pub added_amount: f64,
    pub added_amount_kopecks: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Catalog entry without its item pool
#[derive(Debug, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub image_url: String,
    pub is_new: bool,
    /// Number of items in the pool
    pub items: usize,
}

impl From<&Case> for CaseSummary {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            price: case.price,
            image_url: case.image_url.clone(),
            is_new: case.is_new,
            items: case.items.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CasesResponse {
    pub cases: Vec<CaseSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenCaseResponse {
    pub success: bool,
    pub case_id: String,
    pub item: CaseItem,
    pub inventory_item_id: String,
    pub remaining_balance: i64,
}
