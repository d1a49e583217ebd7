//! Interfaces to the third-party services
//!
//! The HTTP clients in `identity::steam`, `payments::crypto_pay` and
//! `payments::rates` implement these; tests plug in in-memory fakes.

use crate::common::types::{CryptoAsset, SteamProfile};
use crate::errors::CaseboxResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Steam OpenID and Web API transport
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Replay the OpenID assertion with `openid.mode=check_authentication`
    /// and return the raw key-value response body
    async fn check_authentication(&self, params: &[(String, String)]) -> CaseboxResult<String>;

    /// `GetPlayerSummaries` for a single Steam id
    async fn player_summaries(&self, steam_id: &str) -> CaseboxResult<Vec<SteamProfile>>;
}

/// Crypto payment processor
#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest) -> CaseboxResult<Invoice>;

    /// Token/connectivity probe (`getMe`)
    async fn get_me(&self) -> CaseboxResult<serde_json::Value>;
}

/// Reference-to-settlement currency rate feed
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_usd_to_rub(&self) -> CaseboxResult<f64>;
}

/// Invoice parameters sent to the payment processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceRequest {
    pub asset: CryptoAsset,
    pub amount_usd: f64,
    pub description: String,
    pub paid_btn_url: String,
    /// Opaque value echoed back in webhooks; the Steam id of the payer
    pub payload: String,
}

/// Invoice as created by the payment processor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub invoice_id: String,
    pub pay_url: String,
    pub amount: f64,
}
