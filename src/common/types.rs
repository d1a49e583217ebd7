//! Shared record types
//!
//! Everything persisted by the stores lives here. Balances and prices are
//! integer minor units (kopecks); reference-currency amounts that arrive from
//! clients as floats are converted once with `rub_to_minor`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{
    errors::LedgerError,
    games::types::{CaseItem, Rarity},
};

/// Minor units per reference-currency unit
pub const MINOR_UNITS_PER_RUB: f64 = 100.0;

/// Convert a reference-currency amount to minor units, rounding to nearest.
/// Amounts that do not fit an `i64` are rejected rather than saturated.
pub fn rub_to_minor(amount_rub: f64) -> Result<i64, LedgerError> {
    let minor = (amount_rub * MINOR_UNITS_PER_RUB).round();
    // i64::MAX is not representable; `as f64` rounds it up to 2^63
    if !minor.is_finite() || minor < i64::MIN as f64 || minor >= i64::MAX as f64 {
        return Err(LedgerError::AmountOutOfRange(amount_rub));
    }
    Ok(minor as i64)
}

/// Registered player, keyed by the Steam id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub steam_id: String,
    pub username: String,
    pub avatar: String,
    pub profile_url: String,
    /// Minor units; never negative after an accepted operation
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Public profile as returned by the Steam Web API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SteamProfile {
    #[serde(rename = "steamid")]
    pub steam_id: String,
    #[serde(rename = "personaname")]
    pub persona_name: String,
    #[serde(rename = "avatarfull", default)]
    pub avatar_url: String,
    #[serde(rename = "profileurl", default)]
    pub profile_url: String,
}

/// Item won from a case and owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub image_url: String,
    pub rarity: Rarity,
    pub price: i64,
    pub market_hash_name: String,
    pub obtained_at: DateTime<Utc>,
}

/// Audit record of one case opening
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseOpenRecord {
    pub id: String,
    pub user_id: String,
    pub case_id: String,
    pub item: CaseItem,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Cancelled,
    Expired,
}

/// Top-up record: a crypto invoice or a promo-code redemption
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTransaction {
    pub id: String,
    pub user_id: String,
    pub invoice_id: Option<String>,
    pub amount_usd: f64,
    pub amount_rub: f64,
    /// Ledger credit in minor units, fixed when the record is created
    pub credit_amount: i64,
    pub crypto_currency: String,
    pub crypto_amount: Option<f64>,
    pub status: TransactionStatus,
    /// USD to RUB rate at creation
    pub exchange_rate: f64,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_promocode: bool,
}

/// Where an exchange-rate snapshot came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateOrigin {
    Live,
    Cached,
    Fallback,
}

/// Timestamped USD to RUB rate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: RateOrigin,
}

impl ExchangeRate {
    pub fn usd_to_rub(rate: f64, source: RateOrigin) -> Self {
        Self {
            from_currency: "USD".to_string(),
            to_currency: "RUB".to_string(),
            rate,
            updated_at: Utc::now(),
            source,
        }
    }

    /// Convert a USD amount at this rate
    pub fn convert(&self, amount_usd: f64) -> f64 {
        amount_usd * self.rate
    }
}

/// Assets accepted by the payment provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CryptoAsset {
    Usdt,
    Ton,
    Trx,
    Btc,
    Eth,
    Ltc,
    Not,
    Bnb,
}

impl CryptoAsset {
    pub const ALL: [CryptoAsset; 8] = [
        CryptoAsset::Usdt,
        CryptoAsset::Ton,
        CryptoAsset::Trx,
        CryptoAsset::Btc,
        CryptoAsset::Eth,
        CryptoAsset::Ltc,
        CryptoAsset::Not,
        CryptoAsset::Bnb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CryptoAsset::Usdt => "USDT",
            CryptoAsset::Ton => "TON",
            CryptoAsset::Trx => "TRX",
            CryptoAsset::Btc => "BTC",
            CryptoAsset::Eth => "ETH",
            CryptoAsset::Ltc => "LTC",
            CryptoAsset::Not => "NOT",
            CryptoAsset::Bnb => "BNB",
        }
    }
}

impl fmt::Display for CryptoAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoAsset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CryptoAsset::ALL
            .into_iter()
            .find(|asset| asset.as_str() == s)
            .ok_or_else(|| format!("Unsupported cryptocurrency: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rub_to_minor_rounds() {
        assert_eq!(rub_to_minor(1000.0).unwrap(), 100_000);
        assert_eq!(rub_to_minor(12.345).unwrap(), 1235);
        assert_eq!(rub_to_minor(0.004).unwrap(), 0);
    }

    #[test]
    fn test_rub_to_minor_rejects_unrepresentable() {
        for amount in [1e300, 1e17, f64::INFINITY, f64::NAN, -1e300] {
            assert!(
                matches!(rub_to_minor(amount), Err(LedgerError::AmountOutOfRange(_))),
                "{} should be rejected",
                amount
            );
        }
        assert_eq!(rub_to_minor(1e15).unwrap(), 100_000_000_000_000_000);
    }

    #[test]
    fn test_asset_parsing() {
        assert_eq!("TON".parse::<CryptoAsset>(), Ok(CryptoAsset::Ton));
        assert!("DOGE".parse::<CryptoAsset>().is_err());
        assert!("usdt".parse::<CryptoAsset>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionStatus::Paid).unwrap();
        assert_eq!(json, "\"paid\"");
    }

    #[test]
    fn test_steam_profile_from_api_shape() {
        let profile: SteamProfile = serde_json::from_value(serde_json::json!({
            "steamid": "76561198000000001",
            "personaname": "gaben",
            "avatarfull": "https://avatars/a.jpg",
            "profileurl": "https://steamcommunity.com/id/gaben/",
            "communityvisibilitystate": 3
        }))
        .unwrap();

        assert_eq!(profile.persona_name, "gaben");
        assert_eq!(profile.avatar_url, "https://avatars/a.jpg");
    }
}
