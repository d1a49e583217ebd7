//! Balance bookkeeping
//!
//! All balance changes go through here. Credits are atomic increments;
//! spending uses the conditional debit in `store::users`.

use crate::{
    common::types::{
        rub_to_minor, PaymentTransaction, SteamProfile, TransactionStatus, User,
    },
    errors::{CaseboxError, CaseboxResult, LedgerError},
    storage::OptimizedStorage,
    store::{self, transactions, users},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// Fixed USD to RUB rate recorded on promo-code transactions
pub const PROMO_EXCHANGE_RATE: f64 = 90.0;

#[derive(Clone)]
pub struct Ledger {
    storage: OptimizedStorage,
}

impl Ledger {
    pub fn new(storage: OptimizedStorage) -> Self {
        Self { storage }
    }

    pub fn create_or_update_user(&self, profile: &SteamProfile) -> CaseboxResult<User> {
        let user = users::upsert_user(&self.storage, profile)?;
        info!(steam_id = %user.steam_id, username = %user.username, "User logged in");
        Ok(user)
    }

    pub fn get_user(&self, steam_id: &str) -> CaseboxResult<User> {
        users::load_user(&self.storage, steam_id)?
            .ok_or_else(|| CaseboxError::not_found("User", steam_id))
    }

    pub fn get_balance(&self, steam_id: &str) -> CaseboxResult<i64> {
        Ok(self.get_user(steam_id)?.balance)
    }

    /// Signed balance change. `None` means no such user.
    pub fn adjust_balance(&self, steam_id: &str, delta: i64) -> CaseboxResult<Option<i64>> {
        users::adjust_balance(&self.storage, steam_id, delta)
    }

    /// Add a strictly positive amount; returns the new balance
    pub fn credit(&self, steam_id: &str, amount: i64) -> CaseboxResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount).into());
        }
        self.adjust_balance(steam_id, amount)?
            .ok_or_else(|| CaseboxError::not_found("User", steam_id))
    }

    pub fn debit_if_sufficient(&self, steam_id: &str, amount: i64) -> CaseboxResult<i64> {
        users::debit_if_sufficient(&self.storage, steam_id, amount)
    }

    /// Store an already-paid promo transaction for `amount_rub`
    pub fn record_promo_redemption(&self, steam_id: &str, amount_rub: f64) -> CaseboxResult<PaymentTransaction> {
        let now = Utc::now();
        let tx = PaymentTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: steam_id.to_string(),
            invoice_id: None,
            amount_usd: amount_rub / PROMO_EXCHANGE_RATE,
            amount_rub,
            credit_amount: rub_to_minor(amount_rub)?,
            crypto_currency: "PROMO".to_string(),
            crypto_amount: None,
            status: TransactionStatus::Paid,
            exchange_rate: PROMO_EXCHANGE_RATE,
            created_at: now,
            paid_at: Some(now),
            is_promocode: true,
        };
        self.record_payment_transaction(&tx)?;
        Ok(tx)
    }

    pub fn record_payment_transaction(&self, tx: &PaymentTransaction) -> CaseboxResult<()> {
        transactions::store_transaction(&self.storage, tx)
    }

    pub fn list_transactions(&self, steam_id: &str) -> CaseboxResult<Vec<PaymentTransaction>> {
        transactions::load_user_transactions(&self.storage, steam_id, store::DEFAULT_LIST_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_user(steam_id: &str) -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(OptimizedStorage::new(dir.path()).unwrap());
        ledger
            .create_or_update_user(&SteamProfile {
                steam_id: steam_id.to_string(),
                persona_name: "tester".to_string(),
                avatar_url: String::new(),
                profile_url: String::new(),
            })
            .unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_credit_adds_exact_amount() {
        let (_dir, ledger) = ledger_with_user("1");
        assert_eq!(ledger.credit("1", 250).unwrap(), 250);
        assert_eq!(ledger.credit("1", 50).unwrap(), 300);
        assert_eq!(ledger.get_balance("1").unwrap(), 300);
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        let (_dir, ledger) = ledger_with_user("1");
        ledger.credit("1", 100).unwrap();

        for amount in [0, -1, -100] {
            let err = ledger.credit("1", amount).unwrap_err();
            assert!(matches!(err, CaseboxError::Ledger(LedgerError::NonPositiveAmount(_))));
        }
        assert_eq!(ledger.get_balance("1").unwrap(), 100);
    }

    #[test]
    fn test_credit_refuses_to_overflow_balance() {
        let (_dir, ledger) = ledger_with_user("1");
        ledger.credit("1", 1).unwrap();

        let err = ledger.credit("1", i64::MAX).unwrap_err();
        assert!(matches!(err, CaseboxError::Ledger(LedgerError::BalanceOverflow { .. })));
        assert_eq!(ledger.get_balance("1").unwrap(), 1);
    }

    #[test]
    fn test_credit_unknown_user() {
        let (_dir, ledger) = ledger_with_user("1");
        assert!(matches!(
            ledger.credit("2", 10).unwrap_err(),
            CaseboxError::NotFound { entity: "User", .. }
        ));
    }

    #[test]
    fn test_adjust_may_go_negative() {
        let (_dir, ledger) = ledger_with_user("1");
        assert_eq!(ledger.adjust_balance("1", -40).unwrap(), Some(-40));
        assert_eq!(ledger.adjust_balance("nobody", 1).unwrap(), None);
    }

    #[test]
    fn test_promo_redemption_is_recorded_paid() {
        let (_dir, ledger) = ledger_with_user("1");
        let tx = ledger.record_promo_redemption("1", 1000.0).unwrap();

        assert!(tx.is_promocode);
        assert_eq!(tx.status, TransactionStatus::Paid);
        assert_eq!(tx.credit_amount, 100_000);
        assert_eq!(tx.crypto_currency, "PROMO");

        let listed = ledger.list_transactions("1").unwrap();
        assert_eq!(listed, vec![tx]);
    }
}
