//! Payment transactions
//!
//! The record lives under `payment:tx:{id}`. Two index entries point back to
//! it by id: one per user for listings and one per provider invoice for
//! webhook lookups.

use super::{newest_first_key, owner_prefix};
use crate::{
    common::types::{PaymentTransaction, TransactionStatus},
    errors::{CaseboxError, CaseboxResult, StorageError},
    storage::{to_json_bytes, OptimizedStorage},
};
use chrono::{DateTime, Utc};

const TX_PREFIX: &str = "payment:tx:";
const USER_INDEX_PREFIX: &str = "payment:user:";
const INVOICE_INDEX_PREFIX: &str = "payment:invoice:";

fn tx_key(id: &str) -> Vec<u8> {
    format!("{}{}", TX_PREFIX, id).into_bytes()
}

fn invoice_key(invoice_id: &str) -> Vec<u8> {
    format!("{}{}", INVOICE_INDEX_PREFIX, invoice_id).into_bytes()
}

pub fn store_transaction(storage: &OptimizedStorage, tx: &PaymentTransaction) -> CaseboxResult<()> {
    let key = tx_key(&tx.id);
    let mut items = vec![
        (key.clone(), to_json_bytes(&key, tx)?),
        (
            newest_first_key(USER_INDEX_PREFIX, &tx.user_id, tx.created_at, &tx.id),
            tx.id.clone().into_bytes(),
        ),
    ];
    if let Some(ref invoice_id) = tx.invoice_id {
        items.push((invoice_key(invoice_id), tx.id.clone().into_bytes()));
    }

    storage.batch_write(&items)
}

pub fn load_transaction(storage: &OptimizedStorage, id: &str) -> CaseboxResult<Option<PaymentTransaction>> {
    storage.get(&tx_key(id))
}

pub fn find_by_invoice(storage: &OptimizedStorage, invoice_id: &str) -> CaseboxResult<Option<PaymentTransaction>> {
    let Some(id_bytes) = storage.get_raw(&invoice_key(invoice_id))? else {
        return Ok(None);
    };
    load_transaction(storage, &index_target(&id_bytes)?)
}

/// Move a transaction from Pending to Paid.
///
/// Returns the updated record only to the caller that performed the
/// transition; any later call for the same transaction gets `None`.
pub fn mark_paid_once(
    storage: &OptimizedStorage,
    id: &str,
    paid_at: DateTime<Utc>,
) -> CaseboxResult<Option<PaymentTransaction>> {
    storage.update::<PaymentTransaction, _>(&tx_key(id), |current| {
        let tx = current.ok_or_else(|| CaseboxError::not_found("Transaction", id))?;
        if tx.status != TransactionStatus::Pending {
            return Ok(None);
        }
        Ok(Some(PaymentTransaction {
            status: TransactionStatus::Paid,
            paid_at: Some(paid_at),
            ..tx
        }))
    })
}

/// Newest first
pub fn load_user_transactions(
    storage: &OptimizedStorage,
    steam_id: &str,
    limit: usize,
) -> CaseboxResult<Vec<PaymentTransaction>> {
    let rows = storage.scan_prefix(&owner_prefix(USER_INDEX_PREFIX, steam_id), limit)?;

    let mut transactions = Vec::with_capacity(rows.len());
    for (_key, id_bytes) in rows {
        let id = index_target(&id_bytes)?;
        match load_transaction(storage, &id)? {
            Some(tx) => transactions.push(tx),
            None => tracing::warn!(transaction_id = %id, "Dangling transaction index entry"),
        }
    }
    Ok(transactions)
}

fn index_target(bytes: &[u8]) -> CaseboxResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        StorageError::CorruptedData(format!("Invalid transaction index entry: {}", e)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(user: &str, invoice: Option<&str>, created_at: DateTime<Utc>) -> PaymentTransaction {
        PaymentTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            invoice_id: invoice.map(str::to_string),
            amount_usd: 10.0,
            amount_rub: 900.0,
            credit_amount: 90_000,
            crypto_currency: "USDT".to_string(),
            crypto_amount: Some(10.0),
            status: TransactionStatus::Pending,
            exchange_rate: 90.0,
            created_at,
            paid_at: None,
            is_promocode: false,
        }
    }

    fn temp_storage() -> (tempfile::TempDir, OptimizedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_lookup_by_invoice() {
        let (_dir, storage) = temp_storage();
        let tx = pending("u1", Some("INV-1"), Utc::now());
        store_transaction(&storage, &tx).unwrap();

        assert_eq!(find_by_invoice(&storage, "INV-1").unwrap(), Some(tx));
        assert_eq!(find_by_invoice(&storage, "INV-2").unwrap(), None);
    }

    #[test]
    fn test_mark_paid_happens_once() {
        let (_dir, storage) = temp_storage();
        let tx = pending("u1", Some("INV-1"), Utc::now());
        store_transaction(&storage, &tx).unwrap();

        let first = mark_paid_once(&storage, &tx.id, Utc::now()).unwrap();
        assert_eq!(first.as_ref().map(|t| t.status), Some(TransactionStatus::Paid));
        assert!(first.unwrap().paid_at.is_some());

        assert_eq!(mark_paid_once(&storage, &tx.id, Utc::now()).unwrap(), None);
        assert_eq!(
            load_transaction(&storage, &tx.id).unwrap().unwrap().status,
            TransactionStatus::Paid
        );
    }

    #[test]
    fn test_mark_paid_unknown_transaction() {
        let (_dir, storage) = temp_storage();
        assert!(mark_paid_once(&storage, "missing", Utc::now()).is_err());
    }

    #[test]
    fn test_user_listing_newest_first() {
        let (_dir, storage) = temp_storage();
        let now = Utc::now();
        let old = pending("u1", None, now - Duration::minutes(1));
        let new = pending("u1", Some("INV-9"), now);
        let foreign = pending("u2", None, now);
        for tx in [&old, &new, &foreign] {
            store_transaction(&storage, tx).unwrap();
        }

        let ids: Vec<String> = load_user_transactions(&storage, "u1", 10)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }
}
