//! Last known exchange rate per currency pair

use crate::{common::types::ExchangeRate, errors::CaseboxResult, storage::OptimizedStorage};

fn rate_key(from: &str, to: &str) -> Vec<u8> {
    format!("rate:{}:{}", from, to).into_bytes()
}

/// Replace the snapshot for the rate's currency pair
pub fn store_rate(storage: &OptimizedStorage, rate: &ExchangeRate) -> CaseboxResult<()> {
    storage.put(&rate_key(&rate.from_currency, &rate.to_currency), rate)
}

pub fn load_rate(storage: &OptimizedStorage, from: &str, to: &str) -> CaseboxResult<Option<ExchangeRate>> {
    storage.get(&rate_key(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::RateOrigin;

    #[test]
    fn test_upsert_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();

        store_rate(&storage, &ExchangeRate::usd_to_rub(91.5, RateOrigin::Live)).unwrap();
        store_rate(&storage, &ExchangeRate::usd_to_rub(92.0, RateOrigin::Live)).unwrap();

        let loaded = load_rate(&storage, "USD", "RUB").unwrap().unwrap();
        assert_eq!(loaded.rate, 92.0);
        assert!(load_rate(&storage, "EUR", "RUB").unwrap().is_none());
    }
}
