//! Case opening
//!
//! One opening is: resolve the case, conditionally debit its price, draw an
//! item, then persist the inventory entry and history record together. A
//! failed write after the debit refunds the price.

use super::{
    types::{Case, CaseItem, OpenCaseOutcome},
    weighted::WeightedPool,
};
use crate::{
    catalog::Catalog,
    common::types::{CaseOpenRecord, InventoryItem},
    errors::{CaseboxError, CaseboxResult},
    ledger::Ledger,
    storage::OptimizedStorage,
    store::inventory::record_opening,
};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Persists one opening's inventory entry and history record
type RecordFn = fn(&OptimizedStorage, &InventoryItem, &CaseOpenRecord) -> CaseboxResult<()>;

#[derive(Clone)]
pub struct CaseOpener {
    catalog: Arc<Catalog>,
    ledger: Ledger,
    storage: OptimizedStorage,
    record: RecordFn,
}

impl CaseOpener {
    pub fn new(catalog: Arc<Catalog>, ledger: Ledger, storage: OptimizedStorage) -> Self {
        Self {
            catalog,
            ledger,
            storage,
            record: record_opening,
        }
    }

    pub fn open<R: Rng + ?Sized>(&self, steam_id: &str, case_id: &str, rng: &mut R) -> CaseboxResult<OpenCaseOutcome> {
        let case = self
            .catalog
            .get(case_id)
            .ok_or_else(|| CaseboxError::not_found("Case", case_id))?;
        let pool = WeightedPool::new(&case.items)
            .ok_or_else(|| CaseboxError::InvalidInput(format!("Case {} has no items", case_id)))?;

        let remaining_balance = self.ledger.debit_if_sufficient(steam_id, case.price)?;
        let won = pool.draw(rng).clone();

        let (item, record) = build_records(steam_id, case, &won);
        if let Err(e) = (self.record)(&self.storage, &item, &record) {
            error!(steam_id, case_id, error = %e, "Failed to store opening, refunding");
            self.ledger.adjust_balance(steam_id, case.price)?;
            return Err(e);
        }

        info!(
            steam_id,
            case_id,
            item = %won.name,
            rarity = %won.rarity,
            remaining_balance,
            "🎁 Case opened"
        );

        Ok(OpenCaseOutcome {
            case_id: case.id.clone(),
            item: won,
            inventory_item_id: item.id,
            remaining_balance,
        })
    }
}

fn build_records(steam_id: &str, case: &Case, won: &CaseItem) -> (InventoryItem, CaseOpenRecord) {
    let now = Utc::now();
    let item = InventoryItem {
        id: Uuid::new_v4().to_string(),
        user_id: steam_id.to_string(),
        name: won.name.clone(),
        image_url: won.image_url.clone(),
        rarity: won.rarity,
        price: won.price,
        market_hash_name: won.market_hash_name.clone(),
        obtained_at: now,
    };
    let record = CaseOpenRecord {
        id: Uuid::new_v4().to_string(),
        user_id: steam_id.to_string(),
        case_id: case.id.clone(),
        item: won.clone(),
        opened_at: now,
    };
    (item, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::types::SteamProfile,
        errors::{LedgerError, StorageError},
        store::{inventory, DEFAULT_LIST_LIMIT},
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn setup(balance: i64) -> (tempfile::TempDir, CaseOpener, Ledger, OptimizedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();
        let ledger = Ledger::new(storage.clone());
        ledger
            .create_or_update_user(&SteamProfile {
                steam_id: "7".to_string(),
                persona_name: "opener".to_string(),
                avatar_url: String::new(),
                profile_url: String::new(),
            })
            .unwrap();
        if balance > 0 {
            ledger.credit("7", balance).unwrap();
        }
        let catalog = Arc::new(Catalog::bundled().unwrap());
        let opener = CaseOpener::new(catalog, ledger.clone(), storage.clone());
        (dir, opener, ledger, storage)
    }

    #[test]
    fn test_successful_open() {
        let (_dir, opener, ledger, storage) = setup(1_000_000);
        let mut rng = StdRng::seed_from_u64(1);
        let price = Catalog::bundled().unwrap().get("starter").unwrap().price;

        let outcome = opener.open("7", "starter", &mut rng).unwrap();

        assert_eq!(outcome.remaining_balance, 1_000_000 - price);
        assert_eq!(ledger.get_balance("7").unwrap(), 1_000_000 - price);

        let items = inventory::load_inventory(&storage, "7", DEFAULT_LIST_LIMIT).unwrap();
        let history = inventory::load_case_results(&storage, "7", DEFAULT_LIST_LIMIT).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(history.len(), 1);
        assert_eq!(items[0].id, outcome.inventory_item_id);
        assert_eq!(items[0].rarity, outcome.item.rarity);
        assert_eq!(history[0].item, outcome.item);

        let case = Catalog::bundled().unwrap().get("starter").unwrap().clone();
        assert!(case.items.iter().any(|i| i.rarity == outcome.item.rarity));
    }

    #[test]
    fn test_insufficient_balance_changes_nothing() {
        let (_dir, opener, ledger, storage) = setup(100);
        let mut rng = StdRng::seed_from_u64(2);

        let err = opener.open("7", "elite", &mut rng).unwrap_err();
        assert!(matches!(err, CaseboxError::Ledger(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.get_balance("7").unwrap(), 100);
        assert!(inventory::load_inventory(&storage, "7", 10).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_case() {
        let (_dir, opener, ledger, _) = setup(1_000_000);
        let mut rng = StdRng::seed_from_u64(3);

        assert!(matches!(
            opener.open("7", "no-such-case", &mut rng),
            Err(CaseboxError::NotFound { entity: "Case", .. })
        ));
        assert_eq!(ledger.get_balance("7").unwrap(), 1_000_000);
    }

    #[test]
    fn test_repeated_opens_until_broke() {
        let (_dir, opener, ledger, storage) = setup(0);
        let price = Catalog::bundled().unwrap().get("starter").unwrap().price;
        ledger.credit("7", price * 3 + 1).unwrap();
        let mut rng = StdRng::seed_from_u64(4);

        for _ in 0..3 {
            opener.open("7", "starter", &mut rng).unwrap();
        }
        assert!(opener.open("7", "starter", &mut rng).is_err());

        assert_eq!(ledger.get_balance("7").unwrap(), 1);
        assert_eq!(inventory::load_inventory(&storage, "7", 10).unwrap().len(), 3);
    }

    fn failing_write(_: &OptimizedStorage, _: &InventoryItem, _: &CaseOpenRecord) -> CaseboxResult<()> {
        Err(StorageError::WriteFailed("disk full".to_string()).into())
    }

    #[test]
    fn test_failed_write_refunds_price() {
        let (_dir, opener, ledger, storage) = setup(1_000_000);
        let opener = CaseOpener {
            record: failing_write,
            ..opener
        };
        let mut rng = StdRng::seed_from_u64(5);

        let err = opener.open("7", "starter", &mut rng).unwrap_err();

        assert!(matches!(err, CaseboxError::Storage(StorageError::WriteFailed(_))));
        assert_eq!(ledger.get_balance("7").unwrap(), 1_000_000);
        assert!(inventory::load_inventory(&storage, "7", 10).unwrap().is_empty());
        assert!(inventory::load_case_results(&storage, "7", 10).unwrap().is_empty());
    }
}
