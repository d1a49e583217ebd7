//! Inventory items and case-opening history

use super::{newest_first_key, owner_prefix};
use crate::{
    common::types::{CaseOpenRecord, InventoryItem},
    errors::CaseboxResult,
    storage::{to_json_bytes, OptimizedStorage},
};

const INVENTORY_PREFIX: &str = "inventory:";
const CASE_RESULT_PREFIX: &str = "case_result:";

/// Persist the won item and the history record in one write batch
pub fn record_opening(
    storage: &OptimizedStorage,
    item: &InventoryItem,
    record: &CaseOpenRecord,
) -> CaseboxResult<()> {
    let item_key = newest_first_key(INVENTORY_PREFIX, &item.user_id, item.obtained_at, &item.id);
    let record_key = newest_first_key(CASE_RESULT_PREFIX, &record.user_id, record.opened_at, &record.id);

    let items = vec![
        (item_key.clone(), to_json_bytes(&item_key, item)?),
        (record_key.clone(), to_json_bytes(&record_key, record)?),
    ];
    storage.batch_write(&items)
}

/// Newest first
pub fn load_inventory(storage: &OptimizedStorage, steam_id: &str, limit: usize) -> CaseboxResult<Vec<InventoryItem>> {
    storage.scan_values(&owner_prefix(INVENTORY_PREFIX, steam_id), limit)
}

/// Newest first
pub fn load_case_results(
    storage: &OptimizedStorage,
    steam_id: &str,
    limit: usize,
) -> CaseboxResult<Vec<CaseOpenRecord>> {
    storage.scan_values(&owner_prefix(CASE_RESULT_PREFIX, steam_id), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{CaseItem, Rarity};
    use chrono::{Duration, Utc};

    fn won(user: &str, name: &str, at: chrono::DateTime<Utc>) -> (InventoryItem, CaseOpenRecord) {
        let template = CaseItem {
            name: name.to_string(),
            rarity: Rarity::Rare,
            price: 1_000,
            image_url: String::new(),
            market_hash_name: name.to_string(),
            color_class: String::new(),
        };
        let item = InventoryItem {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            name: template.name.clone(),
            image_url: template.image_url.clone(),
            rarity: template.rarity,
            price: template.price,
            market_hash_name: template.market_hash_name.clone(),
            obtained_at: at,
        };
        let record = CaseOpenRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            case_id: "starter".to_string(),
            item: template,
            opened_at: at,
        };
        (item, record)
    }

    #[test]
    fn test_listing_is_per_user_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();
        let now = Utc::now();

        for (user, name, age) in [("u1", "old", 10), ("u1", "new", 0), ("u2", "other", 5)] {
            let (item, record) = won(user, name, now - Duration::seconds(age));
            record_opening(&storage, &item, &record).unwrap();
        }

        let names: Vec<String> = load_inventory(&storage, "u1", 10)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["new", "old"]);

        let history = load_case_results(&storage, "u2", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item.name, "other");
    }
}
