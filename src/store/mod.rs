//! Record stores on top of `OptimizedStorage`
//!
//! Each submodule owns one key prefix family. Per-user listings use keys of
//! the form `prefix | steam_id | ':' | inv_millis(be) | id` so a forward
//! prefix scan yields newest records first.

pub mod inventory;
pub mod rates;
pub mod transactions;
pub mod users;

use chrono::{DateTime, Utc};

/// Listing cap for per-user scans
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// `prefix{owner}:` as bytes
pub(crate) fn owner_prefix(prefix: &str, owner: &str) -> Vec<u8> {
    format!("{}{}:", prefix, owner).into_bytes()
}

/// `prefix{owner}:` followed by an inverted timestamp and the record id
pub(crate) fn newest_first_key(prefix: &str, owner: &str, at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let inv_millis = u64::MAX - at.timestamp_millis().max(0) as u64;
    let mut key = owner_prefix(prefix, owner);
    key.reserve(8 + id.len());
    key.extend_from_slice(&inv_millis.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_newer_records_sort_first() {
        let now = Utc::now();
        let older = newest_first_key("inventory:", "42", now - Duration::seconds(5), "a");
        let newer = newest_first_key("inventory:", "42", now, "b");
        assert!(newer < older);
        assert!(newer.starts_with(&owner_prefix("inventory:", "42")));
    }

    #[test]
    fn test_owner_prefix_does_not_match_longer_ids() {
        let key = newest_first_key("inventory:", "4200", Utc::now(), "x");
        assert!(!key.starts_with(&owner_prefix("inventory:", "42")));
    }
}
