//! User records and balance mutations

use crate::{
    common::types::{SteamProfile, User},
    errors::{CaseboxError, CaseboxResult, LedgerError},
    storage::OptimizedStorage,
};
use chrono::Utc;

const USER_PREFIX: &str = "user:";

fn user_key(steam_id: &str) -> Vec<u8> {
    format!("{}{}", USER_PREFIX, steam_id).into_bytes()
}

pub fn load_user(storage: &OptimizedStorage, steam_id: &str) -> CaseboxResult<Option<User>> {
    storage.get(&user_key(steam_id))
}

/// Insert a new user with a zero balance, or refresh the profile fields and
/// `last_login` of an existing one. The balance is never touched here.
pub fn upsert_user(storage: &OptimizedStorage, profile: &SteamProfile) -> CaseboxResult<User> {
    let now = Utc::now();
    let stored = storage.update::<User, _>(&user_key(&profile.steam_id), |current| {
        let user = match current {
            Some(existing) => User {
                username: profile.persona_name.clone(),
                avatar: profile.avatar_url.clone(),
                profile_url: profile.profile_url.clone(),
                last_login: now,
                ..existing
            },
            None => User {
                steam_id: profile.steam_id.clone(),
                username: profile.persona_name.clone(),
                avatar: profile.avatar_url.clone(),
                profile_url: profile.profile_url.clone(),
                balance: 0,
                created_at: now,
                last_login: now,
            },
        };
        Ok(Some(user))
    })?;

    stored.ok_or_else(|| CaseboxError::not_found("User", profile.steam_id.clone()))
}

/// Add `delta` (may be negative) to the balance.
///
/// Returns the new balance, or `None` when no such user exists. No
/// sufficiency check is made; use `debit_if_sufficient` for spending. A
/// change that would overflow the balance fails and writes nothing.
pub fn adjust_balance(storage: &OptimizedStorage, steam_id: &str, delta: i64) -> CaseboxResult<Option<i64>> {
    let updated = storage.update::<User, _>(&user_key(steam_id), |current| {
        let Some(user) = current else {
            return Ok(None);
        };
        let balance = user.balance.checked_add(delta).ok_or(LedgerError::BalanceOverflow {
            balance: user.balance,
            delta,
        })?;
        Ok(Some(User { balance, ..user }))
    })?;

    Ok(updated.map(|user| user.balance))
}

/// Subtract `amount` only if the balance covers it, as one storage operation.
/// Returns the remaining balance.
pub fn debit_if_sufficient(storage: &OptimizedStorage, steam_id: &str, amount: i64) -> CaseboxResult<i64> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount).into());
    }

    let updated = storage.update::<User, _>(&user_key(steam_id), |current| {
        let user = current.ok_or_else(|| CaseboxError::not_found("User", steam_id))?;
        if user.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                balance: user.balance,
                required: amount,
            }
            .into());
        }
        Ok(Some(User {
            balance: user.balance - amount,
            ..user
        }))
    })?;

    updated
        .map(|user| user.balance)
        .ok_or_else(|| CaseboxError::not_found("User", steam_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(steam_id: &str, name: &str) -> SteamProfile {
        SteamProfile {
            steam_id: steam_id.to_string(),
            persona_name: name.to_string(),
            avatar_url: format!("https://avatars/{}.jpg", name),
            profile_url: format!("https://steamcommunity.com/profiles/{}", steam_id),
        }
    }

    fn temp_storage() -> (tempfile::TempDir, OptimizedStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_upsert_creates_with_zero_balance() {
        let (_dir, storage) = temp_storage();
        let user = upsert_user(&storage, &profile("7656", "alice")).unwrap();

        assert_eq!(user.balance, 0);
        assert_eq!(user.created_at, user.last_login);
        assert_eq!(load_user(&storage, "7656").unwrap(), Some(user));
    }

    #[test]
    fn test_upsert_preserves_balance_and_creation() {
        let (_dir, storage) = temp_storage();
        let first = upsert_user(&storage, &profile("7656", "alice")).unwrap();
        adjust_balance(&storage, "7656", 5_000).unwrap();

        let second = upsert_user(&storage, &profile("7656", "alice_renamed")).unwrap();
        assert_eq!(second.balance, 5_000);
        assert_eq!(second.username, "alice_renamed");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_login >= first.last_login);
    }

    #[test]
    fn test_adjust_refuses_overflow() {
        let (_dir, storage) = temp_storage();
        upsert_user(&storage, &profile("7656", "whale")).unwrap();
        assert_eq!(adjust_balance(&storage, "7656", i64::MAX).unwrap(), Some(i64::MAX));

        let err = adjust_balance(&storage, "7656", 1).unwrap_err();
        assert!(matches!(
            err,
            CaseboxError::Ledger(LedgerError::BalanceOverflow { balance: i64::MAX, delta: 1 })
        ));
        assert_eq!(load_user(&storage, "7656").unwrap().unwrap().balance, i64::MAX);
    }

    #[test]
    fn test_adjust_missing_user() {
        let (_dir, storage) = temp_storage();
        assert_eq!(adjust_balance(&storage, "nobody", 10).unwrap(), None);
    }

    #[test]
    fn test_debit_refuses_overdraft() {
        let (_dir, storage) = temp_storage();
        upsert_user(&storage, &profile("1", "bob")).unwrap();
        adjust_balance(&storage, "1", 100).unwrap();

        let err = debit_if_sufficient(&storage, "1", 150).unwrap_err();
        assert!(matches!(
            err,
            CaseboxError::Ledger(LedgerError::InsufficientFunds { balance: 100, required: 150 })
        ));
        assert_eq!(load_user(&storage, "1").unwrap().unwrap().balance, 100);

        assert_eq!(debit_if_sufficient(&storage, "1", 100).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let (_dir, storage) = temp_storage();
        upsert_user(&storage, &profile("2", "carol")).unwrap();
        adjust_balance(&storage, "2", 1_000).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || debit_if_sufficient(&storage, "2", 300).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 3);
        assert_eq!(load_user(&storage, "2").unwrap().unwrap().balance, 100);
    }
}
