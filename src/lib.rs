//! Casebox - case-opening game backend
//!
//! Players sign in through Steam OpenID, top up a balance with a crypto
//! invoice or a promo code, and spend it opening cases whose items are drawn
//! by rarity weight. Everything is persisted in RocksDB.
//!
//! Money is stored as integer minor units (kopecks). Reference-currency
//! amounts arriving from clients are converted once at the payment boundary.

pub mod api;
pub mod catalog;
pub mod common;
pub mod config;
pub mod errors;
pub mod games;
pub mod identity;
pub mod ledger;
pub mod payments;
pub mod storage;
pub mod store;

pub use catalog::Catalog;
pub use config::{AppConfig, ConfigLoader};
pub use errors::{CaseboxError, CaseboxResult};
pub use ledger::Ledger;
pub use storage::OptimizedStorage;
