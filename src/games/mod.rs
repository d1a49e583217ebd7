//! Case catalog types, weighted draws and the opening flow

pub mod opening;
pub mod types;
pub mod weighted;

pub use opening::CaseOpener;
pub use types::{Case, CaseItem, OpenCaseOutcome, Rarity};
pub use weighted::WeightedPool;
