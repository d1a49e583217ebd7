//! Rarity-weighted item selection
//!
//! Each candidate contributes its rarity weight to a running total; a draw
//! picks a uniform point in `[0, total)` and binary-searches the cumulative
//! table. This gives the same distribution as replicating every item
//! `weight` times and choosing uniformly, in O(n) space and O(log n) time.

use crate::games::types::CaseItem;
use rand::Rng;

pub struct WeightedPool<'a> {
    items: &'a [CaseItem],
    /// cumulative[i] = sum of weights of items[..=i]
    cumulative: Vec<u64>,
}

impl<'a> WeightedPool<'a> {
    /// Returns `None` for an empty pool
    pub fn new(items: &'a [CaseItem]) -> Option<Self> {
        if items.is_empty() {
            return None;
        }

        let mut running = 0u64;
        let cumulative = items
            .iter()
            .map(|item| {
                running += u64::from(item.rarity.weight());
                running
            })
            .collect();

        Some(Self { items, cumulative })
    }

    pub fn total_weight(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> &'a CaseItem {
        let point = rng.gen_range(0..self.total_weight());
        let index = self.cumulative.partition_point(|&edge| edge <= point);
        &self.items[index]
    }
}
