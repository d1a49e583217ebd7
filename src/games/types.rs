use serde::{Deserialize, Serialize};
use std::fmt;

/// Item rarity tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Mythical,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythical,
    ];

    /// Relative draw weight used when a case is opened
    pub fn weight(&self) -> u32 {
        match self {
            Rarity::Common => 50,
            Rarity::Rare => 25,
            Rarity::Epic => 15,
            Rarity::Legendary => 8,
            Rarity::Mythical => 2,
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Epic => write!(f, "epic"),
            Rarity::Legendary => write!(f, "legendary"),
            Rarity::Mythical => write!(f, "mythical"),
        }
    }
}

/// Catalog template for an item that can drop from a case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseItem {
    pub name: String,
    pub rarity: Rarity,
    /// Minor units
    pub price: i64,
    pub image_url: String,
    pub market_hash_name: String,
    /// Front-end gradient class
    pub color_class: String,
}

/// Purchasable case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    pub id: String,
    pub name: String,
    /// Minor units
    pub price: i64,
    pub image_url: String,
    #[serde(default)]
    pub is_new: bool,
    pub items: Vec<CaseItem>,
}

/// Result of a successful opening
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCaseOutcome {
    pub case_id: String,
    pub item: CaseItem,
    pub inventory_item_id: String,
    /// Balance left after the debit, in minor units
    pub remaining_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_hundred() {
        let total: u32 = Rarity::ALL.iter().map(Rarity::weight).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_rarity_serde_matches_display() {
        for rarity in Rarity::ALL {
            let json = serde_json::to_string(&rarity).unwrap();
            assert_eq!(json, format!("\"{}\"", rarity));
        }
    }
}
