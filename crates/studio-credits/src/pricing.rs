//! Action costs and minimum balances

use std::collections::HashMap;

/// Action kinds priced by the default table
pub mod actions {
    pub const AI_TEXT_GENERATION: &str = "ai_text_generation";
    pub const AI_IMAGE_GENERATION: &str = "ai_image_generation";
    pub const AI_VIDEO_GENERATION: &str = "ai_video_generation";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const BULK_MESSAGE: &str = "bulk_message";
    pub const CONNECT_CHANNEL: &str = "connect_channel";
}

/// Cost charged for action kinds missing from the table
pub const DEFAULT_COST: u64 = 1;

/// Static cost table plus per-action balance floors
///
/// `Default` is the product's price list. Use [`PriceTable::builder`] for a
/// custom one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    costs: HashMap<String, u64>,
    minimums: HashMap<String, u64>,
    default_cost: u64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::builder()
            .cost(actions::AI_TEXT_GENERATION, 2)
            .cost(actions::AI_IMAGE_GENERATION, 8)
            .cost(actions::AI_VIDEO_GENERATION, 25)
            .cost(actions::SEND_MESSAGE, 1)
            .cost(actions::BULK_MESSAGE, 5)
            .cost(actions::CONNECT_CHANNEL, 0)
            .minimum_balance(actions::CONNECT_CHANNEL, 10)
            .build()
    }
}

impl PriceTable {
    /// Empty table starting from [`DEFAULT_COST`]
    pub fn builder() -> PriceTableBuilder {
        PriceTableBuilder::default()
    }

    /// Cost of `action_type`, falling back to the default cost
    pub fn cost(&self, action_type: &str) -> u64 {
        self.costs
            .get(action_type)
            .copied()
            .unwrap_or(self.default_cost)
    }

    /// Balance floor required before `action_type` may run
    pub fn minimum_balance(&self, action_type: &str) -> Option<u64> {
        self.minimums.get(action_type).copied()
    }

    pub fn default_cost(&self) -> u64 {
        self.default_cost
    }

    /// True if the action is free and has no balance floor
    pub fn is_free(&self, action_type: &str) -> bool {
        self.cost(action_type) == 0 && self.minimum_balance(action_type).is_none()
    }
}

/// Builder for [`PriceTable`]
#[derive(Debug, Clone)]
pub struct PriceTableBuilder {
    table: PriceTable,
}

impl Default for PriceTableBuilder {
    fn default() -> Self {
        Self {
            table: PriceTable {
                costs: HashMap::new(),
                minimums: HashMap::new(),
                default_cost: DEFAULT_COST,
            },
        }
    }
}

impl PriceTableBuilder {
    pub fn cost(mut self, action_type: impl Into<String>, cost: u64) -> Self {
        self.table.costs.insert(action_type.into(), cost);
        self
    }

    pub fn minimum_balance(mut self, action_type: impl Into<String>, minimum: u64) -> Self {
        self.table.minimums.insert(action_type.into(), minimum);
        self
    }

    pub fn default_cost(mut self, cost: u64) -> Self {
        self.table.default_cost = cost;
        self
    }

    pub fn build(self) -> PriceTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_action_uses_default_cost() {
        let table = PriceTable::default();
        assert_eq!(table.cost("export_report"), DEFAULT_COST);
        assert_eq!(table.minimum_balance("export_report"), None);
    }

    #[test]
    fn test_connect_channel_is_free_with_floor() {
        let table = PriceTable::default();
        assert_eq!(table.cost(actions::CONNECT_CHANNEL), 0);
        assert_eq!(table.minimum_balance(actions::CONNECT_CHANNEL), Some(10));
        assert!(!table.is_free(actions::CONNECT_CHANNEL));
    }

    #[test]
    fn test_builder_overrides() {
        let table = PriceTable::builder()
            .cost("ping", 0)
            .cost("render", 8)
            .default_cost(3)
            .build();

        assert!(table.is_free("ping"));
        assert_eq!(table.cost("render"), 8);
        assert_eq!(table.cost("anything"), 3);
        assert_eq!(table.default_cost(), 3);
    }
}
