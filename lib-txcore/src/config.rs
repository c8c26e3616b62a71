//! Core configuration.
//!
//! Runtime knobs the block driver supplies; consensus constants stay in
//! [`crate::constants`].

use crate::features::FeatureSet;

/// Configuration for transaction execution.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Height at which the R2 feature set activates.
    pub fork_height_r2: u32,
    /// Width of the valid-height window around the chain tip, in blocks.
    pub tx_cache_height: u32,
    /// Whether the address→tx secondary index is maintained.
    pub address_index_enabled: bool,
    /// Fuel price for the block being processed, in smallest units per
    /// `FUEL_STEP` run-steps.
    pub fuel_rate: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            fork_height_r2: 0,
            tx_cache_height: 500,
            address_index_enabled: false,
            fuel_rate: 1,
        }
    }
}

impl CoreConfig {
    /// Set the R2 activation height.
    pub fn with_fork_height_r2(mut self, height: u32) -> Self {
        self.fork_height_r2 = height;
        self
    }

    /// Enable or disable the address→tx index.
    pub fn with_address_index(mut self, enabled: bool) -> Self {
        self.address_index_enabled = enabled;
        self
    }

    /// Set the per-block fuel rate.
    pub fn with_fuel_rate(mut self, rate: u64) -> Self {
        self.fuel_rate = rate;
        self
    }

    /// Set the valid-height window width.
    pub fn with_tx_cache_height(mut self, blocks: u32) -> Self {
        self.tx_cache_height = blocks;
        self
    }

    /// Feature switches active at `height`.
    pub fn features_at(&self, height: u32) -> FeatureSet {
        FeatureSet::at(height, self.fork_height_r2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let cfg = CoreConfig::default()
            .with_fork_height_r2(1000)
            .with_address_index(true)
            .with_fuel_rate(5);
        assert_eq!(cfg.fork_height_r2, 1000);
        assert!(cfg.address_index_enabled);
        assert_eq!(cfg.fuel_rate, 5);
        assert!(!cfg.features_at(999).enforces_min_fee());
        assert!(cfg.features_at(1000).enforces_min_fee());
    }
}
