//! Height-gated consensus features.
//!
//! Every fork-sensitive branch in the core funnels through [`FeatureSet`]
//! so that a replay difference is attributable to exactly one site. The
//! chain currently has a single fork flag, R2.

use serde::{Deserialize, Serialize};

/// Major consensus versions, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ForkVersion {
    /// Genesis rules.
    R1,
    /// Fee floor, delegate-vote signatures, registered-candidate checks.
    R2,
}

/// The feature switches active at one block height.
///
/// Constructed per block by the driver and passed down explicitly; the
/// core never consults ambient chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    version: ForkVersion,
}

impl FeatureSet {
    /// Resolve the feature set for `height` given the R2 activation height.
    pub fn at(height: u32, fork_height_r2: u32) -> Self {
        let version = if height >= fork_height_r2 {
            ForkVersion::R2
        } else {
            ForkVersion::R1
        };
        Self { version }
    }

    pub fn version(&self) -> ForkVersion {
        self.version
    }

    /// Whether `MIN_TX_FEE` is enforced.
    pub fn enforces_min_fee(&self) -> bool {
        self.version >= ForkVersion::R2
    }

    /// Whether delegate-vote transactions must carry a valid signature.
    pub fn verifies_vote_signature(&self) -> bool {
        self.version >= ForkVersion::R2
    }

    /// Whether vote candidates must already be registered.
    pub fn requires_registered_candidates(&self) -> bool {
        self.version >= ForkVersion::R2
    }
}
