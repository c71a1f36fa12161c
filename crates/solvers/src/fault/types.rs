//! The types module contains the value types shared by the fault dispute game
//! solver and the drivers built on top of it.

use super::Position;
use ethers::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

/// The [ClaimData] struct pairs a claimed state commitment with the position in
/// the game tree that the commitment is made at. It asserts that the canonical
/// execution trace, at the position's trace index, hashes to `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimData {
    /// The 32 byte commitment to the state of the execution trace.
    pub value: H256,
    /// The generalized index of the claim within the game tree.
    pub position: u128,
}

/// The [Claim] struct is an immutable snapshot of a single claim within an
/// onchain fault dispute game, together with its parent linkage in the
/// contract's claim array. The solver never mutates a [Claim]; it only derives
/// new child claims from one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// The claim being made.
    pub claim: ClaimData,
    /// The claim being countered. `None` for the root claim.
    pub parent: Option<ClaimData>,
    /// The index of the parent claim within the onchain claim array.
    pub parent_contract_index: usize,
    /// The index of this claim within the onchain claim array.
    pub contract_index: usize,
}

impl Claim {
    /// Returns the position of the claim within the game tree.
    pub fn position(&self) -> u128 {
        self.claim.position
    }

    /// Returns the depth of the claim within the game tree.
    pub fn depth(&self) -> u64 {
        self.claim.position.depth()
    }

    /// Returns `true` if the claim sits at the root of the game tree.
    pub fn is_root(&self) -> bool {
        self.claim.position.is_root()
    }
}

/// The [StepData] struct holds the materialized inputs for a single onchain VM
/// step against a leaf claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepData {
    /// The leaf claim the step counters.
    pub leaf_claim: Claim,
    /// Whether the step disputes the leaf claim or supports it.
    pub is_attack: bool,
    /// The pre-state the step executes on top of.
    pub pre_state: Bytes,
    /// The proof material accompanying the pre-state.
    pub proof_data: Bytes,
}

/// The [PreimageOracleData] struct holds the key and data to populate the
/// preimage oracle with ahead of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreimageOracleData {
    /// The key the preimage is stored under in the oracle.
    pub oracle_key: Bytes,
    /// The preimage itself.
    pub oracle_data: Bytes,
}

impl PreimageOracleData {
    /// Creates a new [PreimageOracleData] from the oracle key and data.
    pub fn new(oracle_key: Bytes, oracle_data: Bytes) -> Self {
        Self {
            oracle_key,
            oracle_data,
        }
    }
}
