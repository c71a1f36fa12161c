//! The alphabet module contains the [AlphabetProvider], a [TraceProvider] whose
//! execution trace steps through the letters of a fixed string, one letter per
//! trace index. It backs the alphabet fault dispute game and the solver test
//! suite.

use super::TraceProvider;
use anyhow::{anyhow, Result};
use ethers::{
    abi::{self, Token},
    types::{Bytes, H256, U256},
    utils::keccak256,
};

/// The state preceding the first letter of any alphabet trace: the character
/// before `a`.
const ABSOLUTE_PRE_STATE: u64 = 96;

/// The [AlphabetProvider] serves canonical claims for an alphabet trace. Claims
/// commit to the ABI encoding of the `(trace index, letter)` pair, and the
/// encoding itself doubles as the step pre-state.
pub struct AlphabetProvider {
    /// The letters of the trace, in execution order.
    letters: Vec<u8>,
    /// The maximum depth of the game tree the trace backs.
    depth: u64,
}

impl AlphabetProvider {
    /// Creates a new [AlphabetProvider] over the given letters for a game of
    /// the given depth.
    pub fn new(letters: &str, depth: u64) -> Self {
        Self {
            letters: letters.as_bytes().to_vec(),
            depth,
        }
    }

    /// Returns the number of leaves in a game tree of the provider's depth.
    fn max_len(&self) -> u64 {
        1 << self.depth
    }

    /// Returns the `(trace index, letter)` pair backing the claim at `index`.
    /// A trace shorter than the tree repeats its final state across the
    /// remaining leaves.
    fn state_at(&self, index: u64) -> Result<(u64, u8)> {
        if index >= self.max_len() {
            return Err(anyhow!(
                "trace index {index} is outside a depth {} game",
                self.depth
            ));
        }
        let clamped = (index as usize).min(self.letters.len().saturating_sub(1));
        let letter = self
            .letters
            .get(clamped)
            .copied()
            .ok_or_else(|| anyhow!("the alphabet trace is empty"))?;
        Ok((clamped as u64, letter))
    }

    /// ABI encodes the `(trace index, state)` pair a claim commits to.
    fn encode_state(index: u64, state: u64) -> Bytes {
        abi::encode(&[
            Token::Uint(U256::from(index)),
            Token::Uint(U256::from(state)),
        ])
        .into()
    }
}

impl TraceProvider for AlphabetProvider {
    fn get(&self, index: u64) -> Result<H256> {
        let (index, letter) = self.state_at(index)?;
        Ok(keccak256(Self::encode_state(index, letter as u64)).into())
    }

    fn absolute_pre_state(&self) -> Bytes {
        Self::encode_state(0, ABSOLUTE_PRE_STATE)
    }

    fn get_preimage(&self, index: u64) -> Result<(Bytes, Bytes)> {
        let (index, letter) = self.state_at(index)?;
        Ok((Self::encode_state(index, letter as u64), Bytes::default()))
    }

    fn get_oracle_data(&self, index: u64) -> Result<(Bytes, Bytes)> {
        let (index, letter) = self.state_at(index)?;
        let preimage = Self::encode_state(index, letter as u64);
        Ok((Bytes::from(keccak256(&preimage).to_vec()), preimage))
    }
}
