//! The solver module contains the [Solver], which decides the next move to make
//! against a claim in a fault dispute game.

use super::{Claim, ClaimData, Position, PreimageOracleData, StepData, TraceProvider};
use ethers::types::{Bytes, H256};
use std::{fmt, sync::Arc};
use thiserror::Error;

/// The move branch a trace lookup failed in while materializing a counter claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// The counter claim disputes its parent.
    Attack,
    /// The counter claim supports its parent.
    Defend,
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveKind::Attack => f.write_str("attack"),
            MoveKind::Defend => f.write_str("defend"),
        }
    }
}

/// Errors returned by the [Solver].
#[derive(Debug, Error)]
pub enum SolverError {
    /// A move was requested against a claim already at the maximum game depth.
    /// Leaf claims are countered with a step, not a move.
    #[error("cannot move against claims at the maximum game depth")]
    GameDepthReached,
    /// A step was requested against a claim above the maximum game depth.
    #[error("cannot step on non-leaf claims")]
    StepNonLeafNode,
    /// A step was requested against a claim level we agree with.
    #[error("cannot step on claims we agree with")]
    StepAgreedClaim,
    /// The trace provider failed while materializing a counter claim. The
    /// underlying failure is preserved for programmatic matching.
    #[error("{kind} claim: {source}")]
    TraceLookup {
        /// The move being materialized when the lookup failed.
        kind: MoveKind,
        /// The underlying trace provider failure.
        #[source]
        source: anyhow::Error,
    },
    /// The trace provider failed outside of move materialization.
    #[error(transparent)]
    Trace(#[from] anyhow::Error),
}

/// The [Solver] determines the next move to make in a dispute game from a
/// [TraceProvider]'s view of the canonical execution trace.
///
/// A [Solver] is stateless beyond its trace handle and game depth, and is safe
/// to share across games provided the [TraceProvider] tolerates concurrent
/// reads.
pub struct Solver {
    /// The provider used to source canonical trace commitments and proof data.
    trace: Arc<dyn TraceProvider>,
    /// The maximum depth of the game tree.
    game_depth: u64,
}

impl Solver {
    /// Creates a new [Solver] over the given trace with a fixed game depth.
    pub fn new(game_depth: u64, trace: Arc<dyn TraceProvider>) -> Self {
        Self { trace, game_depth }
    }

    /// Returns the next move to make against the given claim, or `None` if
    /// there is nothing to counter.
    ///
    /// ### Takes
    /// - `claim`: The claim to counter.
    /// - `agree_with_claim_level`: Whether we agree with every claim at the
    ///   claim's level of the game.
    ///
    /// ### Returns
    /// - `Ok(Some(Claim))`: The counter claim to submit.
    /// - `Ok(None)`: No move is warranted.
    /// - `Err(SolverError)`: The claim is not moveable or the trace failed.
    pub fn next_move(
        &self,
        claim: &Claim,
        agree_with_claim_level: bool,
    ) -> Result<Option<Claim>, SolverError> {
        if agree_with_claim_level {
            return Ok(None);
        }
        if claim.depth() == self.game_depth {
            return Err(SolverError::GameDepthReached);
        }
        if self.agree_with_claim(&claim.claim)? {
            self.defend(claim)
        } else {
            self.attack(claim)
        }
    }

    /// Returns the preimage oracle data referenced by the claim's trace index,
    /// to be submitted ahead of a step.
    pub fn oracle_data(&self, claim: &Claim) -> Result<PreimageOracleData, SolverError> {
        let index = claim.position().trace_index(self.game_depth);
        let (key, data) = self.trace.get_oracle_data(index)?;
        Ok(PreimageOracleData::new(key, data))
    }

    /// Determines the inputs of the onchain VM step countering the given leaf
    /// claim.
    ///
    /// ### Takes
    /// - `claim`: The leaf claim to step against.
    /// - `agree_with_claim_level`: Whether we agree with every claim at the
    ///   claim's level of the game.
    ///
    /// ### Returns
    /// - `Ok(StepData)`: The materialized step inputs.
    /// - `Err(SolverError)`: The claim is not steppable or the trace failed.
    pub fn attempt_step(
        &self,
        claim: &Claim,
        agree_with_claim_level: bool,
    ) -> Result<StepData, SolverError> {
        if claim.depth() != self.game_depth {
            return Err(SolverError::StepNonLeafNode);
        }
        if agree_with_claim_level {
            return Err(SolverError::StepAgreedClaim);
        }

        let claim_correct = self.agree_with_claim(&claim.claim)?;
        let mut index = claim.position().trace_index(self.game_depth);
        let (pre_state, proof_data) = if index == 0 && !claim_correct {
            // No state precedes the first step, so an attack on it executes from
            // the absolute pre-state and carries no proof material.
            (self.trace.absolute_pre_state(), Bytes::default())
        } else {
            // An attack proves the transition into the contested step, starting
            // from the state one step prior. A defense proves the transition the
            // claim itself asserts.
            if !claim_correct {
                index -= 1;
            }
            self.trace.get_preimage(index)?
        };

        Ok(StepData {
            leaf_claim: claim.clone(),
            is_attack: !claim_correct,
            pre_state,
            proof_data,
        })
    }

    /// Materializes the claim attacking the given claim. An attack is legal
    /// against any claim, the root included.
    fn attack(&self, claim: &Claim) -> Result<Option<Claim>, SolverError> {
        let position = claim.position().attack();
        let value = self.trace_at(position).map_err(|source| SolverError::TraceLookup {
            kind: MoveKind::Attack,
            source,
        })?;
        tracing::debug!(target: "fault-solver", "Attacking claim at gindex {} with a counter claim at gindex {}", claim.position(), position);
        Ok(Some(Self::counter(claim, position, value)))
    }

    /// Materializes the claim defending the given claim. The root claim cannot
    /// be defended; agreeing with it means there is nothing left to counter.
    fn defend(&self, claim: &Claim) -> Result<Option<Claim>, SolverError> {
        if claim.is_root() {
            return Ok(None);
        }
        let position = claim.position().defend();
        let value = self.trace_at(position).map_err(|source| SolverError::TraceLookup {
            kind: MoveKind::Defend,
            source,
        })?;
        tracing::debug!(target: "fault-solver", "Defending claim at gindex {} with a counter claim at gindex {}", claim.position(), position);
        Ok(Some(Self::counter(claim, position, value)))
    }

    /// Builds the child claim countering `claim` at `position` with `value`.
    fn counter(claim: &Claim, position: u128, value: H256) -> Claim {
        Claim {
            claim: ClaimData { value, position },
            parent: Some(claim.claim),
            parent_contract_index: claim.contract_index,
            contract_index: 0,
        }
    }

    /// Returns `true` if the claimed value matches the canonical trace at the
    /// claim's position.
    fn agree_with_claim(&self, claim: &ClaimData) -> anyhow::Result<bool> {
        let our_value = self.trace_at(claim.position)?;
        Ok(our_value == claim.value)
    }

    /// Returns the canonical trace commitment at the given position.
    fn trace_at(&self, position: u128) -> anyhow::Result<H256> {
        self.trace.get(position.trace_index(self.game_depth))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fault::AlphabetProvider;
    use anyhow::Result;

    const GAME_DEPTH: u64 = 4;
    const TRACE: &str = "abcdefghijklmnop";

    /// A sentinel failure injected into the trace backend by tests.
    #[derive(Debug, Error)]
    #[error("trace backend offline")]
    struct BackendOffline;

    /// A [TraceProvider] decorator around the [AlphabetProvider] that tags
    /// preimages with a per-index proof and injects failures into configured
    /// lookups.
    struct AlphabetWithProofProvider {
        inner: AlphabetProvider,
        fail_get_at: Option<u64>,
        fail_oracle: bool,
    }

    impl AlphabetWithProofProvider {
        fn new() -> Self {
            Self {
                inner: AlphabetProvider::new(TRACE, GAME_DEPTH),
                fail_get_at: None,
                fail_oracle: false,
            }
        }
    }

    impl TraceProvider for AlphabetWithProofProvider {
        fn get(&self, index: u64) -> Result<H256> {
            if self.fail_get_at == Some(index) {
                return Err(anyhow::Error::new(BackendOffline));
            }
            self.inner.get(index)
        }

        fn absolute_pre_state(&self) -> Bytes {
            self.inner.absolute_pre_state()
        }

        fn get_preimage(&self, index: u64) -> Result<(Bytes, Bytes)> {
            let (pre_state, _) = self.inner.get_preimage(index)?;
            Ok((pre_state, Bytes::from(vec![index as u8])))
        }

        fn get_oracle_data(&self, index: u64) -> Result<(Bytes, Bytes)> {
            if self.fail_oracle {
                return Err(anyhow::Error::new(BackendOffline));
            }
            self.inner.get_oracle_data(index)
        }
    }

    fn provider() -> AlphabetProvider {
        AlphabetProvider::new(TRACE, GAME_DEPTH)
    }

    fn solver() -> Solver {
        Solver::new(GAME_DEPTH, Arc::new(provider()))
    }

    /// Builds a claim at `position`, asserting the canonical value when
    /// `correct` and a corrupted one otherwise.
    fn claim_at(position: u128, correct: bool) -> Claim {
        let mut value = provider()
            .get(position.trace_index(GAME_DEPTH))
            .expect("canonical value");
        if !correct {
            value.0[0] ^= 0xff;
        }
        Claim {
            claim: ClaimData { value, position },
            parent: None,
            parent_contract_index: 0,
            contract_index: position as usize,
        }
    }

    #[test]
    fn agreed_claim_level_yields_no_move() {
        let claim = claim_at(2, false);
        assert_eq!(solver().next_move(&claim, true).unwrap(), None);
    }

    #[test]
    fn move_at_max_depth_fails() {
        let claim = claim_at(1 << GAME_DEPTH, false);
        let err = solver().next_move(&claim, false).unwrap_err();
        assert!(matches!(err, SolverError::GameDepthReached));
    }

    #[test]
    fn disagreement_attacks_the_claim() {
        let solver = solver();
        for gindex in [1u128, 2, 5, 11] {
            let claim = claim_at(gindex, false);
            let counter = solver
                .next_move(&claim, false)
                .unwrap()
                .expect("expected a move");
            assert_eq!(counter.position(), gindex.attack());
            assert_eq!(
                counter.claim.value,
                provider()
                    .get(gindex.attack().trace_index(GAME_DEPTH))
                    .unwrap()
            );
            assert_eq!(counter.parent, Some(claim.claim));
            assert_eq!(counter.parent_contract_index, claim.contract_index);
        }
    }

    #[test]
    fn agreement_defends_the_claim() {
        let solver = solver();
        for gindex in [2u128, 3, 6, 13] {
            let claim = claim_at(gindex, true);
            let counter = solver
                .next_move(&claim, false)
                .unwrap()
                .expect("expected a move");
            assert_eq!(counter.position(), gindex.defend());
            assert_eq!(
                counter.claim.value,
                provider()
                    .get(gindex.defend().trace_index(GAME_DEPTH))
                    .unwrap()
            );
            assert_eq!(counter.parent, Some(claim.claim));
            assert_eq!(counter.parent_contract_index, claim.contract_index);
        }
    }

    #[test]
    fn agreement_with_root_yields_no_move() {
        let claim = claim_at(1, true);
        assert_eq!(solver().next_move(&claim, false).unwrap(), None);
    }

    #[test]
    fn attack_lookup_failure_is_tagged() {
        // The agreement check reads the root's trace index; only the attack
        // branch lookup fails.
        let provider = AlphabetWithProofProvider {
            fail_get_at: Some(1u128.attack().trace_index(GAME_DEPTH)),
            ..AlphabetWithProofProvider::new()
        };
        let solver = Solver::new(GAME_DEPTH, Arc::new(provider));
        let err = solver.next_move(&claim_at(1, false), false).unwrap_err();
        assert!(err.to_string().starts_with("attack claim:"));
        match err {
            SolverError::TraceLookup { kind, source } => {
                assert_eq!(kind, MoveKind::Attack);
                assert!(source.downcast_ref::<BackendOffline>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn defend_lookup_failure_is_tagged() {
        let provider = AlphabetWithProofProvider {
            fail_get_at: Some(2u128.defend().trace_index(GAME_DEPTH)),
            ..AlphabetWithProofProvider::new()
        };
        let solver = Solver::new(GAME_DEPTH, Arc::new(provider));
        let err = solver.next_move(&claim_at(2, true), false).unwrap_err();
        assert!(err.to_string().starts_with("defend claim:"));
        match err {
            SolverError::TraceLookup { kind, source } => {
                assert_eq!(kind, MoveKind::Defend);
                assert!(source.downcast_ref::<BackendOffline>().is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn agreement_check_failure_passes_through() {
        let provider = AlphabetWithProofProvider {
            fail_get_at: Some(2u128.trace_index(GAME_DEPTH)),
            ..AlphabetWithProofProvider::new()
        };
        let solver = Solver::new(GAME_DEPTH, Arc::new(provider));
        let err = solver.next_move(&claim_at(2, true), false).unwrap_err();
        match err {
            SolverError::Trace(source) => {
                assert!(source.downcast_ref::<BackendOffline>().is_some())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn step_on_non_leaf_fails() {
        let claim = claim_at(5, false);
        let err = solver().attempt_step(&claim, false).unwrap_err();
        assert!(matches!(err, SolverError::StepNonLeafNode));
    }

    #[test]
    fn step_on_agreed_claim_level_fails() {
        let claim = claim_at(1 << GAME_DEPTH, false);
        let err = solver().attempt_step(&claim, true).unwrap_err();
        assert!(matches!(err, SolverError::StepAgreedClaim));
    }

    #[test]
    fn step_against_first_leaf_uses_absolute_pre_state() {
        let claim = claim_at(1 << GAME_DEPTH, false);
        let step = solver().attempt_step(&claim, false).unwrap();
        assert!(step.is_attack);
        assert_eq!(step.leaf_claim, claim);
        assert_eq!(step.pre_state, provider().absolute_pre_state());
        assert!(step.proof_data.is_empty());
    }

    #[test]
    fn step_against_incorrect_leaf_proves_prior_transition() {
        let solver = Solver::new(GAME_DEPTH, Arc::new(AlphabetWithProofProvider::new()));
        let gindex = compute_leaf(5);
        let step = solver.attempt_step(&claim_at(gindex, false), false).unwrap();
        assert!(step.is_attack);
        let (expected_pre, _) = provider().get_preimage(4).unwrap();
        assert_eq!(step.pre_state, expected_pre);
        assert_eq!(step.proof_data, Bytes::from(vec![4u8]));
    }

    #[test]
    fn step_against_correct_leaf_proves_claimed_transition() {
        let solver = Solver::new(GAME_DEPTH, Arc::new(AlphabetWithProofProvider::new()));
        let gindex = compute_leaf(5);
        let step = solver.attempt_step(&claim_at(gindex, true), false).unwrap();
        assert!(!step.is_attack);
        let (expected_pre, _) = provider().get_preimage(5).unwrap();
        assert_eq!(step.pre_state, expected_pre);
        assert_eq!(step.proof_data, Bytes::from(vec![5u8]));
    }

    #[test]
    fn oracle_data_round_trips_the_provider() {
        let claim = claim_at(compute_leaf(4), false);
        let oracle = solver().oracle_data(&claim).unwrap();
        let (key, data) = provider().get_oracle_data(4).unwrap();
        assert_eq!(oracle, PreimageOracleData::new(key, data));
    }

    #[test]
    fn oracle_failure_passes_through() {
        let provider = AlphabetWithProofProvider {
            fail_oracle: true,
            ..AlphabetWithProofProvider::new()
        };
        let solver = Solver::new(GAME_DEPTH, Arc::new(provider));
        let err = solver.oracle_data(&claim_at(compute_leaf(4), false)).unwrap_err();
        match err {
            SolverError::Trace(source) => {
                assert!(source.downcast_ref::<BackendOffline>().is_some())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn root_disagreement_bisects_to_the_absolute_pre_state() {
        // A dishonest actor posts leftmost claims all the way down; countering
        // each one walks four attacks from the root to the first leaf.
        let solver = solver();
        let mut position = 1u128;
        while position.depth() < GAME_DEPTH {
            let hostile = claim_at(position, false);
            let counter = solver
                .next_move(&hostile, false)
                .unwrap()
                .expect("expected a move");
            assert_eq!(counter.position(), position.attack());
            // The dishonest actor counters our claim with another attack.
            position = counter.position().attack();
        }

        assert_eq!(position, 1 << GAME_DEPTH);
        let hostile_leaf = claim_at(position, false);
        let step = solver.attempt_step(&hostile_leaf, false).unwrap();
        assert!(step.is_attack);
        assert_eq!(step.pre_state, provider().absolute_pre_state());
        assert!(step.proof_data.is_empty());
    }

    /// Returns the gindex of the leaf committing to the given trace index.
    fn compute_leaf(trace_index: u64) -> u128 {
        crate::fault::compute_gindex(GAME_DEPTH, trace_index)
    }
}
