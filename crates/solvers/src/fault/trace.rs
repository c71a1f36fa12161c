//! The trace module holds the [TraceProvider] trait.

use anyhow::Result;
use ethers::types::{Bytes, H256};

/// The [TraceProvider] trait describes a source of truth for the execution
/// trace under dispute. Implementations answer for the canonical state of the
/// trace at any step and supply the proof material an onchain step requires.
///
/// Implementations must tolerate concurrent reads; the [Solver](crate::fault::Solver)
/// adds no serialization of its own.
pub trait TraceProvider: Send + Sync {
    /// Returns the state commitment at the given trace index.
    ///
    /// ### Takes
    /// - `index`: The trace index to look up.
    ///
    /// ### Returns
    /// - `Ok(H256)`: The canonical state commitment at `index`.
    /// - `Err(anyhow::Error)`: The trace could not be read at `index`.
    fn get(&self, index: u64) -> Result<H256>;

    /// Returns the absolute pre-state of the trace, i.e. the state before the
    /// first step has executed.
    fn absolute_pre_state(&self) -> Bytes;

    /// Returns the pre-state and proof material for the step at the given trace
    /// index.
    ///
    /// ### Takes
    /// - `index`: The trace index of the step being proven.
    ///
    /// ### Returns
    /// - `Ok((Bytes, Bytes))`: The pre-state preimage and the proof data.
    /// - `Err(anyhow::Error)`: The preimage could not be materialized.
    fn get_preimage(&self, index: u64) -> Result<(Bytes, Bytes)>;

    /// Returns the preimage oracle key and data referenced by the step at the
    /// given trace index.
    ///
    /// ### Takes
    /// - `index`: The trace index of the step.
    ///
    /// ### Returns
    /// - `Ok((Bytes, Bytes))`: The oracle key and the data stored under it.
    /// - `Err(anyhow::Error)`: The oracle data could not be materialized.
    fn get_oracle_data(&self, index: u64) -> Result<(Bytes, Bytes)>;
}
