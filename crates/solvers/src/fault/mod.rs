//! Data structures, types, and the move solver for the fault dispute game.

mod alphabet;
pub use alphabet::AlphabetProvider;

mod position;
pub use position::{compute_gindex, Position};

mod solver;
pub use solver::{MoveKind, Solver, SolverError};

mod trace;
pub use trace::TraceProvider;

mod types;
pub use types::*;
