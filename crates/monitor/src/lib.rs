//! `argus-monitor` contains the dispute game discovery loop for the argus
//! challenge agent: it tracks chain head notifications, discovers the games
//! created within its window, and dispatches them to a scheduler, recovering
//! transparently from head subscription failures.

/// Contains the smart contract bindings used by the monitor's chain adapters.
pub mod bindings;

mod chain;
pub use chain::{FactoryGameSource, WsHeadSource};

mod clock;
pub use clock::{Clock, FixedClock, SystemClock};

mod monitor;
pub use monitor::GameMonitor;

mod sources;
pub use sources::{
    BlockNumberFetcher, FaultDisputeGame, GameSource, Head, HeadSource, HeadSubscription,
    Scheduler,
};
