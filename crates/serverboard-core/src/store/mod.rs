pub mod pointer;
pub mod roster;

pub use pointer::PointerStore;
pub use roster::{EvictionPolicy, ReconcileResult, Roster, RosterEntry};
