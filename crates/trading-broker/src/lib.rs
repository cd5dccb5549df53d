//! Broker adapters.

mod simulated;

pub use simulated::{BrokerCall, JournalEntry, SimulatedBroker};
