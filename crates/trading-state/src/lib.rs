//! Persistence for the trades this process manages.
//!
//! - [`AtomicFile`]: write-then-rename file replacement with quarantine of
//!   unreadable content
//! - [`StateStore`]: ticket-keyed managed trade records backed by one JSON
//!   document

pub mod atomic;
pub mod store;

pub use atomic::AtomicFile;
pub use store::StateStore;
