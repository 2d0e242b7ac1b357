//! In-memory mock implementations for testing.
//!
//! Simple, mutex-serialized implementations of the storage and
//! notification seams. The mutex gives the same atomicity the real
//! storage layer provides through conditional writes, so the coordinator
//! race tests exercise the genuine interleavings.

pub mod directory;
pub mod dispatcher;
pub mod ledger;
pub mod request_store;

pub use directory::InMemoryDirectory;
pub use dispatcher::RecordingDispatcher;
pub use ledger::InMemoryAssignmentLedger;
pub use request_store::InMemoryRequestStore;
