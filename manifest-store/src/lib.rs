//! manifest-store: the Performance Store and its storage backends.
//!
//! The store keeps loaded year documents in memory, answers reads from that
//! cache synchronously, and runs mutations one at a time: update the cache,
//! recompute aggregates, persist, and roll back if the persist fails.

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod store;

pub use backend::StorageBackend;
pub use backends::{InMemoryBackend, JsonFileBackend};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::{PerformanceStore, YearState};
