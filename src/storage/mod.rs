//! Storage backends behind one contract.

pub mod backend;
pub mod ephemeral;
pub mod sqlite;
pub mod sqlite_vec_loader;

pub use backend::{ScoredEntry, SearchFilters, StorageBackend, StoreFuture};
pub use ephemeral::EphemeralBackend;
pub use sqlite::SqliteVectorBackend;
pub use sqlite_vec_loader::init_sqlite_vec_extension;
