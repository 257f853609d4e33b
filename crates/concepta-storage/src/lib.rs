//! Persistence for order records.
//!
//! Provides the [`OrderStore`] trait plus the [`InMemoryOrderStore`] and
//! [`SqliteOrderStore`] backends. A compilation loads every record up front
//! and appends the new ones in one atomic batch after it succeeds.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: OrderStore trait definition
//! - [`memory`]: InMemoryOrderStore implementation
//! - [`schema`]: migration setup for the SQLite backend
//! - [`sqlite`]: SqliteOrderStore implementation

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use memory::InMemoryOrderStore;
pub use sqlite::SqliteOrderStore;
pub use traits::OrderStore;
