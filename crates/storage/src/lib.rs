#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{InMemorySessionStore, SessionStore, Storage, StorageError};
pub use sqlite::{SqliteInitError, SqliteSessionStore};
