#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
pub mod timer_store;

pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
pub use timer_store::TimerStore;
