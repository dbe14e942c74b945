// Warden — Key-Value Persistence Boundary
//
// The encrypted store and the audit log persist through this trait only.
// Two backends ship with the crate: an in-process map and a SQLite file.

mod error;
mod memory;
mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use error::KvError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Asynchronous string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Insert or overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), KvError>;

    /// Snapshot of every key and value, ordered by key.
    async fn list_all(&self) -> Result<BTreeMap<String, String>, KvError>;
}
