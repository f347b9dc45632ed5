//! Data store collaborator holding opaque encrypted payloads.

use ::core::future::Future;
use ::std::collections::{BTreeMap, HashMap};
use ::std::sync::{Mutex, MutexGuard, PoisonError};

use ::opal_common::{
    anyhow::anyhow,
    error::{OpalError, Result},
    timestamp::Timestamp,
    tracing::debug,
    uuid::Uuid,
};

pub type DataMetadata = BTreeMap<String, String>;

/// Storage for opaque payload bytes, addressed by opaque ids. The service
/// only passes ids through; it never interprets the bytes.
pub trait DataStore: Send + Sync + 'static {
    /// Persist `bytes` and return the generated id. `size` and
    /// `created_at` are stamped into the metadata.
    fn store(
        &self,
        bytes: Vec<u8>,
        metadata: DataMetadata,
    ) -> impl Future<Output = Result<String>> + Send;

    /// # Return
    /// - `Ok((bytes, metadata))` if the id exists.
    /// - A not-found error otherwise.
    fn retrieve(&self, id: &str) -> impl Future<Output = Result<(Vec<u8>, DataMetadata)>> + Send;
}

/// In-memory store, the embedded counterpart of an external blob store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, DataMetadata)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (Vec<u8>, DataMetadata)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DataStore for MemoryStore {
    fn store(
        &self,
        bytes: Vec<u8>,
        mut metadata: DataMetadata,
    ) -> impl Future<Output = Result<String>> + Send {
        let id = Uuid::new_v4().to_string();
        metadata.insert("size".to_owned(), bytes.len().to_string());
        metadata.insert("created_at".to_owned(), Timestamp::now().to_string());
        self.entries().insert(id.clone(), (bytes, metadata));
        debug!("Data stored: {}", id);
        async move { Ok(id) }
    }

    fn retrieve(&self, id: &str) -> impl Future<Output = Result<(Vec<u8>, DataMetadata)>> + Send {
        let entry = self.entries().get(id).cloned();
        let id = id.to_owned();
        async move { entry.ok_or_else(|| OpalError::not_found(anyhow!("Data {} not found", id))) }
    }
}
