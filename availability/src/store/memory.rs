//! An in-memory [Store].

use super::{Error, Store};
use crate::nmt::{self, Id};
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A [Store] backed by a shared map.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct Memory {
    blobs: Arc<Mutex<HashMap<Id, Bytes>>>,
}

impl Memory {
    /// Remove the blob stored under `id`, returning true if it was present.
    pub fn remove(&self, id: &Id) -> bool {
        self.blobs.lock().unwrap().remove(id).is_some()
    }

    /// Returns true if a blob is stored under `id`.
    pub fn contains(&self, id: &Id) -> bool {
        self.blobs.lock().unwrap().contains_key(id)
    }

    /// Overwrite the blob stored under `id` without re-addressing it.
    ///
    /// Useful to simulate a store that serves bytes not matching their address.
    pub fn tamper(&self, id: Id, blob: Bytes) {
        self.blobs.lock().unwrap().insert(id, blob);
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for Memory {
    async fn get(&self, id: &Id) -> Result<Bytes, Error> {
        self.blobs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(Error::NotFound(*id))
    }

    async fn put_batch(&self, blobs: Vec<Bytes>) -> Result<Vec<Id>, Error> {
        let mut stored = self.blobs.lock().unwrap();
        Ok(blobs
            .into_iter()
            .map(|blob| {
                let id = nmt::id(&blob);
                stored.insert(id, blob);
                id
            })
            .collect())
    }
}
