//! Persisted registry of known identities.

use rollcall_core::RegisteredFace;

use crate::kv::KvStore;
use crate::StoreError;

/// Collection key in the backing document.
const REGISTRY_KEY: &str = "registeredFaces";

/// Append-only collection of registered faces; the full collection is
/// the matcher's gallery, in insertion order.
pub struct FaceRegistry<S: KvStore> {
    store: S,
}

impl<S: KvStore> FaceRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read the whole collection. An absent key is the empty registry.
    pub fn list(&self) -> Result<Vec<RegisteredFace>, StoreError> {
        match self.store.get(REGISTRY_KEY)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    /// Append one face and rewrite the collection.
    pub fn append(&self, face: RegisteredFace) -> Result<(), StoreError> {
        let mut faces = self.list()?;
        faces.push(face);
        self.store.put(REGISTRY_KEY, &serde_json::to_string(&faces)?)?;
        tracing::debug!(count = faces.len(), "registry written");
        Ok(())
    }
}
