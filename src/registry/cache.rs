//! In-process id cache in front of a registry client

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

use super::{Lookup, RegistryClient, RegistryError, SchemaId};
use crate::checksum::Checksum;
use crate::schema::ParsedSchema;
use crate::subject::Subject;

type CacheKey = (Subject, Checksum);

/// Remembers known `(subject, schema)` ids, evicting the least recently used
/// past capacity.
///
/// Only positive answers are cached; `NotFound` and errors always go through
/// to the wrapped client. A capacity of zero disables caching.
#[derive(Debug)]
pub struct CachedRegistryClient<C> {
    inner: C,
    entries: Option<Mutex<LruCache<CacheKey, SchemaId>>>,
}

impl<C: RegistryClient> CachedRegistryClient<C> {
    pub fn new(inner: C, capacity: usize) -> Self {
        Self {
            inner,
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<CacheKey, SchemaId>>> {
        self.entries
            .as_ref()
            .map(|entries| entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn get(&self, key: &CacheKey) -> Option<SchemaId> {
        self.lock()?.get(key).copied()
    }

    fn remember(&self, key: CacheKey, id: SchemaId) {
        if let Some(mut entries) = self.lock() {
            entries.put(key, id);
        }
    }
}

impl<C: RegistryClient> RegistryClient for CachedRegistryClient<C> {
    fn lookup(&self, subject: &Subject, schema: &ParsedSchema) -> Result<Lookup, RegistryError> {
        let key = (subject.clone(), schema.fingerprint().clone());
        if let Some(id) = self.get(&key) {
            tracing::debug!(subject = %subject, id, "Schema id served from cache");
            return Ok(Lookup::Found(id));
        }

        let lookup = self.inner.lookup(subject, schema)?;
        if let Lookup::Found(id) = lookup {
            self.remember(key, id);
        }
        Ok(lookup)
    }

    fn register(&self, subject: &Subject, schema: &ParsedSchema) -> Result<SchemaId, RegistryError> {
        let id = self.inner.register(subject, schema)?;
        self.remember((subject.clone(), schema.fingerprint().clone()), id);
        Ok(id)
    }
}
