//! In-memory registry
//!
//! Behaves like a Confluent registry for the calls the migrator makes: ids are
//! assigned per distinct schema, registering the same schema under the same
//! subject again returns the existing id. Every call is recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{Lookup, RegistryClient, RegistryError, SchemaId};
use crate::checksum::Checksum;
use crate::schema::ParsedSchema;
use crate::subject::Subject;

/// A recorded registry call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Lookup(Subject),
    Register(Subject),
}

#[derive(Debug, Default)]
struct State {
    next_id: SchemaId,
    ids: HashMap<Checksum, SchemaId>,
    subjects: HashMap<Subject, Vec<(Checksum, SchemaId)>>,
    calls: Vec<RegistryCall>,
    created: usize,
}

impl State {
    fn id_for(&mut self, fingerprint: &Checksum) -> SchemaId {
        if let Some(id) = self.ids.get(fingerprint) {
            return *id;
        }
        self.next_id += 1;
        self.ids.insert(fingerprint.clone(), self.next_id);
        self.next_id
    }

    fn find(&self, subject: &Subject, fingerprint: &Checksum) -> Option<SchemaId> {
        self.subjects
            .get(subject)?
            .iter()
            .find(|(existing, _)| existing == fingerprint)
            .map(|(_, id)| *id)
    }

    fn insert(&mut self, subject: &Subject, fingerprint: &Checksum) -> SchemaId {
        if let Some(id) = self.find(subject, fingerprint) {
            return id;
        }
        let id = self.id_for(fingerprint);
        self.subjects
            .entry(subject.clone())
            .or_default()
            .push((fingerprint.clone(), id));
        self.created += 1;
        id
    }
}

/// Registry held in process memory
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a registration without recording a call
    pub fn preload(&self, subject: &Subject, schema: &ParsedSchema) -> SchemaId {
        let mut state = self.lock();
        let created = state.created;
        let id = state.insert(subject, schema.fingerprint());
        state.created = created;
        id
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.count(|call| matches!(call, RegistryCall::Lookup(_)))
    }

    pub fn register_count(&self) -> usize {
        self.count(|call| matches!(call, RegistryCall::Register(_)))
    }

    /// Registrations that created a new subject version
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    /// Registered subjects, sorted
    pub fn subjects(&self) -> Vec<Subject> {
        let mut subjects: Vec<Subject> = self.lock().subjects.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    /// Number of versions stored under a subject
    pub fn version_count(&self, subject: &Subject) -> usize {
        self.lock().subjects.get(subject).map(Vec::len).unwrap_or(0)
    }

    fn count(&self, predicate: impl Fn(&RegistryCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RegistryClient for InMemoryRegistry {
    fn lookup(&self, subject: &Subject, schema: &ParsedSchema) -> Result<Lookup, RegistryError> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::Lookup(subject.clone()));
        Ok(match state.find(subject, schema.fingerprint()) {
            Some(id) => Lookup::Found(id),
            None => Lookup::NotFound,
        })
    }

    fn register(&self, subject: &Subject, schema: &ParsedSchema) -> Result<SchemaId, RegistryError> {
        let mut state = self.lock();
        state.calls.push(RegistryCall::Register(subject.clone()));
        Ok(state.insert(subject, schema.fingerprint()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str) -> ParsedSchema {
        ParsedSchema::parse(&format!(r#"{{"type":"record","name":"{}","fields":[]}}"#, name)).unwrap()
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = InMemoryRegistry::new();
        let subject = Subject::new("orders-value");

        let first = registry.register(&subject, &schema("Order")).unwrap();
        let second = registry.register(&subject, &schema("Order")).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.version_count(&subject), 1);
        assert_eq!(registry.created_count(), 1);
        assert_eq!(registry.register_count(), 2);
    }

    #[test]
    fn test_same_schema_shares_id_across_subjects() {
        let registry = InMemoryRegistry::new();
        let a = registry.register(&Subject::new("a-value"), &schema("Order")).unwrap();
        let b = registry.register(&Subject::new("b-value"), &schema("Order")).unwrap();
        let c = registry.register(&Subject::new("a-value"), &schema("Refund")).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.version_count(&Subject::new("a-value")), 2);
    }

    #[test]
    fn test_preload_is_not_recorded() {
        let registry = InMemoryRegistry::new();
        let subject = Subject::new("orders-value");
        let id = registry.preload(&subject, &schema("Order"));

        assert!(registry.calls().is_empty());
        assert_eq!(registry.created_count(), 0);
        assert_eq!(registry.lookup(&subject, &schema("Order")).unwrap(), Lookup::Found(id));
    }
}
