//! Schema Migration
//!
//! Reconciles local schema files with the registry. Each schema file goes
//! through the same steps:
//!
//! ```text
//! Pending ─ read+parse ─ lookup ─┬─ Found ─────────────────────> AlreadyRegistered
//!                                └─ NotFound ─ register ───────> NewlyRegistered
//! (any failure on the way) ────────────────────────────────────> Failed
//! ```
//!
//! Failures are recorded per file; the run always visits every resolved topic
//! and file.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::error::{ErrorKind, MigrationError};
use crate::registry::{Lookup, RegistryClient, RegistryError, SchemaId};
use crate::resolver::{DiscoveryWarning, ResolvedTopic, SourceLocation};
use crate::schema::{self, ParsedSchema};
use crate::subject::{compute_subject, Subject, SubjectNameStrategy};

/// Terminal state of one schema file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    AlreadyRegistered,
    NewlyRegistered,
    Failed,
}

/// Why a schema file failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&MigrationError> for OutcomeError {
    fn from(error: &MigrationError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of processing one schema file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationOutcome {
    pub topic: String,
    /// File name of the schema source
    pub source: String,
    /// Absent when the schema could not be read or parsed
    pub subject: Option<Subject>,
    pub schema_id: Option<SchemaId>,
    pub status: RegistrationStatus,
    pub error: Option<OutcomeError>,
}

impl RegistrationOutcome {
    pub fn is_failed(&self) -> bool {
        self.status == RegistrationStatus::Failed
    }

    fn done(topic: &str, source: &str, subject: Subject, id: SchemaId, status: RegistrationStatus) -> Self {
        Self {
            topic: topic.to_string(),
            source: source.to_string(),
            subject: Some(subject),
            schema_id: Some(id),
            status,
            error: None,
        }
    }

    fn failed(topic: &str, source: &str, subject: Option<Subject>, error: &MigrationError) -> Self {
        Self {
            topic: topic.to_string(),
            source: source.to_string(),
            subject,
            schema_id: None,
            status: RegistrationStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub strategy: SubjectNameStrategy,
    pub topics: usize,
    /// One entry per schema file, in processing order
    pub outcomes: Vec<RegistrationOutcome>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl MigrationReport {
    /// No topic resolved, so nothing was attempted
    pub fn is_empty(&self) -> bool {
        self.topics == 0
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(RegistrationOutcome::is_failed)
    }

    pub fn count(&self, status: RegistrationStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RegistrationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Drives reconciliation of resolved topics against a registry
pub struct MigrationOrchestrator<'a, C: ?Sized> {
    settings: &'a Settings,
    client: &'a C,
}

impl<'a, C: RegistryClient + ?Sized> MigrationOrchestrator<'a, C> {
    pub fn new(settings: &'a Settings, client: &'a C) -> Self {
        Self { settings, client }
    }

    /// Resolve topics and reconcile every schema file
    pub fn run(&self) -> MigrationReport {
        let started_at = Utc::now();
        let resolution = self.settings.resolver.resolve();

        if resolution.is_empty() {
            tracing::warn!(
                policy = self.settings.resolver.policy().name(),
                "No topics resolved; nothing to register"
            );
        } else {
            tracing::info!(
                topics = resolution.topics.len(),
                schemas = resolution.source_count(),
                strategy = %self.settings.strategy,
                "Starting schema migration"
            );
        }

        let mut outcomes = Vec::with_capacity(resolution.source_count());
        for topic in &resolution.topics {
            outcomes.extend(self.migrate_topic(topic));
        }

        let report = MigrationReport {
            started_at,
            finished_at: Utc::now(),
            strategy: self.settings.strategy,
            topics: resolution.topics.len(),
            outcomes,
            warnings: resolution.warnings,
        };

        tracing::info!(
            registered = report.count(RegistrationStatus::NewlyRegistered),
            existing = report.count(RegistrationStatus::AlreadyRegistered),
            failed = report.count(RegistrationStatus::Failed),
            skipped_topics = report.warnings.len(),
            "Schema migration finished"
        );
        report
    }

    /// Reconcile every schema file of one topic, in order
    pub fn migrate_topic(&self, topic: &ResolvedTopic) -> Vec<RegistrationOutcome> {
        topic
            .sources
            .iter()
            .map(|source| self.migrate_source(topic.name(), source))
            .collect()
    }

    /// Run one schema file to a terminal state
    pub fn migrate_source(&self, topic: &str, location: &SourceLocation) -> RegistrationOutcome {
        let identifier = location.identifier();

        let parsed = match location.read().and_then(|source| schema::load(&source)) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(topic, source = %identifier, "Failed to load schema: {}", e);
                return RegistrationOutcome::failed(topic, &identifier, None, &e);
            }
        };

        let subject = compute_subject(topic, &parsed, self.settings.strategy);

        match self.reconcile(&subject, &parsed) {
            Ok((status, id)) => {
                match status {
                    RegistrationStatus::AlreadyRegistered => tracing::info!(
                        topic, subject = %subject, id, source = %identifier,
                        "Schema already exists"
                    ),
                    _ => tracing::info!(
                        topic, subject = %subject, id, source = %identifier,
                        "Schema registered"
                    ),
                }
                RegistrationOutcome::done(topic, &identifier, subject, id, status)
            }
            Err(e) => {
                let error = MigrationError::from(e);
                tracing::error!(
                    topic, subject = %subject, source = %identifier,
                    "Failed to register schema: {}", error
                );
                RegistrationOutcome::failed(topic, &identifier, Some(subject), &error)
            }
        }
    }

    /// Lookup first; register only on an explicit `NotFound`.
    fn reconcile(
        &self,
        subject: &Subject,
        schema: &ParsedSchema,
    ) -> Result<(RegistrationStatus, SchemaId), RegistryError> {
        match self.client.lookup(subject, schema)? {
            Lookup::Found(id) => Ok((RegistrationStatus::AlreadyRegistered, id)),
            Lookup::NotFound => {
                tracing::debug!(subject = %subject, fingerprint = schema.fingerprint().short(), "Registering schema");
                let id = self.client.register(subject, schema)?;
                Ok((RegistrationStatus::NewlyRegistered, id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BearerSettings, RegistrySettings};
    use crate::registry::{InMemoryRegistry, RegistryCall};
    use crate::resolver::{ResolutionPolicy, TopicResolver};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn settings(root: &std::path::Path, strategy: SubjectNameStrategy) -> Settings {
        Settings {
            registry: RegistrySettings {
                url: "http://localhost:8081".to_string(),
                group: None,
                bearer: BearerSettings {
                    issuer_endpoint_url: "http://localhost:8080/token".to_string(),
                    client_id: "migrator".to_string(),
                    client_secret: "secret".to_string(),
                    scope: None,
                },
                timeout: Duration::from_secs(5),
                cache_capacity: 16,
            },
            strategy,
            resolver: TopicResolver::new(ResolutionPolicy::AutoDiscover {
                root: root.display().to_string(),
            }),
        }
    }

    fn record(namespace: &str, name: &str) -> String {
        format!(
            r#"{{"type":"record","name":"{}","namespace":"{}","fields":[{{"name":"id","type":"string"}}]}}"#,
            name, namespace
        )
    }

    #[test]
    fn test_outcomes_follow_resolution_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("payments")).unwrap();
        fs::create_dir_all(dir.path().join("orders")).unwrap();
        fs::write(dir.path().join("payments/Payment.avsc"), record("com.example", "Payment")).unwrap();
        fs::write(dir.path().join("orders/Order.avsc"), record("com.example", "Order")).unwrap();

        let settings = settings(dir.path(), SubjectNameStrategy::TopicRecordName);
        let registry = InMemoryRegistry::new();
        let report = MigrationOrchestrator::new(&settings, &registry).run();

        let subjects: Vec<&str> = report
            .outcomes
            .iter()
            .map(|o| o.subject.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(subjects, vec!["orders-com.example.Order", "payments-com.example.Payment"]);
        assert_eq!(report.count(RegistrationStatus::NewlyRegistered), 2);
        assert_eq!(report.topics, 2);
    }

    #[test]
    fn test_existing_schema_is_not_registered() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("orders")).unwrap();
        fs::write(dir.path().join("orders/Order.avsc"), record("com.example", "Order")).unwrap();

        let registry = InMemoryRegistry::new();
        let parsed = ParsedSchema::parse(&record("com.example", "Order")).unwrap();
        let id = registry.preload(&Subject::new("orders-value"), &parsed);

        let settings = settings(dir.path(), SubjectNameStrategy::TopicName);
        let report = MigrationOrchestrator::new(&settings, &registry).run();

        assert_eq!(report.outcomes[0].status, RegistrationStatus::AlreadyRegistered);
        assert_eq!(report.outcomes[0].schema_id, Some(id));
        assert_eq!(registry.calls(), vec![RegistryCall::Lookup(Subject::new("orders-value"))]);
    }

    #[test]
    fn test_unreadable_source_fails_without_subject() {
        let dir = tempdir().unwrap();
        let settings = settings(dir.path(), SubjectNameStrategy::TopicRecordName);
        let registry = InMemoryRegistry::new();
        let orchestrator = MigrationOrchestrator::new(&settings, &registry);

        let outcome =
            orchestrator.migrate_source("orders", &SourceLocation::File(dir.path().join("Missing.avsc")));

        assert!(outcome.is_failed());
        assert_eq!(outcome.subject, None);
        assert_eq!(outcome.error.unwrap().kind, ErrorKind::Io);
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn test_empty_resolution() {
        let dir = tempdir().unwrap();
        let settings = settings(&dir.path().join("absent"), SubjectNameStrategy::TopicRecordName);
        let registry = InMemoryRegistry::new();

        let report = MigrationOrchestrator::new(&settings, &registry).run();

        assert!(report.is_empty());
        assert!(report.outcomes.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(registry.calls().is_empty());
    }

    #[test]
    fn test_report_json() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("orders")).unwrap();
        fs::write(dir.path().join("orders/Bad.avsc"), "{ nope").unwrap();

        let settings = settings(dir.path(), SubjectNameStrategy::TopicRecordName);
        let report = MigrationOrchestrator::new(&settings, &InMemoryRegistry::new()).run();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["strategy"], "TopicRecordNameStrategy");
        assert_eq!(json["outcomes"][0]["status"], "failed");
        assert_eq!(json["outcomes"][0]["error"]["kind"], "parse");
        assert_eq!(json["outcomes"][0]["source"], "Bad.avsc");
    }
}
