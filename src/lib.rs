//! Avro Schema Migrator
//!
//! Makes a Confluent-compatible schema registry hold every locally stored Avro
//! schema, once, under a deterministic subject name.
//!
//! ## Features
//!
//! - **Topic Resolution**: explicit mappings, a topic list under a root
//!   directory, or auto-discovery of topic-named subdirectories
//! - **Subject Naming**: TopicName, RecordName and TopicRecordName strategies
//! - **Check Before Register**: a schema is registered only after the registry
//!   reports it absent; transport failures are never mistaken for absence
//! - **Failure Isolation**: a broken schema or missing topic is reported and
//!   the run carries on
//!
//! ## Flow
//!
//! ```text
//! TopicResolver ──> schema::load ──> compute_subject ──> RegistryClient
//!        └──────────── MigrationOrchestrator ──> MigrationReport
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod migration;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod subject;

pub use checksum::Checksum;
pub use config::{MigratorConfig, Settings};
pub use error::{ErrorKind, MigrationError, Result};
pub use migration::{MigrationOrchestrator, MigrationReport, RegistrationOutcome, RegistrationStatus};
pub use registry::{
    CachedRegistryClient, HttpRegistryClient, InMemoryRegistry, Lookup, RegistryClient, RegistryError,
    SchemaId,
};
pub use resolver::{DiscoveryWarning, ResolutionPolicy, TopicMapping, TopicResolver};
pub use schema::{ParsedSchema, SchemaSource};
pub use subject::{compute_subject, Subject, SubjectNameStrategy};
