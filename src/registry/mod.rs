//! Schema Registry Gateway
//!
//! The calling contract the migrator relies on: `lookup` answers with a tagged
//! [`Lookup`] so that "not registered" is never confused with a transport
//! failure, and `register` is only called after a `NotFound` lookup.

mod auth;
mod cache;
mod http;
mod memory;

#[cfg(test)]
mod testing;

use thiserror::Error;

use crate::schema::ParsedSchema;
use crate::subject::Subject;

pub use auth::BearerTokenProvider;
pub use cache::CachedRegistryClient;
pub use http::HttpRegistryClient;
pub use memory::{InMemoryRegistry, RegistryCall};

/// Numeric schema id assigned by the registry
pub type SchemaId = u32;

/// Answer to a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The schema is registered under the subject
    Found(SchemaId),
    /// The subject or the schema under it is absent
    NotFound,
}

/// Registry failures other than "not found"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Registry returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Token request to {endpoint} failed: {message}")]
    Token { endpoint: String, message: String },

    #[error("Unexpected registry response: {0}")]
    Decode(String),

    #[error("Invalid registry URL '{0}'")]
    InvalidUrl(String),
}

/// Remote schema registry capability
pub trait RegistryClient: Send + Sync {
    /// Find the id of `schema` under `subject`
    fn lookup(&self, subject: &Subject, schema: &ParsedSchema) -> Result<Lookup, RegistryError>;

    /// Register `schema` under `subject`, returning its id
    fn register(&self, subject: &Subject, schema: &ParsedSchema) -> Result<SchemaId, RegistryError>;
}

impl<T: RegistryClient + ?Sized> RegistryClient for Box<T> {
    fn lookup(&self, subject: &Subject, schema: &ParsedSchema) -> Result<Lookup, RegistryError> {
        (**self).lookup(subject, schema)
    }

    fn register(&self, subject: &Subject, schema: &ParsedSchema) -> Result<SchemaId, RegistryError> {
        (**self).register(subject, schema)
    }
}
