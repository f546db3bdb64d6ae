//! Schema sources and parsing

use apache_avro::Schema as AvroSchema;

use crate::checksum::Checksum;
use crate::error::{MigrationError, Result};

/// Raw content of one schema file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    /// File name, used only for reporting
    pub identifier: String,
    /// Unparsed schema text
    pub raw_text: String,
}

impl SchemaSource {
    /// Create a new source
    pub fn new(identifier: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// A parsed Avro schema with its identity
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    schema: AvroSchema,
    full_name: String,
    schema_text: String,
    fingerprint: Checksum,
}

impl ParsedSchema {
    /// Parse Avro schema JSON
    pub fn parse(raw_text: &str) -> std::result::Result<Self, apache_avro::Error> {
        let schema = AvroSchema::parse_str(raw_text)?;
        let full_name = full_name_of(&schema);
        let fingerprint = Checksum::of_text(&schema.canonical_form());
        // Sent verbatim: the parsed form loses docs and custom attributes.
        let schema_text = raw_text.trim().to_string();

        Ok(Self {
            schema,
            full_name,
            schema_text,
            fingerprint,
        })
    }

    /// Namespace-qualified name, e.g. `com.example.Order`
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Source JSON sent to the registry, trimmed
    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    /// Fingerprint of the Parsing Canonical Form
    pub fn fingerprint(&self) -> &Checksum {
        &self.fingerprint
    }

    /// The underlying Avro schema
    pub fn avro(&self) -> &AvroSchema {
        &self.schema
    }
}

/// Parse a source, tagging failures with the source identifier
pub fn load(source: &SchemaSource) -> Result<ParsedSchema> {
    ParsedSchema::parse(&source.raw_text).map_err(|e| MigrationError::Parse {
        source_id: source.identifier.clone(),
        message: e.to_string(),
    })
}

/// Named types use `namespace.name`; anonymous types use their type name.
fn full_name_of(schema: &AvroSchema) -> String {
    if let Some(name) = schema.name() {
        return match name.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => format!("{}.{}", namespace, name.name),
            _ => name.name.clone(),
        };
    }

    match schema {
        AvroSchema::Array(_) => "array".to_string(),
        AvroSchema::Map(_) => "map".to_string(),
        AvroSchema::Union(_) => "union".to_string(),
        other => other.canonical_form().trim_matches('"').to_string(),
    }
}
