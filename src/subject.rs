//! Subject naming
//!
//! Maps a topic and a parsed schema to the registry subject it is stored under.
//!
//! | Strategy          | Subject                     |
//! |-------------------|-----------------------------|
//! | `TopicName`       | `{topic}-value`             |
//! | `RecordName`      | `{full_name}`               |
//! | `TopicRecordName` | `{topic}-{full_name}`       |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::ParsedSchema;

const VALUE_SUFFIX: &str = "-value";

/// Registry subject key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subject naming strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SubjectNameStrategy {
    #[serde(rename = "TopicNameStrategy")]
    TopicName,
    #[serde(rename = "RecordNameStrategy")]
    RecordName,
    #[default]
    #[serde(rename = "TopicRecordNameStrategy")]
    TopicRecordName,
}

impl SubjectNameStrategy {
    /// Recognise a configured strategy name (case-sensitive)
    pub fn recognise(value: &str) -> Option<Self> {
        match value {
            "TopicName" | "TopicNameStrategy" => Some(Self::TopicName),
            "RecordName" | "RecordNameStrategy" => Some(Self::RecordName),
            "TopicRecordName" | "TopicRecordNameStrategy" => Some(Self::TopicRecordName),
            _ => None,
        }
    }

    /// Resolve a configured value, falling back to `TopicRecordName` for
    /// anything unrecognised.
    pub fn from_config(value: &str) -> Self {
        Self::recognise(value).unwrap_or_else(|| {
            tracing::warn!(
                strategy = value,
                "Unknown subject naming strategy, using TopicRecordNameStrategy"
            );
            Self::TopicRecordName
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicName => "TopicNameStrategy",
            Self::RecordName => "RecordNameStrategy",
            Self::TopicRecordName => "TopicRecordNameStrategy",
        }
    }

    /// Subject for a topic and a record's full name
    pub fn subject_for(&self, topic: &str, full_name: &str) -> Subject {
        match self {
            Self::TopicName => Subject(format!("{}{}", topic, VALUE_SUFFIX)),
            Self::RecordName => Subject(full_name.to_string()),
            Self::TopicRecordName => Subject(format!("{}-{}", topic, full_name)),
        }
    }
}

impl fmt::Display for SubjectNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the subject for a (topic, schema) pair
pub fn compute_subject(
    topic: &str,
    schema: &ParsedSchema,
    strategy: SubjectNameStrategy,
) -> Subject {
    strategy.subject_for(topic, schema.full_name())
}
