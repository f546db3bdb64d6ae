//! Topic Resolution
//!
//! Decides which topics a run processes and which schema files belong to each.
//! Locations are either filesystem directories or paths inside the schema
//! bundle compiled into the binary (`embedded:<dir>`).
//!
//! ```text
//! schemas/
//! ├── orders/
//! │   ├── Order.avsc
//! │   └── OrderCancelled.avsc
//! └── payments/
//!     └── Payment.avsc
//! ```

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{MigrationError, Result};
use crate::schema::SchemaSource;

/// Prefix selecting the embedded schema bundle
pub const EMBEDDED_PREFIX: &str = "embedded:";

/// Accepted alias for [`EMBEDDED_PREFIX`]
pub const CLASSPATH_PREFIX: &str = "classpath:";

/// Default schema file extension
pub const DEFAULT_EXTENSION: &str = "avsc";

static EMBEDDED_SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// A topic and the location of its schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMapping {
    pub name: String,
    #[serde(alias = "directory")]
    pub location: String,
}

impl TopicMapping {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Where a single schema file lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Embedded(PathBuf),
}

impl SourceLocation {
    /// File name used in reports
    pub fn identifier(&self) -> String {
        let path = match self {
            SourceLocation::File(path) | SourceLocation::Embedded(path) => path,
        };
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Read the file's content
    pub fn read(&self) -> Result<SchemaSource> {
        let identifier = self.identifier();
        let raw_text = match self {
            SourceLocation::File(path) => {
                fs::read_to_string(path).map_err(|e| MigrationError::ReadSource {
                    source_id: identifier.clone(),
                    message: e.to_string(),
                })?
            }
            SourceLocation::Embedded(path) => EMBEDDED_SCHEMAS
                .get_file(path)
                .and_then(|file| file.contents_utf8())
                .map(str::to_string)
                .ok_or_else(|| MigrationError::ReadSource {
                    source_id: identifier.clone(),
                    message: "missing from embedded bundle or not UTF-8".to_string(),
                })?,
        };
        Ok(SchemaSource::new(identifier, raw_text))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File(path) => write!(f, "{}", path.display()),
            SourceLocation::Embedded(path) => write!(f, "{}{}", EMBEDDED_PREFIX, path.display()),
        }
    }
}

/// A topic with at least one schema file
#[derive(Debug, Clone)]
pub struct ResolvedTopic {
    pub mapping: TopicMapping,
    pub sources: Vec<SourceLocation>,
}

impl ResolvedTopic {
    pub fn name(&self) -> &str {
        &self.mapping.name
    }
}

/// A topic skipped during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryWarning {
    pub topic: Option<String>,
    pub location: String,
    pub reason: String,
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.topic {
            Some(topic) => write!(f, "[{}] {} ({})", topic, self.reason, self.location),
            None => write!(f, "{} ({})", self.reason, self.location),
        }
    }
}

/// Output of [`TopicResolver::resolve`]
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Topics sorted by name
    pub topics: Vec<ResolvedTopic>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.topics.iter().map(|t| t.sources.len()).sum()
    }

    fn warn(&mut self, topic: Option<&str>, location: impl Into<String>, reason: impl Into<String>) {
        let warning = DiscoveryWarning {
            topic: topic.map(str::to_string),
            location: location.into(),
            reason: reason.into(),
        };
        tracing::warn!("{}. Skipping.", warning);
        self.warnings.push(warning);
    }
}

/// How topics are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Each mapping names a topic and the directory holding its schemas
    ExplicitMapping(Vec<TopicMapping>),
    /// Topics are listed; each reads `root/<topic>/`
    ExplicitListWithRoot { root: String, topics: Vec<String> },
    /// Every subdirectory of `root` holding a schema file is a topic
    AutoDiscover { root: String },
}

impl ResolutionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionPolicy::ExplicitMapping(_) => "explicit-mapping",
            ResolutionPolicy::ExplicitListWithRoot { .. } => "explicit-list",
            ResolutionPolicy::AutoDiscover { .. } => "auto-discover",
        }
    }
}

/// Resolves topics and their schema files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicResolver {
    policy: ResolutionPolicy,
    extension: String,
}

impl TopicResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Change the schema file extension (with or without leading dot)
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        self.extension = extension.as_ref().trim_start_matches('.').to_string();
        self
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolve topics in name order, with files in file-name order
    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();

        let mut candidates = match &self.policy {
            ResolutionPolicy::ExplicitMapping(mappings) => {
                let mut valid = Vec::with_capacity(mappings.len());
                for mapping in mappings {
                    let name = mapping.name.trim();
                    let location = mapping.location.trim();
                    if name.is_empty() || location.is_empty() {
                        resolution.warn(
                            Some(name).filter(|n| !n.is_empty()),
                            location,
                            "Invalid topic mapping entry",
                        );
                        continue;
                    }
                    valid.push(TopicMapping::new(name, location));
                }
                valid
            }
            ResolutionPolicy::ExplicitListWithRoot { root, topics } => {
                let root = Location::parse(root);
                topics
                    .iter()
                    .map(|topic| topic.trim())
                    .filter(|topic| !topic.is_empty())
                    .map(|topic| TopicMapping::new(topic, root.join(topic).to_string()))
                    .collect()
            }
            ResolutionPolicy::AutoDiscover { root } => {
                let root = Location::parse(root);
                match root.subdirectories() {
                    Ok((names, broken)) => {
                        for error in broken {
                            let location = error
                                .path()
                                .map(|p| p.display().to_string())
                                .unwrap_or_else(|| root.to_string());
                            let topic = error
                                .path()
                                .and_then(Path::file_name)
                                .map(|name| name.to_string_lossy().into_owned());
                            resolution.warn(topic.as_deref(), location, error.to_string());
                        }
                        names
                            .into_iter()
                            .map(|name| {
                                let location = root.join(&name).to_string();
                                TopicMapping::new(name, location)
                            })
                            .collect()
                    }
                    Err(reason) => {
                        resolution.warn(None, root.to_string(), reason);
                        Vec::new()
                    }
                }
            }
        };

        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        let discovering = matches!(self.policy, ResolutionPolicy::AutoDiscover { .. });

        for mapping in candidates {
            let location = Location::parse(&mapping.location);
            match location.schema_files(&self.extension) {
                Ok(sources) if sources.is_empty() => {
                    if discovering {
                        tracing::debug!(
                            directory = %location,
                            "Directory has no schema files, not a topic"
                        );
                    } else {
                        resolution.warn(
                            Some(mapping.name.as_str()),
                            location.to_string(),
                            format!("No .{} files found", self.extension),
                        );
                    }
                }
                Ok(sources) => {
                    tracing::debug!(topic = %mapping.name, sources = sources.len(), "Resolved topic");
                    resolution.topics.push(ResolvedTopic { mapping, sources });
                }
                Err(reason) => resolution.warn(Some(mapping.name.as_str()), location.to_string(), reason),
            }
        }

        resolution
    }
}

/// A parsed location string
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Directory(PathBuf),
    Embedded(PathBuf),
}

impl Location {
    fn parse(location: &str) -> Self {
        let embedded = location
            .strip_prefix(EMBEDDED_PREFIX)
            .or_else(|| location.strip_prefix(CLASSPATH_PREFIX));
        match embedded {
            Some(rest) => Location::Embedded(PathBuf::from(rest.trim_matches('/'))),
            None => Location::Directory(PathBuf::from(location)),
        }
    }

    fn join(&self, name: &str) -> Self {
        match self {
            Location::Directory(path) => Location::Directory(path.join(name)),
            Location::Embedded(path) => Location::Embedded(path.join(name)),
        }
    }

    /// Names of immediate, non-hidden subdirectories, sorted, plus the
    /// entries that could not be inspected
    fn subdirectories(&self) -> std::result::Result<(Vec<String>, Vec<walkdir::Error>), String> {
        let mut broken = Vec::new();
        let mut names: Vec<String> = match self {
            Location::Directory(path) => {
                ensure_directory(path)?;
                let mut names = Vec::new();
                for entry in WalkDir::new(path).min_depth(1).max_depth(1).follow_links(true) {
                    match entry {
                        Ok(entry) if entry.file_type().is_dir() => {
                            names.push(entry.file_name().to_string_lossy().into_owned());
                        }
                        Ok(_) => {}
                        Err(e) => broken.push(e),
                    }
                }
                names
            }
            Location::Embedded(path) => embedded_dir(path)
                .ok_or_else(|| "Not found in embedded schema bundle".to_string())?
                .dirs()
                .filter_map(|dir| dir.path().file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        };
        names.retain(|name| !name.starts_with('.'));
        names.sort();
        Ok((names, broken))
    }

    /// Schema files directly under this location, sorted by file name
    fn schema_files(&self, extension: &str) -> std::result::Result<Vec<SourceLocation>, String> {
        let mut files: Vec<SourceLocation> = match self {
            Location::Directory(path) => {
                ensure_directory(path)?;
                let mut files = Vec::new();
                for entry in WalkDir::new(path).min_depth(1).max_depth(1).follow_links(true) {
                    match entry {
                        Ok(entry) => {
                            if entry.file_type().is_file() && has_extension(entry.path(), extension) {
                                files.push(SourceLocation::File(entry.into_path()));
                            }
                        }
                        // Kept as a source so the read fails for this file alone
                        Err(e) => match e.path() {
                            Some(broken) if has_extension(broken, extension) => {
                                files.push(SourceLocation::File(broken.to_path_buf()));
                            }
                            _ => tracing::debug!(directory = %path.display(), "Skipping entry: {}", e),
                        },
                    }
                }
                files
            }
            Location::Embedded(path) => embedded_dir(path)
                .ok_or_else(|| "Not found in embedded schema bundle".to_string())?
                .files()
                .filter(|file| has_extension(file.path(), extension))
                .map(|file| SourceLocation::Embedded(file.path().to_path_buf()))
                .collect(),
        };
        files.sort_by_key(|source| source.identifier());
        Ok(files)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Directory(path) => write!(f, "{}", path.display()),
            Location::Embedded(path) => write!(f, "{}{}", EMBEDDED_PREFIX, path.display()),
        }
    }
}

fn ensure_directory(path: &Path) -> std::result::Result<(), String> {
    if !path.exists() {
        return Err("Directory not found".to_string());
    }
    if !path.is_dir() {
        return Err("Not a directory".to_string());
    }
    Ok(())
}

fn embedded_dir(path: &Path) -> Option<&'static Dir<'static>> {
    if path.as_os_str().is_empty() {
        Some(&EMBEDDED_SCHEMAS)
    } else {
        EMBEDDED_SCHEMAS.get_dir(path)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().map(|ext| ext == extension).unwrap_or(false)
}
