//! Plugin manifest definitions and validation.
//!
//! The manifest (`.claude-plugin/plugin.json` or `plugin.toml`) names the
//! package and lists the commands and agents it ships. Entries are either a
//! bare path or a `{ name, path }` table:
//!
//! ```json
//! {
//!   "name": "dotnet-toolkit",
//!   "version": "1.2.0",
//!   "commands": [
//!     { "name": "api-new", "path": "commands/api/api-new.md" },
//!     "commands/misc/lint.md"
//!   ],
//!   "agents": [{ "name": "reviewer", "path": "agents/reviewer.md" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::{TemplateKind, normalize_identifier};
use crate::source::{SourceReader, normalize_relative};
use crate::store::TemplateStore;
use crate::{PluginError, Result};

/// Package metadata. Passed through, not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Any other top-level fields (`author`, `homepage`, `keywords`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An entry as written in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntrySpec {
    /// Bare path; the identifier comes from the template itself.
    Path(PathBuf),
    /// Explicit identifier and path.
    Named { name: String, path: PathBuf },
}

/// Plugin manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub commands: Vec<EntrySpec>,

    #[serde(default)]
    pub agents: Vec<EntrySpec>,

    #[serde(flatten)]
    pub package: PackageMetadata,
}

impl PluginManifest {
    /// Parse a JSON manifest.
    pub fn from_json(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| PluginError::invalid_manifest(path.as_ref(), e.to_string()))
    }

    /// Parse a TOML manifest.
    pub fn from_toml(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PluginError::invalid_manifest(path.as_ref(), e.to_string()))
    }

    /// Parse manifest text, choosing the format by the file extension.
    pub fn parse(content: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(content, path)?,
            Some("toml") => Self::from_toml(content, path)?,
            _ => {
                return Err(PluginError::invalid_manifest(
                    path,
                    "unsupported manifest format (expected .json or .toml)",
                ));
            }
        };

        if manifest.package.name.trim().is_empty() {
            return Err(PluginError::invalid_manifest(path, "name cannot be empty"));
        }

        Ok(manifest)
    }

    /// Read and parse a manifest from a file source.
    pub fn read(source: &dyn SourceReader, path: &Path) -> Result<Self> {
        let content = source.read(path)?;
        Self::parse(&content, path)
    }

    /// Whether the manifest lists any templates.
    pub fn has_entries(&self) -> bool {
        !self.commands.is_empty() || !self.agents.is_empty()
    }

    /// Declared entries, commands first, in manifest order.
    pub fn entries(&self) -> Vec<ManifestEntry> {
        let commands = self
            .commands
            .iter()
            .map(|spec| ManifestEntry::from_spec(TemplateKind::Command, spec));
        let agents = self
            .agents
            .iter()
            .map(|spec| ManifestEntry::from_spec(TemplateKind::Agent, spec));
        commands.chain(agents).collect()
    }

    /// Declared paths, in manifest order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries().into_iter().map(|e| e.path).collect()
    }
}

/// A declared `(kind, identifier, path)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: TemplateKind,
    /// Normalized identifier. `None` for bare-path agent entries, whose name
    /// is only known after parsing.
    pub identifier: Option<String>,
    /// Normalized plugin-relative path.
    pub path: PathBuf,
}

impl ManifestEntry {
    pub fn new(kind: TemplateKind, identifier: impl AsRef<str>, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            identifier: Some(normalize_identifier(identifier.as_ref())),
            path: normalize_entry_path(path.as_ref()),
        }
    }

    fn from_spec(kind: TemplateKind, spec: &EntrySpec) -> Self {
        match spec {
            EntrySpec::Named { name, path } => Self::new(kind, name, path),
            EntrySpec::Path(path) => {
                let path = normalize_entry_path(path);
                let identifier = match kind {
                    TemplateKind::Command => path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(normalize_identifier),
                    TemplateKind::Agent => None,
                };
                Self {
                    kind,
                    identifier,
                    path,
                }
            }
        }
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{} '{}' ({})", self.kind, id, self.path.display()),
            None => write!(f, "{} at {}", self.kind, self.path.display()),
        }
    }
}

fn normalize_entry_path(path: &Path) -> PathBuf {
    normalize_relative(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Why a manifest entry failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No loaded document matches the entry.
    NotFound,
    /// The document exists but was read from another file.
    PathMismatch { actual: PathBuf },
}

/// A manifest entry that does not match the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFailure {
    pub entry: ManifestEntry,
    pub reason: FailureReason,
}

impl fmt::Display for ManifestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::NotFound => write!(f, "{}: not found", self.entry),
            FailureReason::PathMismatch { actual } => write!(
                f,
                "{}: path mismatch, loaded from {}",
                self.entry,
                actual.display()
            ),
        }
    }
}

/// Check every entry against the store.
///
/// All failures are returned, in manifest order.
pub fn validate(
    entries: &[ManifestEntry],
    store: &TemplateStore,
) -> std::result::Result<(), Vec<ManifestFailure>> {
    let failures: Vec<ManifestFailure> = entries
        .iter()
        .filter_map(|entry| check_entry(entry, store).map(|reason| ManifestFailure {
            entry: entry.clone(),
            reason,
        }))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

fn check_entry(entry: &ManifestEntry, store: &TemplateStore) -> Option<FailureReason> {
    let document = match &entry.identifier {
        Some(identifier) => store.get(entry.kind, identifier).ok(),
        None => store.find_by_path(entry.kind, &entry.path),
    };

    match document {
        None => Some(FailureReason::NotFound),
        Some(doc) if doc.source_path() != entry.path => Some(FailureReason::PathMismatch {
            actual: doc.source_path().to_path_buf(),
        }),
        Some(_) => None,
    }
}
