//! Error types for plugin loading and routing.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::document::TemplateKind;
use crate::manifest::ManifestFailure;

/// Errors tied to a single template file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Opening delimiter without a matching close, or an unparseable block.
    #[error("Malformed frontmatter: {0}")]
    MalformedFrontmatter(String),

    /// A required frontmatter key is absent or blank.
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Two documents of the same kind produced the same identifier.
    #[error("Duplicate {kind} identifier '{identifier}' (already defined by {})", .first.display())]
    DuplicateIdentifier {
        kind: TemplateKind,
        identifier: String,
        first: PathBuf,
    },

    /// The file source could not supply the file.
    #[error("Unreadable source: {0}")]
    UnreadableSource(String),

    /// No document with this identifier exists.
    #[error("{kind} not found: {identifier}")]
    NotFound {
        kind: TemplateKind,
        identifier: String,
    },
}

impl TemplateError {
    /// Create a malformed frontmatter error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrontmatter(message.into())
    }

    /// Create a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField(field.into())
    }

    /// Whether this failure only drops its own file instead of failing a load.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::UnreadableSource(_))
    }
}

/// A [`TemplateError`] paired with the file that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Plugin-relative path of the file.
    pub path: PathBuf,
    /// What went wrong.
    pub error: TemplateError,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, error: TemplateError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Every per-file failure of a store load, in the order paths were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub failures: Vec<FileFailure>,
}

impl LoadFailure {
    /// Whether any failure refers to `path`.
    pub fn mentions(&self, path: impl AsRef<std::path::Path>) -> bool {
        let path = path.as_ref();
        self.failures.iter().any(|f| f.path == path)
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} template(s) failed to load", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LoadFailure {}

/// Errors returned to a single caller at invocation time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// No command with this identifier is loaded.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// No plugin has been loaded yet.
    #[error("Plugin host is not ready: no plugin has been loaded")]
    NotReady,

    /// The injected agent ranker failed.
    #[error("Agent ranking failed: {0}")]
    Ranker(String),
}

/// Top-level plugin errors.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The manifest could not be parsed.
    #[error("Invalid manifest {}: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    /// One or more templates failed to load.
    #[error(transparent)]
    Load(#[from] LoadFailure),

    /// Manifest entries do not match the loaded templates.
    #[error("Manifest validation failed with {} error(s){}", .0.len(), render_failures(.0))]
    Validation(Vec<ManifestFailure>),

    /// Invalid loader configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    /// Create an invalid manifest error.
    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

fn render_failures(failures: &[ManifestFailure]) -> String {
    failures.iter().map(|f| format!("\n  - {f}")).collect()
}

impl From<toml::de::Error> for PluginError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::UnknownCommand("deploy".to_string());
        assert_eq!(err.to_string(), "Unknown command: deploy");

        let err = TemplateError::NotFound {
            kind: TemplateKind::Agent,
            identifier: "reviewer".to_string(),
        };
        assert_eq!(err.to_string(), "agent not found: reviewer");
    }

    #[test]
    fn test_duplicate_names_first_path() {
        let err = TemplateError::DuplicateIdentifier {
            kind: TemplateKind::Command,
            identifier: "lint".to_string(),
            first: PathBuf::from("commands/a/lint.md"),
        };
        let msg = err.to_string();
        assert!(msg.contains("lint"));
        assert!(msg.contains("commands/a/lint.md"));
    }

    #[test]
    fn test_load_failure_lists_every_file() {
        let failure = LoadFailure {
            failures: vec![
                FileFailure::new("agents/a.md", TemplateError::missing("name")),
                FileFailure::new("commands/b.md", TemplateError::malformed("no closing")),
            ],
        };
        let msg = failure.to_string();
        assert!(msg.starts_with("2 template(s) failed to load"));
        assert!(msg.contains("agents/a.md: Missing required field: name"));
        assert!(msg.contains("commands/b.md"));
        assert!(failure.mentions("agents/a.md"));
        assert!(!failure.mentions("agents/c.md"));
    }

    #[test]
    fn test_only_unreadable_is_skippable() {
        assert!(TemplateError::UnreadableSource("gone".into()).is_skippable());
        assert!(!TemplateError::missing("description").is_skippable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PluginError = io_err.into();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
