//! Parsed command and agent templates.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::frontmatter::{self, Metadata};

/// Kind of template, decided by the directory a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// User-invoked template with an argument slot.
    Command,
    /// Context-triggered persona template.
    Agent,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Command, TemplateKind::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Command => "command",
            TemplateKind::Agent => "agent",
        }
    }

    /// Frontmatter keys every template of this kind must set.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::Command => &["description"],
            TemplateKind::Agent => &["description", "name"],
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "command" | "commands" => Ok(TemplateKind::Command),
            "agent" | "agents" => Ok(TemplateKind::Agent),
            _ => Err(format!("Invalid template kind: {}", s)),
        }
    }
}

/// Normalize a raw identifier: trimmed, ASCII-lowercased, leading `/` dropped.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().trim_start_matches('/').to_ascii_lowercase()
}

/// An immutable command or agent definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    kind: TemplateKind,
    identifier: String,
    metadata: Metadata,
    body: String,
    source_path: PathBuf,
}

impl TemplateDocument {
    /// Parse a template file.
    ///
    /// Commands are identified by their file stem, agents by their `name`
    /// field.
    pub fn parse(
        kind: TemplateKind,
        source_path: impl Into<PathBuf>,
        content: &str,
        delimiter: &str,
    ) -> Result<Self, TemplateError> {
        let source_path = source_path.into();
        let parsed = frontmatter::parse(content, delimiter)?;

        for field in kind.required_fields() {
            parsed.require(field)?;
        }

        let raw_identifier = match kind {
            TemplateKind::Command => file_stem(&source_path)?,
            TemplateKind::Agent => parsed.require("name")?,
        };

        let identifier = normalize_identifier(raw_identifier);
        if identifier.is_empty() {
            return Err(TemplateError::missing("name"));
        }

        Ok(Self {
            kind,
            identifier,
            metadata: parsed.metadata,
            body: parsed.body,
            source_path,
        })
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Plugin-relative path the document was read from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The activation or help text. Always non-empty.
    pub fn description(&self) -> &str {
        self.metadata.description().unwrap_or_default()
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.model()
    }

    /// Display color. Only agents carry one.
    pub fn color(&self) -> Option<&str> {
        match self.kind {
            TemplateKind::Agent => self.metadata.get_non_empty("color"),
            TemplateKind::Command => None,
        }
    }
}

fn file_stem(path: &Path) -> Result<&str, TemplateError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            TemplateError::UnreadableSource(format!("invalid file name: {}", path.display()))
        })
}
