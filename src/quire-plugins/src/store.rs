//! Template store: every command and agent of a plugin, indexed by kind and
//! identifier.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::document::{TemplateDocument, TemplateKind, normalize_identifier};
use crate::error::{FileFailure, LoadFailure, TemplateError};
use crate::source::{SourceReader, normalize_relative};

/// What happened to the non-fatal inputs of a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of documents stored.
    pub loaded: usize,
    /// Files dropped because they could not be read.
    pub skipped: Vec<FileFailure>,
    /// Files outside the command and agent directories.
    pub documentation: Vec<PathBuf>,
}

/// Immutable collection of loaded templates.
///
/// Documents keep the order their paths were supplied in.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    documents: Vec<TemplateDocument>,
    index: HashMap<(TemplateKind, String), usize>,
}

impl TemplateStore {
    /// Load templates from `paths`.
    ///
    /// Each path is classified by its top-level directory, read and parsed.
    /// Parse errors and duplicate identifiers are collected and fail the load
    /// together. Unreadable files are skipped and listed in the report.
    pub fn load<I, P>(
        paths: I,
        source: &dyn SourceReader,
        config: &LoaderConfig,
    ) -> Result<(Self, LoadReport), LoadFailure>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut store = Self::default();
        let mut report = LoadReport::default();
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for path in paths {
            let path = path.as_ref();
            let relative = match normalize_relative(path) {
                Ok(relative) => relative,
                Err(e) => {
                    problems.push(FileFailure::new(path, e));
                    continue;
                }
            };

            if !seen.insert(relative.clone()) {
                debug!("Path {:?} supplied twice, loading it once", relative);
                continue;
            }

            let Some(kind) = classify(&relative, config) else {
                debug!("Skipping documentation file {:?}", relative);
                report.documentation.push(relative);
                continue;
            };

            let content = match source.read(&relative) {
                Ok(content) => content,
                Err(e) => {
                    problems.push(FileFailure::new(
                        relative,
                        TemplateError::UnreadableSource(e.to_string()),
                    ));
                    continue;
                }
            };

            let document =
                match TemplateDocument::parse(kind, relative.clone(), &content, &config.delimiter) {
                    Ok(document) => document,
                    Err(e) => {
                        problems.push(FileFailure::new(relative, e));
                        continue;
                    }
                };

            match store.insert(document) {
                Ok(()) => debug!("Loaded {} from {:?}", kind, relative),
                Err(e) => problems.push(FileFailure::new(relative, e)),
            }
        }

        if problems.iter().any(|p| !p.error.is_skippable()) {
            return Err(LoadFailure { failures: problems });
        }

        for problem in &problems {
            warn!("Skipping template {}", problem);
        }

        report.loaded = store.len();
        report.skipped = problems;
        Ok((store, report))
    }

    /// Build a store from already parsed documents.
    pub fn from_documents(
        documents: impl IntoIterator<Item = TemplateDocument>,
    ) -> Result<Self, LoadFailure> {
        let mut store = Self::default();
        let mut failures = Vec::new();

        for document in documents {
            let path = document.source_path().to_path_buf();
            if let Err(e) = store.insert(document) {
                failures.push(FileFailure::new(path, e));
            }
        }

        if failures.is_empty() {
            Ok(store)
        } else {
            Err(LoadFailure { failures })
        }
    }

    fn insert(&mut self, document: TemplateDocument) -> Result<(), TemplateError> {
        let key = (document.kind(), document.identifier().to_string());
        if let Some(&existing) = self.index.get(&key) {
            return Err(TemplateError::DuplicateIdentifier {
                kind: key.0,
                identifier: key.1,
                first: self.documents[existing].source_path().to_path_buf(),
            });
        }

        self.index.insert(key, self.documents.len());
        self.documents.push(document);
        Ok(())
    }

    /// Get a document by kind and identifier.
    pub fn get(
        &self,
        kind: TemplateKind,
        identifier: &str,
    ) -> Result<&TemplateDocument, TemplateError> {
        let key = (kind, normalize_identifier(identifier));
        match self.index.get(&key) {
            Some(&i) => Ok(&self.documents[i]),
            None => Err(TemplateError::NotFound {
                kind,
                identifier: key.1,
            }),
        }
    }

    /// Whether a document with this kind and identifier exists.
    pub fn contains(&self, kind: TemplateKind, identifier: &str) -> bool {
        self.index.contains_key(&(kind, normalize_identifier(identifier)))
    }

    /// Find the document of `kind` read from `path`.
    pub fn find_by_path(&self, kind: TemplateKind, path: &Path) -> Option<&TemplateDocument> {
        self.documents
            .iter()
            .find(|d| d.kind() == kind && d.source_path() == path)
    }

    /// All documents of `kind`, in insertion order.
    ///
    /// The iterator is lazy and can be cloned or requested again to restart.
    pub fn list(&self, kind: TemplateKind) -> impl Iterator<Item = &TemplateDocument> + Clone {
        self.documents.iter().filter(move |d| d.kind() == kind)
    }

    pub fn commands(&self) -> impl Iterator<Item = &TemplateDocument> + Clone {
        self.list(TemplateKind::Command)
    }

    pub fn agents(&self) -> impl Iterator<Item = &TemplateDocument> + Clone {
        self.list(TemplateKind::Agent)
    }

    /// Source paths of every document, in insertion order.
    pub fn source_paths(&self) -> impl Iterator<Item = &Path> + Clone {
        self.documents.iter().map(TemplateDocument::source_path)
    }

    /// Every document, in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TemplateDocument> {
        self.documents.iter()
    }

    /// Number of documents of `kind`.
    pub fn count(&self, kind: TemplateKind) -> usize {
        self.list(kind).count()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<'a> IntoIterator for &'a TemplateStore {
    type Item = &'a TemplateDocument;
    type IntoIter = std::slice::Iter<'a, TemplateDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

/// Classify a plugin-relative path by its first component.
///
/// Returns `None` for files outside the command and agent directories and
/// for files without the template extension.
pub fn classify(path: &Path, config: &LoaderConfig) -> Option<TemplateKind> {
    if !path.extension().is_some_and(|ext| ext == config.extension.as_str()) {
        return None;
    }

    let first = path.components().next()?.as_os_str().to_str()?;
    if first == config.commands_dir {
        Some(TemplateKind::Command)
    } else if first == config.agents_dir {
        Some(TemplateKind::Agent)
    } else {
        None
    }
}
