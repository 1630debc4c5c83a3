//! Plugin loading: manifest lookup, template discovery, store build and
//! manifest validation.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::document::TemplateKind;
use crate::manifest::{self, ManifestFailure, PluginManifest};
use crate::source::{FsSource, SourceReader};
use crate::store::{LoadReport, TemplateStore};
use crate::{PluginError, Result};

/// A fully loaded plugin.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    manifest: Option<PluginManifest>,
    manifest_path: Option<PathBuf>,
    store: Arc<TemplateStore>,
    report: LoadReport,
    validation: Vec<ManifestFailure>,
}

impl LoadedPlugin {
    /// Wrap a store built elsewhere. No manifest, nothing to validate.
    pub fn from_store(store: TemplateStore) -> Self {
        let report = LoadReport {
            loaded: store.len(),
            ..Default::default()
        };
        Self {
            manifest: None,
            manifest_path: None,
            store: Arc::new(store),
            report,
            validation: Vec::new(),
        }
    }

    /// Package name from the manifest, if there is one.
    pub fn name(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.package.name.as_str())
    }

    pub fn manifest(&self) -> Option<&PluginManifest> {
        self.manifest.as_ref()
    }

    /// Plugin-relative path the manifest was read from.
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Manifest failures tolerated by a lenient load.
    pub fn validation(&self) -> &[ManifestFailure] {
        &self.validation
    }

    pub fn is_valid(&self) -> bool {
        self.validation.is_empty()
    }
}

/// Loads plugins according to a [`LoaderConfig`].
#[derive(Debug, Clone, Default)]
pub struct PluginLoader {
    config: LoaderConfig,
}

impl PluginLoader {
    /// Create a loader, validating the configuration.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the plugin rooted at `root` on disk.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<LoadedPlugin> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PluginError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("plugin directory not found: {}", root.display()),
            )));
        }

        tracing::debug!("Loading plugin from {:?}", root);
        self.load_from(&FsSource::new(root))
    }

    /// Load a plugin from any file source.
    ///
    /// With a manifest that lists entries, exactly those files are loaded and
    /// every entry is validated. Without one, templates are discovered under
    /// the command and agent directories.
    pub fn load_from(&self, source: &dyn SourceReader) -> Result<LoadedPlugin> {
        let found = self.find_manifest(source)?;

        let paths = match &found {
            Some((_, manifest)) if manifest.has_entries() => manifest.paths(),
            _ => self.discover(source)?,
        };

        let (store, report) = TemplateStore::load(&paths, source, &self.config)?;

        let mut validation = Vec::new();
        if let Some((path, manifest)) = &found {
            if let Err(failures) = manifest::validate(&manifest.entries(), &store) {
                if self.config.strict_manifest {
                    return Err(PluginError::Validation(failures));
                }
                for failure in &failures {
                    tracing::warn!("Manifest {:?}: {}", path, failure);
                }
                validation = failures;
            }
        }

        let (manifest_path, manifest) = found.unzip();
        let name = manifest.as_ref().map_or("<unnamed>", |m| m.package.name.as_str());
        tracing::info!(
            "Loaded plugin {}: {} commands, {} agents, {} skipped",
            name,
            store.count(TemplateKind::Command),
            store.count(TemplateKind::Agent),
            report.skipped.len()
        );

        Ok(LoadedPlugin {
            manifest,
            manifest_path,
            store: Arc::new(store),
            report,
            validation,
        })
    }

    /// First manifest found among the configured locations.
    fn find_manifest(
        &self,
        source: &dyn SourceReader,
    ) -> Result<Option<(PathBuf, PluginManifest)>> {
        for path in &self.config.manifest_paths {
            let content = match source.read(path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let manifest = PluginManifest::parse(&content, path)?;
            tracing::debug!("Using manifest {:?} for plugin {}", path, manifest.package.name);
            return Ok(Some((path.clone(), manifest)));
        }
        Ok(None)
    }

    fn discover(&self, source: &dyn SourceReader) -> Result<Vec<PathBuf>> {
        let extension = &self.config.extension;
        let mut paths = source.discover(Path::new(&self.config.commands_dir), extension)?;
        paths.extend(source.discover(Path::new(&self.config.agents_dir), extension)?);
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FailureReason;
    use crate::source::MemorySource;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"{
  "name": "toolkit",
  "commands": [
    { "name": "lint", "path": "commands/lint.md" },
    "commands/missing.md"
  ],
  "agents": [{ "name": "dba", "path": "agents/dba.md" }]
}"#;

    fn source() -> MemorySource {
        MemorySource::new()
            .with_file(".claude-plugin/plugin.json", MANIFEST)
            .with_file("commands/lint.md", "---\ndescription: Lint\n---\nLint $ARGUMENTS")
            .with_file("agents/dba.md", "---\nname: dba\ndescription: Databases\n---\nDBA")
            .with_file("agents/extra.md", "---\nname: extra\ndescription: Not listed\n---\n")
    }

    #[test]
    fn test_strict_manifest_rejects_missing_entry() {
        let err = PluginLoader::default().load_from(&source()).unwrap_err();
        match err {
            PluginError::Validation(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].reason, FailureReason::NotFound);
                assert_eq!(failures[0].entry.path, PathBuf::from("commands/missing.md"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_lenient_manifest_keeps_failures() {
        let loader = PluginLoader::new(LoaderConfig::default().lenient()).unwrap();
        let plugin = loader.load_from(&source()).unwrap();

        assert_eq!(plugin.name(), Some("toolkit"));
        assert_eq!(plugin.manifest_path(), Some(Path::new(".claude-plugin/plugin.json")));
        assert_eq!(plugin.validation().len(), 1);
        assert!(!plugin.is_valid());
        assert_eq!(plugin.report().skipped.len(), 1);
        assert_eq!(plugin.store().len(), 2);
        assert!(!plugin.store().contains(TemplateKind::Agent, "extra"));
    }

    #[test]
    fn test_discovery_without_manifest() {
        let source = MemorySource::new()
            .with_file("commands/b.md", "---\ndescription: B\n---\n")
            .with_file("commands/a.md", "---\ndescription: A\n---\n")
            .with_file("agents/x.md", "---\nname: x\ndescription: X\n---\n")
            .with_file("README.md", "# docs");

        let plugin = PluginLoader::default().load_from(&source).unwrap();
        assert!(plugin.manifest().is_none());
        assert!(plugin.is_valid());

        let ids: Vec<&str> = plugin.store().iter().map(|d| d.identifier()).collect();
        assert_eq!(ids, vec!["a", "b", "x"]);
    }

    #[test]
    fn test_manifest_without_entries_discovers() {
        let source = MemorySource::new()
            .with_file("plugin.toml", "name = \"bare\"\nversion = \"0.1.0\"\n")
            .with_file("commands/a.md", "---\ndescription: A\n---\n");

        let plugin = PluginLoader::default().load_from(&source).unwrap();
        assert_eq!(plugin.name(), Some("bare"));
        assert_eq!(plugin.store().len(), 1);
    }

    #[test]
    fn test_invalid_manifest() {
        let source = MemorySource::new().with_file(".claude-plugin/plugin.json", "{ not json");
        let err = PluginLoader::default().load_from(&source).unwrap_err();
        assert!(matches!(err, PluginError::InvalidManifest { .. }));
    }

    #[test]
    fn test_template_errors_fail_load() {
        let source = MemorySource::new()
            .with_file("agents/nameless.md", "---\ndescription: No name\n---\n");
        let err = PluginLoader::default().load_from(&source).unwrap_err();
        match err {
            PluginError::Load(failure) => assert!(failure.mentions("agents/nameless.md")),
            other => panic!("expected load failure, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LoaderConfig {
            agents_dir: "commands".to_string(),
            ..Default::default()
        };
        assert!(matches!(PluginLoader::new(config), Err(PluginError::Config(_))));
    }

    #[test]
    fn test_from_store() {
        let plugin = LoadedPlugin::from_store(TemplateStore::default());
        assert_eq!(plugin.name(), None);
        assert_eq!(plugin.report().loaded, 0);
        assert!(plugin.is_valid());
    }
}
