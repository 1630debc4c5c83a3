//! File sources that supply template text to the loader.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::TemplateError;

/// Supplies raw file text for plugin-relative paths.
///
/// All reads happen during load; nothing reads after a store is built.
pub trait SourceReader: Send + Sync {
    /// Read a file relative to the plugin root.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// List files with `extension` below `dir`, as sorted plugin-relative paths.
    ///
    /// A missing directory yields an empty list.
    ///
    /// Entries that cannot be read are skipped, not reported as errors.
    fn discover(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;
}

/// Normalize a plugin-relative path.
///
/// `.` components are dropped. Absolute paths and `..` are rejected so a
/// plugin cannot reach outside its root.
pub fn normalize_relative(path: &Path) -> Result<PathBuf, TemplateError> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TemplateError::UnreadableSource(format!(
                    "path escapes the plugin root: {}",
                    path.display()
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(TemplateError::UnreadableSource("empty path".to_string()));
    }

    Ok(normalized)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

/// Reads templates from a plugin directory on disk.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let relative = normalize_relative(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        Ok(self.root.join(relative))
    }
}

impl SourceReader for FsSource {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path)?)
    }

    fn discover(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let base = self.resolve(dir)?;
        if !base.is_dir() {
            debug!("Template directory {:?} does not exist, skipping", base);
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&base).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", base, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                found.push(relative.to_path_buf());
            }
        }

        Ok(found)
    }
}

/// In-memory file source, keyed by plugin-relative path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        let key = normalize_relative(&path).unwrap_or(path);
        self.files.insert(key, content.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceReader for MemorySource {
    fn read(&self, path: &Path) -> io::Result<String> {
        let key = normalize_relative(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        self.files.get(&key).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }

    fn discover(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let dir = normalize_relative(dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        Ok(self
            .files
            .keys()
            .filter(|path| path.starts_with(&dir) && has_extension(path, extension))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize_relative(Path::new("./commands/./lint.md")).unwrap(),
            PathBuf::from("commands/lint.md")
        );
        assert!(normalize_relative(Path::new("../secrets.md")).is_err());
        assert!(normalize_relative(Path::new("commands/../../x.md")).is_err());
        assert!(normalize_relative(Path::new("/etc/passwd")).is_err());
        assert!(normalize_relative(Path::new(".")).is_err());
    }

    #[test]
    fn test_fs_source_read_and_discover() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("commands/api")).unwrap();
        std::fs::write(temp.path().join("commands/lint.md"), "lint").unwrap();
        std::fs::write(temp.path().join("commands/api/api-new.md"), "api").unwrap();
        std::fs::write(temp.path().join("commands/notes.txt"), "ignored").unwrap();

        let source = FsSource::new(temp.path());
        assert_eq!(source.read(Path::new("commands/lint.md")).unwrap(), "lint");
        assert!(source.read(Path::new("../outside.md")).is_err());

        let found = source.discover(Path::new("commands"), "md").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("commands/api/api-new.md"),
                PathBuf::from("commands/lint.md"),
            ]
        );

        assert!(source.discover(Path::new("agents"), "md").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_broken_entries() {
        let temp = TempDir::new().unwrap();
        let commands = temp.path().join("commands");
        std::fs::create_dir_all(&commands).unwrap();
        std::fs::write(commands.join("a.md"), "a").unwrap();
        std::os::unix::fs::symlink("missing-target.md", commands.join("dangling.md")).unwrap();
        std::os::unix::fs::symlink(&commands, commands.join("loop")).unwrap();

        let source = FsSource::new(temp.path());
        let found = source.discover(Path::new("commands"), "md").unwrap();
        assert_eq!(found, vec![PathBuf::from("commands/a.md")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_file_links() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("commands")).unwrap();
        std::fs::write(temp.path().join("shared.md"), "shared").unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("shared.md"),
            temp.path().join("commands/linked.md"),
        )
        .unwrap();

        let source = FsSource::new(temp.path());
        let found = source.discover(Path::new("commands"), "md").unwrap();
        assert_eq!(found, vec![PathBuf::from("commands/linked.md")]);
        assert_eq!(source.read(&found[0]).unwrap(), "shared");
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new()
            .with_file("./agents/b.md", "b")
            .with_file("agents/a.md", "a")
            .with_file("commands/c.md", "c");

        assert_eq!(source.len(), 3);
        assert_eq!(source.read(Path::new("agents/b.md")).unwrap(), "b");
        let err = source.read(Path::new("agents/missing.md")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let found = source.discover(Path::new("agents"), "md").unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("agents/a.md"), PathBuf::from("agents/b.md")]
        );
    }
}
