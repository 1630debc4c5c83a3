//! Plugin host: owns the current plugin and swaps it on reload.
//!
//! The host starts [`HostState::Unloaded`]. The first successful load makes
//! it [`HostState::Ready`]; it never goes back. Reloads build a complete new
//! plugin before swapping it in, so a failed reload leaves the previous one
//! serving, and callers holding a [`Router`] keep the snapshot they started
//! with.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::document::TemplateKind;
use crate::error::RouteError;
use crate::loader::{LoadedPlugin, PluginLoader};
use crate::ranking::AgentRanker;
use crate::router::{AgentMatch, ResolvedCommand, Router};
use crate::source::SourceReader;
use crate::{PluginError, Result};

/// Lifecycle state of a [`PluginHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Unloaded,
    Ready,
}

/// The serving plugin and the directory it was loaded from, if any.
#[derive(Debug)]
struct Active {
    plugin: Arc<LoadedPlugin>,
    root: Option<PathBuf>,
}

/// Holds the active plugin and hands out routers over it.
pub struct PluginHost {
    loader: PluginLoader,
    ranker: Option<Arc<dyn AgentRanker>>,
    current: RwLock<Option<Active>>,
}

impl fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHost")
            .field("state", &self.state())
            .field("root", &self.root())
            .field("custom_ranker", &self.ranker.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::from_loader(PluginLoader::default())
    }
}

impl PluginHost {
    /// Create an unloaded host. Fails if `config` is invalid.
    pub fn new(config: LoaderConfig) -> Result<Self> {
        Ok(Self::from_loader(PluginLoader::new(config)?))
    }

    fn from_loader(loader: PluginLoader) -> Self {
        Self {
            loader,
            ranker: None,
            current: RwLock::new(None),
        }
    }

    /// Use `ranker` instead of the built-in keyword ranker.
    pub fn with_ranker(mut self, ranker: Arc<dyn AgentRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        self.loader.config()
    }

    pub fn state(&self) -> HostState {
        if self.current.read().is_some() {
            HostState::Ready
        } else {
            HostState::Unloaded
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HostState::Ready
    }

    /// Directory the current plugin was loaded from. `None` for plugins
    /// loaded from another source or installed directly.
    pub fn root(&self) -> Option<PathBuf> {
        self.current.read().as_ref().and_then(|active| active.root.clone())
    }

    /// Load the plugin at `root` and make it current.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<Arc<LoadedPlugin>> {
        let root = root.as_ref();
        let plugin = self.loader.load(root)?;
        Ok(self.swap(plugin, Some(root.to_path_buf())))
    }

    /// Load a plugin from any file source and make it current.
    pub fn load_from(&self, source: &dyn SourceReader) -> Result<Arc<LoadedPlugin>> {
        let plugin = self.loader.load_from(source)?;
        Ok(self.install(plugin))
    }

    /// Reload the current plugin from its directory.
    ///
    /// Fails when the current plugin did not come from [`load`](Self::load).
    /// On failure the current plugin stays in place.
    pub fn reload(&self) -> Result<Arc<LoadedPlugin>> {
        let Some(root) = self.root() else {
            return Err(PluginError::config(
                "nothing to reload: the current plugin was not loaded from a directory",
            ));
        };

        debug!("Reloading plugin from {:?}", root);
        match self.loader.load(&root) {
            Ok(plugin) => Ok(self.swap(plugin, Some(root))),
            Err(e) => {
                warn!("Reload of {:?} failed, keeping current plugin: {}", root, e);
                Err(e)
            }
        }
    }

    /// Make `plugin` current, replacing any previous one.
    pub fn install(&self, plugin: LoadedPlugin) -> Arc<LoadedPlugin> {
        self.swap(plugin, None)
    }

    /// Replace the plugin and its root under one lock.
    fn swap(&self, plugin: LoadedPlugin, root: Option<PathBuf>) -> Arc<LoadedPlugin> {
        let plugin = Arc::new(plugin);
        let previous = self.current.write().replace(Active {
            plugin: Arc::clone(&plugin),
            root,
        });

        info!(
            "Plugin {} ready: {} commands, {} agents{}",
            plugin.name().unwrap_or("<unnamed>"),
            plugin.store().count(TemplateKind::Command),
            plugin.store().count(TemplateKind::Agent),
            if previous.is_some() { " (replaced)" } else { "" }
        );
        plugin
    }

    /// The current plugin.
    pub fn snapshot(&self) -> std::result::Result<Arc<LoadedPlugin>, RouteError> {
        self.current
            .read()
            .as_ref()
            .map(|active| Arc::clone(&active.plugin))
            .ok_or(RouteError::NotReady)
    }

    /// A router over the current plugin.
    ///
    /// The router keeps its snapshot even if the host reloads afterwards.
    pub fn router(&self) -> std::result::Result<Router, RouteError> {
        let plugin = self.snapshot()?;
        let router = Router::from_config(Arc::clone(plugin.store()), self.config());
        Ok(match &self.ranker {
            Some(ranker) => router.with_ranker(Arc::clone(ranker)),
            None => router,
        })
    }

    pub fn resolve_command(
        &self,
        identifier: &str,
        arguments: &str,
    ) -> std::result::Result<ResolvedCommand, RouteError> {
        self.router()?.resolve_command(identifier, arguments)
    }

    pub fn match_agent(&self, context: &str) -> std::result::Result<Vec<AgentMatch>, RouteError> {
        self.router()?.match_agent(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::{AgentCandidate, RankedAgent};
    use crate::source::MemorySource;
    use crate::store::TemplateStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_unloaded_is_not_ready() {
        let host = PluginHost::default();
        assert_eq!(host.state(), HostState::Unloaded);
        assert_eq!(host.resolve_command("lint", "").unwrap_err(), RouteError::NotReady);
        assert_eq!(host.match_agent("anything").unwrap_err(), RouteError::NotReady);
        assert!(host.router().is_err());
        assert!(matches!(host.reload(), Err(PluginError::Config(_))));
    }

    #[test]
    fn test_install_makes_ready() {
        let host = PluginHost::default();
        let plugin = host.install(LoadedPlugin::from_store(TemplateStore::default()));
        assert_eq!(plugin.store().len(), 0);
        assert!(host.is_ready());
        assert_eq!(
            host.resolve_command("lint", "").unwrap_err(),
            RouteError::UnknownCommand("lint".to_string())
        );
    }

    #[test]
    fn test_load_from_memory() {
        let source = MemorySource::new()
            .with_file("commands/echo.md", "---\ndescription: Echo\n---\nEcho: $ARGUMENTS");
        let host = PluginHost::default();
        host.load_from(&source).unwrap();

        let resolved = host.resolve_command("echo", "hi").unwrap();
        assert_eq!(resolved.prompt, "Echo: hi");
    }

    #[test]
    fn test_reload_swaps_and_keeps_old_router() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "commands/greet.md", "---\ndescription: Greet\n---\nHello $ARGUMENTS");

        let host = PluginHost::default();
        host.load(temp.path()).unwrap();
        let old_router = host.router().unwrap();

        write(temp.path(), "commands/greet.md", "---\ndescription: Greet\n---\nHi $ARGUMENTS");
        host.reload().unwrap();

        assert_eq!(host.resolve_command("greet", "Ada").unwrap().prompt, "Hi Ada");
        assert_eq!(old_router.resolve_command("greet", "Ada").unwrap().prompt, "Hello Ada");
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "commands/greet.md", "---\ndescription: Greet\n---\nHello");

        let host = PluginHost::default();
        host.load(temp.path()).unwrap();

        write(temp.path(), "commands/broken.md", "---\ndescription: never closed\n");
        assert!(matches!(host.reload(), Err(PluginError::Load(_))));

        assert!(host.is_ready());
        assert_eq!(host.resolve_command("greet", "").unwrap().prompt, "Hello");
        assert!(host.resolve_command("broken", "").is_err());
    }

    #[test]
    fn test_load_from_clears_reload_root() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "commands/old.md", "---\ndescription: Old\n---\nold");

        let host = PluginHost::default();
        host.load(temp.path()).unwrap();
        assert_eq!(host.root(), Some(temp.path().to_path_buf()));

        let source = MemorySource::new()
            .with_file("commands/new.md", "---\ndescription: New\n---\nnew");
        host.load_from(&source).unwrap();
        assert_eq!(host.root(), None);

        assert!(matches!(host.reload(), Err(PluginError::Config(_))));
        assert_eq!(host.resolve_command("new", "").unwrap().prompt, "new");
        assert_eq!(
            host.resolve_command("old", "").unwrap_err(),
            RouteError::UnknownCommand("old".to_string())
        );
    }

    #[test]
    fn test_install_clears_reload_root() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "commands/old.md", "---\ndescription: Old\n---\nold");

        let host = PluginHost::default();
        host.load(temp.path()).unwrap();
        host.install(LoadedPlugin::from_store(TemplateStore::default()));

        assert_eq!(host.root(), None);
        assert!(matches!(host.reload(), Err(PluginError::Config(_))));
        assert!(host.resolve_command("old", "").is_err());
    }

    #[test]
    fn test_load_missing_directory() {
        let host = PluginHost::default();
        let err = host.load("/definitely/not/a/plugin").unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
        assert_eq!(host.state(), HostState::Unloaded);
    }

    #[test]
    fn test_custom_ranker() {
        let source = MemorySource::new()
            .with_file("agents/a.md", "---\nname: a\ndescription: First\n---\n")
            .with_file("agents/b.md", "---\nname: b\ndescription: Second\n---\n");
        let ranker = |_: &str, c: &[AgentCandidate<'_>]| -> anyhow::Result<Vec<RankedAgent>> {
            Ok(c.iter()
                .rev()
                .map(|c| RankedAgent::new(c.identifier, 1.0))
                .collect())
        };
        let host = PluginHost::default().with_ranker(Arc::new(ranker));
        host.load_from(&source).unwrap();

        let ids: Vec<String> = host
            .match_agent("whatever")
            .unwrap()
            .into_iter()
            .map(|m| m.identifier)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_host_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PluginHost>();
        assert_send_sync::<Router>();
        assert_send_sync::<TemplateStore>();

        let source = MemorySource::new()
            .with_file("commands/ping.md", "---\ndescription: Ping\n---\npong $ARGUMENTS");
        let host = Arc::new(PluginHost::default());
        host.load_from(&source).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let host = Arc::clone(&host);
                std::thread::spawn(move || {
                    host.resolve_command("ping", &i.to_string()).unwrap().prompt
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("pong {i}"));
        }
    }
}
