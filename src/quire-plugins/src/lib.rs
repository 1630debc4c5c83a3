//! Loader and router for Markdown command and agent plugins.
//!
//! A plugin is a directory of Markdown templates with frontmatter, plus an
//! optional manifest:
//!
//! ```text
//! dotnet-toolkit/
//! ├── .claude-plugin/plugin.json   # Manifest (or plugin.toml)
//! ├── commands/
//! │   └── api/api-new.md           # Slash command /api-new
//! ├── agents/
//! │   └── reviewer.md              # Agent "reviewer"
//! └── README.md                    # Documentation, ignored
//! ```
//!
//! # Template Format
//!
//! ```markdown
//! ---
//! description: Create a minimal API endpoint
//! model: claude-sonnet-4-5
//! ---
//!
//! Create an endpoint for: $ARGUMENTS
//! ```
//!
//! Agents additionally need a `name` field and may set `color`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quire_plugins::{LoaderConfig, PluginHost};
//!
//! let host = PluginHost::new(LoaderConfig::default())?;
//! host.load("plugins/dotnet-toolkit")?;
//!
//! let command = host.resolve_command("api-new", "POST /orders")?;
//! println!("{}", command.prompt);
//!
//! for agent in host.match_agent("design the orders table schema")? {
//!     println!("{} ({})", agent.identifier, agent.score);
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod host;
pub mod interpolate;
pub mod loader;
pub mod manifest;
pub mod ranking;
pub mod router;
pub mod source;
pub mod store;

pub use config::{LoaderConfig, RankerConfig};
pub use document::{TemplateDocument, TemplateKind, normalize_identifier};
pub use error::{FileFailure, LoadFailure, PluginError, Result, RouteError, TemplateError};
pub use frontmatter::{Frontmatter, Metadata};
pub use host::{HostState, PluginHost};
pub use interpolate::{DEFAULT_PLACEHOLDER, Interpolator, interpolate};
pub use loader::{LoadedPlugin, PluginLoader};
pub use manifest::{FailureReason, ManifestEntry, ManifestFailure, PluginManifest};
pub use ranking::{AgentCandidate, AgentRanker, KeywordRanker, RankedAgent};
pub use router::{AgentMatch, Invocation, ResolvedCommand, Routed, Router};
pub use source::{FsSource, MemorySource, SourceReader};
pub use store::{LoadReport, TemplateStore};
