//! Invocation routing.
//!
//! Commands are resolved by identifier and their body interpolated with the
//! caller's arguments. Agents are matched against free text through an
//! [`AgentRanker`].

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::document::{TemplateDocument, TemplateKind, normalize_identifier};
use crate::error::RouteError;
use crate::frontmatter::Metadata;
use crate::interpolate::Interpolator;
use crate::ranking::{AgentCandidate, AgentRanker, KeywordRanker};
use crate::store::TemplateStore;

/// A request to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Explicit slash command.
    Command { identifier: String, arguments: String },
    /// Free text to match against agents.
    Agent { context: String },
}

impl Invocation {
    pub fn command(identifier: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::Command {
            identifier: identifier.into(),
            arguments: arguments.into(),
        }
    }

    pub fn agent(context: impl Into<String>) -> Self {
        Self::Agent {
            context: context.into(),
        }
    }

    /// Interpret raw user input. `/name args` is a command; anything else is
    /// agent context.
    pub fn from_input(input: &str) -> Self {
        match Router::parse_invocation(input) {
            Some((identifier, arguments)) => Self::command(identifier, arguments),
            None => Self::agent(input.trim()),
        }
    }
}

/// A command ready to send: its body with arguments substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub identifier: String,
    pub prompt: String,
    pub metadata: Metadata,
    pub source_path: PathBuf,
}

impl ResolvedCommand {
    pub fn model(&self) -> Option<&str> {
        self.metadata.model()
    }
}

/// An agent judged relevant to a context.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMatch {
    pub identifier: String,
    pub description: String,
    pub score: f64,
    pub metadata: Metadata,
    pub body: String,
}

impl AgentMatch {
    fn new(document: &TemplateDocument, score: f64) -> Self {
        Self {
            identifier: document.identifier().to_string(),
            description: document.description().to_string(),
            score,
            metadata: document.metadata().clone(),
            body: document.body().to_string(),
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.metadata.model()
    }
}

/// Result of routing an [`Invocation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Command(ResolvedCommand),
    Agents(Vec<AgentMatch>),
}

/// Routes invocations against a loaded store.
///
/// Cloning is cheap; the store and ranker are shared.
#[derive(Clone)]
pub struct Router {
    store: Arc<TemplateStore>,
    interpolator: Interpolator,
    ranker: Arc<dyn AgentRanker>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("commands", &self.store.count(TemplateKind::Command))
            .field("agents", &self.store.count(TemplateKind::Agent))
            .field("placeholder", &self.interpolator.token())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Create a router with the default placeholder and keyword ranker.
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self {
            store,
            interpolator: Interpolator::default(),
            ranker: Arc::new(KeywordRanker::default()),
        }
    }

    /// Create a router using the placeholder and ranker settings of `config`.
    pub fn from_config(store: Arc<TemplateStore>, config: &LoaderConfig) -> Self {
        Self {
            store,
            interpolator: Interpolator::new(config.placeholder.clone()),
            ranker: Arc::new(KeywordRanker::from_config(&config.ranker)),
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn AgentRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_interpolator(mut self, interpolator: Interpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn store(&self) -> &Arc<TemplateStore> {
        &self.store
    }

    /// Resolve a command and substitute its arguments.
    ///
    /// The identifier is normalized first, so `/API-New` finds `api-new`.
    pub fn resolve_command(
        &self,
        identifier: &str,
        arguments: &str,
    ) -> Result<ResolvedCommand, RouteError> {
        let document = self
            .store
            .get(TemplateKind::Command, identifier)
            .map_err(|_| RouteError::UnknownCommand(identifier.trim().to_string()))?;

        debug!("Resolved command {}", document.identifier());

        Ok(ResolvedCommand {
            identifier: document.identifier().to_string(),
            prompt: self
                .interpolator
                .interpolate(document.body(), arguments)
                .into_owned(),
            metadata: document.metadata().clone(),
            source_path: document.source_path().to_path_buf(),
        })
    }

    /// Every agent with its complete description, in store order.
    pub fn agent_candidates(&self) -> Vec<AgentCandidate<'_>> {
        self.store
            .agents()
            .map(|doc| AgentCandidate {
                identifier: doc.identifier(),
                description: doc.description(),
                model: doc.model(),
            })
            .collect()
    }

    /// Rank agents against `context`, best first.
    ///
    /// Agents the ranker names that are not loaded, and repeats, are dropped.
    /// An empty result means no agent applies.
    pub fn match_agent(&self, context: &str) -> Result<Vec<AgentMatch>, RouteError> {
        let candidates = self.agent_candidates();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ranked = self
            .ranker
            .rank(context, &candidates)
            .map_err(|e| RouteError::Ranker(format!("{e:#}")))?;

        let mut seen = HashSet::new();
        let mut matches = Vec::with_capacity(ranked.len());
        for result in ranked {
            let Ok(document) = self.store.get(TemplateKind::Agent, &result.identifier) else {
                warn!("Ranker returned unknown agent '{}', ignoring", result.identifier);
                continue;
            };
            if !seen.insert(document.identifier()) {
                continue;
            }
            matches.push(AgentMatch::new(document, result.score));
        }

        Ok(matches)
    }

    /// Route an invocation.
    pub fn route(&self, invocation: &Invocation) -> Result<Routed, RouteError> {
        match invocation {
            Invocation::Command {
                identifier,
                arguments,
            } => self.resolve_command(identifier, arguments).map(Routed::Command),
            Invocation::Agent { context } => self.match_agent(context).map(Routed::Agents),
        }
    }

    /// Command identifiers starting with `prefix`, in store order.
    pub fn complete(&self, prefix: &str) -> Vec<&str> {
        let prefix = normalize_identifier(prefix);
        self.store
            .commands()
            .map(TemplateDocument::identifier)
            .filter(|id| id.starts_with(&prefix))
            .collect()
    }

    /// Split `/name args` into `(name, args)`.
    ///
    /// Returns `None` when the input is not a slash invocation.
    pub fn parse_invocation(input: &str) -> Option<(&str, &str)> {
        let rest = input.trim().strip_prefix('/')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        let arguments = parts.next().unwrap_or("").trim();
        Some((name, arguments))
    }
}
