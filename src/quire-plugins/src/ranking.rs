//! Agent ranking.
//!
//! Deciding which agent fits a context is a judgment call, usually made by a
//! language model. The router hands that judgment to an [`AgentRanker`] and
//! only enforces the contract around it: every agent is offered with its full
//! description, and an empty result is a valid answer.

use std::collections::HashSet;

use crate::config::RankerConfig;

/// An agent offered to a ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentCandidate<'a> {
    pub identifier: &'a str,
    /// The complete activation description.
    pub description: &'a str,
    pub model: Option<&'a str>,
}

/// A ranker's verdict for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAgent {
    pub identifier: String,
    /// Relevance; larger is better. Scale is ranker specific.
    pub score: f64,
}

impl RankedAgent {
    pub fn new(identifier: impl Into<String>, score: f64) -> Self {
        Self {
            identifier: identifier.into(),
            score,
        }
    }
}

/// Ranks agents by relevance to a free-text context.
///
/// Implementations return the relevant candidates, best first. Returning an
/// empty list means no agent fits.
pub trait AgentRanker: Send + Sync {
    fn rank(
        &self,
        context: &str,
        candidates: &[AgentCandidate<'_>],
    ) -> anyhow::Result<Vec<RankedAgent>>;
}

impl<F> AgentRanker for F
where
    F: Fn(&str, &[AgentCandidate<'_>]) -> anyhow::Result<Vec<RankedAgent>> + Send + Sync,
{
    fn rank(
        &self,
        context: &str,
        candidates: &[AgentCandidate<'_>],
    ) -> anyhow::Result<Vec<RankedAgent>> {
        self(context, candidates)
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "i", "in",
    "is", "it", "me", "my", "of", "on", "or", "so", "that", "the", "this", "to", "use", "we",
    "when", "with", "you", "your",
];

/// Deterministic keyword-overlap ranker.
///
/// Scores each agent by how many distinct context keywords appear in its
/// identifier or description. Ties keep candidate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRanker {
    min_score: usize,
    limit: Option<usize>,
}

impl Default for KeywordRanker {
    fn default() -> Self {
        Self::from_config(&RankerConfig::default())
    }
}

impl KeywordRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RankerConfig) -> Self {
        Self {
            min_score: config.min_score,
            limit: config.limit,
        }
    }

    /// Minimum number of shared keywords. Values below 1 are raised to 1.
    pub fn with_min_score(mut self, min_score: usize) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn score(&self, context: &HashSet<String>, candidate: &AgentCandidate<'_>) -> usize {
        let words: HashSet<String> = keywords(candidate.identifier)
            .chain(keywords(candidate.description))
            .collect();
        context.intersection(&words).count()
    }
}

impl AgentRanker for KeywordRanker {
    fn rank(
        &self,
        context: &str,
        candidates: &[AgentCandidate<'_>],
    ) -> anyhow::Result<Vec<RankedAgent>> {
        let context: HashSet<String> = keywords(context).collect();
        if context.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.min_score.max(1);
        let mut scored: Vec<(usize, &AgentCandidate<'_>)> = candidates
            .iter()
            .map(|c| (self.score(&context, c), c))
            .filter(|(score, _)| *score >= threshold)
            .collect();

        // Stable sort keeps candidate order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let limit = self.limit.unwrap_or(usize::MAX);
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, c)| RankedAgent::new(c.identifier, score as f64))
            .collect())
    }
}

/// Lowercased alphanumeric words of at least two characters, minus stop words.
fn keywords(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}
