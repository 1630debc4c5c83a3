//! Argument substitution for command bodies.

use std::borrow::Cow;

/// Default placeholder token.
pub const DEFAULT_PLACEHOLDER: &str = "$ARGUMENTS";

/// Substitute `arguments` for [`DEFAULT_PLACEHOLDER`] in `body`.
pub fn interpolate<'a>(body: &'a str, arguments: &str) -> Cow<'a, str> {
    Interpolator::default().interpolate(body, arguments)
}

/// Replaces a single placeholder token with caller-supplied text.
///
/// Every occurrence is replaced in one left-to-right pass. The argument text
/// is inserted verbatim and never scanned for further placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolator {
    token: String,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER)
    }
}

impl Interpolator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Substitute `arguments` for the token.
    ///
    /// Bodies without the token are returned borrowed and unchanged. Empty
    /// arguments leave an empty slot.
    pub fn interpolate<'a>(&self, body: &'a str, arguments: &str) -> Cow<'a, str> {
        if self.token.is_empty() || !body.contains(self.token.as_str()) {
            return Cow::Borrowed(body);
        }
        Cow::Owned(body.replace(self.token.as_str(), arguments))
    }

    /// Number of token occurrences in `body`.
    pub fn placeholder_count(&self, body: &str) -> usize {
        if self.token.is_empty() {
            return 0;
        }
        body.matches(self.token.as_str()).count()
    }

    /// Whether `body` has an argument slot.
    pub fn expects_arguments(&self, body: &str) -> bool {
        self.placeholder_count(body) > 0
    }
}
