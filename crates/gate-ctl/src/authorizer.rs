//! Caller authorization
//!
//! Authorization is plain substring containment against the whole caller-ID
//! line. A partial number such as `43000000` therefore matches regardless of
//! the country prefix the network adds. No normalization is applied, so a
//! network that formats numbers with spaces or dashes will not match an entry
//! written without them. Short entries are a false-positive risk.

use crate::error::ConfigError;

/// Ordered, immutable list of authorized caller substrings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedCallerList {
    entries: Vec<String>,
}

impl AuthorizedCallerList {
    /// Build the list, rejecting empty entries
    ///
    /// An empty entry is contained in every line and would authorize every
    /// caller.
    pub fn new<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();

        if entries.is_empty() {
            return Err(ConfigError::NoAuthorizedCallers);
        }
        if let Some(index) = entries.iter().position(|e| e.trim().is_empty()) {
            return Err(ConfigError::EmptyCallerEntry(index));
        }

        Ok(Self { entries })
    }

    /// Entries in configuration order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; an empty list cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers "is this caller-ID line authorized?"
#[derive(Debug, Clone)]
pub struct CallerAuthorizer {
    callers: AuthorizedCallerList,
}

impl CallerAuthorizer {
    /// Create an authorizer over a caller list
    pub fn new(callers: AuthorizedCallerList) -> Self {
        Self { callers }
    }

    /// The first entry, in list order, contained in `text`
    ///
    /// The scan stops at the first match, so a line matching several entries
    /// still yields a single authorization.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.callers
            .entries()
            .iter()
            .find(|entry| text.contains(entry.as_str()))
            .map(String::as_str)
    }

    /// True if any entry is contained in `text`
    pub fn is_authorized(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// The configured callers
    pub fn callers(&self) -> &AuthorizedCallerList {
        &self.callers
    }
}
