//! Subscriber filters.
//!
//! A [`Filter`] is a conjunction of predicates over a message's flags,
//! subject, and sender. It is the only part of the filter DSL this
//! crate consumes directly (the surrounding DSL, parsing a
//! human-authored query into one or more `Filter`s, lives outside this
//! crate's scope).

use crate::flag::Flag;
use crate::session::state::PartialMessage;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("has_flags and lacks_flags overlap on: {0:?}")]
    OverlappingFlags(Vec<Flag>),
    #[error("invalid subject regex: {0}")]
    InvalidSubjectRegex(regex::Error),
    #[error("invalid sender regex: {0}")]
    InvalidSenderRegex(regex::Error),
}

/// A conjunction of predicates a [`PartialMessage`] (or fully fetched
/// message) must satisfy to be delivered to a subscriber.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    has_flags: HashSet<Flag>,
    lacks_flags: HashSet<Flag>,
    subject_regex: Option<Regex>,
    sender_regex: Option<Regex>,
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.has_flags == other.has_flags
            && self.lacks_flags == other.lacks_flags
            && self.subject_regex.as_ref().map(Regex::as_str)
                == other.subject_regex.as_ref().map(Regex::as_str)
            && self.sender_regex.as_ref().map(Regex::as_str)
                == other.sender_regex.as_ref().map(Regex::as_str)
    }
}

impl Filter {
    /// A filter that accepts every message (the default passed to
    /// `subscribe` when the caller supplies none).
    #[must_use]
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Start building a filter. Equivalent to [`Filter::accept_all`];
    /// exists for readability at call sites that chain `with_*`.
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Require `flag` to be present. Construction fails if `flag` is
    /// already required to be absent. Idempotent: repeating a flag
    /// already in the set does not duplicate it.
    pub fn has_flag(mut self, flag: Flag) -> Result<Self, FilterError> {
        if self.lacks_flags.contains(&flag) {
            return Err(FilterError::OverlappingFlags(vec![flag]));
        }
        self.has_flags.insert(flag);
        Ok(self)
    }

    /// Require `flag` to be absent. Construction fails if `flag` is
    /// already required to be present.
    pub fn lacks_flag(mut self, flag: Flag) -> Result<Self, FilterError> {
        if self.has_flags.contains(&flag) {
            return Err(FilterError::OverlappingFlags(vec![flag]));
        }
        self.lacks_flags.insert(flag);
        Ok(self)
    }

    /// Require the subject to match `pattern` (a `regex`-syntax
    /// pattern applied to the decoded subject).
    pub fn with_subject_regex(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.subject_regex = Some(Regex::new(pattern).map_err(FilterError::InvalidSubjectRegex)?);
        Ok(self)
    }

    /// Require at least one `from` address to match `pattern`.
    pub fn with_sender_regex(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.sender_regex = Some(Regex::new(pattern).map_err(FilterError::InvalidSenderRegex)?);
        Ok(self)
    }

    /// Whether this filter's predicates require the flags attribute
    /// to have been fetched before a verdict can be reached.
    #[must_use]
    pub fn needs_flags(&self) -> bool {
        !self.has_flags.is_empty() || !self.lacks_flags.is_empty()
    }

    /// Whether this filter's predicates require the envelope (subject
    /// or sender) to have been fetched before a verdict can be
    /// reached.
    #[must_use]
    pub fn needs_envelope(&self) -> bool {
        self.subject_regex.is_some() || self.sender_regex.is_some()
    }

    /// Evaluate this filter against everything currently known about
    /// `message`. A predicate whose required attribute has not yet
    /// been fetched is treated as satisfied for now — the fetch
    /// pipeline only calls `accepts` once the attributes `needs_*`
    /// reports are already present (see stage `Filter` in the fetch
    /// pipeline).
    #[must_use]
    pub fn accepts(&self, message: &PartialMessage) -> bool {
        if let Some(flags) = &message.flags {
            let flag_set: HashSet<&Flag> = flags.iter().collect();
            if !self.has_flags.iter().all(|f| flag_set.contains(f)) {
                return false;
            }
            if self.lacks_flags.iter().any(|f| flag_set.contains(f)) {
                return false;
            }
        }

        if let Some(envelope) = &message.envelope {
            if let Some(re) = &self.subject_regex {
                let subject = envelope.subject.as_deref().unwrap_or("");
                if !re.is_match(subject) {
                    return false;
                }
            }
            if let Some(re) = &self.sender_regex {
                let matches_any = envelope.from.iter().any(|a| re.is_match(&a.email));
                if !matches_any {
                    return false;
                }
            }
        }

        true
    }
}
