//! Topic naming and filter matching
//!
//! Topics are `/`-separated levels: `dab/applications/launch`.
//!
//! Filters may use MQTT wildcards, each occupying a whole level:
//! - `dab/+/launch` matches `dab/applications/launch` (one level)
//! - `dab/#` matches `dab/applications/launch`, `dab/system/restart`
//! - `#` matches everything
//!
//! Request handlers never use wildcards directly. A base topic such as
//! `dab/system/restart` is turned into the filter `dab/system/restart/+`, so the
//! correlation suffix appended by the requester is the only variable level.

use std::fmt;
use thiserror::Error;

/// Level separator
pub const SEPARATOR: char = '/';

/// Matches exactly one level
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Matches the remaining levels
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Namespace replies are published under, followed by the full request topic
pub const RESPONSE_PREFIX: &str = "_response/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic cannot be empty")]
    Empty,

    #[error("topic '{0}' must not end with '/'")]
    TrailingSeparator(String),

    #[error("topic '{0}' must not contain wildcards")]
    Wildcard(String),

    #[error("invalid wildcard in filter '{0}': '+' and '#' must occupy a whole level, '#' only the last")]
    InvalidWildcard(String),
}

/// Check whether a concrete topic satisfies a filter.
///
/// `#` consumes the rest of the topic wherever it appears. Otherwise both sides
/// must have the same number of levels, so `a/#` does not match `a` and `a/+`
/// does not match `a/b/c`.
pub fn matches(topic: &str, filter: &str) -> bool {
    if topic == filter || filter == MULTI_LEVEL_WILDCARD {
        return true;
    }

    let mut filter_levels = filter.split(SEPARATOR);

    for level in topic.split(SEPARATOR) {
        match filter_levels.next() {
            None => return false,
            Some(SINGLE_LEVEL_WILDCARD) => continue,
            Some(MULTI_LEVEL_WILDCARD) => return true,
            Some(expected) if expected == level => continue,
            Some(_) => return false,
        }
    }

    filter_levels.next().is_none()
}

/// Validate a topic that requests are published on or handlers are bound to.
///
/// Such a topic is concrete: non-empty, wildcard-free and without a trailing
/// separator, because a correlation level is appended to it.
pub fn validate_base_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }

    if topic.contains(['+', '#']) {
        return Err(TopicError::Wildcard(topic.to_string()));
    }

    if topic.ends_with(SEPARATOR) {
        return Err(TopicError::TrailingSeparator(topic.to_string()));
    }

    Ok(())
}

/// Concrete request topic for one call: `base/correlation`
pub fn request_topic(base: &str, correlation: &str) -> String {
    format!("{base}{SEPARATOR}{correlation}")
}

/// Topic the reply to `request_topic` is published on
pub fn response_topic(request_topic: &str) -> String {
    format!("{RESPONSE_PREFIX}{request_topic}")
}

/// A validated topic filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    filter: String,
}

impl TopicFilter {
    /// Parse and validate a filter (may contain `+` and a trailing `#`)
    pub fn parse(filter: &str) -> Result<Self, TopicError> {
        if filter.is_empty() {
            return Err(TopicError::Empty);
        }

        let level_count = filter.split(SEPARATOR).count();

        for (i, level) in filter.split(SEPARATOR).enumerate() {
            let has_multi = level.contains('#');
            let has_single = level.contains('+');

            if has_multi && (level != MULTI_LEVEL_WILDCARD || i + 1 != level_count) {
                return Err(TopicError::InvalidWildcard(filter.to_string()));
            }

            if has_single && level != SINGLE_LEVEL_WILDCARD {
                return Err(TopicError::InvalidWildcard(filter.to_string()));
            }
        }

        Ok(Self {
            filter: filter.to_string(),
        })
    }

    /// Filter accepting every concrete request for a handler's base topic
    pub fn for_requests(base: &str) -> Result<Self, TopicError> {
        validate_base_topic(base)?;

        Ok(Self {
            filter: format!("{base}{SEPARATOR}{SINGLE_LEVEL_WILDCARD}"),
        })
    }

    /// Check if this filter matches a concrete topic
    pub fn matches(&self, topic: &str) -> bool {
        matches(topic, &self.filter)
    }

    /// Get the filter as a string slice
    pub fn as_str(&self) -> &str {
        &self.filter
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filter)
    }
}
