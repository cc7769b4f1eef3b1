//! Core types for the silence store.
//!
//! This module provides the data model:
//! - [`SilenceId`]: The store-assigned identifier of a silence
//! - [`SilenceState`]: The time-derived status of a silence
//! - [`NewSilence`]: A validated silence draft, not yet stored
//! - [`Silence`]: A stored silence

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SilenceError};
use crate::matcher::{LabelSet, Matcher, matches_all};

/// Stored timestamps keep microsecond precision.
const TIMESTAMP_DIGITS: u16 = 6;

/// Truncates a timestamp to the precision the store persists.
#[must_use]
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(TIMESTAMP_DIGITS)
}

/// Opaque identifier assigned by the store on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SilenceId(i64);

impl SilenceId {
    /// Wraps a raw row identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw row identifier.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SilenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The status of a silence relative to an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    /// The window has not started yet.
    Pending,
    /// The instant lies inside `[starts_at, ends_at)`.
    Active,
    /// The window has ended.
    Expired,
}

impl SilenceState {
    /// Derives the state of the window `[starts_at, ends_at)` at `now`.
    #[must_use]
    pub fn at(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < starts_at {
            Self::Pending
        } else if now < ends_at {
            Self::Active
        } else {
            Self::Expired
        }
    }

    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SilenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A silence that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSilence {
    /// Label matchers; all must match for the silence to apply.
    pub matchers: Vec<Matcher>,
    /// Inclusive start of the validity window.
    pub starts_at: DateTime<Utc>,
    /// Exclusive end of the validity window.
    pub ends_at: DateTime<Utc>,
    /// When the silence was created.
    pub created_at: DateTime<Utc>,
    /// Who created the silence.
    pub created_by: String,
    /// Comment explaining the silence.
    pub comment: String,
}

impl NewSilence {
    /// Creates a validated silence draft stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if `matchers` is empty or
    /// `ends_at` is not after `starts_at`.
    pub fn new(
        matchers: Vec<Matcher>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        created_by: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self> {
        Self::builder(starts_at, ends_at)
            .matchers(matchers)
            .created_by(created_by)
            .comment(comment)
            .build()
    }

    /// Creates a builder for a silence covering `[starts_at, ends_at)`.
    pub fn builder(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> NewSilenceBuilder {
        NewSilenceBuilder::new(starts_at, ends_at)
    }

    /// Returns a copy with every timestamp truncated to stored precision.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            starts_at: normalize_timestamp(self.starts_at),
            ends_at: normalize_timestamp(self.ends_at),
            created_at: normalize_timestamp(self.created_at),
            ..self.clone()
        }
    }

    /// Checks the invariants the store relies on.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if `matchers` is empty or
    /// `ends_at` is not after `starts_at`.
    pub fn validate(&self) -> Result<()> {
        if self.matchers.is_empty() {
            return Err(SilenceError::validation("silence must have at least one matcher"));
        }

        if self.ends_at <= self.starts_at {
            return Err(SilenceError::validation(
                "silence end time must be after start time",
            ));
        }

        Ok(())
    }
}

/// Builder for creating [`NewSilence`] instances.
#[derive(Debug)]
pub struct NewSilenceBuilder {
    matchers: Vec<Matcher>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    created_by: String,
    comment: String,
}

impl NewSilenceBuilder {
    fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            matchers: Vec::new(),
            starts_at,
            ends_at,
            created_at: Utc::now(),
            created_by: String::new(),
            comment: String::new(),
        }
    }

    /// Appends a matcher.
    #[must_use]
    pub fn matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Appends several matchers, keeping their order.
    #[must_use]
    pub fn matchers(mut self, matchers: impl IntoIterator<Item = Matcher>) -> Self {
        self.matchers.extend(matchers);
        self
    }

    /// Overrides the creation timestamp (defaults to the builder's creation).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Builds the [`NewSilence`], truncating timestamps to stored precision.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if no matcher was added or the
    /// window is empty or inverted.
    pub fn build(self) -> Result<NewSilence> {
        let silence = NewSilence {
            matchers: self.matchers,
            starts_at: normalize_timestamp(self.starts_at),
            ends_at: normalize_timestamp(self.ends_at),
            created_at: normalize_timestamp(self.created_at),
            created_by: self.created_by,
            comment: self.comment,
        };
        silence.validate()?;
        Ok(silence)
    }
}

/// A stored silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Silence {
    /// Identifier assigned by the store.
    pub id: SilenceId,
    /// Label matchers (alerts matching all of them are silenced).
    pub matchers: Vec<Matcher>,
    /// Inclusive start of the validity window.
    pub starts_at: DateTime<Utc>,
    /// Exclusive end of the validity window.
    pub ends_at: DateTime<Utc>,
    /// When the silence was created.
    pub created_at: DateTime<Utc>,
    /// Who created the silence.
    pub created_by: String,
    /// Comment explaining the silence.
    pub comment: String,
}

impl Silence {
    /// Attaches a store-assigned identifier to a draft.
    #[must_use]
    pub fn from_new(id: SilenceId, new: NewSilence) -> Self {
        Self {
            id,
            matchers: new.matchers,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            created_at: new.created_at,
            created_by: new.created_by,
            comment: new.comment,
        }
    }

    /// Returns the state of this silence at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> SilenceState {
        SilenceState::at(self.starts_at, self.ends_at, now)
    }

    /// Checks if the silence is active at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SilenceState::Active
    }

    /// Checks if this silence mutes the label set at `now`.
    #[must_use]
    pub fn mutes(&self, labels: &LabelSet, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && matches_all(&self.matchers, labels)
    }
}
