//! Persisted encoding of matcher lists.
//!
//! Matchers are stored as a versioned JSON envelope with one tagged record
//! per matcher kind:
//!
//! ```json
//! {"version":1,"matchers":[{"kind":"equal","name":"alertname","value":"Watchdog"}]}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SilenceError;
use crate::matcher::Matcher;

/// The envelope version written by [`encode`].
pub const ENCODING_VERSION: u32 = 1;

/// Wire form of a single matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatcherRecord {
    /// Exact string comparison.
    Equal {
        /// Label name.
        name: String,
        /// Expected value.
        value: String,
    },
    /// Anchored regular expression.
    Regex {
        /// Label name.
        name: String,
        /// Pattern source, without anchors.
        value: String,
    },
}

impl From<Matcher> for MatcherRecord {
    fn from(matcher: Matcher) -> Self {
        let name = matcher.name().to_string();
        let value = matcher.value().to_string();
        if matcher.is_regex() {
            Self::Regex { name, value }
        } else {
            Self::Equal { name, value }
        }
    }
}

impl TryFrom<MatcherRecord> for Matcher {
    type Error = SilenceError;

    fn try_from(record: MatcherRecord) -> Result<Self, Self::Error> {
        match record {
            MatcherRecord::Equal { name, value } => Self::equal(name, value),
            MatcherRecord::Regex { name, value } => Self::regex(name, value),
        }
    }
}

/// Errors from encoding or decoding a matcher payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not valid JSON or does not fit the envelope.
    #[error("malformed matcher payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was written by an unknown encoder version.
    #[error("unsupported matcher encoding version {0}")]
    UnsupportedVersion(u32),

    /// The payload decoded to an empty matcher list.
    #[error("matcher payload is empty")]
    Empty,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    matchers: &'a [Matcher],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    matchers: serde_json::Value,
}

/// Encodes a matcher list into its stored form.
///
/// # Errors
///
/// Returns `CodecError::Json` if serialization fails.
pub fn encode(matchers: &[Matcher]) -> Result<String, CodecError> {
    let envelope = EnvelopeRef {
        version: ENCODING_VERSION,
        matchers,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decodes a stored payload back into matchers.
///
/// # Errors
///
/// Returns a `CodecError` if the payload is malformed, carries an unknown
/// version, names an unknown matcher kind, holds an uncompilable regex, or
/// contains no matchers.
pub fn decode(payload: &str) -> Result<Vec<Matcher>, CodecError> {
    let envelope: Envelope = serde_json::from_str(payload)?;
    if envelope.version != ENCODING_VERSION {
        return Err(CodecError::UnsupportedVersion(envelope.version));
    }

    let matchers: Vec<Matcher> = serde_json::from_value(envelope.matchers)?;
    if matchers.is_empty() {
        return Err(CodecError::Empty);
    }

    Ok(matchers)
}
