//! Label matchers and the predicate engine that evaluates them.
//!
//! A [`Matcher`] is one condition of a silence: a label name, a value or
//! pattern, and whether the value is an exact string or a regular
//! expression. Matching is pure; nothing here touches the store.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::MatcherRecord;
use crate::error::{Result, SilenceError};

/// A mapping from label name to value identifying an alert instance.
pub type LabelSet = HashMap<String, String>;

/// A single label condition within a silence.
///
/// Regex matchers are anchored at both ends, so `warn.*` matches `warning`
/// but not `prewarning`. Serializes through [`MatcherRecord`], so a
/// deserialized regex matcher is always compiled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherRecord", into = "MatcherRecord")]
pub struct Matcher {
    name: String,
    value: String,
    is_regex: bool,
    regex: Option<Regex>,
}

impl Matcher {
    /// Creates an equality matcher.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if the label name is empty.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Self::new(name, value, false)
    }

    /// Creates a regex matcher, compiling the anchored pattern.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if the label name is empty or the
    /// pattern does not compile.
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Self::new(name, pattern, true)
    }

    /// Creates a matcher from its (name, value, is-regex) triple.
    ///
    /// # Errors
    ///
    /// Returns `SilenceError::Validation` if the label name is empty or a
    /// regex pattern does not compile.
    pub fn new(name: impl Into<String>, value: impl Into<String>, is_regex: bool) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() {
            return Err(SilenceError::validation("matcher label name cannot be empty"));
        }

        let regex = if is_regex {
            let anchored = format!("^(?:{value})$");
            let compiled = Regex::new(&anchored).map_err(|e| {
                SilenceError::validation(format!("invalid regex for label '{name}': {e}"))
            })?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            name,
            value,
            is_regex,
            regex,
        })
    }

    /// The label name this matcher inspects.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The exact value or the (unanchored) pattern source.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the value is a regular expression.
    #[must_use]
    pub const fn is_regex(&self) -> bool {
        self.is_regex
    }

    /// Tests this matcher against a label set.
    ///
    /// An absent label reads as the empty string: an equality matcher on `""`
    /// matches it, and a regex matcher is tested against `""`.
    #[must_use]
    pub fn matches(&self, labels: &LabelSet) -> bool {
        let actual = labels.get(&self.name).map_or("", String::as_str);
        match &self.regex {
            Some(re) => re.is_match(actual),
            None => actual == self.value,
        }
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value && self.is_regex == other.is_regex
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.is_regex { "=~" } else { "=" };
        write!(f, "{}{}\"", self.name, op)?;
        for c in self.value.chars() {
            if matches!(c, '"' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(c)?;
        }
        f.write_char('"')
    }
}

/// Returns true iff every matcher matches the label set.
#[must_use]
pub fn matches_all(matchers: &[Matcher], labels: &LabelSet) -> bool {
    matchers.iter().all(|m| m.matches(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    mod construction_tests {
        use super::*;

        #[test]
        fn equal_matcher_accessors() {
            let m = Matcher::equal("alertname", "Watchdog").unwrap();
            assert_eq!(m.name(), "alertname");
            assert_eq!(m.value(), "Watchdog");
            assert!(!m.is_regex());
        }

        #[test]
        fn empty_name_rejected() {
            let err = Matcher::equal("", "x").unwrap_err();
            assert!(err.is_validation());
        }

        #[test]
        fn invalid_regex_rejected() {
            let err = Matcher::regex("severity", "warn(").unwrap_err();
            match err {
                SilenceError::Validation { reason } => assert!(reason.contains("severity")),
                other => panic!("expected Validation error, got {other:?}"),
            }
        }

        #[test]
        fn equality_ignores_compiled_state() {
            let a = Matcher::regex("severity", "warn.*").unwrap();
            let b = Matcher::new("severity", "warn.*", true).unwrap();
            assert_eq!(a, b);
            assert_ne!(a, Matcher::equal("severity", "warn.*").unwrap());
        }

        #[test]
        fn display() {
            assert_eq!(
                Matcher::equal("alertname", "Watchdog").unwrap().to_string(),
                "alertname=\"Watchdog\""
            );
            assert_eq!(
                Matcher::regex("severity", "warn.*").unwrap().to_string(),
                "severity=~\"warn.*\""
            );
        }

        #[test]
        fn display_escapes_only_quote_and_backslash() {
            assert_eq!(
                Matcher::equal("summary", "disk \"/\" full").unwrap().to_string(),
                r#"summary="disk \"/\" full""#
            );
            assert_eq!(
                Matcher::regex("path", r"C:\\temp").unwrap().to_string(),
                r#"path=~"C:\\\\temp""#
            );
            assert_eq!(
                Matcher::equal("region", "zürich\tdc").unwrap().to_string(),
                "region=\"zürich\tdc\""
            );
        }
    }

    mod match_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("Watchdog", &[("alertname", "Watchdog")], true ; "exact value")]
        #[test_case("Watchdog", &[("alertname", "watchdog")], false ; "case sensitive")]
        #[test_case("Watchdog", &[], false ; "absent label")]
        #[test_case("", &[], true ; "empty value matches absent")]
        #[test_case("", &[("alertname", "")], true ; "empty value matches empty")]
        #[test_case("", &[("alertname", "x")], false ; "empty value rejects set label")]
        fn equality_matcher(value: &str, pairs: &[(&str, &str)], expected: bool) {
            let m = Matcher::equal("alertname", value).unwrap();
            assert_eq!(m.matches(&labels(pairs)), expected);
        }

        #[test_case("warn.*", &[("severity", "warning")], true ; "prefix pattern")]
        #[test_case("warn.*", &[("severity", "critical")], false ; "non matching")]
        #[test_case("warn", &[("severity", "warning")], false ; "anchored at end")]
        #[test_case("arn.*", &[("severity", "warning")], false ; "anchored at start")]
        #[test_case("info|warning", &[("severity", "warning")], true ; "alternation anchored")]
        #[test_case(".*", &[], true ; "match all accepts absent")]
        #[test_case(".+", &[], false ; "non empty rejects absent")]
        fn regex_matcher(pattern: &str, pairs: &[(&str, &str)], expected: bool) {
            let m = Matcher::regex("severity", pattern).unwrap();
            assert_eq!(m.matches(&labels(pairs)), expected);
        }

        #[test]
        fn matches_all_requires_every_matcher() {
            let matchers = vec![
                Matcher::equal("alertname", "HighCPU").unwrap(),
                Matcher::regex("node", "gpu-.*").unwrap(),
            ];

            assert!(matches_all(
                &matchers,
                &labels(&[("alertname", "HighCPU"), ("node", "gpu-01")])
            ));
            assert!(!matches_all(
                &matchers,
                &labels(&[("alertname", "HighCPU"), ("node", "cpu-01")])
            ));
            assert!(!matches_all(&matchers, &labels(&[("node", "gpu-01")])));
        }

        #[test]
        fn extra_labels_do_not_affect_match() {
            let matchers = vec![Matcher::equal("alertname", "Watchdog").unwrap()];
            assert!(matches_all(
                &matchers,
                &labels(&[("alertname", "Watchdog"), ("team", "sre"), ("env", "prod")])
            ));
        }
    }

    fn matcher_strategy() -> impl Strategy<Value = Matcher> {
        ("[a-c]", "[x-z]{0,2}", any::<bool>()).prop_map(|(name, value, is_regex)| {
            Matcher::new(name, value, is_regex).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_matches_all_is_conjunction(
            matchers in prop::collection::vec(matcher_strategy(), 1..6),
            labels in prop::collection::hash_map("[a-d]", "[x-z]{0,2}", 0..4),
        ) {
            let each = matchers.iter().all(|m| m.matches(&labels));
            prop_assert_eq!(matches_all(&matchers, &labels), each);
        }

        #[test]
        fn prop_matcher_order_does_not_matter(
            matchers in prop::collection::vec(matcher_strategy(), 1..6),
            labels in prop::collection::hash_map("[a-d]", "[x-z]{0,2}", 0..4),
            rotate in 0usize..6,
        ) {
            let mut reordered = matchers.clone();
            reordered.reverse();
            let len = reordered.len();
            reordered.rotate_left(rotate % len);
            prop_assert_eq!(matches_all(&matchers, &labels), matches_all(&reordered, &labels));
        }

        #[test]
        fn prop_literal_regex_agrees_with_equality(
            name in "[a-c]",
            value in "[x-z]{1,3}",
            labels in prop::collection::hash_map("[a-c]", "[x-z]{0,3}", 0..4),
        ) {
            let eq = Matcher::equal(name.clone(), value.clone()).unwrap();
            let re = Matcher::regex(name, value).unwrap();
            prop_assert_eq!(eq.matches(&labels), re.matches(&labels));
        }
    }
}
