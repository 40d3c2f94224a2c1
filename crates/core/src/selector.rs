//! Equality-only label selectors.
//!
//! A [`LabelSelector`] is what users write in a Bot or Event spec. It renders
//! to a query string (`app=chat,tier=web`) that the object store parses back
//! into a [`Selector`] and evaluates against each candidate's own labels.
//! Set-based and inequality operators are rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Label selector as declared in a spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Create a selector from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Render as an equality query string, keys in sorted order.
    ///
    /// An empty selector renders to the empty string, which matches everything.
    pub fn to_query(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .join(",")
    }

    /// Whether `labels` satisfy every pair of this selector.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// A parsed selector query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<(String, String)>,
}

impl Selector {
    /// Parse a comma separated list of `key=value` or `key==value` terms.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSelector`] for empty keys, illegal characters
    /// and any operator other than equality.
    pub fn parse(query: &str) -> Result<Self> {
        let requirements = query
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| parse_term(query, term))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    /// Whether the selector has no terms.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Whether `labels` satisfy every term.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .requirements
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .join(",");
        f.write_str(&rendered)
    }
}

impl From<&LabelSelector> for Selector {
    fn from(selector: &LabelSelector) -> Self {
        Self {
            requirements: selector
                .match_labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn parse_term(query: &str, term: &str) -> Result<(String, String)> {
    if term.contains("!=") {
        return Err(Error::invalid_selector(
            query,
            format!("'{term}': only equality is supported"),
        ));
    }

    let (key, value) = term
        .split_once("==")
        .or_else(|| term.split_once('='))
        .ok_or_else(|| {
            Error::invalid_selector(query, format!("'{term}': only equality is supported"))
        })?;

    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return Err(Error::invalid_selector(query, "empty label key"));
    }
    if !key.chars().all(is_key_char) {
        return Err(Error::invalid_selector(
            query,
            format!("illegal character in key '{key}'"),
        ));
    }
    if !value.chars().all(is_value_char) {
        return Err(Error::invalid_selector(
            query,
            format!("illegal character in value '{value}'"),
        ));
    }

    Ok((key.to_string(), value.to_string()))
}

const fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

const fn is_key_char(c: char) -> bool {
    is_value_char(c) || c == '/'
}
