//! Object metadata shared by every record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::Resource;

/// Namespace used when a record does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity and bookkeeping fields of a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Optimistic concurrency token, bumped by the store on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Create metadata with a name and namespace.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Replace the labels.
    #[must_use]
    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// Add a single label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// The namespace, falling back to [`DEFAULT_NAMESPACE`].
    pub fn namespace_or_default(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// Whether a controller owner reference is present.
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references
            .iter()
            .find(|r| r.controller == Some(true))
    }
}

/// Parent/child link used for cascading deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_owner_deletion: Option<bool>,
}

impl OwnerReference {
    /// Controller reference pointing at `owner`.
    pub fn controller_of<R: Resource>(owner: &R) -> Self {
        Self {
            api_version: R::KIND.api_version().to_string(),
            kind: R::KIND.as_str().to_string(),
            name: owner.name().to_string(),
            uid: owner.meta().uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_defaults() {
        let meta = ObjectMeta::new("b1", "");
        assert_eq!(meta.namespace_or_default(), "default");

        let meta = ObjectMeta::new("b1", "bots");
        assert_eq!(meta.namespace_or_default(), "bots");
    }

    #[test]
    fn test_controller_ref_lookup() {
        let mut meta = ObjectMeta::new("child", "default");
        assert!(meta.controller_ref().is_none());

        meta.owner_references.push(OwnerReference {
            api_version: "line.you/v1alpha1".to_string(),
            kind: "Bot".to_string(),
            name: "b1".to_string(),
            uid: "01H".to_string(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        });
        assert_eq!(meta.controller_ref().map(|r| r.name.as_str()), Some("b1"));
    }
}
