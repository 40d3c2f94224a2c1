//! Untyped stored objects and request parameters.

use linebot_core::{Kind, LabelSelector, ObjectMeta, Resource, Selector};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// A record in its stored form: kind, metadata and the full serialized body.
///
/// `metadata` is authoritative; the copy inside `body` is overwritten when the
/// object is converted back into its typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    pub kind: Kind,
    pub metadata: ObjectMeta,
    pub body: Value,
}

impl RawObject {
    /// Serialize a typed resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the resource cannot be serialized.
    pub fn from_resource<R: Resource>(resource: &R) -> Result<Self> {
        let body =
            serde_json::to_value(resource).map_err(|e| StoreError::serialization(e.to_string()))?;
        Ok(Self {
            kind: R::KIND,
            metadata: resource.meta().clone(),
            body,
        })
    }

    /// Deserialize into a typed resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] on a kind mismatch or malformed body.
    pub fn into_resource<R: Resource>(self) -> Result<R> {
        if self.kind != R::KIND {
            return Err(StoreError::serialization(format!(
                "expected {} but found {}",
                R::KIND,
                self.kind
            )));
        }
        let mut resource: R = serde_json::from_value(self.body)
            .map_err(|e| StoreError::serialization(format!("{}: {e}", R::KIND)))?;
        *resource.meta_mut() = self.metadata;
        Ok(resource)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace_or_default()
    }
}

/// Filters for a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Equality selector query, e.g. `app=chat,tier=web`.
    pub label_selector: Option<String>,
}

impl ListParams {
    /// Filter by a raw selector query.
    pub fn labels(query: impl Into<String>) -> Self {
        Self {
            label_selector: Some(query.into()),
        }
    }

    /// Filter by a spec-level selector.
    pub fn matching(selector: &LabelSelector) -> Self {
        Self::labels(selector.to_query())
    }

    /// Parse the selector query, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsupported selector syntax.
    pub fn selector(&self) -> Result<Selector> {
        self.label_selector
            .as_deref()
            .map_or_else(|| Ok(Selector::default()), Selector::parse)
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use linebot_core::{EventBinding, ObjectMeta};

    use super::*;

    #[test]
    fn test_metadata_is_authoritative_on_decode() {
        let binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        let mut raw = RawObject::from_resource(&binding).unwrap();
        raw.metadata.resource_version = Some("7".to_string());

        let decoded: EventBinding = raw.into_resource().unwrap();
        assert_eq!(decoded.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        let raw = RawObject::from_resource(&binding).unwrap();

        let err = raw.into_resource::<linebot_core::Bot>().unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_list_params_reject_inequality() {
        let params = ListParams::labels("app!=chat");
        assert!(matches!(params.selector(), Err(StoreError::Invalid { .. })));
        assert!(ListParams::default().selector().unwrap().is_empty());
    }
}
