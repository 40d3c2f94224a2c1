//! Multi-document YAML manifests.
//!
//! Documents look like orchestrator manifests: `apiVersion`, `kind`,
//! `metadata`, `spec`. Only the operator's own kinds are accepted as input;
//! output covers every kind so a dump shows the provisioned workloads too.

use std::path::Path;
use std::sync::Arc;

use linebot_core::{Bot, ConfigMap, Deployment, Event, EventBinding, Kind, Resource, Service};
use linebot_reconciler::ChildObjects;
use linebot_store::{Api, ListParams, ObjectStore};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One object read from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestObject {
    Bot(Bot),
    Event(Event),
    EventBinding(EventBinding),
}

impl ManifestObject {
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Bot(_) => Kind::Bot,
            Self::Event(_) => Kind::Event,
            Self::EventBinding(_) => Kind::EventBinding,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bot(bot) => bot.name(),
            Self::Event(event) => event.name(),
            Self::EventBinding(binding) => binding.name(),
        }
    }
}

/// What [`apply`] did with each object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
}

/// Parse every document in `text`. Empty documents are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidManifest`] naming the zero-based document index
/// when a document is malformed, has no `kind`, names a kind other than Bot,
/// Event or EventBinding, or carries a mismatched `apiVersion`.
pub fn parse(text: &str) -> Result<Vec<ManifestObject>> {
    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| Error::invalid_manifest(index, e.to_string()))?;
        if value.is_null() {
            continue;
        }
        objects.push(parse_document(index, value)?);
    }
    Ok(objects)
}

fn parse_document(index: usize, value: Value) -> Result<ManifestObject> {
    let kind: Kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_manifest(index, "missing kind"))?
        .parse()
        .map_err(|e: linebot_core::Error| Error::invalid_manifest(index, e.to_string()))?;

    let api_version = value.get("apiVersion").and_then(Value::as_str);
    if let Some(api_version) = api_version.filter(|v| *v != kind.api_version()) {
        return Err(Error::invalid_manifest(
            index,
            format!(
                "apiVersion '{api_version}' does not match {kind} ({})",
                kind.api_version()
            ),
        ));
    }

    let invalid = |e: serde_yaml::Error| Error::invalid_manifest(index, format!("{kind}: {e}"));
    match kind {
        Kind::Bot => serde_yaml::from_value(value).map(ManifestObject::Bot).map_err(invalid),
        Kind::Event => serde_yaml::from_value(value).map(ManifestObject::Event).map_err(invalid),
        Kind::EventBinding => serde_yaml::from_value(value)
            .map(ManifestObject::EventBinding)
            .map_err(invalid),
        Kind::ConfigMap | Kind::Service | Kind::Deployment => Err(Error::invalid_manifest(
            index,
            format!("{kind} is provisioned by the operator and cannot be applied"),
        )),
    }
}

/// Read and parse a manifest file.
///
/// # Errors
///
/// Returns [`Error::ReadFailed`] if the file cannot be read, otherwise the
/// errors of [`parse`].
pub fn load(path: &Path) -> Result<Vec<ManifestObject>> {
    let text =
        std::fs::read_to_string(path).map_err(|e| Error::read_failed(path, e.to_string()))?;
    parse(&text)
}

/// Create or replace every object in the store.
///
/// Objects without a namespace land in `namespace`. An object whose name is
/// taken replaces the stored one unconditionally.
///
/// # Errors
///
/// Stops at the first store error.
pub async fn apply(
    store: &Arc<dyn ObjectStore>,
    objects: Vec<ManifestObject>,
    namespace: &str,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();
    for object in objects {
        let kind = object.kind();
        let created = match object {
            ManifestObject::Bot(bot) => upsert(store, bot, namespace).await?,
            ManifestObject::Event(event) => upsert(store, event, namespace).await?,
            ManifestObject::EventBinding(binding) => upsert(store, binding, namespace).await?,
        };
        if created {
            summary.created = summary.created.saturating_add(1);
        } else {
            summary.updated = summary.updated.saturating_add(1);
        }
        debug!(kind = %kind, created, "Applied manifest object");
    }
    info!(
        created = summary.created,
        updated = summary.updated,
        "Applied manifests"
    );
    Ok(summary)
}

async fn upsert<R: Resource>(
    store: &Arc<dyn ObjectStore>,
    mut object: R,
    namespace: &str,
) -> Result<bool> {
    if object.meta().namespace.is_empty() {
        object.meta_mut().namespace = namespace.to_string();
    }
    let api: Api<R> = Api::namespaced(Arc::clone(store), object.namespace());

    match api.create(&object).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_already_exists() => {
            object.meta_mut().resource_version = None;
            api.update(&object).await?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Serialize one resource as a YAML document with `apiVersion` and `kind`
/// leading.
///
/// # Errors
///
/// Returns [`Error::RenderFailed`] if the resource does not serialize to a mapping.
pub fn to_document<R: Resource>(resource: &R) -> Result<String> {
    let body = serde_yaml::to_value(resource).map_err(|e| Error::render_failed(e.to_string()))?;
    let Value::Mapping(fields) = body else {
        return Err(Error::render_failed(format!(
            "{} '{}' is not a mapping",
            R::KIND,
            resource.name()
        )));
    };

    let mut document = Mapping::new();
    document.insert("apiVersion".into(), R::KIND.api_version().into());
    document.insert("kind".into(), R::KIND.as_str().into());
    document.extend(fields);
    serde_yaml::to_string(&document).map_err(|e| Error::render_failed(e.to_string()))
}

fn join_documents(documents: Vec<String>) -> String {
    documents.join("---\n")
}

/// The four children of a Bot as one multi-document manifest.
///
/// # Errors
///
/// Returns [`Error::RenderFailed`] if any child fails to serialize.
pub fn render_children(children: &ChildObjects) -> Result<String> {
    Ok(join_documents(vec![
        to_document(&children.config_map)?,
        to_document(&children.service)?,
        to_document(&children.deployment)?,
        to_document(&children.event_binding)?,
    ]))
}

async fn dump_kind<R: Resource>(store: &Arc<dyn ObjectStore>, out: &mut Vec<String>) -> Result<()> {
    for object in Api::<R>::all(Arc::clone(store))
        .list(&ListParams::default())
        .await?
    {
        out.push(to_document(&object)?);
    }
    Ok(())
}

/// Every object in the store, custom kinds first.
///
/// # Errors
///
/// Propagates store and serialization errors.
pub async fn dump(store: &Arc<dyn ObjectStore>) -> Result<String> {
    let mut documents = Vec::new();
    dump_kind::<Bot>(store, &mut documents).await?;
    dump_kind::<Event>(store, &mut documents).await?;
    dump_kind::<EventBinding>(store, &mut documents).await?;
    dump_kind::<ConfigMap>(store, &mut documents).await?;
    dump_kind::<Service>(store, &mut documents).await?;
    dump_kind::<Deployment>(store, &mut documents).await?;
    Ok(join_documents(documents))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use linebot_core::{BotExposeType, ObjectMeta};
    use linebot_store::InMemoryStore;

    use super::*;

    const MANIFEST: &str = r"
apiVersion: line.you/v1alpha1
kind: Bot
metadata:
  name: echo
spec:
  selector:
    matchLabels:
      app: echo
  channelSecretName: line-secret
  expose:
    type: LoadBalancer
    loadBalanceIPs: [10.0.0.5]
  version: v0.2.0
  logLevel: 2
---
---
apiVersion: line.you/v1alpha1
kind: Event
metadata:
  name: greet
  namespace: bots
spec:
  selector:
    matchLabels:
      app: echo
  type: message
  messages:
    - keywords: [hello]
      reply: hi there
";

    #[test]
    fn test_parse_reads_every_document_and_skips_empty_ones() {
        let objects = parse(MANIFEST).unwrap();
        assert_eq!(objects.len(), 2);

        let ManifestObject::Bot(bot) = &objects[0] else {
            panic!("first document is a Bot")
        };
        assert_eq!(bot.name(), "echo");
        assert_eq!(bot.spec.expose.expose_type, BotExposeType::LoadBalancer);
        assert_eq!(bot.spec.expose.load_balance_ips, vec!["10.0.0.5"]);
        assert_eq!(bot.spec.log_level, 2);

        assert_eq!(objects[1].kind(), Kind::Event);
        assert_eq!(objects[1].name(), "greet");
    }

    #[test]
    fn test_parse_rejects_provisioned_kinds() {
        let err = parse("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n").unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { index: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_missing_kind_and_wrong_api_version() {
        let err = parse("metadata:\n  name: x\n").unwrap_err();
        assert_eq!(err.to_string(), "manifest document 0: missing kind");

        let text = "apiVersion: line.you/v1alpha1\nkind: Bot\nmetadata:\n  name: a\nspec: {}\n\
                    ---\napiVersion: v2\nkind: Event\nmetadata:\n  name: b\nspec: {}\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(err, Error::InvalidManifest { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_apply_creates_then_replaces() {
        let store: Arc<dyn ObjectStore> = InMemoryStore::new_arc();
        let objects = parse(MANIFEST).unwrap();

        let first = apply(&store, objects.clone(), "default").await.unwrap();
        assert_eq!(first, ApplySummary { created: 2, updated: 0 });

        let second = apply(&store, objects, "default").await.unwrap();
        assert_eq!(second, ApplySummary { created: 0, updated: 2 });

        let events: Api<Event> = Api::namespaced(Arc::clone(&store), "bots");
        assert!(events.get("greet").await.is_ok());
        let bots: Api<Bot> = Api::namespaced(store, "default");
        assert!(bots.get("echo").await.is_ok());
    }

    #[test]
    fn test_document_leads_with_api_version_and_kind() {
        let binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        let text = to_document(&binding).unwrap();
        assert!(text.starts_with("apiVersion: line.you/v1alpha1\nkind: EventBinding\n"));

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, vec![ManifestObject::EventBinding(binding)]);
    }
}
