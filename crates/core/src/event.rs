//! User-authored Event rules.

use serde::{Deserialize, Serialize};

use crate::binding::{Binding, EventBindingSubset};
use crate::impl_resource;
use crate::kind::Kind;
use crate::meta::ObjectMeta;
use crate::selector::LabelSelector;

/// A set of reply rules for one event type, targeted at EventBindings by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub metadata: ObjectMeta,
    pub spec: EventSpec,
}

impl_resource!(Event, Kind::Event);

impl Event {
    pub fn new(metadata: ObjectMeta, spec: EventSpec) -> Self {
        Self { metadata, spec }
    }

    /// The routing rule this event contributes to a matching EventBinding.
    pub fn to_subset(&self) -> EventBindingSubset {
        EventBindingSubset {
            binding: Binding {
                name: self.metadata.name.clone(),
                event_type: self.spec.event_type.clone(),
                messages: self.spec.messages.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Matched against EventBinding labels. `None` means the event binds nowhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Channel event type tag, e.g. `message`, `follow`, `postback`.
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// One keyword-triggered reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub reply: String,
}

impl Message {
    /// A text message rule.
    pub fn text<K: Into<String>>(
        keywords: impl IntoIterator<Item = K>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            message_type: "text".to_string(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            reply: reply.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_mirrors_event() {
        let event = Event::new(
            ObjectMeta::new("greet", "default"),
            EventSpec {
                selector: Some(LabelSelector::from_pairs([("app", "chat")])),
                event_type: "message".to_string(),
                messages: vec![Message::text(["hi"], "hello")],
            },
        );

        let subset = event.to_subset();
        assert_eq!(subset.binding.name, "greet");
        assert_eq!(subset.binding.event_type, "message");
        assert_eq!(subset.binding.messages, event.spec.messages);
    }

    #[test]
    fn test_event_manifest_deserializes() {
        let yaml = r"
metadata:
  name: greet
spec:
  selector:
    matchLabels:
      app: chat
  type: message
  messages:
  - type: text
    keywords: [hi, hey]
    reply: hello
";
        let event: Event = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(event.spec.event_type, "message");
        assert_eq!(event.spec.messages.len(), 1);
        assert_eq!(event.spec.messages[0].keywords, vec!["hi", "hey"]);
    }
}
