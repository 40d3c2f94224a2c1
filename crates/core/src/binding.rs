//! EventBinding: the routing table a running bot loads its rules from.
//!
//! Subsets are keyed by the name of the Event they came from. The mutation
//! helpers here keep at most one subset per source Event name.

use serde::{Deserialize, Serialize};

use crate::event::Message;
use crate::impl_resource;
use crate::kind::Kind;
use crate::meta::ObjectMeta;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBinding {
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsets: Vec<EventBindingSubset>,
}

impl_resource!(EventBinding, Kind::EventBinding);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBindingSubset {
    #[serde(default)]
    pub binding: Binding,
}

impl EventBindingSubset {
    /// Name of the Event this subset was built from.
    pub fn source(&self) -> &str {
        &self.binding.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl EventBinding {
    /// An empty binding.
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            subsets: Vec::new(),
        }
    }

    /// The subset sourced from Event `name`, if any.
    pub fn subset_named(&self, name: &str) -> Option<&EventBindingSubset> {
        self.subsets.iter().find(|s| s.source() == name)
    }

    /// Whether an identical subset is present.
    pub fn contains(&self, subset: &EventBindingSubset) -> bool {
        self.subsets.contains(subset)
    }

    /// Drop every subset sourced from Event `name`. Returns whether any was removed.
    pub fn remove_subset(&mut self, name: &str) -> bool {
        let before = self.subsets.len();
        self.subsets.retain(|s| s.source() != name);
        self.subsets.len() != before
    }

    /// Remove any subset with the same source and append `subset`.
    pub fn replace_subset(&mut self, subset: EventBindingSubset) {
        self.remove_subset(subset.source());
        self.subsets.push(subset);
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn subset(name: &str, reply: &str) -> EventBindingSubset {
        EventBindingSubset {
            binding: Binding {
                name: name.to_string(),
                event_type: "message".to_string(),
                messages: vec![Message::text(["hi"], reply)],
            },
        }
    }

    #[test]
    fn test_replace_keeps_one_subset_per_source() {
        let mut binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        binding.replace_subset(subset("greet", "hello"));
        binding.replace_subset(subset("bye", "ciao"));
        binding.replace_subset(subset("greet", "hey"));

        assert_eq!(binding.subsets.len(), 2);
        assert_eq!(
            binding.subset_named("greet").map(|s| s.binding.messages[0].reply.as_str()),
            Some("hey")
        );
        // Replaced subset moves to the end.
        assert_eq!(binding.subsets[1].source(), "greet");
    }

    #[test]
    fn test_remove_reports_change() {
        let mut binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        assert!(!binding.remove_subset("greet"));

        binding.replace_subset(subset("greet", "hello"));
        assert!(binding.remove_subset("greet"));
        assert!(binding.subsets.is_empty());
    }

    #[test]
    fn test_contains_is_full_value_equality() {
        let mut binding = EventBinding::new(ObjectMeta::new("b1", "default"));
        binding.replace_subset(subset("greet", "hello"));

        assert!(binding.contains(&subset("greet", "hello")));
        assert!(!binding.contains(&subset("greet", "hey")));
    }
}
