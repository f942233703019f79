use crate::NodeCategory;
use crate::intake::parse_lenient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// One entry of the catalog of actions available to a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Title → category lookup used to pick the rendering category of
/// `ability` steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbilityCatalog {
    categories: HashMap<String, NodeCategory>,
}

impl AbilityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later abilities with the same title replace earlier ones.
    pub fn from_abilities(abilities: &[Ability]) -> Self {
        abilities
            .iter()
            .map(|a| (a.title.clone(), a.kind.clone()))
            .collect()
    }

    /// Build a catalog from either an array of abilities or a plain
    /// `{"title": "type"}` object. Malformed array entries are skipped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(raw) => {
                let (abilities, warnings) = parse_lenient::<Ability>(raw);
                for warning in &warnings {
                    warn!("Ability {}", warning);
                }
                Self::from_abilities(&abilities)
            }
            Value::Object(map) => map
                .iter()
                .filter_map(|(title, kind)| Some((title.clone(), kind.as_str()?.to_string())))
                .collect(),
            _ => Self::default(),
        }
    }

    pub fn insert(&mut self, title: impl Into<String>, kind: impl Into<String>) {
        let kind = kind.into();
        let title = title.into();
        if kind.is_empty() {
            self.categories.remove(&title);
        } else {
            self.categories.insert(title, NodeCategory::from(kind));
        }
    }

    /// Category for an ability title. Unknown titles yield `None`.
    pub fn category_for(&self, title: &str) -> Option<&NodeCategory> {
        self.categories.get(title)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl FromIterator<(String, String)> for AbilityCatalog {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (title, kind) in iter {
            catalog.insert(title, kind);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_from_ability_array() {
        let catalog = AbilityCatalog::from_value(&json!([
            {"title": "Send Email", "type": "action", "description": "Sends mail"},
            {"title": "Research Agent", "type": "agent"},
            {"type": "action"}
        ]));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.category_for("Send Email"), Some(&NodeCategory::Action));
        assert_eq!(catalog.category_for("Research Agent"), Some(&NodeCategory::Agent));
        assert_eq!(catalog.category_for("Missing"), None);
    }

    #[test]
    fn test_catalog_from_plain_map() {
        let catalog = AbilityCatalog::from_value(&json!({
            "Slack Post": "integration",
            "Broken": 3
        }));
        assert_eq!(
            catalog.category_for("Slack Post"),
            Some(&NodeCategory::Custom("integration".to_string()))
        );
        assert_eq!(catalog.category_for("Broken"), None);
    }

    #[test]
    fn test_later_duplicate_title_wins() {
        let catalog = AbilityCatalog::from_abilities(&[
            Ability {
                title: "Lookup".to_string(),
                kind: "action".to_string(),
                description: None,
            },
            Ability {
                title: "Lookup".to_string(),
                kind: "agent".to_string(),
                description: None,
            },
        ]);
        assert_eq!(catalog.category_for("Lookup"), Some(&NodeCategory::Agent));
    }

    #[test]
    fn test_empty_type_is_treated_as_unknown() {
        let catalog: AbilityCatalog = vec![("Noop".to_string(), String::new())]
            .into_iter()
            .collect();
        assert!(catalog.is_empty());
        assert_eq!(catalog.category_for("Noop"), None);
    }
}
