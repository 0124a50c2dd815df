//! Document schemas.
//!
//! A schema decides which elements may nest, which attributes and values an
//! element may carry, what text it may contain and which child it must
//! start with. [`NoSchema`] permits everything. [`SchemaDefinition`] is a
//! schema declared as data and loaded with serde.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermittedCharacters {
    #[default]
    None,
    /// Text without control, bidi or deprecated format code points.
    BlipText,
    Any,
}

/// Constraints queried while validating. `None` as a parent means the top
/// level of the document.
pub trait DocumentSchema {
    fn permits_child(&self, parent: Option<&str>, child: &str) -> bool;

    fn permits_attribute(&self, element_type: &str, name: &str, value: &str) -> bool;

    fn permitted_characters(&self, element_type: Option<&str>) -> PermittedCharacters;

    /// The element type every `parent` must start with, if any.
    fn required_first_child(&self, parent: Option<&str>) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl DocumentSchema for NoSchema {
    fn permits_child(&self, _parent: Option<&str>, _child: &str) -> bool {
        true
    }

    fn permits_attribute(&self, _element_type: &str, _name: &str, _value: &str) -> bool {
        true
    }

    fn permitted_characters(&self, _element_type: Option<&str>) -> PermittedCharacters {
        PermittedCharacters::Any
    }

    fn required_first_child(&self, _parent: Option<&str>) -> Option<&str> {
        None
    }
}

// ── SchemaDefinition ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("element type {child} is permitted inside {parent} but never declared")]
    UndeclaredElement { parent: String, child: String },
    #[error("{parent} requires first child {child}, which it does not permit")]
    RequiredChildNotPermitted { parent: String, child: String },
}

/// Rules for one element type, or for the top level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElementRules {
    pub children: Vec<String>,
    /// Permitted attribute names. An empty list allows any value.
    pub attributes: IndexMap<String, Vec<String>>,
    pub characters: PermittedCharacters,
    pub required_first_child: Option<String>,
}

impl ElementRules {
    fn permits_attribute(&self, name: &str, value: &str) -> bool {
        match self.attributes.get(name) {
            None => false,
            Some(values) => values.is_empty() || values.iter().any(|v| v == value),
        }
    }
}

/// ```
/// use wave_model::automaton::{DocumentSchema, SchemaDefinition};
///
/// let schema = SchemaDefinition::from_json(r#"{
///     "top_level": { "children": ["body"], "required_first_child": "body" },
///     "elements": {
///         "body": { "children": ["line"] },
///         "line": { "attributes": { "t": ["h1", "h2"] }, "characters": "blip_text" }
///     }
/// }"#).unwrap();
/// assert!(schema.permits_child(Some("body"), "line"));
/// assert!(!schema.permits_attribute("line", "t", "h9"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaDefinition {
    pub top_level: ElementRules,
    pub elements: IndexMap<String, ElementRules>,
}

impl SchemaDefinition {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: SchemaDefinition = serde_json::from_str(json)?;
        schema.check()?;
        Ok(schema)
    }

    /// Checks that every referenced element type is declared and that every
    /// required first child is a permitted child.
    pub fn check(&self) -> Result<(), SchemaError> {
        let scopes = std::iter::once(("top level", &self.top_level))
            .chain(self.elements.iter().map(|(k, v)| (k.as_str(), v)));
        for (parent, rules) in scopes {
            if let Some(child) = rules.children.iter().find(|c| !self.elements.contains_key(*c)) {
                return Err(SchemaError::UndeclaredElement {
                    parent: parent.to_owned(),
                    child: child.clone(),
                });
            }
            if let Some(required) = &rules.required_first_child {
                if !rules.children.contains(required) {
                    return Err(SchemaError::RequiredChildNotPermitted {
                        parent: parent.to_owned(),
                        child: required.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn rules(&self, element_type: Option<&str>) -> Option<&ElementRules> {
        match element_type {
            None => Some(&self.top_level),
            Some(t) => self.elements.get(t),
        }
    }
}

impl DocumentSchema for SchemaDefinition {
    fn permits_child(&self, parent: Option<&str>, child: &str) -> bool {
        self.rules(parent)
            .is_some_and(|r| r.children.iter().any(|c| c == child))
    }

    fn permits_attribute(&self, element_type: &str, name: &str, value: &str) -> bool {
        self.rules(Some(element_type))
            .is_some_and(|r| r.permits_attribute(name, value))
    }

    fn permitted_characters(&self, element_type: Option<&str>) -> PermittedCharacters {
        self.rules(element_type)
            .map(|r| r.characters)
            .unwrap_or_default()
    }

    fn required_first_child(&self, parent: Option<&str>) -> Option<&str> {
        self.rules(parent)
            .and_then(|r| r.required_first_child.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVERSATION: &str = r#"{
        "top_level": { "children": ["conversation"] },
        "elements": {
            "conversation": { "children": ["blip"], "attributes": { "sort": [] } },
            "blip": { "children": ["body"], "required_first_child": "body" },
            "body": { "characters": "any" }
        }
    }"#;

    #[test]
    fn loads_and_answers_queries() {
        let schema = SchemaDefinition::from_json(CONVERSATION).unwrap();
        assert!(schema.permits_child(None, "conversation"));
        assert!(!schema.permits_child(None, "blip"));
        assert!(schema.permits_attribute("conversation", "sort", "anything"));
        assert!(!schema.permits_attribute("blip", "sort", "x"));
        assert_eq!(schema.required_first_child(Some("blip")), Some("body"));
        assert_eq!(schema.permitted_characters(Some("body")), PermittedCharacters::Any);
        assert_eq!(schema.permitted_characters(None), PermittedCharacters::None);
        assert_eq!(schema.permitted_characters(Some("unknown")), PermittedCharacters::None);
    }

    #[test]
    fn rejects_inconsistent_definitions() {
        let undeclared = r#"{ "top_level": { "children": ["ghost"] } }"#;
        assert!(matches!(
            SchemaDefinition::from_json(undeclared),
            Err(SchemaError::UndeclaredElement { .. })
        ));
        let required = r#"{
            "elements": { "a": { "required_first_child": "a" } }
        }"#;
        assert!(matches!(
            SchemaDefinition::from_json(required),
            Err(SchemaError::RequiredChildNotPermitted { .. })
        ));
        assert!(matches!(
            SchemaDefinition::from_json("{ \"bogus\": 1 }"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn no_schema_permits_everything() {
        assert!(NoSchema.permits_child(None, "x"));
        assert!(NoSchema.permits_attribute("x", "y", "z"));
        assert_eq!(NoSchema.permitted_characters(Some("x")), PermittedCharacters::Any);
        assert_eq!(NoSchema.required_first_child(None), None);
    }
}
