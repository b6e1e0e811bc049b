//! Model schema loading.
//!
//! The server reads its model definitions from a JSON file at startup
//! and registers them with the model registry. A schema file looks like:
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "Book",
//!       "attributes": [
//!         { "name": "title" },
//!         { "name": "year", "required": false }
//!       ],
//!       "relationships": [
//!         {
//!           "name": "author",
//!           "target": "Author",
//!           "cross_reference": "books"
//!         }
//!       ],
//!       "constants": { "shelf": "fiction" }
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use strata_model::{AttributeDef, ModelDef, ModelRegistry, RelationshipDef};
use strata_proto::Value;

use crate::error::Error;

/// Top-level schema file contents.
#[derive(Debug, Deserialize)]
pub struct SchemaFile {
    /// Model definitions to register.
    pub models: Vec<ModelSpec>,
}

/// One model definition.
#[derive(Debug, Deserialize)]
pub struct ModelSpec {
    /// Model class name.
    pub name: String,
    /// Typed attribute declarations.
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    /// Relationship declarations.
    #[serde(default)]
    pub relationships: Vec<RelationshipSpec>,
    /// Class-level constants by name.
    #[serde(default)]
    pub constants: serde_json::Map<String, serde_json::Value>,
}

/// One attribute declaration.
#[derive(Debug, Deserialize)]
pub struct AttributeSpec {
    /// Attribute name.
    pub name: String,
    /// Whether a value must be supplied at construction.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Whether this attribute mirrors the row identifier.
    #[serde(default)]
    pub identifier: bool,
    /// Default value applied when the attribute is omitted.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// One relationship declaration.
#[derive(Debug, Deserialize)]
pub struct RelationshipSpec {
    /// Relationship name.
    pub name: String,
    /// Target model class name.
    pub target: String,
    /// Whether this relationship holds a sequence of objects.
    #[serde(default)]
    pub many: bool,
    /// Whether a single-valued relationship must be supplied.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Column on the target maintained as a reverse reference.
    #[serde(default)]
    pub cross_reference: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Load a schema file from disk.
pub fn load_schema(path: impl AsRef<Path>) -> Result<SchemaFile, Error> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::Config(format!("invalid schema file: {}", e)))
}

/// Register every model in the schema file with the registry.
pub fn register_models(schema: &SchemaFile, registry: &ModelRegistry) -> Result<(), Error> {
    for spec in &schema.models {
        let def = build_model(spec)?;
        tracing::info!(
            model = def.name(),
            table = def.table_name(),
            attributes = def.attributes().len(),
            relationships = def.relationships().len(),
            "registered model"
        );
        registry.register(def);
    }
    Ok(())
}

fn build_model(spec: &ModelSpec) -> Result<ModelDef, Error> {
    let mut builder = ModelDef::builder(&spec.name);

    for attr in &spec.attributes {
        let mut def = if attr.required {
            AttributeDef::new(&attr.name)
        } else {
            AttributeDef::optional(&attr.name)
        };
        if let Some(default) = &attr.default {
            def = def.with_default(json_to_value(default)?);
        }
        if attr.identifier {
            def = def.identifier();
        }
        builder = builder.attribute(def);
    }

    for rel in &spec.relationships {
        let mut def = if rel.many {
            RelationshipDef::many(&rel.name, &rel.target)
        } else {
            RelationshipDef::one(&rel.name, &rel.target)
        };
        if !rel.many && !rel.required {
            def = def.optional();
        }
        if let Some(column) = &rel.cross_reference {
            def = def.with_cross_reference(column);
        }
        builder = builder.relationship(def);
    }

    for (name, json) in &spec.constants {
        builder = builder.constant(name.clone(), json_to_value(json)?);
    }

    Ok(builder.build()?)
}

/// Convert a JSON default into a stored value.
fn json_to_value(json: &serde_json::Value) -> Result<Value, Error> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(Error::Config(format!("unsupported number: {}", n)))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Array(items) => {
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_json::Value::String(s) => strings.push(s.clone()),
                    other => {
                        return Err(Error::Config(format!(
                            "array defaults may only contain strings, got: {}",
                            other
                        )))
                    }
                }
            }
            Ok(Value::StringArray(strings))
        }
        serde_json::Value::Object(_) => {
            Err(Error::Config("object defaults are not supported".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
    {
        "models": [
            {
                "name": "Author",
                "attributes": [{ "name": "name" }],
                "relationships": [
                    { "name": "books", "target": "Book", "many": true }
                ]
            },
            {
                "name": "Book",
                "attributes": [
                    { "name": "title" },
                    { "name": "year", "required": false },
                    { "name": "published", "default": false }
                ],
                "relationships": [
                    {
                        "name": "author",
                        "target": "Author",
                        "required": false,
                        "cross_reference": "books"
                    }
                ],
                "constants": { "shelf": "fiction", "max_loans": 3 }
            }
        ]
    }
    "#;

    #[test]
    fn test_parse_and_register() {
        let schema: SchemaFile = serde_json::from_str(SCHEMA).unwrap();
        let registry = ModelRegistry::new();
        register_models(&schema, &registry).unwrap();

        assert!(registry.contains("Author"));
        assert!(registry.contains("Book"));

        let book = registry.get("Book").unwrap();
        assert_eq!(book.table_name(), "book");
        assert!(book.attribute("title").unwrap().required);
        assert!(!book.attribute("year").unwrap().required);
        assert_eq!(
            book.attribute("published").unwrap().default,
            Some(Value::Bool(false))
        );

        let author_rel = book.relationship("author").unwrap();
        assert!(!author_rel.required);
        assert_eq!(author_rel.cross_reference.as_deref(), Some("books"));

        assert_eq!(
            book.constant("shelf"),
            Some(&Value::String("fiction".into()))
        );
        assert_eq!(book.constant("max_loans"), Some(&Value::Int64(3)));
        assert!(book.constant("missing").is_none());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let spec = ModelSpec {
            name: "Bad".into(),
            attributes: vec![
                AttributeSpec {
                    name: "field".into(),
                    required: true,
                    identifier: false,
                    default: None,
                },
                AttributeSpec {
                    name: "field".into(),
                    required: false,
                    identifier: false,
                    default: None,
                },
            ],
            relationships: vec![],
            constants: Default::default(),
        };

        assert!(build_model(&spec).is_err());
    }

    #[test]
    fn test_invalid_json_default() {
        let json = serde_json::json!({ "nested": true });
        assert!(json_to_value(&json).is_err());
    }
}
