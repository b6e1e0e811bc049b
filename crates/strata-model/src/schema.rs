//! Model definitions and the registration builder.

use crate::error::ModelError;
use strata_proto::Value;

/// A typed attribute declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    /// Attribute name (unique within the model).
    pub name: String,
    /// Whether the constructor requires a value.
    pub required: bool,
    /// Value used when an optional attribute is omitted.
    pub default: Option<Value>,
    /// Marks this attribute as the model's unique identifier.
    pub identifier: bool,
}

impl AttributeDef {
    /// Create a required attribute with no default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
            identifier: false,
        }
    }

    /// Create an optional attribute.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: None,
            identifier: false,
        }
    }

    /// Set the default value, making the attribute optional.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    /// Flag this attribute as the unique identifier.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }
}

/// Relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one related object.
    One,
    /// A sequence of related objects.
    Many,
}

/// A typed relationship declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDef {
    /// Relationship name (unique within the model).
    pub name: String,
    /// Target model class name.
    pub target: String,
    /// Whether the constructor requires a value.
    pub required: bool,
    /// One or many related objects.
    pub cardinality: Cardinality,
    /// Column on the target model that mirrors this link, if any.
    ///
    /// When set on a single-valued relationship, saving an object appends
    /// its uid to the named link-set column on the related row.
    pub cross_reference: Option<String>,
}

impl RelationshipDef {
    /// Create a required single-valued relationship.
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            required: true,
            cardinality: Cardinality::One,
            cross_reference: None,
        }
    }

    /// Create a many-valued relationship, defaulting to an empty sequence.
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            required: false,
            cardinality: Cardinality::Many,
            cross_reference: None,
        }
    }

    /// Make the relationship optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Maintain a denormalized link-set column on the target model.
    pub fn with_cross_reference(mut self, column: impl Into<String>) -> Self {
        self.cross_reference = Some(column.into());
        self
    }
}

/// Which kind of member a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// A declared attribute.
    Attribute,
    /// A declared relationship.
    Relationship,
    /// A class-level constant.
    Constant,
}

/// A complete model definition.
///
/// Built through [`ModelBuilder`], which validates the declaration set and
/// resolves the identifier field. Registered definitions are immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    name: String,
    table_name: String,
    identifier: String,
    attributes: Vec<AttributeDef>,
    relationships: Vec<RelationshipDef>,
    constants: Vec<(String, Value)>,
}

impl ModelDef {
    /// Start building a model definition.
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// The model class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing table name, derived from the class name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The resolved identifier field name.
    ///
    /// `"uid"` unless exactly one attribute carries the identifier flag.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// Declared relationships in declaration order.
    pub fn relationships(&self) -> &[RelationshipDef] {
        &self.relationships
    }

    /// Get an attribute declaration by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a relationship declaration by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Get a class-level constant by name.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Classify a member name.
    pub fn member_kind(&self, name: &str) -> Option<MemberKind> {
        if self.attribute(name).is_some() {
            Some(MemberKind::Attribute)
        } else if self.relationship(name).is_some() {
            Some(MemberKind::Relationship)
        } else if self.constant(name).is_some() {
            Some(MemberKind::Constant)
        } else {
            None
        }
    }
}

/// Builder for [`ModelDef`].
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    name: String,
    attributes: Vec<AttributeDef>,
    relationships: Vec<RelationshipDef>,
    constants: Vec<(String, Value)>,
}

impl ModelBuilder {
    /// Add an attribute declaration.
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a relationship declaration.
    pub fn relationship(mut self, relationship: RelationshipDef) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Add a class-level constant.
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constants.push((name.into(), value.into()));
        self
    }

    /// Validate the declarations and produce the definition.
    ///
    /// Fails with [`ModelError::Configuration`] on duplicate member names
    /// or more than one identifier-flagged attribute.
    pub fn build(self) -> Result<ModelDef, ModelError> {
        let mut seen: Vec<&str> = Vec::new();
        for name in self
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.relationships.iter().map(|r| r.name.as_str()))
            .chain(self.constants.iter().map(|(n, _)| n.as_str()))
        {
            if seen.contains(&name) {
                return Err(ModelError::Configuration(format!(
                    "duplicate member name '{}' in model '{}'",
                    name, self.name
                )));
            }
            seen.push(name);
        }

        let mut flagged = self.attributes.iter().filter(|a| a.identifier);
        let identifier = match (flagged.next(), flagged.next()) {
            (None, _) => "uid".to_string(),
            (Some(attr), None) => attr.name.clone(),
            (Some(_), Some(_)) => {
                return Err(ModelError::Configuration(format!(
                    "model '{}' declares more than one identifier attribute",
                    self.name
                )));
            }
        };

        let table_name = camel_to_snake(&self.name);

        Ok(ModelDef {
            name: self.name,
            table_name,
            identifier,
            attributes: self.attributes,
            relationships: self.relationships,
            constants: self.constants,
        })
    }
}

/// Convert a CamelCase class name to a snake_case table name.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_builder() {
        let def = ModelDef::builder("Book")
            .attribute(AttributeDef::new("title"))
            .attribute(AttributeDef::optional("subtitle"))
            .attribute(AttributeDef::new("pages").with_default(0i64))
            .relationship(RelationshipDef::one("author", "Author"))
            .constant("shelf", "fiction")
            .build()
            .unwrap();

        assert_eq!(def.name(), "Book");
        assert_eq!(def.table_name(), "book");
        assert_eq!(def.identifier(), "uid");
        assert_eq!(def.attributes().len(), 3);
        assert!(def.attribute("title").unwrap().required);
        assert!(!def.attribute("pages").unwrap().required);
        assert_eq!(def.constant("shelf"), Some(&Value::String("fiction".into())));
        assert_eq!(def.member_kind("author"), Some(MemberKind::Relationship));
        assert_eq!(def.member_kind("missing"), None);
    }

    #[test]
    fn test_identifier_resolution() {
        // No flagged attribute: identifier defaults to uid
        let def = ModelDef::builder("Book")
            .attribute(AttributeDef::new("title"))
            .build()
            .unwrap();
        assert_eq!(def.identifier(), "uid");

        // Exactly one flagged attribute: that name wins
        let def = ModelDef::builder("Book")
            .attribute(AttributeDef::new("isbn").identifier())
            .attribute(AttributeDef::new("title"))
            .build()
            .unwrap();
        assert_eq!(def.identifier(), "isbn");
    }

    #[test]
    fn test_multiple_identifiers_rejected() {
        let result = ModelDef::builder("Book")
            .attribute(AttributeDef::new("isbn").identifier())
            .attribute(AttributeDef::new("slug").identifier())
            .build();

        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let result = ModelDef::builder("Book")
            .attribute(AttributeDef::new("title"))
            .relationship(RelationshipDef::one("title", "Author"))
            .build();

        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("Book"), "book");
        assert_eq!(camel_to_snake("BookAuthor"), "book_author");
        assert_eq!(camel_to_snake("HTTPServer"), "h_t_t_p_server");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_cross_reference_builder() {
        let rel = RelationshipDef::one("author", "Author").with_cross_reference("books");
        assert_eq!(rel.cross_reference.as_deref(), Some("books"));
        assert_eq!(rel.cardinality, Cardinality::One);

        let rel = RelationshipDef::many("chapters", "Chapter");
        assert_eq!(rel.cardinality, Cardinality::Many);
        assert!(!rel.required);
    }
}
