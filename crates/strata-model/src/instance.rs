//! Model instances and constructor validation.

use crate::error::ModelError;
use crate::registry::ModelRegistry;
use crate::schema::{Cardinality, ModelDef};
use std::collections::HashMap;
use std::sync::Arc;
use strata_proto::{CapabilityToken, ObjectData, RelationValue, Value};

/// A constructor argument for one named member.
#[derive(Debug, Clone)]
pub enum FieldArg {
    /// An attribute value.
    Value(Value),
    /// A single-valued relationship, explicitly `None` when unresolved.
    One(Option<Instance>),
    /// A many-valued relationship.
    Many(Vec<Instance>),
}

impl From<Value> for FieldArg {
    fn from(v: Value) -> Self {
        FieldArg::Value(v)
    }
}

/// A relationship slot on an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// A single related object, absent when unset or depth-limited.
    One(Option<Box<Instance>>),
    /// A sequence of related objects.
    Many(Vec<Instance>),
}

/// An instance of a registered model.
///
/// Constructed through [`Instance::new`], which validates the provided
/// fields against the definition. The `uid` is never a constructor field;
/// the persistence layer assigns it at first save.
#[derive(Debug, Clone)]
pub struct Instance {
    def: Arc<ModelDef>,
    uid: Option<String>,
    attributes: HashMap<String, Value>,
    relationships: HashMap<String, Relation>,
    update_capability: Option<CapabilityToken>,
    delete_capability: Option<CapabilityToken>,
}

/// Instances compare equal when they share a class name and identifier.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.def.name() == other.def.name() && self.uid == other.uid
    }
}

impl Instance {
    /// Construct and validate an instance from named fields.
    ///
    /// Fails with [`ModelError::Validation`] on unknown field names, members
    /// provided with the wrong shape, or missing required members. Omitted
    /// optional attributes take their declared default; omitted
    /// relationships stay unset or empty.
    pub fn new(def: Arc<ModelDef>, fields: Vec<(String, FieldArg)>) -> Result<Self, ModelError> {
        let mut attributes = HashMap::new();
        let mut relationships = HashMap::new();

        for (name, arg) in fields {
            if let Some(attr) = def.attribute(&name) {
                match arg {
                    FieldArg::Value(v) => {
                        attributes.insert(attr.name.clone(), v);
                    }
                    _ => {
                        return Err(ModelError::Validation(format!(
                            "attribute '{}' of '{}' expects a value",
                            name,
                            def.name()
                        )));
                    }
                }
            } else if let Some(rel) = def.relationship(&name) {
                let relation = match (rel.cardinality, arg) {
                    (Cardinality::One, FieldArg::One(inner)) => {
                        Relation::One(inner.map(Box::new))
                    }
                    (Cardinality::Many, FieldArg::Many(items)) => Relation::Many(items),
                    _ => {
                        return Err(ModelError::Validation(format!(
                            "relationship '{}' of '{}' has the wrong cardinality",
                            name,
                            def.name()
                        )));
                    }
                };
                relationships.insert(rel.name.clone(), relation);
            } else {
                return Err(ModelError::Validation(format!(
                    "unknown field '{}' for model '{}'",
                    name,
                    def.name()
                )));
            }
        }

        for attr in def.attributes() {
            if attributes.contains_key(&attr.name) {
                continue;
            }
            // The identifier is system-assigned, never a constructor field.
            if attr.identifier {
                continue;
            }
            if attr.required {
                return Err(ModelError::Validation(format!(
                    "missing required attribute '{}' for model '{}'",
                    attr.name,
                    def.name()
                )));
            }
            let value = attr.default.clone().unwrap_or(Value::Null);
            attributes.insert(attr.name.clone(), value);
        }

        for rel in def.relationships() {
            if relationships.contains_key(&rel.name) {
                continue;
            }
            if rel.required {
                return Err(ModelError::Validation(format!(
                    "missing required relationship '{}' for model '{}'",
                    rel.name,
                    def.name()
                )));
            }
            let relation = match rel.cardinality {
                Cardinality::One => Relation::One(None),
                Cardinality::Many => Relation::Many(Vec::new()),
            };
            relationships.insert(rel.name.clone(), relation);
        }

        Ok(Self {
            def,
            uid: None,
            attributes,
            relationships,
            update_capability: None,
            delete_capability: None,
        })
    }

    /// The model definition this instance was built from.
    pub fn def(&self) -> &Arc<ModelDef> {
        &self.def
    }

    /// The model class name.
    pub fn class_name(&self) -> &str {
        self.def.name()
    }

    /// The assigned identifier, `None` before first save.
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    /// Assign the identifier. Used by the persistence layer.
    pub fn set_uid(&mut self, uid: impl Into<String>) {
        self.uid = Some(uid.into());
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Result<&Value, ModelError> {
        self.attributes.get(name).ok_or_else(|| {
            ModelError::Validation(format!(
                "'{}' is not an attribute of model '{}'",
                name,
                self.def.name()
            ))
        })
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ModelError> {
        if self.def.attribute(name).is_none() {
            return Err(ModelError::Validation(format!(
                "'{}' is not an attribute of model '{}'",
                name,
                self.def.name()
            )));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Get a relationship slot.
    pub fn relation(&self, name: &str) -> Result<&Relation, ModelError> {
        self.relationships.get(name).ok_or_else(|| {
            ModelError::Validation(format!(
                "'{}' is not a relationship of model '{}'",
                name,
                self.def.name()
            ))
        })
    }

    /// Set a relationship slot, checking the declared cardinality.
    pub fn set_relation(&mut self, name: &str, relation: Relation) -> Result<(), ModelError> {
        let rel = self.def.relationship(name).ok_or_else(|| {
            ModelError::Validation(format!(
                "'{}' is not a relationship of model '{}'",
                name,
                self.def.name()
            ))
        })?;
        match (&relation, rel.cardinality) {
            (Relation::One(_), Cardinality::One) | (Relation::Many(_), Cardinality::Many) => {}
            _ => {
                return Err(ModelError::Validation(format!(
                    "relationship '{}' of '{}' has the wrong cardinality",
                    name,
                    self.def.name()
                )));
            }
        }
        self.relationships.insert(name.to_string(), relation);
        Ok(())
    }

    /// Get a class-level constant.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.def.constant(name)
    }

    /// Token authorizing updates, when the read granted one.
    pub fn update_capability(&self) -> Option<&CapabilityToken> {
        self.update_capability.as_ref()
    }

    /// Token authorizing deletion, when the read granted one.
    pub fn delete_capability(&self) -> Option<&CapabilityToken> {
        self.delete_capability.as_ref()
    }

    /// Attach mutation capability tokens.
    pub fn set_capabilities(
        &mut self,
        update: Option<CapabilityToken>,
        delete: Option<CapabilityToken>,
    ) {
        self.update_capability = update;
        self.delete_capability = delete;
    }

    /// Serialize to the wire form, recursing through relationships.
    pub fn to_object_data(&self) -> ObjectData {
        let attributes = self
            .def
            .attributes()
            .iter()
            .filter_map(|attr| {
                self.attributes
                    .get(&attr.name)
                    .map(|v| (attr.name.clone(), v.clone()))
            })
            .collect();

        let relationships = self
            .def
            .relationships()
            .iter()
            .filter_map(|rel| {
                self.relationships.get(&rel.name).map(|relation| {
                    let value = match relation {
                        Relation::One(inner) => RelationValue::One(
                            inner.as_ref().map(|i| Box::new(i.to_object_data())),
                        ),
                        Relation::Many(items) => {
                            RelationValue::Many(items.iter().map(|i| i.to_object_data()).collect())
                        }
                    };
                    (rel.name.clone(), value)
                })
            })
            .collect();

        ObjectData {
            class_name: self.def.name().to_string(),
            uid: self.uid.clone(),
            attributes,
            relationships,
            update_capability: self.update_capability.clone(),
            delete_capability: self.delete_capability.clone(),
        }
    }

    /// Rebuild an instance from its wire form.
    ///
    /// Every nested object's class must be registered; constructor
    /// validation is re-run at each level.
    pub fn from_object_data(
        registry: &ModelRegistry,
        data: &ObjectData,
    ) -> Result<Self, ModelError> {
        let def = registry
            .get(&data.class_name)
            .ok_or_else(|| ModelError::UnknownModel(data.class_name.clone()))?;

        let mut fields: Vec<(String, FieldArg)> = data
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), FieldArg::Value(value.clone())))
            .collect();

        for (name, relation) in &data.relationships {
            let arg = match relation {
                RelationValue::One(inner) => FieldArg::One(match inner {
                    Some(obj) => Some(Self::from_object_data(registry, obj)?),
                    None => None,
                }),
                RelationValue::Many(items) => FieldArg::Many(
                    items
                        .iter()
                        .map(|obj| Self::from_object_data(registry, obj))
                        .collect::<Result<_, _>>()?,
                ),
            };
            fields.push((name.clone(), arg));
        }

        let mut instance = Self::new(def, fields)?;
        if let Some(uid) = &data.uid {
            instance.set_uid(uid.clone());
        }
        instance.update_capability = data.update_capability.clone();
        instance.delete_capability = data.delete_capability.clone();
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDef, RelationshipDef};

    fn book_def() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::builder("Book")
                .attribute(AttributeDef::new("title"))
                .attribute(AttributeDef::optional("subtitle"))
                .attribute(AttributeDef::new("pages").with_default(0i64))
                .relationship(RelationshipDef::one("author", "Author").optional())
                .relationship(RelationshipDef::many("chapters", "Chapter"))
                .build()
                .unwrap(),
        )
    }

    fn author_def() -> Arc<ModelDef> {
        Arc::new(
            ModelDef::builder("Author")
                .attribute(AttributeDef::new("name"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_constructor_applies_defaults() {
        let book = Instance::new(book_def(), vec![("title".into(), Value::from("Dune").into())])
            .unwrap();

        assert_eq!(book.get("title").unwrap(), &Value::String("Dune".into()));
        assert_eq!(book.get("subtitle").unwrap(), &Value::Null);
        assert_eq!(book.get("pages").unwrap(), &Value::Int64(0));
        assert_eq!(book.relation("author").unwrap(), &Relation::One(None));
        assert_eq!(book.relation("chapters").unwrap(), &Relation::Many(vec![]));
        assert!(book.uid().is_none());
    }

    #[test]
    fn test_constructor_rejects_unknown_field() {
        let result = Instance::new(
            book_def(),
            vec![
                ("title".into(), Value::from("Dune").into()),
                ("publisher".into(), Value::from("Chilton").into()),
            ],
        );
        assert!(matches!(result, Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_constructor_rejects_missing_required() {
        let result = Instance::new(book_def(), vec![]);
        assert!(matches!(result, Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_constructor_rejects_uid_field() {
        let result = Instance::new(
            book_def(),
            vec![
                ("title".into(), Value::from("Dune").into()),
                ("uid".into(), Value::from("abc").into()),
            ],
        );
        assert!(matches!(result, Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_constructor_rejects_wrong_cardinality() {
        let author =
            Instance::new(author_def(), vec![("name".into(), Value::from("Frank").into())])
                .unwrap();
        let result = Instance::new(
            book_def(),
            vec![
                ("title".into(), Value::from("Dune").into()),
                ("author".into(), FieldArg::Many(vec![author])),
            ],
        );
        assert!(matches!(result, Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_equality_by_class_and_uid() {
        let def = book_def();
        let mut a = Instance::new(
            Arc::clone(&def),
            vec![("title".into(), Value::from("Dune").into())],
        )
        .unwrap();
        let mut b = Instance::new(
            Arc::clone(&def),
            vec![("title".into(), Value::from("Messiah").into())],
        )
        .unwrap();

        a.set_uid("u1");
        b.set_uid("u1");
        // Same class and uid, attribute values do not matter
        assert_eq!(a, b);

        b.set_uid("u2");
        assert_ne!(a, b);

        let mut c = Instance::new(author_def(), vec![("name".into(), Value::from("X").into())])
            .unwrap();
        c.set_uid("u1");
        assert_ne!(a, c);
    }

    #[test]
    fn test_accessor_validation() {
        let mut book =
            Instance::new(book_def(), vec![("title".into(), Value::from("Dune").into())])
                .unwrap();

        assert!(book.get("nope").is_err());
        assert!(book.set("nope", "x").is_err());
        assert!(book.relation("nope").is_err());
        assert!(book
            .set_relation("author", Relation::Many(vec![]))
            .is_err());

        book.set("subtitle", "A novel").unwrap();
        assert_eq!(
            book.get("subtitle").unwrap(),
            &Value::String("A novel".into())
        );
    }

    #[test]
    fn test_object_data_roundtrip() {
        let registry = ModelRegistry::new();
        registry.register(Arc::try_unwrap(book_def()).unwrap());
        registry.register(Arc::try_unwrap(author_def()).unwrap());

        let author = Instance::new(
            registry.get("Author").unwrap(),
            vec![("name".into(), Value::from("Frank Herbert").into())],
        )
        .unwrap();
        let mut book = Instance::new(
            registry.get("Book").unwrap(),
            vec![
                ("title".into(), Value::from("Dune").into()),
                ("author".into(), FieldArg::One(Some(author))),
            ],
        )
        .unwrap();
        book.set_uid("b1");

        let data = book.to_object_data();
        assert_eq!(data.class_name, "Book");
        assert_eq!(data.uid.as_deref(), Some("b1"));

        let rebuilt = Instance::from_object_data(&registry, &data).unwrap();
        assert_eq!(rebuilt, book);
        match rebuilt.relation("author").unwrap() {
            Relation::One(Some(author)) => {
                assert_eq!(
                    author.get("name").unwrap(),
                    &Value::String("Frank Herbert".into())
                );
            }
            other => panic!("unexpected relation: {other:?}"),
        }
    }

    #[test]
    fn test_from_object_data_unknown_model() {
        let registry = ModelRegistry::new();
        let data = ObjectData::new("Ghost");
        let result = Instance::from_object_data(&registry, &data);
        assert!(matches!(result, Err(ModelError::UnknownModel(_))));
    }
}
