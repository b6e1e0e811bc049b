//! Model layer for Strata.
//!
//! Applications declare their models through [`ModelDef::builder`], register
//! them with a [`ModelRegistry`], and work with validated [`Instance`]
//! objects. The same definitions drive both the client surface and the
//! server's row marshalling.
//!
//! # Example
//!
//! ```
//! use strata_model::{AttributeDef, Instance, ModelDef, ModelRegistry, RelationshipDef};
//!
//! let registry = ModelRegistry::new();
//! registry.register(
//!     ModelDef::builder("Book")
//!         .attribute(AttributeDef::new("title"))
//!         .relationship(RelationshipDef::one("author", "Author").optional())
//!         .build()
//!         .unwrap(),
//! );
//!
//! let book = Instance::new(
//!     registry.get("Book").unwrap(),
//!     vec![("title".into(), strata_proto::Value::from("Dune").into())],
//! )
//! .unwrap();
//! assert!(book.uid().is_none());
//! ```

pub mod error;
pub mod instance;
pub mod registry;
pub mod schema;

pub use error::ModelError;
pub use instance::{FieldArg, Instance, Relation};
pub use registry::ModelRegistry;
pub use schema::{
    camel_to_snake, AttributeDef, Cardinality, MemberKind, ModelBuilder, ModelDef, RelationshipDef,
};
