//! Entity model: node/edge kinds, their registry, and stored instances.

mod declaration;
mod instance;
mod kind;
pub mod naming;
mod registry;

pub use declaration::{GraphDeclaration, KindDeclaration, ModelDeclaration};
pub use instance::{Document, EntityInstance, RelatedEntity};
pub use kind::{
    Cardinality, EDGE_FIELDS, EndpointConstraints, EntityKind, ExtraAttribute, FieldDef,
    FieldType, Index, IndexType, KindConfig, KindTag, RelationshipSpec, SYSTEM_FIELDS, SortSpec,
};
pub use registry::Registry;
