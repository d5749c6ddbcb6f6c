//! Dynamic GraphQL schema over the materialized kinds.
//!
//! Object types carry [EntityInstance] (kind objects) or [RelatedEntity]
//! (generated item types) as their parent values; connection, edge and
//! page-info objects carry the pagination structs directly.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::Value as GqlValue;
use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, Object, ResolverContext, Scalar, Schema,
    SchemaError, TypeRef,
};
use serde_json::Value;

use super::operations::{EntityOperations, Locator};
use crate::model::naming::{camel_case, pascal_case};
use crate::model::{
    Cardinality, Document, EDGE_FIELDS, EntityInstance, EntityKind, ExtraAttribute,
    RelatedEntity, SYSTEM_FIELDS,
};
use crate::relationship::{
    Connection, Edge, GeneratedType, PageInfo, PageRequest, RelationshipField, Resolved,
    ResultShape, ServingContext,
};

const CUSTOM_SCALARS: &[&str] = &["Date", "DateTime", "Time", "Email", "Password"];
const PAGE_INFO: &str = "PageInfo";

pub(super) fn build_schema(
    kinds: &[Arc<EntityKind>],
    operations: &HashMap<String, Arc<EntityOperations>>,
    relationships: &HashMap<String, Vec<Arc<RelationshipField>>>,
    serving: &ServingContext,
) -> Result<Schema, SchemaError> {
    let mut query = Object::new("Query");
    let mut mutation = Object::new("Mutation");
    let mut objects = Vec::new();
    let mut generated = HashSet::new();
    let mut needs_page_info = false;

    for kind in kinds {
        let rels = relationships_of(relationships, kind.name());
        objects.push(entity_object(kind.name(), kind, rels, &[], serving));

        for rel in rels {
            let ty = rel.result_type(&serving.types);
            if !ty.has_item_type() || !generated.insert(ty.name().to_string()) {
                continue;
            }
            let Some(target) = kinds.iter().find(|k| k.name() == rel.target()) else {
                continue;
            };
            objects.push(entity_object(
                ty.name(),
                target,
                relationships_of(relationships, target.name()),
                ty.extras(),
                serving,
            ));
            if ty.shape() == ResultShape::Paginated {
                objects.push(connection_object(&ty));
                objects.push(edge_object(&ty));
                needs_page_info = true;
            }
        }

        let Some(ops) = operations.get(kind.name()) else {
            continue;
        };
        if !kind.is_edge() {
            query = query
                .field(lookup_field(kind, ops.clone()))
                .field(list_field(kind, ops.clone()));
        }
        mutation = mutation
            .field(create_field(kind, ops.clone()))
            .field(update_field(kind, ops.clone()));
    }

    let has_mutation = !kinds.is_empty();
    let mut schema =
        Schema::build("Query", has_mutation.then_some("Mutation"), None).register(query);
    if has_mutation {
        schema = schema.register(mutation);
    }
    for object in objects {
        schema = schema.register(object);
    }
    if needs_page_info {
        schema = schema.register(page_info_object());
    }
    for scalar in CUSTOM_SCALARS {
        schema = schema.register(Scalar::new(*scalar));
    }
    schema.finish()
}

fn relationships_of<'a>(
    relationships: &'a HashMap<String, Vec<Arc<RelationshipField>>>,
    kind: &str,
) -> &'a [Arc<RelationshipField>] {
    relationships.get(kind).map(Vec::as_slice).unwrap_or_default()
}

fn entity_object(
    type_name: &str,
    kind: &EntityKind,
    relationships: &[Arc<RelationshipField>],
    extras: &[ExtraAttribute],
    serving: &ServingContext,
) -> Object {
    let is_extra = |name: &str| extras.iter().any(|x| x.name == name);

    let mut object = Object::new(type_name).field(id_field());
    let system = SYSTEM_FIELDS.iter().filter(|f| **f != "id");
    let endpoints = EDGE_FIELDS.iter().filter(|_| kind.is_edge());
    for name in system.chain(endpoints) {
        object = object.field(value_field(name, TypeRef::named(TypeRef::STRING)));
    }
    for field in kind.fields().iter().filter(|f| !is_extra(f.name.as_str())) {
        object = object.field(value_field(
            &field.name,
            TypeRef::named(field.field_type.graphql_name()),
        ));
    }
    for extra in extras {
        object = object.field(value_field(
            &extra.name,
            TypeRef::named(extra.field_type.graphql_name()),
        ));
    }
    for rel in relationships.iter().filter(|r| !is_extra(r.name())) {
        object = object.field(relationship_field(rel.clone(), serving.clone()));
    }
    object
}

fn id_field() -> Field {
    Field::new("id", TypeRef::named_nn(TypeRef::ID), |ctx| {
        FieldFuture::new(async move {
            let entity = parent_entity(&ctx)?;
            Ok(entity.id().map(|id| FieldValue::value(id.to_string())))
        })
    })
}

fn value_field(name: &str, type_ref: TypeRef) -> Field {
    let field_name = name.to_string();
    Field::new(name, type_ref, move |ctx| {
        let field_name = field_name.clone();
        FieldFuture::new(async move {
            match parent_field(&ctx, &field_name)? {
                Some(value) => Ok(Some(FieldValue::value(GqlValue::from_json(value.clone())?))),
                None => Ok(None),
            }
        })
    })
}

fn relationship_field(rel: Arc<RelationshipField>, serving: ServingContext) -> Field {
    let ty = rel.result_type(&serving.types);
    let type_ref = match ty.shape() {
        ResultShape::Single => TypeRef::named(ty.item_type_name()),
        ResultShape::List => TypeRef::named_nn_list_nn(ty.item_type_name()),
        ResultShape::Paginated => TypeRef::named_nn(ty.connection_type_name()),
    };
    let has_item_type = ty.has_item_type();
    let paginated = rel.cardinality() == Cardinality::Paginated;

    let mut field = Field::new(rel.name().to_string(), type_ref, move |ctx| {
        let rel = rel.clone();
        let serving = serving.clone();
        FieldFuture::new(async move {
            let owner = parent_entity(&ctx)?;
            let page = if paginated {
                Some(PageRequest {
                    first: optional_i64(&ctx, "first")?,
                    after: optional_string(&ctx, "after")?,
                    skip: optional_i64(&ctx, "skip")?,
                })
            } else {
                None
            };
            let value = match rel.resolve(owner, &serving, page.as_ref()).await? {
                Resolved::Single(None) => None,
                Resolved::Single(Some(related)) if has_item_type => {
                    Some(FieldValue::owned_any(related))
                }
                Resolved::Single(Some(related)) => Some(FieldValue::owned_any(related.node)),
                Resolved::List(items) => {
                    Some(FieldValue::list(items.into_iter().map(FieldValue::owned_any)))
                }
                Resolved::Connection(connection) => Some(FieldValue::owned_any(connection)),
            };
            Ok(value)
        })
    });
    if paginated {
        field = field
            .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
            .argument(InputValue::new("after", TypeRef::named(TypeRef::STRING)))
            .argument(InputValue::new("skip", TypeRef::named(TypeRef::INT)));
    }
    field
}

fn connection_object(ty: &GeneratedType) -> Object {
    Object::new(ty.connection_type_name())
        .field(Field::new(
            "edges",
            TypeRef::named_nn_list_nn(ty.edge_type_name()),
            |ctx| {
                FieldFuture::new(async move {
                    let connection = parent::<Connection<RelatedEntity>>(&ctx)?;
                    Ok(Some(FieldValue::list(
                        connection.edges.iter().map(|e| FieldValue::owned_any(e.clone())),
                    )))
                })
            },
        ))
        .field(Field::new("pageInfo", TypeRef::named_nn(PAGE_INFO), |ctx| {
            FieldFuture::new(async move {
                let connection = parent::<Connection<RelatedEntity>>(&ctx)?;
                Ok(Some(FieldValue::owned_any(connection.page_info.clone())))
            })
        }))
}

fn edge_object(ty: &GeneratedType) -> Object {
    Object::new(ty.edge_type_name())
        .field(Field::new("node", TypeRef::named_nn(ty.name()), |ctx| {
            FieldFuture::new(async move {
                let edge = parent::<Edge<RelatedEntity>>(&ctx)?;
                Ok(Some(FieldValue::owned_any(edge.node.clone())))
            })
        }))
        .field(Field::new("cursor", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move {
                let edge = parent::<Edge<RelatedEntity>>(&ctx)?;
                Ok(Some(FieldValue::value(edge.cursor.clone())))
            })
        }))
}

fn page_info_object() -> Object {
    Object::new(PAGE_INFO)
        .field(Field::new("hasNextPage", TypeRef::named_nn(TypeRef::BOOLEAN), |ctx| {
            FieldFuture::new(async move {
                let info = parent::<PageInfo>(&ctx)?;
                Ok(Some(FieldValue::value(info.has_next_page)))
            })
        }))
        .field(Field::new("hasPreviousPage", TypeRef::named_nn(TypeRef::BOOLEAN), |ctx| {
            FieldFuture::new(async move {
                let info = parent::<PageInfo>(&ctx)?;
                Ok(Some(FieldValue::value(info.has_previous_page)))
            })
        }))
        .field(Field::new("startCursor", TypeRef::named(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move {
                let info = parent::<PageInfo>(&ctx)?;
                Ok(info.start_cursor.clone().map(FieldValue::value))
            })
        }))
        .field(Field::new("endCursor", TypeRef::named(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move {
                let info = parent::<PageInfo>(&ctx)?;
                Ok(info.end_cursor.clone().map(FieldValue::value))
            })
        }))
}

fn lookup_field(kind: &EntityKind, ops: Arc<EntityOperations>) -> Field {
    Field::new(camel_case(kind.name()), TypeRef::named(kind.name()), move |ctx| {
        let ops = ops.clone();
        FieldFuture::new(async move {
            let id = ctx.args.try_get("id")?.string()?.to_string();
            Ok(ops.find(&id).await?.map(FieldValue::owned_any))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
}

/// List field named after the collection, or `all<Collection>` when that
/// would clash with the lookup field.
fn list_field_name(kind: &EntityKind) -> String {
    let name = camel_case(kind.collection());
    if name == camel_case(kind.name()) {
        format!("all{}", pascal_case(kind.collection()))
    } else {
        name
    }
}

fn list_field(kind: &EntityKind, ops: Arc<EntityOperations>) -> Field {
    Field::new(
        list_field_name(kind),
        TypeRef::named_nn_list_nn(kind.name()),
        move |ctx| {
            let ops = ops.clone();
            FieldFuture::new(async move {
                let first = optional_i64(&ctx, "first")?;
                let skip = optional_i64(&ctx, "skip")?;
                let items = ops.list(first, skip).await?;
                Ok(Some(FieldValue::list(items.into_iter().map(FieldValue::owned_any))))
            })
        },
    )
    .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
    .argument(InputValue::new("skip", TypeRef::named(TypeRef::INT)))
}

fn create_field(kind: &EntityKind, ops: Arc<EntityOperations>) -> Field {
    let mut field = Field::new(
        format!("create{}", kind.name()),
        TypeRef::named_nn(kind.name()),
        move |ctx| {
            let ops = ops.clone();
            FieldFuture::new(async move {
                let input = input_document(&ctx, &[])?;
                Ok(Some(FieldValue::owned_any(ops.create(input).await?)))
            })
        },
    );
    if kind.is_edge() {
        for endpoint in EDGE_FIELDS {
            field = field.argument(InputValue::new(*endpoint, TypeRef::named_nn(TypeRef::STRING)));
        }
    }
    for declared in kind.fields() {
        field = field.argument(InputValue::new(
            &declared.name,
            TypeRef::named(declared.field_type.graphql_name()),
        ));
    }
    field
}

fn update_field(kind: &EntityKind, ops: Arc<EntityOperations>) -> Field {
    let mut field = Field::new(
        format!("update{}", kind.name()),
        TypeRef::named_nn(kind.name()),
        move |ctx| {
            let ops = ops.clone();
            FieldFuture::new(async move {
                let locator = match optional_string(&ctx, "id")? {
                    Some(id) => Locator::Id(id),
                    None => match (optional_string(&ctx, "_from")?, optional_string(&ctx, "_to")?) {
                        (Some(from), Some(to)) => Locator::Endpoints { from, to },
                        _ => {
                            return Err("either `id` or both `_from` and `_to` are required".into());
                        }
                    },
                };
                let input = input_document(&ctx, &["id", "_from", "_to"])?;
                Ok(Some(FieldValue::owned_any(ops.update(&locator, input).await?)))
            })
        },
    );
    if kind.is_edge() {
        field = field.argument(InputValue::new("id", TypeRef::named(TypeRef::ID)));
        for endpoint in EDGE_FIELDS {
            field = field.argument(InputValue::new(*endpoint, TypeRef::named(TypeRef::STRING)));
        }
    } else {
        field = field.argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)));
    }
    for declared in kind.fields() {
        field = field.argument(InputValue::new(
            &declared.name,
            TypeRef::named(declared.field_type.graphql_name()),
        ));
    }
    field
}

fn parent<'a, T: Any + Send + Sync>(ctx: &ResolverContext<'a>) -> async_graphql::Result<&'a T> {
    ctx.parent_value
        .downcast_ref::<T>()
        .ok_or_else(|| format!("expected a `{}` parent", std::any::type_name::<T>()).into())
}

/// The entity behind a kind object or a generated item object.
fn parent_entity<'a>(ctx: &ResolverContext<'a>) -> async_graphql::Result<&'a EntityInstance> {
    if let Some(related) = ctx.parent_value.downcast_ref::<RelatedEntity>() {
        return Ok(&related.node);
    }
    parent::<EntityInstance>(ctx)
}

fn parent_field<'a>(
    ctx: &ResolverContext<'a>,
    name: &str,
) -> async_graphql::Result<Option<&'a Value>> {
    if let Some(related) = ctx.parent_value.downcast_ref::<RelatedEntity>() {
        return Ok(related.get(name));
    }
    Ok(parent::<EntityInstance>(ctx)?.get(name))
}

fn optional_i64(ctx: &ResolverContext<'_>, name: &str) -> async_graphql::Result<Option<i64>> {
    match ctx.args.get(name) {
        Some(value) if !value.is_null() => Ok(Some(value.i64()?)),
        _ => Ok(None),
    }
}

fn optional_string(ctx: &ResolverContext<'_>, name: &str) -> async_graphql::Result<Option<String>> {
    match ctx.args.get(name) {
        Some(value) if !value.is_null() => Ok(Some(value.string()?.to_string())),
        _ => Ok(None),
    }
}

fn input_document(ctx: &ResolverContext<'_>, skip: &[&str]) -> async_graphql::Result<Document> {
    let mut document = Document::new();
    for (name, value) in ctx.args.as_index_map() {
        if skip.contains(&name.as_str()) {
            continue;
        }
        document.insert(name.to_string(), value.clone().into_json()?);
    }
    Ok(document)
}
