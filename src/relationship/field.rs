use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use super::ServingContext;
use super::pagination::{Connection, PageRequest};
use super::types::{GeneratedType, ResultShape, TypeCache};
use crate::error::{Error, Result};
use crate::model::naming::{pascal_case, singularize};
use crate::model::{
    Cardinality, EntityInstance, EntityKind, ExtraAttribute, RelatedEntity, RelationshipSpec,
};
use crate::query::{ClauseBuilder, GraphQuery, Operand, Projection, Statement};

/// Result of resolving a relationship for one owner instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Single(Option<RelatedEntity>),
    List(Vec<RelatedEntity>),
    Connection(Connection<RelatedEntity>),
}

/// A relationship field bound to its owner and target kinds.
///
/// The traversal is built once and reused for every owner instance; only the
/// start vertex changes per resolution.
#[derive(Debug)]
pub struct RelationshipField {
    owner: String,
    name: String,
    target: String,
    cardinality: Cardinality,
    extras: Vec<ExtraAttribute>,
    type_name: String,
    query: GraphQuery,
    result_type: OnceCell<Arc<GeneratedType>>,
}

impl RelationshipField {
    pub fn new(owner: &EntityKind, spec: &RelationshipSpec, target: &EntityKind) -> Self {
        let mut query = GraphQuery::new(&spec.graph)
            .depth(spec.depth)
            .direction(spec.direction)
            .filter("v._id")
            .like(format!("{}/%", escape_like(target.collection())));
        if !spec.extras.is_empty() {
            query = query.returning(Projection::Merge {
                base: "v".to_string(),
                extras: spec
                    .extras
                    .iter()
                    .map(|x| (x.name.clone(), Operand::Path(x.source_path())))
                    .collect(),
            });
        }

        Self {
            owner: owner.name().to_string(),
            name: spec.name.clone(),
            target: target.name().to_string(),
            cardinality: spec.cardinality,
            extras: spec.extras.clone(),
            type_name: generated_type_name(owner.name(), &spec.name),
            query,
            result_type: OnceCell::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn extras(&self) -> &[ExtraAttribute] {
        &self.extras
    }

    /// Deterministic name of the generated result type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }

    /// The field's result type, created through `cache` on first use.
    pub fn result_type(&self, cache: &TypeCache) -> Arc<GeneratedType> {
        self.result_type
            .get_or_init(|| {
                cache.get_or_create(&self.type_name, || {
                    GeneratedType::new(
                        &self.type_name,
                        ResultShape::from(self.cardinality),
                        &self.target,
                        self.extras.clone(),
                    )
                })
            })
            .clone()
    }

    /// Resolve this relationship for `owner`.
    ///
    /// `page` only applies to paginated fields. Storage errors are returned
    /// as-is.
    pub async fn resolve(
        &self,
        owner: &EntityInstance,
        ctx: &ServingContext,
        page: Option<&PageRequest>,
    ) -> Result<Resolved> {
        self.result_type(&ctx.types);
        let start = owner
            .handle()
            .ok_or_else(|| Error::validation(owner.kind(), "instance has no `_id`"))?;

        match self.cardinality {
            Cardinality::Single => {
                let docs = self.execute(ctx, &self.query.bind(start)).await?;
                Ok(Resolved::Single(docs.into_iter().find_map(|d| self.related(d))))
            }
            Cardinality::List => {
                let docs = self.execute(ctx, &self.query.bind(start)).await?;
                Ok(Resolved::List(
                    docs.into_iter().filter_map(|d| self.related(d)).collect(),
                ))
            }
            Cardinality::Paginated => {
                let page = page.cloned().unwrap_or_default();
                let (offset, limit) = page
                    .to_offset_limit(&ctx.settings)
                    .map_err(|e| Error::validation(&self.owner, e))?;
                let lookahead = self
                    .query
                    .clone()
                    .limit(to_i64(limit.saturating_add(1)), to_i64(offset))
                    .bind(start);
                let docs = self.execute(ctx, &lookahead).await?;

                let has_next_page = docs.len() as u64 > limit;
                let items: Vec<(u64, RelatedEntity)> = docs
                    .into_iter()
                    .take(usize::try_from(limit).unwrap_or(usize::MAX))
                    .enumerate()
                    .filter_map(|(i, d)| {
                        self.related(d)
                            .map(|item| (offset.saturating_add(i as u64), item))
                    })
                    .collect();
                Ok(Resolved::Connection(Connection::from_positioned(
                    items,
                    offset,
                    has_next_page,
                )))
            }
        }
    }

    async fn execute(&self, ctx: &ServingContext, statement: &Statement) -> Result<Vec<Value>> {
        debug!(
            owner = %self.owner,
            field = %self.name,
            statement = %statement.text,
            "Resolving relationship"
        );
        Ok(ctx.storage.execute(statement).await?)
    }

    fn related(&self, value: Value) -> Option<RelatedEntity> {
        let Value::Object(document) = value else {
            return None;
        };
        let extra_names: Vec<String> = self.extras.iter().map(|x| x.name.clone()).collect();
        Some(RelatedEntity::from_merged(&self.target, document, &extra_names))
    }
}

/// `<Owner><Pascal(singular(field))>`, or the field verbatim when it has no
/// singular form.
pub fn generated_type_name(owner: &str, field: &str) -> String {
    let item = singularize(field).unwrap_or_else(|| field.to_string());
    format!("{}{}", pascal_case(owner), pascal_case(&item))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
