//! Fluent statement builders.
//!
//! Builders only assemble clauses; they never check field names, collections
//! or graphs. Values passed to comparison, `IN`, `LIKE`, insert and update
//! clauses are always bound as parameters. Paths, variables and collection
//! names come from declarations and are emitted verbatim.

use serde_json::Value;

use super::clause::{Clause, CompareOp, Depth, Direction, Operand, Projection, SortOrder};
use super::statement::{START_VERTEX_PARAM, Statement, render};
use crate::model::Document;

/// Chainable filter/sort/paginate operations shared by [Query] and [GraphQuery].
pub trait ClauseBuilder: Sized {
    #[doc(hidden)]
    fn body_mut(&mut self) -> &mut Query;

    /// `FILTER <field>`
    fn filter(mut self, field: impl Into<String>) -> Self {
        self.body_mut().push(Clause::Filter(Operand::Path(field.into())));
        self
    }

    /// `AND <field>`
    fn and_(mut self, field: impl Into<String>) -> Self {
        self.body_mut().push(Clause::And(Operand::Path(field.into())));
        self
    }

    /// `OR <field>`
    fn or_(mut self, field: impl Into<String>) -> Self {
        self.body_mut().push(Clause::Or(Operand::Path(field.into())));
        self
    }

    /// Negated predicate: `FILTER NOT <field>`, or `AND NOT <field>` when a
    /// predicate is already running.
    fn not_(mut self, field: impl Into<String>) -> Self {
        let body = self.body_mut();
        let standalone = !body.clauses.last().is_some_and(Clause::is_predicate);
        body.push(Clause::Not {
            operand: Operand::Path(field.into()),
            standalone,
        });
        self
    }

    /// `IN @pN`
    fn in_<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let body = self.body_mut();
        let set = Value::Array(values.into_iter().map(Into::into).collect());
        let param = body.param(set);
        body.push(Clause::In(param));
        self
    }

    fn lt(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Lt, value)
    }

    fn lte(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Lte, value)
    }

    fn eq(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Eq, value)
    }

    fn neq(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Neq, value)
    }

    fn gt(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Gt, value)
    }

    fn gte(self, value: impl Into<Value>) -> Self {
        self.compare(CompareOp::Gte, value)
    }

    #[doc(hidden)]
    fn compare(mut self, op: CompareOp, value: impl Into<Value>) -> Self {
        let body = self.body_mut();
        let param = body.param(value.into());
        body.push(Clause::Compare(op, param));
        self
    }

    /// `LIKE @pN`; `%` and `_` keep their wildcard meaning.
    fn like(mut self, pattern: impl Into<String>) -> Self {
        let body = self.body_mut();
        let param = body.param(Value::String(pattern.into()));
        body.push(Clause::Like(param));
        self
    }

    /// `LIMIT offset, size`; negative values count by magnitude.
    fn limit(mut self, size: i64, offset: i64) -> Self {
        self.body_mut().push(Clause::Limit {
            offset: offset.unsigned_abs(),
            size: size.unsigned_abs(),
        });
        self
    }

    fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.body_mut().push(Clause::Sort {
            field: field.into(),
            order: SortOrder::Asc,
        });
        self
    }

    fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.body_mut().push(Clause::Sort {
            field: field.into(),
            order: SortOrder::Desc,
        });
        self
    }

    fn sort(self, field: impl Into<String>, order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => self.sort_asc(field),
            SortOrder::Desc => self.sort_desc(field),
        }
    }
}

/// Plain collection statement builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
    bind_vars: Document,
    next_param: usize,
}

impl ClauseBuilder for Query {
    fn body_mut(&mut self) -> &mut Query {
        self
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    fn param(&mut self, value: Value) -> Operand {
        let name = format!("p{}", self.next_param);
        self.next_param += 1;
        self.bind_vars.insert(name.clone(), value);
        Operand::Param(name)
    }

    /// `FOR <var> IN <collection>`
    pub fn for_in(mut self, var: impl Into<String>, collection: impl Into<String>) -> Self {
        self.push(Clause::For {
            var: var.into(),
            collection: collection.into(),
        });
        self
    }

    /// `RETURN [DISTINCT] <projection>`
    pub fn return_(mut self, projection: impl Into<Projection>, distinct: bool) -> Self {
        self.push(Clause::Return {
            projection: projection.into(),
            distinct,
        });
        self
    }

    /// `INSERT @pN INTO <collection>`; follow with `return_("NEW", false)`.
    pub fn insert(mut self, document: Document, collection: impl Into<String>) -> Self {
        let param = self.param(Value::Object(document));
        self.push(Clause::Insert {
            document: param,
            collection: collection.into(),
        });
        self
    }

    /// `UPDATE <var> WITH @pN IN <collection>`
    pub fn update_with(
        mut self,
        var: impl Into<String>,
        patch: Document,
        collection: impl Into<String>,
    ) -> Self {
        let param = self.param(Value::Object(patch));
        self.push(Clause::Update {
            var: var.into(),
            patch: param,
            collection: collection.into(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn bind_vars(&self) -> &Document {
        &self.bind_vars
    }

    /// Statement text; recomputed on every call.
    pub fn statement(&self) -> String {
        render(&self.clauses)
    }

    pub fn build(&self) -> Statement {
        Statement::new(self.clauses.clone(), self.bind_vars.clone())
    }
}

/// Graph traversal builder.
///
/// The start vertex is not part of the builder: [GraphQuery::bind] supplies it
/// as the `@start_vertex_id` parameter, so one builder serves any number of
/// start vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    graph: String,
    depth: Depth,
    direction: Direction,
    ret: Projection,
    body: Query,
}

impl ClauseBuilder for GraphQuery {
    fn body_mut(&mut self) -> &mut Query {
        &mut self.body
    }
}

impl GraphQuery {
    /// Depth 1, direction `ANY`, returning the visited vertex `v`.
    pub fn new(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            depth: Depth::default(),
            direction: Direction::Any,
            ret: Projection::var("v"),
            body: Query::new(),
        }
    }

    pub fn depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn returning(mut self, projection: impl Into<Projection>) -> Self {
        self.ret = projection.into();
        self
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn get_depth(&self) -> Depth {
        self.depth
    }

    pub fn get_direction(&self) -> Direction {
        self.direction
    }

    fn clauses(&self) -> Vec<Clause> {
        let mut clauses = Vec::with_capacity(self.body.clauses.len() + 2);
        clauses.push(Clause::Traverse {
            depth: self.depth,
            direction: self.direction,
            start: Operand::Param(START_VERTEX_PARAM.to_string()),
            graph: self.graph.clone(),
        });
        clauses.extend(self.body.clauses.iter().cloned());
        clauses.push(Clause::Return {
            projection: self.ret.clone(),
            distinct: false,
        });
        clauses
    }

    /// Statement text; recomputed on every call.
    pub fn statement(&self) -> String {
        render(&self.clauses())
    }

    /// Build the statement for one start vertex.
    pub fn bind(&self, start_vertex: &str) -> Statement {
        let mut bind_vars = self.body.bind_vars.clone();
        bind_vars.insert(
            START_VERTEX_PARAM.to_string(),
            Value::String(start_vertex.to_string()),
        );
        Statement::new(self.clauses(), bind_vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_collection_query_renders_in_order() {
        let q = Query::new()
            .for_in("x", "people")
            .filter("x.name")
            .eq("Ada")
            .and_("x.age")
            .gte(30)
            .sort_desc("x.age")
            .limit(10, 20)
            .return_("x", false);
        assert_eq!(
            q.statement(),
            "FOR x IN people FILTER x.name == @p0 AND x.age >= @p1 SORT x.age DESC LIMIT 20, 10 RETURN x"
        );
        assert_eq!(q.bind_vars().get("p0"), Some(&json!("Ada")));
        assert_eq!(q.bind_vars().get("p1"), Some(&json!(30)));
    }

    #[test]
    fn test_values_never_reach_statement_text() {
        let hostile = "\" || true || \"";
        let q = Query::new()
            .for_in("x", "people")
            .filter("x.name")
            .like(hostile)
            .return_("x", false);
        assert!(!q.statement().contains(hostile));
        assert_eq!(q.statement(), "FOR x IN people FILTER x.name LIKE @p0 RETURN x");
        assert_eq!(q.bind_vars().get("p0"), Some(&json!(hostile)));
    }

    #[test]
    fn test_in_binds_array() {
        let q = Query::new().for_in("x", "people").filter("x._key").in_(["1", "2"]);
        assert_eq!(q.statement(), "FOR x IN people FILTER x._key IN @p0");
        assert_eq!(q.bind_vars().get("p0"), Some(&json!(["1", "2"])));
    }

    #[test]
    fn test_not_joins_running_predicate() {
        let q = Query::new()
            .for_in("x", "people")
            .not_("x.archived")
            .filter("x.age")
            .lt(18)
            .not_("x.guardian");
        assert_eq!(
            q.statement(),
            "FOR x IN people FILTER NOT x.archived FILTER x.age < @p0 AND NOT x.guardian"
        );
    }

    #[test]
    fn test_limit_uses_magnitudes() {
        let q = Query::new().for_in("x", "people").limit(-5, -2);
        assert_eq!(q.statement(), "FOR x IN people LIMIT 2, 5");
    }

    #[test]
    fn test_traversal_depth_range_normalized() {
        let expected = "FOR v, e, p IN 1..3 ANY @start_vertex_id GRAPH \"personGraph\" RETURN v";
        let q = GraphQuery::new("personGraph").depth(Depth::range(3, 1));
        assert_eq!(q.statement(), expected);
        let q = GraphQuery::new("personGraph").depth(Depth::Range(3, 1));
        assert_eq!(q.statement(), expected);
    }

    #[test]
    fn test_statement_is_pure() {
        let q = GraphQuery::new("personGraph")
            .direction(Direction::Outbound)
            .filter("v._id")
            .like("groups/%");
        let first = q.statement();
        let second = q.statement();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "FOR v, e, p IN 1 OUTBOUND @start_vertex_id GRAPH \"personGraph\" FILTER v._id LIKE @p0 RETURN v"
        );
    }

    #[test]
    fn test_bind_reuses_builder_across_start_vertices() {
        let q = GraphQuery::new("g").returning(Projection::merge("v", [("status", "e.status")]));
        let a = q.bind("people/1");
        let b = q.bind("people/2");
        assert_eq!(a.text, b.text);
        assert_eq!(a.bind_vars.get(START_VERTEX_PARAM), Some(&json!("people/1")));
        assert_eq!(b.bind_vars.get(START_VERTEX_PARAM), Some(&json!("people/2")));
        assert!(a.text.ends_with(r#"RETURN MERGE(v, { "status": e.status })"#));
    }

    #[test]
    fn test_write_clauses() {
        let mut doc = Document::new();
        doc.insert("name".into(), json!("Ada"));
        let insert = Query::new().insert(doc.clone(), "people").return_("NEW", false);
        assert_eq!(insert.statement(), "INSERT @p0 INTO people RETURN NEW");

        let update = Query::new()
            .for_in("x", "people")
            .filter("x._key")
            .eq("1")
            .update_with("x", doc, "people")
            .return_("NEW", false);
        assert_eq!(
            update.statement(),
            "FOR x IN people FILTER x._key == @p0 UPDATE x WITH @p1 IN people RETURN NEW"
        );
    }
}
