//! In-process [StorageClient] that interprets statement clause lists.
//!
//! The store never parses statement text. It walks the [Clause] list a
//! statement was rendered from and evaluates it over rows of variable
//! bindings, which covers everything the builders emit:
//! `FOR`, graph traversals, `FILTER` predicates, `SORT`, `LIMIT`,
//! `INSERT`, `UPDATE` and `RETURN`.
//!
//! Traversals follow the default traversal semantics of graph stores:
//! depth-first, an edge is used at most once per path, and a vertex may be
//! revisited through a different edge. An edge pointing at a missing vertex
//! yields a `null` vertex.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::StorageClient;
use crate::error::StorageError;
use crate::model::{Document, Index};
use crate::query::{Clause, CompareOp, Depth, Direction, Operand, Projection, SortOrder, Statement};
use crate::topology::EdgeDefinition;

static NULL: Value = Value::Null;

/// Provisioning call observed by a [MemoryStore], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    Collection { name: String, is_edge: bool },
    Index { collection: String, fields: Vec<String> },
    Graph { name: String },
}

#[derive(Debug, Default)]
struct Collection {
    is_edge: bool,
    docs: Vec<Document>,
    indexes: Vec<Index>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Collection>,
    graphs: HashMap<String, Vec<EdgeDefinition>>,
}

impl State {
    fn vertex(&self, handle: &str) -> Option<&Document> {
        let (collection, key) = handle.split_once('/')?;
        self.collections
            .get(collection)?
            .docs
            .iter()
            .find(|d| d.get("_key").and_then(Value::as_str) == Some(key))
    }

    /// Apply a statement's writes atomically: either all land or none do.
    fn apply(&mut self, writes: Vec<Write>) -> Result<(), StorageError> {
        let mut staged: HashMap<String, Vec<Document>> = HashMap::new();

        for write in writes {
            let collection = write.collection().to_string();
            let target = self
                .collections
                .get(&collection)
                .ok_or_else(|| StorageError::UnknownCollection(collection.clone()))?;
            let docs = staged
                .entry(collection.clone())
                .or_insert_with(|| target.docs.clone());

            match write {
                Write::Insert { document, .. } => {
                    let key = document.get("_key");
                    if docs.iter().any(|d| d.get("_key") == key) {
                        return Err(StorageError::UniqueViolation {
                            collection,
                            fields: vec!["_key".to_string()],
                        });
                    }
                    check_unique(&collection, &target.indexes, docs, &document)?;
                    docs.push(document);
                }
                Write::Update { key, document, .. } => {
                    check_unique(&collection, &target.indexes, docs, &document)?;
                    let slot = docs
                        .iter_mut()
                        .find(|d| d.get("_key").and_then(Value::as_str) == Some(key.as_str()))
                        .ok_or_else(|| {
                            let handle = format!("{collection}/{key}");
                            StorageError::Backend(format!("document `{handle}` not found"))
                        })?;
                    *slot = document;
                }
            }
        }

        for (collection, docs) in staged {
            if let Some(target) = self.collections.get_mut(&collection) {
                target.docs = docs;
            }
        }
        Ok(())
    }
}

fn check_unique(
    collection: &str,
    indexes: &[Index],
    docs: &[Document],
    candidate: &Document,
) -> Result<(), StorageError> {
    let key = candidate.get("_key");
    for index in indexes.iter().filter(|i| i.unique) {
        let values: Vec<&Value> = index
            .fields
            .iter()
            .map(|f| candidate.get(f).unwrap_or(&NULL))
            .collect();
        if index.sparse && values.iter().any(|v| v.is_null()) {
            continue;
        }
        let clash = docs.iter().filter(|d| d.get("_key") != key).any(|d| {
            index
                .fields
                .iter()
                .zip(&values)
                .all(|(f, v)| d.get(f).unwrap_or(&NULL) == *v)
        });
        if clash {
            return Err(StorageError::UniqueViolation {
                collection: collection.to_string(),
                fields: index.fields.clone(),
            });
        }
    }
    Ok(())
}

enum Write {
    Insert {
        collection: String,
        document: Document,
    },
    Update {
        collection: String,
        key: String,
        document: Document,
    },
}

impl Write {
    fn collection(&self) -> &str {
        match self {
            Write::Insert { collection, .. } | Write::Update { collection, .. } => collection,
        }
    }
}

/// In-memory graph document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    events: Mutex<Vec<ProvisionEvent>>,
    statements: Mutex<Vec<Statement>>,
    revision: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.state.read().collections.contains_key(name)
    }

    pub fn is_edge_collection(&self, name: &str) -> Option<bool> {
        self.state.read().collections.get(name).map(|c| c.is_edge)
    }

    /// Snapshot of a collection's documents in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .read()
            .collections
            .get(collection)
            .map(|c| c.docs.clone())
            .unwrap_or_default()
    }

    pub fn indexes(&self, collection: &str) -> Vec<Index> {
        self.state
            .read()
            .collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    pub fn graph(&self, name: &str) -> Option<Vec<EdgeDefinition>> {
        self.state.read().graphs.get(name).cloned()
    }

    pub fn provisioning_log(&self) -> Vec<ProvisionEvent> {
        self.events.lock().clone()
    }

    /// Every statement executed so far, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }
}

#[async_trait]
impl StorageClient for MemoryStore {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Value>, StorageError> {
        debug!(statement = %statement.text, "Executing statement");
        self.statements.lock().push(statement.clone());

        let writes = statement
            .clauses
            .iter()
            .any(|c| matches!(c, Clause::Insert { .. } | Clause::Update { .. }));

        if writes {
            let mut state = self.state.write();
            let (values, pending) = {
                let mut run = Run::new(&state, &statement.bind_vars, &self.revision);
                let values = run.execute(&statement.clauses)?;
                (values, run.writes)
            };
            state.apply(pending)?;
            Ok(values)
        } else {
            let state = self.state.read();
            Run::new(&state, &statement.bind_vars, &self.revision).execute(&statement.clauses)
        }
    }

    async fn create_collection(&self, name: &str, is_edge: bool) -> Result<(), StorageError> {
        {
            let mut state = self.state.write();
            if !state.collections.contains_key(name) {
                state.collections.insert(
                    name.to_string(),
                    Collection {
                        is_edge,
                        ..Default::default()
                    },
                );
                info!(collection = name, is_edge, "Created collection");
            }
        }
        self.events.lock().push(ProvisionEvent::Collection {
            name: name.to_string(),
            is_edge,
        });
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &Index) -> Result<(), StorageError> {
        {
            let mut state = self.state.write();
            let target = state
                .collections
                .get_mut(collection)
                .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;
            if !target.indexes.contains(index) {
                target.indexes.push(index.clone());
                info!(collection, fields = ?index.fields, unique = index.unique, "Created index");
            }
        }
        self.events.lock().push(ProvisionEvent::Index {
            collection: collection.to_string(),
            fields: index.fields.clone(),
        });
        Ok(())
    }

    async fn create_graph(
        &self,
        name: &str,
        edge_definitions: &[EdgeDefinition],
    ) -> Result<(), StorageError> {
        {
            let mut state = self.state.write();
            for definition in edge_definitions {
                let referenced = std::iter::once(&definition.collection)
                    .chain(&definition.from)
                    .chain(&definition.to);
                for collection in referenced {
                    if !state.collections.contains_key(collection) {
                        return Err(StorageError::UnknownCollection(collection.clone()));
                    }
                }
            }
            if !state.graphs.contains_key(name) {
                state
                    .graphs
                    .insert(name.to_string(), edge_definitions.to_vec());
                info!(graph = name, edges = edge_definitions.len(), "Created graph");
            }
        }
        self.events.lock().push(ProvisionEvent::Graph {
            name: name.to_string(),
        });
        Ok(())
    }
}

type Row = HashMap<String, Value>;

/// One statement evaluation against a consistent view of the state.
struct Run<'a> {
    state: &'a State,
    binds: &'a Document,
    revision: &'a AtomicU64,
    writes: Vec<Write>,
}

impl<'a> Run<'a> {
    fn new(state: &'a State, binds: &'a Document, revision: &'a AtomicU64) -> Self {
        Self {
            state,
            binds,
            revision,
            writes: Vec::new(),
        }
    }

    fn execute(&mut self, clauses: &[Clause]) -> Result<Vec<Value>, StorageError> {
        let mut rows: Vec<Row> = vec![Row::new()];
        let mut i = 0;

        while i < clauses.len() {
            let clause = &clauses[i];
            match clause {
                Clause::For { var, collection } => rows = self.for_in(rows, var, collection)?,
                Clause::Traverse {
                    depth,
                    direction,
                    start,
                    graph,
                } => rows = self.traverse(rows, *depth, *direction, start, graph)?,
                Clause::Filter(_) | Clause::Not { standalone: true, .. } => {
                    let end = predicate_end(clauses, i);
                    let predicate = Predicate::parse(&clauses[i..end])?;
                    let mut kept = Vec::with_capacity(rows.len());
                    for row in rows {
                        if predicate.matches(self, &row)? {
                            kept.push(row);
                        }
                    }
                    rows = kept;
                    i = end;
                    continue;
                }
                Clause::And(_)
                | Clause::Or(_)
                | Clause::Not { .. }
                | Clause::In(_)
                | Clause::Compare(..)
                | Clause::Like(_) => {
                    return Err(StorageError::Unsupported(format!(
                        "`{clause}` outside of a FILTER"
                    )));
                }
                Clause::Limit { offset, size } => {
                    rows = rows
                        .into_iter()
                        .skip(usize::try_from(*offset).unwrap_or(usize::MAX))
                        .take(usize::try_from(*size).unwrap_or(usize::MAX))
                        .collect();
                }
                Clause::Sort { field, order } => rows = self.sort(rows, field, *order)?,
                Clause::Insert {
                    document,
                    collection,
                } => self.insert(&mut rows, document, collection)?,
                Clause::Update {
                    var,
                    patch,
                    collection,
                } => self.update(&mut rows, var, patch, collection)?,
                Clause::Return {
                    projection,
                    distinct,
                } => {
                    if i + 1 != clauses.len() {
                        return Err(StorageError::Unsupported(
                            "clauses after RETURN".to_string(),
                        ));
                    }
                    return self.project(&rows, projection, *distinct);
                }
            }
            i += 1;
        }

        Ok(Vec::new())
    }

    fn next_rev(&self) -> Value {
        let rev = self.revision.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        Value::String(format!("_{rev}"))
    }

    fn for_in(
        &self,
        rows: Vec<Row>,
        var: &str,
        collection: &str,
    ) -> Result<Vec<Row>, StorageError> {
        let source = self
            .state
            .collections
            .get(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;
        let mut out = Vec::with_capacity(rows.len() * source.docs.len());
        for row in rows {
            for doc in &source.docs {
                let mut next = row.clone();
                next.insert(var.to_string(), Value::Object(doc.clone()));
                out.push(next);
            }
        }
        Ok(out)
    }

    fn traverse(
        &self,
        rows: Vec<Row>,
        depth: Depth,
        direction: Direction,
        start: &Operand,
        graph: &str,
    ) -> Result<Vec<Row>, StorageError> {
        let definitions = self
            .state
            .graphs
            .get(graph)
            .ok_or_else(|| StorageError::UnknownGraph(graph.to_string()))?;
        let mut edge_collections: Vec<&str> = Vec::new();
        for definition in definitions {
            if !edge_collections.contains(&definition.collection.as_str()) {
                edge_collections.push(&definition.collection);
            }
        }

        let mut out = Vec::new();
        for row in rows {
            let start_value = self.operand(&row, start)?;
            let handle = match &start_value {
                Value::String(handle) => handle.clone(),
                Value::Object(doc) => match doc.get("_id").and_then(Value::as_str) {
                    Some(handle) => handle.to_string(),
                    None => continue,
                },
                _ => {
                    return Err(StorageError::Unsupported(
                        "traversal start must be a document handle".to_string(),
                    ));
                }
            };
            let Some(start_doc) = self.state.vertex(&handle) else {
                continue;
            };

            let mut walk = Walk {
                depth,
                direction,
                edge_collections: &edge_collections,
                vertices: vec![Value::Object(start_doc.clone())],
                edges: Vec::new(),
                edge_ids: Vec::new(),
                paths: Vec::new(),
            };
            walk.visit(self.state, &handle);

            for (vertices, edges) in walk.paths {
                let mut next = row.clone();
                next.insert("v".into(), vertices.last().cloned().unwrap_or(Value::Null));
                next.insert("e".into(), edges.last().cloned().unwrap_or(Value::Null));
                next.insert("p".into(), json!({ "vertices": vertices, "edges": edges }));
                out.push(next);
            }
        }
        Ok(out)
    }

    fn sort(
        &self,
        rows: Vec<Row>,
        field: &str,
        order: SortOrder,
    ) -> Result<Vec<Row>, StorageError> {
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            keyed.push((self.path(&row, field)?, row));
        }
        keyed.sort_by(|a, b| {
            let ord = compare_values(&a.0, &b.0);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }

    fn insert(
        &mut self,
        rows: &mut [Row],
        document: &Operand,
        collection: &str,
    ) -> Result<(), StorageError> {
        let target = self
            .state
            .collections
            .get(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;

        for row in rows.iter_mut() {
            let Value::Object(mut doc) = self.operand(row, document)? else {
                return Err(StorageError::Unsupported(
                    "INSERT expects a document".to_string(),
                ));
            };
            let key = match doc.get("_key").and_then(Value::as_str) {
                Some(key) => key.to_string(),
                None => Uuid::new_v4().simple().to_string(),
            };
            doc.insert("_key".into(), Value::String(key.clone()));
            doc.insert("_id".into(), Value::String(format!("{collection}/{key}")));
            doc.insert("_rev".into(), self.next_rev());

            if target.is_edge {
                let has_endpoints = ["_from", "_to"]
                    .iter()
                    .all(|f| doc.get(*f).is_some_and(Value::is_string));
                if !has_endpoints {
                    return Err(StorageError::Backend(format!(
                        "edge document in `{collection}` requires `_from` and `_to`"
                    )));
                }
            }

            self.writes.push(Write::Insert {
                collection: collection.to_string(),
                document: doc.clone(),
            });
            row.insert("NEW".into(), Value::Object(doc));
        }
        Ok(())
    }

    fn update(
        &mut self,
        rows: &mut [Row],
        var: &str,
        patch: &Operand,
        collection: &str,
    ) -> Result<(), StorageError> {
        let target = self
            .state
            .collections
            .get(collection)
            .ok_or_else(|| StorageError::UnknownCollection(collection.to_string()))?;

        for row in rows.iter_mut() {
            let located = self.path(row, var)?;
            let key = match &located {
                Value::Object(doc) => doc.get("_key").and_then(Value::as_str).map(str::to_string),
                Value::String(key) => Some(key.rsplit('/').next().unwrap_or(key).to_string()),
                _ => None,
            }
            .ok_or_else(|| StorageError::Unsupported("UPDATE target has no `_key`".to_string()))?;

            let Value::Object(changes) = self.operand(row, patch)? else {
                return Err(StorageError::Unsupported(
                    "UPDATE expects a document patch".to_string(),
                ));
            };
            let current = target
                .docs
                .iter()
                .find(|d| d.get("_key").and_then(Value::as_str) == Some(key.as_str()))
                .ok_or_else(|| {
                    StorageError::Backend(format!("document `{collection}/{key}` not found"))
                })?;

            let mut doc = current.clone();
            for (field, value) in changes {
                if matches!(field.as_str(), "_key" | "_id" | "_rev") {
                    continue;
                }
                doc.insert(field, value);
            }
            doc.insert("_rev".into(), self.next_rev());

            self.writes.push(Write::Update {
                collection: collection.to_string(),
                key,
                document: doc.clone(),
            });
            row.insert("OLD".into(), Value::Object(current.clone()));
            row.insert("NEW".into(), Value::Object(doc));
        }
        Ok(())
    }

    fn project(
        &self,
        rows: &[Row],
        projection: &Projection,
        distinct: bool,
    ) -> Result<Vec<Value>, StorageError> {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = match projection {
                Projection::Var(path) => self.path(row, path)?,
                Projection::Merge { base, extras } => match self.path(row, base)? {
                    Value::Object(mut merged) => {
                        for (alias, operand) in extras {
                            merged.insert(alias.clone(), self.operand(row, operand)?);
                        }
                        Value::Object(merged)
                    }
                    _ => Value::Null,
                },
            };
            if distinct && values.contains(&value) {
                continue;
            }
            values.push(value);
        }
        Ok(values)
    }

    fn operand(&self, row: &Row, operand: &Operand) -> Result<Value, StorageError> {
        match operand {
            Operand::Path(path) => self.path(row, path),
            Operand::Param(name) => self
                .binds
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::MissingBindVar(name.clone())),
        }
    }

    /// Dotted attribute path rooted at a bound variable.
    fn path(&self, row: &Row, path: &str) -> Result<Value, StorageError> {
        let mut segments = path.split('.');
        let var = segments.next().unwrap_or_default();
        let mut value = row
            .get(var)
            .ok_or_else(|| StorageError::Unsupported(format!("variable `{var}` is not bound")))?;
        for segment in segments {
            value = value.get(segment).unwrap_or(&NULL);
        }
        Ok(value.clone())
    }
}

/// Depth-first path enumeration for one start vertex.
struct Walk<'a> {
    depth: Depth,
    direction: Direction,
    edge_collections: &'a [&'a str],
    vertices: Vec<Value>,
    edges: Vec<Value>,
    edge_ids: Vec<String>,
    paths: Vec<(Vec<Value>, Vec<Value>)>,
}

impl Walk<'_> {
    fn visit(&mut self, state: &State, current: &str) {
        let level = u32::try_from(self.edges.len()).unwrap_or(u32::MAX);
        if level >= self.depth.min() {
            self.paths.push((self.vertices.clone(), self.edges.clone()));
        }
        if level >= self.depth.max() {
            return;
        }

        for name in self.edge_collections {
            let Some(collection) = state.collections.get(*name) else {
                continue;
            };
            for edge in &collection.docs {
                let Some(edge_id) = edge.get("_id").and_then(Value::as_str) else {
                    continue;
                };
                if self.edge_ids.iter().any(|id| id == edge_id) {
                    continue;
                }
                let from = edge.get("_from").and_then(Value::as_str);
                let to = edge.get("_to").and_then(Value::as_str);
                let next = match self.direction {
                    Direction::Outbound if from == Some(current) => to,
                    Direction::Inbound if to == Some(current) => from,
                    Direction::Any if from == Some(current) => to,
                    Direction::Any if to == Some(current) => from,
                    _ => None,
                };
                let Some(next) = next else {
                    continue;
                };

                let vertex = state
                    .vertex(next)
                    .map(|d| Value::Object(d.clone()))
                    .unwrap_or(Value::Null);
                self.vertices.push(vertex);
                self.edges.push(Value::Object(edge.clone()));
                self.edge_ids.push(edge_id.to_string());
                self.visit(state, next);
                self.vertices.pop();
                self.edges.pop();
                self.edge_ids.pop();
            }
        }
    }
}

/// A `FILTER` run: terms joined by `AND`/`OR`, `AND` binding tighter.
struct Predicate {
    groups: Vec<Vec<Term>>,
}

struct Term {
    negated: bool,
    subject: Operand,
    test: Option<Test>,
}

enum Test {
    Compare(CompareOp, Operand),
    Like(Operand),
    In(Operand),
}

fn predicate_end(clauses: &[Clause], start: usize) -> usize {
    let mut end = start + 1;
    while end < clauses.len() {
        match &clauses[end] {
            Clause::Filter(_) | Clause::Not { standalone: true, .. } => break,
            c if c.is_predicate() => end += 1,
            _ => break,
        }
    }
    end
}

impl Predicate {
    fn parse(clauses: &[Clause]) -> Result<Self, StorageError> {
        let mut groups: Vec<Vec<Term>> = Vec::new();
        for clause in clauses {
            let term = |negated: bool, subject: &Operand| Term {
                negated,
                subject: subject.clone(),
                test: None,
            };
            match clause {
                Clause::Filter(op) => groups.push(vec![term(false, op)]),
                Clause::Not {
                    operand,
                    standalone: true,
                } => groups.push(vec![term(true, operand)]),
                Clause::Or(op) => groups.push(vec![term(false, op)]),
                Clause::And(op) => current(&mut groups)?.push(term(false, op)),
                Clause::Not {
                    operand,
                    standalone: false,
                } => current(&mut groups)?.push(term(true, operand)),
                Clause::Compare(cmp, op) => set_test(&mut groups, Test::Compare(*cmp, op.clone()))?,
                Clause::Like(op) => set_test(&mut groups, Test::Like(op.clone()))?,
                Clause::In(op) => set_test(&mut groups, Test::In(op.clone()))?,
                other => {
                    return Err(StorageError::Unsupported(format!(
                        "`{other}` inside a FILTER"
                    )));
                }
            }
        }
        Ok(Self { groups })
    }

    fn matches(&self, run: &Run<'_>, row: &Row) -> Result<bool, StorageError> {
        for group in &self.groups {
            let mut all = true;
            for term in group {
                if !term.eval(run, row)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn current(groups: &mut [Vec<Term>]) -> Result<&mut Vec<Term>, StorageError> {
    groups
        .last_mut()
        .ok_or_else(|| StorageError::Unsupported("predicate without FILTER".to_string()))
}

fn set_test(groups: &mut [Vec<Term>], test: Test) -> Result<(), StorageError> {
    let term = current(groups)?
        .last_mut()
        .ok_or_else(|| StorageError::Unsupported("operator without operand".to_string()))?;
    if term.test.is_some() {
        return Err(StorageError::Unsupported("chained comparison".to_string()));
    }
    term.test = Some(test);
    Ok(())
}

impl Term {
    fn eval(&self, run: &Run<'_>, row: &Row) -> Result<bool, StorageError> {
        let mut subject = run.operand(row, &self.subject)?;
        // NOT applies to the operand before any comparison.
        if self.negated {
            subject = Value::Bool(!truthy(&subject));
        }
        let Some(test) = &self.test else {
            return Ok(truthy(&subject));
        };
        match test {
            Test::Compare(op, rhs) => {
                let ord = compare_values(&subject, &run.operand(row, rhs)?);
                Ok(match op {
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Neq => ord != Ordering::Equal,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                })
            }
            Test::Like(rhs) => {
                let pattern = run.operand(row, rhs)?;
                match (subject.as_str(), pattern.as_str()) {
                    (Some(text), Some(pattern)) => Ok(like_regex(pattern)?.is_match(text)),
                    _ => Ok(false),
                }
            }
            Test::In(rhs) => match run.operand(row, rhs)? {
                Value::Array(set) => Ok(set
                    .iter()
                    .any(|v| compare_values(v, &subject) == Ordering::Equal)),
                _ => Ok(false),
            },
        }
    }
}

fn like_regex(pattern: &str) -> Result<Regex, StorageError> {
    let mut re = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => re.push_str(r"\\"),
            },
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| StorageError::Backend(e.to_string()))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over documents: null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(a, b)| compare_values(a, b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) if x == y => Ordering::Equal,
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ClauseBuilder, GraphQuery, Query};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn insert(store: &MemoryStore, collection: &str, value: Value) -> Document {
        let statement = Query::new()
            .insert(doc(value), collection)
            .return_("NEW", false)
            .build();
        let mut out = store.execute(&statement).await.unwrap();
        out.remove(0).as_object().cloned().unwrap()
    }

    async fn people_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection("people", false).await.unwrap();
        for (name, age) in [("Ada", 36), ("Grace", 45), ("Alan", 41)] {
            let person = json!({"_key": name.to_lowercase(), "name": name, "age": age});
            insert(&store, "people", person).await;
        }
        store
    }

    #[tokio::test]
    async fn test_filter_sort_limit_pipeline() {
        let store = people_store().await;
        let statement = Query::new()
            .for_in("x", "people")
            .filter("x.age")
            .gt(40)
            .sort_desc("x.age")
            .limit(1, 0)
            .return_("x.name", false)
            .build();
        assert_eq!(store.execute(&statement).await.unwrap(), vec![json!("Grace")]);
    }

    #[tokio::test]
    async fn test_or_and_not_semantics() {
        let store = people_store().await;
        let statement = Query::new()
            .for_in("x", "people")
            .filter("x.name")
            .eq("Ada")
            .or_("x.age")
            .gte(45)
            .sort_asc("x.name")
            .return_("x.name", false)
            .build();
        assert_eq!(
            store.execute(&statement).await.unwrap(),
            vec![json!("Ada"), json!("Grace")]
        );

        let negated = Query::new()
            .for_in("x", "people")
            .not_("x.retired")
            .sort_asc("x.name")
            .return_("x.name", false)
            .build();
        assert_eq!(store.execute(&negated).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_like_and_in() {
        let store = people_store().await;
        let like = Query::new()
            .for_in("x", "people")
            .filter("x._id")
            .like("people/a%")
            .sort_asc("x._key")
            .return_("x._key", false)
            .build();
        assert_eq!(
            store.execute(&like).await.unwrap(),
            vec![json!("ada"), json!("alan")]
        );

        let within = Query::new()
            .for_in("x", "people")
            .filter("x.age")
            .in_([36, 41])
            .return_("x.age", false)
            .build();
        assert_eq!(store.execute(&within).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_insert() {
        let store = MemoryStore::new();
        store.create_collection("people", false).await.unwrap();
        store
            .create_index("people", &Index::new(["email"]))
            .await
            .unwrap();
        insert(&store, "people", json!({"email": "ada@example.com"})).await;

        let duplicate = Query::new()
            .insert(doc(json!({"email": "ada@example.com"})), "people")
            .return_("NEW", false)
            .build();
        assert_matches!(
            store.execute(&duplicate).await,
            Err(StorageError::UniqueViolation { fields, .. }) if fields == vec!["email".to_string()]
        );
        assert_eq!(store.documents("people").len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = people_store().await;
        let statement = Query::new()
            .for_in("x", "people")
            .filter("x._key")
            .eq("ada")
            .update_with("x", doc(json!({"age": 37})), "people")
            .return_("NEW", false)
            .build();
        let out = store.execute(&statement).await.unwrap();
        assert_eq!(out[0]["age"], json!(37));
        assert_eq!(out[0]["name"], json!("Ada"));
        let stored = store.documents("people");
        assert_eq!(stored[0]["age"], json!(37));
    }

    #[tokio::test]
    async fn test_traversal_direction_and_depth() {
        let store = people_store().await;
        store.create_collection("knows", true).await.unwrap();
        store
            .create_graph(
                "social",
                &[EdgeDefinition {
                    collection: "knows".into(),
                    from: vec!["people".into()],
                    to: vec!["people".into()],
                }],
            )
            .await
            .unwrap();
        let edge = json!({"_from": "people/ada", "_to": "people/grace", "since": 1950});
        insert(&store, "knows", edge).await;
        insert(&store, "knows", json!({"_from": "people/grace", "_to": "people/alan"})).await;

        let outbound = GraphQuery::new("social")
            .direction(Direction::Outbound)
            .returning("v.name");
        let out = store.execute(&outbound.bind("people/ada")).await.unwrap();
        assert_eq!(out, vec![json!("Grace")]);

        let deep = GraphQuery::new("social")
            .direction(Direction::Outbound)
            .depth(Depth::range(1, 2))
            .returning("v.name");
        let out = store.execute(&deep.bind("people/ada")).await.unwrap();
        assert_eq!(out, vec![json!("Grace"), json!("Alan")]);

        let inbound = GraphQuery::new("social")
            .direction(Direction::Inbound)
            .returning(Projection::merge("v", [("since", "e.since")]));
        let out = store.execute(&inbound.bind("people/grace")).await.unwrap();
        assert_eq!(out[0]["name"], json!("Ada"));
        assert_eq!(out[0]["since"], json!(1950));
    }

    #[tokio::test]
    async fn test_dangling_edge_yields_null_vertex() {
        let store = people_store().await;
        store.create_collection("knows", true).await.unwrap();
        store
            .create_graph(
                "social",
                &[EdgeDefinition {
                    collection: "knows".into(),
                    from: vec!["people".into()],
                    to: vec!["people".into()],
                }],
            )
            .await
            .unwrap();
        insert(&store, "knows", json!({"_from": "people/ada", "_to": "people/ghost"})).await;
        let out = store
            .execute(&GraphQuery::new("social").bind("people/ada"))
            .await
            .unwrap();
        assert_eq!(out, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_missing_bind_var_and_unknown_graph() {
        let store = people_store().await;
        let query = Query::new().for_in("x", "people").filter("x.age").eq(36).return_("x", false);
        let unbound = Statement::new(query.clauses().to_vec(), Document::new());
        assert_matches!(
            store.execute(&unbound).await,
            Err(StorageError::MissingBindVar(name)) if name == "p0"
        );

        let no_graph = Statement::new(
            vec![Clause::Traverse {
                depth: Depth::default(),
                direction: Direction::Any,
                start: Operand::Param("start_vertex_id".into()),
                graph: "social".into(),
            }],
            Document::new(),
        );
        assert_matches!(
            store.execute(&no_graph).await,
            Err(StorageError::UnknownGraph(name)) if name == "social"
        );
    }

    #[tokio::test]
    async fn test_graph_requires_collections() {
        let store = MemoryStore::new();
        let result = store
            .create_graph(
                "g",
                &[EdgeDefinition {
                    collection: "knows".into(),
                    from: vec![],
                    to: vec![],
                }],
            )
            .await;
        assert_matches!(result, Err(StorageError::UnknownCollection(_)));
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like_regex("people/%").unwrap().is_match("people/42"));
        assert!(!like_regex("people/%").unwrap().is_match("groups/1"));
        assert!(like_regex("a_c").unwrap().is_match("abc"));
        assert!(like_regex(r"100\%").unwrap().is_match("100%"));
        assert!(!like_regex(r"100\%").unwrap().is_match("1000"));
    }

    #[test]
    fn test_value_ordering() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(2.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }
}
