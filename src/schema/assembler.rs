//! Startup orchestration: validate declarations, provision storage, and
//! expose the per-kind operations and relationship fields.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use futures::future::try_join_all;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::SchemaSettings;
use super::graphql::build_schema;
use super::operations::EntityOperations;
use crate::error::{ConfigurationError, Error, Result};
use crate::model::{EntityInstance, EntityKind, Registry};
use crate::relationship::{PageRequest, RelationshipField, Resolved, ServingContext, TypeCache};
use crate::store::StorageClient;
use crate::topology::{GraphTopology, build_topology};

/// Collects kinds and graphs, then materializes them once.
pub struct SchemaAssembler {
    registry: Arc<Registry>,
    graphs: RwLock<Vec<(String, Vec<String>)>>,
    types: Arc<TypeCache>,
    settings: SchemaSettings,
    materialized: tokio::sync::OnceCell<Arc<MaterializedSchema>>,
}

impl Default for SchemaAssembler {
    fn default() -> Self {
        Self::new(SchemaSettings::default())
    }
}

impl std::fmt::Debug for SchemaAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaAssembler")
            .field("registry", &self.registry)
            .field("graphs", &*self.graphs.read())
            .field("materialized", &self.materialized.initialized())
            .finish()
    }
}

impl SchemaAssembler {
    pub fn new(settings: SchemaSettings) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            graphs: RwLock::new(Vec::new()),
            types: Arc::new(TypeCache::new()),
            settings,
            materialized: tokio::sync::OnceCell::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    pub fn settings(&self) -> SchemaSettings {
        self.settings
    }

    pub fn register_kind(&self, kind: EntityKind) -> Result<Arc<EntityKind>, ConfigurationError> {
        self.registry.register(kind)
    }

    /// Register `edges` and declare graph `name` over them, in order.
    ///
    /// Re-declaring a graph appends edges it does not already have.
    pub fn register_graph<I>(
        &self,
        name: impl Into<String>,
        edges: I,
    ) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = EntityKind>,
    {
        let name = name.into();
        let mut names = Vec::new();
        for edge in edges {
            if !edge.is_edge() {
                return Err(ConfigurationError::NotAnEdge(edge.name().to_string()));
            }
            names.push(self.registry.register(edge)?.name().to_string());
        }
        self.declare_graph(name, names);
        Ok(())
    }

    /// Declare graph `name` over already registered edge kinds.
    pub fn declare_graph<I, S>(&self, name: impl Into<String>, edges: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut graphs = self.graphs.write();
        let position = match graphs.iter().position(|(n, _)| *n == name) {
            Some(position) => position,
            None => {
                graphs.push((name.clone(), Vec::new()));
                graphs.len() - 1
            }
        };
        let declared = &mut graphs[position].1;
        for edge in edges.into_iter().map(Into::into) {
            if !declared.contains(&edge) {
                declared.push(edge);
            }
        }
        debug!(graph = %name, edges = declared.len(), "Declared graph");
    }

    /// Validate every declaration, then provision storage in three phases:
    /// collections, indexes, graphs. Runs once; later calls return the same
    /// schema without touching storage.
    pub async fn materialize(
        &self,
        storage: Arc<dyn StorageClient>,
    ) -> Result<Arc<MaterializedSchema>> {
        self.materialized
            .get_or_try_init(|| self.provision(storage))
            .await
            .cloned()
    }

    async fn provision(&self, storage: Arc<dyn StorageClient>) -> Result<Arc<MaterializedSchema>> {
        let kinds = self.registry.kinds();
        let topologies = self.topologies()?;
        self.validate(&topologies)?;

        try_join_all(
            kinds
                .iter()
                .map(|kind| storage.create_collection(kind.collection(), kind.is_edge())),
        )
        .await?;
        info!(collections = kinds.len(), "Provisioned collections");

        let indexes: Vec<_> = kinds
            .iter()
            .flat_map(|kind| kind.indexes().iter().map(move |index| (kind.collection(), index)))
            .collect();
        try_join_all(
            indexes
                .iter()
                .map(|(collection, index)| storage.create_index(collection, index)),
        )
        .await?;
        info!(indexes = indexes.len(), "Provisioned indexes");

        try_join_all(
            topologies
                .iter()
                .map(|topology| storage.create_graph(topology.name(), topology.edge_definitions())),
        )
        .await?;
        info!(graphs = topologies.len(), "Provisioned graphs");

        let mut relationships: HashMap<String, Vec<Arc<RelationshipField>>> = HashMap::new();
        for owner in &kinds {
            for spec in owner.relationships() {
                let target = self.registry.lookup(&spec.target)?;
                relationships
                    .entry(owner.name().to_string())
                    .or_default()
                    .push(Arc::new(RelationshipField::new(owner, spec, &target)));
            }
        }

        let operations = kinds
            .iter()
            .map(|kind| {
                let ops = EntityOperations::new(
                    kind.clone(),
                    self.registry.clone(),
                    storage.clone(),
                    self.settings,
                );
                (kind.name().to_string(), Arc::new(ops))
            })
            .collect();

        Ok(Arc::new(MaterializedSchema {
            kinds,
            topologies,
            relationships,
            operations,
            context: ServingContext::new(storage, self.types.clone(), self.settings),
            graphql: once_cell::sync::OnceCell::new(),
        }))
    }

    fn topologies(&self) -> Result<Vec<GraphTopology>, ConfigurationError> {
        let graphs = self.graphs.read().clone();
        let mut topologies = Vec::with_capacity(graphs.len());
        for (name, edge_names) in graphs {
            if edge_names.is_empty() {
                return Err(ConfigurationError::EmptyGraph(name));
            }
            let edges = edge_names
                .iter()
                .map(|edge| self.registry.lookup(edge))
                .collect::<Result<Vec<_>, _>>()?;
            topologies.push(build_topology(name, &edges, &self.registry)?);
        }
        Ok(topologies)
    }

    fn validate(&self, topologies: &[GraphTopology]) -> Result<(), ConfigurationError> {
        for edge in self.registry.edges() {
            for target in edge.endpoints().all_kinds() {
                let is_node = self.registry.get(target).is_some_and(|k| !k.is_edge());
                if !is_node {
                    return Err(ConfigurationError::UnknownEndpoint {
                        edge: edge.name().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        for owner in self.registry.kinds() {
            for spec in owner.relationships() {
                if self.registry.get(&spec.target).is_none() {
                    return Err(ConfigurationError::UnknownRelationshipTarget {
                        owner: owner.name().to_string(),
                        field: spec.name.clone(),
                        target: spec.target.clone(),
                    });
                }
                if !topologies.iter().any(|t| t.name() == spec.graph) {
                    return Err(ConfigurationError::UnknownGraph {
                        owner: owner.name().to_string(),
                        field: spec.name.clone(),
                        graph: spec.graph.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Provisioned kinds with their operations and relationship fields.
pub struct MaterializedSchema {
    kinds: Vec<Arc<EntityKind>>,
    topologies: Vec<GraphTopology>,
    relationships: HashMap<String, Vec<Arc<RelationshipField>>>,
    operations: HashMap<String, Arc<EntityOperations>>,
    context: ServingContext,
    graphql: once_cell::sync::OnceCell<Schema>,
}

impl std::fmt::Debug for MaterializedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.kinds.iter().map(|k| k.name()).collect();
        f.debug_struct("MaterializedSchema")
            .field("kinds", &kinds)
            .field("topologies", &self.topologies)
            .finish_non_exhaustive()
    }
}

impl MaterializedSchema {
    pub fn kinds(&self) -> &[Arc<EntityKind>] {
        &self.kinds
    }

    pub fn topologies(&self) -> &[GraphTopology] {
        &self.topologies
    }

    pub fn topology(&self, name: &str) -> Option<&GraphTopology> {
        self.topologies.iter().find(|t| t.name() == name)
    }

    pub fn context(&self) -> &ServingContext {
        &self.context
    }

    pub fn operations(&self, kind: &str) -> Result<&EntityOperations, ConfigurationError> {
        self.operations
            .get(kind)
            .map(Arc::as_ref)
            .ok_or_else(|| ConfigurationError::UnknownKind(kind.to_string()))
    }

    /// Relationship fields declared on `owner`, in declaration order.
    pub fn relationships(&self, owner: &str) -> &[Arc<RelationshipField>] {
        self.relationships.get(owner).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn relationship(&self, owner: &str, field: &str) -> Option<Arc<RelationshipField>> {
        self.relationships(owner)
            .iter()
            .find(|r| r.name() == field)
            .cloned()
    }

    /// Resolve relationship `field` for `owner`.
    pub async fn resolve(
        &self,
        owner: &EntityInstance,
        field: &str,
        page: Option<&PageRequest>,
    ) -> Result<Resolved> {
        let relationship = self.relationship(owner.kind(), field).ok_or_else(|| {
            Error::validation(owner.kind(), format!("unknown relationship `{field}`"))
        })?;
        relationship.resolve(owner, &self.context, page).await
    }

    /// GraphQL schema over every kind, assembled on first use.
    pub fn graphql(&self) -> Result<Schema, ConfigurationError> {
        self.graphql
            .get_or_try_init(|| {
                build_schema(&self.kinds, &self.operations, &self.relationships, &self.context)
                    .map_err(|e| ConfigurationError::GraphQl(e.to_string()))
            })
            .cloned()
    }

    pub fn sdl(&self) -> Result<String, ConfigurationError> {
        Ok(self.graphql()?.sdl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, FieldType, Index, RelationshipSpec};
    use crate::store::{MemoryStore, ProvisionEvent};
    use assert_matches::assert_matches;

    fn assembler() -> SchemaAssembler {
        let assembler = SchemaAssembler::default();
        assembler
            .register_kind(
                EntityKind::node("Person")
                    .field("email", FieldType::Email)
                    .index(Index::new(["email"]))
                    .relationship(RelationshipSpec::new(
                        "groups",
                        "Group",
                        "personGraph",
                        Cardinality::List,
                    )),
            )
            .unwrap();
        assembler.register_kind(EntityKind::node("Group")).unwrap();
        assembler
            .register_graph(
                "personGraph",
                [EntityKind::edge("MemberOf").from_kinds(["Person"]).to_kinds(["Group"])],
            )
            .unwrap();
        assembler
    }

    #[tokio::test]
    async fn test_provisioning_runs_in_phases() {
        let store = Arc::new(MemoryStore::new());
        assembler().materialize(store.clone()).await.unwrap();

        let log = store.provisioning_log();
        let phase = |event: &ProvisionEvent| match event {
            ProvisionEvent::Collection { .. } => 0,
            ProvisionEvent::Index { .. } => 1,
            ProvisionEvent::Graph { .. } => 2,
        };
        assert_eq!(log.len(), 5);
        assert!(log.windows(2).all(|w| phase(&w[0]) <= phase(&w[1])));
        assert_eq!(store.is_edge_collection("member_of"), Some(true));
        assert_eq!(store.is_edge_collection("people"), Some(false));
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let assembler = assembler();
        let first = assembler.materialize(store.clone()).await.unwrap();
        let second = assembler.materialize(store.clone()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.provisioning_log().len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_relationship_graph_fails_before_storage() {
        let assembler = SchemaAssembler::default();
        assembler
            .register_kind(EntityKind::node("Person").relationship(RelationshipSpec::new(
                "friends",
                "Person",
                "nowhere",
                Cardinality::List,
            )))
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        assert_matches!(
            assembler.materialize(store.clone()).await,
            Err(Error::Configuration(ConfigurationError::UnknownGraph { graph, .. }))
                if graph == "nowhere"
        );
        assert!(store.provisioning_log().is_empty());
    }

    #[tokio::test]
    async fn test_edge_constraint_must_name_node_kind() {
        let assembler = SchemaAssembler::default();
        assembler
            .register_kind(EntityKind::edge("Likes").from_kinds(["Ghost"]))
            .unwrap();
        assert_matches!(
            assembler.materialize(Arc::new(MemoryStore::new())).await,
            Err(Error::Configuration(ConfigurationError::UnknownEndpoint { .. }))
        );
    }

    #[tokio::test]
    async fn test_unknown_relationship_target() {
        let assembler = assembler();
        assembler
            .register_kind(EntityKind::node("Venue").relationship(RelationshipSpec::new(
                "owner",
                "Company",
                "personGraph",
                Cardinality::Single,
            )))
            .unwrap();
        assert_matches!(
            assembler.materialize(Arc::new(MemoryStore::new())).await,
            Err(Error::Configuration(ConfigurationError::UnknownRelationshipTarget { .. }))
        );
    }
}
