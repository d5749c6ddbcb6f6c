//! Per-kind read and write operations.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::SchemaSettings;
use crate::error::{Error, Result, StorageError};
use crate::model::{
    Document, EDGE_FIELDS, EntityInstance, EntityKind, FieldType, Registry, SYSTEM_FIELDS,
};
use crate::query::{ClauseBuilder, Query, Statement};
use crate::store::StorageClient;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"));

/// How `update` locates the document to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `_key`, or a full `collection/key` handle.
    Id(String),
    /// Edge kinds only: the exact `(_from, _to)` pair.
    Endpoints { from: String, to: String },
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "id `{id}`"),
            Locator::Endpoints { from, to } => write!(f, "_from `{from}` and _to `{to}`"),
        }
    }
}

/// Point lookup, list, create and update for one kind.
pub struct EntityOperations {
    kind: Arc<EntityKind>,
    registry: Arc<Registry>,
    storage: Arc<dyn StorageClient>,
    settings: SchemaSettings,
}

impl fmt::Debug for EntityOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityOperations")
            .field("kind", &self.kind.name())
            .field("collection", &self.kind.collection())
            .finish_non_exhaustive()
    }
}

impl EntityOperations {
    pub fn new(
        kind: Arc<EntityKind>,
        registry: Arc<Registry>,
        storage: Arc<dyn StorageClient>,
        settings: SchemaSettings,
    ) -> Self {
        Self {
            kind,
            registry,
            storage,
            settings,
        }
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Look up one entity by `_key` or `_id`. A miss is `Ok(None)`.
    pub async fn find(&self, id: &str) -> Result<Option<EntityInstance>> {
        let statement = Query::new()
            .for_in("x", self.kind.collection())
            .filter(id_path(id))
            .eq(id)
            .limit(1, 0)
            .return_("x", false)
            .build();
        debug!(kind = %self.kind.name(), id, "Finding entity");
        let docs = self.execute(&statement).await?;
        Ok(docs.into_iter().find_map(|d| self.instance(d)))
    }

    /// List entities in the kind's default sort order.
    ///
    /// `first` is capped at the configured maximum page size; `skip` alone
    /// returns at most one maximum-size page.
    pub async fn list(&self, first: Option<i64>, skip: Option<i64>) -> Result<Vec<EntityInstance>> {
        let mut query = Query::new().for_in("x", self.kind.collection());
        if let Some(sort) = self.kind.sort() {
            query = query.sort(format!("x.{}", sort.field), sort.order);
        }
        let max = i64::try_from(self.settings.max_page_size).unwrap_or(i64::MAX);
        query = match (first, skip) {
            (Some(first), skip) => {
                let first = i64::try_from(first.unsigned_abs()).unwrap_or(i64::MAX);
                query.limit(first.min(max), skip.unwrap_or(0))
            }
            (None, Some(skip)) => query.limit(max, skip),
            (None, None) => query,
        };
        let statement = query.return_("x", false).build();
        let docs = self.execute(&statement).await?;
        Ok(docs.into_iter().filter_map(|d| self.instance(d)).collect())
    }

    /// Validate, normalize and store a new entity.
    pub async fn create(&self, input: Document) -> Result<EntityInstance> {
        let mut document = Document::new();
        for (field, value) in input {
            if value.is_null() {
                continue;
            }
            if self.kind.is_edge() && EDGE_FIELDS.contains(&field.as_str()) {
                let handle = self.qualify_endpoint(&field, &value)?;
                document.insert(field, Value::String(handle));
                continue;
            }
            let value = self.normalize_input(&field, value)?;
            document.insert(field, value);
        }
        if self.kind.is_edge() {
            for field in EDGE_FIELDS {
                if !document.contains_key(*field) {
                    return Err(Error::validation(
                        self.kind.name(),
                        format!("`{field}` is required"),
                    ));
                }
            }
        }
        document.insert("_created".into(), Value::String(Utc::now().to_rfc3339()));

        let statement = Query::new()
            .insert(document, self.kind.collection())
            .return_("NEW", false)
            .build();
        let docs = self.execute(&statement).await?;
        let created = docs
            .into_iter()
            .find_map(|d| self.instance(d))
            .ok_or_else(|| StorageError::Backend("insert returned no document".to_string()))?;
        info!(kind = %self.kind.name(), id = ?created.id(), "Created entity");
        Ok(created)
    }

    /// Merge `input` into the located entity. A miss is [Error::NotFound] and
    /// writes nothing.
    pub async fn update(&self, locator: &Locator, input: Document) -> Result<EntityInstance> {
        let mut patch = Document::new();
        for (field, value) in input {
            if value.is_null() {
                self.field_type(&field)?;
                patch.insert(field, Value::Null);
                continue;
            }
            let value = self.normalize_input(&field, value)?;
            patch.insert(field, value);
        }
        patch.insert("_updated".into(), Value::String(Utc::now().to_rfc3339()));

        let located = Query::new().for_in("x", self.kind.collection());
        let located = match locator {
            Locator::Id(id) => located.filter(id_path(id)).eq(id.as_str()),
            Locator::Endpoints { from, to } => {
                if !self.kind.is_edge() {
                    return Err(Error::validation(
                        self.kind.name(),
                        "only edge kinds can be located by endpoints",
                    ));
                }
                let from = self.qualify_endpoint("_from", &Value::String(from.clone()))?;
                let to = self.qualify_endpoint("_to", &Value::String(to.clone()))?;
                located.filter("x._from").eq(from).and_("x._to").eq(to)
            }
        };
        let statement = located
            .update_with("x", patch, self.kind.collection())
            .return_("NEW", false)
            .build();

        let docs = self.execute(&statement).await?;
        let updated = docs
            .into_iter()
            .find_map(|d| self.instance(d))
            .ok_or_else(|| Error::not_found(self.kind.name(), locator.to_string()))?;
        info!(kind = %self.kind.name(), id = ?updated.id(), "Updated entity");
        Ok(updated)
    }

    async fn execute(&self, statement: &Statement) -> Result<Vec<Value>> {
        Ok(self.storage.execute(statement).await?)
    }

    fn instance(&self, value: Value) -> Option<EntityInstance> {
        match value {
            Value::Object(document) => Some(EntityInstance::new(self.kind.name(), document)),
            _ => None,
        }
    }

    fn field_type(&self, field: &str) -> Result<&FieldType> {
        if SYSTEM_FIELDS.contains(&field) || EDGE_FIELDS.contains(&field) {
            return Err(Error::validation(
                self.kind.name(),
                format!("`{field}` is managed by the store and cannot be set"),
            ));
        }
        self.kind
            .field_type(field)
            .ok_or_else(|| Error::validation(self.kind.name(), format!("unknown field `{field}`")))
    }

    fn normalize_input(&self, field: &str, value: Value) -> Result<Value> {
        let field_type = self.field_type(field)?;
        normalize(field_type, value)
            .map_err(|message| Error::validation(self.kind.name(), format!("`{field}`: {message}")))
    }

    /// Turn an endpoint value into a full `collection/key` handle allowed for
    /// this edge kind. A bare key is accepted when exactly one collection is
    /// allowed on that side.
    fn qualify_endpoint(&self, field: &str, value: &Value) -> Result<String> {
        let raw = value.as_str().ok_or_else(|| {
            Error::validation(self.kind.name(), format!("`{field}` must be a document handle"))
        })?;

        let endpoints = self.kind.endpoints();
        let names: Vec<&str> = if field == "_from" {
            endpoints.from_kinds().collect()
        } else {
            endpoints.to_kinds().collect()
        };
        let mut allowed: Vec<String> = Vec::new();
        for kind in names.into_iter().filter_map(|name| self.registry.get(name)) {
            if !allowed.iter().any(|c| c == kind.collection()) {
                allowed.push(kind.collection().to_string());
            }
        }

        match raw.split_once('/') {
            Some((collection, key)) if !collection.is_empty() && !key.is_empty() => {
                if !allowed.is_empty() && !allowed.iter().any(|c| c == collection) {
                    return Err(Error::validation(
                        self.kind.name(),
                        format!("`{field}` must reference one of {allowed:?}, got `{raw}`"),
                    ));
                }
                if allowed.is_empty() && self.registry.lookup_collection(collection).is_none() {
                    return Err(Error::validation(
                        self.kind.name(),
                        format!("`{field}` references unknown collection `{collection}`"),
                    ));
                }
                Ok(raw.to_string())
            }
            Some(_) => Err(Error::validation(
                self.kind.name(),
                format!("`{field}` is not a valid document handle: `{raw}`"),
            )),
            None => match allowed.as_slice() {
                [collection] => Ok(format!("{collection}/{raw}")),
                _ => Err(Error::validation(
                    self.kind.name(),
                    format!("`{field}` needs a full `collection/key` handle"),
                )),
            },
        }
    }
}

fn id_path(id: &str) -> &'static str {
    if id.contains('/') { "x._id" } else { "x._key" }
}

/// Check `value` against `field_type`, normalizing dates and times.
fn normalize(field_type: &FieldType, value: Value) -> std::result::Result<Value, String> {
    let text = value.as_str();
    match field_type {
        FieldType::String | FieldType::Password | FieldType::Id => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) if *field_type == FieldType::Id => Ok(Value::String(n.to_string())),
            other => Err(format!("expected a string, got {other}")),
        },
        FieldType::Email => match text {
            Some(email) if EMAIL.is_match(email) => Ok(value),
            _ => Err(format!("expected an email address, got {value}")),
        },
        FieldType::Date => text
            .and_then(parse_date)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| format!("expected a date (YYYY-MM-DD), got {value}")),
        FieldType::DateTime => text
            .and_then(parse_datetime)
            .map(|dt| Value::String(dt.to_rfc3339()))
            .ok_or_else(|| format!("expected an RFC 3339 date-time, got {value}")),
        FieldType::Time => text
            .and_then(|t| {
                NaiveTime::parse_from_str(t, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
                    .ok()
            })
            .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
            .ok_or_else(|| format!("expected a time (HH:MM[:SS]), got {value}")),
        FieldType::Int => match value.as_i64() {
            Some(_) => Ok(value),
            None => Err(format!("expected an integer, got {value}")),
        },
        FieldType::Float => match value.as_f64() {
            Some(_) => Ok(value),
            None => Err(format!("expected a number, got {value}")),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value),
            other => Err(format!("expected a boolean, got {other}")),
        },
        FieldType::Enum(values) => match text {
            Some(v) if values.iter().any(|allowed| allowed == v) => Ok(value),
            _ => Err(format!("expected one of {values:?}, got {value}")),
        },
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(text).map(|dt| dt.date_naive()))
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        people: EntityOperations,
        member_of: EntityOperations,
    }

    async fn fixture() -> Fixture {
        let registry = Arc::new(Registry::new());
        let person = registry
            .register(
                EntityKind::node("Person")
                    .field("name", FieldType::String)
                    .field("email", FieldType::Email)
                    .field("birthday", FieldType::Date)
                    .default_sort("name", crate::query::SortOrder::Asc),
            )
            .unwrap();
        registry.register(EntityKind::node("Group")).unwrap();
        let member_of = registry
            .register(
                EntityKind::edge("MemberOf")
                    .from_kinds(["Person"])
                    .to_kinds(["Group"])
                    .field("status", FieldType::String),
            )
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        store.create_collection("people", false).await.unwrap();
        store.create_collection("groups", false).await.unwrap();
        store.create_collection("member_of", true).await.unwrap();

        let settings = SchemaSettings::default();
        Fixture {
            people: EntityOperations::new(person, registry.clone(), store.clone(), settings),
            member_of: EntityOperations::new(member_of, registry, store.clone(), settings),
            store,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_stamps() {
        let f = fixture().await;
        let ada = f
            .people
            .create(doc(json!({"name": "Ada", "birthday": "1815-12-10T08:00:00Z", "email": null})))
            .await
            .unwrap();
        assert_eq!(ada.get_str("birthday"), Some("1815-12-10"));
        assert!(ada.get_str("_created").is_some());
        assert!(ada.get("email").is_none());
        assert!(ada.handle().unwrap().starts_with("people/"));
    }

    #[tokio::test]
    async fn test_create_rejects_system_and_unknown_fields() {
        let f = fixture().await;
        assert_matches!(
            f.people.create(doc(json!({"_key": "1"}))).await,
            Err(Error::Validation { kind, .. }) if kind == "Person"
        );
        assert_matches!(
            f.people.create(doc(json!({"nickname": "A"}))).await,
            Err(Error::Validation { .. })
        );
        assert_matches!(
            f.people.create(doc(json!({"email": "not-an-email"}))).await,
            Err(Error::Validation { .. })
        );
        assert!(f.store.documents("people").is_empty());
    }

    #[tokio::test]
    async fn test_find_by_key_or_handle_and_miss() {
        let f = fixture().await;
        let ada = f.people.create(doc(json!({"name": "Ada"}))).await.unwrap();
        let key = ada.id().unwrap().to_string();
        let handle = ada.handle().unwrap().to_string();

        assert_eq!(f.people.find(&key).await.unwrap(), Some(ada.clone()));
        assert_eq!(f.people.find(&handle).await.unwrap(), Some(ada));
        assert_eq!(f.people.find("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_sorted_and_paged() {
        let f = fixture().await;
        for name in ["Grace", "Ada", "Alan"] {
            f.people.create(doc(json!({"name": name}))).await.unwrap();
        }
        let names = |items: Vec<EntityInstance>| -> Vec<String> {
            items.iter().map(|i| i.get_str("name").unwrap().to_string()).collect()
        };
        assert_eq!(names(f.people.list(None, None).await.unwrap()), vec!["Ada", "Alan", "Grace"]);
        assert_eq!(names(f.people.list(Some(1), Some(1)).await.unwrap()), vec!["Alan"]);
        assert_eq!(names(f.people.list(None, Some(2)).await.unwrap()), vec!["Grace"]);
    }

    #[tokio::test]
    async fn test_list_extreme_arguments_stay_bounded() {
        let f = fixture().await;
        for name in ["Grace", "Ada"] {
            f.people.create(doc(json!({"name": name}))).await.unwrap();
        }
        assert!(f.people.list(Some(i64::MIN), Some(i64::MIN)).await.unwrap().is_empty());
        assert_eq!(f.people.list(Some(i64::MIN), None).await.unwrap().len(), 2);
        assert!(f.people.list(Some(i64::MAX), Some(i64::MAX)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_miss_is_not_found_without_write() {
        let f = fixture().await;
        f.people.create(doc(json!({"name": "Ada"}))).await.unwrap();
        let before = f.store.documents("people");

        let result = f
            .people
            .update(&Locator::Id("missing".into()), doc(json!({"name": "Grace"})))
            .await;
        assert_matches!(result, Err(Error::NotFound { kind, .. }) if kind == "Person");
        assert_eq!(f.store.documents("people"), before);
    }

    #[tokio::test]
    async fn test_update_merges_and_stamps() {
        let f = fixture().await;
        let ada = f
            .people
            .create(doc(json!({"name": "Ada", "email": "ada@example.com"})))
            .await
            .unwrap();
        let updated = f
            .people
            .update(&Locator::Id(ada.id().unwrap().to_string()), doc(json!({"name": "Ada L."})))
            .await
            .unwrap();
        assert_eq!(updated.get_str("name"), Some("Ada L."));
        assert_eq!(updated.get_str("email"), Some("ada@example.com"));
        assert!(updated.get_str("_updated").is_some());
    }

    #[tokio::test]
    async fn test_edge_endpoints_are_qualified_and_checked() {
        let f = fixture().await;
        let edge = f
            .member_of
            .create(doc(json!({"_from": "ada", "_to": "groups/eng", "status": "active"})))
            .await
            .unwrap();
        assert_eq!(edge.get_str("_from"), Some("people/ada"));

        assert_matches!(
            f.member_of
                .create(doc(json!({"_from": "groups/eng", "_to": "groups/eng"})))
                .await,
            Err(Error::Validation { .. })
        );
        assert_matches!(
            f.member_of.create(doc(json!({"_from": "people/ada"}))).await,
            Err(Error::Validation { .. })
        );

        let updated = f
            .member_of
            .update(
                &Locator::Endpoints {
                    from: "people/ada".into(),
                    to: "eng".into(),
                },
                doc(json!({"status": "alumni"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.get_str("status"), Some("alumni"));
    }

    #[test]
    fn test_normalize_scalars() {
        assert_eq!(
            normalize(&FieldType::DateTime, json!("2024-03-01 10:00:00")).unwrap(),
            json!("2024-03-01T10:00:00+00:00")
        );
        assert_eq!(normalize(&FieldType::Time, json!("09:30")).unwrap(), json!("09:30:00"));
        assert!(normalize(&FieldType::Date, json!("March 1st")).is_err());
        assert!(normalize(&FieldType::Int, json!(1.5)).is_err());
        assert!(
            normalize(&FieldType::Enum(vec!["a".into(), "b".into()]), json!("c")).is_err()
        );
    }
}
