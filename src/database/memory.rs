//! In-memory document store for tests.
//!
//! Understands the subset of the MongoDB query language the service emits
//! and the list endpoints are tested with: field equality (with array
//! membership), `$eq`, `$ne`, `$in`, `$nin`, `$gt`, `$gte`, `$lt`, `$lte`,
//! `$exists`, `$and`, `$or`, inclusion/exclusion projections and the
//! `$set`, `$addToSet` and `$pull` update operators. Unique single-field
//! indexes are enforced when declared with `with_unique_index`.
//!
//! `ScriptedStore` wraps it to interleave writes with a running operation.

use super::{DocumentStore, FindQuery, StoreError, StoreResult};
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
    unique: Vec<(String, String)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique_index(mut self, collection: &str, field: &str) -> Self {
        self.unique.push((collection.to_string(), field.to_string()));
        self
    }

    /// Rejects `candidate` if it shares a uniquely indexed value with any
    /// document other than the one at `replacing`.
    fn check_unique(
        &self,
        collection: &str,
        documents: &[Document],
        candidate: &Document,
        replacing: Option<usize>,
    ) -> StoreResult<()> {
        for (_, field) in self.unique.iter().filter(|(c, _)| c == collection) {
            let Some(value) = candidate.get(field) else { continue };
            let taken = documents
                .iter()
                .enumerate()
                .any(|(index, d)| Some(index) != replacing && d.get(field) == Some(value));
            if taken {
                return Err(StoreError::DuplicateKey(format!("{collection}.{field} {value}")));
            }
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, Vec<Document>>) -> T) -> StoreResult<T> {
        let state = self
            .collections
            .read()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(f(&state))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<Document>>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut state = self
            .collections
            .write()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        f(&mut state)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<ObjectId> {
        let id = match document.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            _ => {
                let id = ObjectId::new();
                document.insert("_id", id);
                id
            }
        };

        self.write(|state| {
            let documents = state.entry(collection.to_string()).or_default();
            if documents.iter().any(|d| d.get("_id") == Some(&Bson::ObjectId(id))) {
                return Err(StoreError::DuplicateKey(format!("_id {id}")));
            }
            self.check_unique(collection, documents, &document, None)?;
            documents.push(document);
            Ok(id)
        })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        self.read(|state| {
            state
                .get(collection)
                .and_then(|documents| documents.iter().find(|d| matches_filter(d, &filter)))
                .map(|d| project(d, projection.as_ref()))
        })
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>> {
        self.read(|state| {
            let mut matched: Vec<&Document> = state
                .get(collection)
                .map(|documents| {
                    documents
                        .iter()
                        .filter(|d| matches_filter(d, &query.filter))
                        .collect()
                })
                .unwrap_or_default();

            if let Some(sort) = &query.sort {
                matched.sort_by(|a, b| compare_by_sort(a, b, sort));
            }

            let skip = query.skip.unwrap_or(0) as usize;
            let limit = query
                .limit
                .filter(|limit| *limit != 0)
                .map(|limit| limit.unsigned_abs() as usize)
                .unwrap_or(usize::MAX);

            matched
                .into_iter()
                .skip(skip)
                .take(limit)
                .map(|d| project(d, query.projection.as_ref()))
                .collect()
        })
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> StoreResult<u64> {
        let filter_only = FindQuery::filter(query.filter.clone());
        Ok(self.find(collection, &filter_only).await?.len() as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<bool> {
        Ok(self
            .find_one_and_update(collection, filter, update)
            .await?
            .is_some())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<Option<Document>> {
        self.write(|state| {
            let Some(documents) = state.get_mut(collection) else {
                return Ok(None);
            };
            let Some(index) = documents.iter().position(|d| matches_filter(d, &filter)) else {
                return Ok(None);
            };

            let mut updated = documents[index].clone();
            apply_update(&mut updated, &update)?;
            self.check_unique(collection, documents, &updated, Some(index))?;
            documents[index] = updated.clone();
            Ok(Some(updated))
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64> {
        self.write(|state| {
            let mut modified = 0;
            if let Some(documents) = state.get_mut(collection) {
                for document in documents.iter_mut().filter(|d| matches_filter(d, &filter)) {
                    let before = document.clone();
                    apply_update(document, &update)?;
                    if *document != before {
                        modified += 1;
                    }
                }
            }
            Ok(modified)
        })
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
    ) -> StoreResult<Option<Document>> {
        self.write(|state| {
            let Some(documents) = state.get_mut(collection) else {
                return Ok(None);
            };
            Ok(documents
                .iter()
                .position(|d| matches_filter(d, &filter))
                .map(|index| documents.remove(index)))
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// A write `ScriptedStore` applies while another operation is in flight.
#[derive(Debug, Clone)]
pub enum ScriptedWrite {
    Insert {
        collection: &'static str,
        document: Document,
    },
    Update {
        collection: &'static str,
        filter: Document,
        update: Document,
    },
}

/// Wraps an `InMemoryStore` to reproduce interleavings: queued writes are
/// applied right after the first `find` on a collection returns, and
/// `find_one` lookups by a hidden field see nothing.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryStore,
    after_find: Mutex<HashMap<String, Vec<ScriptedWrite>>>,
    hidden_lookups: Vec<(String, String)>,
}

impl ScriptedStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn after_find(self, collection: &str, writes: Vec<ScriptedWrite>) -> Self {
        self.after_find
            .lock()
            .unwrap()
            .insert(collection.to_string(), writes);
        self
    }

    pub fn hide_lookups_by(mut self, collection: &str, field: &str) -> Self {
        self.hidden_lookups
            .push((collection.to_string(), field.to_string()));
        self
    }

    async fn apply(&self, writes: Vec<ScriptedWrite>) -> StoreResult<()> {
        for write in writes {
            match write {
                ScriptedWrite::Insert { collection, document } => {
                    self.inner.insert_one(collection, document).await?;
                }
                ScriptedWrite::Update {
                    collection,
                    filter,
                    update,
                } => {
                    self.inner.update_one(collection, filter, update).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<ObjectId> {
        self.inner.insert_one(collection, document).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        let hidden = self
            .hidden_lookups
            .iter()
            .any(|(c, field)| c == collection && filter.contains_key(field));
        if hidden {
            return Ok(None);
        }
        self.inner.find_one(collection, filter, projection).await
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let found = self.inner.find(collection, query).await?;
        let queued = self.after_find.lock().unwrap().remove(collection);
        if let Some(writes) = queued {
            self.apply(writes).await?;
        }
        Ok(found)
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> StoreResult<u64> {
        self.inner.count(collection, query).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<bool> {
        self.inner.update_one(collection, filter, update).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<Option<Document>> {
        self.inner.find_one_and_update(collection, filter, update).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64> {
        self.inner.update_many(collection, filter, update).await
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
    ) -> StoreResult<Option<Document>> {
        self.inner.find_one_and_delete(collection, filter).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).all(|f| matches_filter(document, f)),
        "$or" => sub_filters(condition).any(|f| matches_filter(document, f)),
        _ => field_matches(document.get(key), condition),
    })
}

fn sub_filters(condition: &Bson) -> impl Iterator<Item = &Document> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Bson::as_document)
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) => !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if is_operator_document(condition) => {
            ops.iter().all(|(op, arg)| operator_matches(value, op, arg))
        }
        _ => equals(value, condition),
    }
}

fn operator_matches(value: Option<&Bson>, op: &str, arg: &Bson) -> bool {
    let in_list = |arg: &Bson| {
        arg.as_array()
            .is_some_and(|items| items.iter().any(|item| equals(value, item)))
    };
    let ordered = |accept: fn(Ordering) -> bool| {
        value
            .and_then(|v| compare(v, arg))
            .is_some_and(accept)
    };

    match op {
        "$eq" => equals(value, arg),
        "$ne" => !equals(value, arg),
        "$in" => in_list(arg),
        "$nin" => !in_list(arg),
        "$gt" => ordered(|o| o == Ordering::Greater),
        "$gte" => ordered(|o| o != Ordering::Less),
        "$lt" => ordered(|o| o == Ordering::Less),
        "$lte" => ordered(|o| o != Ordering::Greater),
        "$exists" => value.is_some() == truthy(arg),
        _ => false,
    }
}

/// Equality with MongoDB semantics: a missing field equals `null`, and an
/// array field matches any of its elements.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| bson_eq(item, expected))
        }
        Some(value) => bson_eq(value, expected),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_number(other).map_or(true, |n| n != 0.0),
    }
}

fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let descending = as_number(direction).is_some_and(|d| d < 0.0);
        let left = a.get(field).unwrap_or(&Bson::Null);
        let right = b.get(field).unwrap_or(&Bson::Null);

        // Missing or null values sort first, as in MongoDB.
        let ordering = match (left, right) {
            (Bson::Null, Bson::Null) => Ordering::Equal,
            (Bson::Null, _) => Ordering::Less,
            (_, Bson::Null) => Ordering::Greater,
            _ => compare(left, right).unwrap_or(Ordering::Equal),
        };
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn project(document: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection.filter(|p| !p.is_empty()) else {
        return document.clone();
    };

    let inclusive = projection
        .iter()
        .any(|(field, flag)| field != "_id" && truthy(flag));

    if inclusive {
        let keep_id = projection.get("_id").map_or(true, truthy);
        document
            .iter()
            .filter(|(field, _)| {
                if field.as_str() == "_id" {
                    keep_id
                } else {
                    projection.get(field.as_str()).is_some_and(truthy)
                }
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    } else {
        document
            .iter()
            .filter(|(field, _)| !projection.contains_key(field.as_str()))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

fn apply_update(document: &mut Document, update: &Document) -> StoreResult<()> {
    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::Backend(format!("{op} expects a document")))?;

        match op.as_str() {
            "$set" => {
                for (field, value) in fields {
                    document.insert(field.clone(), value.clone());
                }
            }
            "$addToSet" => {
                for (field, value) in fields {
                    match document.get_mut(field) {
                        Some(Bson::Array(items)) => {
                            if !items.iter().any(|item| bson_eq(item, value)) {
                                items.push(value.clone());
                            }
                        }
                        Some(_) => {
                            return Err(StoreError::Backend(format!(
                                "$addToSet on non-array field {field}"
                            )))
                        }
                        None => {
                            document.insert(field.clone(), Bson::Array(vec![value.clone()]));
                        }
                    }
                }
            }
            "$pull" => {
                for (field, condition) in fields {
                    if let Some(Bson::Array(items)) = document.get_mut(field) {
                        items.retain(|item| !field_matches(Some(item), condition));
                    }
                }
            }
            other => {
                return Err(StoreError::Backend(format!(
                    "unsupported update operator {other}"
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, priority) in [("b", 2), ("a", 1), ("c", 3)] {
            store
                .insert_one("items", doc! { "name": name, "priority": priority, "tags": ["x"] })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_sort_skip_limit_apply_in_order() {
        let store = seeded().await;
        let query = FindQuery {
            sort: Some(doc! { "priority": -1 }),
            skip: Some(1),
            limit: Some(1),
            ..FindQuery::default()
        };

        let found = store.find("items", &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("name").unwrap(), "b");
    }

    #[tokio::test]
    async fn test_operator_filters_and_array_membership() {
        let store = seeded().await;

        let query = FindQuery::filter(doc! { "priority": { "$gte": 2 }, "tags": "x" });
        assert_eq!(store.count("items", &query).await.unwrap(), 2);

        let query = FindQuery::filter(doc! { "name": { "$in": ["a", "z"] } });
        assert_eq!(store.count("items", &query).await.unwrap(), 1);

        let query = FindQuery::filter(doc! { "missing": Bson::Null });
        assert_eq!(store.count("items", &query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_inclusive_projection_keeps_id() {
        let store = seeded().await;
        let query = FindQuery {
            projection: Some(doc! { "name": 1 }),
            ..FindQuery::default()
        };

        let found = store.find("items", &query).await.unwrap();
        assert!(found[0].contains_key("_id"));
        assert!(found[0].contains_key("name"));
        assert!(!found[0].contains_key("priority"));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_inserts_and_updates() {
        let store = InMemoryStore::new().with_unique_index("users", "email");
        store
            .insert_one("users", doc! { "email": "a@x.com" })
            .await
            .unwrap();
        store
            .insert_one("users", doc! { "email": "b@x.com" })
            .await
            .unwrap();

        let err = store
            .insert_one("users", doc! { "email": "a@x.com" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        let err = store
            .update_one(
                "users",
                doc! { "email": "b@x.com" },
                doc! { "$set": { "email": "a@x.com" } },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));

        // Rewriting a document's own value is not a conflict.
        assert!(store
            .update_one(
                "users",
                doc! { "email": "b@x.com" },
                doc! { "$set": { "email": "b@x.com" } },
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_add_to_set_is_idempotent_and_pull_removes() {
        let store = seeded().await;
        let filter = doc! { "name": "a" };

        for _ in 0..2 {
            store
                .update_one("items", filter.clone(), doc! { "$addToSet": { "tags": "y" } })
                .await
                .unwrap();
        }
        let item = store.find_one("items", filter.clone(), None).await.unwrap().unwrap();
        assert_eq!(item.get_array("tags").unwrap().len(), 2);

        store
            .update_one("items", filter.clone(), doc! { "$pull": { "tags": "x" } })
            .await
            .unwrap();
        let item = store.find_one("items", filter, None).await.unwrap().unwrap();
        assert_eq!(item.get_array("tags").unwrap(), &vec![Bson::String("y".into())]);
    }
}
