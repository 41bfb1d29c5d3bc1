//! Keyed document store.
//!
//! Every table is addressed by a partition key and, optionally, a sort key.
//! Operations touch a single item or a single partition; there are no
//! multi-item transactions.
//!
//! Implementations:
//! - `MemoryStore`: in-process map, used by tests and local runs
//! - `PgStore`: Postgres `documents` table via sqlx

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A stored item: a JSON object holding its own key attributes.
pub type Document = Map<String, Value>;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,
    #[error("condition check failed")]
    ConditionFailed,
    #[error("key does not match table '{0}'")]
    InvalidKey(String),
    #[error("item is missing key attribute '{0}'")]
    MissingKeyAttribute(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt item: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Key layout of one logical table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
    /// Attribute holding an epoch-seconds expiry.
    pub ttl_attribute: Option<String>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self { table: table.into(), partition_key: partition_key.into(), sort_key: None, ttl_attribute: None }
    }

    pub fn with_sort_key(mut self, attr: impl Into<String>) -> Self { self.sort_key = Some(attr.into()); self }
    pub fn with_ttl(mut self, attr: impl Into<String>) -> Self { self.ttl_attribute = Some(attr.into()); self }

    pub fn products() -> Self { Self::new("products", "id") }
    pub fn orders() -> Self { Self::new("orders", "pk").with_sort_key("sk") }
    pub fn events() -> Self { Self::new("events", "pk").with_sort_key("sk").with_ttl("ttl") }

    /// Reads the key attributes out of `doc`.
    pub fn key_of(&self, doc: &Document) -> Result<Key> {
        let attr = |name: &str| match doc.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(StoreError::MissingKeyAttribute(name.to_string())),
        };
        let partition = attr(self.partition_key.as_str())?;
        let sort = self.sort_key.as_deref().map(attr).transpose()?;
        Ok(Key { partition, sort })
    }

    pub fn check_key(&self, key: &Key) -> Result<()> {
        if key.sort.is_some() != self.sort_key.is_some() {
            return Err(StoreError::InvalidKey(self.table.clone()));
        }
        Ok(())
    }

    /// Writes the key attributes into `doc`.
    pub fn stamp_key(&self, key: &Key, doc: &mut Document) {
        doc.insert(self.partition_key.clone(), Value::String(key.partition.clone()));
        if let (Some(attr), Some(sort)) = (&self.sort_key, &key.sort) {
            doc.insert(attr.clone(), Value::String(sort.clone()));
        }
    }

    pub fn is_key_attribute(&self, name: &str) -> bool {
        name == self.partition_key || self.sort_key.as_deref() == Some(name)
    }

    pub fn expires_at(&self, doc: &Document) -> Option<i64> {
        self.ttl_attribute.as_deref().and_then(|attr| doc.get(attr)).and_then(Value::as_i64)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub partition: String,
    pub sort: Option<String>,
}

impl Key {
    pub fn partition(partition: impl Into<String>) -> Self { Self { partition: partition.into(), sort: None } }

    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self { partition: partition.into(), sort: Some(sort.into()) }
    }

    pub(crate) fn sort_or_empty(&self) -> &str { self.sort.as_deref().unwrap_or("") }
}

/// Single-table keyed store.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Fetches one item; `NotFound` when absent or expired.
    async fn get(&self, key: &Key) -> Result<Document>;

    /// Writes `item`, replacing whatever was stored under its key.
    async fn put(&self, item: Document) -> Result<Document>;

    /// Writes `item` only when no live item holds its key; `ConditionFailed` otherwise.
    async fn put_if_absent(&self, item: Document) -> Result<Document>;

    /// Overwrites `fields` on an existing item.
    ///
    /// Fails with `ConditionFailed` when the key does not exist; never
    /// creates an item. Key attributes inside `fields` are ignored. Returns the
    /// written fields as stored, merged with the key attributes. A ttl
    /// attribute among `fields` moves the item's expiry with it.
    async fn update(&self, key: &Key, fields: Document) -> Result<Document>;

    /// Removes one item and returns what was stored.
    async fn delete(&self, key: &Key) -> Result<Document>;

    async fn scan(&self) -> Result<Vec<Document>>;

    /// All items of one partition, ordered by sort key.
    async fn query(&self, partition: &str) -> Result<Vec<Document>>;

    /// Deletes items whose ttl attribute is due. Returns how many went.
    async fn purge_expired(&self) -> Result<u64>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt(format!("expected an object, got {other}"))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Picks the updated fields out of the post-update item and re-attaches the key.
pub(crate) fn updated_view(schema: &TableSchema, key: &Key, stored: &Document, fields: &Document) -> Document {
    let mut view: Document = fields.keys()
        .filter_map(|name| stored.get(name).map(|v| (name.clone(), v.clone())))
        .collect();
    schema.stamp_key(key, &mut view);
    view
}

pub(crate) fn strip_key_attributes(schema: &TableSchema, mut fields: Document) -> Document {
    fields.retain(|name, _| !schema.is_key_attribute(name));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document { value.as_object().cloned().unwrap() }

    #[test]
    fn test_key_of_composite() {
        let key = TableSchema::orders().key_of(&doc(json!({"pk": "a@b.com", "sk": "o-1"}))).unwrap();
        assert_eq!(key, Key::composite("a@b.com", "o-1"));
    }
    #[test]
    fn test_key_of_missing_sort() {
        let err = TableSchema::orders().key_of(&doc(json!({"pk": "a@b.com"}))).unwrap_err();
        assert!(matches!(err, StoreError::MissingKeyAttribute(ref a) if a == "sk"));
    }
    #[test]
    fn test_check_key_shape() {
        assert!(TableSchema::products().check_key(&Key::partition("p")).is_ok());
        assert!(TableSchema::products().check_key(&Key::composite("p", "s")).is_err());
        assert!(TableSchema::orders().check_key(&Key::partition("p")).is_err());
    }
    #[test]
    fn test_updated_view_only_carries_written_fields() {
        let schema = TableSchema::products();
        let stored = doc(json!({"id": "p-1", "code": "C2", "model": "X"}));
        let view = updated_view(&schema, &Key::partition("p-1"), &stored, &doc(json!({"code": "C2"})));
        assert_eq!(Value::Object(view), json!({"id": "p-1", "code": "C2"}));
    }
    #[test]
    fn test_expires_at() {
        assert_eq!(TableSchema::events().expires_at(&doc(json!({"ttl": 42}))), Some(42));
        assert_eq!(TableSchema::orders().expires_at(&doc(json!({"ttl": 42}))), None);
    }
}
