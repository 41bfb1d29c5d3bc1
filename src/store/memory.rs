//! In-process keyed store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{strip_key_attributes, updated_view, Document, Key, KeyedStore, Result, StoreError, TableSchema};

type Slot = (String, String);

#[derive(Debug)]
pub struct MemoryStore {
    schema: TableSchema,
    items: RwLock<BTreeMap<Slot, Document>>,
}

impl MemoryStore {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema, items: RwLock::new(BTreeMap::new()) }
    }

    fn slot(key: &Key) -> Slot { (key.partition.clone(), key.sort_or_empty().to_string()) }

    fn live(&self, doc: &Document, now: i64) -> bool {
        self.schema.expires_at(doc).map_or(true, |at| at > now)
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, key: &Key) -> Result<Document> {
        self.schema.check_key(key)?;
        let now = Utc::now().timestamp();
        let items = self.items.read().await;
        items.get(&Self::slot(key)).filter(|d| self.live(d, now)).cloned().ok_or(StoreError::NotFound)
    }

    async fn put(&self, item: Document) -> Result<Document> {
        let key = self.schema.key_of(&item)?;
        self.items.write().await.insert(Self::slot(&key), item.clone());
        Ok(item)
    }

    async fn put_if_absent(&self, item: Document) -> Result<Document> {
        let key = self.schema.key_of(&item)?;
        let now = Utc::now().timestamp();
        let mut items = self.items.write().await;
        let slot = Self::slot(&key);
        if items.get(&slot).is_some_and(|d| self.live(d, now)) {
            return Err(StoreError::ConditionFailed);
        }
        items.insert(slot, item.clone());
        Ok(item)
    }

    async fn update(&self, key: &Key, fields: Document) -> Result<Document> {
        self.schema.check_key(key)?;
        let fields = strip_key_attributes(&self.schema, fields);
        let now = Utc::now().timestamp();
        let mut items = self.items.write().await;
        let stored = items.get_mut(&Self::slot(key)).ok_or(StoreError::ConditionFailed)?;
        if !self.live(stored, now) { return Err(StoreError::ConditionFailed); }
        for (name, value) in &fields {
            stored.insert(name.clone(), value.clone());
        }
        Ok(updated_view(&self.schema, key, stored, &fields))
    }

    async fn delete(&self, key: &Key) -> Result<Document> {
        self.schema.check_key(key)?;
        let now = Utc::now().timestamp();
        let removed = self.items.write().await.remove(&Self::slot(key));
        removed.filter(|d| self.live(d, now)).ok_or(StoreError::NotFound)
    }

    async fn scan(&self) -> Result<Vec<Document>> {
        let now = Utc::now().timestamp();
        let items = self.items.read().await;
        Ok(items.values().filter(|d| self.live(d, now)).cloned().collect())
    }

    async fn query(&self, partition: &str) -> Result<Vec<Document>> {
        let now = Utc::now().timestamp();
        let items = self.items.read().await;
        Ok(items.iter()
            .filter(|((pk, _), d)| pk == partition && self.live(d, now))
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, d| self.live(d, now));
        Ok((before - items.len()) as u64)
    }
}
