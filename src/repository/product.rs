//! Product repository

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use super::Result;
use crate::domain::aggregates::Product;
use crate::store::{from_document, to_document, Document, Key, KeyedStore};

#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn KeyedStore>,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self { Self { store } }

    pub async fn get_all(&self) -> Result<Vec<Product>> {
        let items = self.store.scan().await?;
        Ok(items.into_iter().map(from_document::<Product>).collect::<crate::store::Result<Vec<_>>>()?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Product> {
        Ok(from_document(self.store.get(&Key::partition(id)).await?)?)
    }

    /// Resolves `ids` in order. The first unknown id fails the whole lookup.
    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            products.push(self.get_by_id(id).await?);
        }
        Ok(products)
    }

    /// Stores `product` under a freshly generated id, ignoring any id it carried.
    pub async fn create(&self, mut product: Product) -> Result<Product> {
        product.id = Uuid::new_v4().to_string();
        self.store.put(to_document(&product)?).await?;
        Ok(product)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<Product> {
        Ok(from_document(self.store.delete(&Key::partition(id)).await?)?)
    }

    /// Rewrites every mutable field of an existing product.
    pub async fn update(&self, id: &str, product: Product) -> Result<Product> {
        let mut fields = to_document(&product)?;
        fields.remove("id");
        let mut updated: Document = self.store.update(&Key::partition(id), fields).await?;
        updated.insert("id".to_string(), Value::String(id.to_string()));
        Ok(from_document(updated)?)
    }
}
