//! Order repository
//!
//! Orders are stored under `(pk = customer email, sk = order id)`.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Result;
use crate::domain::aggregates::{Billing, Order, OrderProduct, Shipping};
use crate::store::{from_document, to_document, Document, Key, KeyedStore};

/// Stored layout of an order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderItem {
    pk: String,
    sk: String,
    created_at: i64,
    shipping: Shipping,
    billing: Billing,
    products: Vec<OrderProduct>,
}

impl From<Order> for OrderItem {
    fn from(o: Order) -> Self {
        Self { pk: o.email, sk: o.id, created_at: o.created_at, shipping: o.shipping, billing: o.billing, products: o.products }
    }
}

impl From<OrderItem> for Order {
    fn from(i: OrderItem) -> Self {
        Self { email: i.pk, id: i.sk, created_at: i.created_at, shipping: i.shipping, billing: i.billing, products: i.products }
    }
}

fn decode(doc: Document) -> Result<Order> {
    Ok(from_document::<OrderItem>(doc)?.into())
}

fn decode_all(docs: Vec<Document>) -> Result<Vec<Order>> {
    docs.into_iter().map(decode).collect()
}

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn KeyedStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self { Self { store } }

    /// Persists `order` with a new id and creation time; caller values for
    /// either are discarded.
    pub async fn create(&self, mut order: Order) -> Result<Order> {
        order.id = Uuid::new_v4().to_string();
        order.created_at = Utc::now().timestamp_millis();
        self.store.put(to_document(&OrderItem::from(order.clone()))?).await?;
        Ok(order)
    }

    /// Full scan. No pagination.
    pub async fn list_all(&self) -> Result<Vec<Order>> {
        decode_all(self.store.scan().await?)
    }

    pub async fn list_by_email(&self, email: &str) -> Result<Vec<Order>> {
        decode_all(self.store.query(email).await?)
    }

    pub async fn get_one(&self, email: &str, id: &str) -> Result<Order> {
        decode(self.store.get(&Key::composite(email, id)).await?)
    }

    pub async fn delete(&self, email: &str, id: &str) -> Result<Order> {
        decode(self.store.delete(&Key::composite(email, id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::domain::value_objects::{Carrier, PaymentMethod, ShippingType};
    use crate::repository::RepositoryError;
    use crate::store::{MemoryStore, TableSchema};
    use rust_decimal::Decimal;

    fn repo() -> OrderRepository { OrderRepository::new(Arc::new(MemoryStore::new(TableSchema::orders()))) }

    fn order(email: &str) -> Order {
        let shipping = Shipping { kind: ShippingType::Urgent, carrier: Carrier::CarrierB };
        Order::place(email, shipping, PaymentMethod::Credit, &[Product::new("A", "A1", Decimal::new(999, 2))]).unwrap()
    }

    #[tokio::test]
    async fn test_create_overwrites_generated_fields() {
        let repo = repo();
        let mut o = order("a@b.com");
        o.id = "mine".into();
        o.created_at = 1;
        let created = repo.create(o).await.unwrap();
        assert_ne!(created.id, "mine");
        assert!(created.created_at > 1);
        assert_eq!(repo.get_one("a@b.com", &created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_list_by_email_and_all() {
        let repo = repo();
        repo.create(order("a@b.com")).await.unwrap();
        repo.create(order("a@b.com")).await.unwrap();
        repo.create(order("c@d.com")).await.unwrap();
        assert_eq!(repo.list_by_email("a@b.com").await.unwrap().len(), 2);
        assert!(repo.list_by_email("nobody@x.com").await.unwrap().is_empty());
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_returns_prior_then_not_found() {
        let repo = repo();
        let created = repo.create(order("a@b.com")).await.unwrap();
        assert_eq!(repo.delete("a@b.com", &created.id).await.unwrap(), created);
        assert!(matches!(repo.get_one("a@b.com", &created.id).await, Err(RepositoryError::NotFound)));
        assert!(matches!(repo.delete("a@b.com", &created.id).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_lookup_needs_matching_email() {
        let repo = repo();
        let created = repo.create(order("a@b.com")).await.unwrap();
        assert!(matches!(repo.get_one("c@d.com", &created.id).await, Err(RepositoryError::NotFound)));
    }
}
