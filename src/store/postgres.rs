//! Postgres-backed keyed store.
//!
//! All logical tables share one `documents` relation keyed by
//! `(table_name, pk, sk)`; tables without a sort key store `sk = ''`.
//! The item body lives in a JSONB column and the ttl attribute, when the
//! schema has one, is mirrored into `expires_at` so reads can skip and
//! purges can delete expired rows.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{types::Json, PgPool};

use super::{strip_key_attributes, updated_view, Document, Key, KeyedStore, Result, StoreError, TableSchema};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    schema: TableSchema,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: TableSchema) -> Self { Self { pool, schema } }
}

fn into_document(body: Json<Value>) -> Result<Document> {
    match body.0 {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt(format!("stored body is not an object: {other}"))),
    }
}

const LIVE: &str = "(expires_at IS NULL OR expires_at > $4)";

#[async_trait]
impl KeyedStore for PgStore {
    async fn get(&self, key: &Key) -> Result<Document> {
        self.schema.check_key(key)?;
        let row: Option<(Json<Value>,)> = sqlx::query_as(&format!("SELECT body FROM documents WHERE table_name = $1 AND pk = $2 AND sk = $3 AND {LIVE}"))
            .bind(&self.schema.table).bind(&key.partition).bind(key.sort_or_empty()).bind(Utc::now().timestamp())
            .fetch_optional(&self.pool).await?;
        row.map(|(body,)| into_document(body)).ok_or(StoreError::NotFound)?
    }

    async fn put(&self, item: Document) -> Result<Document> {
        let key = self.schema.key_of(&item)?;
        let expires_at = self.schema.expires_at(&item);
        sqlx::query("INSERT INTO documents (table_name, pk, sk, body, expires_at) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (table_name, pk, sk) DO UPDATE SET body = EXCLUDED.body, expires_at = EXCLUDED.expires_at")
            .bind(&self.schema.table).bind(&key.partition).bind(key.sort_or_empty())
            .bind(Json(Value::Object(item.clone()))).bind(expires_at)
            .execute(&self.pool).await?;
        Ok(item)
    }

    async fn put_if_absent(&self, item: Document) -> Result<Document> {
        let key = self.schema.key_of(&item)?;
        let expires_at = self.schema.expires_at(&item);
        // An expired row still holds the slot until purged; it may be replaced.
        let done = sqlx::query("INSERT INTO documents (table_name, pk, sk, body, expires_at) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (table_name, pk, sk) DO UPDATE SET body = EXCLUDED.body, expires_at = EXCLUDED.expires_at WHERE documents.expires_at IS NOT NULL AND documents.expires_at <= $6")
            .bind(&self.schema.table).bind(&key.partition).bind(key.sort_or_empty())
            .bind(Json(Value::Object(item.clone()))).bind(expires_at).bind(Utc::now().timestamp())
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed);
        }
        Ok(item)
    }

    async fn update(&self, key: &Key, fields: Document) -> Result<Document> {
        self.schema.check_key(key)?;
        let fields = strip_key_attributes(&self.schema, fields);
        let expires_at = self.schema.expires_at(&fields);
        let row: Option<(Json<Value>,)> = sqlx::query_as(&format!("UPDATE documents SET body = body || $5, expires_at = COALESCE($6, expires_at) WHERE table_name = $1 AND pk = $2 AND sk = $3 AND {LIVE} RETURNING body"))
            .bind(&self.schema.table).bind(&key.partition).bind(key.sort_or_empty()).bind(Utc::now().timestamp())
            .bind(Json(Value::Object(fields.clone()))).bind(expires_at)
            .fetch_optional(&self.pool).await?;
        let stored = into_document(row.ok_or(StoreError::ConditionFailed)?.0)?;
        Ok(updated_view(&self.schema, key, &stored, &fields))
    }

    async fn delete(&self, key: &Key) -> Result<Document> {
        self.schema.check_key(key)?;
        let row: Option<(Json<Value>, Option<i64>)> = sqlx::query_as("DELETE FROM documents WHERE table_name = $1 AND pk = $2 AND sk = $3 RETURNING body, expires_at")
            .bind(&self.schema.table).bind(&key.partition).bind(key.sort_or_empty())
            .fetch_optional(&self.pool).await?;
        match row {
            Some((body, expires_at)) if expires_at.map_or(true, |at| at > Utc::now().timestamp()) => into_document(body),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn scan(&self) -> Result<Vec<Document>> {
        let rows: Vec<(Json<Value>,)> = sqlx::query_as("SELECT body FROM documents WHERE table_name = $1 AND (expires_at IS NULL OR expires_at > $2) ORDER BY pk, sk")
            .bind(&self.schema.table).bind(Utc::now().timestamp())
            .fetch_all(&self.pool).await?;
        rows.into_iter().map(|(body,)| into_document(body)).collect()
    }

    async fn query(&self, partition: &str) -> Result<Vec<Document>> {
        let rows: Vec<(Json<Value>,)> = sqlx::query_as("SELECT body FROM documents WHERE table_name = $1 AND pk = $2 AND (expires_at IS NULL OR expires_at > $3) ORDER BY sk")
            .bind(&self.schema.table).bind(partition).bind(Utc::now().timestamp())
            .fetch_all(&self.pool).await?;
        rows.into_iter().map(|(body,)| into_document(body)).collect()
    }

    async fn purge_expired(&self) -> Result<u64> {
        let done = sqlx::query("DELETE FROM documents WHERE table_name = $1 AND expires_at IS NOT NULL AND expires_at <= $2")
            .bind(&self.schema.table).bind(Utc::now().timestamp())
            .execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

/// Runs against the database named by `DATABASE_URL`:
/// `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document { value.as_object().cloned().unwrap() }

    #[sqlx::test]
    #[ignore]
    async fn test_update_merges_body_and_never_upserts(pool: PgPool) {
        let store = PgStore::new(pool, TableSchema::products());
        store.put(doc(json!({"id": "p-1", "code": "W1", "model": "old"}))).await.unwrap();
        let view = store.update(&Key::partition("p-1"), doc(json!({"model": "new", "id": "hijack"}))).await.unwrap();
        assert_eq!(Value::Object(view), json!({"id": "p-1", "model": "new"}));
        assert_eq!(store.get(&Key::partition("p-1")).await.unwrap()["code"], "W1");
        assert!(matches!(store.update(&Key::partition("ghost"), doc(json!({"code": "X"}))).await, Err(StoreError::ConditionFailed)));
        assert_eq!(store.scan().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_expiry_hides_and_purges(pool: PgPool) {
        let store = PgStore::new(pool, TableSchema::events());
        let now = Utc::now().timestamp();
        store.put(doc(json!({"pk": "#order_1", "sk": "a", "ttl": now - 1}))).await.unwrap();
        store.put(doc(json!({"pk": "#order_1", "sk": "b", "ttl": now + 300}))).await.unwrap();
        assert_eq!(store.query("#order_1").await.unwrap().len(), 1);
        assert!(matches!(store.get(&Key::composite("#order_1", "a")).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(&Key::composite("#order_1", "a")).await, Err(StoreError::NotFound)));
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        store.update(&Key::composite("#order_1", "b"), doc(json!({"ttl": now - 1}))).await.unwrap();
        assert!(store.query("#order_1").await.unwrap().is_empty());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_put_if_absent_keeps_live_item(pool: PgPool) {
        let store = PgStore::new(pool, TableSchema::events());
        let now = Utc::now().timestamp();
        store.put_if_absent(doc(json!({"pk": "#product_W1", "sk": "x", "requestId": "first", "ttl": now + 300}))).await.unwrap();
        let err = store.put_if_absent(doc(json!({"pk": "#product_W1", "sk": "x", "requestId": "second", "ttl": now + 300}))).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed));
        assert_eq!(store.get(&Key::composite("#product_W1", "x")).await.unwrap()["requestId"], "first");
        store.put(doc(json!({"pk": "#product_W1", "sk": "y", "ttl": now - 1}))).await.unwrap();
        store.put_if_absent(doc(json!({"pk": "#product_W1", "sk": "y", "ttl": now + 300}))).await.unwrap();
        assert_eq!(store.query("#product_W1").await.unwrap().len(), 2);
    }
}
