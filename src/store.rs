//! Document store adapter for feature records.
//!
//! The service only ever talks to the store through the [`DocumentStore`]
//! trait, so the persistent libsql collection and the in-memory fake used
//! by the test suites are interchangeable.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::model::DocumentId;

const SYSTEM_MIGRATIONS: &[(&str, &str)] = &[(
    "system/000_migrations_table.sql",
    include_str!("migrations/system/000_migrations_table.sql"),
)];

const MIGRATIONS: &[(&str, &str)] =
    &[("001_features.sql", include_str!("migrations/001_features.sql"))];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] libsql::Error),
    #[error("stored document is not valid json: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("insert did not return an id")]
    MissingInsertId,
}

/// Everything the store persists for a feature besides its identifier.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub layer: String,
    pub owner_key: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub content: DocumentContent,
}

/// The only filter shapes the service queries with.
#[derive(Debug, Clone)]
pub enum DocumentFilter {
    /// Every document in a layer.
    Layer(String),
    /// A single document by identifier; the layer is not consulted.
    Id(DocumentId),
    /// Documents in `layer` carrying a non-empty owner key other than
    /// `key`. This is the guard's conflict probe.
    LayerKeyedOtherThan { layer: String, key: String },
}

/// Store acknowledgement for update/remove, echoed to clients verbatim.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WriteAck {
    pub affected: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, filter: DocumentFilter) -> Result<Vec<StoredDocument>, StoreError>;
    async fn find_one(&self, filter: DocumentFilter)
    -> Result<Option<StoredDocument>, StoreError>;
    async fn insert(&self, content: DocumentContent) -> Result<StoredDocument, StoreError>;
    async fn update(
        &self,
        id: DocumentId,
        content: DocumentContent,
    ) -> Result<WriteAck, StoreError>;
    async fn remove(&self, id: DocumentId) -> Result<WriteAck, StoreError>;
}

// ============================================================================
// Persistent store
// ============================================================================

const SELECT_DOCUMENT: &str = "SELECT id, layer, owner_key, body FROM features";

pub struct LibsqlStore {
    // Held so the database outlives its connection.
    _db: LibsqlDatabase,
    conn: Connection,
}

impl LibsqlStore {
    pub async fn new(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (name, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, name, sql).await?;
        }
        for (name, sql) in MIGRATIONS {
            Self::run_migration(&conn, name, sql).await?;
        }

        Ok(LibsqlStore { _db: db, conn })
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        let record = r#"
            INSERT OR IGNORE INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(record, libsql::params![name]).await?;
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            // First startup: the ledger table is created by the migration
            // currently being checked.
            Err(e) if e.to_string().contains("no such table") => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn select(&self, filter: &DocumentFilter) -> Result<libsql::Rows, StoreError> {
        let rows = match filter {
            DocumentFilter::Layer(layer) => {
                let sql = format!("{SELECT_DOCUMENT} WHERE layer = ?");
                self.conn.query(&sql, libsql::params![layer.as_str()]).await?
            }
            DocumentFilter::Id(id) => {
                let sql = format!("{SELECT_DOCUMENT} WHERE id = ?");
                self.conn.query(&sql, libsql::params![*id]).await?
            }
            DocumentFilter::LayerKeyedOtherThan { layer, key } => {
                let sql = format!(
                    "{SELECT_DOCUMENT} WHERE layer = ? AND owner_key IS NOT NULL \
                     AND owner_key != '' AND owner_key != ?"
                );
                self.conn
                    .query(&sql, libsql::params![layer.as_str(), key.as_str()])
                    .await?
            }
        };
        Ok(rows)
    }

    fn decode(row: &libsql::Row) -> Result<StoredDocument, StoreError> {
        let id: DocumentId = row.get(0)?;
        let layer: String = row.get(1)?;
        let owner_key: Option<String> = row.get(2)?;
        let raw: String = row.get(3)?;
        let body: Value = serde_json::from_str(&raw)?;
        Ok(StoredDocument {
            id,
            content: DocumentContent {
                layer,
                owner_key,
                body,
            },
        })
    }
}

#[async_trait]
impl DocumentStore for LibsqlStore {
    async fn find(&self, filter: DocumentFilter) -> Result<Vec<StoredDocument>, StoreError> {
        let mut rows = self.select(&filter).await?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(Self::decode(&row)?);
        }
        Ok(documents)
    }

    async fn find_one(
        &self,
        filter: DocumentFilter,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let mut rows = self.select(&filter).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::decode(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, content: DocumentContent) -> Result<StoredDocument, StoreError> {
        let query = "INSERT INTO features (layer, owner_key, body) VALUES (?, ?, ?) RETURNING id";
        let body = serde_json::to_string(&content.body)?;
        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![content.layer.as_str(), content.owner_key.clone(), body],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(StoreError::MissingInsertId);
        };
        let id: DocumentId = row.get(0)?;
        Ok(StoredDocument { id, content })
    }

    async fn update(
        &self,
        id: DocumentId,
        content: DocumentContent,
    ) -> Result<WriteAck, StoreError> {
        let query = "UPDATE features SET layer = ?, owner_key = ?, body = ? WHERE id = ?";
        let body = serde_json::to_string(&content.body)?;
        let affected = self
            .conn
            .execute(
                query,
                libsql::params![content.layer.as_str(), content.owner_key, body, id],
            )
            .await?;
        Ok(WriteAck { affected })
    }

    async fn remove(&self, id: DocumentId) -> Result<WriteAck, StoreError> {
        let affected = self
            .conn
            .execute("DELETE FROM features WHERE id = ?", libsql::params![id])
            .await?;
        Ok(WriteAck { affected })
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory document store with the same id-assignment behavior as the
/// persistent one. Backs the test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: DocumentId,
    documents: BTreeMap<DocumentId, DocumentContent>,
}

fn matches(filter: &DocumentFilter, id: DocumentId, content: &DocumentContent) -> bool {
    match filter {
        DocumentFilter::Layer(layer) => content.layer == *layer,
        DocumentFilter::Id(want) => id == *want,
        DocumentFilter::LayerKeyedOtherThan { layer, key } => {
            content.layer == *layer
                && content
                    .owner_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty() && k != key)
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, filter: DocumentFilter) -> Result<Vec<StoredDocument>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .documents
            .iter()
            .filter(|(id, content)| matches(&filter, **id, content))
            .map(|(id, content)| StoredDocument {
                id: *id,
                content: content.clone(),
            })
            .collect())
    }

    async fn find_one(
        &self,
        filter: DocumentFilter,
    ) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    async fn insert(&self, content: DocumentContent) -> Result<StoredDocument, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.documents.insert(id, content.clone());
        Ok(StoredDocument { id, content })
    }

    async fn update(
        &self,
        id: DocumentId,
        content: DocumentContent,
    ) -> Result<WriteAck, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.documents.get_mut(&id) {
            Some(slot) => {
                *slot = content;
                Ok(WriteAck { affected: 1 })
            }
            None => Ok(WriteAck { affected: 0 }),
        }
    }

    async fn remove(&self, id: DocumentId) -> Result<WriteAck, StoreError> {
        let mut inner = self.inner.lock().await;
        let affected = if inner.documents.remove(&id).is_some() {
            1
        } else {
            0
        };
        Ok(WriteAck { affected })
    }
}
