//! Layer-scoped CRUD over the document store.

use std::sync::Arc;

use crate::error::FeatureError;
use crate::model::{DocumentId, Feature, FeatureBody};
use crate::store::{DocumentContent, DocumentFilter, DocumentStore, StoredDocument, WriteAck};

#[derive(Clone)]
pub struct FeatureRepository {
    store: Arc<dyn DocumentStore>,
}

impl FeatureRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        FeatureRepository { store }
    }

    /// The underlying adapter, for callers that query outside the CRUD
    /// surface (the ownership guard).
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Every feature in a layer, in store order.
    pub async fn list_by_layer(&self, layer: &str) -> Result<Vec<Feature>, FeatureError> {
        let documents = self
            .store
            .find(DocumentFilter::Layer(layer.to_string()))
            .await?;
        documents.into_iter().map(project).collect()
    }

    /// Fetch by identifier. Deliberately not layer-scoped: an id lookup
    /// ignores the layer path segment.
    pub async fn get_by_id(&self, id: DocumentId) -> Result<Feature, FeatureError> {
        let document = self
            .store
            .find_one(DocumentFilter::Id(id))
            .await?
            .ok_or(FeatureError::NotFound)?;
        project(document)
    }

    /// Inserts a feature into `layer`. A non-empty `key` is persisted as
    /// the document's owner key; this is the only operation that does so.
    pub async fn create(
        &self,
        layer: &str,
        key: Option<&str>,
        mut body: FeatureBody,
    ) -> Result<Feature, FeatureError> {
        body.sanitize();
        let content = DocumentContent {
            layer: layer.to_string(),
            owner_key: key.filter(|k| !k.is_empty()).map(str::to_string),
            body: serde_json::to_value(&body)?,
        };
        let stored = self.store.insert(content).await?;
        project(stored)
    }

    /// Replaces the stored document wholesale: the path layer is
    /// re-stamped over whatever the body claimed, and any stored owner key
    /// is dropped with the rest of the old document.
    pub async fn update(
        &self,
        id: DocumentId,
        layer: &str,
        mut body: FeatureBody,
    ) -> Result<WriteAck, FeatureError> {
        body.sanitize();
        let content = DocumentContent {
            layer: layer.to_string(),
            owner_key: None,
            body: serde_json::to_value(&body)?,
        };
        let ack = self.store.update(id, content).await?;
        if ack.affected == 0 {
            return Err(FeatureError::NotFound);
        }
        Ok(ack)
    }

    pub async fn delete(&self, id: DocumentId) -> Result<WriteAck, FeatureError> {
        let ack = self.store.remove(id).await?;
        if ack.affected == 0 {
            return Err(FeatureError::NotFound);
        }
        Ok(ack)
    }
}

/// Projection to the public shape: the owner key is dropped on the floor
/// and the store identifier becomes the public id.
fn project(document: StoredDocument) -> Result<Feature, FeatureError> {
    let body: FeatureBody = serde_json::from_value(document.content.body)?;
    Ok(Feature {
        id: document.id,
        layer: document.content.layer,
        body,
    })
}
