//! Layer key-ownership guard.
//!
//! A layer has no owner until a keyed record lands in it; from then on the
//! stored key is the layer's effective owner key and mismatched keys are
//! turned away. The guard only decides, it never writes a response.

use crate::store::{DocumentFilter, DocumentStore, StoreError};

/// Decides whether a write carrying `key` may touch `layer`.
///
/// A missing or empty key is allowed without consulting the store: the
/// guard only protects layers against *mismatched* keys, so an unkeyed
/// write passes even on a keyed layer. A supplied key is rejected when any
/// document in the layer already carries a different non-empty owner key.
pub async fn check_key(
    store: &dyn DocumentStore,
    layer: &str,
    key: Option<&str>,
) -> Result<bool, StoreError> {
    let key = match key {
        Some(k) if !k.is_empty() => k,
        _ => return Ok(true),
    };

    let conflicting = store
        .find_one(DocumentFilter::LayerKeyedOtherThan {
            layer: layer.to_string(),
            key: key.to_string(),
        })
        .await?;

    if let Some(document) = &conflicting {
        tracing::info!(layer, id = document.id, "key invalid for layer");
    }

    Ok(conflicting.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentContent, DocumentStore, MemoryStore};
    use serde_json::json;

    async fn seed(store: &MemoryStore, layer: &str, owner_key: Option<&str>) {
        store
            .insert(DocumentContent {
                layer: layer.to_string(),
                owner_key: owner_key.map(str::to_string),
                body: json!({}),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn any_key_passes_on_an_unkeyed_layer() {
        let store = MemoryStore::default();
        seed(&store, "parks", None).await;

        assert!(check_key(&store, "parks", Some("abc")).await.unwrap());
        assert!(check_key(&store, "parks", None).await.unwrap());
    }

    #[tokio::test]
    async fn matching_key_passes_and_mismatched_key_is_rejected() {
        let store = MemoryStore::default();
        seed(&store, "parks", Some("abc")).await;

        assert!(check_key(&store, "parks", Some("abc")).await.unwrap());
        assert!(!check_key(&store, "parks", Some("xyz")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_or_empty_key_always_passes_even_on_a_keyed_layer() {
        let store = MemoryStore::default();
        seed(&store, "parks", Some("abc")).await;

        // The asymmetry of the ownership model: only mismatched keys are
        // blocked, absent keys are not.
        assert!(check_key(&store, "parks", None).await.unwrap());
        assert!(check_key(&store, "parks", Some("")).await.unwrap());
    }

    #[tokio::test]
    async fn other_layers_do_not_constrain_the_key() {
        let store = MemoryStore::default();
        seed(&store, "parks", Some("abc")).await;

        assert!(check_key(&store, "rivers", Some("xyz")).await.unwrap());
    }
}
