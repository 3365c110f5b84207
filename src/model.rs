use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned feature identifier.
pub type DocumentId = i64;

/// Fields the service owns; they never come from a request body.
const RESERVED_FIELDS: &[&str] = &["id", "layer", "ownerKey"];

/// Client payload for a feature: the GeoJSON fields the service knows
/// about, plus whatever else the client sent kept in an explicit
/// properties map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub feature_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl FeatureBody {
    /// Drops reserved fields from the properties map. The layer always
    /// comes from the URL path and the owner key from the query string.
    pub fn sanitize(&mut self) {
        for field in RESERVED_FIELDS {
            self.properties.remove(*field);
        }
    }

    pub fn is_feature(&self) -> bool {
        self.feature_type.as_deref() == Some("Feature")
    }

    /// First two coordinates of the geometry, for the flattened CSV
    /// export. None when the geometry has no numeric coordinate pair.
    pub fn lng_lat(&self) -> Option<(&Value, &Value)> {
        let coords = self.geometry.as_ref()?.get("coordinates")?.as_array()?;
        let lng = coords.first()?;
        let lat = coords.get(1)?;
        if lng.is_number() && lat.is_number() {
            Some((lng, lat))
        } else {
            None
        }
    }
}

/// Public shape of a stored feature. The owner key is structurally absent
/// here, so it can never leak into a response.
#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    pub id: DocumentId,
    pub layer: String,
    #[serde(flatten)]
    pub body: FeatureBody,
}
