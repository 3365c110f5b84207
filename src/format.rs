//! Format negotiation and serialization for layer listings.

use serde::Serialize;

use crate::error::FeatureError;
use crate::model::Feature;

/// Output format for a layer listing, chosen by the path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
    GeoJson,
    Csv,
}

/// Splits a `/layer/:segment` path segment into layer name and format.
///
/// The name is everything before the first `.`. A `.csv` suffix selects
/// CSV; no suffix or any other suffix, including the literal `geojson`,
/// selects GeoJSON.
pub fn parse_layer_segment(segment: &str) -> (&str, LayerFormat) {
    match segment.split_once('.') {
        Some((name, "csv")) => (name, LayerFormat::Csv),
        Some((name, _)) => (name, LayerFormat::GeoJson),
        None => (segment, LayerFormat::GeoJson),
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

/// GeoJSON rendering keeps only records typed `"Feature"`.
pub fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        kind: "FeatureCollection",
        features: features
            .into_iter()
            .filter(|f| f.body.is_feature())
            .collect(),
    }
}

/// CSV rendering flattens every record in the layer, typed or not, to a
/// `lng,lat` pair. A record without at least two numeric coordinates fails
/// the whole export; a partial CSV would read as a complete one.
pub fn to_csv(features: &[Feature]) -> Result<String, FeatureError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["lng", "lat"])
        .map_err(|e| FeatureError::Csv(e.to_string()))?;

    for feature in features {
        let (lng, lat) = feature.body.lng_lat().ok_or_else(|| {
            FeatureError::MalformedGeometry(format!(
                "feature {} has no usable geometry coordinates",
                feature.id
            ))
        })?;
        writer
            .write_record([lng.to_string(), lat.to_string()])
            .map_err(|e| FeatureError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| FeatureError::Csv(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
