use std::{error::Error, fmt};

use crate::store::StoreError;

/// Everything that can go wrong while serving a feature request. Status
/// mapping lives with the HTTP handlers.
#[derive(Debug)]
pub enum FeatureError {
    /// A write supplied a key that conflicts with the layer's owner key.
    KeyConflict,
    /// The requested document does not exist.
    NotFound,
    /// A CSV export hit a record without a usable coordinate pair.
    MalformedGeometry(String),
    /// Rendering the CSV output itself failed.
    Csv(String),
    /// The document store errored.
    Store(StoreError),
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FeatureError::*;
        match self {
            KeyConflict => write!(f, "KeyConflict"),
            NotFound => write!(f, "NotFound"),
            MalformedGeometry(s) => write!(f, "MalformedGeometry: {}", s),
            Csv(s) => write!(f, "CsvError: {}", s),
            Store(e) => write!(f, "StoreError: {}", e),
        }
    }
}

impl Error for FeatureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        use FeatureError::*;
        match self {
            Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for FeatureError {
    fn from(error: StoreError) -> Self {
        FeatureError::Store(error)
    }
}

impl From<serde_json::Error> for FeatureError {
    fn from(error: serde_json::Error) -> Self {
        FeatureError::Store(StoreError::Corrupt(error))
    }
}
