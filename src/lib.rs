use std::error::Error;

pub mod assets;
pub mod config;
pub mod error;
pub mod format;
pub mod guard;
pub mod handler;
pub mod layer;
pub mod model;
pub mod repo;
pub mod store;

/// Flattens an error and its source chain into one log line.
pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
