//! Layer API Module
//!
//! CRUD over geospatial features partitioned into named layers, with the
//! key-ownership write protection and format-negotiated listings
//! (GeoJSON or flattened CSV, chosen by the path suffix).
//!
//! # Usage
//!
//! ```rust,ignore
//! use tinymap::layer;
//!
//! let app = Router::new()
//!     .nest("/layer", layer::routes())
//!     .with_state(app_state);
//! ```

mod handler;
mod routes;

pub use routes::routes;
