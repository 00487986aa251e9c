//! Geo-tagged reviews: a SQLite-backed review store with rating and
//! great-circle proximity filtering.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod geo;
pub mod models;
pub mod seed;

pub use db::Database;
pub use error::{Result, ReviewError};
pub use filter::{ReviewFilter, ReviewQuery};
pub use geo::GeoPoint;
pub use models::review::{Rating, Review, ReviewDraft, ReviewId, ReviewPatch};
