//! Persistence models and storage access.

pub mod models;
pub mod store;

pub use store::{PgStore, ReviewStore};
