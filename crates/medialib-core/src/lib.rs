//! Core library for medialib.
//!
//! Keeps a local, responsive view of the assets held by a remote asset store:
//!
//! - `api`: gateway trait and the HTTP client implementing it
//! - `cache`: TTL response cache for listing calls
//! - `sync`: background polling with additive merge
//! - `filter`: debounced search, date bucketing and sorting
//! - `render`: virtualized render window
//! - `selection`: selection set and bulk operations
//! - `library`: the controller that owns all of the above for one view

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod filter;
pub mod library;
pub mod models;
pub mod render;
pub mod selection;
pub mod sync;
pub mod timing;
pub mod utils;

pub use library::{LibraryView, MediaLibrary};
