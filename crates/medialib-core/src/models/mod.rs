//! Data models for the media library.
//!
//! - `Asset`: a single media resource with user-editable metadata and local flags
//! - `AssetCollection`: the insertion-ordered in-memory asset set
//! - `Resource`: the gateway's representation of a stored asset

pub mod asset;
pub mod collection;
pub mod resource;

pub use asset::{Asset, AssetFlags, Dimensions, MetadataEdit};
pub use collection::{AssetCollection, SharedCollection};
pub use resource::{BatchDeleteResponse, Resource, SearchQuery, SearchResponse};
