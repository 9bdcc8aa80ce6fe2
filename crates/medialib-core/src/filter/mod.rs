//! Search, date filtering and sorting of the asset collection.
//!
//! `FilterPipeline` turns the collection plus `FilterCriteria` into a fresh,
//! shareable `Arc<Vec<Asset>>`, and only recomputes when the collection
//! version or the criteria change.

pub mod criteria;
pub mod pipeline;

pub use criteria::{DateRange, FilterCriteria, SortDirection, SortKey};
pub use pipeline::FilterPipeline;
