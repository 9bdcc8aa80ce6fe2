//! Selection tracking and bulk operations.
//!
//! - `SelectionSet`: the asset ids the user has selected
//! - `BulkOperations`: favorite/archive/download/delete over a set of ids,
//!   including the batch delete reconciliation against the gateway
//! - `Downloader`: client-side retrieval used by the download action

pub mod bulk;
pub mod download;
pub mod set;

pub use bulk::{BulkAction, BulkOperations, BulkOutcome, BulkStatus};
pub use download::{DownloadItem, Downloader, HttpDownloader};
pub use set::SelectionSet;
