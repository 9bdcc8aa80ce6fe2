//! Background synchronization with the gateway.
//!
//! `SyncEngine` polls the gateway listing on a fixed interval and merges
//! newly observed assets into the shared collection. The merge is additive:
//! a pass never changes or removes an asset that is already known. Owners
//! receive `SyncUpdate`s carrying only the new assets.

pub mod engine;

pub use engine::{SyncEngine, SyncUpdate, MAX_LISTING_PAGES};
