//! Remote asset gateway module.
//!
//! This module provides the `AssetGateway` trait the engine talks to and
//! `GatewayClient`, its HTTP implementation for the asset store's REST API.
//!
//! Every call is authenticated with a bearer token supplied by the caller;
//! a missing token fails before any request is sent.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::GatewayClient;
pub use error::ApiError;
pub use gateway::AssetGateway;
