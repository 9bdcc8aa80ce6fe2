//! Gateway credential handling.
//!
//! The bearer token itself is issued elsewhere; this module only stores it
//! in the OS keychain (`CredentialStore`) and resolves which token to use
//! (`resolve_token`), with an explicit environment override taking precedence.

pub mod credentials;

pub use credentials::{resolve_token, CredentialStore, TOKEN_ENV_VAR};
