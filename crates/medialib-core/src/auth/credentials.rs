use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "medialib";

/// Environment variable that overrides the stored token
pub const TOKEN_ENV_VAR: &str = "MEDIALIB_TOKEN";

pub struct CredentialStore;

impl CredentialStore {
    /// Store the gateway token for an account in the OS keychain
    pub fn store(account: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    /// Retrieve the gateway token for an account from the OS keychain
    pub fn get_token(account: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve token from keychain")
    }

    /// Delete the stored token for an account
    pub fn delete(account: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }
}

/// Pick the token to use: a non-empty override wins, then the keychain.
/// Returns None when neither has one; callers surface that as a missing
/// credential rather than retrying.
pub fn resolve_token(env_override: Option<String>, account: &str) -> Option<String> {
    if let Some(token) = env_override.filter(|t| !t.trim().is_empty()) {
        return Some(token.trim().to_string());
    }
    match CredentialStore::get_token(account) {
        Ok(token) if !token.is_empty() => Some(token),
        Ok(_) => None,
        Err(e) => {
            debug!(account = account, error = %e, "No stored gateway token");
            None
        }
    }
}
