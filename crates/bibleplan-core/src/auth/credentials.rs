use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "bibleplan";

pub struct CredentialStore;

impl CredentialStore {
    /// Store the sync token for a user in the OS keychain
    pub fn store_token(user_id: &str, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, user_id)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(token)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    pub fn get_token(user_id: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, user_id)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve token from keychain")
    }

    /// Delete the stored token. A missing entry is not an error.
    pub fn delete_token(user_id: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, user_id)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
