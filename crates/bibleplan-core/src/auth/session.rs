use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CredentialStore;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Environment variable that supplies the sync token directly
const ENV_SYNC_TOKEN: &str = "BIBLEPLAN_SYNC_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A signed-in user together with the token used for remote calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

pub struct Session {
    data_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether a user is signed in.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            let data: SessionData = serde_json::from_str(&contents)
                .context("Failed to parse session file")?;
            self.data = Some(data);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn sign_in(&mut self, user_id: &str) {
        self.data = Some(SessionData {
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        });
    }

    pub fn user_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.user_id.as_str())
    }

    /// The active identity, if a user is signed in and a token can be found.
    /// The environment wins over the keychain.
    pub fn identity(&self) -> Option<Identity> {
        let user_id = self.user_id()?;
        let token = match std::env::var(ENV_SYNC_TOKEN) {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => match CredentialStore::get_token(user_id) {
                Ok(token) => token,
                Err(e) => {
                    debug!(user_id, error = %e, "No sync token available");
                    return None;
                }
            },
        };
        Some(Identity {
            user_id: user_id.to_string(),
            token,
        })
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}
