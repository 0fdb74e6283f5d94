use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::Error;
use crate::Result;
use crate::StorageError;

/// Bot account identity loaded from `ACCOUNTS_PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub user: String,
    #[serde(default)]
    pub nick: String,
}

impl Account {
    /// The single account identity used for NICK, the persisted desired
    /// set, and self-membership detection: the lowercased nick, falling
    /// back to the user name when no nick is configured.
    pub fn login(&self) -> String {
        if self.nick.is_empty() {
            self.user.to_ascii_lowercase()
        } else {
            self.nick.to_ascii_lowercase()
        }
    }
}

/// OAuth access token loaded from `TOKENS_PATH`. Acquisition and refresh
/// are the external OAuth helper's concern.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    pub access_token: String,
}

pub fn load_account(path: impl AsRef<Path>) -> Result<Account> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|source| StorageError::PathError {
        path: path.to_path_buf(),
        source,
    })?;
    let account: Account =
        serde_json::from_reader(f).map_err(StorageError::Serialization)?;
    if account.user.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "account {} missing required field: user",
            path.display()
        )));
    }
    Ok(account)
}

pub fn load_token(path: impl AsRef<Path>) -> Result<Token> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|source| StorageError::PathError {
        path: path.to_path_buf(),
        source,
    })?;
    let token: Token = serde_json::from_reader(f).map_err(StorageError::Serialization)?;
    if token.access_token.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "token {} missing access_token",
            path.display()
        )));
    }
    Ok(token)
}
