//! Local credential check in front of the dashboard.
//!
//! The backend is the authority for data; this only gates the UI against
//! the account list from the config file.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    pub password: String,
}

impl Account {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }
}

/// Accounts used when the config file names none
pub fn default_accounts() -> Vec<Account> {
    vec![Account::new("webons", "webons!"), Account::new("rcn", "rcn!!")]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "enter both ID and password"),
            Self::InvalidCredentials => write!(f, "ID or password is incorrect"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Check an id/password pair. Returns the canonical account id.
pub fn authenticate(accounts: &[Account], id: &str, password: &str) -> Result<String, AuthError> {
    let id = id.trim();
    if id.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    accounts
        .iter()
        .find(|a| a.id == id && a.password == password)
        .map(|a| a.id.clone())
        .ok_or(AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticate() {
        let accounts = default_accounts();
        assert_eq!(authenticate(&accounts, " webons ", "webons!"), Ok("webons".into()));
        assert_eq!(authenticate(&accounts, "rcn", "rcn!!"), Ok("rcn".into()));
        assert_eq!(
            authenticate(&accounts, "rcn", "webons!"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(authenticate(&accounts, "", "x"), Err(AuthError::MissingCredentials));
        assert_eq!(
            authenticate(&accounts, "webons", ""),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn test_no_accounts_rejects_everyone() {
        assert_eq!(authenticate(&[], "webons", "webons!"), Err(AuthError::InvalidCredentials));
    }
}
