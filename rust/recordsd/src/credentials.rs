//! Username to password table.
//!
//! Passwords are stored and compared in clear text. This is a known defect
//! of the data format; do not deploy this outside a trusted machine.

use crate::store::{FlatFile, StoreError};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct CredentialTable {
    file: FlatFile<BTreeMap<String, String>>,
}

impl CredentialTable {
    pub fn open(path: &Path) -> Self {
        CredentialTable {
            file: FlatFile::new(path),
        }
    }

    /// Returns false if the username is already registered.
    pub fn register(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let mut users = self.file.load()?;
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(username.to_string(), password.to_string());
        self.file.save(&users)?;
        Ok(true)
    }

    pub fn is_registered(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.file.load()?.contains_key(username))
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let users = self.file.load()?;
        Ok(users.get(username).is_some_and(|stored| stored == password))
    }
}
