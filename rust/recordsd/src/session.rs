use crate::credentials::CredentialTable;
use crate::store::StoreError;

/// Login state of the connected operator. Lives only as long as the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn {
        username: String,
    },
}

impl Session {
    /// Checks the password and, on success, switches to `LoggedIn`.
    /// A failed attempt leaves the current state as it was.
    pub fn login(
        &mut self,
        table: &CredentialTable,
        username: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        if !table.verify(username, password)? {
            return Ok(false);
        }
        *self = Session::LoggedIn {
            username: username.to_string(),
        };
        Ok(true)
    }

    pub fn logout(&mut self) {
        *self = Session::LoggedOut;
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Session::LoggedIn { username } => Some(username.as_str()),
            Session::LoggedOut => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.username().is_some()
    }
}
