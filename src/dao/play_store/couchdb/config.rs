use std::env;

use super::error::{CouchDaoError, CouchResult};

const BASE_URL_VAR: &str = "COUCH_BASE_URL";
const DATABASE_VAR: &str = "COUCH_DB";
const USERNAME_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";

/// Where the plays database lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the `p::<puzzle>-<uid>` documents.
    pub database: String,
    /// Basic-auth user, sent only together with a password.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Anonymous access to `database` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Authenticate with basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read the `COUCH_*` variables; the plays database defaults to
    /// `default_database` from the application config.
    pub fn from_env(default_database: &str) -> CouchResult<Self> {
        let base_url = env::var(BASE_URL_VAR)
            .ok()
            .filter(|url| !url.is_empty())
            .ok_or(CouchDaoError::MissingEnvVar { var: BASE_URL_VAR })?;
        let database = env::var(DATABASE_VAR)
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| default_database.to_owned());

        let config = Self::new(base_url, database);
        Ok(match (env::var(USERNAME_VAR), env::var(PASSWORD_VAR)) {
            (Ok(username), Ok(password)) => config.with_credentials(username, password),
            _ => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_optional() {
        let anonymous = CouchConfig::new("http://couch:5984", "plays");
        assert!(anonymous.username.is_none() && anonymous.password.is_none());

        let authed = anonymous.with_credentials("admin", "secret");
        assert_eq!(authed.username.as_deref(), Some("admin"));
        assert_eq!(authed.password.as_deref(), Some("secret"));
    }
}
