//! Marketplace credentials.
//!
//! The member-site login uses a username and password; the documented API
//! uses an API key passed as a query parameter. All three come from the
//! environment and are never logged.

use crate::error::{MarketplaceError, Result};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

// =============================================================================
// Configuration
// =============================================================================

/// Names of the environment variables holding credentials.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    pub username_env: String,
    pub password_env: String,
    pub api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: "TJ_USERNAME".to_string(),
            password_env: "TJ_PASSWORD".to_string(),
            api_key_env: "TJ_API_KEY".to_string(),
        }
    }
}

impl CredentialsConfig {
    /// Sets custom environment variable names.
    #[must_use]
    pub fn with_env_vars(
        mut self,
        username_env: impl Into<String>,
        password_env: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        self.username_env = username_env.into();
        self.password_env = password_env.into();
        self.api_key_env = api_key_env.into();
        self
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Member-site login credentials.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Reads credentials from the environment. Missing variables read as
    /// empty and are rejected by [`Credentials::validate`].
    #[must_use]
    pub fn from_env(config: &CredentialsConfig) -> Self {
        Self::new(
            std::env::var(&config.username_env).unwrap_or_default(),
            std::env::var(&config.password_env).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// # Errors
    ///
    /// Returns [`MarketplaceError::MissingCredentials`] if either field is empty.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() || self.password.expose_secret().is_empty() {
            return Err(MarketplaceError::MissingCredentials);
        }
        Ok(())
    }
}

// =============================================================================
// ApiKey
// =============================================================================

/// Key for the documented API. Cheap to clone.
#[derive(Clone)]
pub struct ApiKey(Arc<SecretString>);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Arc::new(SecretString::from(key.into())))
    }

    /// Reads the key from the environment.
    ///
    /// A missing key is not an error here: the marketplace rejects the
    /// unauthenticated calls, and those fail with an HTTP error.
    #[must_use]
    pub fn from_env(config: &CredentialsConfig) -> Self {
        let key = std::env::var(&config.api_key_env).unwrap_or_default();
        if key.is_empty() {
            tracing::warn!(var = %config.api_key_env, "API key not set, API calls will be unauthenticated");
        }
        Self::new(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CredentialsConfig::default();
        assert_eq!(config.username_env, "TJ_USERNAME");
        assert_eq!(config.password_env, "TJ_PASSWORD");
        assert_eq!(config.api_key_env, "TJ_API_KEY");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert!(matches!(
            Credentials::new("", "pw").validate(),
            Err(MarketplaceError::MissingCredentials)
        ));
        assert!(matches!(
            Credentials::new("user", "").validate(),
            Err(MarketplaceError::MissingCredentials)
        ));
        assert!(Credentials::new("user", "pw").validate().is_ok());
    }

    #[test]
    fn test_from_env_missing_vars_fail_validation() {
        let config = CredentialsConfig::default().with_env_vars(
            "UNDERCUT_TEST_MISSING_USER",
            "UNDERCUT_TEST_MISSING_PASSWORD",
            "UNDERCUT_TEST_MISSING_KEY",
        );

        let credentials = Credentials::from_env(&config);
        assert!(credentials.validate().is_err());
        assert!(ApiKey::from_env(&config).is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("advertiser", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("advertiser"));
        assert!(!debug.contains("hunter2"));

        let key = ApiKey::new("abc123secret");
        assert!(!format!("{key:?}").contains("abc123secret"));
        assert_eq!(key.expose(), "abc123secret");
    }
}
