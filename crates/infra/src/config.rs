//! Configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | none (required by Postgres wiring) |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `DATABASE_ACQUIRE_TIMEOUT_SECS` | `5` |
//! | `PAGE_TOKEN_CIPHER_KEY` | random per process (base64, 32 bytes) |
//! | `DELETE_POLICY` | `soft` (`soft` or `hard`) |
//! | `OUTBOX_RELAY_BATCH_SIZE` | `100` |

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use bookings_core::DeletePolicy;

use crate::paging::PageTokenCipher;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DATABASE_ACQUIRE_TIMEOUT_SECS: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";
pub const PAGE_TOKEN_CIPHER_KEY: &str = "PAGE_TOKEN_CIPHER_KEY";
pub const DELETE_POLICY: &str = "DELETE_POLICY";
pub const OUTBOX_RELAY_BATCH_SIZE: &str = "OUTBOX_RELAY_BATCH_SIZE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or(ConfigError::Missing(DATABASE_URL))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    page_token_key: Option<Vec<u8>>,
    pub delete_policy: DeletePolicy,
    pub outbox_relay_batch_size: u32,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("page_token_key", &self.page_token_key.as_ref().map(|_| "<redacted>"))
            .field("delete_policy", &self.delete_policy)
            .field("outbox_relay_batch_size", &self.outbox_relay_batch_size)
            .finish()
    }
}

impl AppConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseConfig {
            url: get(DATABASE_URL),
            max_connections: parse_or(get(DATABASE_MAX_CONNECTIONS), DATABASE_MAX_CONNECTIONS, 5)?,
            acquire_timeout: Duration::from_secs(parse_or(
                get(DATABASE_ACQUIRE_TIMEOUT_SECS),
                DATABASE_ACQUIRE_TIMEOUT_SECS,
                5,
            )?),
        };

        let page_token_key = match get(PAGE_TOKEN_CIPHER_KEY) {
            Some(encoded) => {
                let key = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ConfigError::invalid(PAGE_TOKEN_CIPHER_KEY, e.to_string()))?;
                if key.len() != PageTokenCipher::KEY_LEN {
                    return Err(ConfigError::invalid(
                        PAGE_TOKEN_CIPHER_KEY,
                        format!("expected {} bytes, got {}", PageTokenCipher::KEY_LEN, key.len()),
                    ));
                }
                Some(key)
            }
            None => None,
        };

        let delete_policy = match get(DELETE_POLICY).as_deref().map(str::trim) {
            None => DeletePolicy::default(),
            Some(v) if v.eq_ignore_ascii_case("soft") => DeletePolicy::Soft,
            Some(v) if v.eq_ignore_ascii_case("hard") => DeletePolicy::Hard,
            Some(other) => {
                return Err(ConfigError::invalid(
                    DELETE_POLICY,
                    format!("expected soft or hard, got {other:?}"),
                ));
            }
        };

        let outbox_relay_batch_size = parse_or(get(OUTBOX_RELAY_BATCH_SIZE), OUTBOX_RELAY_BATCH_SIZE, 100)?;
        if outbox_relay_batch_size == 0 {
            return Err(ConfigError::invalid(OUTBOX_RELAY_BATCH_SIZE, "must be positive"));
        }

        Ok(Self {
            database,
            page_token_key,
            delete_policy,
            outbox_relay_batch_size,
        })
    }

    /// Cipher for page tokens. Without a configured key a random one is
    /// generated, so tokens do not survive a restart.
    pub fn page_token_cipher(&self) -> Result<PageTokenCipher, ConfigError> {
        match &self.page_token_key {
            Some(key) => PageTokenCipher::new(key),
            None => {
                tracing::warn!(
                    setting = PAGE_TOKEN_CIPHER_KEY,
                    "no page token key configured; using a random per-process key"
                );
                Ok(PageTokenCipher::generate())
            }
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.database.url, None);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.delete_policy, DeletePolicy::Soft);
        assert_eq!(config.outbox_relay_batch_size, 100);
        assert_eq!(
            config.database.require_url().unwrap_err(),
            ConfigError::Missing(DATABASE_URL)
        );
    }

    #[test]
    fn explicit_values_are_parsed() {
        let key = STANDARD.encode([7u8; 32]);
        let config = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://localhost/bookings"),
            (DATABASE_MAX_CONNECTIONS, "12"),
            (DELETE_POLICY, "HARD"),
            (PAGE_TOKEN_CIPHER_KEY, key.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.database.require_url().unwrap(), "postgres://localhost/bookings");
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.delete_policy, DeletePolicy::Hard);
        assert!(config.page_token_cipher().is_ok());
        assert!(!format!("{config:?}").contains(&key));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(DELETE_POLICY, "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: DELETE_POLICY, .. }));

        let err = AppConfig::from_lookup(lookup(&[(DATABASE_MAX_CONNECTIONS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: DATABASE_MAX_CONNECTIONS, .. }));

        let short_key = STANDARD.encode([1u8; 16]);
        let err = AppConfig::from_lookup(lookup(&[(PAGE_TOKEN_CIPHER_KEY, short_key.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: PAGE_TOKEN_CIPHER_KEY, .. }));
    }
}
