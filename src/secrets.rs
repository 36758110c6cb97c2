//! Opaque credential access, keyed by (service, account).
//!
//! The pipeline only calls this capability; where secrets actually live is
//! the host's concern. The CLI ships an environment-variable-backed store.

use crate::error::{Result, ShipError};

pub const SERVICE: &str = "shipbatch";
pub const ACCOUNT_CARRIER: &str = "easypost";
pub const ACCOUNT_MARKETPLACE: &str = "manapool";
pub const ACCOUNT_MARKETPLACE_EMAIL: &str = "manapool_email";

/// Named-secret store per (service, account) pair.
pub trait SecretStore: Send + Sync {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;
    fn set(&self, service: &str, account: &str, value: &str) -> Result<()>;
    fn delete(&self, service: &str, account: &str) -> Result<()>;
}

/// Reads secrets from environment variables named `SERVICE_ACCOUNT` in upper
/// snake case (e.g. `SHIPBATCH_EASYPOST`). Read-only: the process environment
/// is not a durable store.
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn var_name(service: &str, account: &str) -> String {
        format!("{service}_{account}")
            .to_uppercase()
            .replace([' ', '-'], "_")
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        let value = std::env::var(Self::var_name(service, account))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(value)
    }

    fn set(&self, _service: &str, _account: &str, _value: &str) -> Result<()> {
        Err(ShipError::Config(
            "environment secret store is read-only".to_string(),
        ))
    }

    fn delete(&self, _service: &str, _account: &str) -> Result<()> {
        Err(ShipError::Config(
            "environment secret store is read-only".to_string(),
        ))
    }
}

/// Fetch a required secret, failing with an auth error naming the variable.
pub fn require(store: &dyn SecretStore, service: &str, account: &str) -> Result<String> {
    store.get(service, account)?.ok_or_else(|| {
        ShipError::Auth(format!(
            "no credential for {service}/{account} (set {})",
            EnvSecretStore::var_name(service, account)
        ))
    })
}
