//! # Auth Gate
//!
//! The chat surface is only reachable once an identity has been verified.
//! Verification itself happens outside this crate; all Susu keeps is a
//! marker in storage under [`IDENTITY_KEY`]. Logging out removes it.

use std::sync::Arc;

use log::{info, warn};

use crate::core::storage::{Storage, StorageResult};

pub const IDENTITY_KEY: &str = "user_email";

/// Answers "may the chat surface be shown?".
pub trait AuthGate: Send + Sync {
    fn is_verified(&self) -> bool;
    fn logout(&self) -> StorageResult<()>;
}

/// Identity marker kept in the key-value store.
pub struct StoredIdentity {
    storage: Arc<dyn Storage>,
}

impl StoredIdentity {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The verified identity, if one is recorded.
    pub fn identity(&self) -> Option<String> {
        match self.storage.get(IDENTITY_KEY) {
            Ok(Some(value)) => serde_json::from_str::<String>(&value)
                .ok()
                .filter(|id| !id.trim().is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read identity marker: {}", e);
                None
            }
        }
    }

    /// Records an identity that has completed verification.
    pub fn record_verified(&self, identity: &str) -> StorageResult<()> {
        let value = serde_json::to_string(identity.trim())?;
        self.storage.set(IDENTITY_KEY, &value)?;
        info!("Identity verified");
        Ok(())
    }
}

impl AuthGate for StoredIdentity {
    fn is_verified(&self) -> bool {
        self.identity().is_some()
    }

    fn logout(&self) -> StorageResult<()> {
        self.storage.remove(IDENTITY_KEY)?;
        info!("Logged out");
        Ok(())
    }
}
