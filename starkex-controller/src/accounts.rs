//! Path-addressed key-pair cache with lazy persistence.
//!
//! `AccountKeyStore` owns the derivation-path → key-pair mapping, the single
//! "active" key pair, and the synchronization with the persistence
//! collaborator. The whole load/derive/persist sequence runs under one
//! mutex, so concurrent requests cannot double-load the mapping or lose a
//! derived key to a read-modify-write race.
//!
//! The active key pair is tracked as a path into the mapping, never as a
//! detached copy: it always aliases a live entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use starkex_crypto::{derive_key_pair, felt_to_hex, parse_felt, FieldElement, KeyPair};

use crate::error::ControllerError;
use crate::store::Store;

/// Default persistence key for the account mapping.
pub const DEFAULT_ACCOUNT_MAPPING_KEY: &str = "STARKWARE_ACCOUNT_MAPPING";

#[derive(Debug, Default)]
struct KeyStoreState {
    /// Whether the mapping has been fetched from the store. Set exactly once
    /// per controller instance.
    loaded: bool,
    /// Path → hex private scalar. Single source of truth; the persisted
    /// value mirrors this after every successful derivation.
    mapping: BTreeMap<String, String>,
    /// Path of the active key pair. Always a key of `mapping` when set.
    active: Option<String>,
}

/// The controller's key-pair cache and identity authority.
pub struct AccountKeyStore {
    master_secret: Vec<u8>,
    mapping_key: String,
    store: Arc<dyn Store>,
    state: Mutex<KeyStoreState>,
}

impl AccountKeyStore {
    /// Create a key store over `store`, persisting under `mapping_key`.
    pub fn new(
        master_secret: impl Into<Vec<u8>>,
        mapping_key: impl Into<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            master_secret: master_secret.into(),
            mapping_key: mapping_key.into(),
            store,
            state: Mutex::new(KeyStoreState::default()),
        }
    }

    /// Fetch the persisted mapping if it has not been fetched yet.
    /// Idempotent: repeated calls after the first never re-fetch.
    pub async fn ensure_loaded(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await
    }

    /// The current path → private-scalar mapping (loading it first if
    /// needed).
    pub async fn mapping(&self) -> Result<BTreeMap<String, String>, ControllerError> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await?;
        Ok(state.mapping.clone())
    }

    /// Path of the active key pair, if any.
    pub async fn active_path(&self) -> Result<Option<String>, ControllerError> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await?;
        Ok(state.active.clone())
    }

    /// Resolve a key pair.
    ///
    /// - `None`: the active pair, or `NoActiveKey` if none exists.
    /// - `Some(path)` already cached: reconstructed from its stored scalar;
    ///   which pair is active does not change.
    /// - `Some(path)` unseen: derived from the master secret, cached,
    ///   persisted, and promoted to active.
    pub async fn key_pair(&self, path: Option<&str>) -> Result<KeyPair, ControllerError> {
        let mut state = self.state.lock().await;
        self.load_locked(&mut state).await?;

        let path = match path {
            None => {
                let active = state.active.clone().ok_or(ControllerError::NoActiveKey)?;
                return rebuild_pair(&state.mapping, &active);
            }
            Some(path) => path,
        };

        if state.mapping.contains_key(path) {
            return rebuild_pair(&state.mapping, path);
        }

        let pair = derive_key_pair(&self.master_secret, path)?;
        state
            .mapping
            .insert(path.to_string(), pair.private_key_hex());
        state.active = Some(path.to_string());
        // In-memory state is updated first; a failed persist aborts the call
        // rather than being swallowed.
        self.persist_locked(&state).await?;
        debug!(path, "derived and activated stark key pair");
        Ok(pair)
    }

    /// Public identity for a path (or the active pair). Never exposes the
    /// private scalar.
    pub async fn stark_public_key(
        &self,
        path: Option<&str>,
    ) -> Result<FieldElement, ControllerError> {
        Ok(self.key_pair(path).await?.public_key())
    }

    /// Assert that `claimed` is the public identity of the active key pair.
    ///
    /// This is the authorization gate every state-mutating operation passes
    /// before building a transaction or producing a signature. It resolves
    /// without a path on purpose: the claim is always checked against the
    /// active pair.
    pub async fn assert_active_identity(
        &self,
        claimed: &str,
    ) -> Result<(), ControllerError> {
        let active = self.key_pair(None).await?.public_key();
        let claimed = parse_felt(claimed)?;
        if active != claimed {
            warn!(
                claimed = %felt_to_hex(&claimed),
                active = %felt_to_hex(&active),
                "stark public key mismatch"
            );
            return Err(ControllerError::IdentityMismatch);
        }
        Ok(())
    }

    async fn load_locked(&self, state: &mut KeyStoreState) -> Result<(), ControllerError> {
        if state.loaded {
            return Ok(());
        }
        if let Some(value) = self.store.get(&self.mapping_key).await? {
            state.mapping = serde_json::from_value(value)?;
        }
        state.loaded = true;
        if state.active.is_none() {
            // First entry (smallest path) becomes active on load.
            state.active = state.mapping.keys().next().cloned();
        }
        debug!(
            entries = state.mapping.len(),
            active = state.active.as_deref().unwrap_or("<none>"),
            "account mapping loaded"
        );
        Ok(())
    }

    async fn persist_locked(&self, state: &KeyStoreState) -> Result<(), ControllerError> {
        let value: Value = serde_json::to_value(&state.mapping)?;
        self.store.set(&self.mapping_key, value).await?;
        Ok(())
    }
}

fn rebuild_pair(
    mapping: &BTreeMap<String, String>,
    path: &str,
) -> Result<KeyPair, ControllerError> {
    let scalar = mapping.get(path).ok_or(ControllerError::NoActiveKey)?;
    Ok(KeyPair::from_private_key_hex(scalar)?)
}
