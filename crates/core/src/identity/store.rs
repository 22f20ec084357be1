//! Namespaced key-value plugin store and the identity-link key scheme.
//!
//! Links live in the `oauth2_basic` namespace as two rows per account:
//!
//! ```text
//! oauth2_basic_user_<external id>       -> {"user_id": <local id>}
//! oauth2_basic_user_oauth_<local id>    -> {"oauth_id": "<external id>"}
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{json, Value};
use tracing::debug;

use crate::errors::StoreError;

/// Namespace all rows written by this plugin live under.
pub const PLUGIN_NAMESPACE: &str = "oauth2_basic";

/// Durable key-value store owned by the host.
///
/// Point reads and point writes only; no transactions are assumed.
pub trait PluginStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Key for the external id -> local id row.
pub fn external_key(external_id: &str) -> String {
    format!("oauth2_basic_user_{external_id}")
}

/// Key for the local id -> external id row.
pub fn local_key(user_id: i64) -> String {
    format!("oauth2_basic_user_oauth_{user_id}")
}

/// A link row as read back from the store. `user_id` is `None` when the
/// row exists but holds no usable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredLink {
    pub user_id: Option<i64>,
}

/// Typed access to the two link rows.
pub struct IdentityLinks<'a> {
    store: &'a dyn PluginStore,
}

impl<'a> IdentityLinks<'a> {
    pub fn new(store: &'a dyn PluginStore) -> Self {
        Self { store }
    }

    /// The link row for `external_id`, if one exists.
    pub fn find(&self, external_id: &str) -> Result<Option<StoredLink>, StoreError> {
        let row = self.store.get(PLUGIN_NAMESPACE, &external_key(external_id))?;
        let link = row.map(|v| StoredLink {
            user_id: v.get("user_id").and_then(as_user_id),
        });
        debug!(external_id, ?link, "looked up identity link");
        Ok(link)
    }

    /// Local user id linked to `external_id`, if a link row exists and
    /// carries an id.
    pub fn local_user_for(&self, external_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.find(external_id)?.and_then(|link| link.user_id))
    }

    /// External id linked to a local user, if any.
    pub fn external_id_for(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        let row = self.store.get(PLUGIN_NAMESPACE, &local_key(user_id))?;
        Ok(row
            .as_ref()
            .and_then(|v| v.get("oauth_id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }))
    }

    /// Write both link rows. A missing external id is stored as an empty key
    /// suffix and a `null` oauth id.
    pub fn write(&self, external_id: Option<&str>, user_id: i64) -> Result<(), StoreError> {
        self.store.set(
            PLUGIN_NAMESPACE,
            &local_key(user_id),
            json!({ "oauth_id": external_id }),
        )?;
        self.store.set(
            PLUGIN_NAMESPACE,
            &external_key(external_id.unwrap_or_default()),
            json!({ "user_id": user_id }),
        )?;
        debug!(?external_id, user_id, "wrote identity links");
        Ok(())
    }
}

/// Stored ids may come back as numbers or numeric strings.
fn as_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// A process-local [`PluginStore`], for tests and hosts without a database.
#[derive(Default)]
pub struct MemoryPluginStore {
    rows: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryPluginStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all namespaces.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PluginStore for MemoryPluginStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Unavailable("plugin store lock poisoned".into()))?;
        Ok(rows.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Unavailable("plugin store lock poisoned".into()))?;
        rows.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}
