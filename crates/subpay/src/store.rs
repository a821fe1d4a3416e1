//! Persistence of signed delegations, keyed by delegate address.

use alloy::primitives::Address;

use crate::delegation::SignedDelegation;
use crate::error::SubpayError;

/// Trait for key-value storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`). There is no
/// transactional guarantee across keys.
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, SubpayError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), SubpayError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, SubpayError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SubpayError> {
        (**self).set(key, value)
    }
}

/// In-memory store backed by DashMap. Fast but lost on restart.
#[cfg(feature = "full")]
pub struct InMemoryStore {
    entries: dashmap::DashMap<String, String>,
}

#[cfg(feature = "full")]
impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: dashmap::DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(feature = "full")]
impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "full")]
impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SubpayError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SubpayError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Persistent store backed by SQLite. Survives restarts.
#[cfg(feature = "full")]
pub struct SqliteStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

#[cfg(feature = "full")]
impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    ///
    /// On Unix systems, the database file permissions are restricted to 0600
    /// (owner read/write only): stored delegations are bearer authorisations.
    pub fn open(path: &str) -> Result<Self, SubpayError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            PRAGMA journal_mode=WAL;",
        )?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(
                    path = %path,
                    error = %e,
                    "failed to set delegation database file permissions to 0600"
                );
            }
        }

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rusqlite::Connection> {
        match self.conn.lock() {
            Ok(c) => c,
            Err(poisoned) => {
                tracing::error!("delegation store mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(feature = "full")]
impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, SubpayError> {
        use rusqlite::OptionalExtension;
        let conn = self.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SubpayError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

/// Storage key for a delegate: its EIP-55 checksummed address.
pub fn delegation_key(delegate: Address) -> String {
    delegate.to_string()
}

/// Signed delegations keyed by delegate address.
///
/// Only [`SignedDelegation`] can be stored, so unsigned delegations are never
/// persisted. A later `store` for the same delegate overwrites the earlier one.
pub struct DelegationStore<S> {
    backend: S,
}

impl<S: KeyValueStore> DelegationStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn store(&self, delegation: &SignedDelegation) -> Result<(), SubpayError> {
        let key = delegation_key(delegation.delegate());
        let json = serde_json::to_string(delegation)?;
        self.backend.set(&key, &json)?;
        tracing::info!(delegate = %key, "stored signed delegation");
        Ok(())
    }

    /// The delegation stored for `delegate`, or `None` when there is none.
    pub fn get(&self, delegate: Address) -> Result<Option<SignedDelegation>, SubpayError> {
        let key = delegation_key(delegate);
        match self.backend.get(&key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Increment the stored renewal counter of `delegate`'s delegation.
    /// Returns the updated delegation.
    pub fn record_renewal(&self, delegate: Address) -> Result<SignedDelegation, SubpayError> {
        let mut delegation = self
            .get(delegate)?
            .ok_or_else(|| SubpayError::NotFound(format!("no delegation for {delegate}")))?;
        let renewals = delegation.record_renewal()?;
        self.store(&delegation)?;
        tracing::info!(delegate = %delegate, renewals, "recorded renewal");
        Ok(delegation)
    }
}
