//! # Session Provider
//!
//! Owns one connection pool per configured backend and hands out [`Session`]s: a scoped
//! unit of work wrapping a single open transaction on one backend.
//!
//! A session is released exactly once. [`Session::commit`] and [`Session::rollback`] consume
//! it; a session that is dropped without either (early return, error, task cancellation)
//! rolls back. [`SessionProvider::scope`] wraps the whole lifecycle: commit on `Ok`,
//! rollback on `Err`.
//!
//! ```rust,ignore
//! let provider = SessionProvider::connect(&settings.backends).await?;
//! let car = provider
//!     .scope(BackendId::Primary, |session| {
//!         Box::pin(async move { engine.create(session, input).await })
//!     })
//!     .await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::config::{BackendConfig, BackendsConfig};
use crate::errors::CrudError;

/// Identity of one independently configured relational backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// Main application database.
    Primary,
    /// Second pool on the main database, kept apart from request traffic.
    PrimaryAsync,
    /// Legacy store A.
    SecondaryA,
    /// Legacy store B.
    SecondaryB,
}

impl BackendId {
    pub const ALL: [Self; 4] = [
        Self::Primary,
        Self::PrimaryAsync,
        Self::SecondaryA,
        Self::SecondaryB,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryAsync => "primary_async",
            Self::SecondaryA => "secondary_a",
            Self::SecondaryB => "secondary_b",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed unit of work accepted by [`SessionProvider::scope`].
pub type ScopedFuture<'s, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 's>>;

/// Hands out sessions on named backends. Cloning is cheap: pools are shared.
#[derive(Clone, Default)]
pub struct SessionProvider {
    backends: Arc<HashMap<BackendId, DatabaseConnection>>,
}

impl fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProvider")
            .field("backends", &self.backends())
            .finish()
    }
}

impl SessionProvider {
    /// Connect every configured backend.
    ///
    /// # Errors
    ///
    /// Returns `CrudError::Connection` naming the first backend that cannot be reached or
    /// fails its warm-up ping.
    pub async fn connect(config: &BackendsConfig) -> Result<Self, CrudError> {
        let mut backends = HashMap::new();
        for (id, backend) in config.configured() {
            let connection = connect_backend(id, backend).await?;
            backends.insert(id, connection);
        }
        Ok(Self {
            backends: Arc::new(backends),
        })
    }

    /// Build a provider from connections that are already open.
    pub fn from_connections(
        connections: impl IntoIterator<Item = (BackendId, DatabaseConnection)>,
    ) -> Self {
        Self {
            backends: Arc::new(connections.into_iter().collect()),
        }
    }

    /// Configured backend identities, in declaration order.
    #[must_use]
    pub fn backends(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|id| self.backends.contains_key(id))
            .collect()
    }

    #[must_use]
    pub fn is_configured(&self, backend: BackendId) -> bool {
        self.backends.contains_key(&backend)
    }

    /// Open a session on `backend`.
    ///
    /// # Errors
    ///
    /// `BackendNotConfigured` if the backend has no pool, `Connection` if a transaction
    /// cannot be started on it.
    pub async fn acquire(&self, backend: BackendId) -> Result<Session, CrudError> {
        let connection = self
            .backends
            .get(&backend)
            .ok_or(CrudError::BackendNotConfigured(backend))?;
        let txn = connection.begin().await.map_err(|err| {
            tracing::error!(backend = %backend, error = %err, "Failed to open session");
            match CrudError::from(err) {
                CrudError::Database(source) => CrudError::Connection {
                    backend: Some(backend),
                    source,
                },
                other => other.on_backend(backend),
            }
        })?;
        tracing::debug!(backend = %backend, "Session opened");
        Ok(Session { backend, txn })
    }

    /// Run `work` inside a session on `backend`: commit if it returns `Ok`, roll back if it
    /// returns `Err`. If the returned future is dropped before completion the session is
    /// dropped with it and rolls back.
    ///
    /// # Errors
    ///
    /// Propagates the error of `work`, or a `CrudError` (converted into `E`) from acquiring
    /// or committing the session.
    pub async fn scope<F, T, E>(&self, backend: BackendId, work: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s Session) -> ScopedFuture<'s, T, E> + Send,
        T: Send,
        E: From<CrudError> + Send,
    {
        let session = self.acquire(backend).await?;
        match work(&session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(backend = %backend, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

async fn connect_backend(
    id: BackendId,
    config: &BackendConfig,
) -> Result<DatabaseConnection, CrudError> {
    // every connection to `sqlite::memory:` opens a separate, empty database
    let max_connections = if config.url.contains(":memory:") {
        1
    } else {
        config.max_connections
    };
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(max_connections)
        .min_connections(config.min_connections.min(max_connections))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);

    let connection = Database::connect(options).await.map_err(|source| {
        tracing::error!(backend = %id, url = %config.redacted_url(), error = %source, "Backend unreachable");
        CrudError::Connection {
            backend: Some(id),
            source,
        }
    })?;

    if config.pre_ping {
        connection.ping().await.map_err(|source| {
            tracing::error!(backend = %id, error = %source, "Backend failed warm-up ping");
            CrudError::Connection {
                backend: Some(id),
                source,
            }
        })?;
    }

    tracing::info!(
        backend = %id,
        url = %config.redacted_url(),
        max_connections = config.max_connections,
        "Backend connected"
    );
    Ok(connection)
}

/// A unit of work on one backend. Not shareable: one session per request or task.
pub struct Session {
    backend: BackendId,
    txn: DatabaseTransaction,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn backend(&self) -> BackendId {
        self.backend
    }

    /// The transaction every statement of this session runs on.
    #[must_use]
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Open a nested atomic unit (a savepoint) inside this session.
    pub(crate) async fn savepoint(&self) -> Result<DatabaseTransaction, CrudError> {
        self.txn
            .begin()
            .await
            .map_err(|err| CrudError::from(err).on_backend(self.backend))
    }

    /// # Errors
    ///
    /// Returns the store error if the commit fails; the transaction is gone either way.
    pub async fn commit(self) -> Result<(), CrudError> {
        let backend = self.backend;
        self.txn
            .commit()
            .await
            .map_err(|err| CrudError::from(err).on_backend(backend))?;
        tracing::debug!(backend = %backend, "Session committed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the store error if the rollback statement fails.
    pub async fn rollback(self) -> Result<(), CrudError> {
        let backend = self.backend;
        self.txn
            .rollback()
            .await
            .map_err(|err| CrudError::from(err).on_backend(backend))?;
        tracing::debug!(backend = %backend, "Session rolled back");
        Ok(())
    }
}

/// Commit `savepoint` if `result` is `Ok`, roll it back otherwise.
pub(crate) async fn settle<T>(
    savepoint: DatabaseTransaction,
    result: Result<T, sea_orm::DbErr>,
) -> Result<T, CrudError> {
    match result {
        Ok(value) => {
            savepoint.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = savepoint.rollback().await {
                tracing::warn!(error = %rollback_err, "Savepoint rollback failed");
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendId::Primary.to_string(), "primary");
        assert_eq!(BackendId::PrimaryAsync.to_string(), "primary_async");
        assert_eq!(BackendId::SecondaryB.as_str(), "secondary_b");
    }

    #[test]
    fn test_backend_id_deserializes_snake_case() {
        let id: BackendId = serde_json::from_str("\"secondary_a\"").unwrap();
        assert_eq!(id, BackendId::SecondaryA);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_is_rejected() {
        let provider = SessionProvider::default();
        let err = provider.acquire(BackendId::SecondaryB).await.unwrap_err();
        assert!(matches!(
            err,
            CrudError::BackendNotConfigured(BackendId::SecondaryB)
        ));
    }
}
