//! Transactional store.
//!
//! All rows live in one [`Tables`] value behind an `RwLock`; readers see a
//! consistent snapshot. A transaction mutates the tables in place under the
//! write lock while [`Tables`] journals the before-image of every row it
//! touches. When the closure succeeds, the touched rows are handed to the
//! [`StoreBackend`] as one change set; if either the closure or the backend
//! fails, the journal is replayed backwards and nothing is visible.
//!
//! Backends:
//! - [`MemoryBackend`]: keeps nothing (tests and dev)
//! - [`PostgresBackend`]: one SQL transaction per change set; unique indexes
//!   in the database surface as `Conflict`

mod postgres;
mod rows;
mod tables;

use std::sync::{Arc, RwLock};

use thiserror::Error;

use kidsbook_core::DomainError;

pub use postgres::PostgresBackend;
pub use rows::{Row, RowChange, RowKey};
pub use tables::Tables;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    /// A unique index in the backend rejected a row.
    #[error("{0}")]
    Conflict(String),

    #[error("store backend failed in {operation}: {message}")]
    Backend { operation: &'static str, message: String },
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// Durable side of the store.
///
/// `persist` must apply a whole change set atomically or not at all.
pub trait StoreBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every stored row, used once to rebuild the tables at startup.
    fn load(&self) -> Result<Vec<Row>, StoreError>;

    fn persist(&self, changes: &[RowChange]) -> Result<(), StoreError>;
}

/// Backend that keeps nothing beyond the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryBackend;

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Vec<Row>, StoreError> {
        Ok(Vec::new())
    }

    fn persist(&self, _changes: &[RowChange]) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct Store {
    tables: RwLock<Tables>,
    backend: Arc<dyn StoreBackend>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            backend: Arc::new(MemoryBackend),
        }
    }

    /// Rebuild the tables from everything `backend` holds.
    pub fn open(backend: Arc<dyn StoreBackend>) -> Result<Self, StoreError> {
        let rows = backend.load()?;
        let loaded = rows.len();
        let tables = Tables::from_rows(rows);
        tracing::info!(backend = backend.name(), rows = loaded, "store opened");
        Ok(Self {
            tables: RwLock::new(tables),
            backend,
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run a read-only query against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }

    /// Run `f` atomically. On `Err` nothing it did is visible, in memory or
    /// in the backend. A backend `Conflict` comes back as a domain conflict.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&mut Tables) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError> + From<DomainError>,
    {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.begin();

        let out = match f(&mut *tables) {
            Ok(out) => out,
            Err(e) => {
                tables.rollback();
                return Err(e);
            }
        };

        let changes = tables.pending_changes();
        if !changes.is_empty() {
            if let Err(e) = self.backend.persist(&changes) {
                tables.rollback();
                tracing::warn!(backend = self.backend.name(), error = %e, "change set rejected");
                return Err(match e {
                    StoreError::Conflict(message) => DomainError::conflict(message).into(),
                    other => other.into(),
                });
            }
        }

        tables.commit();
        Ok(out)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("backend", &self.backend.name()).finish_non_exhaustive()
    }
}
