//! redb-backed [`warden_core::store::Store`] implementation.
//!
//! An `Arc<Database>`, table creation on open, and `spawn_blocking` around
//! every transaction since redb is a synchronous API.

mod codec;
mod keys;
mod tables;
mod tx;

use std::path::Path;
use std::sync::Arc;

use redb::Database;
use warden_core::config::ConnectionTarget;
use warden_core::error::{Error, Result};
use warden_core::store::{ReadTx, Store, WriteTx};

use tables::*;
use tx::{RedbReadTx, RedbWriteTx};

/// Local, single-process [`Store`] backed by a redb database file.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(|e| Error::Internal(format!("open redb database: {e}")))?;

        // Touch every table once so a fresh database doesn't fault on first
        // read.
        let write_txn = db
            .begin_write()
            .map_err(|e| Error::Internal(format!("begin_write: {e}")))?;
        for table in [
            REGISTRIES,
            REGISTRY_NAME_BY_ID,
            ENTRIES_BY_ID,
            SERVER_VERSIONS,
            SKILL_VERSIONS,
            PACKAGES,
            REMOTES,
            ICONS,
            ENTRY_INDEX_BY_REGISTRY,
            ENTRY_INDEX_GLOBAL,
            ENTRY_UNIQUE_BY_REGISTRY,
            LATEST_POINTERS,
            SYNC_STATUS,
        ] {
            let _ = write_txn
                .open_table(table)
                .map_err(|e| Error::Internal(format!("open_table: {e}")))?;
        }
        write_txn
            .commit()
            .map_err(|e| Error::Internal(format!("commit: {e}")))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Builds a store from a validated [`ConnectionTarget`]
    /// (`EngineConfig::connection`). `ConnectionString` is a `redb://` URI
    /// whose path names the database file; `Pool` downcasts to an
    /// already-open `Arc<Database>` for callers that manage the database's
    /// lifecycle themselves.
    pub fn from_connection(target: &ConnectionTarget) -> Result<Self> {
        match target {
            ConnectionTarget::ConnectionString(conn) => {
                let path = conn.strip_prefix("redb://").unwrap_or(conn);
                Self::open(path)
            }
            ConnectionTarget::Pool(pool) => {
                let db = pool
                    .clone()
                    .downcast::<Database>()
                    .map_err(|_| Error::InvalidArgument("connection pool is not an Arc<redb::Database>".into()))?;
                Ok(Self { db })
            }
        }
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish()
    }
}

#[async_trait::async_trait]
impl Store for RedbStore {
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadTx) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let txn = db
                .begin_read()
                .map_err(|e| Error::Internal(format!("begin_read: {e}")))?;
            let tx = RedbReadTx { txn: &txn };
            f(&tx)
        })
        .await
        .map_err(|e| Error::Internal(format!("redb read task panicked: {e}")))?
    }

    async fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WriteTx) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let txn = db
                .begin_write()
                .map_err(|e| Error::Internal(format!("begin_write: {e}")))?;
            let result = {
                let mut tx = RedbWriteTx { txn: &txn };
                f(&mut tx)
            };
            match result {
                Ok(value) => {
                    txn.commit()
                        .map_err(|e| Error::Internal(format!("commit: {e}")))?;
                    Ok(value)
                }
                Err(e) => {
                    // Dropping an uncommitted WriteTransaction aborts it.
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| Error::Internal(format!("redb write task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use warden_core::model::{CreationKind, Registry, RegistryKind};
    use warden_core::store::ReadTx;

    async fn temp_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("warden.redb")).unwrap();
        (store, dir)
    }

    fn sample_registry(name: &str) -> Registry {
        let now = Utc::now();
        Registry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: RegistryKind::Managed,
            creation: CreationKind::Api,
            source_kind: None,
            file_subtype: None,
            format: Registry::default_format(),
            source_config: serde_json::json!({}),
            filter_config: None,
            sync_schedule: None,
            syncable: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_and_read_back_registry() {
        let (store, _dir) = temp_store().await;
        let registry = sample_registry("acme");

        let inserted = registry.clone();
        store
            .write(move |tx| tx.insert_api_registry(inserted))
            .await
            .unwrap();

        let fetched = store
            .read(|tx| tx.get_registry_by_name("acme"))
            .await
            .unwrap();
        assert_eq!(fetched.unwrap().id, registry.id);
    }

    #[test]
    fn from_connection_string_opens_the_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let conn = format!("redb://{}", dir.path().join("warden.redb").display());
        let target = warden_core::config::ConnectionTarget::ConnectionString(conn);
        RedbStore::from_connection(&target).unwrap();
    }

    #[tokio::test]
    async fn duplicate_registry_name_rejected() {
        let (store, _dir) = temp_store().await;
        let a = sample_registry("dup");
        let b = sample_registry("dup");

        store.write(move |tx| tx.insert_api_registry(a)).await.unwrap();
        let result = store.write(move |tx| tx.insert_api_registry(b)).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }
}
