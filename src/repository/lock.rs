//! Row-level advisory lock keyed on `group_id` (spec.md section 4.4, "All
//! write operations acquire a row-level advisory lock..."). On Postgres this
//! is a real `pg_advisory_xact_lock`, scoped to the enclosing transaction.
//! Sqlite has no advisory lock primitive, so tests and any sqlite-backed
//! deployment fall back to an in-process mutex registry keyed by group id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseTransaction, Statement};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::CoreError;

fn registry() -> &'static StdMutex<HashMap<i32, Arc<Mutex<()>>>> {
    static REGISTRY: OnceLock<StdMutex<HashMap<i32, Arc<Mutex<()>>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| StdMutex::new(HashMap::new()))
}

/// Held for the lifetime of a reconciliation transaction. The Postgres
/// variant carries nothing: `pg_advisory_xact_lock` releases itself when the
/// transaction ends, so there's no explicit unlock step to perform here.
pub enum GroupLockGuard {
    Postgres,
    InProcess(OwnedMutexGuard<()>),
}

/// # Errors
/// Returns `CoreError::Database` if the Postgres advisory-lock statement
/// fails.
pub async fn acquire_group_lock(
    txn: &DatabaseTransaction,
    group_id: i32,
) -> Result<GroupLockGuard, CoreError> {
    match txn.get_database_backend() {
        DatabaseBackend::Postgres => {
            txn.execute(Statement::from_sql_and_values(
                DatabaseBackend::Postgres,
                "SELECT pg_advisory_xact_lock(hashtext($1))",
                [group_id.to_string().into()],
            ))
            .await
            .map_err(CoreError::Database)?;
            Ok(GroupLockGuard::Postgres)
        }
        _ => {
            let mutex = registry()
                .lock()
                .unwrap()
                .entry(group_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            Ok(GroupLockGuard::InProcess(mutex.lock_owned().await))
        }
    }
}
