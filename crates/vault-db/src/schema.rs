//! Schema versions for the SQLite store.
//!
//! Version `n` of the schema is `SCHEMA[n - 1]` applied on top of every
//! earlier step. The version a database file is at lives in SQLite's own
//! `user_version` header field, so no bookkeeping table is needed.

use rusqlite::Connection;

use crate::error::StoreError;

/// Upgrade steps, oldest first. Append only.
const SCHEMA: &[&str] = &[include_str!("schema/v1.sql")];

/// Brings `conn` up to the newest schema and returns how many steps ran.
pub(crate) fn upgrade(conn: &Connection) -> Result<usize, StoreError> {
    upgrade_with(conn, SCHEMA)
}

fn upgrade_with(conn: &Connection, steps: &[&str]) -> Result<usize, StoreError> {
    let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let current = usize::try_from(found)
        .ok()
        .filter(|version| *version <= steps.len())
        .ok_or(StoreError::SchemaTooNew {
            found,
            supported: steps.len(),
        })?;

    for (index, sql) in steps.iter().enumerate().skip(current) {
        let version = index + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|source| StoreError::Schema { version, source })?;
        tx.pragma_update(None, "user_version", version as i64)?;
        tx.commit()?;
        tracing::info!(version, "vault schema upgraded");
    }

    Ok(steps.len() - current)
}
