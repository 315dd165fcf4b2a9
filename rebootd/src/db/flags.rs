//! Node and reboot flag tables.
//!
//! - `node`: one row per node with its lifecycle (`alive`, `dying`, `dead`)
//! - `reboot_flag`: one row per node whose flag is set
//!
//! A flag row only exists while the flag is true. Clearing deletes it, so
//! "no row" and "false" are the same thing.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::node::{Life, NodeId};
use rebootd_shared::errors::{RebootError, RebootResult};

use super::{Database, db_err};

/// Node/flag storage wrapping Database.
#[derive(Clone)]
pub struct FlagTable {
    db: Database,
}

impl FlagTable {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Register a node as alive.
    ///
    /// Returns `false` if the node already existed (its life is left as is).
    /// Non-root nodes require their parent to be registered and not dead.
    pub fn add_node(&self, id: &NodeId) -> RebootResult<bool> {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        if let Some(parent) = id.parent() {
            match load_life(&tx, &parent)? {
                Some(life) if !life.is_dead() => {}
                _ => {
                    return Err(RebootError::NotFound(format!(
                        "parent node {} of {}",
                        parent, id
                    )));
                }
            }
        }

        let inserted = db_err!(tx.execute(
            "INSERT OR IGNORE INTO node (id, life, created_at) VALUES (?1, ?2, ?3)",
            params![id, Life::Alive.as_str(), Utc::now().timestamp()],
        ))?;

        db_err!(tx.commit())?;
        Ok(inserted > 0)
    }

    /// Load a node's life, `None` if the node was never registered.
    pub fn node_life(&self, id: &NodeId) -> RebootResult<Option<Life>> {
        let conn = self.db.conn();
        load_life(&conn, id)
    }

    /// Move a node forward in its lifecycle.
    pub fn set_life(&self, id: &NodeId, life: Life) -> RebootResult<()> {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        let current =
            load_life(&tx, id)?.ok_or_else(|| RebootError::NotFound(format!("node {}", id)))?;
        if !current.can_transition_to(life) {
            return Err(RebootError::InvalidState(format!(
                "node {} cannot go from {} to {}",
                id, current, life
            )));
        }

        let rows_affected = db_err!(tx.execute(
            "UPDATE node SET life = ?1 WHERE id = ?2",
            params![life.as_str(), id],
        ))?;
        if rows_affected == 0 {
            return Err(RebootError::NotFound(format!("node {}", id)));
        }

        db_err!(tx.commit())?;
        Ok(())
    }

    // ========================================================================
    // Flag operations
    // ========================================================================

    /// Conditionally write a node's flag.
    ///
    /// Runs in one transaction that asserts the node exists and is not dead.
    /// Returns whether the stored value changed.
    pub fn set_flag(&self, id: &NodeId, flag: bool) -> RebootResult<bool> {
        let mut conn = self.db.conn();
        let tx = db_err!(conn.transaction())?;

        match load_life(&tx, id)? {
            Some(life) if !life.is_dead() => {}
            Some(_) => return Err(RebootError::NotFound(format!("node {} is dead", id))),
            None => return Err(RebootError::NotFound(format!("node {}", id))),
        }

        let current = load_flag(&tx, id)?;
        if current == flag {
            return Ok(false);
        }

        if flag {
            db_err!(tx.execute(
                "INSERT INTO reboot_flag (id, flag, updated_at) VALUES (?1, 1, ?2)",
                params![id, Utc::now().timestamp()],
            ))?;
        } else {
            db_err!(tx.execute("DELETE FROM reboot_flag WHERE id = ?1", params![id]))?;
        }

        db_err!(tx.commit())?;
        Ok(true)
    }

    /// Read one flag; a missing row reads as `false`.
    pub fn get_flag(&self, id: &NodeId) -> RebootResult<bool> {
        let conn = self.db.conn();
        load_flag(&conn, id)
    }

    /// Read the flags of several nodes in one query.
    ///
    /// Nodes without a flag row are absent from the result.
    pub fn get_flags(&self, ids: &[NodeId]) -> RebootResult<HashMap<NodeId, bool>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.db.conn();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, flag FROM reboot_flag WHERE id IN ({})",
            placeholders
        );

        let mut stmt = db_err!(conn.prepare(&sql))?;
        let rows = db_err!(stmt.query_map(params_from_iter(ids.iter()), |row| {
            let id: String = row.get(0)?;
            let flag: bool = row.get(1)?;
            Ok((id, flag))
        }))?;

        let mut result = HashMap::new();
        for row in rows {
            let (id, flag) = db_err!(row)?;
            let id = NodeId::parse(&id).map_err(|e| {
                RebootError::StoreUnavailable(format!("corrupt node id in reboot_flag: {}", e))
            })?;
            result.insert(id, flag);
        }

        Ok(result)
    }
}

fn load_life(conn: &Connection, id: &NodeId) -> RebootResult<Option<Life>> {
    let life: Option<String> = db_err!(
        conn.query_row("SELECT life FROM node WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()
    )?;

    life.map(|s| {
        s.parse::<Life>().map_err(|_| {
            RebootError::StoreUnavailable(format!("corrupt life '{}' for node {}", s, id))
        })
    })
    .transpose()
}

fn load_flag(conn: &Connection, id: &NodeId) -> RebootResult<bool> {
    let flag: Option<bool> = db_err!(
        conn.query_row(
            "SELECT flag FROM reboot_flag WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
    )?;
    Ok(flag.unwrap_or(false))
}
