use rusqlite::{Connection, OptionalExtension};

use crate::models::{HistoryRow, PostRow, UserRow};
use crate::{Database, StoreError};
use quill_types::models::Operation;

/// Placeholder shown when a history entry references a deleted post.
pub const DELETED_POST_TITLE: &str = "[deleted]";
/// Placeholder shown when a user record cannot be resolved.
pub const UNKNOWN_USER: &str = "unknown";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, username, password_hash, now),
            )
            .map_err(map_unique_violation)?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Posts --
    //
    // Every mutation appends its history row in the same transaction, so a
    // post change and its audit entry commit or roll back together.

    pub fn create_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        author_id: &str,
        history_id: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO posts (id, title, content, author_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, title, content, author_id, now),
            )?;
            append_history(&tx, history_id, Operation::Create, author_id, id, now)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        actor_id: &str,
        history_id: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE posts SET title = ?2, content = ?3 WHERE id = ?1",
                (id, title, content),
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            append_history(&tx, history_id, Operation::Edit, actor_id, id, now)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_post(
        &self,
        id: &str,
        actor_id: &str,
        history_id: &str,
        now: &str,
    ) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            append_history(&tx, history_id, Operation::Delete, actor_id, id, now)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.title, p.content, p.author_id, u.username, p.created_at
                 FROM posts p
                 LEFT JOIN users u ON p.author_id = u.id
                 WHERE p.id = ?1",
            )?;
            let row = stmt.query_row([id], map_post_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_posts(&self) -> Result<Vec<PostRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.title, p.content, p.author_id, u.username, p.created_at
                 FROM posts p
                 LEFT JOIN users u ON p.author_id = u.id
                 ORDER BY p.created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_post_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- History --

    /// Newest first. Dangling references come back as placeholders instead of
    /// failing the whole listing.
    pub fn list_history(&self) -> Result<Vec<HistoryRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT h.id, h.operation, h.actor_id, u.username, h.post_id, p.title, h.timestamp
                 FROM history h
                 LEFT JOIN users u ON h.actor_id = u.id
                 LEFT JOIN posts p ON h.post_id = p.id
                 ORDER BY h.timestamp DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(HistoryRow {
                        id: row.get(0)?,
                        operation: row.get(1)?,
                        actor_id: row.get(2)?,
                        actor_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                        post_id: row.get(4)?,
                        post_title: row
                            .get::<_, Option<String>>(5)?
                            .unwrap_or_else(|| DELETED_POST_TITLE.to_string()),
                        timestamp: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM history", [])?;
            Ok(())
        })
    }
}

fn append_history(
    conn: &Connection,
    id: &str,
    operation: Operation,
    actor_id: &str,
    post_id: &str,
    now: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO history (id, operation, actor_id, post_id, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (id, operation.as_str(), actor_id, post_id, now),
    )?;
    Ok(())
}

fn query_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, email, username, password, created_at FROM users WHERE username = ?1",
    )?;
    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn map_post_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        created_at: row.get(5)?,
    })
}

fn map_unique_violation(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::AlreadyExists
        }
        other => other.into(),
    }
}
