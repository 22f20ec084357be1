//! Typed query helpers: the SQLite-backed plugin store and user directory.

use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use serde_json::Value;
use tracing::debug;

use super::Database;
use crate::errors::{DatabaseError, StoreError};
use crate::identity::{email_key, PluginStore, UserDirectory};
use crate::models::{NewUser, User};

/// A row from the `plugin_store_rows` table.
#[derive(Debug, Clone)]
pub struct PluginStoreRow {
    pub plugin_name: String,
    pub key: String,
    pub value: Value,
    pub updated_at: String,
}

const USER_COLUMNS: &str = "id, username, name, email, title, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        title: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Plugin store
// ---------------------------------------------------------------------------

impl PluginStore for Database {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM plugin_store_rows WHERE plugin_name = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(&value)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO plugin_store_rows (plugin_name, key, value_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (plugin_name, key)
             DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![namespace, key, text, now],
        )?;
        debug!(namespace, key, "plugin store row written");
        Ok(())
    }
}

impl Database {
    /// All rows in a namespace, ordered by key.
    pub fn list_plugin_rows(&self, namespace: &str) -> Result<Vec<PluginStoreRow>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT plugin_name, key, value_json, updated_at
             FROM plugin_store_rows WHERE plugin_name = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![namespace], |row| {
                let text: String = row.get(2)?;
                Ok(PluginStoreRow {
                    plugin_name: row.get(0)?,
                    key: row.get(1)?,
                    value: serde_json::from_str(&text).unwrap_or(Value::String(text)),
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of local users.
    pub fn count_users(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// User directory
// ---------------------------------------------------------------------------

impl UserDirectory for Database {
    fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE email_key = ?1 ORDER BY id LIMIT 1"
                ),
                params![email_key(email)],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT INTO users (username, name, email, email_key, title, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                new_user.username,
                new_user.name,
                new_user.email,
                new_user.email.as_deref().map(email_key),
                now
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::Conflict {
                    entity: "username".into(),
                    value: new_user.username.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        debug!(id, username = %new_user.username, "created user");
        Ok(User {
            id,
            username: new_user.username.clone(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            title: None,
            created_at: now,
        })
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE users SET username = ?1, name = ?2, email = ?3, email_key = ?4, title = ?5
             WHERE id = ?6",
            params![
                user.username,
                user.name,
                user.email,
                user.email.as_deref().map(email_key),
                user.title,
                user.id
            ],
        );
        let changed = match updated {
            Ok(n) => n,
            Err(e) if is_constraint_violation(&e) => {
                return Err(StoreError::Conflict {
                    entity: "username".into(),
                    value: user.username.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user.id.to_string(),
            }
            .into());
        }
        debug!(id = user.id, "saved user");
        Ok(())
    }
}
