//! User Storage
//! Mission: Persist user accounts and their password hashes with SQLite

use crate::auth::models::{Identity, User};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// User store collaborator used by the auth subsystem and the user endpoints
pub trait UserStore: Send + Sync {
    fn find_by_login(&self, login: &str) -> Result<Option<User>, UserStoreError>;

    fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, UserStoreError>;

    /// Persist a new user. `password_hash` must already be hashed.
    fn create(&self, identity: &Identity, password_hash: &str) -> Result<User, UserStoreError>;

    fn list(&self) -> Result<Vec<User>, UserStoreError>;

    /// Returns false when no user had that id
    fn delete(&self, id: &Uuid) -> Result<bool, UserStoreError>;
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    /// Open (or create) the user database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UserStoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, UserStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), UserStoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                login TEXT UNIQUE NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(User {
            id,
            login: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl UserStore for SqliteUserStore {
    fn find_by_login(&self, login: &str) -> Result<Option<User>, UserStoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, login, first_name, last_name, password_hash, created_at
                 FROM users WHERE login = ?1",
                params![login],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, UserStoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, login, first_name, last_name, password_hash, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn create(&self, identity: &Identity, password_hash: &str) -> Result<User, UserStoreError> {
        let id = Uuid::parse_str(&identity.id).unwrap_or_else(|_| Uuid::new_v4());
        let user = User {
            id,
            login: identity.login.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO users (id, login, first_name, last_name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.login,
                user.first_name,
                user.last_name,
                user.password_hash,
                user.created_at,
            ],
        );

        match inserted {
            Ok(_) => {}
            // Only the login column is UNIQUE; an id clash is a PRIMARY KEY violation
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                return Err(UserStoreError::DuplicateLogin(user.login));
            }
            Err(e) => return Err(e.into()),
        }

        info!("✅ Created user: {} ({})", user.login, user.id);

        Ok(user)
    }

    fn list(&self) -> Result<Vec<User>, UserStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, login, first_name, last_name, password_hash, created_at
             FROM users ORDER BY created_at, login",
        )?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn delete(&self, id: &Uuid) -> Result<bool, UserStoreError> {
        let conn = self.conn.lock();
        let rows_affected =
            conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;

        if rows_affected > 0 {
            info!("🗑️  Deleted user: {}", id);
        }
        Ok(rows_affected > 0)
    }
}

#[derive(Debug)]
pub enum UserStoreError {
    DuplicateLogin(String),
    Sqlite(rusqlite::Error),
}

impl std::fmt::Display for UserStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateLogin(login) => write!(f, "Login already exists: {}", login),
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
        }
    }
}

impl std::error::Error for UserStoreError {}

impl From<rusqlite::Error> for UserStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}
