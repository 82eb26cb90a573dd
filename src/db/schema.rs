use crate::db::*;
use crate::error::{AppError, Result};
use crate::listing::{SortField, SortOrder, escape_like};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
///
/// Opened once at startup and passed by clone; there is no global
/// connection state.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table (opaque bearer tokens)
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                device_id TEXT,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT,
                owner_id TEXT NOT NULL,
                object_key TEXT,
                cfi TEXT,
                percentage REAL NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Read tickets table (presigned access grants)
            CREATE TABLE IF NOT EXISTS tickets (
                token TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                object_key TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_owner ON books(owner_id);
            CREATE INDEX IF NOT EXISTS idx_books_owner_created ON books(owner_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            CREATE INDEX IF NOT EXISTS idx_tickets_expires ON tickets(expires_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, username, password_hash, display_name, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.display_name,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Validation(format!("Username '{}' already exists", user.username))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, username, password_hash, display_name, created_at, last_login
             FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, username, password_hash, display_name, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, username, password_hash, display_name, created_at, last_login
                 FROM users ORDER BY username",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], user_from_row)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update user password.
    pub fn update_user_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE username = ?2",
                params![password_hash, username],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE username = ?1", params![username])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, device_id, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.token,
                session.user_id,
                session.device_id,
                session.expires_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, device_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    device_id: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a new book record.
    pub fn insert_book(&self, book: &BookRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books (id, title, author, owner_id, object_key, cfi, percentage, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                book.id,
                book.title,
                book.author,
                book.owner_id,
                book.object_key,
                book.cfi,
                book.percentage,
                book.created_at,
                book.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to insert book: {}", e)))?;
        Ok(())
    }

    /// Get a book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<BookRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, title, author, owner_id, object_key, cfi, percentage, created_at, updated_at
             FROM books WHERE id = ?1",
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// Finalize a placeholder record with its storage key.
    pub fn set_book_object_key(&self, id: &str, object_key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET object_key = ?1, updated_at = ?2 WHERE id = ?3",
                params![object_key, now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to set object key: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update title and/or author. Fields passed as `None` are left as-is.
    pub fn update_book_metadata(
        &self,
        id: &str,
        title: Option<&str>,
        author: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET
                    title = COALESCE(?1, title),
                    author = COALESCE(?2, author),
                    updated_at = ?3
                 WHERE id = ?4",
                params![title, author, now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update reading position and completion percentage.
    pub fn update_book_progress(&self, id: &str, cfi: &str, percentage: f64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET cfi = ?1, percentage = ?2, updated_at = ?3 WHERE id = ?4",
                params![cfi, percentage, now_timestamp(), id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update progress: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a book record. The stored object is left behind.
    pub fn delete_book(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Count an owner's books matching the optional search term.
    ///
    /// This is the `total` reported by the listing endpoint; the status
    /// filter is intentionally not part of the predicate.
    pub fn count_owner_books(&self, owner_id: &str, search: Option<&str>) -> Result<i64> {
        let conn = self.conn.lock();
        match search {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(term));
                conn.query_row(
                    "SELECT COUNT(*) FROM books
                     WHERE owner_id = ?1
                       AND (title LIKE ?2 ESCAPE '\\' OR author LIKE ?2 ESCAPE '\\')",
                    params![owner_id, pattern],
                    |row| row.get(0),
                )
            }
            None => conn.query_row(
                "SELECT COUNT(*) FROM books WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            ),
        }
        .map_err(|e| AppError::Internal(format!("Failed to count books: {}", e)))
    }

    /// Fetch one sorted page of an owner's books.
    ///
    /// Text sort fields compare case-insensitively; equal sort keys fall
    /// back to the record id so the order is stable across pages.
    pub fn list_owner_books(
        &self,
        owner_id: &str,
        search: Option<&str>,
        sort: SortField,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BookRecord>> {
        let collate = if sort.is_text() { " COLLATE NOCASE" } else { "" };
        let sql = format!(
            "SELECT id, title, author, owner_id, object_key, cfi, percentage, created_at, updated_at
             FROM books
             WHERE owner_id = ?1{search_clause}
             ORDER BY {column}{collate} {direction}, id ASC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            search_clause = if search.is_some() {
                " AND (title LIKE ?2 ESCAPE '\\' OR author LIKE ?2 ESCAPE '\\')"
            } else {
                ""
            },
            column = sort.column(),
            collate = collate,
            direction = order.keyword(),
            limit_idx = if search.is_some() { 3 } else { 2 },
            offset_idx = if search.is_some() { 4 } else { 3 },
        );

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = match search {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(term));
                stmt.query_map(params![owner_id, pattern, limit, offset], book_from_row)
            }
            None => stmt.query_map(params![owner_id, limit, offset], book_from_row),
        }
        .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(rows)
    }

    // ========== TICKET OPERATIONS ==========

    /// Create a read ticket.
    pub fn create_ticket(&self, ticket: &AccessTicket) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tickets (token, book_id, object_key, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                ticket.token,
                ticket.book_id,
                ticket.object_key,
                ticket.expires_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create ticket: {}", e)))?;
        Ok(())
    }

    /// Get a ticket by token.
    pub fn get_ticket(&self, token: &str) -> Result<Option<AccessTicket>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, book_id, object_key, expires_at FROM tickets WHERE token = ?1",
            params![token],
            |row| {
                Ok(AccessTicket {
                    token: row.get(0)?,
                    book_id: row.get(1)?,
                    object_key: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get ticket: {}", e)))
    }

    /// Delete a ticket.
    pub fn delete_ticket(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM tickets WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete ticket: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired tickets.
    pub fn cleanup_expired_tickets(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM tickets WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup tickets: {}", e)))?;
        Ok(rows)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        created_at: row.get(4)?,
        last_login: row.get(5)?,
    })
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        owner_id: row.get(3)?,
        object_key: row.get(4)?,
        cfi: row.get(5)?,
        percentage: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
