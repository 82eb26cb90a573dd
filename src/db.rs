mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username for login.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Account creation timestamp.
    pub created_at: i64,
    /// Last login timestamp.
    pub last_login: Option<i64>,
}

/// Authentication session behind an opaque bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Device ID (optional).
    pub device_id: Option<String>,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// One uploaded EPUB, owned by exactly one user.
///
/// `object_key` is absent only between the placeholder insert and the
/// completion of the storage write; a keyless record is never offered for
/// reading. `owner_id` never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    /// Book ID, assigned at creation.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Author, if provided at upload.
    pub author: Option<String>,
    /// ID of the owning user.
    pub owner_id: String,
    /// Opaque key locating the file bytes in the object store.
    pub object_key: Option<String>,
    /// Current position locator (EPUB CFI). `None` means never opened.
    pub cfi: Option<String>,
    /// Completion percentage in [0, 100].
    pub percentage: f64,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Time-limited grant for reading one stored object without authorization.
///
/// A fresh ticket is minted per issued link and redeemed at `/read/{token}`.
#[derive(Debug, Clone)]
pub struct AccessTicket {
    /// Random ticket token.
    pub token: String,
    /// Book the grant was issued for.
    pub book_id: String,
    /// Object key the grant resolves to.
    pub object_key: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
