//! Application state shared across handlers.

use crate::auth::{self, AuthService};
use crate::config::Config;
use crate::db::{AccessTicket, BookRecord, Database, now_timestamp};
use crate::error::{AppError, Result};
use crate::storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Object store for book bytes.
    pub store: Arc<ObjectStore>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: Config, db: Database, auth: AuthService, store: ObjectStore) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            store: Arc::new(store),
        }
    }

    /// Base URL for issued links.
    pub fn base_url(&self) -> String {
        self.config.server.public_url.trim_end_matches('/').to_string()
    }

    /// Mint a fresh read link for a finalized record.
    ///
    /// A record whose object key is still unset is not offered for
    /// reading. Every call issues a new ticket; links are never cached.
    pub fn issue_read_link(&self, book: &BookRecord) -> Result<String> {
        let object_key = book
            .object_key
            .as_deref()
            .ok_or_else(|| AppError::NotFound("Book".to_string()))?;

        let ticket = AccessTicket {
            token: auth::generate_token(),
            book_id: book.id.clone(),
            object_key: object_key.to_string(),
            expires_at: now_timestamp() + self.config.links.ttl_seconds as i64,
        };

        self.db.create_ticket(&ticket)?;
        Ok(format!("{}/read/{}", self.base_url(), ticket.token))
    }

    /// Redeem a live ticket. Expired tickets are dropped on sight and
    /// surface as the same generic not-found as unknown tokens.
    pub fn redeem_ticket(&self, token: &str) -> Result<AccessTicket> {
        let ticket = self
            .db
            .get_ticket(token)?
            .ok_or_else(|| AppError::NotFound("Link".to_string()))?;

        if ticket.expires_at < now_timestamp() {
            self.db.delete_ticket(token)?;
            return Err(AppError::NotFound("Link".to_string()));
        }

        Ok(ticket)
    }

    /// Run one maintenance pass over expired sessions and tickets.
    pub fn run_maintenance(&self) -> Result<()> {
        let sessions = self.db.cleanup_expired_sessions()?;
        let tickets = self.db.cleanup_expired_tickets()?;

        if sessions > 0 || tickets > 0 {
            tracing::debug!(sessions, tickets, "Reaped expired sessions and tickets");
        }

        Ok(())
    }
}
