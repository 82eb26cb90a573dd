//! HTTP request handlers.

use crate::db::{self, BookRecord};
use crate::error::{AppError, Result};
use crate::listing::{self, ListParams, PageInfo};
use crate::progress;
use crate::server::AppState;
use crate::storage::ObjectStore;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
    device_id: Option<String>,
}

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    token: String,
    user_id: String,
    username: String,
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, token) = state
        .auth
        .login(&req.username, &req.password, req.device_id)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<LoginResponse>> {
    let _user = state.auth.register(&req.username, &req.password)?;
    let (user, token) = state.auth.login(&req.username, &req.password, None)?;

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
    }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = bearer_header(&headers).and_then(|h| h.strip_prefix("Bearer ")) {
        state.auth.logout(token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// SHELF API
// ============================================================================

/// Listing response: one page of the owner's shelf plus metadata.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Pagination metadata.
    pub info: PageInfo,
    /// Records on this page, after the status filter.
    pub count: usize,
    /// The records themselves.
    pub books: Vec<BookRecord>,
}

/// List the caller's books with search, sort, pagination and status filter.
pub async fn list_books(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let page = listing::list_books(&state.db, &user.id, &params)?;

    Ok(Json(ListResponse {
        info: page.info,
        count: page.books.len(),
        books: page.books,
    }))
}

/// Metadata edit request. Only title and author are mutable here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    book_id: String,
    title: Option<String>,
    author: Option<String>,
}

/// Update a book's title and/or author.
pub async fn update_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<BookRecord>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &req.book_id, &user.id)?;

    let title = match &req.title {
        Some(t) => {
            let t = t.trim();
            if t.is_empty() {
                return Err(AppError::Validation("Title cannot be empty".to_string()));
            }
            Some(t.to_string())
        }
        None => None,
    };
    let author = req.author.as_deref().map(str::trim).map(str::to_string);

    state
        .db
        .update_book_metadata(&book.id, title.as_deref(), author.as_deref())?;

    let updated = state
        .db
        .get_book(&book.id)?
        .ok_or_else(|| AppError::NotFound("Book".to_string()))?;

    Ok(Json(updated))
}

/// Delete request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBookRequest {
    pub(crate) book_id: String,
}

/// Simple message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

/// Delete a book record. The stored object is orphaned, not removed.
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteBookRequest>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &req.book_id, &user.id)?;

    state.db.delete_book(&book.id)?;
    tracing::info!(book_id = %book.id, owner = %user.id, "Book deleted, object left in storage");

    Ok(Json(MessageResponse {
        message: "Book deleted successfully".to_string(),
    }))
}

/// Fetch a single book owned by the caller.
pub async fn get_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookRecord>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &id, &user.id)?;
    Ok(Json(book))
}

// ============================================================================
// PROGRESS API
// ============================================================================

/// Progress response.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    cfi: Option<String>,
    percentage: f64,
}

/// Get reading progress for a book.
pub async fn get_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ProgressResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &id, &user.id)?;

    Ok(Json(ProgressResponse {
        cfi: book.cfi,
        percentage: book.percentage,
    }))
}

/// Progress update request.
#[derive(Debug, Deserialize)]
pub struct ProgressUpdateRequest {
    cfi: Option<String>,
    percentage: Option<f64>,
}

/// Update reading position and completion percentage.
pub async fn update_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ProgressUpdateRequest>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &id, &user.id)?;

    let cfi = req
        .cfi
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("CFI cannot be empty".to_string()))?;

    let percentage = req
        .percentage
        .ok_or_else(|| AppError::Validation("Percentage must be a number".to_string()))?;
    progress::validate_percentage(percentage)?;

    state.db.update_book_progress(&book.id, cfi, percentage)?;

    Ok(Json(MessageResponse {
        message: "Book progress saved successfully".to_string(),
    }))
}

// ============================================================================
// READ LINKS
// ============================================================================

/// Presigned link response.
#[derive(Debug, Serialize)]
pub struct UrlResponse {
    url: String,
}

/// Issue a fresh time-limited read link for a book.
pub async fn get_book_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<UrlResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let book = get_owned_book(&state, &id, &user.id)?;

    let url = state.issue_read_link(&book)?;
    Ok(Json(UrlResponse { url }))
}

/// Stream book bytes for a live ticket. No bearer check: the ticket token
/// is the grant.
pub async fn read_book(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response<Body>> {
    let ticket = state.redeem_ticket(&token)?;

    let (file, len) = state.store.open(&ticket.object_key).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let filename = ticket
        .object_key
        .rsplit('/')
        .next()
        .unwrap_or("book.epub")
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/epub+zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

// ============================================================================
// UPLOAD PIPELINE
// ============================================================================

/// Upload response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    message: String,
    book_id: String,
    user: String,
    time: i64,
    signed_url: String,
}

/// Accept one EPUB plus metadata, store the bytes and create the record.
///
/// The placeholder record is inserted before the storage write so a
/// durable id exists for the object key; a failed write leaves it keyless
/// and never served.
pub async fn upload_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let user = get_authenticated_user(&state, &headers)?;

    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut file: Option<(Option<String>, Option<String>, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => {
                title = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read title field: {}", e))
                })?);
            }
            Some("author") => {
                author = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read author field: {}", e))
                })?);
            }
            Some("file") | Some("book") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?;
                file = Some((filename, content_type, data));
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;

    let mime_ok = matches!(
        content_type.as_deref(),
        Some("application/epub+zip") | Some("application/octet-stream")
    );
    let ext_ok = filename
        .as_deref()
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".epub"));
    if !mime_ok && !ext_ok {
        return Err(AppError::Validation(
            "Invalid file type. Only .epub allowed".to_string(),
        ));
    }

    let max_size = state.config.upload.max_size_bytes;
    if data.len() as u64 > max_size {
        return Err(AppError::PayloadTooLarge(max_size));
    }

    let title = title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("Title is required".to_string()))?;
    let author = author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    // Placeholder first: the storage key is derived from the record id.
    let now = db::now_timestamp();
    let record = BookRecord {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        author,
        owner_id: user.id.clone(),
        object_key: None,
        cfi: None,
        percentage: 0.0,
        created_at: now,
        updated_at: now,
    };
    state.db.insert_book(&record)?;

    let key = ObjectStore::object_key(&record.owner_id, &record.id);
    if let Err(e) = state.store.put(&key, &data).await {
        tracing::warn!(
            book_id = %record.id,
            error = %e,
            "Storage write failed, record left without object key"
        );
        return Err(e);
    }

    state.db.set_book_object_key(&record.id, &key)?;

    let mut finalized = record;
    finalized.object_key = Some(key);
    let signed_url = state.issue_read_link(&finalized)?;

    tracing::info!(
        book_id = %finalized.id,
        owner = %finalized.owner_id,
        size = data.len(),
        "Book uploaded"
    );

    Ok(Json(UploadResponse {
        message: "Book uploaded successfully".to_string(),
        book_id: finalized.id,
        user: finalized.owner_id,
        time: finalized.created_at,
        signed_url,
    }))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Raw Authorization header value, if any.
fn bearer_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Verify the bearer credential and return the owner.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    state.auth.verify_bearer(bearer_header(headers))
}

/// Fetch a record the caller owns. A record that does not exist and a
/// record owned by someone else surface as the same generic not-found.
fn get_owned_book(state: &AppState, book_id: &str, owner_id: &str) -> Result<BookRecord> {
    let book = state
        .db
        .get_book(book_id)?
        .ok_or_else(|| AppError::NotFound("Book".to_string()))?;

    if book.owner_id != owner_id {
        return Err(AppError::NotFound("Book".to_string()));
    }

    Ok(book)
}
