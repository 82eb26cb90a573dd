//! HTTP server and routes.

pub(crate) mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Multipart framing adds overhead on top of the file itself.
    let upload_body_limit = state.config.upload.max_size_bytes as usize + 64 * 1024;

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_register))
        .route("/login", post(handlers::auth_login))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let book_routes = Router::new()
        .route("/{id}", get(handlers::get_book))
        .route(
            "/{id}/progress",
            get(handlers::get_progress).put(handlers::update_progress),
        )
        .route("/{id}/url", get(handlers::get_book_url));

    Router::new()
        .route(
            "/books",
            get(handlers::list_books)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .nest("/book", book_routes)
        .route(
            "/upload",
            post(handlers::upload_book).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/read/{token}", get(handlers::read_book))
        .nest("/api/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
