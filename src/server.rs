//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let book_routes = Router::new()
        .route("/", get(handlers::books_list))
        .route("/", post(handlers::books_create))
        .route("/from-url", post(handlers::books_from_url))
        .route("/{id}", get(handlers::books_get))
        .route("/{id}", put(handlers::books_update))
        .route("/{id}", delete(handlers::books_delete))
        // Lifecycle transitions
        .route("/{id}/start", post(handlers::books_start))
        .route("/{id}/finish", post(handlers::books_finish))
        .route("/{id}/abandon", post(handlers::books_abandon))
        .route("/{id}/reset", post(handlers::books_reset))
        .route("/{id}/progress", put(handlers::books_progress))
        .route("/{id}/goal", get(handlers::books_goal))
        .route("/{id}/logs", get(handlers::books_logs))
        // Quotes by book
        .route("/{id}/quotes", get(handlers::quotes_list))
        .route("/{id}/quotes", post(handlers::quotes_create));

    let challenge_routes = Router::new()
        .route("/", get(handlers::challenges_list))
        .route("/", post(handlers::challenges_create))
        .route("/{year}", get(handlers::challenges_get))
        .route("/{year}/summary", get(handlers::challenges_summary))
        .route("/{year}/months/{month}", get(handlers::challenges_month));

    let month_routes = Router::new()
        .route("/{id}", get(handlers::months_get))
        .route("/{id}", put(handlers::months_update))
        .route("/{id}/pacing", get(handlers::months_pacing))
        .route("/{id}/books", post(handlers::challenge_books_create));

    let challenge_book_routes = Router::new()
        .route("/{id}/start", post(handlers::challenge_books_start))
        .route("/{id}/read", post(handlers::challenge_books_read))
        .route("/{id}/takeaway", put(handlers::challenge_books_takeaway));

    let list_routes = Router::new()
        .route("/", get(handlers::lists_list))
        .route("/", post(handlers::lists_create))
        .route("/{id}", get(handlers::lists_get))
        .route("/{id}", delete(handlers::lists_delete))
        .route("/{id}/levels", post(handlers::levels_create))
        .route("/{id}/reorder", put(handlers::lists_reorder));

    let level_routes = Router::new()
        .route("/{id}", delete(handlers::levels_delete))
        .route("/{id}/books", post(handlers::list_books_create))
        .route("/{id}/reorder", put(handlers::levels_reorder));

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/stats", get(handlers::api_stats))
        .route("/api/metadata/search", get(handlers::metadata_search))
        .route("/api/quotes/{id}", delete(handlers::quotes_delete))
        .route("/api/list-books/{id}", delete(handlers::list_books_delete))
        .nest("/api/books", book_routes)
        .nest("/api/challenges", challenge_routes)
        .nest("/api/months", month_routes)
        .nest("/api/challenge-books", challenge_book_routes)
        .nest("/api/lists", list_routes)
        .nest("/api/levels", level_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
