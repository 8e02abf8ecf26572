//! HTTP request handlers.

use crate::challenge::{self, MonthPacing, MonthSnapshot, ProgressSummary, YearSummary};
use crate::db::{
    self, Book, BookStatus, ChallengeBook, ChallengeRole, LibraryStats, ListSnapshot, Quote,
    ReadingChallenge, ReadingList, ReadingListBook, ReadingListLevel, ReadingLog,
};
use crate::error::{AppError, Result};
use crate::metadata::BookMetadata;
use crate::progress::{self, GoalInfo};
use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn get_book_or_404(state: &AppState, id: &str) -> Result<Book> {
    state
        .db
        .get_book(id)?
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
}

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let stats = state.db.library_stats()?;
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        a {{ color: #0066cc; }}
        .stats {{ background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>📚 {title}</h1>
    <div class="stats">
        <p><strong>{total}</strong> books: {reading} reading, {completed} completed, {to_read} to read</p>
    </div>
    <h2>API</h2>
    <ul>
        <li><a href="/api/books">Library (JSON)</a></li>
        <li><a href="/api/challenges">Challenges (JSON)</a></li>
        <li><a href="/api/lists">Reading lists (JSON)</a></li>
        <li><a href="/api/stats">Stats (JSON)</a></li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
        total = stats.total_books,
        reading = stats.reading,
        completed = stats.completed,
        to_read = stats.to_read,
    );

    Ok(Html(html))
}

// ============================================================================
// BOOK HANDLERS
// ============================================================================

/// Book list query parameters.
#[derive(Debug, Deserialize)]
pub struct BookListParams {
    status: Option<String>,
}

/// List books, optionally filtered by status.
pub async fn books_list(
    State(state): State<AppState>,
    Query(params): Query<BookListParams>,
) -> Result<Json<Vec<Book>>> {
    let status = params
        .status
        .as_deref()
        .map(BookStatus::from_str)
        .transpose()?;

    Ok(Json(state.db.list_books(status)?))
}

/// Book create/update request.
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    title: String,
    author: String,
    page_count: Option<i64>,
    reading_goal_days: Option<i64>,
    cover_url: Option<String>,
    isbn: Option<String>,
    notes: Option<String>,
}

impl BookRequest {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if self.author.trim().is_empty() {
            return Err(AppError::Validation("Author must not be empty".to_string()));
        }
        if let Some(pages) = self.page_count
            && pages <= 0
        {
            return Err(AppError::Validation(
                "Page count must be positive".to_string(),
            ));
        }
        if let Some(days) = self.reading_goal_days
            && days <= 0
        {
            return Err(AppError::Validation(
                "Reading goal must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Add a book to the library (starts on the to-read shelf).
pub async fn books_create(
    State(state): State<AppState>,
    Json(req): Json<BookRequest>,
) -> Result<(StatusCode, Json<Book>)> {
    req.validate()?;

    let now = db::now_timestamp();
    let book = Book {
        id: new_id(),
        title: req.title.trim().to_string(),
        author: req.author.trim().to_string(),
        page_count: req.page_count,
        current_page: 0,
        status: BookStatus::ToRead,
        start_date: None,
        end_date: None,
        reading_goal_days: req.reading_goal_days,
        cover_url: req.cover_url,
        isbn: req.isbn,
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };

    state.db.create_book(&book)?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Add-by-URL request.
#[derive(Debug, Deserialize)]
pub struct FromUrlRequest {
    url: String,
}

/// Add a book from a bookstore product page URL.
pub async fn books_from_url(
    State(state): State<AppState>,
    Json(req): Json<FromUrlRequest>,
) -> Result<(StatusCode, Json<Book>)> {
    let meta = state.store.extract(&req.url).await?;

    let now = db::now_timestamp();
    let book = Book {
        id: new_id(),
        title: meta.title,
        author: meta.author,
        page_count: meta.page_count,
        current_page: 0,
        status: BookStatus::ToRead,
        start_date: None,
        end_date: None,
        reading_goal_days: None,
        cover_url: meta.cover_url,
        isbn: meta.isbn,
        notes: None,
        created_at: now,
        updated_at: now,
    };

    state.db.create_book(&book)?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Get a book by ID.
pub async fn books_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    Ok(Json(get_book_or_404(&state, &id)?))
}

/// Update a book's editable fields.
pub async fn books_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BookRequest>,
) -> Result<Json<Book>> {
    req.validate()?;

    let mut book = get_book_or_404(&state, &id)?;
    book.title = req.title.trim().to_string();
    book.author = req.author.trim().to_string();
    book.page_count = req.page_count;
    book.reading_goal_days = req.reading_goal_days;
    book.cover_url = req.cover_url;
    book.isbn = req.isbn;
    book.notes = req.notes;
    book.updated_at = db::now_timestamp();

    state.db.update_book(&book)?;
    Ok(Json(book))
}

/// Delete a book and its quotes and logs.
pub async fn books_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_book(&id)? {
        return Err(AppError::NotFound(format!("Book not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn apply_transition(
    state: &AppState,
    id: &str,
    f: impl Fn(&Book, chrono::DateTime<chrono::Utc>) -> Result<(Book, db::LogAction)>,
) -> Result<Json<Book>> {
    let book = get_book_or_404(state, id)?;
    let now = chrono::Utc::now();
    let (updated, action) = f(&book, now)?;
    state
        .db
        .apply_book_transition(&updated, action, now.timestamp())?;

    tracing::info!(book_id = id, action = action.as_str(), "Book transition");
    Ok(Json(updated))
}

/// Start (or restart) reading a book.
pub async fn books_start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    apply_transition(&state, &id, progress::start_reading)
}

/// Finish the book currently being read.
pub async fn books_finish(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    apply_transition(&state, &id, progress::finish_reading)
}

/// Abandon the book currently being read.
pub async fn books_abandon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    apply_transition(&state, &id, progress::abandon)
}

/// Put a finished or abandoned book back on the to-read shelf.
pub async fn books_reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    apply_transition(&state, &id, progress::reset_to_list)
}

/// Progress update request.
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    current_page: i64,
}

/// Record the current page.
pub async fn books_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<Book>> {
    let book = get_book_or_404(&state, &id)?;
    let updated = progress::update_progress(&book, req.current_page, chrono::Utc::now())?;
    state.db.update_book_progress(&updated)?;
    Ok(Json(updated))
}

/// Goal projection response.
#[derive(Debug, Serialize)]
pub struct GoalResponse {
    /// Projection, absent when the book has no page count or has not
    /// been started.
    goal: Option<GoalInfo>,
}

/// Project the reading goal for a book.
pub async fn books_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GoalResponse>> {
    let book = get_book_or_404(&state, &id)?;
    let goal = progress::project_goal(&book, &state.config.goal, chrono::Utc::now());
    Ok(Json(GoalResponse { goal }))
}

/// Reading log history for a book, oldest first.
pub async fn books_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReadingLog>>> {
    get_book_or_404(&state, &id)?;
    Ok(Json(state.db.get_logs(&id)?))
}

// ============================================================================
// QUOTE HANDLERS
// ============================================================================

/// Quote request.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    text: String,
    page: Option<i64>,
    note: Option<String>,
}

/// Get quotes for a book.
pub async fn quotes_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Quote>>> {
    get_book_or_404(&state, &id)?;
    Ok(Json(state.db.get_quotes(&id)?))
}

/// Save a quote from a book.
pub async fn quotes_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<QuoteRequest>,
) -> Result<(StatusCode, Json<Quote>)> {
    if req.text.trim().is_empty() {
        return Err(AppError::Validation(
            "Quote text must not be empty".to_string(),
        ));
    }
    get_book_or_404(&state, &id)?;

    let quote = Quote {
        id: new_id(),
        book_id: id,
        text: req.text.trim().to_string(),
        page: req.page,
        note: req.note,
        created_at: db::now_timestamp(),
    };

    state.db.create_quote(&quote)?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// Delete a quote.
pub async fn quotes_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_quote(&id)? {
        return Err(AppError::NotFound(format!("Quote not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// CHALLENGE HANDLERS
// ============================================================================

/// Challenge creation request.
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    year: i64,
    name: String,
    description: Option<String>,
    strategy: Option<String>,
}

/// List all challenges.
pub async fn challenges_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReadingChallenge>>> {
    Ok(Json(state.db.list_challenges()?))
}

/// Create a yearly challenge with its twelve months.
pub async fn challenges_create(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<(StatusCode, Json<ReadingChallenge>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name must not be empty".to_string()));
    }

    let challenge = ReadingChallenge {
        id: new_id(),
        year: req.year,
        name: req.name.trim().to_string(),
        description: req.description,
        strategy: req.strategy,
        is_active: true,
    };

    state.db.create_challenge(&challenge)?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

/// One month within the full challenge tree.
#[derive(Debug, Serialize)]
pub struct MonthDetail {
    /// The month with its books.
    #[serde(flatten)]
    pub snapshot: MonthSnapshot,
    /// Completion counts for the month.
    pub progress: ProgressSummary,
    /// Whether the month's main book is completed.
    pub main_completed: bool,
}

/// Full challenge tree response.
#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    /// The challenge row.
    pub challenge: ReadingChallenge,
    /// All twelve months with their books and progress.
    pub months: Vec<MonthDetail>,
}

fn get_challenge_or_404(state: &AppState, year: i64) -> Result<ReadingChallenge> {
    state
        .db
        .get_challenge_by_year(year)?
        .ok_or_else(|| AppError::NotFound(format!("No challenge for year {}", year)))
}

/// Get a challenge by year with its full month tree.
pub async fn challenges_get(
    State(state): State<AppState>,
    Path(year): Path<i64>,
) -> Result<Json<ChallengeResponse>> {
    let challenge = get_challenge_or_404(&state, year)?;
    let months = state
        .db
        .get_challenge_months(&challenge.id)?
        .into_iter()
        .map(|snapshot| MonthDetail {
            progress: challenge::month_progress(&snapshot.books),
            main_completed: challenge::is_main_completed(&snapshot.books),
            snapshot,
        })
        .collect();

    Ok(Json(ChallengeResponse { challenge, months }))
}

/// Per-month rollup within the year summary.
#[derive(Debug, Serialize)]
pub struct MonthSummary {
    /// Month number, 1-12.
    pub month_number: i64,
    /// Month display name.
    pub month_name: String,
    /// Monthly theme.
    pub theme: Option<String>,
    /// Completion counts for the month.
    pub progress: ProgressSummary,
    /// Whether the month's main book is completed.
    pub main_completed: bool,
}

/// Year summary response.
#[derive(Debug, Serialize)]
pub struct ChallengeSummaryResponse {
    /// The challenge row.
    pub challenge: ReadingChallenge,
    /// Year-level rollup.
    pub year: YearSummary,
    /// Month rollups in calendar order.
    pub months: Vec<MonthSummary>,
}

/// Year summary: overall and per-month completion percentages.
pub async fn challenges_summary(
    State(state): State<AppState>,
    Path(year): Path<i64>,
) -> Result<Json<ChallengeSummaryResponse>> {
    let challenge = get_challenge_or_404(&state, year)?;
    let snapshots = state.db.get_challenge_months(&challenge.id)?;

    let months = snapshots
        .iter()
        .map(|s| MonthSummary {
            month_number: s.month.month_number,
            month_name: s.month.month_name.clone(),
            theme: s.month.theme.clone(),
            progress: challenge::month_progress(&s.books),
            main_completed: challenge::is_main_completed(&s.books),
        })
        .collect();

    Ok(Json(ChallengeSummaryResponse {
        challenge,
        year: challenge::year_progress(&snapshots),
        months,
    }))
}

/// Get one month of a challenge by year and calendar number.
pub async fn challenges_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i64, i64)>,
) -> Result<Json<MonthDetail>> {
    let challenge = get_challenge_or_404(&state, year)?;
    let snapshot = state
        .db
        .get_month_by_number(&challenge.id, month)?
        .ok_or_else(|| AppError::NotFound(format!("No month {} in {}", month, year)))?;

    Ok(Json(MonthDetail {
        progress: challenge::month_progress(&snapshot.books),
        main_completed: challenge::is_main_completed(&snapshot.books),
        snapshot,
    }))
}

// ============================================================================
// MONTH HANDLERS
// ============================================================================

fn get_month_or_404(state: &AppState, id: &str) -> Result<MonthSnapshot> {
    state
        .db
        .get_month(id)?
        .ok_or_else(|| AppError::NotFound(format!("Month not found: {}", id)))
}

/// Get a month with its books.
pub async fn months_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonthSnapshot>> {
    Ok(Json(get_month_or_404(&state, &id)?))
}

/// Month theme update request. An omitted field keeps its stored
/// value; an explicit null clears it.
#[derive(Debug, Deserialize)]
pub struct MonthRequest {
    #[serde(default, deserialize_with = "some_or_null")]
    theme: Option<Option<String>>,
    #[serde(default, deserialize_with = "some_or_null")]
    theme_icon: Option<Option<String>>,
}

/// Deserialize a present field as `Some(value_or_null)` so absent
/// fields stay `None` via the default.
fn some_or_null<'de, D>(de: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

/// Set a month's theme.
pub async fn months_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MonthRequest>,
) -> Result<Json<MonthSnapshot>> {
    let current = get_month_or_404(&state, &id)?;
    let theme = req.theme.unwrap_or(current.month.theme);
    let theme_icon = req.theme_icon.unwrap_or(current.month.theme_icon);
    state
        .db
        .update_month_theme(&id, theme.as_deref(), theme_icon.as_deref())?;
    get_month_or_404(&state, &id).map(Json)
}

/// Month pacing response.
#[derive(Debug, Serialize)]
pub struct MonthPacingResponse {
    /// Completion counts for the month.
    pub progress: ProgressSummary,
    /// Page pacing for the rest of the month.
    pub pacing: MonthPacing,
}

/// Month pacing: pages left and the daily target to finish in time.
pub async fn months_pacing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonthPacingResponse>> {
    let snapshot = get_month_or_404(&state, &id)?;
    let today = chrono::Utc::now().date_naive();

    Ok(Json(MonthPacingResponse {
        progress: challenge::month_progress(&snapshot.books),
        pacing: challenge::month_pacing(&snapshot.books, today),
    }))
}

// ============================================================================
// CHALLENGE BOOK HANDLERS
// ============================================================================

/// Challenge book creation request.
#[derive(Debug, Deserialize)]
pub struct ChallengeBookRequest {
    role: ChallengeRole,
    title: String,
    author: String,
    page_count: Option<i64>,
    cover_url: Option<String>,
    reason: Option<String>,
    linked_book_id: Option<String>,
}

/// Add a book slot to a challenge month.
pub async fn challenge_books_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChallengeBookRequest>,
) -> Result<(StatusCode, Json<ChallengeBook>)> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    get_month_or_404(&state, &id)?;

    let book = ChallengeBook {
        id: new_id(),
        month_id: id,
        role: req.role,
        // Status is decided by the store from the month's main book
        user_status: db::ChallengeBookStatus::Locked,
        title: req.title.trim().to_string(),
        author: req.author.trim().to_string(),
        page_count: req.page_count,
        cover_url: req.cover_url,
        reason: req.reason,
        takeaway: None,
        completed_at: None,
        linked_book_id: req.linked_book_id,
    };

    let stored = state.db.create_challenge_book(&book)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Start reading a challenge book.
pub async fn challenge_books_start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChallengeBook>> {
    Ok(Json(state.db.start_challenge_book(&id)?))
}

/// Mark-as-read request.
#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    takeaway: Option<String>,
}

/// Mark-as-read response.
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// The completed book.
    pub book: ChallengeBook,
    /// Whether it was the month's main book.
    pub was_main: bool,
    /// Bonus book IDs unlocked by this completion.
    pub unlocked: Vec<String>,
}

/// Mark a challenge book as read. Completing a month's main book
/// unlocks its bonus books.
pub async fn challenge_books_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>> {
    let outcome =
        state
            .db
            .mark_challenge_book_read(&id, req.takeaway.as_deref(), db::now_timestamp())?;

    let book = state
        .db
        .get_challenge_book(&id)?
        .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", id)))?;

    Ok(Json(MarkReadResponse {
        book,
        was_main: outcome.was_main,
        unlocked: outcome.unlocked,
    }))
}

/// Takeaway update request.
#[derive(Debug, Deserialize)]
pub struct TakeawayRequest {
    takeaway: String,
}

/// Set or edit a challenge book's takeaway note.
pub async fn challenge_books_takeaway(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TakeawayRequest>,
) -> Result<Json<ChallengeBook>> {
    if !state.db.update_takeaway(&id, &req.takeaway)? {
        return Err(AppError::NotFound(format!(
            "Challenge book not found: {}",
            id
        )));
    }

    state
        .db
        .get_challenge_book(&id)?
        .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", id)))
        .map(Json)
}

// ============================================================================
// READING LIST HANDLERS
// ============================================================================

/// List creation request.
#[derive(Debug, Deserialize)]
pub struct ListRequest {
    name: String,
    description: Option<String>,
}

/// List all reading lists.
pub async fn lists_list(State(state): State<AppState>) -> Result<Json<Vec<ReadingList>>> {
    Ok(Json(state.db.list_lists()?))
}

/// Create a reading list.
pub async fn lists_create(
    State(state): State<AppState>,
    Json(req): Json<ListRequest>,
) -> Result<(StatusCode, Json<ReadingList>)> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("Name must not be empty".to_string()));
    }

    let list = ReadingList {
        id: new_id(),
        name: req.name.trim().to_string(),
        description: req.description,
        created_at: db::now_timestamp(),
    };

    state.db.create_list(&list)?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// Get a reading list with its ordered levels and books.
pub async fn lists_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListSnapshot>> {
    state
        .db
        .get_list(&id)?
        .ok_or_else(|| AppError::NotFound(format!("List not found: {}", id)))
        .map(Json)
}

/// Delete a reading list with its levels and books.
pub async fn lists_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_list(&id)? {
        return Err(AppError::NotFound(format!("List not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Level creation request.
#[derive(Debug, Deserialize)]
pub struct LevelRequest {
    title: String,
    description: Option<String>,
}

/// Append a level to a reading list.
pub async fn levels_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LevelRequest>,
) -> Result<(StatusCode, Json<ReadingListLevel>)> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    if state.db.get_list(&id)?.is_none() {
        return Err(AppError::NotFound(format!("List not found: {}", id)));
    }

    let level = ReadingListLevel {
        id: new_id(),
        list_id: id,
        title: req.title.trim().to_string(),
        description: req.description,
        sort_order: 0,
    };

    let stored = state.db.create_level(&level)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Delete a level with its books.
pub async fn levels_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_level(&id)? {
        return Err(AppError::NotFound(format!("Level not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Reorder request: the complete sibling set in its new order.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    ids: Vec<String>,
}

/// Reorder the levels of a reading list.
pub async fn lists_reorder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ListSnapshot>> {
    if state.db.get_list(&id)?.is_none() {
        return Err(AppError::NotFound(format!("List not found: {}", id)));
    }

    state.db.reorder_levels(&id, &req.ids)?;
    state
        .db
        .get_list(&id)?
        .ok_or_else(|| AppError::NotFound(format!("List not found: {}", id)))
        .map(Json)
}

/// List book creation request.
#[derive(Debug, Deserialize)]
pub struct ListBookRequest {
    title: String,
    author: String,
    cover_url: Option<String>,
    note: Option<String>,
    linked_book_id: Option<String>,
}

/// Append a book to a level.
pub async fn list_books_create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ListBookRequest>,
) -> Result<(StatusCode, Json<ReadingListBook>)> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }

    let book = ReadingListBook {
        id: new_id(),
        level_id: id,
        title: req.title.trim().to_string(),
        author: req.author.trim().to_string(),
        cover_url: req.cover_url,
        note: req.note,
        sort_order: 0,
        linked_book_id: req.linked_book_id,
    };

    let stored = state.db.create_list_book(&book)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Reorder the books of a level.
pub async fn levels_reorder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode> {
    state.db.reorder_level_books(&id, &req.ids)?;
    Ok(StatusCode::OK)
}

/// Remove a book from a level.
pub async fn list_books_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.db.delete_list_book(&id)? {
        return Err(AppError::NotFound(format!("List book not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// METADATA AND STATS
// ============================================================================

/// Metadata search query parameters.
#[derive(Debug, Deserialize)]
pub struct MetadataSearchParams {
    #[serde(default)]
    q: String,
}

/// Metadata search response.
#[derive(Debug, Serialize)]
pub struct MetadataSearchResponse {
    /// Matching books, possibly empty.
    pub results: Vec<BookMetadata>,
}

/// Search the external book catalog. Degrades to an empty result set
/// when the upstream is unreachable.
pub async fn metadata_search(
    State(state): State<AppState>,
    Query(params): Query<MetadataSearchParams>,
) -> Json<MetadataSearchResponse> {
    let results = state.search.search(&params.q).await;
    Json(MetadataSearchResponse { results })
}

/// API: Get library statistics.
pub async fn api_stats(State(state): State<AppState>) -> Result<Json<LibraryStats>> {
    Ok(Json(state.db.library_stats()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_request_distinguishes_absent_from_null() {
        let req: MonthRequest = serde_json::from_str(r#"{"theme_icon": "owl"}"#).unwrap();
        assert_eq!(req.theme, None);
        assert_eq!(req.theme_icon, Some(Some("owl".to_string())));

        let req: MonthRequest = serde_json::from_str(r#"{"theme": null}"#).unwrap();
        assert_eq!(req.theme, Some(None));
        assert_eq!(req.theme_icon, None);

        let req: MonthRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.theme, None);
        assert_eq!(req.theme_icon, None);
    }
}
