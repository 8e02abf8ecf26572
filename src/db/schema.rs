use crate::challenge::{self, MarkReadOutcome, MonthSnapshot};
use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A reading list with its levels and their books.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ListSnapshot {
    /// The list row.
    pub list: ReadingList,
    /// Levels in sort order, each with its books in sort order.
    pub levels: Vec<LevelSnapshot>,
}

/// A reading list level with its books.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LevelSnapshot {
    /// The level row.
    pub level: ReadingListLevel,
    /// Books in sort order.
    pub books: Vec<ReadingListBook>,
}

/// Library-wide dashboard counts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LibraryStats {
    /// Total books.
    pub total_books: i64,
    /// Books on the to-read shelf.
    pub to_read: i64,
    /// Books currently being read.
    pub reading: i64,
    /// Books completed.
    pub completed: i64,
    /// Books abandoned.
    pub dnf: i64,
    /// Pages read across completed books.
    pub pages_read: i64,
}

/// Validate a requested sibling permutation against the current set and
/// produce the new dense sort orders.
fn plan_reorder(current: &[String], requested: &[String]) -> Result<Vec<(String, i64)>> {
    if requested.len() != current.len() {
        return Err(AppError::Validation(format!(
            "Reorder must cover all {} siblings, got {}",
            current.len(),
            requested.len()
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for id in requested {
        if !current.contains(id) {
            return Err(AppError::Validation(format!("Unknown sibling id: {}", id)));
        }
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("Duplicate sibling id: {}", id)));
        }
    }

    Ok(requested
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i as i64))
        .collect())
}

fn level_exists(conn: &Connection, level_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM reading_list_levels WHERE id = ?1",
        params![level_id],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(|e| AppError::Internal(format!("Failed to get level: {}", e)))
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
            PRAGMA foreign_keys = ON;

            -- Books table
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                page_count INTEGER,
                current_page INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'TO_READ',
                start_date INTEGER,
                end_date INTEGER,
                reading_goal_days INTEGER,
                cover_url TEXT,
                isbn TEXT,
                notes TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Quotes table
            CREATE TABLE IF NOT EXISTS quotes (
                id TEXT PRIMARY KEY,
                book_id TEXT NOT NULL,
                text TEXT NOT NULL,
                page INTEGER,
                note TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Reading logs table (append-only)
            CREATE TABLE IF NOT EXISTS reading_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id TEXT NOT NULL,
                action TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
            );

            -- Challenges table
            CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                year INTEGER UNIQUE NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                strategy TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Challenge months table
            CREATE TABLE IF NOT EXISTS challenge_months (
                id TEXT PRIMARY KEY,
                challenge_id TEXT NOT NULL,
                month_number INTEGER NOT NULL,
                month_name TEXT NOT NULL,
                theme TEXT,
                theme_icon TEXT,
                UNIQUE (challenge_id, month_number),
                FOREIGN KEY (challenge_id) REFERENCES challenges(id) ON DELETE CASCADE
            );

            -- Challenge books table
            CREATE TABLE IF NOT EXISTS challenge_books (
                id TEXT PRIMARY KEY,
                month_id TEXT NOT NULL,
                role TEXT NOT NULL,
                user_status TEXT NOT NULL DEFAULT 'LOCKED',
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                page_count INTEGER,
                cover_url TEXT,
                reason TEXT,
                takeaway TEXT,
                completed_at INTEGER,
                linked_book_id TEXT,
                FOREIGN KEY (month_id) REFERENCES challenge_months(id) ON DELETE CASCADE,
                FOREIGN KEY (linked_book_id) REFERENCES books(id) ON DELETE SET NULL
            );

            -- Reading lists table
            CREATE TABLE IF NOT EXISTS reading_lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                created_at INTEGER NOT NULL
            );

            -- Reading list levels table
            CREATE TABLE IF NOT EXISTS reading_list_levels (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (list_id) REFERENCES reading_lists(id) ON DELETE CASCADE
            );

            -- Reading list books table
            CREATE TABLE IF NOT EXISTS reading_list_books (
                id TEXT PRIMARY KEY,
                level_id TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                cover_url TEXT,
                note TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                linked_book_id TEXT,
                FOREIGN KEY (level_id) REFERENCES reading_list_levels(id) ON DELETE CASCADE,
                FOREIGN KEY (linked_book_id) REFERENCES books(id) ON DELETE SET NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_status ON books(status);
            CREATE INDEX IF NOT EXISTS idx_quotes_book ON quotes(book_id);
            CREATE INDEX IF NOT EXISTS idx_logs_book ON reading_logs(book_id);
            CREATE INDEX IF NOT EXISTS idx_months_challenge ON challenge_months(challenge_id);
            CREATE INDEX IF NOT EXISTS idx_challenge_books_month ON challenge_books(month_id);
            CREATE INDEX IF NOT EXISTS idx_levels_list ON reading_list_levels(list_id);
            CREATE INDEX IF NOT EXISTS idx_list_books_level ON reading_list_books(level_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== BOOK OPERATIONS ==========

    /// Create a new book.
    pub fn create_book(&self, book: &Book) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books
             (id, title, author, page_count, current_page, status, start_date, end_date,
              reading_goal_days, cover_url, isbn, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                book.id,
                book.title,
                book.author,
                book.page_count,
                book.current_page,
                book.status.as_str(),
                book.start_date,
                book.end_date,
                book.reading_goal_days,
                book.cover_url,
                book.isbn,
                book.notes,
                book.created_at,
                book.updated_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create book: {}", e)))?;
        Ok(())
    }

    /// Helper to convert a row to Book.
    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        let status: String = row.get(5)?;
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            page_count: row.get(3)?,
            current_page: row.get(4)?,
            status: BookStatus::from_str(&status).unwrap_or(BookStatus::ToRead),
            start_date: row.get(6)?,
            end_date: row.get(7)?,
            reading_goal_days: row.get(8)?,
            cover_url: row.get(9)?,
            isbn: row.get(10)?,
            notes: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    const BOOK_COLUMNS: &'static str = "id, title, author, page_count, current_page, status, \
         start_date, end_date, reading_goal_days, cover_url, isbn, notes, created_at, updated_at";

    /// Get book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM books WHERE id = ?1", Self::BOOK_COLUMNS),
            params![id],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// List books, optionally filtered by status.
    pub fn list_books(&self, status: Option<BookStatus>) -> Result<Vec<Book>> {
        let conn = self.conn.lock();

        let (sql, filter) = match status {
            Some(s) => (
                format!(
                    "SELECT {} FROM books WHERE status = ?1 ORDER BY updated_at DESC",
                    Self::BOOK_COLUMNS
                ),
                Some(s.as_str().to_string()),
            ),
            None => (
                format!(
                    "SELECT {} FROM books ORDER BY updated_at DESC",
                    Self::BOOK_COLUMNS
                ),
                None,
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = match filter {
            Some(f) => stmt.query_map(params![f], Self::row_to_book),
            None => stmt.query_map([], Self::row_to_book),
        }
        .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(rows)
    }

    /// Update a book's editable fields (title, author, pages, goal,
    /// cover, isbn, notes).
    ///
    /// A page count below the stored current page is rejected; the
    /// current page must stay within [0, page_count] whenever the
    /// count is known.
    pub fn update_book(&self, book: &Book) -> Result<bool> {
        let conn = self.conn.lock();

        let current_page: Option<i64> = conn
            .query_row(
                "SELECT current_page FROM books WHERE id = ?1",
                params![book.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))?;

        let Some(current_page) = current_page else {
            return Ok(false);
        };

        if let Some(pages) = book.page_count
            && pages < current_page
        {
            return Err(AppError::Validation(format!(
                "Page count {} is below the current page {}",
                pages, current_page
            )));
        }

        let rows = conn
            .execute(
                "UPDATE books SET title = ?1, author = ?2, page_count = ?3,
                 reading_goal_days = ?4, cover_url = ?5, isbn = ?6, notes = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    book.title,
                    book.author,
                    book.page_count,
                    book.reading_goal_days,
                    book.cover_url,
                    book.isbn,
                    book.notes,
                    book.updated_at,
                    book.id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Persist a lifecycle transition: the updated book snapshot and
    /// its log entry are written in one transaction.
    pub fn apply_book_transition(&self, book: &Book, action: LogAction, now: i64) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        Self::write_book_state(&tx, book)?;
        tx.execute(
            "INSERT INTO reading_logs (book_id, action, created_at) VALUES (?1, ?2, ?3)",
            params![book.id, action.as_str(), now],
        )
        .map_err(|e| AppError::Internal(format!("Failed to insert log: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit transition: {}", e)))
    }

    /// Persist a progress update (no log entry).
    pub fn update_book_progress(&self, book: &Book) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE books SET current_page = ?1, updated_at = ?2 WHERE id = ?3",
            params![book.current_page, book.updated_at, book.id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update progress: {}", e)))?;
        Ok(())
    }

    fn write_book_state(tx: &Transaction<'_>, book: &Book) -> Result<()> {
        tx.execute(
            "UPDATE books SET status = ?1, start_date = ?2, end_date = ?3,
             current_page = ?4, updated_at = ?5 WHERE id = ?6",
            params![
                book.status.as_str(),
                book.start_date,
                book.end_date,
                book.current_page,
                book.updated_at,
                book.id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to write book state: {}", e)))?;
        Ok(())
    }

    /// Delete a book (cascades to quotes and logs).
    pub fn delete_book(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Get reading logs for a book, oldest first.
    pub fn get_logs(&self, book_id: &str) -> Result<Vec<ReadingLog>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, action, created_at FROM reading_logs
                 WHERE book_id = ?1 ORDER BY created_at, id",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let logs = stmt
            .query_map(params![book_id], |row| {
                let action: String = row.get(2)?;
                Ok(ReadingLog {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    action: LogAction::from_str(&action).unwrap_or(LogAction::Started),
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get logs: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect logs: {}", e)))?;

        Ok(logs)
    }

    /// Library-wide dashboard counts.
    pub fn library_stats(&self) -> Result<LibraryStats> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'TO_READ'), 0),
                    COALESCE(SUM(status = 'READING'), 0),
                    COALESCE(SUM(status = 'COMPLETED'), 0),
                    COALESCE(SUM(status = 'DNF'), 0),
                    COALESCE(SUM(CASE WHEN status = 'COMPLETED' THEN COALESCE(page_count, 0) ELSE 0 END), 0)
             FROM books",
            [],
            |row| {
                Ok(LibraryStats {
                    total_books: row.get(0)?,
                    to_read: row.get(1)?,
                    reading: row.get(2)?,
                    completed: row.get(3)?,
                    dnf: row.get(4)?,
                    pages_read: row.get(5)?,
                })
            },
        )
        .map_err(|e| AppError::Internal(format!("Failed to get stats: {}", e)))
    }

    // ========== QUOTE OPERATIONS ==========

    /// Save a quote.
    pub fn create_quote(&self, quote: &Quote) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO quotes (id, book_id, text, page, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                quote.id,
                quote.book_id,
                quote.text,
                quote.page,
                quote.note,
                quote.created_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create quote: {}", e)))?;
        Ok(())
    }

    /// Get quotes for a book.
    pub fn get_quotes(&self, book_id: &str) -> Result<Vec<Quote>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, book_id, text, page, note, created_at FROM quotes
                 WHERE book_id = ?1 ORDER BY page, created_at",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let quotes = stmt
            .query_map(params![book_id], |row| {
                Ok(Quote {
                    id: row.get(0)?,
                    book_id: row.get(1)?,
                    text: row.get(2)?,
                    page: row.get(3)?,
                    note: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to get quotes: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect quotes: {}", e)))?;

        Ok(quotes)
    }

    /// Delete a quote.
    pub fn delete_quote(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM quotes WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete quote: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== CHALLENGE OPERATIONS ==========

    /// Create a challenge together with its twelve months.
    pub fn create_challenge(&self, challenge: &ReadingChallenge) -> Result<()> {
        const MONTH_NAMES: [&str; 12] = [
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ];

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO challenges (id, year, name, description, strategy, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                challenge.id,
                challenge.year,
                challenge.name,
                challenge.description,
                challenge.strategy,
                challenge.is_active,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Validation(format!(
                    "A challenge for year {} already exists",
                    challenge.year
                ))
            } else {
                AppError::Internal(format!("Failed to create challenge: {}", e))
            }
        })?;

        for (i, name) in MONTH_NAMES.iter().enumerate() {
            tx.execute(
                "INSERT INTO challenge_months (id, challenge_id, month_number, month_name)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    challenge.id,
                    (i + 1) as i64,
                    name,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to create month: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit challenge: {}", e)))
    }

    fn row_to_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingChallenge> {
        Ok(ReadingChallenge {
            id: row.get(0)?,
            year: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            strategy: row.get(4)?,
            is_active: row.get(5)?,
        })
    }

    /// Get challenge by year.
    pub fn get_challenge_by_year(&self, year: i64) -> Result<Option<ReadingChallenge>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, year, name, description, strategy, is_active
             FROM challenges WHERE year = ?1",
            params![year],
            Self::row_to_challenge,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get challenge: {}", e)))
    }

    /// List all challenges, newest year first.
    pub fn list_challenges(&self) -> Result<Vec<ReadingChallenge>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, year, name, description, strategy, is_active
                 FROM challenges ORDER BY year DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let challenges = stmt
            .query_map([], Self::row_to_challenge)
            .map_err(|e| AppError::Internal(format!("Failed to list challenges: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect challenges: {}", e)))?;

        Ok(challenges)
    }

    fn row_to_month(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChallengeMonth> {
        Ok(ChallengeMonth {
            id: row.get(0)?,
            challenge_id: row.get(1)?,
            month_number: row.get(2)?,
            month_name: row.get(3)?,
            theme: row.get(4)?,
            theme_icon: row.get(5)?,
        })
    }

    fn row_to_challenge_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChallengeBook> {
        let role: String = row.get(2)?;
        let status: String = row.get(3)?;
        Ok(ChallengeBook {
            id: row.get(0)?,
            month_id: row.get(1)?,
            role: ChallengeRole::from_str(&role).unwrap_or(ChallengeRole::Bonus),
            user_status: ChallengeBookStatus::from_str(&status)
                .unwrap_or(ChallengeBookStatus::Locked),
            title: row.get(4)?,
            author: row.get(5)?,
            page_count: row.get(6)?,
            cover_url: row.get(7)?,
            reason: row.get(8)?,
            takeaway: row.get(9)?,
            completed_at: row.get(10)?,
            linked_book_id: row.get(11)?,
        })
    }

    const CHALLENGE_BOOK_COLUMNS: &'static str = "id, month_id, role, user_status, title, author, \
         page_count, cover_url, reason, takeaway, completed_at, linked_book_id";

    fn load_month_books(conn: &Connection, month_id: &str) -> Result<Vec<ChallengeBook>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM challenge_books WHERE month_id = ?1
                 ORDER BY CASE role WHEN 'MAIN' THEN 0 ELSE 1 END, id",
                Self::CHALLENGE_BOOK_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map(params![month_id], Self::row_to_challenge_book)
            .map_err(|e| AppError::Internal(format!("Failed to get challenge books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect challenge books: {}", e)))?;

        Ok(books)
    }

    /// Get a month with its books.
    pub fn get_month(&self, month_id: &str) -> Result<Option<MonthSnapshot>> {
        let conn = self.conn.lock();
        let month = conn
            .query_row(
                "SELECT id, challenge_id, month_number, month_name, theme, theme_icon
                 FROM challenge_months WHERE id = ?1",
                params![month_id],
                Self::row_to_month,
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get month: {}", e)))?;

        match month {
            Some(month) => {
                let books = Self::load_month_books(&conn, &month.id)?;
                Ok(Some(MonthSnapshot { month, books }))
            }
            None => Ok(None),
        }
    }

    /// Get a month by challenge and calendar number, with its books.
    pub fn get_month_by_number(
        &self,
        challenge_id: &str,
        month_number: i64,
    ) -> Result<Option<MonthSnapshot>> {
        let conn = self.conn.lock();
        let month = conn
            .query_row(
                "SELECT id, challenge_id, month_number, month_name, theme, theme_icon
                 FROM challenge_months WHERE challenge_id = ?1 AND month_number = ?2",
                params![challenge_id, month_number],
                Self::row_to_month,
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get month: {}", e)))?;

        match month {
            Some(month) => {
                let books = Self::load_month_books(&conn, &month.id)?;
                Ok(Some(MonthSnapshot { month, books }))
            }
            None => Ok(None),
        }
    }

    /// Get all months of a challenge with their books, in month order.
    pub fn get_challenge_months(&self, challenge_id: &str) -> Result<Vec<MonthSnapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, challenge_id, month_number, month_name, theme, theme_icon
                 FROM challenge_months WHERE challenge_id = ?1 ORDER BY month_number",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let months = stmt
            .query_map(params![challenge_id], Self::row_to_month)
            .map_err(|e| AppError::Internal(format!("Failed to get months: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect months: {}", e)))?;

        let mut snapshots = Vec::with_capacity(months.len());
        for month in months {
            let books = Self::load_month_books(&conn, &month.id)?;
            snapshots.push(MonthSnapshot { month, books });
        }

        Ok(snapshots)
    }

    /// Update a month's theme fields.
    pub fn update_month_theme(
        &self,
        month_id: &str,
        theme: Option<&str>,
        theme_icon: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE challenge_months SET theme = ?1, theme_icon = ?2 WHERE id = ?3",
                params![theme, theme_icon, month_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update month: {}", e)))?;
        Ok(rows > 0)
    }

    /// Add a book to a challenge month.
    ///
    /// A second MAIN book in the same month is rejected; the unlock
    /// cascade depends on the one-main-per-month convention. A new MAIN
    /// starts NOT_STARTED, a BONUS starts LOCKED unless the month's
    /// main is already completed.
    pub fn create_challenge_book(&self, book: &ChallengeBook) -> Result<ChallengeBook> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let siblings = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {} FROM challenge_books WHERE month_id = ?1",
                    Self::CHALLENGE_BOOK_COLUMNS
                ))
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![book.month_id], Self::row_to_challenge_book)
                .map_err(|e| AppError::Internal(format!("Failed to get siblings: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect siblings: {}", e)))?
        };

        if book.role == ChallengeRole::Main && challenge::main_book(&siblings).is_some() {
            return Err(AppError::Validation(
                "Month already has a main book".to_string(),
            ));
        }

        let mut stored = book.clone();
        stored.user_status = match book.role {
            ChallengeRole::Main => ChallengeBookStatus::NotStarted,
            ChallengeRole::Bonus => {
                if challenge::is_main_completed(&siblings) {
                    ChallengeBookStatus::NotStarted
                } else {
                    ChallengeBookStatus::Locked
                }
            }
        };
        stored.completed_at = None;
        stored.takeaway = None;

        tx.execute(
            "INSERT INTO challenge_books
             (id, month_id, role, user_status, title, author, page_count, cover_url,
              reason, takeaway, completed_at, linked_book_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                stored.id,
                stored.month_id,
                stored.role.as_str(),
                stored.user_status.as_str(),
                stored.title,
                stored.author,
                stored.page_count,
                stored.cover_url,
                stored.reason,
                stored.takeaway,
                stored.completed_at,
                stored.linked_book_id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create challenge book: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit challenge book: {}", e)))?;

        Ok(stored)
    }

    /// Get a challenge book by ID.
    pub fn get_challenge_book(&self, id: &str) -> Result<Option<ChallengeBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM challenge_books WHERE id = ?1",
                Self::CHALLENGE_BOOK_COLUMNS
            ),
            params![id],
            Self::row_to_challenge_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get challenge book: {}", e)))
    }

    /// Mark a challenge book as read, unlocking sibling bonuses when a
    /// MAIN book completes. All writes happen in one transaction so the
    /// completion and the unlocks are never observed half-applied.
    pub fn mark_challenge_book_read(
        &self,
        book_id: &str,
        takeaway: Option<&str>,
        now: i64,
    ) -> Result<MarkReadOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let month_id: String = tx
            .query_row(
                "SELECT month_id FROM challenge_books WHERE id = ?1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get challenge book: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", book_id)))?;

        let mut books = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {} FROM challenge_books WHERE month_id = ?1",
                    Self::CHALLENGE_BOOK_COLUMNS
                ))
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![month_id], Self::row_to_challenge_book)
                .map_err(|e| AppError::Internal(format!("Failed to get month books: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect month books: {}", e)))?
        };

        let outcome = challenge::mark_book_read(&mut books, book_id, now)?;

        for book in &books {
            tx.execute(
                "UPDATE challenge_books SET user_status = ?1, completed_at = ?2 WHERE id = ?3",
                params![book.user_status.as_str(), book.completed_at, book.id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update challenge book: {}", e)))?;
        }

        if let Some(text) = takeaway {
            tx.execute(
                "UPDATE challenge_books SET takeaway = ?1 WHERE id = ?2",
                params![text, book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to save takeaway: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit mark-read: {}", e)))?;

        tracing::info!(
            book_id = book_id,
            was_main = outcome.was_main,
            unlocked = outcome.unlocked.len(),
            "Challenge book marked as read"
        );

        Ok(outcome)
    }

    /// Start reading a challenge book.
    pub fn start_challenge_book(&self, book_id: &str) -> Result<ChallengeBook> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let book = tx
            .query_row(
                &format!(
                    "SELECT {} FROM challenge_books WHERE id = ?1",
                    Self::CHALLENGE_BOOK_COLUMNS
                ),
                params![book_id],
                Self::row_to_challenge_book,
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get challenge book: {}", e)))?
            .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", book_id)))?;

        let mut books = vec![book];
        challenge::start_book(&mut books, book_id)?;
        let updated = books.remove(0);

        tx.execute(
            "UPDATE challenge_books SET user_status = ?1 WHERE id = ?2",
            params![updated.user_status.as_str(), updated.id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update challenge book: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit start: {}", e)))?;

        Ok(updated)
    }

    /// Update a challenge book's takeaway note.
    pub fn update_takeaway(&self, book_id: &str, takeaway: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE challenge_books SET takeaway = ?1 WHERE id = ?2",
                params![takeaway, book_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update takeaway: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a challenge (cascades to months and books).
    pub fn delete_challenge(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM challenges WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete challenge: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== READING LIST OPERATIONS ==========

    /// Create a reading list.
    pub fn create_list(&self, list: &ReadingList) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO reading_lists (id, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![list.id, list.name, list.description, list.created_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create list: {}", e)))?;
        Ok(())
    }

    /// List all reading lists.
    pub fn list_lists(&self) -> Result<Vec<ReadingList>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, created_at FROM reading_lists ORDER BY name",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let lists = stmt
            .query_map([], |row| {
                Ok(ReadingList {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Internal(format!("Failed to list lists: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect lists: {}", e)))?;

        Ok(lists)
    }

    fn row_to_level(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingListLevel> {
        Ok(ReadingListLevel {
            id: row.get(0)?,
            list_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            sort_order: row.get(4)?,
        })
    }

    fn row_to_list_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingListBook> {
        Ok(ReadingListBook {
            id: row.get(0)?,
            level_id: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            cover_url: row.get(4)?,
            note: row.get(5)?,
            sort_order: row.get(6)?,
            linked_book_id: row.get(7)?,
        })
    }

    /// Get a full reading list tree: levels in order, books in order.
    pub fn get_list(&self, list_id: &str) -> Result<Option<ListSnapshot>> {
        let conn = self.conn.lock();
        let list = conn
            .query_row(
                "SELECT id, name, description, created_at FROM reading_lists WHERE id = ?1",
                params![list_id],
                |row| {
                    Ok(ReadingList {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get list: {}", e)))?;

        let Some(list) = list else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT id, list_id, title, description, sort_order FROM reading_list_levels
                 WHERE list_id = ?1 ORDER BY sort_order",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let levels = stmt
            .query_map(params![list_id], Self::row_to_level)
            .map_err(|e| AppError::Internal(format!("Failed to get levels: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect levels: {}", e)))?;

        let mut snapshots = Vec::with_capacity(levels.len());
        for level in levels {
            let mut stmt = conn
                .prepare(
                    "SELECT id, level_id, title, author, cover_url, note, sort_order, linked_book_id
                     FROM reading_list_books WHERE level_id = ?1 ORDER BY sort_order",
                )
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

            let books = stmt
                .query_map(params![level.id], Self::row_to_list_book)
                .map_err(|e| AppError::Internal(format!("Failed to get level books: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect level books: {}", e)))?;

            snapshots.push(LevelSnapshot { level, books });
        }

        Ok(Some(ListSnapshot {
            list,
            levels: snapshots,
        }))
    }

    /// Delete a reading list (cascades to levels and their books).
    pub fn delete_list(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM reading_lists WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete list: {}", e)))?;
        Ok(rows > 0)
    }

    /// Create a level at the end of its list.
    pub fn create_level(&self, level: &ReadingListLevel) -> Result<ReadingListLevel> {
        let conn = self.conn.lock();

        let next_order: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM reading_list_levels WHERE list_id = ?1",
                params![level.list_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to get next order: {}", e)))?;

        let mut stored = level.clone();
        stored.sort_order = next_order;

        conn.execute(
            "INSERT INTO reading_list_levels (id, list_id, title, description, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                stored.id,
                stored.list_id,
                stored.title,
                stored.description,
                stored.sort_order,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create level: {}", e)))?;

        Ok(stored)
    }

    /// Delete a level (cascades to its books).
    pub fn delete_level(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM reading_list_levels WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete level: {}", e)))?;
        Ok(rows > 0)
    }

    /// Add a book at the end of its level.
    pub fn create_list_book(&self, book: &ReadingListBook) -> Result<ReadingListBook> {
        let conn = self.conn.lock();

        if !level_exists(&conn, &book.level_id)? {
            return Err(AppError::NotFound(format!(
                "Level not found: {}",
                book.level_id
            )));
        }

        let next_order: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM reading_list_books WHERE level_id = ?1",
                params![book.level_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to get next order: {}", e)))?;

        let mut stored = book.clone();
        stored.sort_order = next_order;

        conn.execute(
            "INSERT INTO reading_list_books
             (id, level_id, title, author, cover_url, note, sort_order, linked_book_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stored.id,
                stored.level_id,
                stored.title,
                stored.author,
                stored.cover_url,
                stored.note,
                stored.sort_order,
                stored.linked_book_id,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create list book: {}", e)))?;

        Ok(stored)
    }

    /// Delete a book from a level.
    pub fn delete_list_book(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM reading_list_books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete list book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Rewrite level order within a list to match the requested
    /// permutation, in one transaction.
    pub fn reorder_levels(&self, list_id: &str, requested: &[String]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        let current: Vec<String> = {
            let mut stmt = tx
                .prepare("SELECT id FROM reading_list_levels WHERE list_id = ?1")
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![list_id], |row| row.get(0))
                .map_err(|e| AppError::Internal(format!("Failed to get levels: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect levels: {}", e)))?
        };

        for (id, order) in plan_reorder(&current, requested)? {
            tx.execute(
                "UPDATE reading_list_levels SET sort_order = ?1 WHERE id = ?2",
                params![order, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to reorder level: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit reorder: {}", e)))
    }

    /// Rewrite book order within a level to match the requested
    /// permutation, in one transaction.
    pub fn reorder_level_books(&self, level_id: &str, requested: &[String]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to start transaction: {}", e)))?;

        if !level_exists(&tx, level_id)? {
            return Err(AppError::NotFound(format!("Level not found: {}", level_id)));
        }

        let current: Vec<String> = {
            let mut stmt = tx
                .prepare("SELECT id FROM reading_list_books WHERE level_id = ?1")
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;
            stmt.query_map(params![level_id], |row| row.get(0))
                .map_err(|e| AppError::Internal(format!("Failed to get books: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?
        };

        for (id, order) in plan_reorder(&current, requested)? {
            tx.execute(
                "UPDATE reading_list_books SET sort_order = ?1 WHERE id = ?2",
                params![order, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to reorder book: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit reorder: {}", e)))
    }
}
