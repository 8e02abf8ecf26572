mod schema;

pub use schema::{Database, LevelSnapshot, LibraryStats, ListSnapshot};

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reading lifecycle status of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    /// On the shelf, not yet started.
    ToRead,
    /// Currently being read.
    Reading,
    /// Finished.
    Completed,
    /// Abandoned (did not finish).
    Dnf,
}

impl BookStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::ToRead => "TO_READ",
            BookStatus::Reading => "READING",
            BookStatus::Completed => "COMPLETED",
            BookStatus::Dnf => "DNF",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TO_READ" => Ok(BookStatus::ToRead),
            "READING" => Ok(BookStatus::Reading),
            "COMPLETED" => Ok(BookStatus::Completed),
            "DNF" => Ok(BookStatus::Dnf),
            other => Err(AppError::Validation(format!(
                "Unknown book status: {}",
                other
            ))),
        }
    }
}

/// Action recorded in the append-only reading log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    /// Started reading for the first time.
    Started,
    /// Finished reading.
    Finished,
    /// Abandoned the book.
    Abandoned,
    /// Restarted a completed or abandoned book.
    Restarted,
    /// Moved back to the to-read list.
    AddedToList,
}

impl LogAction {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Started => "STARTED",
            LogAction::Finished => "FINISHED",
            LogAction::Abandoned => "ABANDONED",
            LogAction::Restarted => "RESTARTED",
            LogAction::AddedToList => "ADDED_TO_LIST",
        }
    }
}

impl FromStr for LogAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(LogAction::Started),
            "FINISHED" => Ok(LogAction::Finished),
            "ABANDONED" => Ok(LogAction::Abandoned),
            "RESTARTED" => Ok(LogAction::Restarted),
            "ADDED_TO_LIST" => Ok(LogAction::AddedToList),
            other => Err(AppError::Validation(format!(
                "Unknown log action: {}",
                other
            ))),
        }
    }
}

/// Role of a book within a challenge month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeRole {
    /// The month's main book; gates the bonus books.
    Main,
    /// A bonus book, locked until the main book is completed.
    Bonus,
}

impl ChallengeRole {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeRole::Main => "MAIN",
            ChallengeRole::Bonus => "BONUS",
        }
    }
}

impl FromStr for ChallengeRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MAIN" => Ok(ChallengeRole::Main),
            "BONUS" => Ok(ChallengeRole::Bonus),
            other => Err(AppError::Validation(format!(
                "Unknown challenge role: {}",
                other
            ))),
        }
    }
}

/// User-facing status of a challenge book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeBookStatus {
    /// Not available until the month's main book is completed.
    Locked,
    /// Available but not yet started.
    NotStarted,
    /// Currently being read.
    InProgress,
    /// Completed.
    Completed,
}

impl ChallengeBookStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeBookStatus::Locked => "LOCKED",
            ChallengeBookStatus::NotStarted => "NOT_STARTED",
            ChallengeBookStatus::InProgress => "IN_PROGRESS",
            ChallengeBookStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for ChallengeBookStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOCKED" => Ok(ChallengeBookStatus::Locked),
            "NOT_STARTED" => Ok(ChallengeBookStatus::NotStarted),
            "IN_PROGRESS" => Ok(ChallengeBookStatus::InProgress),
            "COMPLETED" => Ok(ChallengeBookStatus::Completed),
            other => Err(AppError::Validation(format!(
                "Unknown challenge book status: {}",
                other
            ))),
        }
    }
}

/// A book in the personal library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Primary author.
    pub author: String,
    /// Total page count, when known.
    pub page_count: Option<i64>,
    /// Current page (0 when not started).
    pub current_page: i64,
    /// Reading lifecycle status.
    pub status: BookStatus,
    /// When reading started.
    pub start_date: Option<i64>,
    /// When reading ended (finished or abandoned).
    pub end_date: Option<i64>,
    /// User-set target duration in days.
    pub reading_goal_days: Option<i64>,
    /// Cover image URL.
    pub cover_url: Option<String>,
    /// ISBN, when known.
    pub isbn: Option<String>,
    /// Freeform notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// A saved quote from a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Unique quote ID.
    pub id: String,
    /// Owning book ID.
    pub book_id: String,
    /// Quoted text.
    pub text: String,
    /// Page number, when noted.
    pub page: Option<i64>,
    /// User note on the quote.
    pub note: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

/// Append-only reading lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingLog {
    /// Log row ID.
    pub id: i64,
    /// Book the event belongs to.
    pub book_id: String,
    /// Recorded action.
    pub action: LogAction,
    /// Event timestamp.
    pub created_at: i64,
}

/// A yearly reading challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingChallenge {
    /// Unique challenge ID.
    pub id: String,
    /// Challenge year (unique).
    pub year: i64,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Strategy label (e.g. "1-main-2-bonus").
    pub strategy: Option<String>,
    /// Whether this is the active challenge.
    pub is_active: bool,
}

/// One month within a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeMonth {
    /// Unique month ID.
    pub id: String,
    /// Owning challenge ID.
    pub challenge_id: String,
    /// Month number, 1-12 (unique within the challenge).
    pub month_number: i64,
    /// Month display name.
    pub month_name: String,
    /// Monthly theme.
    pub theme: Option<String>,
    /// Theme icon identifier.
    pub theme_icon: Option<String>,
}

/// A book slot within a challenge month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeBook {
    /// Unique challenge book ID.
    pub id: String,
    /// Owning month ID.
    pub month_id: String,
    /// Main or bonus role.
    pub role: ChallengeRole,
    /// User-facing status.
    pub user_status: ChallengeBookStatus,
    /// Title snapshot.
    pub title: String,
    /// Author snapshot.
    pub author: String,
    /// Page count snapshot.
    pub page_count: Option<i64>,
    /// Cover URL snapshot.
    pub cover_url: Option<String>,
    /// Why this book was picked.
    pub reason: Option<String>,
    /// Freeform note attached on completion.
    pub takeaway: Option<String>,
    /// Completion timestamp.
    pub completed_at: Option<i64>,
    /// Optional link to a library book.
    pub linked_book_id: Option<String>,
}

/// A curated reading list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingList {
    /// Unique list ID.
    pub id: String,
    /// List name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

/// An ordered level within a reading list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingListLevel {
    /// Unique level ID.
    pub id: String,
    /// Owning list ID.
    pub list_id: String,
    /// Level title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Position within the list (dense, zero-based).
    pub sort_order: i64,
}

/// A recommended book within a level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingListBook {
    /// Unique list book ID.
    pub id: String,
    /// Owning level ID.
    pub level_id: String,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Cover URL.
    pub cover_url: Option<String>,
    /// Recommendation note.
    pub note: Option<String>,
    /// Position within the level (dense, zero-based).
    pub sort_order: i64,
    /// Optional link to a library book.
    pub linked_book_id: Option<String>,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
