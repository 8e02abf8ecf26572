//! Book reading state machine and goal projection.
//!
//! Pure functions over [`Book`] snapshots: every transition takes the
//! current snapshot and "now", and returns the updated snapshot plus
//! the log action to append. Callers persist the result; nothing in
//! here touches storage.

use crate::config::GoalConfig;
use crate::db::{Book, BookStatus, LogAction};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Start (or restart) reading a book.
///
/// Legal from TO_READ, COMPLETED and DNF. Returns STARTED on the first
/// read and RESTARTED when coming back from a finished/abandoned state.
pub fn start_reading(book: &Book, now: DateTime<Utc>) -> Result<(Book, LogAction)> {
    let action = match book.status {
        BookStatus::ToRead => LogAction::Started,
        BookStatus::Completed | BookStatus::Dnf => LogAction::Restarted,
        BookStatus::Reading => {
            return Err(AppError::StateConflict(format!(
                "Book '{}' is already being read",
                book.title
            )));
        }
    };

    let mut updated = book.clone();
    updated.status = BookStatus::Reading;
    updated.start_date = Some(now.timestamp());
    updated.end_date = None;
    updated.updated_at = now.timestamp();

    Ok((updated, action))
}

/// Finish reading a book.
///
/// Legal only from READING. When the page count is known the current
/// page snaps to it.
pub fn finish_reading(book: &Book, now: DateTime<Utc>) -> Result<(Book, LogAction)> {
    if book.status != BookStatus::Reading {
        return Err(AppError::StateConflict(format!(
            "Book '{}' is not being read",
            book.title
        )));
    }

    let mut updated = book.clone();
    updated.status = BookStatus::Completed;
    updated.end_date = Some(now.timestamp());
    if let Some(pages) = book.page_count {
        updated.current_page = pages;
    }
    updated.updated_at = now.timestamp();

    Ok((updated, LogAction::Finished))
}

/// Abandon a book (did not finish).
pub fn abandon(book: &Book, now: DateTime<Utc>) -> Result<(Book, LogAction)> {
    if book.status != BookStatus::Reading {
        return Err(AppError::StateConflict(format!(
            "Book '{}' is not being read",
            book.title
        )));
    }

    let mut updated = book.clone();
    updated.status = BookStatus::Dnf;
    updated.end_date = Some(now.timestamp());
    updated.updated_at = now.timestamp();

    Ok((updated, LogAction::Abandoned))
}

/// Put a finished or abandoned book back on the to-read list.
///
/// Clears dates and progress.
pub fn reset_to_list(book: &Book, now: DateTime<Utc>) -> Result<(Book, LogAction)> {
    match book.status {
        BookStatus::Completed | BookStatus::Dnf => {}
        _ => {
            return Err(AppError::StateConflict(format!(
                "Book '{}' cannot be reset from status {}",
                book.title, book.status
            )));
        }
    }

    let mut updated = book.clone();
    updated.status = BookStatus::ToRead;
    updated.start_date = None;
    updated.end_date = None;
    updated.current_page = 0;
    updated.updated_at = now.timestamp();

    Ok((updated, LogAction::AddedToList))
}

/// Update the current page.
///
/// Negative pages are rejected, and so are pages beyond the known page
/// count; silently clamping would misreport progress. No log entry is
/// produced.
pub fn update_progress(book: &Book, new_page: i64, now: DateTime<Utc>) -> Result<Book> {
    if new_page < 0 {
        return Err(AppError::Validation(format!(
            "Page number cannot be negative: {}",
            new_page
        )));
    }

    if let Some(pages) = book.page_count
        && new_page > pages
    {
        return Err(AppError::Validation(format!(
            "Page {} exceeds page count {}",
            new_page, pages
        )));
    }

    let mut updated = book.clone();
    updated.current_page = new_page;
    updated.updated_at = now.timestamp();
    Ok(updated)
}

/// Pacing status relative to the reading goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaceStatus {
    /// At or ahead of the expected page.
    Green,
    /// Behind by at most the tolerance band.
    Yellow,
    /// Behind by more than the tolerance band.
    Red,
}

impl PaceStatus {
    /// Human-readable pacing summary.
    pub fn message(&self) -> &'static str {
        match self {
            PaceStatus::Green => "on pace",
            PaceStatus::Yellow => "slightly behind",
            PaceStatus::Red => "behind schedule",
        }
    }
}

/// Projection of a reading goal against current progress.
#[derive(Debug, Clone, Serialize)]
pub struct GoalInfo {
    /// Days since reading started (at least 1).
    pub elapsed_days: i64,
    /// Target duration in days.
    pub target_days: i64,
    /// Page the reader should be at to stay on schedule.
    pub expected_page: i64,
    /// Days left in the goal window.
    pub remaining_days: i64,
    /// Pages per day needed to finish on time.
    pub daily_target: i64,
    /// Pacing status.
    pub status: PaceStatus,
    /// Human-readable pacing summary.
    pub status_message: &'static str,
}

/// Project the reading goal for a book.
///
/// Returns `None` when no projection is possible (unknown page count or
/// the book has not been started). Total: never panics, and repeated
/// calls with the same inputs give the same answer.
pub fn project_goal(book: &Book, config: &GoalConfig, now: DateTime<Utc>) -> Option<GoalInfo> {
    let page_count = book.page_count?;
    let start_date = book.start_date?;
    if page_count <= 0 {
        return None;
    }

    let started = crate::db::timestamp_to_datetime(start_date);
    let elapsed_days = (now - started).num_days().max(1);
    let target_days = book
        .reading_goal_days
        .unwrap_or(config.default_target_days)
        .max(1);

    let fraction = (elapsed_days as f64 / target_days as f64).min(1.0);
    let expected_page = (page_count as f64 * fraction).round() as i64;
    let remaining_days = (target_days - elapsed_days).max(0);
    let remaining_pages = (page_count - book.current_page).max(0);

    let daily_target = if remaining_days > 0 {
        (remaining_pages + remaining_days - 1) / remaining_days
    } else {
        remaining_pages
    };

    let status = if book.current_page >= expected_page {
        PaceStatus::Green
    } else {
        let tolerance = page_count as f64 * (config.tolerance_percent as f64 / 100.0);
        if (expected_page - book.current_page) as f64 <= tolerance {
            PaceStatus::Yellow
        } else {
            PaceStatus::Red
        }
    };

    Some(GoalInfo {
        elapsed_days,
        target_days,
        expected_page,
        remaining_days,
        daily_target,
        status,
        status_message: status.message(),
    })
}
