//! Challenge progress aggregation and bonus unlocking.
//!
//! Pure functions over month/year snapshots. The bonus-unlock cascade
//! runs here on an in-memory snapshot; the database layer persists the
//! whole outcome in one transaction so the MAIN completion and the
//! unlocks are never observed half-applied.

use crate::db::{ChallengeBook, ChallengeBookStatus, ChallengeMonth, ChallengeRole};
use crate::error::{AppError, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// A challenge month with its books, as read from storage.
#[derive(Debug, Clone, Serialize)]
pub struct MonthSnapshot {
    /// The month row.
    pub month: ChallengeMonth,
    /// Books in the month (main first, then bonus).
    pub books: Vec<ChallengeBook>,
}

/// Completion counts with a derived percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    /// Books completed.
    pub completed: i64,
    /// Total books.
    pub total: i64,
    /// Rounded percentage in [0, 100]; 0 when there are no books.
    pub percentage: i64,
}

/// Page pacing for a month's dashboard widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthPacing {
    /// Sum of known page counts over all books.
    pub total_pages: i64,
    /// Sum of known page counts over completed books.
    pub read_pages: i64,
    /// Pages still to read this month.
    pub remaining_pages: i64,
    /// Calendar days left in the month, today inclusive.
    pub remaining_days: i64,
    /// Pages per day to finish the month's books.
    pub daily_target: i64,
}

/// Year-level rollup across all months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    /// Books completed across the year.
    pub completed: i64,
    /// Total books across the year.
    pub total: i64,
    /// Rounded percentage in [0, 100].
    pub percentage: i64,
    /// MAIN books completed.
    pub main_completed: i64,
    /// BONUS books completed.
    pub bonus_completed: i64,
}

/// Outcome of marking a challenge book as read.
#[derive(Debug, Clone, Serialize)]
pub struct MarkReadOutcome {
    /// Whether the completed book was the month's MAIN book.
    pub was_main: bool,
    /// IDs of bonus books unlocked by this completion.
    pub unlocked: Vec<String>,
}

/// Find the month's MAIN book, if any.
pub fn main_book(books: &[ChallengeBook]) -> Option<&ChallengeBook> {
    books.iter().find(|b| b.role == ChallengeRole::Main)
}

/// Whether the month's MAIN book is completed.
///
/// A month without a MAIN book reports false, which keeps its bonuses
/// permanently locked.
pub fn is_main_completed(books: &[ChallengeBook]) -> bool {
    main_book(books).is_some_and(|b| b.user_status == ChallengeBookStatus::Completed)
}

fn percentage(completed: i64, total: i64) -> i64 {
    if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    }
}

/// Completion progress for one month.
///
/// Always recomputed from the current books, never cached.
pub fn month_progress(books: &[ChallengeBook]) -> ProgressSummary {
    let total = books.len() as i64;
    let completed = books
        .iter()
        .filter(|b| b.user_status == ChallengeBookStatus::Completed)
        .count() as i64;

    ProgressSummary {
        completed,
        total,
        percentage: percentage(completed, total),
    }
}

/// Calendar days left in `today`'s month, counting today. At least 1.
pub fn days_remaining_in_month(today: NaiveDate) -> i64 {
    let (next_year, next_month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };

    // First day of the next month always exists.
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap_or(today);

    (first_of_next - today).num_days().max(1)
}

/// Page pacing figures for one month.
pub fn month_pacing(books: &[ChallengeBook], today: NaiveDate) -> MonthPacing {
    let total_pages: i64 = books.iter().filter_map(|b| b.page_count).sum();
    let read_pages: i64 = books
        .iter()
        .filter(|b| b.user_status == ChallengeBookStatus::Completed)
        .filter_map(|b| b.page_count)
        .sum();

    let remaining_pages = (total_pages - read_pages).max(0);
    let remaining_days = days_remaining_in_month(today);
    let daily_target = if remaining_pages > 0 {
        (remaining_pages + remaining_days - 1) / remaining_days
    } else {
        0
    };

    MonthPacing {
        total_pages,
        read_pages,
        remaining_pages,
        remaining_days,
        daily_target,
    }
}

/// Year rollup across month snapshots.
///
/// Sums whatever books exist; no assumption about bonus counts per
/// month.
pub fn year_progress(months: &[MonthSnapshot]) -> YearSummary {
    let mut completed = 0;
    let mut total = 0;
    let mut main_completed = 0;
    let mut bonus_completed = 0;

    for snapshot in months {
        for book in &snapshot.books {
            total += 1;
            if book.user_status == ChallengeBookStatus::Completed {
                completed += 1;
                match book.role {
                    ChallengeRole::Main => main_completed += 1,
                    ChallengeRole::Bonus => bonus_completed += 1,
                }
            }
        }
    }

    YearSummary {
        completed,
        total,
        percentage: percentage(completed, total),
        main_completed,
        bonus_completed,
    }
}

/// Mark a book in the month as read, unlocking siblings when the MAIN
/// book completes.
///
/// Mutates the snapshot in place; the caller persists every touched
/// book atomically. Completing a LOCKED bonus book is rejected.
pub fn mark_book_read(
    books: &mut [ChallengeBook],
    book_id: &str,
    completed_at: i64,
) -> Result<MarkReadOutcome> {
    let index = books
        .iter()
        .position(|b| b.id == book_id)
        .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", book_id)))?;

    match books[index].user_status {
        ChallengeBookStatus::Locked => {
            return Err(AppError::StateConflict(
                "Book is locked until the month's main book is completed".to_string(),
            ));
        }
        ChallengeBookStatus::Completed => {
            return Err(AppError::StateConflict(
                "Book is already completed".to_string(),
            ));
        }
        ChallengeBookStatus::NotStarted | ChallengeBookStatus::InProgress => {}
    }

    books[index].user_status = ChallengeBookStatus::Completed;
    books[index].completed_at = Some(completed_at);

    let was_main = books[index].role == ChallengeRole::Main;
    let mut unlocked = Vec::new();

    if was_main {
        for book in books.iter_mut() {
            if book.role == ChallengeRole::Bonus
                && book.user_status == ChallengeBookStatus::Locked
            {
                book.user_status = ChallengeBookStatus::NotStarted;
                unlocked.push(book.id.clone());
            }
        }
    }

    Ok(MarkReadOutcome { was_main, unlocked })
}

/// Start reading a challenge book (NOT_STARTED to IN_PROGRESS).
pub fn start_book(books: &mut [ChallengeBook], book_id: &str) -> Result<()> {
    let book = books
        .iter_mut()
        .find(|b| b.id == book_id)
        .ok_or_else(|| AppError::NotFound(format!("Challenge book not found: {}", book_id)))?;

    match book.user_status {
        ChallengeBookStatus::NotStarted => {
            book.user_status = ChallengeBookStatus::InProgress;
            Ok(())
        }
        ChallengeBookStatus::Locked => Err(AppError::StateConflict(
            "Book is locked until the month's main book is completed".to_string(),
        )),
        ChallengeBookStatus::InProgress => Err(AppError::StateConflict(
            "Book is already in progress".to_string(),
        )),
        ChallengeBookStatus::Completed => Err(AppError::StateConflict(
            "Book is already completed".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::now_timestamp;

    fn challenge_book(
        id: &str,
        role: ChallengeRole,
        status: ChallengeBookStatus,
    ) -> ChallengeBook {
        ChallengeBook {
            id: id.to_string(),
            month_id: "month-1".to_string(),
            role,
            user_status: status,
            title: format!("Book {}", id),
            author: "Author".to_string(),
            page_count: Some(300),
            cover_url: None,
            reason: None,
            takeaway: None,
            completed_at: None,
            linked_book_id: None,
        }
    }

    fn month_with(books: Vec<ChallengeBook>) -> MonthSnapshot {
        MonthSnapshot {
            month: ChallengeMonth {
                id: "month-1".to_string(),
                challenge_id: "ch-1".to_string(),
                month_number: 1,
                month_name: "January".to_string(),
                theme: None,
                theme_icon: None,
            },
            books,
        }
    }

    #[test]
    fn completing_main_unlocks_bonuses() {
        let mut books = vec![
            challenge_book("main", ChallengeRole::Main, ChallengeBookStatus::InProgress),
            challenge_book("bonus-1", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
            challenge_book("bonus-2", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
        ];

        let outcome = mark_book_read(&mut books, "main", now_timestamp()).unwrap();
        assert!(outcome.was_main);
        assert_eq!(outcome.unlocked, vec!["bonus-1", "bonus-2"]);

        assert_eq!(books[0].user_status, ChallengeBookStatus::Completed);
        assert!(books[0].completed_at.is_some());
        assert_eq!(books[1].user_status, ChallengeBookStatus::NotStarted);
        assert_eq!(books[2].user_status, ChallengeBookStatus::NotStarted);

        let progress = month_progress(&books);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.percentage, 33);
    }

    #[test]
    fn completing_locked_bonus_is_rejected() {
        let mut books = vec![
            challenge_book("main", ChallengeRole::Main, ChallengeBookStatus::InProgress),
            challenge_book("bonus-1", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
        ];

        let err = mark_book_read(&mut books, "bonus-1", now_timestamp()).unwrap_err();
        assert!(matches!(err, AppError::StateConflict(_)));

        // No field changed.
        assert_eq!(books[1].user_status, ChallengeBookStatus::Locked);
        assert!(books[1].completed_at.is_none());
    }

    #[test]
    fn completing_bonus_does_not_unlock() {
        let mut books = vec![
            challenge_book("main", ChallengeRole::Main, ChallengeBookStatus::Completed),
            challenge_book(
                "bonus-1",
                ChallengeRole::Bonus,
                ChallengeBookStatus::NotStarted,
            ),
            challenge_book("bonus-2", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
        ];

        let outcome = mark_book_read(&mut books, "bonus-1", now_timestamp()).unwrap();
        assert!(!outcome.was_main);
        assert!(outcome.unlocked.is_empty());
        // Still locked: only a MAIN completion unlocks.
        assert_eq!(books[2].user_status, ChallengeBookStatus::Locked);
    }

    #[test]
    fn completing_twice_is_rejected() {
        let mut books = vec![challenge_book(
            "main",
            ChallengeRole::Main,
            ChallengeBookStatus::Completed,
        )];
        assert!(mark_book_read(&mut books, "main", now_timestamp()).is_err());
    }

    #[test]
    fn unknown_book_is_not_found() {
        let mut books = vec![];
        assert!(matches!(
            mark_book_read(&mut books, "missing", 0),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn month_without_main_keeps_bonuses_locked() {
        let books = vec![
            challenge_book("bonus-1", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
        ];
        assert!(!is_main_completed(&books));
    }

    #[test]
    fn month_progress_handles_empty_month() {
        let progress = month_progress(&[]);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn percentage_stays_in_bounds() {
        for completed in 0..=7 {
            let books: Vec<_> = (0..7)
                .map(|i| {
                    let status = if i < completed {
                        ChallengeBookStatus::Completed
                    } else {
                        ChallengeBookStatus::NotStarted
                    };
                    challenge_book(&format!("b{}", i), ChallengeRole::Bonus, status)
                })
                .collect();

            let p = month_progress(&books);
            assert!((0..=100).contains(&p.percentage));
            assert_eq!(
                p.percentage,
                ((completed as f64 / 7.0) * 100.0).round() as i64
            );
        }
    }

    #[test]
    fn days_remaining_counts_today() {
        let last = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(days_remaining_in_month(last), 1);

        let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(days_remaining_in_month(first), 31);

        let december = NaiveDate::from_ymd_opt(2026, 12, 30).unwrap();
        assert_eq!(days_remaining_in_month(december), 2);
    }

    #[test]
    fn pacing_sums_pages_and_targets() {
        let mut books = vec![
            challenge_book("main", ChallengeRole::Main, ChallengeBookStatus::Completed),
            challenge_book(
                "bonus-1",
                ChallengeRole::Bonus,
                ChallengeBookStatus::NotStarted,
            ),
        ];
        books[0].page_count = Some(200);
        books[1].page_count = Some(310);

        let today = NaiveDate::from_ymd_opt(2026, 6, 21).unwrap(); // 10 days left
        let pacing = month_pacing(&books, today);
        assert_eq!(pacing.total_pages, 510);
        assert_eq!(pacing.read_pages, 200);
        assert_eq!(pacing.remaining_pages, 310);
        assert_eq!(pacing.remaining_days, 10);
        assert_eq!(pacing.daily_target, 31);
    }

    #[test]
    fn pacing_ignores_missing_page_counts() {
        let mut books = vec![challenge_book(
            "main",
            ChallengeRole::Main,
            ChallengeBookStatus::NotStarted,
        )];
        books[0].page_count = None;

        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let pacing = month_pacing(&books, today);
        assert_eq!(pacing.total_pages, 0);
        assert_eq!(pacing.daily_target, 0);
    }

    #[test]
    fn year_summary_counts_roles() {
        let months = vec![
            month_with(vec![
                challenge_book("m1", ChallengeRole::Main, ChallengeBookStatus::Completed),
                challenge_book("b1", ChallengeRole::Bonus, ChallengeBookStatus::Completed),
                challenge_book("b2", ChallengeRole::Bonus, ChallengeBookStatus::NotStarted),
            ]),
            month_with(vec![
                challenge_book("m2", ChallengeRole::Main, ChallengeBookStatus::InProgress),
                challenge_book("b3", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
            ]),
        ];

        let summary = year_progress(&months);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.percentage, 40);
        assert_eq!(summary.main_completed, 1);
        assert_eq!(summary.bonus_completed, 1);
    }

    #[test]
    fn start_book_transitions() {
        let mut books = vec![
            challenge_book("main", ChallengeRole::Main, ChallengeBookStatus::NotStarted),
            challenge_book("bonus", ChallengeRole::Bonus, ChallengeBookStatus::Locked),
        ];

        start_book(&mut books, "main").unwrap();
        assert_eq!(books[0].user_status, ChallengeBookStatus::InProgress);

        assert!(start_book(&mut books, "main").is_err());
        assert!(start_book(&mut books, "bonus").is_err());
        assert!(start_book(&mut books, "missing").is_err());
    }
}
