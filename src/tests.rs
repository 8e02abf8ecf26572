use crate::config::Config;
use crate::db::{
    Book, BookStatus, ChallengeBook, ChallengeBookStatus, ChallengeRole, Database, LogAction,
    Quote, ReadingChallenge, ReadingList, ReadingListBook, ReadingListLevel, now_timestamp,
};
use crate::error::AppError;
use crate::progress;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn make_book(id: &str, title: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: "Test Author".to_string(),
        page_count: Some(300),
        current_page: 0,
        status: BookStatus::ToRead,
        start_date: None,
        end_date: None,
        reading_goal_days: None,
        cover_url: None,
        isbn: None,
        notes: None,
        created_at: now_timestamp(),
        updated_at: now_timestamp(),
    }
}

fn make_challenge(id: &str, year: i64) -> ReadingChallenge {
    ReadingChallenge {
        id: id.to_string(),
        year,
        name: format!("Challenge {}", year),
        description: None,
        strategy: Some("1-main-2-bonus".to_string()),
        is_active: true,
    }
}

fn make_challenge_book(id: &str, month_id: &str, role: ChallengeRole) -> ChallengeBook {
    ChallengeBook {
        id: id.to_string(),
        month_id: month_id.to_string(),
        role,
        user_status: ChallengeBookStatus::Locked,
        title: format!("Book {}", id),
        author: "Test Author".to_string(),
        page_count: Some(200),
        cover_url: None,
        reason: None,
        takeaway: None,
        completed_at: None,
        linked_book_id: None,
    }
}

fn setup_month(db: &Database) -> String {
    db.create_challenge(&make_challenge("ch-1", 2026)).unwrap();
    let months = db.get_challenge_months("ch-1").unwrap();
    assert_eq!(months.len(), 12);
    months[0].month.id.clone()
}

// ============================================================================
// BOOK CRUD AND LIFECYCLE
// ============================================================================

#[test]
fn db_create_and_get_book() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    let found = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(found.title, "Dune");
    assert_eq!(found.status, BookStatus::ToRead);
    assert_eq!(found.current_page, 0);

    assert!(db.get_book("missing").unwrap().is_none());
}

#[test]
fn db_list_books_filters_by_status() {
    let db = test_db();
    db.create_book(&make_book("book-1", "One")).unwrap();
    db.create_book(&make_book("book-2", "Two")).unwrap();

    let book = db.get_book("book-1").unwrap().unwrap();
    let now = chrono::Utc::now();
    let (updated, action) = progress::start_reading(&book, now).unwrap();
    db.apply_book_transition(&updated, action, now.timestamp())
        .unwrap();

    let reading = db.list_books(Some(BookStatus::Reading)).unwrap();
    assert_eq!(reading.len(), 1);
    assert_eq!(reading[0].id, "book-1");

    let all = db.list_books(None).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn db_transition_writes_log_atomically() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    let now = chrono::Utc::now();
    let book = db.get_book("book-1").unwrap().unwrap();
    let (started, action) = progress::start_reading(&book, now).unwrap();
    db.apply_book_transition(&started, action, now.timestamp())
        .unwrap();

    let (finished, action) = progress::finish_reading(&started, now).unwrap();
    db.apply_book_transition(&finished, action, now.timestamp())
        .unwrap();

    let stored = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(stored.status, BookStatus::Completed);
    assert_eq!(stored.current_page, 300);

    let logs = db.get_logs("book-1").unwrap();
    let actions: Vec<LogAction> = logs.iter().map(|l| l.action).collect();
    assert_eq!(actions, vec![LogAction::Started, LogAction::Finished]);
}

#[test]
fn db_update_book_rejects_page_count_below_current_page() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    let now = chrono::Utc::now();
    let book = db.get_book("book-1").unwrap().unwrap();
    let (started, action) = progress::start_reading(&book, now).unwrap();
    db.apply_book_transition(&started, action, now.timestamp())
        .unwrap();
    let progressed = progress::update_progress(&started, 250, now).unwrap();
    db.update_book_progress(&progressed).unwrap();

    let mut edited = db.get_book("book-1").unwrap().unwrap();
    edited.page_count = Some(100);
    let err = db.update_book(&edited);
    assert!(matches!(err, Err(AppError::Validation(_))));

    let stored = db.get_book("book-1").unwrap().unwrap();
    assert_eq!(stored.page_count, Some(300));
    assert_eq!(stored.current_page, 250);

    edited.page_count = Some(400);
    assert!(db.update_book(&edited).unwrap());
}

#[test]
fn db_full_lifecycle_log_history() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    let now = chrono::Utc::now();
    let mut book = db.get_book("book-1").unwrap().unwrap();

    for expected in [
        LogAction::Started,
        LogAction::Abandoned,
        LogAction::AddedToList,
        LogAction::Started,
        LogAction::Finished,
        LogAction::Restarted,
    ] {
        let (updated, action) = match expected {
            LogAction::Started | LogAction::Restarted => {
                progress::start_reading(&book, now).unwrap()
            }
            LogAction::Finished => progress::finish_reading(&book, now).unwrap(),
            LogAction::Abandoned => progress::abandon(&book, now).unwrap(),
            LogAction::AddedToList => progress::reset_to_list(&book, now).unwrap(),
        };
        assert_eq!(action, expected);
        db.apply_book_transition(&updated, action, now.timestamp())
            .unwrap();
        book = updated;
    }

    let logs = db.get_logs("book-1").unwrap();
    assert_eq!(logs.len(), 6);
    assert_eq!(logs.last().unwrap().action, LogAction::Restarted);
}

#[test]
fn db_delete_book_cascades_to_quotes_and_logs() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    let quote = Quote {
        id: "quote-1".to_string(),
        book_id: "book-1".to_string(),
        text: "Fear is the mind-killer.".to_string(),
        page: Some(19),
        note: None,
        created_at: now_timestamp(),
    };
    db.create_quote(&quote).unwrap();

    let now = chrono::Utc::now();
    let book = db.get_book("book-1").unwrap().unwrap();
    let (started, action) = progress::start_reading(&book, now).unwrap();
    db.apply_book_transition(&started, action, now.timestamp())
        .unwrap();

    assert!(db.delete_book("book-1").unwrap());
    assert!(db.get_quotes("book-1").unwrap().is_empty());
    assert!(db.get_logs("book-1").unwrap().is_empty());
    assert!(!db.delete_book("book-1").unwrap());
}

#[test]
fn db_quotes_ordered_by_page() {
    let db = test_db();
    db.create_book(&make_book("book-1", "Dune")).unwrap();

    for (id, page) in [("q-1", 200), ("q-2", 19), ("q-3", 77)] {
        db.create_quote(&Quote {
            id: id.to_string(),
            book_id: "book-1".to_string(),
            text: format!("Quote at {}", page),
            page: Some(page),
            note: None,
            created_at: now_timestamp(),
        })
        .unwrap();
    }

    let quotes = db.get_quotes("book-1").unwrap();
    let pages: Vec<Option<i64>> = quotes.iter().map(|q| q.page).collect();
    assert_eq!(pages, vec![Some(19), Some(77), Some(200)]);

    assert!(db.delete_quote("q-2").unwrap());
    assert_eq!(db.get_quotes("book-1").unwrap().len(), 2);
}

#[test]
fn db_library_stats_counts() {
    let db = test_db();
    db.create_book(&make_book("book-1", "One")).unwrap();
    db.create_book(&make_book("book-2", "Two")).unwrap();
    db.create_book(&make_book("book-3", "Three")).unwrap();

    let now = chrono::Utc::now();
    let book = db.get_book("book-1").unwrap().unwrap();
    let (started, action) = progress::start_reading(&book, now).unwrap();
    db.apply_book_transition(&started, action, now.timestamp())
        .unwrap();
    let (finished, action) = progress::finish_reading(&started, now).unwrap();
    db.apply_book_transition(&finished, action, now.timestamp())
        .unwrap();

    let stats = db.library_stats().unwrap();
    assert_eq!(stats.total_books, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.to_read, 2);
    assert_eq!(stats.pages_read, 300);
}

// ============================================================================
// CHALLENGES
// ============================================================================

#[test]
fn db_create_challenge_seeds_twelve_months() {
    let db = test_db();
    db.create_challenge(&make_challenge("ch-1", 2026)).unwrap();

    let months = db.get_challenge_months("ch-1").unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0].month.month_name, "January");
    assert_eq!(months[11].month.month_name, "December");
    assert_eq!(months[11].month.month_number, 12);

    let found = db.get_challenge_by_year(2026).unwrap().unwrap();
    assert_eq!(found.id, "ch-1");
}

#[test]
fn db_get_month_by_number() {
    let db = test_db();
    db.create_challenge(&make_challenge("ch-1", 2026)).unwrap();

    let june = db.get_month_by_number("ch-1", 6).unwrap().unwrap();
    assert_eq!(june.month.month_name, "June");
    assert!(june.books.is_empty());

    assert!(db.get_month_by_number("ch-1", 13).unwrap().is_none());
}

#[test]
fn db_duplicate_year_fails() {
    let db = test_db();
    db.create_challenge(&make_challenge("ch-1", 2026)).unwrap();

    let err = db.create_challenge(&make_challenge("ch-2", 2026));
    assert!(matches!(err, Err(AppError::Validation(_))));
}

#[test]
fn db_new_bonus_locked_until_main_completed() {
    let db = test_db();
    let month_id = setup_month(&db);

    let main = db
        .create_challenge_book(&make_challenge_book("cb-main", &month_id, ChallengeRole::Main))
        .unwrap();
    assert_eq!(main.user_status, ChallengeBookStatus::NotStarted);

    let bonus = db
        .create_challenge_book(&make_challenge_book(
            "cb-bonus",
            &month_id,
            ChallengeRole::Bonus,
        ))
        .unwrap();
    assert_eq!(bonus.user_status, ChallengeBookStatus::Locked);
}

#[test]
fn db_second_main_in_month_rejected() {
    let db = test_db();
    let month_id = setup_month(&db);

    db.create_challenge_book(&make_challenge_book("cb-1", &month_id, ChallengeRole::Main))
        .unwrap();
    let err = db.create_challenge_book(&make_challenge_book(
        "cb-2",
        &month_id,
        ChallengeRole::Main,
    ));
    assert!(matches!(err, Err(AppError::Validation(_))));
}

#[test]
fn db_main_completion_unlocks_bonuses_atomically() {
    let db = test_db();
    let month_id = setup_month(&db);

    db.create_challenge_book(&make_challenge_book("cb-main", &month_id, ChallengeRole::Main))
        .unwrap();
    db.create_challenge_book(&make_challenge_book(
        "cb-b1",
        &month_id,
        ChallengeRole::Bonus,
    ))
    .unwrap();
    db.create_challenge_book(&make_challenge_book(
        "cb-b2",
        &month_id,
        ChallengeRole::Bonus,
    ))
    .unwrap();

    // Bonus is locked: cannot be started or completed
    assert!(matches!(
        db.start_challenge_book("cb-b1"),
        Err(AppError::StateConflict(_))
    ));
    assert!(matches!(
        db.mark_challenge_book_read("cb-b1", None, now_timestamp()),
        Err(AppError::StateConflict(_))
    ));

    let outcome = db
        .mark_challenge_book_read("cb-main", Some("Great start"), now_timestamp())
        .unwrap();
    assert!(outcome.was_main);
    assert_eq!(outcome.unlocked.len(), 2);

    let main = db.get_challenge_book("cb-main").unwrap().unwrap();
    assert_eq!(main.user_status, ChallengeBookStatus::Completed);
    assert!(main.completed_at.is_some());
    assert_eq!(main.takeaway.as_deref(), Some("Great start"));

    for id in ["cb-b1", "cb-b2"] {
        let bonus = db.get_challenge_book(id).unwrap().unwrap();
        assert_eq!(bonus.user_status, ChallengeBookStatus::NotStarted);
    }

    // Now the bonus can be started and finished
    let started = db.start_challenge_book("cb-b1").unwrap();
    assert_eq!(started.user_status, ChallengeBookStatus::InProgress);

    let outcome = db
        .mark_challenge_book_read("cb-b1", None, now_timestamp())
        .unwrap();
    assert!(!outcome.was_main);
    assert!(outcome.unlocked.is_empty());
}

#[test]
fn db_completed_book_cannot_be_completed_again() {
    let db = test_db();
    let month_id = setup_month(&db);

    db.create_challenge_book(&make_challenge_book("cb-main", &month_id, ChallengeRole::Main))
        .unwrap();
    db.mark_challenge_book_read("cb-main", None, now_timestamp())
        .unwrap();

    assert!(matches!(
        db.mark_challenge_book_read("cb-main", None, now_timestamp()),
        Err(AppError::StateConflict(_))
    ));
}

#[test]
fn db_mark_read_missing_book() {
    let db = test_db();
    setup_month(&db);
    assert!(matches!(
        db.mark_challenge_book_read("nope", None, now_timestamp()),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn db_delete_challenge_cascades() {
    let db = test_db();
    let month_id = setup_month(&db);
    db.create_challenge_book(&make_challenge_book("cb-1", &month_id, ChallengeRole::Main))
        .unwrap();

    let challenge = db.get_challenge_by_year(2026).unwrap().unwrap();
    assert!(db.delete_challenge(&challenge.id).unwrap());

    assert!(db.get_challenge_book("cb-1").unwrap().is_none());
    assert!(db.get_month(&month_id).unwrap().is_none());
}

// ============================================================================
// READING LISTS
// ============================================================================

fn make_list(db: &Database) -> String {
    let list = ReadingList {
        id: "list-1".to_string(),
        name: "Philosophy Path".to_string(),
        description: None,
        created_at: now_timestamp(),
    };
    db.create_list(&list).unwrap();
    list.id
}

fn add_level(db: &Database, list_id: &str, id: &str, title: &str) -> ReadingListLevel {
    db.create_level(&ReadingListLevel {
        id: id.to_string(),
        list_id: list_id.to_string(),
        title: title.to_string(),
        description: None,
        sort_order: 0,
    })
    .unwrap()
}

fn add_list_book(db: &Database, level_id: &str, id: &str) -> ReadingListBook {
    db.create_list_book(&ReadingListBook {
        id: id.to_string(),
        level_id: level_id.to_string(),
        title: format!("Book {}", id),
        author: "Author".to_string(),
        cover_url: None,
        note: None,
        sort_order: 0,
        linked_book_id: None,
    })
    .unwrap()
}

#[test]
fn db_levels_append_with_dense_order() {
    let db = test_db();
    let list_id = make_list(&db);

    let l1 = add_level(&db, &list_id, "lvl-1", "Beginner");
    let l2 = add_level(&db, &list_id, "lvl-2", "Intermediate");
    let l3 = add_level(&db, &list_id, "lvl-3", "Advanced");
    assert_eq!(l1.sort_order, 0);
    assert_eq!(l2.sort_order, 1);
    assert_eq!(l3.sort_order, 2);

    let tree = db.get_list(&list_id).unwrap().unwrap();
    let titles: Vec<&str> = tree.levels.iter().map(|l| l.level.title.as_str()).collect();
    assert_eq!(titles, vec!["Beginner", "Intermediate", "Advanced"]);
}

#[test]
fn db_missing_level_is_not_found() {
    let db = test_db();
    make_list(&db);

    let err = db.reorder_level_books("no-such-level", &[]);
    assert!(matches!(err, Err(AppError::NotFound(_))));

    let err = db.create_list_book(&ReadingListBook {
        id: "lb-1".to_string(),
        level_id: "no-such-level".to_string(),
        title: "Meditations".to_string(),
        author: "Marcus Aurelius".to_string(),
        cover_url: None,
        note: None,
        sort_order: 0,
        linked_book_id: None,
    });
    assert!(matches!(err, Err(AppError::NotFound(_))));
}

#[test]
fn db_reorder_books_within_level() {
    let db = test_db();
    let list_id = make_list(&db);
    add_level(&db, &list_id, "lvl-1", "Beginner");

    add_list_book(&db, "lvl-1", "b1");
    add_list_book(&db, "lvl-1", "b2");
    add_list_book(&db, "lvl-1", "b3");

    db.reorder_level_books(
        "lvl-1",
        &["b3".to_string(), "b1".to_string(), "b2".to_string()],
    )
    .unwrap();

    let tree = db.get_list(&list_id).unwrap().unwrap();
    let ids: Vec<&str> = tree.levels[0].books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["b3", "b1", "b2"]);

    let orders: Vec<i64> = tree.levels[0].books.iter().map(|b| b.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[test]
fn db_reorder_rejects_partial_or_foreign_sets() {
    let db = test_db();
    let list_id = make_list(&db);
    add_level(&db, &list_id, "lvl-1", "Beginner");
    add_list_book(&db, "lvl-1", "b1");
    add_list_book(&db, "lvl-1", "b2");

    // Missing a sibling
    assert!(matches!(
        db.reorder_level_books("lvl-1", &["b1".to_string()]),
        Err(AppError::Validation(_))
    ));

    // Unknown id
    assert!(matches!(
        db.reorder_level_books("lvl-1", &["b1".to_string(), "zz".to_string()]),
        Err(AppError::Validation(_))
    ));

    // Duplicate id
    assert!(matches!(
        db.reorder_level_books("lvl-1", &["b1".to_string(), "b1".to_string()]),
        Err(AppError::Validation(_))
    ));

    // Original order untouched after rejected requests
    let tree = db.get_list(&list_id).unwrap().unwrap();
    let ids: Vec<&str> = tree.levels[0].books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["b1", "b2"]);
}

#[test]
fn db_reorder_levels_within_list() {
    let db = test_db();
    let list_id = make_list(&db);
    add_level(&db, &list_id, "lvl-1", "Beginner");
    add_level(&db, &list_id, "lvl-2", "Advanced");

    db.reorder_levels(&list_id, &["lvl-2".to_string(), "lvl-1".to_string()])
        .unwrap();

    let tree = db.get_list(&list_id).unwrap().unwrap();
    let titles: Vec<&str> = tree.levels.iter().map(|l| l.level.title.as_str()).collect();
    assert_eq!(titles, vec!["Advanced", "Beginner"]);
}

#[test]
fn db_delete_list_cascades_to_levels_and_books() {
    let db = test_db();
    let list_id = make_list(&db);
    add_level(&db, &list_id, "lvl-1", "Beginner");
    add_list_book(&db, "lvl-1", "b1");

    assert!(db.delete_list(&list_id).unwrap());
    assert!(db.get_list(&list_id).unwrap().is_none());
    assert!(!db.delete_level("lvl-1").unwrap());
    assert!(!db.delete_list_book("b1").unwrap());
}

// ============================================================================
// DATABASE FILE HANDLING
// ============================================================================

#[test]
fn db_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("shelf.db");

    let db = Database::open(&path).unwrap();
    db.create_book(&make_book("book-1", "Dune")).unwrap();
    assert!(path.exists());

    // Reopen and read back
    let db2 = Database::open(&path).unwrap();
    assert_eq!(db2.get_book("book-1").unwrap().unwrap().title, "Dune");
}

// ============================================================================
// METADATA COLLABORATORS
// ============================================================================

#[test]
fn search_empty_query_returns_nothing() {
    let client = crate::metadata::search::SearchClient::new(&Config::default().metadata).unwrap();
    let results = tokio_test::block_on(client.search("   "));
    assert!(results.is_empty());
}

#[test]
fn store_rejects_foreign_domain() {
    let store = crate::metadata::store::StoreExtractor::new(&Config::default().metadata).unwrap();
    let err = tokio_test::block_on(store.extract("https://evil.example.net/book/1"));
    assert!(matches!(err, Err(AppError::Validation(_))));

    let err = tokio_test::block_on(store.extract("not a url"));
    assert!(matches!(err, Err(AppError::Validation(_))));
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn config_parses_partial_toml() {
    let toml_str = r#"
[server]
bind = "127.0.0.1:9090"

[goal]
default_target_days = 21
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.goal.default_target_days, 21);
    // Untouched sections fall back to defaults
    assert_eq!(config.goal.tolerance_percent, 10);
    assert_eq!(config.server.title, "My Reading Shelf");
    assert_eq!(config.metadata.timeout_seconds, 10);
}

#[test]
fn config_default_template_parses() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.server.bind.port(), 8080);
    assert_eq!(config.metadata.store_domain, "books.example.com");
}
