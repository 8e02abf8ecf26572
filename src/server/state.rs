//! Application state shared across handlers.

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::metadata::search::SearchClient;
use crate::metadata::store::StoreExtractor;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// External book search client.
    pub search: Arc<SearchClient>,
    /// Bookstore page extractor.
    pub store: Arc<StoreExtractor>,
}

impl AppState {
    /// Create new application state with database.
    pub fn new_with_db(config: Config, db: Database) -> Result<Self> {
        let search = SearchClient::new(&config.metadata)?;
        let store = StoreExtractor::new(&config.metadata)?;

        Ok(Self {
            config: Arc::new(config),
            db,
            search: Arc::new(search),
            store: Arc::new(store),
        })
    }
}
