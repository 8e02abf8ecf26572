use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Personal reading tracker with yearly challenges.
#[derive(Parser, Debug, Clone)]
#[command(name = "shelfmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "SHELFMARK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Challenge management commands.
    Challenge {
        /// Challenge subcommand action.
        #[command(subcommand)]
        action: ChallengeCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Challenge management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ChallengeCommand {
    /// Create a new yearly challenge with its twelve months.
    New {
        /// Challenge year.
        year: i64,
        /// Display name.
        #[arg(short, long)]
        name: String,
        /// Strategy label.
        #[arg(short, long, default_value = "1-main-2-bonus")]
        strategy: String,
    },

    /// List all challenges.
    List,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Reading goal configuration.
    #[serde(default)]
    pub goal: GoalConfig,

    /// External metadata configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Library title shown on the index page.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "My Reading Shelf".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/shelfmark.db")
}

/// Reading goal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalConfig {
    /// Fallback target duration in days when a book has no explicit
    /// reading goal.
    #[serde(default = "default_target_days")]
    pub default_target_days: i64,

    /// Tolerance band for the "slightly behind" pacing status, as a
    /// percentage of the book's page count.
    #[serde(default = "default_tolerance_percent")]
    pub tolerance_percent: u32,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            default_target_days: default_target_days(),
            tolerance_percent: default_tolerance_percent(),
        }
    }
}

fn default_target_days() -> i64 {
    30
}

fn default_tolerance_percent() -> u32 {
    10
}

/// External metadata configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URL of the book search API.
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Bookstore domain accepted by the add-by-URL extractor.
    #[serde(default = "default_store_domain")]
    pub store_domain: String,

    /// Request timeout in seconds for both collaborators.
    #[serde(default = "default_metadata_timeout")]
    pub timeout_seconds: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            store_domain: default_store_domain(),
            timeout_seconds: default_metadata_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "https://www.googleapis.com/books/v1/volumes".to_string()
}

fn default_store_domain() -> String {
    "books.example.com".to_string()
}

fn default_metadata_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("shelfmark.toml"),
            dirs::config_dir()
                .map(|p| p.join("shelfmark").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/shelfmark/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# shelfmark configuration

[server]
bind = "0.0.0.0:8080"
title = "My Reading Shelf"

[database]
# path = "/var/lib/shelfmark/shelfmark.db"

[goal]
# Fallback reading goal in days when a book has none
default_target_days = 30
# "Slightly behind" band as a percentage of page count
tolerance_percent = 10

[metadata]
# Book search API (Google Books volumes shape)
search_url = "https://www.googleapis.com/books/v1/volumes"
# Bookstore domain accepted for add-by-URL
store_domain = "books.example.com"
# Timeout for metadata requests, in seconds
timeout_seconds = 10
"#
        .to_string()
    }
}
