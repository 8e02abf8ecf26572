//! shelfmark server entry point.

use clap::Parser;
use shelfmark::{
    config::{ChallengeCommand, Cli, Command, Config},
    db::Database,
    server,
};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::Challenge { action }) => cmd_challenge(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config
    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    // Initialize database
    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: shelfmark challenge new <year> --name \"My Challenge\"");
    println!("And: shelfmark serve");

    Ok(())
}

/// Challenge management commands.
async fn cmd_challenge(action: ChallengeCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        ChallengeCommand::New {
            year,
            name,
            strategy,
        } => {
            let challenge = shelfmark::db::ReadingChallenge {
                id: uuid::Uuid::new_v4().to_string(),
                year,
                name: name.clone(),
                description: None,
                strategy: Some(strategy),
                is_active: true,
            };

            db.create_challenge(&challenge)?;
            println!(
                "Created challenge: {} ({}) with 12 months (id: {})",
                name, year, challenge.id
            );
        }

        ChallengeCommand::List => {
            let challenges = db.list_challenges()?;
            if challenges.is_empty() {
                println!("No challenges found.");
            } else {
                println!("{:<6} {:<30} {:<20} ACTIVE", "YEAR", "NAME", "STRATEGY");
                println!("{}", "-".repeat(70));
                for c in challenges {
                    println!(
                        "{:<6} {:<30} {:<20} {}",
                        c.year,
                        c.name,
                        c.strategy.as_deref().unwrap_or("-"),
                        if c.is_active { "yes" } else { "no" }
                    );
                }
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfmark=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Open database
    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting shelfmark server"
    );

    // Create application state and router
    let state = server::AppState::new_with_db(config.clone(), db)?;
    let app = server::create_router(state);

    let listener = TcpListener::bind(config.server.bind).await?;
    tracing::info!(address = %config.server.bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
