use clap::{Parser, Subcommand};

mod app;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod seed;
mod state;
mod views;

#[derive(Debug, Parser)]
#[command(name = "item-catalog", version, about = "Categorized item catalog web application")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the web server (default)
    Serve,
    /// Fill an empty database with sample users, categories and items
    Populate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "item_catalog=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let app_state = state::AppState::init().await?;
            db::migrate(&app_state.db).await?;

            let (host, port) = (app_state.config.host.clone(), app_state.config.port);
            app::serve(app::build_app(app_state), &host, port).await
        }
        Commands::Populate => {
            let db = db::connect(&config::DatabaseConfig::from_env()).await?;
            db::migrate(&db).await?;
            let report = seed::populate(&db).await?;
            println!(
                "added {} users, {} categories, {} items",
                report.users, report.categories, report.items
            );
            Ok(())
        }
    }
}
