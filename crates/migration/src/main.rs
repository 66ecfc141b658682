use clap::{Parser, Subcommand};
use sea_orm::Database;
use sea_orm_migration::prelude::*;

/// Applies or inspects the Tandem schema.
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./tandem.db?mode=rwc")]
    database_url: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every pending migration (default).
    Up,
    /// Roll back the last `steps` migrations.
    Down {
        #[arg(default_value_t = 1)]
        steps: u32,
    },
    /// Drop all tables and reapply.
    Fresh,
    /// Roll back everything and reapply.
    Refresh,
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let db = Database::connect(&cli.database_url).await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => migration::Migrator::up(&db, None).await?,
        Command::Down { steps } => migration::Migrator::down(&db, Some(steps)).await?,
        Command::Fresh => migration::Migrator::fresh(&db).await?,
        Command::Refresh => migration::Migrator::refresh(&db).await?,
        Command::Status => migration::Migrator::status(&db).await?,
    }

    Ok(())
}
