use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use stacks_app::library::service::{self, LendingError, NewBook};
use stacks_app::{app, Application};
use stacks_kernel::settings::Settings;

/// Operator commands for the Stacks lending service
#[derive(Debug, Parser)]
#[command(name = "stacks-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Run the HTTP server
    Serve,
    /// Add a book to the catalog
    AddBook {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "")]
        genre: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Publication date, `YYYY-MM-DD` or RFC 3339; defaults to now
        #[arg(long, value_parser = parse_published)]
        published: Option<DateTime<Utc>>,
        /// Record the book as currently borrowed
        #[arg(long)]
        borrowed: bool,
    },
    /// Remove a book that has no transaction history
    RemoveBook { id: i32 },
    /// List every book in the catalog
    Books,
    /// Show a book's transactions, oldest first
    History { id: i32 },
}

fn parse_published(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
        .ok_or_else(|| format!("'{value}' is neither YYYY-MM-DD nor an RFC 3339 timestamp"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load Stacks settings")?;
    stacks_telemetry::init(&settings.telemetry)?;

    tracing::debug!(env = ?settings.environment, command = ?cli.command, "stacks-cli starting");

    match cli.command {
        Command::Migrate => {
            let db = stacks_db::connect(&settings.database).await?;
            let applied = app::migrate(&db, &app::module_registry()?).await?;
            if applied.is_empty() {
                println!("database schema is up to date");
            }
            for id in applied {
                println!("applied {id}");
            }
        }
        Command::Serve => {
            Application::build(settings).await?.serve().await?;
        }
        Command::AddBook {
            title,
            author,
            genre,
            description,
            published,
            borrowed,
        } => {
            let app = Application::build(settings).await?;
            let book = service::create_book(
                app.db(),
                NewBook {
                    title,
                    author,
                    genre,
                    description,
                    published: published.unwrap_or_else(Utc::now),
                    in_stock: !borrowed,
                },
            )
            .await?;
            println!("added book {}: {} by {}", book.id, book.title, book.author);
        }
        Command::RemoveBook { id } => {
            let app = Application::build(settings).await?;
            match service::delete_book(app.db(), id).await {
                Ok(()) => println!("removed book {id}"),
                Err(err @ LendingError::Protected { .. }) => {
                    return Err(anyhow!(err).context("book history is protected"));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Books => {
            let app = Application::build(settings).await?;
            let books = service::list_books(app.db()).await?;
            if books.is_empty() {
                println!("no books in the catalog");
            }
            for book in books {
                println!(
                    "{:>5}  {:<9}  {} by {}",
                    book.id,
                    book.availability().label(),
                    book.title,
                    book.author
                );
            }
        }
        Command::History { id } => {
            let app = Application::build(settings).await?;
            for record in service::transactions_for(app.db(), id).await? {
                println!(
                    "{}  {:?}",
                    record.datetime.format("%Y-%m-%d %H:%M:%S"),
                    record.action
                );
            }
        }
    }

    Ok(())
}
