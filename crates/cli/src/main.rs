use anyhow::Context;
use bookstore_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// BookStore API server and maintenance commands.
#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until Ctrl-C (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the merged OpenAPI document to stdout
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load BookStore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => bookstore_app::serve(settings).await,
        Command::Migrate => {
            let applied = bookstore_app::migrate(&settings).await?;
            tracing::info!(applied, "database is up to date");
            Ok(())
        }
        Command::Openapi => {
            let document = bookstore_app::openapi(&settings)?;
            let rendered =
                serde_json::to_string_pretty(&document).context("failed to render OpenAPI")?;
            println!("{}", rendered);
            Ok(())
        }
    }
}
