//! shelfdoctor CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use shelfdoctor::{
    commands::{
        cmd_doctor, cmd_export_sql, cmd_inspect_sql, print_doctor_report, print_export_stats,
        print_inspection,
    },
    config::RepoPaths,
    error::Result,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "shelfdoctor")]
#[command(version, about = "Reconcile book library metadata with its SQLite content database", long_about = None)]
struct Cli {
    /// Repository root containing the json/ metadata documents
    #[arg(long, global = true, env = "SHELFDOCTOR_REPO_ROOT", default_value = ".")]
    repo_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze metadata and SQLite consistency
    Doctor {
        /// Path to books.db (default: first existing candidate location)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Export one book's content rows from the DB as a SQL patch
    ExportSql {
        /// Path to books.db
        #[arg(long)]
        db: PathBuf,

        /// Book ID (kotob_id)
        #[arg(long)]
        book_id: i64,

        /// Output SQL file path
        #[arg(long)]
        out: PathBuf,

        /// Optional output path for a metadata JSON snippet of this book
        #[arg(long)]
        meta_out: Option<PathBuf>,
    },

    /// Inspect a SQL patch file without executing it
    InspectSql {
        /// Path to the SQL file
        #[arg(long)]
        sql: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for reports and --json output.
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let paths = RepoPaths::new(&cli.repo_root);

    match cli.command {
        Commands::Doctor { db } => {
            let db_path = db.unwrap_or_else(|| paths.default_db_path());
            let report = cmd_doctor(&paths, &db_path).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_doctor_report(&report);
            }
        }

        Commands::ExportSql {
            db,
            book_id,
            out,
            meta_out,
        } => {
            let stats = cmd_export_sql(&db, book_id, &out, meta_out.as_deref()).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_export_stats(&stats);
            }
        }

        Commands::InspectSql { sql } => {
            let inspection = cmd_inspect_sql(&sql)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                print_inspection(&inspection);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "shelfdoctor", &mut std::io::stdout());
        }
    }

    Ok(())
}
