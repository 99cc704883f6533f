// src/main.rs
mod extractors;
mod import;
mod storage;
mod utils;

use std::path::PathBuf;

use chrono::Datelike;
use clap::{Parser, Subcommand};
use import::LogProgress;
use storage::{ApplicantView, StorageManager};
use utils::AppError;

/// Command Line Interface for the municipal scholarship applicant registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database holding applicants, institutions and statuses
    #[arg(long, env = "BECAS_DATABASE", default_value = "./becas.sqlite3", global = true)]
    database: PathBuf,

    /// Turn on debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import applicants from a results CSV made of several annexes
    Import {
        /// Path to the results file
        file: PathBuf,

        /// Application year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored applicants, ordered by folio
    List {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        per_page: u32,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single applicant
    Show {
        folio: i64,

        /// Print the applicant as JSON
        #[arg(long)]
        json: bool,
    },
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "N/A".to_string(), |s| s.to_string())
}

fn print_applicant_line(a: &ApplicantView) {
    println!(
        "{:>8}  {:<40}  {:<40}  {:>6}  {}",
        a.folio,
        a.full_name,
        a.institution,
        format_score(a.score),
        a.status_name
    );
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.verbose);
    tracing::debug!("Starting with args: {:?}", args);

    // 2. Run the command, logging the readable form of any failure
    run(args).inspect_err(|e| tracing::error!("{}", e))
}

fn run(args: Args) -> Result<(), AppError> {
    let mut storage = StorageManager::open(&args.database)?;

    match args.command {
        Command::Import { file, year, json } => {
            let year = year.unwrap_or_else(|| chrono::Local::now().year());
            let summary = import::import_file(&file, year, &mut storage, &mut LogProgress::default())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", summary.render());
                println!("Import completed successfully.");
            }
        }
        Command::List { page, per_page, json } => {
            let page = storage.list_applicants(page, per_page)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
                return Ok(());
            }
            println!(
                "{:>8}  {:<40}  {:<40}  {:>6}  {}",
                "Folio", "Nombre Completo", "Institución", "Puntaje", "Estado"
            );
            for applicant in &page.items {
                print_applicant_line(applicant);
            }
            println!("Page {} of {} ({} total)", page.page, page.last_page, page.total);
        }
        Command::Show { folio, json } => {
            let a = storage.find_applicant(folio)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&a)?);
                return Ok(());
            }
            println!("Folio:       {}", a.folio);
            println!("Name:        {}", a.full_name);
            println!("Institution: {}", a.institution);
            println!("Score:       {}", format_score(a.score));
            println!("Year:        {}", a.year);
            println!("Status:      {} ({})", a.status_name, a.status_slug);
        }
    }

    Ok(())
}
