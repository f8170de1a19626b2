//! Media Parser CLI
//!
//! Recognizes movie and TV episode metadata from filenames using rules,
//! learned patterns and an optional local AI model.

use clap::Parser;
use media_parser::cli::{
    args::{Cli, Commands, PatternsAction},
    commands::{self, learn, parse, patterns},
};
use media_parser::models::config::{self, Config};
use media_parser::preflight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let mut config = config::load_config()?;
    if let Some(database) = cli.database.clone() {
        config.store.database = database;
    }
    let use_ai = cli.command.wants_ai() && config.ai.enabled;

    if !cli.skip_preflight {
        run_preflight_checks(&config, use_ai).await?;
    }

    let recognizer = commands::open_recognizer(&config, use_ai)?;

    // Run the appropriate command
    match cli.command {
        Commands::Parse { filename, json, .. } => {
            parse::parse(&recognizer, &filename, json).await?;
        }

        Commands::Batch {
            filenames,
            from_file,
            json,
            ..
        } => {
            parse::batch(recognizer, filenames, from_file.as_deref(), json).await?;
        }

        Commands::Learn {
            filename,
            metadata_id,
            metadata_type,
            tmdb_id,
        } => {
            learn::learn(&recognizer, &filename, &metadata_id, &metadata_type, tmdb_id).await?;
        }

        Commands::Match { filename } => {
            learn::find_match(&recognizer, &filename)?;
        }

        Commands::Patterns { action } => match action {
            PatternsAction::List { json } => patterns::list(&recognizer, json)?,
            PatternsAction::Stats => patterns::stats(&recognizer)?,
            PatternsAction::Delete { id } => patterns::delete(&recognizer, &id)?,
        },
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_parser=debug")
    } else {
        EnvFilter::new("media_parser=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if any fail.
async fn run_preflight_checks(config: &Config, check_ai: bool) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config, check_ai).await;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
