//! Learn and match command implementations.

use crate::core::Recognizer;
use crate::models::mapping::{FilenameMapping, LearnRequest};
use crate::Result;
use colored::Colorize;

/// Learn a confirmed mapping.
pub async fn learn(
    recognizer: &Recognizer,
    filename: &str,
    metadata_id: &str,
    metadata_type: &str,
    tmdb_id: Option<u64>,
) -> Result<()> {
    let request = LearnRequest {
        filename: Some(filename.to_string()),
        metadata_id: Some(metadata_id.to_string()),
        metadata_type: Some(metadata_type.to_string()),
        tmdb_id,
    };
    let mapping = recognizer.learn(request).await?;

    println!("{}", "Pattern learned".bold().green());
    print_mapping(&mapping);
    Ok(())
}

/// Look up (and count a use of) the learned pattern for a filename.
pub fn find_match(recognizer: &Recognizer, filename: &str) -> Result<()> {
    match recognizer.find_match(filename)? {
        Some(mapping) => {
            println!("{}", "Match found".bold().green());
            print_mapping(&mapping);
        }
        None => println!("{}", "No learned pattern matches this filename.".yellow()),
    }
    Ok(())
}

fn print_mapping(mapping: &FilenameMapping) {
    println!("  {:<14} {}", "Id:".bold(), mapping.id);
    println!("  {:<14} {}", "Type:".bold(), mapping.pattern_type);
    println!("  {:<14} {}", "Pattern:".bold(), mapping.pattern);
    if let Some(ref group) = mapping.fansub_group {
        println!("  {:<14} {}", "Group:".bold(), group);
    }
    if let Some(ref title) = mapping.title_pattern {
        println!("  {:<14} {}", "Title:".bold(), title);
    }
    if let Some(ref regex) = mapping.pattern_regex {
        println!("  {:<14} {}", "Regex:".bold(), regex.dimmed());
    }
    let tmdb = mapping
        .tmdb_id
        .map(|id| format!(" (TMDB {})", id))
        .unwrap_or_default();
    println!(
        "  {:<14} {} {}{}",
        "Target:".bold(),
        mapping.metadata_type,
        mapping.metadata_id,
        tmdb
    );
    println!("  {:<14} {}", "Used:".bold(), mapping.use_count);
}
