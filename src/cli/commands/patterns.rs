//! Pattern management commands.

use crate::core::Recognizer;
use crate::Result;
use colored::Colorize;

/// List learned patterns, most used first.
pub fn list(recognizer: &Recognizer, json: bool) -> Result<()> {
    let listing = recognizer.list_patterns()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}", "Learned patterns".bold().cyan());
    println!();
    if listing.patterns.is_empty() {
        println!("No patterns learned yet.");
        return Ok(());
    }

    println!(
        "{:<38} {:<9} {:<6} {}",
        "Id".bold(),
        "Type".bold(),
        "Used".bold(),
        "Pattern".bold()
    );
    println!("{}", "-".repeat(80));
    for mapping in &listing.patterns {
        println!(
            "{:<38} {:<9} {:<6} {}",
            mapping.id,
            mapping.pattern_type.as_str(),
            mapping.use_count,
            mapping.pattern
        );
    }
    println!();
    println!(
        "{} patterns, applied {} times",
        listing.stats.total_patterns, listing.stats.total_applied
    );
    Ok(())
}

/// Show aggregate counters.
pub fn stats(recognizer: &Recognizer) -> Result<()> {
    let stats = recognizer.stats()?;

    println!("{}", "Pattern statistics".bold().cyan());
    println!("  Total patterns: {}", stats.total_patterns);
    println!("  Total applied:  {}", stats.total_applied);
    println!("  Exact:          {}", stats.exact_patterns);
    println!("  Fansub:         {}", stats.fansub_patterns);
    println!("  Standard:       {}", stats.standard_patterns);
    Ok(())
}

/// Delete a learned pattern by id.
pub fn delete(recognizer: &Recognizer, id: &str) -> Result<()> {
    recognizer.delete_pattern(id)?;
    println!("{} {}", "Deleted pattern".green(), id);
    Ok(())
}

