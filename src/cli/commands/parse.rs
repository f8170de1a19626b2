//! Parse and batch command implementations.

use crate::core::{Recognition, RecognitionSource, Recognizer};
use crate::models::media::ParseStatus;
use crate::services::collaborators::ProgressSink;
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Progress sink drawing batch progress on the terminal.
struct ProgressBarSink {
    pb: ProgressBar,
}

impl ProgressSink for ProgressBarSink {
    fn emit(&self, event: &str, payload: Value) {
        match event {
            "batch.progress" => {
                if let Some(filename) = payload["filename"].as_str() {
                    self.pb.set_message(filename.to_string());
                }
                self.pb.inc(1);
            }
            "batch.completed" => self.pb.finish_and_clear(),
            _ => {}
        }
    }
}

/// Recognize a single filename.
pub async fn parse(recognizer: &Recognizer, filename: &str, json: bool) -> Result<()> {
    let recognition = recognizer.recognize(filename).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recognition)?);
    } else {
        print_recognition(&recognition);
    }
    Ok(())
}

/// Recognize many filenames, from arguments and/or a file.
pub async fn batch(
    recognizer: Recognizer,
    mut filenames: Vec<String>,
    from_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    if let Some(path) = from_file {
        let content = std::fs::read_to_string(path)?;
        filenames.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }

    let recognizer = if json {
        recognizer
    } else {
        let pb = ProgressBar::new(filenames.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        recognizer.with_progress(Arc::new(ProgressBarSink { pb }))
    };

    let recognitions = recognizer.recognize_batch(&filenames).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recognitions)?);
        return Ok(());
    }

    for recognition in &recognitions {
        print_recognition(recognition);
    }

    let count = |status: ParseStatus| {
        recognitions
            .iter()
            .filter(|r| r.result.status == status)
            .count()
    };
    println!("{}", "Summary".bold().cyan());
    println!("  {} {}", "Success:".green(), count(ParseStatus::Success));
    println!("  {} {}", "Needs AI:".yellow(), count(ParseStatus::NeedsAi));
    println!("  {} {}", "Failed:".red(), count(ParseStatus::Failed));

    Ok(())
}

fn print_recognition(recognition: &Recognition) {
    let result = &recognition.result;
    let status = match result.status {
        ParseStatus::Success => "[OK]".green(),
        ParseStatus::NeedsAi => "[NEEDS AI]".yellow(),
        ParseStatus::Failed => "[FAIL]".red(),
    };

    println!("{} {}", status, result.original_filename.bold());
    if !result.title.is_empty() {
        println!("  {}", result.summary());
    }
    if let Some(ref romanized) = result.title_romanized {
        println!("  Romanized: {}", romanized);
    }
    if let Some(ref language) = result.language {
        println!("  Language: {}", language);
    }
    println!(
        "  Confidence: {:.2} (via {})",
        result.confidence, recognition.source
    );
    if let (RecognitionSource::LearnedPattern, Some(mapping)) =
        (recognition.source, &recognition.mapping)
    {
        println!(
            "  Mapped to {} {} (pattern {}, used {} times)",
            mapping.metadata_type, mapping.metadata_id, mapping.id, mapping.use_count
        );
    }
    if let Some(ref error) = recognition.error {
        println!("  {} {}", "->".yellow(), error);
    }
    println!();
}
