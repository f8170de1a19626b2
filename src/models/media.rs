//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Media type detected from a filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
        }
    }
}

impl FromStr for MediaType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(crate::Error::validation(format!(
                "unknown media type '{}', expected tv or movie",
                other
            ))),
        }
    }
}

/// Kind of confirmed metadata record a learned pattern points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    Movie,
    Series,
}

impl MetadataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataType::Movie => "movie",
            MetadataType::Series => "series",
        }
    }
}

impl std::fmt::Display for MetadataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(MetadataType::Movie),
            "series" => Ok(MetadataType::Series),
            other => Err(crate::Error::validation(format!(
                "invalid metadataType '{}', expected movie or series",
                other
            ))),
        }
    }
}

impl From<MetadataType> for MediaType {
    fn from(metadata_type: MetadataType) -> Self {
        match metadata_type {
            MetadataType::Movie => MediaType::Movie,
            MetadataType::Series => MediaType::Tv,
        }
    }
}

/// Outcome of a parse attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    /// Rules were not confident enough; AI or manual review is required.
    #[default]
    NeedsAi,
    Failed,
}

impl std::fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseStatus::Success => write!(f, "success"),
            ParseStatus::NeedsAi => write!(f, "needs_ai"),
            ParseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Structured metadata extracted from a filename.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseResult {
    /// The filename as it was given.
    pub original_filename: String,
    pub status: ParseStatus,
    pub media_type: MediaType,
    /// Main title (localized when the name is bilingual).
    pub title: String,
    /// Latin-script title when the name carries one next to a CJK title.
    pub title_romanized: Option<String>,
    pub year: Option<u16>,
    pub season: Option<u16>,
    pub episode: Option<u16>,
    /// Last episode of a multi-episode range.
    pub episode_end: Option<u16>,
    /// Normalized resolution (e.g., "1080p").
    pub quality: Option<String>,
    /// Release source (e.g., "BluRay", "WEB-DL").
    pub source: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Release or fansub group tag, verbatim.
    #[serde(alias = "fansub_group")]
    pub release_group: Option<String>,
    /// Subtitle language tag (e.g., "zh-Hans").
    pub language: Option<String>,
    /// Lowercased container extension.
    pub extension: Option<String>,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl ParseResult {
    /// Create an empty result for a filename.
    pub fn new(filename: &str) -> Self {
        Self {
            original_filename: filename.to_string(),
            ..Default::default()
        }
    }

    /// Alias used by fansub-oriented callers.
    pub fn fansub_group(&self) -> Option<&str> {
        self.release_group.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == ParseStatus::Success
    }

    /// Set the confidence, clamped to [0, 1]. NaN becomes 0.
    pub fn set_confidence(&mut self, confidence: f32) {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
    }

    /// Settle `status` against a confidence threshold and repair invariants.
    ///
    /// A result is only successful with a non-empty title and a confidence at
    /// or above the threshold; everything else needs AI or manual review.
    pub fn settle(&mut self, min_confidence: f32) {
        self.title = self.title.trim().to_string();
        self.set_confidence(self.confidence);

        if let (Some(start), Some(end)) = (self.episode, self.episode_end) {
            if end < start {
                self.episode_end = None;
            }
        }
        if self.episode.is_none() {
            self.episode_end = None;
        }

        self.status = if !self.title.is_empty() && self.confidence >= min_confidence {
            ParseStatus::Success
        } else {
            ParseStatus::NeedsAi
        };
    }

    /// Short human-readable summary for CLI output.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} [{}]", self.title, self.media_type)];
        if let Some(year) = self.year {
            parts.push(year.to_string());
        }
        match (self.season, self.episode, self.episode_end) {
            (season, Some(ep), Some(end)) => {
                parts.push(format!("S{:02}E{:02}-E{:02}", season.unwrap_or(1), ep, end))
            }
            (season, Some(ep), None) => parts.push(format!("S{:02}E{:02}", season.unwrap_or(1), ep)),
            (Some(season), None, _) => parts.push(format!("S{:02}", season)),
            _ => {}
        }
        for value in [&self.quality, &self.source, &self.video_codec, &self.release_group]
            .into_iter()
            .flatten()
        {
            parts.push(value.clone());
        }
        parts.join(" · ")
    }
}
