//! AI fallback for names the rules cannot parse confidently.
//!
//! Builds an instruction prompt for a text-completion model and parses its
//! strict JSON answer into a [`ParseResult`]. One call, one parse: retries
//! belong to the retry queue collaborator.

use crate::models::media::{MediaType, ParseResult};
use crate::services::completion::CompletionProvider;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Build the extraction prompt for a filename.
pub fn build_prompt(filename: &str) -> String {
    format!(
        r#"You are an expert at parsing video release filenames, including fansub releases that mix Chinese, Japanese and English.
Extract structured metadata from the filename below.

Filename: {filename}

Conventions to recognise:
- Release/fansub group tags come first in square brackets [Group] or fullwidth brackets 【Group】, or last after a dash (-GROUP).
- Episode notations: 第XX話 / 第XX话 / 第XX集 (Chinese/Japanese), EP01 or E01, S01E02 (season 1 episode 2), and dash notation "Title - 01".
- Multi-episode ranges look like S01E01-E03 or [01-12].
- Technical tokens are not part of the title: resolution (480p, 720p, 1080p, 2160p, 4K), source (BluRay, BD, WEB-DL, WEBRip, HDTV), codecs (x264, x265, HEVC, AVC, AAC, FLAC), subtitle tags (CHS, CHT, 简繁, BIG5, GB).
- A title written in both Chinese/Japanese and romaji/English goes to "title" (CJK) and "title_romanized" (Latin).

Examples:
1. "[喵萌奶茶屋&LoliHouse] 葬送的芙莉莲 / Sousou no Frieren - 05 [WebRip 1080p HEVC-10bit AAC][简繁日内封字幕].mkv"
   {{"title": "葬送的芙莉莲", "title_romanized": "Sousou no Frieren", "season": 1, "episode": 5, "quality": "1080p", "source": "WEBRip", "codec": "HEVC", "fansub_group": "喵萌奶茶屋&LoliHouse", "language": "zh", "media_type": "tv", "confidence": 0.95}}
2. "【幻樱字幕组】【4月新番】【古见同学有交流障碍症 Komi-san wa, Komyushou Desu.】【第01話】【GB_MP4】【1920X1080】.mp4"
   {{"title": "古见同学有交流障碍症", "title_romanized": "Komi-san wa, Komyushou Desu", "episode": 1, "quality": "1080p", "source": null, "codec": null, "fansub_group": "幻樱字幕组", "language": "zh-Hans", "media_type": "tv", "confidence": 0.9}}
3. "[Ohys-Raws] Spy x Family - 12 (TX 1280x720 x264 AAC).mp4"
   {{"title": "Spy x Family", "episode": 12, "quality": "720p", "source": "HDTV", "codec": "x264", "fansub_group": "Ohys-Raws", "language": "ja", "media_type": "tv", "confidence": 0.9}}
4. "Inception.2010.1080p.BluRay.x264-SPARKS.mkv"
   {{"title": "Inception", "year": 2010, "quality": "1080p", "source": "BluRay", "codec": "x264", "fansub_group": "SPARKS", "language": null, "media_type": "movie", "confidence": 0.95}}

Respond with a single JSON object using exactly this schema:
{{
  "title": string,
  "title_romanized": string or null,
  "year": integer or null,
  "season": integer or null,
  "episode": integer or null,
  "episode_end": integer or null,
  "quality": string or null,
  "source": string or null,
  "codec": string or null,
  "fansub_group": string or null,
  "language": string or null,
  "media_type": "tv" or "movie",
  "confidence": number between 0.0 and 1.0
}}

Confidence guidelines:
- 1.0: every field is certain, the title is unambiguous.
- 0.7: the title is clear but some fields are guesses.
- 0.4: the title boundaries are uncertain.
- 0.0: the filename carries no usable signal.

Answer with the JSON object only. No prose, no explanations, no markdown code fences."#
    )
}

/// Raw model answer. Required fields are checked after deserialization so the
/// error can name what is missing.
#[derive(Debug, Deserialize)]
struct AiParseResponse {
    title: Option<String>,
    title_romanized: Option<String>,
    year: Option<Value>,
    season: Option<Value>,
    episode: Option<Value>,
    episode_end: Option<Value>,
    quality: Option<String>,
    source: Option<String>,
    codec: Option<String>,
    fansub_group: Option<String>,
    language: Option<String>,
    media_type: Option<String>,
    confidence: Option<f64>,
}

/// Unset for null, empty or whitespace-only strings.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Accept integers and integer strings ("01"); anything else is unset.
fn as_number(value: Option<Value>) -> Option<u16> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the model's answer into a result settled against `min_confidence`.
///
/// Fails with [`Error::MalformedAiResponse`] when the text is not a JSON
/// object or lacks `title`, `media_type` or `confidence`.
pub fn parse_response(filename: &str, text: &str, min_confidence: f32) -> Result<ParseResult> {
    let response: AiParseResponse = serde_json::from_str(text.trim())
        .map_err(|e| Error::MalformedAiResponse(format!("not a JSON object: {}", e)))?;

    let mut missing = Vec::new();
    if response.title.is_none() {
        missing.push("title");
    }
    if response.media_type.is_none() {
        missing.push("media_type");
    }
    if response.confidence.is_none() {
        missing.push("confidence");
    }
    if !missing.is_empty() {
        return Err(Error::MalformedAiResponse(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let media_type: MediaType = response
        .media_type
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|e: Error| Error::MalformedAiResponse(e.to_string()))?;

    // Models sometimes answer on a 0-100 scale.
    let raw_confidence = response.confidence.unwrap_or_default() as f32;
    let confidence = if raw_confidence > 1.0 {
        raw_confidence / 100.0
    } else {
        raw_confidence
    };

    let mut result = ParseResult::new(filename);
    result.media_type = media_type;
    result.title = response.title.unwrap_or_default();
    result.title_romanized = non_empty(response.title_romanized);
    result.year = as_number(response.year).filter(|y| (1900..=2099).contains(y));
    result.season = as_number(response.season).filter(|&s| s > 0);
    result.episode = as_number(response.episode);
    result.episode_end = as_number(response.episode_end);
    result.quality = non_empty(response.quality);
    result.source = non_empty(response.source);
    result.video_codec = non_empty(response.codec);
    result.release_group = non_empty(response.fansub_group);
    result.language = non_empty(response.language);
    result.extension = crate::utils::fs::media_extension(filename);
    result.set_confidence(confidence);
    result.settle(min_confidence);

    Ok(result)
}

/// Single call-and-parse against a completion provider.
pub struct AiFallback {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
    min_confidence: f32,
}

impl AiFallback {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration, min_confidence: f32) -> Self {
        Self {
            provider,
            timeout,
            min_confidence,
        }
    }

    /// Ask the model about a filename.
    ///
    /// Dropping the returned future cancels the outstanding call.
    pub async fn resolve(&self, filename: &str) -> Result<ParseResult> {
        let prompt = build_prompt(filename);
        tracing::debug!("AI parsing via {}: {}", self.provider.name(), filename);

        let start = std::time::Instant::now();
        let text = match tokio::time::timeout(self.timeout, self.provider.complete(&prompt)).await {
            Ok(response) => response?,
            Err(_) => return Err(Error::AiTimeout(self.timeout.as_secs())),
        };
        tracing::debug!(
            "AI answered in {:.1}s: {}",
            start.elapsed().as_secs_f32(),
            text
        );

        parse_response(filename, &text, self.min_confidence).inspect_err(|e| {
            tracing::warn!("Discarding AI answer for '{}': {}", filename, e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::ParseStatus;

    #[test]
    fn test_prompt_embeds_filename_and_conventions() {
        let prompt = build_prompt("[ANi] 葬送的芙莉蓮 - 01 [1080P].mp4");

        assert!(prompt.contains("[ANi] 葬送的芙莉蓮 - 01 [1080P].mp4"));
        assert!(prompt.contains("【Group】"));
        assert!(prompt.contains("第XX話"));
        assert!(prompt.contains("S01E02"));
        assert!(prompt.contains("\"media_type\": \"tv\" or \"movie\""));
        assert!(prompt.contains("JSON object only"));
        assert!(prompt.contains("1.0: every field is certain"));
        assert!(prompt.contains("0.0: the filename carries no usable signal"));
    }

    #[test]
    fn test_prompt_examples_span_conventions() {
        let prompt = build_prompt("x.mkv");
        assert!(prompt.contains("LoliHouse"));
        assert!(prompt.contains("Ohys-Raws"));
        assert!(prompt.contains("SPARKS"));
    }

    #[test]
    fn test_parse_response_full() {
        let json = r#"{"title": "葬送的芙莉莲", "title_romanized": "Sousou no Frieren",
            "season": 1, "episode": "05", "quality": "1080p", "source": "WEBRip",
            "codec": "HEVC", "fansub_group": "LoliHouse", "language": "zh",
            "media_type": "tv", "confidence": 0.92}"#;
        let result = parse_response("a.mkv", json, 0.5).unwrap();

        assert_eq!(result.title, "葬送的芙莉莲");
        assert_eq!(result.episode, Some(5));
        assert_eq!(result.media_type, MediaType::Tv);
        assert_eq!(result.video_codec.as_deref(), Some("HEVC"));
        assert_eq!(result.fansub_group(), Some("LoliHouse"));
        assert_eq!(result.status, ParseStatus::Success);
        assert_eq!(result.extension.as_deref(), Some("mkv"));
    }

    #[test]
    fn test_parse_response_optional_fields_unset() {
        let json = r#"{"title": "Inception", "media_type": "movie", "confidence": 0.8,
            "title_romanized": "", "season": null}"#;
        let result = parse_response("Inception.mkv", json, 0.5).unwrap();
        assert!(result.title_romanized.is_none());
        assert!(result.season.is_none());
        assert!(result.quality.is_none());
    }

    #[test]
    fn test_parse_response_rejects_non_json() {
        let err = parse_response("a", "Sure! Here is the JSON: {}", 0.5).unwrap_err();
        assert!(matches!(err, Error::MalformedAiResponse(_)));

        let fenced = "```json\n{\"title\": \"A\", \"media_type\": \"tv\", \"confidence\": 1}\n```";
        assert!(matches!(
            parse_response("a", fenced, 0.5),
            Err(Error::MalformedAiResponse(_))
        ));
    }

    #[test]
    fn test_parse_response_missing_required() {
        let err = parse_response("a", r#"{"title": "A"}"#, 0.5).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("media_type"));
        assert!(message.contains("confidence"));

        let err = parse_response("a", r#"{"title": "A", "media_type": "anime", "confidence": 1}"#, 0.5)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedAiResponse(_)));
    }

    #[test]
    fn test_confidence_normalization() {
        let json = r#"{"title": "A", "media_type": "movie", "confidence": 85}"#;
        let result = parse_response("a", json, 0.5).unwrap();
        assert!((result.confidence - 0.85).abs() < 1e-6);

        let json = r#"{"title": "A", "media_type": "movie", "confidence": -2}"#;
        let result = parse_response("a", json, 0.5).unwrap();
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.status, ParseStatus::NeedsAi);
    }
}
