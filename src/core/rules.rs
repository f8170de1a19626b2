//! Rule-based filename parser.
//!
//! Parsing runs an ordered cascade of independent rules over a shared
//! [`ParseContext`]. A rule may record fields on the result and claim spans of
//! the name so later rules skip them. Each rule reports whether it found its
//! field; the confidence is the sum of the weights of the rules that did.
//!
//! Supported conventions:
//! - Group tags: `[Group] ...`, `【Group】...`, `...x264-GROUP`
//! - Episodes: `S01E02`, `S01E01-E03`, `1x05`, `第01話`, `第十二集`, `EP01`,
//!   `- 01`, `[01]`, `【01】`, `[01-12]`
//! - Seasons: `Season 2`, `S2`, `第二季`
//! - Quality: `480p`..`2160p`, `1920x1080`, `4K`
//! - Source, video/audio codec and subtitle language tags

use crate::models::media::{MediaType, ParseResult};
use crate::utils::{chinese, fs};
use crate::Result;
use regex::{Captures, Regex};
use std::ops::Range;

/// Default threshold separating `success` from `needs_ai`.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Characters trimmed from both ends of an extracted title.
const TITLE_TRIM: &[char] = &[
    '-', '–', '.', '~', '/', '|', '[', ']', '(', ')', '【', '】', '（', '）', ',', '+', '&', '_', ':',
];

/// A release or fansub group tag found in a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTag {
    /// Tag contents, verbatim.
    pub name: String,
    /// Byte span of the whole tag including brackets or the leading dash.
    pub span: Range<usize>,
    /// Whether the tag was a leading bracket rather than a trailing `-GROUP`.
    pub bracketed: bool,
}

/// Parse result plus the positional facts the pattern learner needs.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// File name the spans refer to (directories stripped, trimmed).
    pub name: String,
    pub result: ParseResult,
    pub group: Option<GroupTag>,
    /// Byte spans of episode number digits (two for a range).
    pub episode_spans: Vec<Range<usize>>,
    /// Byte span of a CRC32 checksum's hex digits.
    pub checksum_span: Option<Range<usize>>,
}

/// Compiled token patterns shared by all rules.
struct Patterns {
    season_episode: Regex,
    cross_episode: Regex,
    chinese_episode: Regex,
    ep_episode: Regex,
    dash_episode: Regex,
    bracket_episode: Regex,
    season: Regex,
    chinese_season: Regex,
    quality: Regex,
    dimensions: Regex,
    uhd: Regex,
    source: Regex,
    video_codec: Regex,
    audio_codec: Regex,
    language: Regex,
    year: Regex,
    checksum: Regex,
    banner: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        const CN_NUM: &str = "[0-9一二三四五六七八九十零〇两]";
        Ok(Self {
            season_episode: Regex::new(
                r"(?i)S(\d{1,2})\s?E(\d{1,4})(?:v\d)?(?:\s?-\s?E?(\d{1,4})|E(\d{1,4}))?",
            )?,
            cross_episode: Regex::new(r"(?i)(\d{1,2})x(\d{2,3})")?,
            chinese_episode: Regex::new(&format!(
                r"第\s*({n}{{1,4}})(?:\s*[-~]\s*({n}{{1,4}}))?\s*[話话集回]",
                n = CN_NUM
            ))?,
            ep_episode: Regex::new(
                r"(?i)(?:EP\.?\s?|E)(\d{1,4})(?:v\d)?(?:\s?[-~]\s?(?:EP\.?\s?|E)?(\d{1,4}))?",
            )?,
            dash_episode: Regex::new(r"\s[-–]\s*(\d{1,4})(?:v\d)?(?:\s?[-~]\s?(\d{1,4}))?")?,
            bracket_episode: Regex::new(
                r"(?i)[\[【](\d{1,3})(?:v\d)?(?:\s?[-~]\s?(\d{1,3}))?(?:\s?(?:END|FIN|完))?[\]】]",
            )?,
            season: Regex::new(r"(?i)(?:Season\s?|S)(\d{1,2})")?,
            chinese_season: Regex::new(&format!(r"第\s*({n}{{1,3}})\s*[季期部]", n = CN_NUM))?,
            quality: Regex::new(r"(?i)(\d{3,4})[pi]")?,
            dimensions: Regex::new(r"(?i)(\d{3,4})[x×](\d{3,4})")?,
            uhd: Regex::new(r"(?i)[48]K|UHD")?,
            source: Regex::new(
                r"(?i)blu-?ray|bd-?rip|bd-?remux|remux|web-?dl|web-?rip|hdtv|dvd-?rip|dvd|hd-?rip|bd",
            )?,
            video_codec: Regex::new(r"(?i)x\.?26[45]|h\.?26[45]|hevc|avc|av1|vp9|xvid|divx")?,
            audio_codec: Regex::new(r"(?i)flac|aac|e-?ac-?3|ac-?3|dts-?hd|dts|truehd|opus|ddp|mp3")?,
            language: Regex::new(
                r"(?i)简繁日|简繁|繁简|简日|繁日|简体|繁体|简中|繁中|CHS|CHT|BIG5|JPSC|JPTC|GB|JP|ENG|简|繁|日",
            )?,
            year: Regex::new(r"(?:19|20)\d{2}")?,
            checksum: Regex::new(r"[\[(]([0-9A-Fa-f]{8})[\])]")?,
            banner: Regex::new(
                r"(?i)新番|月番|字幕|招募|合集|^\d{1,2}月$|^(?:mp4|mkv|avi)$|^(?:gb|big5|chs|cht)$",
            )?,
        })
    }
}

/// Shared mutable state threaded through the rule cascade.
struct ParseContext<'a> {
    patterns: &'a Patterns,
    /// Name without extension; all spans index into it.
    stem: &'a str,
    result: ParseResult,
    group: Option<GroupTag>,
    claims: Vec<Range<usize>>,
    episode_spans: Vec<Range<usize>>,
    checksum_span: Option<Range<usize>>,
}

impl<'a> ParseContext<'a> {
    fn is_claimed(&self, span: &Range<usize>) -> bool {
        self.claims
            .iter()
            .any(|c| c.start < span.end && span.start < c.end)
    }

    fn claim(&mut self, span: Range<usize>) {
        self.claims.push(span);
    }

    /// Where the title may begin: after a leading group tag.
    fn title_start(&self) -> usize {
        match &self.group {
            Some(tag) if tag.bracketed => tag.span.end,
            _ => 0,
        }
    }

    /// Start of the earliest metadata token after the title start.
    fn first_token(&self) -> Option<usize> {
        let start = self.title_start();
        let group_span = self.group.as_ref().map(|g| g.span.clone());
        self.claims
            .iter()
            .filter(|c| Some(*c) != group_span.as_ref())
            .map(|c| c.start)
            .filter(|&s| s >= start)
            .min()
    }

    /// Matches of `re` that do not overlap a claimed span.
    fn unclaimed(&self, re: &Regex) -> Vec<Captures<'a>> {
        let stem = self.stem;
        re.captures_iter(stem)
            .filter(|caps| match caps.get(0) {
                Some(m) => !self.is_claimed(&m.range()),
                None => false,
            })
            .collect()
    }

    /// First unclaimed match of `re` with non-alphanumeric neighbours.
    fn first_bounded(&self, re: &Regex) -> Option<Captures<'a>> {
        self.unclaimed(re).into_iter().find(|caps| {
            caps.get(0)
                .map(|m| is_bounded(self.stem, m.range()))
                .unwrap_or(false)
        })
    }
}

/// A rule in the cascade.
struct Rule {
    name: &'static str,
    /// Confidence contributed when the rule finds its field.
    weight: f32,
    apply: fn(&mut ParseContext<'_>) -> bool,
}

/// Order matters: later rules see the spans claimed by earlier ones, and the
/// title is whatever precedes the first claimed token.
const RULES: &[Rule] = &[
    Rule { name: "group", weight: 0.15, apply: rule_group },
    Rule { name: "checksum", weight: 0.0, apply: rule_checksum },
    Rule { name: "episode", weight: 0.15, apply: rule_episode },
    Rule { name: "season", weight: 0.0, apply: rule_season },
    Rule { name: "quality", weight: 0.15, apply: rule_quality },
    Rule { name: "source", weight: 0.0, apply: rule_source },
    Rule { name: "codec", weight: 0.0, apply: rule_codec },
    Rule { name: "language", weight: 0.0, apply: rule_language },
    Rule { name: "year", weight: 0.15, apply: rule_year },
    Rule { name: "media_type", weight: 0.0, apply: rule_media_type },
    Rule { name: "title", weight: 0.40, apply: rule_title },
];

/// Deterministic rule-based filename parser.
pub struct RuleParser {
    patterns: Patterns,
    min_confidence: f32,
}

impl RuleParser {
    /// Create a parser with the default confidence threshold.
    pub fn new() -> Result<Self> {
        Self::with_threshold(DEFAULT_MIN_CONFIDENCE)
    }

    /// Create a parser with a custom `success` threshold in [0, 1].
    pub fn with_threshold(min_confidence: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(crate::Error::validation(format!(
                "confidence threshold must be within [0, 1], got {}",
                min_confidence
            )));
        }
        Ok(Self {
            patterns: Patterns::new()?,
            min_confidence,
        })
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Parse a filename into structured metadata.
    ///
    /// Never returns `failed`: names the rules cannot handle confidently come
    /// back as `needs_ai`.
    pub fn parse(&self, filename: &str) -> ParseResult {
        self.analyze(filename).result
    }

    /// Parse a filename and keep the spans used for pattern learning.
    pub fn analyze(&self, filename: &str) -> Analysis {
        let name = fs::file_name(filename.trim()).to_string();
        let (stem, extension) = fs::split_extension(&name);

        let mut ctx = ParseContext {
            patterns: &self.patterns,
            stem,
            result: ParseResult::new(filename),
            group: None,
            claims: Vec::new(),
            episode_spans: Vec::new(),
            checksum_span: None,
        };
        ctx.result.extension = extension;

        let mut confidence = 0.0;
        for rule in RULES {
            if (rule.apply)(&mut ctx) {
                tracing::trace!("rule '{}' matched in {}", rule.name, name);
                confidence += rule.weight;
            }
        }

        let ParseContext {
            mut result,
            group,
            episode_spans,
            checksum_span,
            ..
        } = ctx;
        result.set_confidence(confidence);
        result.settle(self.min_confidence);

        tracing::debug!(
            "Rules parsed '{}': {} ({:.2}, {})",
            name,
            result.title,
            result.confidence,
            result.status
        );

        Analysis {
            name,
            result,
            group,
            episode_spans,
            checksum_span,
        }
    }

}

/// Whether the characters around `span` are not ASCII alphanumerics.
fn is_bounded(s: &str, span: Range<usize>) -> bool {
    let before = s[..span.start].chars().next_back();
    let after = s[span.end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_alphanumeric())
        && !after.is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Whether `re` matches the whole of `s`.
fn matches_fully(re: &Regex, s: &str) -> bool {
    re.find(s).is_some_and(|m| m.start() == 0 && m.end() == s.len())
}

fn parse_u16(caps: &Captures<'_>, index: usize) -> Option<u16> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn find_group(patterns: &Patterns, stem: &str) -> Option<GroupTag> {
    leading_group(patterns, stem).or_else(|| trailing_group(patterns, stem))
}

/// `[Group] ...` or `【Group】...` at the start of the name.
fn leading_group(patterns: &Patterns, stem: &str) -> Option<GroupTag> {
    let offset = stem.len() - stem.trim_start().len();
    let rest = &stem[offset..];

    for (open, close) in [('[', ']'), ('【', '】')] {
        if !rest.starts_with(open) {
            continue;
        }
        let inner_start = open.len_utf8();
        let Some(inner_len) = rest[inner_start..].find(close) else {
            continue;
        };
        let contents = &rest[inner_start..inner_start + inner_len];
        let trimmed = contents.trim();
        if trimmed.is_empty()
            || trimmed.chars().all(|c| c.is_ascii_digit())
            || matches_fully(&patterns.quality, trimmed)
            || matches_fully(&patterns.source, trimmed)
        {
            return None;
        }
        let end = offset + inner_start + inner_len + close.len_utf8();
        return Some(GroupTag {
            name: contents.to_string(),
            span: offset..end,
            bracketed: true,
        });
    }
    None
}

/// `...x264-GROUP` at the end of a scene-style name.
fn trailing_group(patterns: &Patterns, stem: &str) -> Option<GroupTag> {
    let dash = stem.rfind('-')?;
    let tail = &stem[dash + 1..];
    let len = tail.chars().count();
    if !(2..=24).contains(&len)
        || !tail.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || !tail.chars().any(|c| c.is_ascii_alphabetic())
    {
        return None;
    }

    // The dash must be glued to the previous token, as in "x264-SPARKS".
    let head = &stem[..dash];
    if !head.chars().next_back().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    // Scene groups follow the technical tokens; "Ant-Man" is a title.
    if !has_technical_token(patterns, head) {
        return None;
    }

    let previous = head
        .rsplit(|c: char| c.is_whitespace() || "._[]()".contains(c))
        .next()
        .unwrap_or(head);
    let combined = format!("{}-{}", previous, tail);
    let is_token = [
        &patterns.source,
        &patterns.video_codec,
        &patterns.audio_codec,
        &patterns.season_episode,
        &patterns.ep_episode,
    ]
    .iter()
    .any(|re| matches_fully(re, &combined) || matches_fully(re, tail));
    if is_token {
        return None;
    }

    Some(GroupTag {
        name: tail.to_string(),
        span: dash..stem.len(),
        bracketed: false,
    })
}

/// Whether `head` holds a bounded quality, source, codec, year or episode token.
fn has_technical_token(patterns: &Patterns, head: &str) -> bool {
    [
        &patterns.quality,
        &patterns.dimensions,
        &patterns.uhd,
        &patterns.source,
        &patterns.video_codec,
        &patterns.audio_codec,
        &patterns.year,
        &patterns.season_episode,
        &patterns.cross_episode,
        &patterns.ep_episode,
    ]
    .iter()
    .any(|re| re.find_iter(head).any(|m| is_bounded(head, m.range())))
}

fn rule_group(ctx: &mut ParseContext<'_>) -> bool {
    match find_group(ctx.patterns, ctx.stem) {
        Some(tag) => {
            ctx.claim(tag.span.clone());
            ctx.result.release_group = Some(tag.name.clone());
            ctx.group = Some(tag);
            true
        }
        None => false,
    }
}

fn rule_checksum(ctx: &mut ParseContext<'_>) -> bool {
    let Some(caps) = ctx.unclaimed(&ctx.patterns.checksum).into_iter().last() else {
        return false;
    };
    let (Some(whole), Some(hex)) = (caps.get(0), caps.get(1)) else {
        return false;
    };
    // Hex runs made only of digits are more likely dates or ids.
    if !hex.as_str().chars().any(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    ctx.claim(whole.range());
    ctx.checksum_span = Some(hex.range());
    true
}

/// Episode found by one of the notations.
struct EpisodeHit {
    season: Option<u16>,
    episode: u16,
    episode_end: Option<u16>,
    claim: Range<usize>,
    spans: Vec<Range<usize>>,
}

fn rule_episode(ctx: &mut ParseContext<'_>) -> bool {
    let hit = season_episode(ctx)
        .or_else(|| cross_episode(ctx))
        .or_else(|| chinese_episode(ctx))
        .or_else(|| ep_episode(ctx))
        .or_else(|| dash_episode(ctx))
        .or_else(|| bracket_episode(ctx));

    let Some(hit) = hit else {
        return false;
    };
    ctx.claim(hit.claim);
    ctx.result.season = hit.season.or(ctx.result.season);
    ctx.result.episode = Some(hit.episode);
    ctx.result.episode_end = hit.episode_end.filter(|&end| end > hit.episode);
    ctx.episode_spans = hit.spans;
    true
}

/// Spans of capture groups holding episode numbers.
fn digit_spans(caps: &Captures<'_>, indices: &[usize]) -> Vec<Range<usize>> {
    indices
        .iter()
        .filter_map(|&i| caps.get(i).map(|m| m.range()))
        .collect()
}

fn season_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.first_bounded(&ctx.patterns.season_episode)?;
    let episode = parse_u16(&caps, 2)?;
    Some(EpisodeHit {
        season: parse_u16(&caps, 1),
        episode,
        episode_end: parse_u16(&caps, 3).or_else(|| parse_u16(&caps, 4)),
        claim: caps.get(0)?.range(),
        spans: digit_spans(&caps, &[2, 3, 4]),
    })
}

fn cross_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.first_bounded(&ctx.patterns.cross_episode)?;
    Some(EpisodeHit {
        season: parse_u16(&caps, 1),
        episode: parse_u16(&caps, 2)?,
        episode_end: None,
        claim: caps.get(0)?.range(),
        spans: digit_spans(&caps, &[2]),
    })
}

fn chinese_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.unclaimed(&ctx.patterns.chinese_episode).into_iter().next()?;
    let episode = chinese::parse_number(caps.get(1)?.as_str())?;
    let episode_end = caps.get(2).and_then(|m| chinese::parse_number(m.as_str()));
    // Only ASCII digits generalize into a numeric wildcard.
    let spans = digit_spans(&caps, &[1, 2])
        .into_iter()
        .filter(|r| ctx.stem[r.clone()].chars().all(|c| c.is_ascii_digit()))
        .collect();
    Some(EpisodeHit {
        season: None,
        episode,
        episode_end,
        claim: caps.get(0)?.range(),
        spans,
    })
}

fn ep_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.first_bounded(&ctx.patterns.ep_episode)?;
    Some(EpisodeHit {
        season: None,
        episode: parse_u16(&caps, 1)?,
        episode_end: parse_u16(&caps, 2),
        claim: caps.get(0)?.range(),
        spans: digit_spans(&caps, &[1, 2]),
    })
}

fn dash_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.unclaimed(&ctx.patterns.dash_episode).into_iter().find(|caps| {
        let Some(m) = caps.get(0) else {
            return false;
        };
        let after_ok = !ctx.stem[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric());
        // " - 2019" is a year, not episode 2019.
        let looks_like_year = caps
            .get(1)
            .is_some_and(|n| n.as_str().len() == 4 && ctx.patterns.year.is_match(n.as_str()));
        after_ok && !looks_like_year
    })?;
    Some(EpisodeHit {
        season: None,
        episode: parse_u16(&caps, 1)?,
        episode_end: parse_u16(&caps, 2),
        claim: caps.get(0)?.range(),
        spans: digit_spans(&caps, &[1, 2]),
    })
}

fn bracket_episode(ctx: &ParseContext<'_>) -> Option<EpisodeHit> {
    let caps = ctx.unclaimed(&ctx.patterns.bracket_episode).into_iter().next()?;
    Some(EpisodeHit {
        season: None,
        episode: parse_u16(&caps, 1)?,
        episode_end: parse_u16(&caps, 2),
        claim: caps.get(0)?.range(),
        spans: digit_spans(&caps, &[1, 2]),
    })
}

fn rule_season(ctx: &mut ParseContext<'_>) -> bool {
    if let Some(caps) = ctx.unclaimed(&ctx.patterns.chinese_season).into_iter().next() {
        if let (Some(whole), Some(season)) = (
            caps.get(0),
            caps.get(1).and_then(|m| chinese::parse_number(m.as_str())),
        ) {
            ctx.claim(whole.range());
            ctx.result.season.get_or_insert(season);
            return true;
        }
    }

    if let Some(caps) = ctx.first_bounded(&ctx.patterns.season) {
        if let (Some(whole), Some(season)) = (caps.get(0), parse_u16(&caps, 1)) {
            ctx.claim(whole.range());
            ctx.result.season.get_or_insert(season);
            return true;
        }
    }
    false
}

fn normalize_height(height: u16) -> Option<String> {
    match height {
        360 | 480 | 540 | 576 | 720 | 1080 | 1440 | 2160 | 4320 => Some(format!("{}p", height)),
        _ => None,
    }
}

fn rule_quality(ctx: &mut ParseContext<'_>) -> bool {
    let found = ctx
        .first_bounded(&ctx.patterns.quality)
        .and_then(|caps| Some((caps.get(0)?.range(), normalize_height(parse_u16(&caps, 1)?)?)))
        .or_else(|| {
            ctx.first_bounded(&ctx.patterns.dimensions).and_then(|caps| {
                Some((caps.get(0)?.range(), normalize_height(parse_u16(&caps, 2)?)?))
            })
        })
        .or_else(|| {
            ctx.first_bounded(&ctx.patterns.uhd).and_then(|caps| {
                let m = caps.get(0)?;
                let quality = if m.as_str().eq_ignore_ascii_case("8k") {
                    "4320p"
                } else {
                    "2160p"
                };
                Some((m.range(), quality.to_string()))
            })
        });

    match found {
        Some((span, quality)) => {
            ctx.claim(span);
            ctx.result.quality = Some(quality);
            true
        }
        None => false,
    }
}

fn canonical_source(token: &str) -> &'static str {
    match token.to_lowercase().replace('-', "").as_str() {
        "bluray" => "BluRay",
        "bdrip" => "BDRip",
        "bdremux" => "BDRemux",
        "remux" => "Remux",
        "webdl" => "WEB-DL",
        "webrip" => "WEBRip",
        "hdtv" => "HDTV",
        "dvdrip" => "DVDRip",
        "dvd" => "DVD",
        "hdrip" => "HDRip",
        _ => "BD",
    }
}

fn rule_source(ctx: &mut ParseContext<'_>) -> bool {
    let Some(m) = ctx
        .first_bounded(&ctx.patterns.source)
        .and_then(|caps| caps.get(0))
    else {
        return false;
    };
    ctx.claim(m.range());
    ctx.result.source = Some(canonical_source(m.as_str()).to_string());
    true
}

fn canonical_video_codec(token: &str) -> &'static str {
    match token.to_lowercase().replace('.', "").as_str() {
        "x264" => "x264",
        "x265" => "x265",
        "h264" => "H.264",
        "h265" => "H.265",
        "hevc" => "HEVC",
        "avc" => "AVC",
        "av1" => "AV1",
        "vp9" => "VP9",
        "divx" => "DivX",
        _ => "XviD",
    }
}

fn canonical_audio_codec(token: &str) -> &'static str {
    match token.to_lowercase().replace('-', "").as_str() {
        "flac" => "FLAC",
        "aac" => "AAC",
        "eac3" => "E-AC3",
        "ac3" => "AC3",
        "dtshd" => "DTS-HD",
        "dts" => "DTS",
        "truehd" => "TrueHD",
        "opus" => "Opus",
        "ddp" => "DDP",
        _ => "MP3",
    }
}

fn rule_codec(ctx: &mut ParseContext<'_>) -> bool {
    let mut found = false;

    if let Some(m) = ctx
        .first_bounded(&ctx.patterns.video_codec)
        .and_then(|caps| caps.get(0))
    {
        ctx.claim(m.range());
        ctx.result.video_codec = Some(canonical_video_codec(m.as_str()).to_string());
        found = true;
    }

    // Channel layouts follow audio codecs directly ("DDP5.1", "AAC2.0").
    let stem = ctx.stem;
    let audio = ctx
        .unclaimed(&ctx.patterns.audio_codec)
        .into_iter()
        .filter_map(|caps| caps.get(0))
        .find(|m| {
            !stem[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric())
                && !stem[m.end()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
        });
    if let Some(m) = audio {
        ctx.claim(m.range());
        ctx.result.audio_codec = Some(canonical_audio_codec(m.as_str()).to_string());
        found = true;
    }

    found
}

fn canonical_language(token: &str) -> &'static str {
    let upper = token.to_uppercase();
    if token.contains('简') && token.contains('繁') {
        "zh"
    } else if token.contains('简') || matches!(upper.as_str(), "CHS" | "GB" | "JPSC") {
        "zh-Hans"
    } else if token.contains('繁') || matches!(upper.as_str(), "CHT" | "BIG5" | "JPTC") {
        "zh-Hant"
    } else if upper == "ENG" {
        "en"
    } else {
        "ja"
    }
}

fn rule_language(ctx: &mut ParseContext<'_>) -> bool {
    // Subtitle tags sit among the technical tokens; before them they are
    // part of the title (e.g. "日常").
    let Some(first) = ctx.first_token() else {
        return false;
    };
    let stem = ctx.stem;
    let found = ctx
        .unclaimed(&ctx.patterns.language)
        .into_iter()
        .filter_map(|caps| caps.get(0))
        .find(|m| m.start() >= first && (!m.as_str().is_ascii() || is_bounded(stem, m.range())));

    match found {
        Some(m) => {
            ctx.claim(m.range());
            ctx.result.language = Some(canonical_language(m.as_str()).to_string());
            true
        }
        None => false,
    }
}

fn rule_year(ctx: &mut ParseContext<'_>) -> bool {
    let title_start = ctx.title_start();
    let content_start = title_start
        + (ctx.stem[title_start..].len()
            - ctx.stem[title_start..]
                .trim_start_matches(|c: char| c.is_whitespace() || TITLE_TRIM.contains(&c))
                .len());
    let first_token = ctx.first_token();

    let candidates: Vec<_> = ctx
        .unclaimed(&ctx.patterns.year)
        .into_iter()
        .filter_map(|caps| caps.get(0))
        .filter(|m| is_bounded(ctx.stem, m.range()))
        // A year opening the name is the title ("2012", "1917").
        .filter(|m| m.start() > content_start)
        .collect();

    // Prefer the last year before the technical tokens: "Blade.Runner.2049.2017.1080p".
    let chosen = match first_token {
        Some(limit) => candidates
            .iter()
            .filter(|m| m.start() < limit)
            .last()
            .or_else(|| candidates.first()),
        None => candidates.last(),
    };

    let Some(m) = chosen.copied() else {
        return false;
    };
    let Ok(year) = m.as_str().parse::<u16>() else {
        return false;
    };
    ctx.claim(m.range());
    ctx.result.year = Some(year);
    true
}

fn rule_media_type(ctx: &mut ParseContext<'_>) -> bool {
    ctx.result.media_type = if ctx.result.episode.is_some() || ctx.result.season.is_some() {
        MediaType::Tv
    } else {
        MediaType::Movie
    };
    false
}

fn rule_title(ctx: &mut ParseContext<'_>) -> bool {
    let start = ctx.title_start();
    let end = ctx.first_token().unwrap_or(ctx.stem.len()).max(start);
    let region = &ctx.stem[start..end];

    let raw = title_from_region(region, &ctx.patterns.banner);
    let (title, romanized) = split_bilingual(&raw);
    ctx.result.title = title;
    ctx.result.title_romanized = romanized;
    !ctx.result.title.is_empty()
}

/// Split a region into bracket contents and the free text between them.
fn bracket_segments(region: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth_start: Option<usize> = None;
    let mut text_start = 0;

    for (i, c) in region.char_indices() {
        match c {
            '[' | '【' if depth_start.is_none() => {
                let text = region[text_start..i].trim();
                if !text.is_empty() {
                    segments.push(text);
                }
                depth_start = Some(i + c.len_utf8());
            }
            ']' | '】' => {
                if let Some(open) = depth_start.take() {
                    segments.push(&region[open..i]);
                    text_start = i + c.len_utf8();
                }
            }
            _ => {}
        }
    }
    let tail_start = depth_start.unwrap_or(text_start);
    let tail = region[tail_start..].trim();
    if !tail.is_empty() {
        segments.push(tail);
    }
    segments
}

/// Pick the title text out of the region preceding the first token.
fn title_from_region(region: &str, banner: &Regex) -> String {
    let content = region.trim_start_matches(|c: char| c.is_whitespace() || "-.,_~".contains(c));

    if !content.starts_with(['[', '【']) {
        // Free text first; later brackets are annotations ("Title [Extra]").
        let free = content
            .find(['[', '【'])
            .map(|i| &content[..i])
            .unwrap_or(content);
        let cleaned = clean_title(free);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    // Names made only of bracket segments: the longest non-banner segment.
    bracket_segments(content)
        .into_iter()
        .map(clean_title)
        .filter(|s| !s.is_empty() && !banner.is_match(s))
        .max_by_key(|s| s.chars().count())
        .unwrap_or_default()
}

/// Turn separators into spaces and trim decoration.
fn clean_title(raw: &str) -> String {
    let mut text = raw.replace('_', " ");
    // Dotted scene names use dots as spaces; spaced names keep "Mr. Robot".
    if !text.trim().contains(' ') {
        text = text.replace('.', " ");
    }
    text.trim_matches(|c: char| c.is_whitespace() || TITLE_TRIM.contains(&c))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_latin(s: &str) -> bool {
    !chinese::contains_cjk(s) && s.chars().any(|c| c.is_ascii_alphabetic())
}

/// Split "葬送的芙莉莲 / Sousou no Frieren" into a CJK title and a Latin one.
fn split_bilingual(title: &str) -> (String, Option<String>) {
    let halves: Vec<String> = title
        .split(" / ")
        .flat_map(|p| p.split(" | "))
        .flat_map(|p| p.split('｜'))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if halves.len() >= 2 {
        let cjk = halves.iter().find(|p| chinese::contains_cjk(p));
        let latin = halves.iter().find(|p| is_latin(p.as_str()));
        return match (cjk, latin) {
            (Some(cjk), Some(latin)) => (cjk.clone(), Some(clean_title(latin))),
            _ => (halves[0].clone(), halves.get(1).cloned()),
        };
    }

    // "古见同学有交流障碍症 Komi-san wa, Komyushou Desu"
    let words: Vec<&str> = title.split_whitespace().collect();
    if chinese::contains_cjk(title) {
        for i in 1..words.len() {
            let (head, tail) = words.split_at(i);
            if chinese::contains_cjk(head[head.len() - 1])
                && tail.iter().all(|w| !chinese::contains_cjk(w))
                && is_latin(&tail.join(" "))
            {
                return (head.join(" "), Some(clean_title(&tail.join(" "))));
            }
        }
    }

    (title.to_string(), None)
}
