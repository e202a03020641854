//! Release-title classification: pack type, season, and quality tokens.

use once_cell::sync::Lazy;
use regex::Regex;

use super::episode::parse_episode;

/// What a release bundles. Individual episode releases have no pack type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackType {
    Series,
    Season,
}

/// Quality tokens found in a release title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quality {
    /// Vertical resolution (2160, 1080, 720) or 0 when unknown.
    pub resolution: u32,
    /// Disc-sourced release (bluray, remux).
    pub high_fidelity: bool,
    /// x265/HEVC/AV1 encode.
    pub efficient_codec: bool,
    /// Web-sourced release (web-dl, webrip).
    pub direct_web: bool,
}

static COMPLETE_SERIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bcomplete[ ._-]*(?:series|collection)\b|\bseries[ ._-]*complete\b")
        .expect("pack regex")
});
static SEASON_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])s(\d{1,2})[ ._]?-[ ._]?s?(\d{1,2})(?:[^0-9e]|$)")
        .expect("pack regex")
});
static SEASONS_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bseasons?[ ._-]*(\d{1,2})[ ._-]*(?:-|to|thru|through|&)[ ._-]*(\d{1,2})\b")
        .expect("pack regex")
});
static SEASON_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])s(\d{1,2})(?:[^0-9e]|$)").expect("pack regex")
});
static SEASON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bseason[ ._-]*(\d{1,2})\b").expect("pack regex"));
static COMPLETE_SEASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcomplete[ ._-]*season\b").expect("pack regex"));

static RES_2160: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:2160p|4k|uhd)\b").expect("quality regex"));
static RES_1080: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b1080[pi]\b").expect("quality regex"));
static RES_720: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b720p\b").expect("quality regex"));
static HIGH_FIDELITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:blu-?ray|bdremux|remux|bdrip|brrip)\b").expect("quality regex")
});
static EFFICIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:x265|h\.?265|hevc|av1)\b").expect("quality regex"));
static DIRECT_WEB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:web-?dl|webrip|web)\b").expect("quality regex"));

fn is_range(re: &Regex, title: &str) -> bool {
    re.captures_iter(title).any(|c| {
        let start: Option<u32> = c.get(1).and_then(|m| m.as_str().parse().ok());
        let end: Option<u32> = c.get(2).and_then(|m| m.as_str().parse().ok());
        matches!((start, end), (Some(s), Some(e)) if e > s)
    })
}

/// Classify a release title as a series pack, a season pack, or neither.
pub fn pack_type(title: &str) -> Option<PackType> {
    if COMPLETE_SERIES.is_match(title)
        || is_range(&SEASON_RANGE, title)
        || is_range(&SEASONS_WORD, title)
    {
        return Some(PackType::Series);
    }
    if parse_episode(title).is_some() {
        return None;
    }
    if SEASON_TOKEN.is_match(title) || SEASON_WORD.is_match(title) || COMPLETE_SEASON.is_match(title)
    {
        return Some(PackType::Season);
    }
    None
}

/// Season number named by a season-pack title.
pub fn pack_season(title: &str) -> Option<u32> {
    [&*SEASON_TOKEN, &*SEASON_WORD]
        .iter()
        .find_map(|re| re.captures(title))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn quality(title: &str) -> Quality {
    let resolution = if RES_2160.is_match(title) {
        2160
    } else if RES_1080.is_match(title) {
        1080
    } else if RES_720.is_match(title) {
        720
    } else {
        0
    };
    Quality {
        resolution,
        high_fidelity: HIGH_FIDELITY.is_match(title),
        efficient_codec: EFFICIENT.is_match(title),
        direct_web: DIRECT_WEB.is_match(title),
    }
}
