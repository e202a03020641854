use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::RangeInclusive;

/// Season/episode position parsed from a file or release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeMarker {
    pub season: u32,
    pub episode: u32,
    /// Last episode for range files (`S01E02-E04`).
    pub episode_end: Option<u32>,
}

impl EpisodeMarker {
    pub fn single(season: u32, episode: u32) -> Self {
        Self {
            season,
            episode,
            episode_end: None,
        }
    }

    pub fn last_episode(&self) -> u32 {
        self.episode_end.unwrap_or(self.episode)
    }

    pub fn episodes(&self) -> RangeInclusive<u32> {
        self.episode..=self.last_episode()
    }

    pub fn covers(&self, episode: u32) -> bool {
        self.episodes().contains(&episode)
    }

    fn with_end(mut self, end: Option<u32>) -> Self {
        self.episode_end = end.filter(|e| *e > self.episode);
        self
    }
}

static SXXEYY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)s(\d{1,2})[ ._-]?e(\d{1,3})(?:[ ._-]?-?[ ._-]?e(\d{1,3})|-(\d{1,3})\b)?")
        .expect("episode regex")
});
static NXNN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9a-z])(\d{1,2})x(\d{2,3})(?:-(\d{2,3}))?(?:[^0-9a-z]|$)")
        .expect("episode regex")
});
static WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)season[ ._-]*(\d{1,2})[ ._,-]*episode[ ._-]*(\d{1,3})")
        .expect("episode regex")
});
static BARE_EP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])e(?:p(?:isode)?)?[ ._-]?(\d{1,3})(?:[^0-9]|$)")
        .expect("episode regex")
});
static LEADING_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})(?:[ ._-]+|$)").expect("episode regex"));
static SEASON_DIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:season|series|s)[ ._-]*(\d{1,2})$").expect("season dir regex")
});

fn num(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

/// Parse an explicit season+episode marker, trying patterns in priority order.
pub fn parse_episode(name: &str) -> Option<EpisodeMarker> {
    if let Some(c) = SXXEYY.captures(name) {
        let marker = EpisodeMarker::single(num(&c, 1)?, num(&c, 2)?);
        return Some(marker.with_end(num(&c, 3).or_else(|| num(&c, 4))));
    }
    if let Some(c) = NXNN.captures(name) {
        let marker = EpisodeMarker::single(num(&c, 1)?, num(&c, 2)?);
        return Some(marker.with_end(num(&c, 3)));
    }
    if let Some(c) = WORDS.captures(name) {
        return Some(EpisodeMarker::single(num(&c, 1)?, num(&c, 2)?));
    }
    None
}

/// Like [`parse_episode`], but bare episode numbers (`E05`, `Ep 5`, `05 - Title`)
/// are accepted when the season is known from context (e.g. the parent folder).
pub fn parse_episode_with_season(name: &str, season_hint: Option<u32>) -> Option<EpisodeMarker> {
    if let Some(m) = parse_episode(name) {
        return Some(m);
    }
    let season = season_hint?;
    if let Some(c) = BARE_EP.captures(name) {
        return Some(EpisodeMarker::single(season, num(&c, 1)?));
    }
    if let Some(c) = LEADING_NUM.captures(name) {
        return Some(EpisodeMarker::single(season, num(&c, 1)?));
    }
    None
}

/// Season number from a directory name such as `Season 01`, `Season 1` or `S01`.
pub fn season_from_dir_name(name: &str) -> Option<u32> {
    SEASON_DIR
        .captures(name.trim())
        .and_then(|c| num(&c, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sxxeyy_variants() {
        assert_eq!(
            parse_episode("Show.Name.S01E02.1080p.WEB-DL.mkv"),
            Some(EpisodeMarker::single(1, 2))
        );
        assert_eq!(
            parse_episode("show_s1e5_x265.mp4"),
            Some(EpisodeMarker::single(1, 5))
        );
        assert_eq!(
            parse_episode("Show - S03 E10 - Title.mkv"),
            Some(EpisodeMarker::single(3, 10))
        );
    }

    #[test]
    fn ranges() {
        let want = EpisodeMarker {
            season: 1,
            episode: 2,
            episode_end: Some(4),
        };
        assert_eq!(parse_episode("Show - S01E02-E04 - Finale.mkv"), Some(want));
        assert_eq!(parse_episode("Show.S01E02-04.mkv"), Some(want));
        let two = parse_episode("Show.S01E02E03.720p.mkv").unwrap();
        assert_eq!(two.episode_end, Some(3));
        assert!(two.covers(3));
        assert!(!two.covers(4));
    }

    #[test]
    fn resolution_after_dash_is_not_a_range() {
        let m = parse_episode("Show.S01E02-1080p.mkv").unwrap();
        assert_eq!(m, EpisodeMarker::single(1, 2));
    }

    #[test]
    fn nxnn_and_words() {
        assert_eq!(parse_episode("Show 2x07 Title.avi"), Some(EpisodeMarker::single(2, 7)));
        assert_eq!(
            parse_episode("Show Season 4 Episode 12.mkv"),
            Some(EpisodeMarker::single(4, 12))
        );
        assert_eq!(parse_episode("Show.1920x1080.mkv"), None);
    }

    #[test]
    fn bare_numbers_need_season_context() {
        assert_eq!(parse_episode("05 - The Storm.mkv"), None);
        assert_eq!(
            parse_episode_with_season("05 - The Storm.mkv", Some(2)),
            Some(EpisodeMarker::single(2, 5))
        );
        assert_eq!(
            parse_episode_with_season("Show Ep 11.mkv", Some(3)),
            Some(EpisodeMarker::single(3, 11))
        );
        assert_eq!(
            parse_episode_with_season("Show.S04E01.mkv", Some(3)),
            Some(EpisodeMarker::single(4, 1))
        );
        assert_eq!(parse_episode_with_season("Extras.mkv", Some(1)), None);
    }

    #[test]
    fn season_dirs() {
        assert_eq!(season_from_dir_name("Season 01"), Some(1));
        assert_eq!(season_from_dir_name("season 3"), Some(3));
        assert_eq!(season_from_dir_name("S02"), Some(2));
        assert_eq!(season_from_dir_name("originals"), None);
    }
}
