//! Source scoring: tier bonus dominates, then preferred tags, quality and seeders.

use crate::parse::{self, PackType};
use crate::providers::SourceCandidate;

pub const SERIES_PACK_BONUS: i64 = 100_000;
pub const SEASON_PACK_BONUS: i64 = 50_000;
pub const PREFERRED_TAG_BONUS: i64 = 10_000;
pub const HIGH_FIDELITY_BONUS: i64 = 400;
pub const EFFICIENT_CODEC_BONUS: i64 = 200;
pub const DIRECT_WEB_BONUS: i64 = 100;
pub const MAX_SEEDER_POINTS: i64 = 500;

/// A candidate with its derived pack type and score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: SourceCandidate,
    pub pack_type: Option<PackType>,
    pub score: i64,
}

pub fn tier_bonus(pack_type: Option<PackType>) -> i64 {
    match pack_type {
        Some(PackType::Series) => SERIES_PACK_BONUS,
        Some(PackType::Season) => SEASON_PACK_BONUS,
        None => 0,
    }
}

pub fn score(candidate: &SourceCandidate, preferred_tags: &[String]) -> i64 {
    let title = &candidate.title;
    let tags = preferred_tags
        .iter()
        .filter(|t| parse::contains_tag(title, t))
        .count() as i64;
    let q = parse::quality(title);
    let mut encode = 0;
    if q.high_fidelity {
        encode += HIGH_FIDELITY_BONUS;
    }
    if q.efficient_codec {
        encode += EFFICIENT_CODEC_BONUS;
    }
    if q.direct_web {
        encode += DIRECT_WEB_BONUS;
    }
    let seeders = (candidate.seeders as i64 * 2).min(MAX_SEEDER_POINTS);

    tier_bonus(candidate.pack_type()) + tags * PREFERRED_TAG_BONUS + q.resolution as i64 + encode + seeders
}

/// Score, de-duplicate by locator and sort best first.
/// Ties keep the higher seeder count first, then indexer order.
pub fn rank(candidates: Vec<SourceCandidate>, preferred_tags: &[String]) -> Vec<ScoredCandidate> {
    let mut seen = std::collections::HashSet::new();
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.locator.clone()))
        .map(|c| ScoredCandidate {
            score: score(&c, preferred_tags),
            pack_type: c.pack_type(),
            candidate: c,
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.candidate.seeders.cmp(&a.candidate.seeders))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(title: &str, seeders: u32) -> SourceCandidate {
        SourceCandidate {
            title: title.to_string(),
            size_bytes: 0,
            seeders,
            locator: format!("loc:{}", title),
        }
    }

    #[test]
    fn score_formula() {
        let c = cand("Show S01 1080p BluRay x265 UNCUT", 30);
        let want = SEASON_PACK_BONUS + PREFERRED_TAG_BONUS + 1080 + 400 + 200 + 60;
        assert_eq!(score(&c, &["uncut".to_string()]), want);
    }

    #[test]
    fn seeders_are_capped() {
        let c = cand("Show S01E01", 10_000);
        assert_eq!(score(&c, &[]), MAX_SEEDER_POINTS);
    }

    #[test]
    fn tier_dominates_quality_and_seeders() {
        let series = cand("Show Complete Series 480p", 0);
        let season = cand("Show S01 2160p BluRay REMUX HEVC WEB-DL", 100_000);
        let single = cand("Show S01E01 2160p BluRay REMUX HEVC WEB-DL", 100_000);
        assert!(score(&series, &[]) > score(&season, &[]));
        assert!(score(&season, &[]) > score(&single, &[]));
    }

    #[test]
    fn rank_sorts_and_dedups() {
        let ranked = rank(
            vec![
                cand("Show S01E01 720p", 5),
                cand("Show Complete Series 720p", 1),
                cand("Show S01 720p", 1),
                cand("Show S01E01 720p", 5),
            ],
            &[],
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].pack_type, Some(PackType::Series));
        assert_eq!(ranked[1].pack_type, Some(PackType::Season));
        assert_eq!(ranked[2].pack_type, None);
    }
}
