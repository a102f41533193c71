//! Fuzzy station lookup: maps a rider-typed name fragment onto cached stops.

use anyhow::Result;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::warn;

use crate::db::models::{LocationSlug, Stop};
use crate::db::Database;

/// Ranks `stops` against `query`, best match first. Matching is
/// case-insensitive and subsequence-based, so "metro" hits "Metro Center"
/// and "mtr cntr" does too.
pub fn fuzzy_find<'a>(query: &str, stops: &'a [Stop]) -> Vec<&'a Stop> {
    let matcher = SkimMatcherV2::default().ignore_case();

    let mut scored: Vec<(i64, &Stop)> = stops
        .iter()
        .filter_map(|stop| {
            matcher
                .fuzzy_match(&stop.name, query)
                .map(|score| (score, stop))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, stop)| stop).collect()
}

/// Applies the match-count policy to a ranked candidate list:
/// no matches or too many matches both resolve to nothing, with a warning,
/// so one vague argument cannot flood the output.
pub fn apply_match_policy<'a>(
    query: &str,
    matches: Vec<&'a Stop>,
    max_matches: usize,
) -> Vec<&'a Stop> {
    if matches.is_empty() {
        warn!(query, "no stations matched; skipping");
        return Vec::new();
    }

    if matches.len() > max_matches {
        warn!(
            query,
            count = matches.len(),
            max = max_matches,
            "too many stations matched; try a more specific name"
        );
        return Vec::new();
    }

    matches
}

/// Resolves a query against the top-level stops cached for `location`.
pub async fn resolve_stops(
    db: &Database,
    location: LocationSlug,
    query: &str,
    max_matches: usize,
) -> Result<Vec<Stop>> {
    let stops = db.get_stops_by_location(location, true).await?;
    let matches = apply_match_policy(query, fuzzy_find(query, &stops), max_matches);

    Ok(matches.into_iter().cloned().collect())
}
