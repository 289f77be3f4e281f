//! Album name normalization.
//!
//! Merges spellings of the same album ("Rumours" / "Rumors", curly vs
//! straight quotes, accented vs plain letters) under one canonical name.
//! Deterministic: unique names are clustered in lexicographic order and the
//! canonical member is chosen by play count, then lexicographically.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::models::Play;

// ============================================================================
// TEXT FOLDING
// ============================================================================

/// Regex to collapse runs of whitespace into a single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Strip diacritics (NFKD, drop combining marks), transliterate the rest
/// and lowercase. "Björk" → "bjork", "кино" → "kino".
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Straighten quotes, spell out " & " and collapse whitespace.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

/// The form album names are compared in.
pub fn comparison_form(name: &str) -> String {
    fold_to_ascii(&normalize_punctuation(name.trim()))
        .trim()
        .to_string()
}

/// Similarity in [0, 1] between two album names.
pub fn album_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&comparison_form(a), &comparison_form(b))
}

// ============================================================================
// CLUSTERING
// ============================================================================

/// Map every album name in `counts` to its canonical name.
///
/// Names are visited in lexicographic order; each unassigned name opens a
/// cluster and absorbs every later unassigned name whose similarity to it is
/// strictly above `threshold`.
pub fn album_aliases(counts: &BTreeMap<String, u64>, threshold: f64) -> FxHashMap<String, String> {
    let names: Vec<(&str, u64)> = counts.iter().map(|(n, &c)| (n.as_str(), c)).collect();
    let forms: Vec<String> = names.iter().map(|(n, _)| comparison_form(n)).collect();
    let mut assigned = vec![false; names.len()];
    let mut aliases = FxHashMap::default();
    let mut merged_clusters = 0usize;

    for i in 0..names.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut cluster = vec![i];
        for j in (i + 1)..names.len() {
            if !assigned[j] && strsim::normalized_levenshtein(&forms[i], &forms[j]) > threshold {
                assigned[j] = true;
                cluster.push(j);
            }
        }

        // Members are in lexicographic order, so strict > keeps the smallest name on ties
        let mut canonical = cluster[0];
        for &member in &cluster[1..] {
            if names[member].1 > names[canonical].1 {
                canonical = member;
            }
        }
        if cluster.len() > 1 {
            merged_clusters += 1;
            debug!(
                canonical = names[canonical].0,
                members = cluster.len(),
                "Merged album spellings"
            );
        }
        for member in cluster {
            aliases.insert(names[member].0.to_string(), names[canonical].0.to_string());
        }
    }

    info!(
        albums = names.len(),
        merged_clusters,
        threshold,
        "Album normalization complete"
    );
    aliases
}

/// Plays per album key.
pub fn album_counts(plays: &[Play]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for album in plays.iter().filter_map(|p| p.album_key.as_deref()) {
        *counts.entry(album.to_string()).or_insert(0) += 1;
    }
    counts
}

/// New plays with album names rewritten to their canonical spelling.
/// Plays without an album are left as they are.
pub fn normalize_albums(plays: &[Play], threshold: f64) -> Vec<Play> {
    let aliases = album_aliases(&album_counts(plays), threshold);
    plays
        .iter()
        .map(|play| {
            let mut play = play.clone();
            if let Some(canonical) = play.album_key.as_ref().and_then(|k| aliases.get(k)) {
                let canonical = canonical.clone();
                play.album_name = Some(canonical.clone());
                play.album_key = Some(canonical);
            }
            play
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayType;
    use crate::test_support::{play, with_album};

    fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Björk"), "bjork");
        assert_eq!(fold_to_ascii("Motörhead"), "motorhead");
        assert_eq!(fold_to_ascii("кино"), "kino");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_punctuation("Don\u{2019}t Stop"), "Don't Stop");
        assert_eq!(normalize_punctuation("Rock & Roll"), "Rock and Roll");
        assert_eq!(normalize_punctuation("A   B"), "A B");
    }

    #[test]
    fn test_comparison_form() {
        assert_eq!(
            comparison_form("  The Dark Side Of The Moon "),
            comparison_form("The Dark Side of the Moon")
        );
        assert_eq!(comparison_form("Beyoncé"), "beyonce");
    }

    #[test]
    fn test_similar_names_merge_to_most_played() {
        let aliases = album_aliases(&counts(&[("Rumors", 3), ("Rumours", 10)]), 0.85);
        assert_eq!(aliases["Rumors"], "Rumours");
        assert_eq!(aliases["Rumours"], "Rumours");
    }

    #[test]
    fn test_tie_goes_to_smallest_name() {
        let aliases = album_aliases(&counts(&[("Rumours", 4), ("Rumors", 4)]), 0.85);
        assert_eq!(aliases["Rumours"], "Rumors");
    }

    #[test]
    fn test_distinct_albums_stay_apart() {
        let aliases = album_aliases(
            &counts(&[("Abbey Road", 5), ("Abbey Road (Remastered)", 2), ("Let It Be", 1)]),
            0.85,
        );
        assert_eq!(aliases["Abbey Road (Remastered)"], "Abbey Road (Remastered)");
        assert_eq!(aliases["Let It Be"], "Let It Be");
    }

    #[test]
    fn test_threshold_is_strict() {
        // One edit over seven characters
        let similarity = album_similarity("Rumors", "Rumours");
        let aliases = album_aliases(&counts(&[("Rumors", 1), ("Rumours", 2)]), similarity);
        assert_eq!(aliases["Rumors"], "Rumors");
    }

    #[test]
    fn test_result_independent_of_insertion_order() {
        let forward = album_aliases(&counts(&[("Rumours", 2), ("Rumors", 1), ("Tusk", 1)]), 0.85);
        let backward = album_aliases(&counts(&[("Tusk", 1), ("Rumors", 1), ("Rumours", 2)]), 0.85);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_normalize_albums_rewrites_plays() {
        let plays = vec![
            with_album(play("A", "X", "2024-01-01 10:00", PlayType::Intentional), "Rumours"),
            with_album(play("B", "X", "2024-01-01 11:00", PlayType::Intentional), "Rumours"),
            with_album(play("C", "X", "2024-01-01 12:00", PlayType::Intentional), "Rumors"),
        ];
        let mut no_album = play("D", "Y", "2024-01-01 13:00", PlayType::Intentional);
        no_album.album_name = None;
        no_album.album_key = None;
        let mut all = plays.clone();
        all.push(no_album);

        let normalized = normalize_albums(&all, 0.85);
        assert_eq!(normalized.len(), 4);
        for play in &normalized[..3] {
            assert_eq!(play.album_key.as_deref(), Some("Rumours"));
            assert_eq!(play.album_name.as_deref(), Some("Rumours"));
        }
        assert_eq!(normalized[3].album_key, None);
        // Input untouched
        assert_eq!(all[2].album_key.as_deref(), Some("Rumors"));
    }
}
