//! Title and artist variant expansion.

use super::sanitize::{
    cover_artist_check, normalize_whitespace, sanitize_author, sanitize_parenthesis,
    sanitize_string,
};

/// Titles with more dash-separated segments than this add no variants.
const MAX_SEGMENTS: usize = 4;

/// Everything the matcher compares candidates against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variants {
    pub titles: Vec<String>,
    pub artists: Vec<String>,
    /// Lower-cased cover artist, as detected in the raw title.
    pub cover_artist: Option<String>,
    /// Bracket-free, character-filtered title, whitespace-normalised.
    pub sanitized_title: String,
}

impl Variants {
    pub fn expand(raw_title: &str, raw_author: &str) -> Self {
        let cover_artist = cover_artist_check(raw_title);
        let sanitized = sanitize_string(&sanitize_parenthesis(raw_title));
        let feat_stripped = sanitized.split("feat").next().unwrap_or_default().to_string();

        let mut titles = vec![raw_title.to_string(), sanitized.clone(), feat_stripped.clone()];
        let mut artists = vec![raw_author.to_string()];
        if let Some(cover) = &cover_artist {
            artists.push(sanitize_author(cover));
        }

        for source in [&sanitized, &feat_stripped] {
            add_segment_variants(source, &mut titles, &mut artists);
        }

        Self {
            titles: titles.iter().map(|t| normalize_whitespace(t)).collect(),
            artists: artists.iter().map(|a| normalize_whitespace(a)).collect(),
            cover_artist,
            sanitized_title: normalize_whitespace(&sanitized),
        }
    }
}

/// Split on `-` (after mapping `:` to `-`) and add every contiguous window
/// narrower than the whole as a title and an artist.
fn add_segment_variants(title: &str, titles: &mut Vec<String>, artists: &mut Vec<String>) {
    let replaced = title.replace(':', "-");
    let segments: Vec<&str> = replaced.split('-').collect();
    let n = segments.len();

    if n == 1 {
        titles.push(segments[0].to_string());
        return;
    }
    if n > MAX_SEGMENTS {
        return;
    }

    for width in 1..n {
        for window in segments.windows(width) {
            let joined = window.join(" ");
            artists.push(sanitize_author(&joined));
            titles.push(joined);
        }
    }
}
