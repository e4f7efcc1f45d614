//! String normalisation for noisy source titles and uploader names.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"\([^()]*\)|\[[^\[\]]*\]").unwrap();
    static ref DISALLOWED_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9\s:\-]").unwrap();
    static ref AUTHOR_NOISE: Regex =
        Regex::new(r" - official|-official|official| - vevo|-vevo|vevo|@| - topic|-topic|topic")
            .unwrap();
}

/// Find a cover artist named in a parenthetical or bracketed span.
///
/// The title is lower-cased first. Spans are scanned in order; the first one
/// mentioning "cover by", "covered by", or ending in "cover" wins.
pub fn cover_artist_check(title: &str) -> Option<String> {
    let lower = title.to_lowercase();
    for span in BRACKETED.find_iter(&lower) {
        let span = span.as_str();
        let inner = span[1..span.len() - 1].trim();
        let artist = if inner.contains("cover by") {
            inner.replace("cover by", "")
        } else if inner.contains("covered by") {
            inner.replace("covered by", "")
        } else if inner.ends_with("cover") {
            inner.replace("cover", "")
        } else {
            continue;
        };
        return Some(artist.trim().to_string());
    }
    None
}

/// Remove every `(...)` and `[...]` span. Surrounding whitespace is kept.
pub fn sanitize_parenthesis(s: &str) -> String {
    BRACKETED.replace_all(s, "").into_owned()
}

/// Keep only ASCII letters, digits, whitespace, `:` and `-`.
pub fn sanitize_string(s: &str) -> String {
    DISALLOWED_CHARS.replace_all(s, "").into_owned()
}

/// Lower-case an uploader name and strip channel decorations.
pub fn sanitize_author(author: &str) -> String {
    let lower = author.to_lowercase();
    AUTHOR_NOISE.replace_all(&lower, "").trim().to_string()
}

/// Case-insensitive comparison that ignores all whitespace.
pub fn equal_ignoring_whitespace(a: &str, b: &str) -> bool {
    fn fold(s: &str) -> impl Iterator<Item = char> + '_ {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
    }
    fold(a).eq(fold(b))
}

/// Collapse runs of whitespace to a single space and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
