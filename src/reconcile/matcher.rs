//! Best-match selection among catalog candidates.

use super::sanitize::equal_ignoring_whitespace;
use super::variants::Variants;
use crate::pipeline::{CatalogSearch, TrackMeta};
use tracing::{debug, info, warn};

/// Pick the first candidate that matches, in provider order.
///
/// A candidate by the detected cover artist matches on title alone. Any
/// other candidate needs both a title variant and an artist variant.
pub fn select_best_match<'a>(
    variants: &Variants,
    candidates: &'a [TrackMeta],
) -> Option<&'a TrackMeta> {
    let title_matches = |c: &TrackMeta| {
        variants
            .titles
            .iter()
            .any(|t| equal_ignoring_whitespace(t, &c.title))
    };

    candidates.iter().find(|candidate| {
        if let Some(cover) = &variants.cover_artist {
            if equal_ignoring_whitespace(cover, &candidate.artist) && title_matches(candidate) {
                return true;
            }
        }
        title_matches(candidate)
            && variants
                .artists
                .iter()
                .any(|a| equal_ignoring_whitespace(a, &candidate.artist))
    })
}

/// Resolve source metadata to a catalog record.
///
/// `source` carries the raw title, the uploader as `artist`, the looked-up
/// genre and the source thumbnail. `candidates` are the results of the
/// search already made with the raw title and uploader. When nothing
/// matches, one more round of searches is made with the sanitized title.
/// The returned record always carries the source genre.
pub async fn resolve_best_match(
    search: &dyn CatalogSearch,
    source: &TrackMeta,
    candidates: &[TrackMeta],
) -> TrackMeta {
    let variants = Variants::expand(&source.title, &source.artist);
    debug!(
        "Variants for '{}': titles={:?} artists={:?}",
        source.title, variants.titles, variants.artists
    );
    if let Some(cover) = &variants.cover_artist {
        info!("Cover artist '{}' detected in '{}'", cover, source.title);
    }

    if let Some(found) = select_best_match(&variants, candidates) {
        return adopt(found, source);
    }

    let fallback = fallback_search(search, source, &variants).await;
    if let Some(found) = select_best_match(&variants, &fallback) {
        return adopt(found, source);
    }

    info!(
        "No catalog match for '{}', using sanitized source metadata",
        source.title
    );
    TrackMeta {
        title: variants.sanitized_title.clone(),
        artist: source.artist.clone(),
        album: String::new(),
        genre: source.genre.clone(),
        cover_art_url: source.cover_art_url.clone(),
    }
}

fn adopt(candidate: &TrackMeta, source: &TrackMeta) -> TrackMeta {
    info!(
        "Matched '{}' to '{}' by '{}'",
        source.title, candidate.title, candidate.artist
    );
    TrackMeta {
        genre: source.genre.clone(),
        ..candidate.clone()
    }
}

async fn fallback_search(
    search: &dyn CatalogSearch,
    source: &TrackMeta,
    variants: &Variants,
) -> Vec<TrackMeta> {
    let mut queries = Vec::new();
    // The raw title was already searched with the uploader.
    if !equal_ignoring_whitespace(&variants.sanitized_title, &source.title) {
        queries.push((variants.sanitized_title.as_str(), source.artist.as_str()));
    }
    if let Some(cover) = &variants.cover_artist {
        queries.push((variants.sanitized_title.as_str(), cover.as_str()));
    }

    let mut merged = Vec::new();
    for (title, artist) in queries {
        match search.search(title, artist).await {
            Ok(results) => merged.extend(results),
            Err(e) => warn!(
                "Fallback catalog search for '{}' by '{}' failed: {:#}",
                title, artist, e
            ),
        }
    }
    merged
}
