//! Metadata reconciliation: resolves noisy source titles and uploader names
//! to canonical catalog records.

mod matcher;
mod sanitize;
mod variants;

pub use matcher::{resolve_best_match, select_best_match};
pub use sanitize::{
    cover_artist_check, equal_ignoring_whitespace, normalize_whitespace, sanitize_author,
    sanitize_parenthesis, sanitize_string,
};
pub use variants::Variants;
