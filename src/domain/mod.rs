pub mod comment;
pub mod group;
pub mod post;
pub mod social_graph;
pub mod user;

/// Number of characters shown when an entry is summarised in a listing.
pub const SUMMARY_CHARS: usize = 15;

pub(crate) fn summarize(text: &str) -> &str {
    match text.char_indices().nth(SUMMARY_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
