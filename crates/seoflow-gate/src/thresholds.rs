//! Gate limits. Page-type specific limits are functions of [`PageType`].

use seoflow_core::PageType;

pub const DUPLICATE_INTENT_SIMILARITY: f64 = 0.80;
pub const DOORWAY_SIMILARITY: f64 = 0.95;
pub const MIN_LOCAL_ENTITIES: usize = 6;
pub const TITLE_LEN: (usize, usize) = (50, 65);
pub const META_DESCRIPTION_LEN: (usize, usize) = (140, 165);
pub const MIN_ALT_TEXT_LEN: usize = 10;
pub const MIN_PHONE_DIGITS: usize = 10;
/// Keyword occurrences as a share of body words.
pub const MAX_KEYWORD_DENSITY: f64 = 0.03;

#[must_use]
pub fn min_word_count(page_type: PageType) -> usize {
    match page_type {
        PageType::City | PageType::Service => 1200,
        PageType::Vehicle => 1000,
        PageType::Blog => 900,
    }
}

#[must_use]
pub fn min_image_count(page_type: PageType) -> usize {
    match page_type {
        PageType::Vehicle => 8,
        PageType::City | PageType::Service => 3,
        PageType::Blog => 1,
    }
}
