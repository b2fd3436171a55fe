use seoflow_core::{CategoryResult, Draft, GateCategory, ImageRole, PageType};

use crate::category::CategoryCheck;
use crate::thresholds::{min_image_count, MIN_ALT_TEXT_LEN};

pub(crate) fn check(draft: &Draft, page_type: PageType) -> CategoryResult {
    let mut result = CategoryCheck::new(GateCategory::Image);
    let images = &draft.content.images;

    if images.iter().any(|img| img.role == ImageRole::Hero) {
        result.pass();
    } else {
        result.fail("hero_image", "no hero image");
    }

    let min = min_image_count(page_type);
    if images.len() >= min {
        result.pass();
    } else {
        result.fail(
            "image_count",
            format!("{} images, {page_type} pages need at least {min}", images.len()),
        );
    }

    let weak_alt = images
        .iter()
        .filter(|img| {
            img.alt
                .as_deref()
                .is_none_or(|alt| alt.trim().chars().count() < MIN_ALT_TEXT_LEN)
        })
        .count();
    if weak_alt == 0 {
        result.pass();
    } else {
        result.fail(
            "alt_text",
            format!("{weak_alt} images missing alt text of at least {MIN_ALT_TEXT_LEN} characters"),
        );
    }

    result.finish()
}
