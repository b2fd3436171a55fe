use seoflow_core::{CategoryResult, Draft, GateCategory, PageType};

use crate::category::CategoryCheck;
use crate::context::GateContext;
use crate::text::normalized;
use crate::thresholds::{min_word_count, DUPLICATE_INTENT_SIMILARITY, MIN_LOCAL_ENTITIES};

pub(crate) fn check(draft: &Draft, page_type: PageType, ctx: &GateContext<'_>) -> CategoryResult {
    let mut result = CategoryCheck::new(GateCategory::Content);
    let content = &draft.content;

    let words = content.word_count();
    let floor = min_word_count(page_type);
    if words < floor {
        result.fail(
            "word_count",
            format!("{words} words, {page_type} pages need at least {floor}"),
        );
    } else {
        result.pass();
    }

    let body = normalized(&content.body);
    let closest = ctx
        .published
        .iter()
        .filter(|page| page.topic_id != draft.topic_id)
        .map(|page| (page, strsim::sorensen_dice(&body, &normalized(&page.body))))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    match closest {
        Some((page, similarity)) if similarity >= DUPLICATE_INTENT_SIMILARITY => result.fail(
            "duplicate_intent",
            format!(
                "{:.0}% similar to published page {}",
                similarity * 100.0,
                page.target_url
            ),
        ),
        _ => result.pass(),
    }

    if page_type.is_location_page() {
        let lower = content.body.to_lowercase();
        let mut found: Vec<&str> = ctx
            .local_entities
            .iter()
            .map(String::as_str)
            .filter(|entity| !entity.trim().is_empty() && lower.contains(&entity.to_lowercase()))
            .collect();
        found.sort_unstable();
        found.dedup();
        if found.len() < MIN_LOCAL_ENTITIES {
            result.fail(
                "local_value",
                format!(
                    "{} recognized local entities, need at least {MIN_LOCAL_ENTITIES}",
                    found.len()
                ),
            );
        } else {
            result.pass();
        }
    }

    result.finish()
}
