use seoflow_core::{CategoryResult, Draft, GateCategory};

use crate::category::CategoryCheck;
use crate::context::GateContext;
use crate::text::{internal_links, top_level_headings};
use crate::thresholds::{META_DESCRIPTION_LEN, TITLE_LEN};

pub(crate) fn check(draft: &Draft, ctx: &GateContext<'_>) -> CategoryResult {
    let mut result = CategoryCheck::new(GateCategory::Technical);
    let content = &draft.content;

    // The template renders `h1`; the body may not add another.
    let headings = usize::from(!content.h1.trim().is_empty()) + top_level_headings(&content.body);
    if headings == 1 {
        result.pass();
    } else {
        result.fail("single_h1", format!("{headings} top-level headings, expected exactly 1"));
    }

    length_check(&mut result, "title_length", &content.meta_title, TITLE_LEN);
    length_check(
        &mut result,
        "meta_description_length",
        &content.meta_description,
        META_DESCRIPTION_LEN,
    );

    let mut broken: Vec<String> = content
        .internal_links
        .iter()
        .cloned()
        .chain(internal_links(&content.body))
        .filter(|href| !ctx.is_known_url(href))
        .collect();
    broken.sort();
    broken.dedup();
    if broken.is_empty() {
        result.pass();
    } else {
        result.fail(
            "broken_internal_links",
            format!("{} broken: {}", broken.len(), broken.join(", ")),
        );
    }

    result.finish()
}

fn length_check(result: &mut CategoryCheck, check: &str, value: &str, (min, max): (usize, usize)) {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        result.pass();
    } else {
        result.warn(check, format!("{len} characters, aim for {min}-{max}"));
    }
}
