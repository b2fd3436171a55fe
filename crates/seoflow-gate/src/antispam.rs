use std::sync::LazyLock;

use regex::Regex;
use seoflow_core::{CategoryResult, Draft, GateCategory, PageType};

use crate::category::CategoryCheck;
use crate::context::GateContext;
use crate::text::{mask_names, phrase_occurrences, words};
use crate::thresholds::{DOORWAY_SIMILARITY, MAX_KEYWORD_DENSITY};

/// Review and guarantee language that needs a human look.
static CLAIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bguarantee[ds]?\b|\b100% (?:satisfaction|on[- ]time)|\b\d(?:\.\d)?[- ]star (?:reviews?|rated|rating)\b|\brated \d(?:\.\d)? stars?\b|\b(?:thousands|hundreds) of (?:happy|satisfied) (?:customers|clients)\b|(?:^|\s)#1\b|\bnumber one\b",
    )
    .expect("valid claim regex")
});

#[allow(clippy::cast_precision_loss)]
pub(crate) fn check(draft: &Draft, page_type: PageType, ctx: &GateContext<'_>) -> CategoryResult {
    let mut result = CategoryCheck::new(GateCategory::AntiSpam);
    let body = &draft.content.body;
    let tokens = words(body);

    let keyword = words(ctx.primary_keyword);
    if keyword.is_empty() || tokens.is_empty() {
        result.pass();
    } else {
        let hits = phrase_occurrences(&tokens, &keyword);
        let density = (hits * keyword.len()) as f64 / tokens.len() as f64;
        if density > MAX_KEYWORD_DENSITY {
            result.fail(
                "keyword_density",
                format!(
                    "'{}' is {:.1}% of words, limit {:.0}%",
                    ctx.primary_keyword,
                    density * 100.0,
                    MAX_KEYWORD_DENSITY * 100.0
                ),
            );
        } else {
            result.pass();
        }
    }

    let doorway = ctx
        .published
        .iter()
        .filter(|page| page.topic_id != draft.topic_id && page.page_type == page_type)
        .find_map(|page| {
            let mut names: Vec<&str> = Vec::new();
            names.extend(ctx.city);
            names.extend(page.segment_value.as_deref());
            let mine = mask_names(body, &names);
            let theirs = mask_names(&page.body, &names);
            let similarity = strsim::sorensen_dice(&mine, &theirs);
            (similarity >= DOORWAY_SIMILARITY).then_some((page, similarity))
        });
    match doorway {
        Some((page, similarity)) => result.fail(
            "doorway_page",
            format!(
                "{:.0}% identical to {} apart from place names",
                similarity * 100.0,
                page.target_url
            ),
        ),
        None => result.pass(),
    }

    let claims: Vec<&str> = CLAIM_RE
        .find_iter(body)
        .map(|m| m.as_str().trim())
        .collect();
    if claims.is_empty() {
        result.pass();
    } else {
        result.warn(
            "unverified_claims",
            format!("review or guarantee language: {}", claims.join(", ")),
        );
    }

    result.finish()
}
