use chrono::Utc;
use seoflow_core::{CategoryResult, Draft, GateIssue, GateResult, GateStatus, PageType, Severity};
use uuid::Uuid;

use crate::context::GateContext;
use crate::{antispam, content, image, technical, ux};

/// Any fail-severity issue fails; else any warning warns; else passes.
#[must_use]
pub fn aggregate(categories: &[CategoryResult]) -> GateStatus {
    let issues = || categories.iter().flat_map(|c| c.issues.iter());
    if issues().any(|i| i.severity == Severity::Fail) || categories.iter().any(|c| !c.passed) {
        GateStatus::Failed
    } else if issues().any(|i| i.severity == Severity::Warn) {
        GateStatus::Warned
    } else {
        GateStatus::Passed
    }
}

fn suggestion(issue: &GateIssue) -> String {
    let hint = match issue.check.as_str() {
        "word_count" => "expand the body with route, fleet, and local detail",
        "duplicate_intent" => "differentiate the angle or merge into the existing page",
        "local_value" => "mention more venues, neighborhoods, and airports in the city",
        "single_h1" => "keep one H1 and demote the rest to H2",
        "title_length" => "rewrite the meta title to 50-65 characters",
        "meta_description_length" => "rewrite the meta description to 140-165 characters",
        "broken_internal_links" => "point links at published pages or remove them",
        "hero_image" => "add a hero image",
        "image_count" => "add more photos",
        "alt_text" => "describe every image in its alt text",
        "primary_cta_above_fold" => "place the booking button above the fold",
        "phone_cta" => "add a tel: link with the full dispatch number",
        "keyword_density" => "use synonyms instead of repeating the primary keyword",
        "doorway_page" => "write city-specific content instead of swapping the city name",
        "unverified_claims" => "back claims with real reviews or remove them",
        _ => "review this check",
    };
    format!("{}: {hint}", issue.check)
}

/// Runs every category against `draft` and returns a new, immutable result.
#[must_use]
pub fn evaluate(draft: &Draft, page_type: PageType, ctx: &GateContext<'_>) -> GateResult {
    let categories = vec![
        content::check(draft, page_type, ctx),
        technical::check(draft, ctx),
        image::check(draft, page_type),
        ux::check(draft, page_type),
        antispam::check(draft, page_type, ctx),
    ];
    let overall_status = aggregate(&categories);
    let suggestions = categories
        .iter()
        .flat_map(|c| c.issues.iter())
        .map(suggestion)
        .collect();

    tracing::debug!(
        topic_id = %draft.topic_id,
        draft_id = %draft.id,
        status = %overall_status,
        "draft evaluated"
    );

    GateResult {
        id: Uuid::new_v4(),
        topic_id: draft.topic_id,
        draft_id: draft.id,
        categories,
        overall_status,
        suggestions,
        evaluated_at: Utc::now(),
    }
}
