use chrono::Utc;
use seoflow_core::{
    CallToAction, CtaKind, Draft, DraftContent, DraftImage, GateCategory, GateStatus, ImageRole,
    PageType, PublishedPage, Severity,
};
use seoflow_gate::{aggregate, evaluate, GateContext};
use uuid::Uuid;

const ENTITIES: [&str; 7] = [
    "Austin-Bergstrom International Airport",
    "Sixth Street",
    "Zilker Park",
    "Moody Center",
    "South Congress",
    "Lady Bird Lake",
    "The Domain",
];

fn body_for(city: &str) -> String {
    let mut body = format!(
        "Our {city} limo service covers airport runs, weddings and concerts. \
         Riders who book an {city} limo service get a flat quote before pickup.\n\n\
         ## Where we drive\n\n\
         Regular stops include Austin-Bergstrom International Airport, Sixth Street, \
         Zilker Park, the Moody Center, South Congress and Lady Bird Lake, with \
         shopping drops at The Domain. See the [fleet](/fleet) or ask for a [quote](/quote).\n\n"
    );
    for i in 1..=30 {
        body.push_str(&format!(
            "Trip note {i}: chauffeurs watch traffic on the way to each {city} venue, \
             confirm the pickup window by text, load luggage, keep water chilled, and \
             adjust the route when events close roads downtown. Groups can split \
             a larger coach, while couples usually prefer a sedan with quiet cabin \
             space and a driver who knows where to wait.\n\n"
        ));
    }
    body
}

fn draft(city: &str) -> Draft {
    let content = DraftContent {
        body: body_for(city),
        meta_title: format!("{city} Limo Service | Airport Transfers and Nights Out"),
        meta_description: format!(
            "Book an {city} limo service for airport transfers, weddings and concerts. \
             Licensed chauffeurs, flat quotes, and late-night pickups across the city every day."
        ),
        h1: format!("{city} Limo Service"),
        internal_links: vec!["/fleet".to_string(), "/quote/".to_string()],
        images: vec![
            image(ImageRole::Hero, "Black stretch limo parked downtown at dusk"),
            image(ImageRole::Gallery, "Leather rear cabin with ambient lighting"),
            image(ImageRole::Inline, "Chauffeur loading luggage at the airport curb"),
        ],
        ctas: vec![
            CallToAction {
                kind: CtaKind::Primary,
                label: "Get a quote".to_string(),
                href: "/quote".to_string(),
                above_fold: true,
            },
            CallToAction {
                kind: CtaKind::Phone,
                label: "Call dispatch".to_string(),
                href: "tel:+1-512-555-0100".to_string(),
                above_fold: true,
            },
        ],
    };
    Draft {
        id: Uuid::new_v4(),
        topic_id: Uuid::new_v4(),
        word_count: i64::try_from(content.word_count()).unwrap(),
        content,
        generated_at: Utc::now(),
    }
}

fn image(role: ImageRole, alt: &str) -> DraftImage {
    DraftImage {
        url: format!("https://cdn.example.com/{}.jpg", alt.len()),
        alt: Some(alt.to_string()),
        role,
    }
}

fn entities() -> Vec<String> {
    ENTITIES.iter().map(|e| (*e).to_string()).collect()
}

fn known_urls() -> Vec<String> {
    vec!["/fleet".to_string(), "/quote".to_string()]
}

fn issue_checks(result: &seoflow_core::GateResult) -> Vec<&str> {
    result
        .categories
        .iter()
        .flat_map(|c| c.issues.iter())
        .map(|i| i.check.as_str())
        .collect()
}

#[test]
fn well_formed_city_page_passes_every_category() {
    let local = entities();
    let ctx = GateContext::new(&[], known_urls(), &local, Some("Austin"), "austin limo service");
    let result = evaluate(&draft("Austin"), PageType::City, &ctx);

    assert_eq!(issue_checks(&result), Vec::<&str>::new());
    assert_eq!(result.overall_status, GateStatus::Passed);
    assert_eq!(result.categories.len(), 5);
    assert!(result
        .categories
        .iter()
        .all(|c| c.passed && (c.score - 100.0).abs() < f64::EPSILON));
    assert!(result.suggestions.is_empty());
}

#[test]
fn a_single_failed_check_fails_the_draft_even_alongside_warnings() {
    let local = entities();
    let ctx = GateContext::new(&[], known_urls(), &local, Some("Austin"), "austin limo service");
    let mut d = draft("Austin");
    d.content.body.push_str("# A second top-level heading\n");
    d.content.meta_title = "Too short".to_string();

    let result = evaluate(&d, PageType::City, &ctx);
    assert_eq!(result.overall_status, GateStatus::Failed);
    let technical = result
        .categories
        .iter()
        .find(|c| c.category == GateCategory::Technical)
        .unwrap();
    assert!(!technical.passed);
    assert!(result.fail_reasons().iter().any(|r| r.contains("single_h1")));
}

#[test]
fn warnings_alone_produce_warned() {
    let local = entities();
    let ctx = GateContext::new(&[], known_urls(), &local, Some("Austin"), "austin limo service");
    let mut d = draft("Austin");
    d.content.meta_title = "Austin limos".to_string();

    let result = evaluate(&d, PageType::City, &ctx);
    assert_eq!(result.overall_status, GateStatus::Warned);
    assert_eq!(issue_checks(&result), vec!["title_length"]);
    assert_eq!(result.suggestions.len(), 1);
}

#[test]
fn city_swapped_copy_of_a_live_page_is_a_doorway() {
    let live = draft("Dallas");
    let published = vec![PublishedPage {
        topic_id: live.topic_id,
        page_type: PageType::City,
        target_url: "/dallas".to_string(),
        segment_value: Some("Dallas".to_string()),
        body: live.content.body.clone(),
    }];
    let local = entities();
    let ctx = GateContext::new(
        &published,
        known_urls(),
        &local,
        Some("Austin"),
        "austin limo service",
    );

    let result = evaluate(&draft("Austin"), PageType::City, &ctx);
    assert_eq!(result.overall_status, GateStatus::Failed);
    let checks = issue_checks(&result);
    assert!(checks.contains(&"doorway_page"), "{checks:?}");
    assert!(checks.contains(&"duplicate_intent"), "{checks:?}");
}

#[test]
fn a_page_is_not_compared_against_its_own_live_version() {
    let d = draft("Austin");
    let published = vec![PublishedPage {
        topic_id: d.topic_id,
        page_type: PageType::City,
        target_url: "/austin".to_string(),
        segment_value: Some("Austin".to_string()),
        body: d.content.body.clone(),
    }];
    let local = entities();
    let ctx = GateContext::new(
        &published,
        known_urls(),
        &local,
        Some("Austin"),
        "austin limo service",
    );
    assert_eq!(evaluate(&d, PageType::City, &ctx).overall_status, GateStatus::Passed);
}

#[test]
fn blog_without_a_phone_cta_only_warns() {
    let ctx = GateContext::new(&[], known_urls(), &[], None, "austin limo service");
    let mut d = draft("Austin");
    d.content.ctas.retain(|cta| cta.kind != CtaKind::Phone);

    let result = evaluate(&d, PageType::Blog, &ctx);
    assert_eq!(result.overall_status, GateStatus::Warned);
    assert_eq!(issue_checks(&result), vec!["phone_cta"]);

    let as_city = evaluate(&d, PageType::City, &ctx);
    assert_eq!(as_city.overall_status, GateStatus::Failed);
}

#[test]
fn keyword_stuffing_fails_anti_spam() {
    let local = entities();
    let ctx = GateContext::new(&[], known_urls(), &local, Some("Austin"), "austin limo service");
    let mut d = draft("Austin");
    for _ in 0..40 {
        d.content.body.push_str("Austin limo service. ");
    }

    let result = evaluate(&d, PageType::City, &ctx);
    let anti_spam = result
        .categories
        .iter()
        .find(|c| c.category == GateCategory::AntiSpam)
        .unwrap();
    assert!(anti_spam
        .issues
        .iter()
        .any(|i| i.check == "keyword_density" && i.severity == Severity::Fail));
}

#[test]
fn guarantee_language_is_flagged_for_review() {
    let local = entities();
    let ctx = GateContext::new(&[], known_urls(), &local, Some("Austin"), "austin limo service");
    let mut d = draft("Austin");
    d.content.body.push_str("We guarantee you will love the ride.\n");

    let result = evaluate(&d, PageType::City, &ctx);
    assert_eq!(result.overall_status, GateStatus::Warned);
    assert_eq!(issue_checks(&result), vec!["unverified_claims"]);
}

#[test]
fn thin_city_page_fails_content_checks() {
    let ctx = GateContext::new(&[], known_urls(), &[], Some("Austin"), "");
    let mut d = draft("Austin");
    d.content.body = "Short copy about rides.".to_string();

    let result = evaluate(&d, PageType::City, &ctx);
    let checks = issue_checks(&result);
    assert!(checks.contains(&"word_count"));
    assert!(checks.contains(&"local_value"));
    // An empty keyword skips density instead of dividing by it.
    assert!(!checks.contains(&"keyword_density"));
}

#[test]
fn empty_category_list_aggregates_to_passed() {
    assert_eq!(aggregate(&[]), GateStatus::Passed);
}
