use seoflow_core::{CategoryResult, CtaKind, Draft, GateCategory, PageType};

use crate::category::CategoryCheck;
use crate::thresholds::MIN_PHONE_DIGITS;

fn is_actionable_phone(href: &str) -> bool {
    href.trim()
        .strip_prefix("tel:")
        .is_some_and(|number| number.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS)
}

pub(crate) fn check(draft: &Draft, page_type: PageType) -> CategoryResult {
    let mut result = CategoryCheck::new(GateCategory::Ux);
    let ctas = &draft.content.ctas;

    if ctas
        .iter()
        .any(|cta| cta.kind == CtaKind::Primary && cta.above_fold)
    {
        result.pass();
    } else {
        result.fail("primary_cta_above_fold", "no primary call to action above the fold");
    }

    let phones: Vec<_> = ctas.iter().filter(|cta| cta.kind == CtaKind::Phone).collect();
    if phones.is_empty() {
        // Articles may omit the phone button.
        if page_type == PageType::Blog {
            result.warn("phone_cta", "no phone call to action");
        } else {
            result.fail("phone_cta", "no phone call to action");
        }
    } else if phones.iter().all(|cta| is_actionable_phone(&cta.href)) {
        result.pass();
    } else {
        result.fail("phone_cta", "phone call to action is not a dialable tel: link");
    }

    result.finish()
}
