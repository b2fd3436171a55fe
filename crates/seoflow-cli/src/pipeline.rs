//! Metrics, quality gate, publish, and freshness command handlers.

use chrono::{DateTime, NaiveDate, Utc};
use seoflow_content::{freeze_reasons, PublishHold};
use seoflow_core::{FreshnessStatus, SegmentType};

use crate::context::Context;

pub(crate) async fn run_metrics_compute(
    ctx: &Context,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<()> {
    let summary = ctx.metrics.compute_metrics(&ctx.caller, org, from, to).await?;
    println!(
        "computed {} rollup(s) for {org} from {from} to {to}",
        summary.computed
    );
    Ok(())
}

pub(crate) async fn run_metrics_segments(
    ctx: &Context,
    org: &str,
    from: NaiveDate,
    to: NaiveDate,
    segment_type: &str,
) -> anyhow::Result<()> {
    let segment_type: SegmentType = segment_type.parse()?;
    let segments = ctx
        .metrics
        .stored_segments(&ctx.caller, org, from, to, segment_type)
        .await?;

    if segments.is_empty() {
        println!(
            "no {segment_type} segments found for {org} from {from} to {to}; run `metrics compute` first"
        );
        return Ok(());
    }

    let header = format!(
        "{:<28}{:>14}{:>14}{:>12}{:>10}",
        segment_type.as_str().to_uppercase(),
        "REVENUE",
        "PROFIT",
        "AD SPEND",
        "BOOKINGS"
    );
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for segment in &segments {
        let figures = &segment.figures;
        println!(
            "{:<28}{:>14}{:>14}{:>12}{:>10}",
            segment.segment_value,
            figures.revenue.round_dp(2),
            figures.profit.round_dp(2),
            figures.ad_spend.round_dp(2),
            figures.booking_count,
        );
    }
    Ok(())
}

pub(crate) async fn run_gate(ctx: &Context, org: &str) -> anyhow::Result<()> {
    let summary = ctx.topics.run_quality_gate(&ctx.caller, org).await?;
    println!(
        "gate {}: evaluated {} draft(s), blocked {} (run {})",
        summary.status, summary.evaluated, summary.blocked, summary.run_id
    );
    for reason in &summary.fail_reasons {
        println!("  fail: {reason}");
    }
    Ok(())
}

pub(crate) async fn run_publish(
    ctx: &Context,
    org: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let outcome = ctx
        .publisher
        .publish(&ctx.caller, org, limit.unwrap_or(usize::MAX))
        .await?;

    if let Some(hold) = &outcome.held {
        println!("publishing held for {org}:");
        for line in describe_hold(hold) {
            println!("  {line}");
        }
        return Ok(());
    }

    match outcome.manifest_id {
        Some(manifest_id) => println!(
            "published {} topic(s) for {org}, manifest {manifest_id}",
            outcome.published
        ),
        None => println!("nothing to publish for {org}; approve ready topics first"),
    }
    for skipped in &outcome.skipped {
        println!("  skipped {}: {}", skipped.topic_id, skipped.reason);
    }
    Ok(())
}

pub(crate) async fn run_freshness(ctx: &Context, org: &str, record: bool) -> anyhow::Result<()> {
    let statuses = if record {
        ctx.freshness.record_snapshot(org).await?
    } else {
        ctx.freshness.check_all(org).await?
    };

    if statuses.is_empty() {
        println!("no freshness sources configured");
        return Ok(());
    }

    let header = format!(
        "{:<24}{:<8}{:<10}{:>9}  LAST UPDATED",
        "SOURCE", "CLASS", "STATUS", "AGE (H)"
    );
    println!("{header}");
    println!("{}", "-".repeat(header.len() + 8));
    for status in &statuses {
        println!("{}", format_status(status));
    }

    let reasons = freeze_reasons(&statuses);
    if reasons.is_empty() {
        println!("\npublishing is open for {org}");
    } else {
        println!("\npublishing is frozen for {org}:");
        for reason in reasons {
            println!("  {reason}");
        }
    }
    if record {
        println!("snapshot stored");
    }
    Ok(())
}

fn describe_hold(hold: &PublishHold) -> Vec<String> {
    match hold {
        PublishHold::Frozen { sources } => sources
            .iter()
            .map(|source| format!("frozen: {source}"))
            .collect(),
        PublishHold::Cadence {
            last_published_at,
            next_allowed_at,
        } => vec![format!(
            "cadence: last published {}, next publish allowed {}",
            fmt_time(Some(*last_published_at)),
            fmt_time(Some(*next_allowed_at))
        )],
    }
}

fn format_status(status: &FreshnessStatus) -> String {
    let age = status
        .age_hours
        .map_or_else(|| "\u{2014}".to_string(), |h| format!("{h:.1}"));
    format!(
        "{:<24}{:<8}{:<10}{:>9}  {}",
        status.source,
        status.class.as_str(),
        status.status.as_str(),
        age,
        fmt_time(status.last_updated)
    )
}

/// Format an optional timestamp for display, or a dash when `None`.
fn fmt_time(time: Option<DateTime<Utc>>) -> String {
    time.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use seoflow_core::{FeedClass, FreshnessState};

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn missing_sources_render_dashes() {
        let status = FreshnessStatus {
            source: "bookings".to_string(),
            class: FeedClass::Daily,
            last_updated: None,
            age_hours: None,
            status: FreshnessState::Missing,
            checked_at: at(9),
        };
        let line = format_status(&status);

        assert!(line.starts_with("bookings"));
        assert!(line.contains("missing"));
        assert!(line.ends_with('\u{2014}'));
    }

    #[test]
    fn fresh_sources_show_age_and_time() {
        let status = FreshnessStatus {
            source: "ad_spend".to_string(),
            class: FeedClass::Weekly,
            last_updated: Some(at(6)),
            age_hours: Some(3.0),
            status: FreshnessState::Fresh,
            checked_at: at(9),
        };
        let line = format_status(&status);

        assert!(line.contains("weekly"));
        assert!(line.contains("3.0"));
        assert!(line.ends_with("2026-03-02 06:00"));
    }

    #[test]
    fn frozen_holds_list_each_source() {
        let hold = PublishHold::Frozen {
            sources: vec!["bookings: no data".to_string(), "gsc: critical".to_string()],
        };
        assert_eq!(
            describe_hold(&hold),
            vec!["frozen: bookings: no data", "frozen: gsc: critical"]
        );
    }

    #[test]
    fn cadence_holds_name_the_next_window() {
        let hold = PublishHold::Cadence {
            last_published_at: at(1),
            next_allowed_at: at(13),
        };
        let lines = describe_hold(&hold);

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("next publish allowed 2026-03-02 13:00"));
    }
}
