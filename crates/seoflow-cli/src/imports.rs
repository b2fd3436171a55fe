//! Feed import command handlers for the CLI.
//!
//! Files are read as raw CSV rows. Header detection, column aliases, and
//! value coercion all happen in the ingestion engine, so the same bytes
//! behave identically through the CLI and the HTTP API.

use std::path::Path;

use anyhow::Context as _;
use seoflow_core::RowIssue;
use seoflow_ingest::{FeedRequest, ImportSummary};
use uuid::Uuid;

use crate::context::Context;

/// Issues printed per category before the rest are summarised.
const ISSUE_PREVIEW: usize = 10;

/// Read every record of a CSV file, the header included, as raw strings.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid CSV.
pub(crate) fn read_feed(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

pub(crate) async fn run_import_bookings(
    ctx: &Context,
    file: &Path,
    org: &str,
    label: &str,
    allow_overwrite: bool,
) -> anyhow::Result<()> {
    let rows = read_feed(file)?;
    let mut request = FeedRequest::new(org, label, rows);
    if allow_overwrite {
        request = request.allow_overwrite();
    }
    let summary = ctx.ingest.import_booking_feed(&ctx.caller, request).await?;
    print_summary(&summary);
    Ok(())
}

pub(crate) async fn run_import_ads(
    ctx: &Context,
    file: &Path,
    org: &str,
    label: &str,
) -> anyhow::Result<()> {
    let rows = read_feed(file)?;
    let summary = ctx
        .ingest
        .import_ad_spend_feed(&ctx.caller, FeedRequest::new(org, label, rows))
        .await?;
    print_summary(&summary);
    Ok(())
}

pub(crate) async fn run_rollback(ctx: &Context, import_id: Uuid) -> anyhow::Result<()> {
    let outcome = ctx.ingest.rollback(&ctx.caller, import_id).await?;
    println!(
        "rolled back import {}: deleted {} record(s)",
        outcome.import_id, outcome.deleted_count
    );
    Ok(())
}

pub(crate) async fn run_list(ctx: &Context, limit: i64) -> anyhow::Result<()> {
    let runs = ctx.ingest.list_imports(&ctx.caller, limit).await?;

    if runs.is_empty() {
        println!("no imports found; run `import bookings` first");
        return Ok(());
    }

    let header = format!(
        "{:<38}{:<10}{:<12}{:<13}{:>8}{:>8}{:>8}  {:<17}LABEL",
        "ID", "TYPE", "STATUS", "ORG", "ROWS", "NEW", "ERRORS", "STARTED"
    );
    println!("{header}");
    println!("{}", "-".repeat(header.len() + 10));

    for run in &runs {
        println!(
            "{:<38}{:<10}{:<12}{:<13}{:>8}{:>8}{:>8}  {:<17}{}",
            run.id,
            run.feed_type.as_str(),
            run.status.as_str(),
            truncate(&run.org, 12),
            run.total_rows,
            run.imported_count,
            run.error_count,
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.source_label,
        );
    }

    println!("\n{} import(s) shown", runs.len());
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "import {} ({}) {}: {} row(s), {} imported, {} updated, {} skipped, {} error(s), {} warning(s)",
        summary.import_id,
        summary.feed_type,
        summary.status,
        summary.total_records,
        summary.imported,
        summary.updated,
        summary.skipped,
        summary.errors,
        summary.warnings,
    );
    print_issues("error", &summary.error_details);
    print_issues("warning", &summary.warning_details);
}

fn print_issues(kind: &str, issues: &[RowIssue]) {
    for issue in issues.iter().take(ISSUE_PREVIEW) {
        println!("  {}", format_issue(kind, issue));
    }
    if issues.len() > ISSUE_PREVIEW {
        println!("  ... {} more {kind}(s)", issues.len() - ISSUE_PREVIEW);
    }
}

fn format_issue(kind: &str, issue: &RowIssue) -> String {
    format!("{kind}: row {} {}: {}", issue.row, issue.field, issue.message)
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}
