//! Topic lifecycle command handlers for the CLI.

use seoflow_core::{GateResult, GateStatus, Topic, TopicStatus};
use uuid::Uuid;

use crate::context::Context;

pub(crate) async fn run_propose(
    ctx: &Context,
    org: &str,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let summary = ctx.topics.propose(&ctx.caller, org, limit).await?;

    if summary.proposed.is_empty() {
        println!(
            "no new topics proposed for {org} ({} duplicate keyword(s)); run `metrics compute` if profit data is stale",
            summary.duplicates
        );
        return Ok(());
    }

    print_topic_table(&summary.proposed);
    println!(
        "\nproposed {} topic(s), skipped {} duplicate keyword(s) (run {})",
        summary.proposed.len(),
        summary.duplicates,
        summary.run_id
    );
    Ok(())
}

pub(crate) async fn run_list(
    ctx: &Context,
    org: &str,
    status: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let status = status
        .map(str::parse::<TopicStatus>)
        .transpose()?;
    let topics = ctx.topics.list(&ctx.caller, org, status).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
        return Ok(());
    }

    if topics.is_empty() {
        println!(
            "no topics found for {org}{}; run `topics propose` first",
            status.map(|s| format!(" with status {s}")).unwrap_or_default()
        );
        return Ok(());
    }

    print_topic_table(&topics);
    println!("\n{} topic(s)", topics.len());
    Ok(())
}

pub(crate) async fn run_generate(ctx: &Context, topic_id: Uuid) -> anyhow::Result<()> {
    let outcome = ctx.topics.generate_draft(&ctx.caller, topic_id).await?;

    println!(
        "draft {} for \"{}\": {} words, gate {}, topic now {}",
        outcome.draft.id,
        truncate_title(&outcome.topic.title),
        outcome.draft.word_count,
        outcome.gate.overall_status,
        outcome.topic.status
    );
    print_gate(&outcome.gate);
    Ok(())
}

pub(crate) async fn run_approve(ctx: &Context, topic_id: Uuid) -> anyhow::Result<()> {
    let topic = ctx.topics.approve(&ctx.caller, topic_id).await?;
    println!(
        "approved \"{}\"; it will go live with the next publish",
        truncate_title(&topic.title)
    );
    Ok(())
}

pub(crate) async fn run_reject(ctx: &Context, topic_id: Uuid, reason: &str) -> anyhow::Result<()> {
    if reason.trim().is_empty() {
        anyhow::bail!("--reason must not be empty");
    }
    let topic = ctx.topics.reject(&ctx.caller, topic_id, reason).await?;
    println!("rejected \"{}\": {reason}", truncate_title(&topic.title));
    Ok(())
}

fn print_topic_table(topics: &[Topic]) {
    let header = format!(
        "{:<38}{:<10}{:<16}{:>7}{:>9}{:>6}  TITLE",
        "ID", "STATUS", "PAGE TYPE", "SCORE", "TRAFFIC", "DIFF"
    );
    println!("{header}");
    println!("{}", "-".repeat(header.len() + 40));

    for topic in topics {
        println!(
            "{:<38}{:<10}{:<16}{:>7.1}{:>9}{:>6.0}  {}",
            topic.id,
            topic.status.as_str(),
            topic.page_type.as_str(),
            topic.profit_score,
            topic.estimated_traffic,
            topic.difficulty,
            truncate_title(&topic.title),
        );
    }
}

fn print_gate(gate: &GateResult) {
    for category in &gate.categories {
        println!(
            "  {:<11}{:<6}{:>5.0}%",
            format!("{:?}", category.category).to_lowercase(),
            if category.passed { "pass" } else { "fail" },
            category.score
        );
    }
    if gate.overall_status == GateStatus::Failed {
        for reason in gate.fail_reasons() {
            println!("  fail: {reason}");
        }
    }
    for suggestion in &gate.suggestions {
        println!("  suggestion: {suggestion}");
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > 50 {
        let head: String = title.chars().take(47).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}
