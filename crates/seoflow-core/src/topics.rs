//! Content topics, their drafts, gate evaluations, and publish audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, SegmentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Proposed,
    Draft,
    Ready,
    Published,
    Blocked,
    Rejected,
}

impl TopicStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TopicStatus::Proposed => "proposed",
            TopicStatus::Draft => "draft",
            TopicStatus::Ready => "ready",
            TopicStatus::Published => "published",
            TopicStatus::Blocked => "blocked",
            TopicStatus::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TopicStatus::Published | TopicStatus::Rejected)
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TopicStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(TopicStatus::Proposed),
            "draft" => Ok(TopicStatus::Draft),
            "ready" => Ok(TopicStatus::Ready),
            "published" => Ok(TopicStatus::Published),
            "blocked" => Ok(TopicStatus::Blocked),
            "rejected" => Ok(TopicStatus::Rejected),
            _ => Err(CoreError::UnknownVariant {
                kind: "topic status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    City,
    Service,
    Vehicle,
    Blog,
}

impl PageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::City => "city",
            PageType::Service => "service",
            PageType::Vehicle => "vehicle",
            PageType::Blog => "blog",
        }
    }

    /// Page type seeded for a topic proposed from a segment of this type.
    #[must_use]
    pub fn for_segment(segment_type: SegmentType) -> Self {
        match segment_type {
            SegmentType::City => PageType::City,
            SegmentType::VehicleType => PageType::Vehicle,
            SegmentType::ServiceType | SegmentType::BookingType => PageType::Service,
        }
    }

    #[must_use]
    pub fn is_location_page(self) -> bool {
        matches!(self, PageType::City)
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "city" => Ok(PageType::City),
            "service" => Ok(PageType::Service),
            "vehicle" => Ok(PageType::Vehicle),
            "blog" => Ok(PageType::Blog),
            _ => Err(CoreError::UnknownVariant {
                kind: "page type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lowercase, trim, and collapse inner whitespace so keyword uniqueness
/// ignores cosmetic differences.
#[must_use]
pub fn normalize_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub org: String,
    pub title: String,
    pub slug: String,
    pub page_type: PageType,
    pub site_slug: String,
    pub primary_keyword: String,
    pub normalized_keyword: String,
    pub secondary_keywords: Vec<String>,
    pub target_url: String,
    pub status: TopicStatus,
    /// 0–100.
    pub profit_score: f64,
    pub estimated_traffic: i64,
    /// 0–100.
    pub difficulty: f64,
    pub segment_type: Option<SegmentType>,
    pub segment_value: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Hero,
    Gallery,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftImage {
    pub url: String,
    pub alt: Option<String>,
    pub role: ImageRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaKind {
    Primary,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallToAction {
    pub kind: CtaKind,
    pub label: String,
    pub href: String,
    pub above_fold: bool,
}

/// Output of the external content generator. Body is markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub body: String,
    pub meta_title: String,
    pub meta_description: String,
    pub h1: String,
    #[serde(default)]
    pub internal_links: Vec<String>,
    #[serde(default)]
    pub images: Vec<DraftImage>,
    #[serde(default)]
    pub ctas: Vec<CallToAction>,
}

impl DraftContent {
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.body
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub content: DraftContent,
    pub word_count: i64,
    pub generated_at: DateTime<Utc>,
}

/// A live page as seen by the gate's duplicate-intent and doorway checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPage {
    pub topic_id: Uuid,
    pub page_type: PageType,
    pub target_url: String,
    pub segment_value: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Warned,
    Failed,
}

impl GateStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Passed => "passed",
            GateStatus::Warned => "warned",
            GateStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCategory {
    Content,
    Technical,
    Image,
    Ux,
    AntiSpam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateIssue {
    pub check: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: GateCategory,
    pub passed: bool,
    /// Share of checks in this category without an issue, 0–100.
    pub score: f64,
    pub checks_run: u32,
    pub issues: Vec<GateIssue>,
}

/// Immutable outcome of evaluating one draft. Drafts accumulate these; the
/// newest is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub draft_id: Uuid,
    pub categories: Vec<CategoryResult>,
    pub overall_status: GateStatus,
    pub suggestions: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl GateResult {
    /// Messages of every fail-severity issue, prefixed by check name.
    #[must_use]
    pub fn fail_reasons(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| c.issues.iter())
            .filter(|i| i.severity == Severity::Fail)
            .map(|i| format!("{}: {}", i.check, i.message))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTopic {
    pub topic_id: Uuid,
    pub reason: String,
}

/// Append-only proof of what went live in one publish run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishManifest {
    pub id: Uuid,
    pub org: String,
    pub published_at: DateTime<Utc>,
    pub topic_ids: Vec<Uuid>,
    pub published_count: i64,
    pub candidate_count: i64,
    pub skipped: Vec<SkippedTopic>,
    pub published_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeoRunKind {
    Propose,
    Gate,
    Publish,
}

impl SeoRunKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SeoRunKind::Propose => "propose",
            SeoRunKind::Gate => "gate",
            SeoRunKind::Publish => "publish",
        }
    }
}

impl std::str::FromStr for SeoRunKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propose" => Ok(SeoRunKind::Propose),
            "gate" => Ok(SeoRunKind::Gate),
            "publish" => Ok(SeoRunKind::Publish),
            _ => Err(CoreError::UnknownVariant {
                kind: "seo run kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Audit entry for one propose, gate, or publish invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoRun {
    pub id: Uuid,
    pub org: String,
    pub kind: SeoRunKind,
    /// `passed`, `warned`, `failed`, `completed`, or `held`.
    pub status: String,
    pub items_processed: i64,
    pub items_failed: i64,
    pub fail_reasons: Vec<String>,
    pub triggered_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keyword_trims_and_lowercases() {
        assert_eq!(
            normalize_keyword("  Austin   Airport  LIMO "),
            "austin airport limo"
        );
        assert_eq!(normalize_keyword(""), "");
    }

    #[test]
    fn word_count_ignores_markdown_punctuation() {
        let content = DraftContent {
            body: "# Title\n\nOne two - three **four**".to_string(),
            meta_title: String::new(),
            meta_description: String::new(),
            h1: String::new(),
            internal_links: vec![],
            images: vec![],
            ctas: vec![],
        };
        assert_eq!(content.word_count(), 5);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TopicStatus::Published.is_terminal());
        assert!(TopicStatus::Rejected.is_terminal());
        assert!(!TopicStatus::Blocked.is_terminal());
    }
}
