use seoflow_core::{CategoryResult, GateCategory, GateIssue, Severity};

/// Collects check outcomes for one category. Each check records at most one
/// issue.
pub(crate) struct CategoryCheck {
    category: GateCategory,
    checks_run: u32,
    issues: Vec<GateIssue>,
}

impl CategoryCheck {
    pub(crate) fn new(category: GateCategory) -> Self {
        Self {
            category,
            checks_run: 0,
            issues: Vec::new(),
        }
    }

    pub(crate) fn pass(&mut self) {
        self.checks_run += 1;
    }

    pub(crate) fn warn(&mut self, check: &str, message: impl Into<String>) {
        self.issue(check, Severity::Warn, message.into());
    }

    pub(crate) fn fail(&mut self, check: &str, message: impl Into<String>) {
        self.issue(check, Severity::Fail, message.into());
    }

    fn issue(&mut self, check: &str, severity: Severity, message: String) {
        self.checks_run += 1;
        self.issues.push(GateIssue {
            check: check.to_string(),
            severity,
            message,
        });
    }

    pub(crate) fn finish(self) -> CategoryResult {
        let clean = self.checks_run.saturating_sub(u32::try_from(self.issues.len()).unwrap_or(u32::MAX));
        let score = if self.checks_run == 0 {
            100.0
        } else {
            f64::from(clean) / f64::from(self.checks_run) * 100.0
        };
        CategoryResult {
            category: self.category,
            passed: !self.issues.iter().any(|i| i.severity == Severity::Fail),
            score,
            checks_run: self.checks_run,
            issues: self.issues,
        }
    }
}
