//! Walkthrough outcome types.

/// Outcome of one walkthrough step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Step name, stable across runs.
    pub name: &'static str,
    /// Whether the step passed.
    pub passed: bool,
    /// What the step observed, or why it failed.
    pub detail: String,
}

/// Ordered outcomes of a walkthrough run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkthroughReport {
    pub steps: Vec<StepOutcome>,
}

impl WalkthroughReport {
    /// Returns true if every step passed.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed)
    }

    /// Number of steps that did not pass.
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Iterate over steps that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.passed)
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub(crate) fn record(&mut self, name: &'static str, passed: bool, detail: String) {
        self.steps.push(StepOutcome {
            name,
            passed,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = WalkthroughReport::default();
        assert!(report.passed());

        report.record("connect", true, "connected".to_string());
        report.record("get document", false, "document 1 not found".to_string());
        report.record("close", true, "disconnected".to_string());

        assert!(!report.passed());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.failures().next().map(|s| s.name), Some("get document"));
        assert_eq!(report.step("close").map(|s| s.passed), Some(true));
        assert!(report.step("bulk index").is_none());
    }
}
