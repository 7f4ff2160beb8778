//! Typed research state and the stage patches merged into it

use serde::Serialize;

/// Where the research loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Planning,
    Searching,
    Scraping,
    Synthesising,
    Evaluating,
    RePlanning,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Planning => "planning",
            Status::Searching => "searching",
            Status::Scraping => "scraping",
            Status::Synthesising => "synthesising",
            Status::Evaluating => "evaluating",
            Status::RePlanning => "re-planning",
            Status::Done => "done",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shared record every stage reads and patches.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchState {
    pub goal: String,
    /// Search queries produced by the planner
    pub plan: Vec<String>,
    /// URLs collected by the searcher, first-seen order, de-duplicated
    pub urls_found: Vec<String>,
    /// URLs successfully ingested so far
    pub urls_scraped: Vec<String>,
    /// One-line summaries of successful ingestions
    pub findings: Vec<String>,
    /// The synthesised markdown report
    pub report: String,
    pub iteration: u32,
    pub status: Status,
    /// Id of the Artifact node, set by the runner on success
    pub artifact_id: String,
}

impl ResearchState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            plan: Vec::new(),
            urls_found: Vec::new(),
            urls_scraped: Vec::new(),
            findings: Vec::new(),
            report: String::new(),
            iteration: 0,
            status: Status::Planning,
            artifact_id: String::new(),
        }
    }

    /// Merge a stage's patch; unset fields keep their current value.
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(plan) = patch.plan {
            self.plan = plan;
        }
        if let Some(urls_found) = patch.urls_found {
            self.urls_found = urls_found;
        }
        if let Some(urls_scraped) = patch.urls_scraped {
            self.urls_scraped = urls_scraped;
        }
        if let Some(findings) = patch.findings {
            self.findings = findings;
        }
        if let Some(report) = patch.report {
            self.report = report;
        }
        if let Some(iteration) = patch.iteration {
            self.iteration = iteration;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

/// What one stage changed. Stages return patches instead of mutating the
/// state so the runner is the only writer.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub plan: Option<Vec<String>>,
    pub urls_found: Option<Vec<String>>,
    pub urls_scraped: Option<Vec<String>>,
    pub findings: Option<Vec<String>>,
    pub report: Option<String>,
    pub iteration: Option<u32>,
    pub status: Option<Status>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_merges_only_set_fields() {
        let mut state = ResearchState::new("goal");
        state.plan = vec!["q".into()];

        state.apply(StatePatch {
            iteration: Some(2),
            status: Some(Status::Searching),
            ..Default::default()
        });

        assert_eq!(state.iteration, 2);
        assert_eq!(state.status, Status::Searching);
        assert_eq!(state.plan, vec!["q".to_string()], "untouched field kept");
        assert_eq!(state.goal, "goal");
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(Status::Done.as_str(), "done");
        assert_eq!(Status::RePlanning.as_str(), "re-planning");
        assert_eq!(Status::Synthesising.to_string(), "synthesising");
    }
}
