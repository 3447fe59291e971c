//! Production execution classifier.
//!
//! Decides which remote executions count toward business metrics. The
//! classifier is a pure function of its inputs; the verdict is persisted on
//! the execution row so it never has to be recomputed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::remote::types::{RemoteExecution, RemoteWorkflow};

static PROD_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)prod|production|live|main|master").unwrap());

static TEST_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)test|dev|debug|sample|demo|example|staging|temp|experimental").unwrap()
});

/// Narrow literal tokens scanned for in error text. Deliberately not the bare
/// word "test", so production failures whose error message mentions testing
/// are not excluded.
const TEST_INDICATOR_TOKENS: &[&str] = &["test_mode", "debug_mode", "sample_data", "demo_run"];

const PROD_TAGS: &[&str] = &["prod", "production", "live"];
const TEST_TAGS: &[&str] = &["test", "testing", "dev", "development", "staging"];

/// Tenant-specific overrides evaluated before the built-in heuristics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CustomFilters {
    /// Workflow-name patterns that force an execution to count as production.
    #[serde(default)]
    pub include_name_patterns: Vec<String>,
    /// Workflow-name patterns that force an execution out of production.
    #[serde(default)]
    pub exclude_name_patterns: Vec<String>,
    /// Exclude manually triggered executions outright.
    #[serde(default)]
    pub exclude_manual: bool,
}

impl CustomFilters {
    fn matches_any(patterns: &[String], name: &str) -> bool {
        patterns.iter().any(|pattern| {
            Regex::new(&format!("(?i){pattern}"))
                .map(|re| re.is_match(name))
                .unwrap_or(false)
        })
    }

    /// Returns a forced verdict, or `None` when no override applies.
    fn verdict(&self, execution: &RemoteExecution, workflow: Option<&RemoteWorkflow>) -> Option<bool> {
        if self.exclude_manual && execution.mode_str() == "manual" {
            return Some(false);
        }

        if let Some(workflow) = workflow {
            if Self::matches_any(&self.exclude_name_patterns, &workflow.name) {
                return Some(false);
            }
            if Self::matches_any(&self.include_name_patterns, &workflow.name) {
                return Some(true);
            }
        }

        None
    }
}

/// Classifies executions as production or not.
#[derive(Debug, Clone, Default)]
pub struct ProductionExecutionFilter;

impl ProductionExecutionFilter {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether one execution counts toward production metrics.
    ///
    /// Rules apply in order, first decisive rule wins:
    /// 1. Incomplete executions (still running, never started) are never
    ///    production.
    /// 2. Tenant custom filters may force either verdict.
    /// 3. `manual` and `retry` modes are human-triggered and never
    ///    production. Automated modes fall through to workflow context.
    /// 4. Workflow name and tag heuristics, tags overriding the name; an
    ///    inactive workflow is never production.
    /// 5. Explicit test-indicator tokens in the error text disqualify.
    /// 6. Everything else is production. Failed production executions are a
    ///    first-class signal and are included.
    pub fn is_production(
        &self,
        execution: &RemoteExecution,
        workflow: Option<&RemoteWorkflow>,
        custom_filters: Option<&CustomFilters>,
        error_text: Option<&str>,
    ) -> bool {
        if !Self::is_completed(execution) {
            return false;
        }

        if let Some(filters) = custom_filters
            && let Some(forced) = filters.verdict(execution, workflow)
        {
            return forced;
        }

        if matches!(execution.mode_str(), "manual" | "retry") {
            return false;
        }

        if let Some(workflow) = workflow
            && let Some(verdict) = Self::workflow_verdict(workflow)
        {
            return verdict;
        }

        if let Some(text) = error_text {
            let lowered = text.to_lowercase();
            if TEST_INDICATOR_TOKENS
                .iter()
                .any(|token| lowered.contains(token))
            {
                return false;
            }
        }

        true
    }

    /// Apply the classifier across a batch, keeping only production
    /// executions. Pure function of its inputs.
    pub fn filter_batch<'a>(
        &self,
        executions: &'a [RemoteExecution],
        workflows_by_id: &HashMap<String, RemoteWorkflow>,
        custom_filters: Option<&CustomFilters>,
    ) -> Vec<&'a RemoteExecution> {
        executions
            .iter()
            .filter(|execution| {
                let workflow = workflows_by_id.get(&execution.workflow_id);
                self.is_production(execution, workflow, custom_filters, execution.error_summary())
            })
            .collect()
    }

    fn is_completed(execution: &RemoteExecution) -> bool {
        execution.finished
            || execution.effective_status().is_completed()
            || (execution.started_at.is_some() && execution.stopped_at.is_some())
    }

    fn workflow_verdict(workflow: &RemoteWorkflow) -> Option<bool> {
        if !workflow.active {
            return Some(false);
        }

        // Tags are explicit intent and override the name heuristic.
        let tags = workflow.tag_names();
        if tags.iter().any(|tag| PROD_TAGS.contains(&tag.as_str())) {
            return Some(true);
        }
        if tags.iter().any(|tag| TEST_TAGS.contains(&tag.as_str())) {
            return Some(false);
        }

        if TEST_NAME_RE.is_match(&workflow.name) {
            return Some(false);
        }
        if PROD_NAME_RE.is_match(&workflow.name) {
            return Some(true);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completed_execution(mode: &str) -> RemoteExecution {
        RemoteExecution {
            id: "1".to_string(),
            workflow_id: "wf-1".to_string(),
            status: Some("success".to_string()),
            mode: Some(mode.to_string()),
            finished: true,
            started_at: Some(Utc::now()),
            stopped_at: Some(Utc::now()),
            retry_of: None,
            data: None,
        }
    }

    fn running_execution() -> RemoteExecution {
        RemoteExecution {
            id: "2".to_string(),
            workflow_id: "wf-1".to_string(),
            status: Some("running".to_string()),
            mode: Some("trigger".to_string()),
            finished: false,
            started_at: Some(Utc::now()),
            stopped_at: None,
            retry_of: None,
            data: None,
        }
    }

    fn workflow(name: &str, active: bool, tags: &[&str]) -> RemoteWorkflow {
        RemoteWorkflow {
            id: "wf-1".to_string(),
            name: name.to_string(),
            active,
            is_archived: false,
            nodes: Vec::new(),
            connections: serde_json::Map::new(),
            tags: tags
                .iter()
                .map(|t| crate::remote::types::RemoteTag {
                    id: None,
                    name: t.to_string(),
                })
                .collect(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn incomplete_executions_are_never_production() {
        let filter = ProductionExecutionFilter::new();
        assert!(!filter.is_production(&running_execution(), None, None, None));
    }

    #[test]
    fn manual_and_retry_modes_are_not_production() {
        let filter = ProductionExecutionFilter::new();
        assert!(!filter.is_production(&completed_execution("manual"), None, None, None));
        assert!(!filter.is_production(&completed_execution("retry"), None, None, None));
    }

    #[test]
    fn automated_modes_default_to_production() {
        let filter = ProductionExecutionFilter::new();
        assert!(filter.is_production(&completed_execution("webhook"), None, None, None));
        assert!(filter.is_production(&completed_execution("trigger"), None, None, None));
        // Unrecognized modes are assumed system-originated.
        assert!(filter.is_production(&completed_execution("integrated"), None, None, None));
        assert!(filter.is_production(&completed_execution("cli"), None, None, None));
    }

    #[test]
    fn failed_production_executions_are_included() {
        let filter = ProductionExecutionFilter::new();
        let mut execution = completed_execution("webhook");
        execution.status = Some("error".to_string());
        assert!(filter.is_production(&execution, None, None, None));
    }

    #[test]
    fn test_named_workflow_is_not_production() {
        let filter = ProductionExecutionFilter::new();
        let wf = workflow("Staging Deployment Check", true, &[]);
        assert!(!filter.is_production(&completed_execution("webhook"), Some(&wf), None, None));
    }

    #[test]
    fn prod_named_workflow_is_production() {
        let filter = ProductionExecutionFilter::new();
        let wf = workflow("Live Order Handler", true, &[]);
        assert!(filter.is_production(&completed_execution("webhook"), Some(&wf), None, None));
    }

    #[test]
    fn tags_override_name_heuristic() {
        let filter = ProductionExecutionFilter::new();
        // Name says test, tag says production: tag wins.
        let wf = workflow("Test Harness", true, &["production"]);
        assert!(filter.is_production(&completed_execution("webhook"), Some(&wf), None, None));

        let wf = workflow("Production Pipeline", true, &["staging"]);
        assert!(!filter.is_production(&completed_execution("webhook"), Some(&wf), None, None));
    }

    #[test]
    fn inactive_workflow_is_not_production() {
        let filter = ProductionExecutionFilter::new();
        let wf = workflow("Live Order Handler", false, &[]);
        assert!(!filter.is_production(&completed_execution("webhook"), Some(&wf), None, None));
    }

    #[test]
    fn test_indicator_tokens_disqualify() {
        let filter = ProductionExecutionFilter::new();
        let execution = completed_execution("webhook");
        assert!(!filter.is_production(&execution, None, None, Some("ran with test_mode=1")));
        assert!(!filter.is_production(&execution, None, None, Some("DEBUG_MODE enabled")));
    }

    #[test]
    fn plain_test_mention_in_error_is_kept() {
        let filter = ProductionExecutionFilter::new();
        let execution = completed_execution("webhook");
        // "test" alone is not a disqualifier.
        assert!(filter.is_production(
            &execution,
            None,
            None,
            Some("failed to contact testing endpoint")
        ));
    }

    #[test]
    fn custom_exclude_manual_forces_false() {
        let filter = ProductionExecutionFilter::new();
        let filters = CustomFilters {
            exclude_manual: true,
            ..Default::default()
        };
        assert!(!filter.is_production(&completed_execution("manual"), None, Some(&filters), None));
    }

    #[test]
    fn custom_include_pattern_overrides_heuristics() {
        let filter = ProductionExecutionFilter::new();
        let filters = CustomFilters {
            include_name_patterns: vec!["internal-billing".to_string()],
            ..Default::default()
        };
        // Name heuristic would say test, but the include override wins.
        let wf = workflow("internal-billing test copy", true, &[]);
        assert!(filter.is_production(&completed_execution("webhook"), Some(&wf), Some(&filters), None));
    }

    #[test]
    fn custom_exclude_pattern_wins_over_include() {
        let filter = ProductionExecutionFilter::new();
        let filters = CustomFilters {
            include_name_patterns: vec!["billing".to_string()],
            exclude_name_patterns: vec!["billing-sandbox".to_string()],
            ..Default::default()
        };
        let wf = workflow("billing-sandbox", true, &[]);
        assert!(!filter.is_production(&completed_execution("webhook"), Some(&wf), Some(&filters), None));
    }

    #[test]
    fn batch_filter_reads_error_text_from_the_payload() {
        let filter = ProductionExecutionFilter::new();
        let mut flagged = completed_execution("webhook");
        flagged.status = Some("error".to_string());
        flagged.data = Some(serde_json::json!({
            "resultData": {"error": {"message": "aborted: test_mode enabled"}}
        }));
        let mut clean = completed_execution("webhook");
        clean.id = "clean".to_string();
        let executions = vec![flagged, clean];

        let kept = filter.filter_batch(&executions, &HashMap::new(), None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "clean");
    }

    #[test]
    fn batch_filter_is_pure_and_keeps_production_only() {
        let filter = ProductionExecutionFilter::new();
        let executions = vec![
            completed_execution("webhook"),
            completed_execution("manual"),
            running_execution(),
        ];
        let mut workflows = HashMap::new();
        workflows.insert("wf-1".to_string(), workflow("Main Pipeline", true, &[]));

        let first = filter.filter_batch(&executions, &workflows, None);
        let second = filter.filter_batch(&executions, &workflows, None);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, executions[0].id);
        assert_eq!(first.len(), second.len());
    }
}
