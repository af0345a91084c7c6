//! Per-run accumulator of evidence and scores across all evaluated rules.

use cascade_model::{CheckItem, MethodRef, Rule};
use serde::Serialize;

/// `{class, method}` pair as rendered into a JSON report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiEntry {
    pub class: String,
    pub method: String,
}

impl From<&MethodRef> for ApiEntry {
    fn from(m: &MethodRef) -> Self {
        Self {
            class: m.class_name.clone(),
            method: m.name.clone(),
        }
    }
}

/// Evidence for one confirmed stage-5 (same-parameter) match: the parent
/// method, which wrapper on each side carried the shared value, and the
/// rule that triggered it — enough to render a call-graph diagram later.
#[derive(Debug, Clone, PartialEq)]
pub struct CallGraphEvidence {
    pub parent: MethodRef,
    pub first_call: MethodRef,
    pub second_call: MethodRef,
    pub first_api: MethodRef,
    pub second_api: MethodRef,
    pub crime: String,
}

/// One rule's outcome, shaped for the `"crimes"` array of the JSON
/// report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrimeReport {
    pub crime: String,
    pub score: f64,
    pub weight: f64,
    pub confidence: String,
    pub permissions: Vec<String>,
    pub native_api: Vec<ApiEntry>,
    pub combination: Vec<ApiEntry>,
    pub sequence: Vec<ApiEntry>,
    pub register: Vec<ApiEntry>,
}

/// Aggregate of per-rule results across an entire run.
///
/// `level_2_result`, `first_api`, `second_api`, `level_4_result`,
/// `level_5_result`, and `call_graph_analysis_list` are transient —
/// [`clean`](Self::clean) resets them before each rule's cascade starts.
/// `json_report`, `score_sum`, and `weight_sum` accumulate across the
/// whole run and are never reset by `clean`.
#[derive(Debug, Default)]
pub struct AnalysisState {
    pub level_2_result: Vec<MethodRef>,
    pub first_api: Option<MethodRef>,
    pub second_api: Option<MethodRef>,
    pub level_4_result: Vec<MethodRef>,
    pub level_5_result: Vec<MethodRef>,
    pub call_graph_analysis_list: Vec<CallGraphEvidence>,
    pub json_report: Vec<CrimeReport>,
    pub score_sum: f64,
    pub weight_sum: f64,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-rule transient fields, preserving `json_report`,
    /// `score_sum`, and `weight_sum`.
    pub fn clean(&mut self) {
        self.level_2_result.clear();
        self.first_api = None;
        self.second_api = None;
        self.level_4_result.clear();
        self.level_5_result.clear();
        self.call_graph_analysis_list.clear();
    }

    /// Merge another run's accumulated state into this one, in rule
    /// order — the reduce step for cross-rule parallel evaluation, where
    /// each rule owns a private `AnalysisState` during its own cascade.
    pub fn merge(&mut self, mut other: AnalysisState) {
        self.json_report.append(&mut other.json_report);
        self.call_graph_analysis_list
            .append(&mut other.call_graph_analysis_list);
        self.score_sum += other.score_sum;
        self.weight_sum += other.weight_sum;
    }

    /// Finalize one rule's cascade: compute its score/weight
    /// contribution, build the `CrimeReport`, and fold both into the
    /// running totals.
    ///
    /// `score_sum` only gains `rule.yscore` when the rule cleared all
    /// five stages; `weight_sum` always gains `rule.score_for(n_passed)`.
    pub fn finish_rule(&mut self, rule: &Rule, check_item: CheckItem) {
        let n_passed = check_item.popcount();
        let weight = rule.score_for(n_passed);
        let score = if n_passed == 5 { rule.yscore } else { 0.0 };

        let permissions = if check_item.passed(0) {
            rule.permissions.iter().cloned().collect()
        } else {
            Vec::new()
        };
        let native_api = if check_item.passed(1) {
            self.level_2_result.iter().map(ApiEntry::from).collect()
        } else {
            Vec::new()
        };
        let combination = if check_item.passed(2) {
            vec![
                ApiEntry::from(rule.first_api()),
                ApiEntry::from(rule.second_api()),
            ]
        } else {
            Vec::new()
        };
        let sequence = if check_item.passed(3) {
            self.level_4_result.iter().map(ApiEntry::from).collect()
        } else {
            Vec::new()
        };
        let register = if check_item.passed(4) {
            self.level_5_result.iter().map(ApiEntry::from).collect()
        } else {
            Vec::new()
        };

        self.json_report.push(CrimeReport {
            crime: rule.crime.clone(),
            score,
            weight,
            confidence: format!("{}%", check_item.confidence_percent()),
            permissions,
            native_api,
            combination,
            sequence,
            register,
        });

        self.score_sum += score;
        self.weight_sum += weight;
    }
}
