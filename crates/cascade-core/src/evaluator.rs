//! The five-stage cascade that decides whether a single rule fires
//! against an `ApkInfo`, plus the parallel-across-rules entry point.

use rayon::prelude::*;

use cascade_model::rule::{
    STAGE_API_PRESENCE_BOTH, STAGE_API_PRESENCE_EITHER, STAGE_PERMISSION, STAGE_SAME_PARAMETER,
    STAGE_SEQUENCE,
};
use cascade_model::{ApkInfo, CheckItem, MethodRef, Rule};

use crate::analysis::{AnalysisState, CallGraphEvidence};
use crate::callgraph::{ascend, find_mutual_parents, MAX_SEARCH_LAYER};
use crate::error::EmptyCallerSet;
use crate::log_macros::cd_debug;
use crate::sequence::check_sequence;
use crate::symbolic::SymbolicEvaluator;

/// Runs one rule's cascade against one `ApkInfo`, recording evidence into
/// `analysis` and returning the stages it cleared.
///
/// Stages are evaluated in strict order and the cascade stops at the
/// first one that fails, per [`CheckItem`]'s invariant. `analysis` is
/// [cleaned](AnalysisState::clean) at the start of every call, since each
/// rule owns its own transient evidence.
///
/// Stages 4 and 5 are checked independently for every mutual parent found
/// at stage 3 — one parent failing the sequence or same-parameter check
/// never stops the others from being evaluated, so `level_4_result`,
/// `level_5_result`, and `call_graph_analysis_list` can all gain more than
/// one entry.
pub fn run(apkinfo: &dyn ApkInfo, rule: &Rule, analysis: &mut AnalysisState) -> CheckItem {
    analysis.clean();
    let mut check_item = CheckItem::default();

    if !has_required_permissions(apkinfo, rule) {
        return check_item;
    }
    check_item.set(STAGE_PERMISSION);
    cd_debug!(stage, rule = %rule.crime, "permission check passed");

    let first_candidates = apkinfo.find_method(&rule.first_api().class_name, &rule.first_api().name);
    let second_candidates =
        apkinfo.find_method(&rule.second_api().class_name, &rule.second_api().name);

    if first_candidates.is_empty() && second_candidates.is_empty() {
        return check_item;
    }
    check_item.set(STAGE_API_PRESENCE_EITHER);
    analysis.level_2_result = first_candidates
        .iter()
        .chain(second_candidates.iter())
        .cloned()
        .collect();

    if first_candidates.is_empty() || second_candidates.is_empty() {
        return check_item;
    }
    check_item.set(STAGE_API_PRESENCE_BOTH);
    cd_debug!(stage, rule = %rule.crime, "both native APIs resolved");

    analysis.first_api = Some(rule.first_api().clone());
    analysis.second_api = Some(rule.second_api().clone());

    let first_callers = callers_of_all(apkinfo, &first_candidates);
    let second_callers = callers_of_all(apkinfo, &second_candidates);

    let mutual_parents = match find_mutual_parents(apkinfo, &first_callers, &second_callers, MAX_SEARCH_LAYER) {
        Ok(parents) => parents,
        Err(EmptyCallerSet) => {
            cd_debug!(graph, rule = %rule.crime, "empty caller set, no mutual parent to search");
            Vec::new()
        }
    };

    if mutual_parents.is_empty() {
        return check_item;
    }

    for parent in &mutual_parents {
        let mut parent_cleared_sequence = false;
        let mut parent_evidence: Option<CallGraphEvidence> = None;

        'search: for first_api in &first_candidates {
            let first_wrappers = ascend(apkinfo, first_api, parent);
            if first_wrappers.is_empty() {
                continue;
            }
            for second_api in &second_candidates {
                let second_wrappers = ascend(apkinfo, second_api, parent);
                if second_wrappers.is_empty() {
                    continue;
                }
                if !check_sequence(apkinfo, parent, &first_wrappers, &second_wrappers) {
                    continue;
                }

                parent_cleared_sequence = true;

                if let Some(mut evidence) =
                    find_shared_parameter(apkinfo, parent, &first_wrappers, &second_wrappers)
                {
                    evidence.first_api = first_api.clone();
                    evidence.second_api = second_api.clone();
                    evidence.crime = rule.crime.clone();
                    parent_evidence = Some(evidence);
                    break 'search;
                }
            }
        }

        if parent_cleared_sequence {
            check_item.set(STAGE_SEQUENCE);
            analysis.level_4_result.push(parent.clone());
        }

        if let Some(evidence) = parent_evidence {
            check_item.set(STAGE_SAME_PARAMETER);
            cd_debug!(stage, rule = %rule.crime, parent = %evidence.parent, "shared value reached both APIs");
            analysis.level_5_result.push(evidence.parent.clone());
            analysis.call_graph_analysis_list.push(evidence);
        }
    }

    check_item
}

fn has_required_permissions(apkinfo: &dyn ApkInfo, rule: &Rule) -> bool {
    rule.permissions
        .iter()
        .all(|p| apkinfo.permissions().contains(p))
}

fn callers_of_all(apkinfo: &dyn ApkInfo, methods: &[MethodRef]) -> Vec<MethodRef> {
    methods
        .iter()
        .flat_map(|m| apkinfo.upperfunc(&m.class_name, &m.name))
        .collect()
}

/// Feed `parent`'s bytecode through the symbolic evaluator and look for a
/// value object reached as an argument by some wrapper on each side — the
/// stage-5 "same parameter" evidence.
fn find_shared_parameter(
    apkinfo: &dyn ApkInfo,
    parent: &MethodRef,
    first_wrappers: &[MethodRef],
    second_wrappers: &[MethodRef],
) -> Option<CallGraphEvidence> {
    let mut evaluator = SymbolicEvaluator::new();
    for instr in apkinfo.method_bytecode(parent) {
        evaluator.feed(&instr);
    }

    for obj in evaluator.observations() {
        let matched_first = first_wrappers
            .iter()
            .find(|w| obj.called_by_func.contains(&w.render_key()));
        let matched_second = second_wrappers
            .iter()
            .find(|w| obj.called_by_func.contains(&w.render_key()));
        if let (Some(first_call), Some(second_call)) = (matched_first, matched_second) {
            return Some(CallGraphEvidence {
                parent: parent.clone(),
                first_call: first_call.clone(),
                second_call: second_call.clone(),
                first_api: first_call.clone(),
                second_api: second_call.clone(),
                crime: String::new(),
            });
        }
    }
    None
}

/// Evaluate every rule against `apkinfo`, running independent rules in
/// parallel and folding their private [`AnalysisState`]s together in rule
/// order once all complete.
pub fn evaluate_rules(apkinfo: &dyn ApkInfo, rules: &[Rule]) -> AnalysisState {
    rules
        .par_iter()
        .map(|rule| {
            let mut state = AnalysisState::new();
            let check_item = run(apkinfo, rule, &mut state);
            state.finish_rule(rule, check_item);
            state
        })
        .reduce(AnalysisState::new, |mut acc, next| {
            acc.merge(next);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_model::FixtureApkInfo;
    use std::collections::BTreeSet;

    fn rule() -> Rule {
        Rule {
            crime: "exfiltrate via sms after building a message".into(),
            permissions: BTreeSet::from(["android.permission.SEND_SMS".to_string()]),
            api_pair: [
                MethodRef::new("Landroid/telephony/SmsManager;", "sendTextMessage"),
                MethodRef::new("Ljava/net/URL;", "openConnection"),
            ],
            weight: 5.0,
            yscore: 1.0,
        }
    }

    fn fixture(doc: serde_json::Value) -> FixtureApkInfo {
        FixtureApkInfo::from_json_str(&doc.to_string(), "test").unwrap()
    }

    #[test]
    fn missing_permission_stops_at_stage_one() {
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": [],
            "methods": [],
        }));
        let mut analysis = AnalysisState::new();
        let check = run(&apk, &rule(), &mut analysis);
        assert_eq!(check.popcount(), 0);
    }

    #[test]
    fn unresolved_apis_stop_at_stage_two() {
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": [],
        }));
        let mut analysis = AnalysisState::new();
        let check = run(&apk, &rule(), &mut analysis);
        assert_eq!(check.popcount(), 1);
    }

    #[test]
    fn full_cascade_reaches_stage_five_when_wrappers_share_a_value() {
        let r = rule();
        let first = r.first_api();
        let second = r.second_api();

        let methods = serde_json::json!([
            {
                "class_name": first.class_name, "name": first.name,
                "callers": [{"class_name": "Lwrap/First;", "name": "go"}],
            },
            {
                "class_name": second.class_name, "name": second.name,
                "callers": [{"class_name": "Lwrap/Second;", "name": "go"}],
            },
            {
                "class_name": "Lwrap/First;", "name": "go",
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": "Lwrap/Second;", "name": "go",
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": "Lparent;", "name": "run",
                "bytecode": [
                    {"mnemonic": "new-instance", "registers": ["v0"], "parameter": "Ldata;"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/First;->go"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/Second;->go"},
                ],
                "xref_to": [
                    {"callee": {"class_name": "Lwrap/First;", "name": "go"}, "offset": 1},
                    {"callee": {"class_name": "Lwrap/Second;", "name": "go"}, "offset": 2},
                ],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let mut analysis = AnalysisState::new();
        let check = run(&apk, &r, &mut analysis);
        assert_eq!(check.popcount(), 5);
        assert_eq!(analysis.call_graph_analysis_list.len(), 1);
        assert_eq!(
            analysis.call_graph_analysis_list[0].parent,
            MethodRef::new("Lparent;", "run")
        );
    }

    #[test]
    fn only_one_api_resolving_still_populates_native_api() {
        let r = rule();
        let first = r.first_api();

        let methods = serde_json::json!([
            {
                "class_name": first.class_name, "name": first.name,
                "callers": [],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let mut analysis = AnalysisState::new();
        let check = run(&apk, &r, &mut analysis);
        assert_eq!(check.popcount(), 1);
        assert!(check.passed(1));
        assert!(!check.passed(2));
        assert_eq!(analysis.level_2_result, vec![first.clone()]);
    }

    #[test]
    fn both_apis_present_with_no_mutual_parent_stops_at_stage_three() {
        let r = rule();
        let first = r.first_api();
        let second = r.second_api();

        let methods = serde_json::json!([
            {
                "class_name": first.class_name, "name": first.name,
                "callers": [{"class_name": "Lcaller/A;", "name": "run"}],
            },
            {
                "class_name": second.class_name, "name": second.name,
                "callers": [{"class_name": "Lcaller/B;", "name": "run"}],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let mut analysis = AnalysisState::new();
        let check = run(&apk, &r, &mut analysis);
        assert_eq!(check.popcount(), 3);
        assert_eq!(analysis.level_2_result.len(), 2);
    }

    #[test]
    fn mutual_parent_with_calls_in_wrong_order_stops_at_stage_three() {
        let r = rule();
        let first = r.first_api();
        let second = r.second_api();

        let methods = serde_json::json!([
            {
                "class_name": first.class_name, "name": first.name,
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": second.class_name, "name": second.name,
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": "Lparent;", "name": "run",
                "xref_to": [
                    {"callee": {"class_name": second.class_name, "name": second.name}, "offset": 1},
                    {"callee": {"class_name": first.class_name, "name": first.name}, "offset": 2},
                ],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let mut analysis = AnalysisState::new();
        let check = run(&apk, &r, &mut analysis);
        assert_eq!(check.popcount(), 3);
        assert!(analysis.level_4_result.is_empty());
    }

    #[test]
    fn correct_order_without_shared_register_stops_at_stage_four() {
        let r = rule();
        let first = r.first_api();
        let second = r.second_api();

        let methods = serde_json::json!([
            {
                "class_name": first.class_name, "name": first.name,
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": second.class_name, "name": second.name,
                "callers": [{"class_name": "Lparent;", "name": "run"}],
            },
            {
                "class_name": "Lparent;", "name": "run",
                "bytecode": [
                    {"mnemonic": "new-instance", "registers": ["v0"], "parameter": "Ldata;"},
                    {"mnemonic": "new-instance", "registers": ["v1"], "parameter": "Lother;"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": format!("{}->{}", first.class_name, first.name)},
                    {"mnemonic": "invoke-virtual", "registers": ["v1"], "parameter": format!("{}->{}", second.class_name, second.name)},
                ],
                "xref_to": [
                    {"callee": {"class_name": first.class_name, "name": first.name}, "offset": 1},
                    {"callee": {"class_name": second.class_name, "name": second.name}, "offset": 2},
                ],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let mut analysis = AnalysisState::new();
        let check = run(&apk, &r, &mut analysis);
        assert_eq!(check.popcount(), 4);
        assert_eq!(analysis.level_4_result, vec![MethodRef::new("Lparent;", "run")]);
        assert!(analysis.level_5_result.is_empty());
    }

    #[test]
    fn evaluate_rules_merges_totals_across_rules() {
        let r = rule();
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": [],
            "methods": [],
        }));
        let state = evaluate_rules(&apk, std::slice::from_ref(&r));
        assert_eq!(state.json_report.len(), 1);
        assert_eq!(state.score_sum, 0.0);
    }

    #[test]
    fn evaluate_rules_merges_call_graph_evidence_across_rules() {
        let rule_a = rule();
        let rule_b = Rule {
            crime: "leak contacts over a socket".into(),
            permissions: BTreeSet::from(["android.permission.SEND_SMS".to_string()]),
            api_pair: [
                MethodRef::new("Landroid/content/ContentResolver;", "query"),
                MethodRef::new("Ljava/net/Socket;", "getOutputStream"),
            ],
            weight: 5.0,
            yscore: 1.0,
        };

        let methods = serde_json::json!([
            {
                "class_name": rule_a.first_api().class_name, "name": rule_a.first_api().name,
                "callers": [{"class_name": "Lwrap/A0;", "name": "go"}],
            },
            {
                "class_name": rule_a.second_api().class_name, "name": rule_a.second_api().name,
                "callers": [{"class_name": "Lwrap/A1;", "name": "go"}],
            },
            {
                "class_name": "Lwrap/A0;", "name": "go",
                "callers": [{"class_name": "Lparent/A;", "name": "run"}],
            },
            {
                "class_name": "Lwrap/A1;", "name": "go",
                "callers": [{"class_name": "Lparent/A;", "name": "run"}],
            },
            {
                "class_name": "Lparent/A;", "name": "run",
                "bytecode": [
                    {"mnemonic": "new-instance", "registers": ["v0"], "parameter": "Ldata;"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/A0;->go"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/A1;->go"},
                ],
                "xref_to": [
                    {"callee": {"class_name": "Lwrap/A0;", "name": "go"}, "offset": 1},
                    {"callee": {"class_name": "Lwrap/A1;", "name": "go"}, "offset": 2},
                ],
            },
            {
                "class_name": rule_b.first_api().class_name, "name": rule_b.first_api().name,
                "callers": [{"class_name": "Lwrap/B0;", "name": "go"}],
            },
            {
                "class_name": rule_b.second_api().class_name, "name": rule_b.second_api().name,
                "callers": [{"class_name": "Lwrap/B1;", "name": "go"}],
            },
            {
                "class_name": "Lwrap/B0;", "name": "go",
                "callers": [{"class_name": "Lparent/B;", "name": "run"}],
            },
            {
                "class_name": "Lwrap/B1;", "name": "go",
                "callers": [{"class_name": "Lparent/B;", "name": "run"}],
            },
            {
                "class_name": "Lparent/B;", "name": "run",
                "bytecode": [
                    {"mnemonic": "new-instance", "registers": ["v0"], "parameter": "Ldata;"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/B0;->go"},
                    {"mnemonic": "invoke-virtual", "registers": ["v0"], "parameter": "Lwrap/B1;->go"},
                ],
                "xref_to": [
                    {"callee": {"class_name": "Lwrap/B0;", "name": "go"}, "offset": 1},
                    {"callee": {"class_name": "Lwrap/B1;", "name": "go"}, "offset": 2},
                ],
            },
        ]);
        let apk = fixture(serde_json::json!({
            "md5": "x", "filename": "x.apk", "filesize": 1,
            "permissions": ["android.permission.SEND_SMS"],
            "methods": methods,
        }));

        let state = evaluate_rules(&apk, &[rule_a, rule_b]);
        assert_eq!(state.json_report.len(), 2);
        assert_eq!(state.call_graph_analysis_list.len(), 2);
        let parents: BTreeSet<String> = state
            .call_graph_analysis_list
            .iter()
            .map(|e| e.parent.render_key())
            .collect();
        assert_eq!(
            parents,
            BTreeSet::from([
                "Lparent/A;->run".to_string(),
                "Lparent/B;->run".to_string()
            ])
        );
    }
}
