//! Upward traversal from leaf API calls to locate mutual ancestors.

use std::collections::HashSet;

use cascade_model::{ApkInfo, MethodRef};

use crate::error::EmptyCallerSet;
use crate::log_macros::cd_warn;

/// Hard cap on how many levels of `upperfunc` expansion
/// [`find_mutual_parents`] will try before giving up. The source
/// hard-codes this; keeping it a parameter (with this as the default)
/// lets callers make it configurable per the design notes' open
/// question, while every call in this crate still defaults to 3.
pub const MAX_SEARCH_LAYER: u8 = 3;

/// Walk upward from `base_method` looking for paths into `target`.
///
/// Every method whose direct caller set contains `target` is recorded as
/// a "wrapper" — the immediate child of `target` on some path from
/// `base_method`. The search is depth-first and cycle-guarded: a method
/// already visited within this ascent is never revisited.
pub fn ascend(apkinfo: &dyn ApkInfo, base_method: &MethodRef, target: &MethodRef) -> Vec<MethodRef> {
    let mut visited = HashSet::new();
    let mut wrapper = Vec::new();
    ascend_inner(apkinfo, base_method, target, &mut visited, &mut wrapper);
    wrapper
}

fn ascend_inner(
    apkinfo: &dyn ApkInfo,
    base_method: &MethodRef,
    target: &MethodRef,
    visited: &mut HashSet<MethodRef>,
    wrapper: &mut Vec<MethodRef>,
) {
    visited.insert(base_method.clone());
    let callers = apkinfo.upperfunc(&base_method.class_name, &base_method.name);
    if callers.is_empty() {
        return;
    }
    if callers.contains(target) {
        wrapper.push(base_method.clone());
        return;
    }
    for caller in &callers {
        if visited.contains(caller) {
            continue;
        }
        ascend_inner(apkinfo, caller, target, visited, wrapper);
    }
}

/// Bounded breadth-expanding intersection of two caller sets.
///
/// At layer 1, intersects the direct caller sets. If empty, both sides
/// are extended by one more level of `upperfunc` and the intersection is
/// retried, up to `max_layer` total layers. Returns an empty vector
/// (the "none" outcome) if no intersection is found within the bound —
/// this is a well-defined "searched but did not find" result, distinct
/// from [`EmptyCallerSet`].
///
/// Returns `Err(EmptyCallerSet)` if either input is empty — this is not
/// "searched but did not find", it means there was nothing to search.
pub fn find_mutual_parents(
    apkinfo: &dyn ApkInfo,
    first_callers: &[MethodRef],
    second_callers: &[MethodRef],
    max_layer: u8,
) -> Result<Vec<MethodRef>, EmptyCallerSet> {
    if first_callers.is_empty() || second_callers.is_empty() {
        return Err(EmptyCallerSet);
    }

    let mut layer_a = first_callers.to_vec();
    let mut layer_b = second_callers.to_vec();
    let mut depth: u8 = 1;

    loop {
        let intersection = intersect_ordered(&layer_a, &layer_b);
        if !intersection.is_empty() {
            return Ok(intersection);
        }

        depth += 1;
        if depth > max_layer {
            cd_warn!(
                graph,
                max_layer = max_layer,
                "no mutual parent found within MAX_SEARCH_LAYER"
            );
            return Ok(Vec::new());
        }

        layer_a = extend_with_callers(apkinfo, &layer_a);
        layer_b = extend_with_callers(apkinfo, &layer_b);
    }
}

/// Intersection of `a` and `b`, preserving `b`'s order and deduplicating —
/// order must be deterministic given the same `ApkInfo`, so this avoids
/// ever iterating a `HashSet` to build the result.
fn intersect_ordered(a: &[MethodRef], b: &[MethodRef]) -> Vec<MethodRef> {
    let set_a: HashSet<&MethodRef> = a.iter().collect();
    let mut seen = HashSet::new();
    b.iter()
        .filter(|m| set_a.contains(*m) && seen.insert((*m).clone()))
        .cloned()
        .collect()
}

fn extend_with_callers(apkinfo: &dyn ApkInfo, layer: &[MethodRef]) -> Vec<MethodRef> {
    let mut extended = layer.to_vec();
    for method in layer {
        extended.extend(apkinfo.upperfunc(&method.class_name, &method.name));
    }
    extended
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_model::FixtureApkInfo;

    fn fixture_from_methods(methods: serde_json::Value, permissions: Vec<&str>) -> FixtureApkInfo {
        let doc = serde_json::json!({
            "md5": "deadbeef",
            "filename": "sample.apk",
            "filesize": 42,
            "permissions": permissions,
            "methods": methods,
        });
        FixtureApkInfo::from_json_str(&doc.to_string(), "test").unwrap()
    }

    #[test]
    fn mutual_parent_found_at_depth_three_succeeds() {
        // api0 <- a0 <- a1 <- top
        // api1 <- b0 <- b1 <- top
        let methods = serde_json::json!([
            {"class_name": "Lapi;", "name": "zero", "callers": [{"class_name": "La0;", "name": "a"}]},
            {"class_name": "La0;", "name": "a", "callers": [{"class_name": "La1;", "name": "a"}]},
            {"class_name": "La1;", "name": "a", "callers": [{"class_name": "Ltop;", "name": "run"}]},
            {"class_name": "Lapi;", "name": "one", "callers": [{"class_name": "Lb0;", "name": "b"}]},
            {"class_name": "Lb0;", "name": "b", "callers": [{"class_name": "Lb1;", "name": "b"}]},
            {"class_name": "Lb1;", "name": "b", "callers": [{"class_name": "Ltop;", "name": "run"}]},
        ]);
        let apk = fixture_from_methods(methods, vec![]);
        let api0 = MethodRef::new("Lapi;", "zero");
        let api1 = MethodRef::new("Lapi;", "one");
        let callers0 = apk.upperfunc(&api0.class_name, &api0.name);
        let callers1 = apk.upperfunc(&api1.class_name, &api1.name);

        let parents = find_mutual_parents(&apk, &callers0, &callers1, MAX_SEARCH_LAYER).unwrap();
        assert_eq!(parents, vec![MethodRef::new("Ltop;", "run")]);
    }

    #[test]
    fn mutual_parent_at_depth_four_fails_within_default_cap() {
        let methods = serde_json::json!([
            {"class_name": "Lapi;", "name": "zero", "callers": [{"class_name": "La0;", "name": "a"}]},
            {"class_name": "La0;", "name": "a", "callers": [{"class_name": "La1;", "name": "a"}]},
            {"class_name": "La1;", "name": "a", "callers": [{"class_name": "La2;", "name": "a"}]},
            {"class_name": "La2;", "name": "a", "callers": [{"class_name": "Ltop;", "name": "run"}]},
            {"class_name": "Lapi;", "name": "one", "callers": [{"class_name": "Lb0;", "name": "b"}]},
            {"class_name": "Lb0;", "name": "b", "callers": [{"class_name": "Lb1;", "name": "b"}]},
            {"class_name": "Lb1;", "name": "b", "callers": [{"class_name": "Lb2;", "name": "b"}]},
            {"class_name": "Lb2;", "name": "b", "callers": [{"class_name": "Ltop;", "name": "run"}]},
        ]);
        let apk = fixture_from_methods(methods, vec![]);
        let api0 = MethodRef::new("Lapi;", "zero");
        let api1 = MethodRef::new("Lapi;", "one");
        let callers0 = apk.upperfunc(&api0.class_name, &api0.name);
        let callers1 = apk.upperfunc(&api1.class_name, &api1.name);

        let parents = find_mutual_parents(&apk, &callers0, &callers1, MAX_SEARCH_LAYER).unwrap();
        assert!(parents.is_empty());
    }

    #[test]
    fn empty_caller_set_is_reported_distinctly() {
        let apk = fixture_from_methods(serde_json::json!([]), vec![]);
        let result = find_mutual_parents(&apk, &[], &[MethodRef::new("Lx;", "y")], MAX_SEARCH_LAYER);
        assert_eq!(result, Err(EmptyCallerSet));
    }

    #[test]
    fn cycle_in_call_graph_terminates_ascent() {
        // a calls b, b calls a — a cycle with no path to an unrelated target.
        let methods = serde_json::json!([
            {"class_name": "La;", "name": "a", "callers": [{"class_name": "Lb;", "name": "b"}]},
            {"class_name": "Lb;", "name": "b", "callers": [{"class_name": "La;", "name": "a"}]},
        ]);
        let apk = fixture_from_methods(methods, vec![]);
        let base = MethodRef::new("La;", "a");
        let target = MethodRef::new("Lunrelated;", "z");
        let wrapper = ascend(&apk, &base, &target);
        assert!(wrapper.is_empty());
    }

    #[test]
    fn direct_caller_is_recorded_as_wrapper() {
        let methods = serde_json::json!([
            {"class_name": "Lapi;", "name": "call", "callers": [{"class_name": "Lwrap;", "name": "w"}]},
            {"class_name": "Lwrap;", "name": "w", "callers": [{"class_name": "Lparent;", "name": "p"}]},
        ]);
        let apk = fixture_from_methods(methods, vec![]);
        let base = MethodRef::new("Lapi;", "call");
        let target = MethodRef::new("Lparent;", "p");
        let wrapper = ascend(&apk, &base, &target);
        assert_eq!(wrapper, vec![MethodRef::new("Lwrap;", "w")]);
    }
}
