//! Decide whether one call precedes another in a mutual parent's
//! instruction stream.

use cascade_model::{ApkInfo, MethodRef};

/// True if some `(w0 in first_wrappers, w1 in second_wrappers)` pair
/// appears in `parent`'s outbound call sites with `w0` strictly before
/// `w1`, by call-site offset.
///
/// Retains only the call sites whose callee is `w0` or `w1`, sorts by
/// offset, and checks whether the callee sequence contains `[w0, w1]` as
/// a subsequence. Using offsets rather than source order tolerates
/// basic-block rearrangement while staying linear in call-site count.
pub fn check_sequence(
    apkinfo: &dyn ApkInfo,
    parent: &MethodRef,
    first_wrappers: &[MethodRef],
    second_wrappers: &[MethodRef],
) -> bool {
    let xrefs = apkinfo.xref_to(parent);

    for w0 in first_wrappers {
        for w1 in second_wrappers {
            let mut seq_table: Vec<(&MethodRef, u64)> = xrefs
                .iter()
                .filter(|x| &x.callee == w0 || &x.callee == w1)
                .map(|x| (&x.callee, x.offset))
                .collect();

            if seq_table.len() < 2 {
                continue;
            }
            seq_table.sort_by_key(|(_, offset)| *offset);

            let callees: Vec<&MethodRef> = seq_table.into_iter().map(|(c, _)| c).collect();
            if contains_subsequence(&callees, &[w0, w1]) {
                return true;
            }
        }
    }

    false
}

/// True if `pattern` appears as a (not necessarily contiguous)
/// subsequence of `haystack`, in order.
fn contains_subsequence(haystack: &[&MethodRef], pattern: &[&MethodRef]) -> bool {
    let mut pat_iter = pattern.iter();
    let Some(mut want) = pat_iter.next() else {
        return true;
    };
    for item in haystack {
        if *item == *want {
            match pat_iter.next() {
                Some(next_want) => want = next_want,
                None => return true,
            }
        }
    }
    false
}
