use std::collections::BTreeSet;

use crate::instruction::Instruction;
use crate::method::MethodRef;

/// One outbound call site recorded in a method's instruction stream:
/// the (optional) call-site-local source context, the callee, and a
/// monotonic offset used to order call sites within the method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefEntry {
    pub source: Option<MethodRef>,
    pub callee: MethodRef,
    pub offset: u64,
}

/// Read-only façade over a parsed application bundle.
///
/// This is an external collaborator: parsing the bundle format itself is
/// out of scope for this crate (see the crate-level Non-goals). An
/// `ApkInfo` implementation is free to back these queries with a real
/// disassembler, a cached index, or — as [`crate::fixture::FixtureApkInfo`]
/// does — a pre-digested fixture loaded from JSON.
///
/// Implementations MUST be deterministic: the same query against the same
/// instance must always yield collections in the same order, since
/// evidence ordering in reports depends on it (see crate-level docs on
/// determinism).
pub trait ApkInfo: Send + Sync {
    fn permissions(&self) -> &BTreeSet<String>;

    /// Resolve a method by declaring class + name. Empty means
    /// unresolved — a stage-2 fail, not an error.
    fn find_method(&self, class_name: &str, method_name: &str) -> Vec<MethodRef>;

    /// Direct callers of `class_name->method_name`. Empty means the
    /// method has no known callers (including: the method itself is
    /// unresolved).
    fn upperfunc(&self, class_name: &str, method_name: &str) -> Vec<MethodRef>;

    /// Lazily disassembled instruction stream for a method's body.
    /// Implementations may defer actual bytecode decoding until this
    /// iterator is driven, since decoding can be the most expensive part
    /// of loading an `ApkInfo`.
    fn method_bytecode<'a>(&'a self, method: &MethodRef) -> Box<dyn Iterator<Item = Instruction> + 'a>;

    /// Outbound call sites of `method`, in the order the disassembler
    /// emitted them (call-site offset order is relied on by the sequence
    /// checker, so implementations should not reorder this).
    fn xref_to(&self, method: &MethodRef) -> Vec<XrefEntry>;

    fn md5(&self) -> &str;
    fn filename(&self) -> &str;
    fn filesize(&self) -> u64;
}
