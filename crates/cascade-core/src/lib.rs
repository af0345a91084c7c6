//! The five-stage malicious-behavior detection cascade: call-graph
//! search, bytecode sequence checking, and symbolic register tracking,
//! wired together by a rule evaluator.

pub mod analysis;
pub mod callgraph;
pub mod error;
mod log_macros;
pub mod sequence;
pub mod symbolic;

pub mod evaluator;

pub use analysis::{AnalysisState, ApiEntry, CallGraphEvidence, CrimeReport};
pub use callgraph::{ascend, find_mutual_parents, MAX_SEARCH_LAYER};
pub use error::{CascadeError, CascadeReason, CascadeResult, EmptyCallerSet};
pub use evaluator::{evaluate_rules, run};
pub use sequence::check_sequence;
pub use symbolic::{SymbolicEvaluator, ValueIndex, ValueObject};
