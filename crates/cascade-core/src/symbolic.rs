//! Abstract interpretation of a narrow bytecode subset to track which
//! values flow into which registers, and which methods have consumed
//! those values as call arguments.
//!
//! Precision is intentionally sacrificed for cost: this is a syntactic
//! aliasing pass over register identifiers, not a dataflow lattice. It
//! must be sound enough to catch "the same datum flows into both APIs"
//! and cheap enough to run on every mutual parent of every candidate
//! rule.

use std::collections::HashMap;

use cascade_model::{Instruction, Mnemonic};

/// A tracked value produced during evaluation. `called_by_func` accrues
/// the rendered `class->method` key of every invocation that consumed
/// this value as an argument — the substrate stage 5 reads to decide
/// whether two APIs shared a datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueObject {
    pub value: String,
    pub called_by_func: Vec<String>,
}

/// Arena index into a [`SymbolicEvaluator`]'s observation table.
///
/// `move` copies this index rather than the value it points to, so every
/// register aliased to the same object shares one `called_by_func` list —
/// the arena-index scheme the design notes call for in place of raw
/// object identity.
pub type ValueIndex = usize;

/// Small abstract interpreter over register-identifier-keyed state.
///
/// A fresh evaluator is spun up per mutual-parent-method body; nothing
/// here is meant to survive across methods.
#[derive(Debug, Default)]
pub struct SymbolicEvaluator {
    arena: Vec<ValueObject>,
    registers: HashMap<String, ValueIndex>,
    /// Set by the most recent `invoke-kind`; consumed by the next
    /// `move-result*`, if any. Cleared (left stale) otherwise — an
    /// instruction stream with no move-result after an invoke simply
    /// never reads it.
    pending_invoke_return: Option<ValueIndex>,
}

impl SymbolicEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self, value: impl Into<String>) -> ValueIndex {
        self.arena.push(ValueObject {
            value: value.into(),
            called_by_func: Vec::new(),
        });
        self.arena.len() - 1
    }

    fn bind(&mut self, register: &str, index: ValueIndex) {
        self.registers.insert(register.to_string(), index);
    }

    /// Current binding of `register`, synthesizing a fresh "unknown"
    /// object if it has never been written — reads never fail.
    fn binding_of(&mut self, register: &str) -> ValueIndex {
        if let Some(&idx) = self.registers.get(register) {
            return idx;
        }
        let idx = self.fresh(format!("unknown:{register}"));
        self.bind(register, idx);
        idx
    }

    /// Feed one instruction into the tracker. Unknown mnemonics
    /// (`Mnemonic::Other`) are a no-op; there is no failure mode here —
    /// a malformed instruction (missing registers/parameter) degrades to
    /// "no effect" rather than aborting the pass.
    pub fn feed(&mut self, instr: &Instruction) {
        match instr.mnemonic {
            Mnemonic::NewInstance | Mnemonic::ConstString | Mnemonic::Const => {
                let Some(dst) = instr.registers.first() else {
                    return;
                };
                let value = instr.parameter.clone().unwrap_or_default();
                let idx = self.fresh(value);
                self.bind(dst, idx);
            }
            Mnemonic::Move => {
                let (Some(dst), Some(src)) = (instr.registers.first(), instr.registers.get(1))
                else {
                    return;
                };
                let idx = self.binding_of(src);
                self.bind(dst, idx);
            }
            Mnemonic::MoveResult => {
                let Some(dst) = instr.registers.first() else {
                    return;
                };
                let idx = self
                    .pending_invoke_return
                    .take()
                    .unwrap_or_else(|| self.fresh("unknown:move-result"));
                self.bind(dst, idx);
            }
            Mnemonic::Invoke => {
                let method_ref = instr.parameter.clone().unwrap_or_default();
                for reg in &instr.registers {
                    let idx = self.binding_of(reg);
                    self.arena[idx].called_by_func.push(method_ref.clone());
                }
                let ret_idx = self.fresh(format!("{method_ref}:return"));
                self.pending_invoke_return = Some(ret_idx);
            }
            Mnemonic::Other => {}
        }
    }

    /// All live value objects observed so far, arena order (oldest
    /// first) — deterministic for a given instruction stream.
    pub fn observations(&self) -> impl Iterator<Item = &ValueObject> {
        self.arena.iter()
    }
}
