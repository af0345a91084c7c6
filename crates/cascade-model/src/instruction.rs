/// The narrow family of mnemonics the symbolic register evaluator
/// distinguishes. Everything else decodes to [`Mnemonic::Other`] — a
/// no-op for the tracker, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    NewInstance,
    ConstString,
    Const,
    Move,
    /// `move-result[-wide|-object] dst` binds `dst` to the value
    /// produced by the most recently fed `invoke-kind`, not to another
    /// register, so it is tracked separately from a plain alias [`Move`].
    MoveResult,
    Invoke,
    Other,
}

impl Mnemonic {
    /// Classify a raw mnemonic string into one of the recognized families.
    ///
    /// Matches on prefix rather than exact opcode spelling so that
    /// size/type suffixes (`move-object/from16`, `invoke-virtual/range`,
    /// `const/4`, `const-wide`) all route to the same handler, mirroring
    /// how the source's mnemonic-to-handler table is keyed.
    pub fn parse(raw: &str) -> Self {
        if raw == "new-instance" {
            Self::NewInstance
        } else if raw.starts_with("const-string") {
            Self::ConstString
        } else if raw.starts_with("const") {
            Self::Const
        } else if raw.starts_with("move-result") {
            Self::MoveResult
        } else if raw.starts_with("move") {
            Self::Move
        } else if raw.starts_with("invoke") {
            Self::Invoke
        } else {
            Self::Other
        }
    }
}

/// One disassembled instruction: mnemonic, the ordered registers it
/// references, and an optional immediate operand (literal, type
/// reference, or method reference rendered as text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub raw_mnemonic: String,
    pub mnemonic: Mnemonic,
    pub registers: Vec<String>,
    pub parameter: Option<String>,
}

impl Instruction {
    pub fn new(
        raw_mnemonic: impl Into<String>,
        registers: Vec<String>,
        parameter: Option<String>,
    ) -> Self {
        let raw_mnemonic = raw_mnemonic.into();
        let mnemonic = Mnemonic::parse(&raw_mnemonic);
        Self {
            raw_mnemonic,
            mnemonic,
            registers,
            parameter,
        }
    }
}
