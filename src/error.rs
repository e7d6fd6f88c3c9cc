//! The error taxonomy for the semantic engine.
//!
//! Every variant here is constructed inside a per-statement guard in pass 1
//! or pass 2 and converted into a `Diagnostic` by the caller — none of
//! these are meant to unwind past a single statement.

use std::collections::BTreeSet;

use thiserror::Error;

fn join_symbols(symbols: &BTreeSet<String>) -> String {
    symbols
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("unknown opcode \"{0}\"")]
    UnknownOpcode(String),

    #[error("undefined symbol(s) in operand: {}", join_symbols(.0))]
    UndefinedSymbolsInOperand(BTreeSet<String>),

    #[error("ORG expression is undefined: {}", join_symbols(.0))]
    OrgUndefined(BTreeSet<String>),

    #[error("ORG value changed between passes: pass 1 was {old:#06x}, pass 2 is {new:#06x}")]
    OrgChanged { old: i64, new: i64 },

    #[error("SPACE count is undefined: {}", join_symbols(.0))]
    SpaceUndefined(BTreeSet<String>),

    #[error("REP count is undefined: {}", join_symbols(.0))]
    RepCountUndefined(BTreeSet<String>),

    #[error("REP count must be a positive integer, found {0}")]
    RepCountNonPositive(i64),

    #[error("SPACE count must not be negative, found {0}")]
    SpaceCountNegative(i64),

    #[error("symbol \"{name}\" redefined: was {old}, attempted to set to {new}")]
    SymbolRedefinition { name: String, old: i64, new: i64 },

    #[error("division by zero")]
    DivideByZero,

    #[error("instruction \"{mnemonic}\" has no {mode} addressing mode")]
    NoSuchAddressingMode {
        mnemonic: String,
        mode: &'static str,
    },

    #[error("instruction \"{mnemonic}\" has no absolute indexed mode and the operand does not fit in zero page")]
    NoAbsoluteIndexedMode { mnemonic: String },

    #[error("relative branch target out of range: offset {0} does not fit in a signed byte")]
    RelativeBranchOutOfRange(i64),

    #[error("address {0:#06x} is not in zero page")]
    AddressNotZeroPage(i64),

    #[error("address overflow: location counter would exceed 0xFFFF")]
    AddressOverflow,

    #[error("operand value {0} should fit in one byte; truncated")]
    OperandDoesNotFitInByte(i64),

    #[error("top-level expression is parenthesized; did you mean brackets for indirect addressing?")]
    TopLevelParenthesizedOperand,
}

/// Gates object-file emission: any `Error`-severity diagnostic suppresses it,
/// a `Warning` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl AsmError {
    /// Only two of the taxonomy's members are warnings; everything else aborts
    /// the statement as an error.
    pub fn severity(&self) -> Severity {
        match self {
            AsmError::OperandDoesNotFitInByte(_) | AsmError::TopLevelParenthesizedOperand => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}
