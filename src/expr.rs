//! The expression evaluator.

use std::collections::BTreeSet;

use crate::ast::{BinOp, Expr, ExprNode, UnOp};
use crate::error::AsmError;
use crate::symbol::SymbolTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprResult {
    Defined(i64),
    Undefined(BTreeSet<String>),
}

impl ExprResult {
    pub fn is_defined(&self) -> bool {
        matches!(self, ExprResult::Defined(_))
    }
}

/// Evaluates `expr` against `symbols` and the current location counter.
/// Undefined symbols never abort evaluation — they propagate as a growing
/// set of names rather than short-circuiting arithmetic to a crash. Every
/// operator checks both operands' definedness before touching their values.
pub fn eval(expr: &Expr, symbols: &SymbolTable, loc: u32) -> Result<ExprResult, AsmError> {
    match expr {
        Expr::Constant(value) => Ok(ExprResult::Defined(*value)),
        Expr::Symbol(name) => {
            let symbol = symbols.lookup(name);
            if symbol.defined {
                Ok(ExprResult::Defined(symbol.value))
            } else {
                let mut names = BTreeSet::new();
                names.insert(name.to_ascii_uppercase());
                Ok(ExprResult::Undefined(names))
            }
        }
        Expr::Location => Ok(ExprResult::Defined(loc as i64)),
        Expr::Unary(op, operand) => match eval(operand, symbols, loc)? {
            ExprResult::Undefined(names) => Ok(ExprResult::Undefined(names)),
            ExprResult::Defined(value) => Ok(ExprResult::Defined(match op {
                UnOp::Neg => -value,
                UnOp::Not => !value,
            })),
        },
        Expr::Binary(op, lhs, rhs) => {
            let left = eval(lhs, symbols, loc)?;
            let right = eval(rhs, symbols, loc)?;
            match (left, right) {
                (ExprResult::Undefined(mut names), ExprResult::Undefined(more)) => {
                    names.extend(more);
                    Ok(ExprResult::Undefined(names))
                }
                (ExprResult::Undefined(names), ExprResult::Defined(_)) => {
                    Ok(ExprResult::Undefined(names))
                }
                (ExprResult::Defined(_), ExprResult::Undefined(names)) => {
                    Ok(ExprResult::Undefined(names))
                }
                (ExprResult::Defined(l), ExprResult::Defined(r)) => {
                    Ok(ExprResult::Defined(apply_binop(*op, l, r)?))
                }
            }
        }
    }
}

fn apply_binop(op: BinOp, l: i64, r: i64) -> Result<i64, AsmError> {
    Ok(match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => {
            if r == 0 {
                return Err(AsmError::DivideByZero);
            }
            l / r
        }
        BinOp::Mod => {
            if r == 0 {
                return Err(AsmError::DivideByZero);
            }
            l % r
        }
        BinOp::Shl => l << r,
        BinOp::Shr => l >> r,
        BinOp::And => l & r,
        BinOp::Or => l | r,
        BinOp::Xor => l ^ r,
    })
}

/// Evaluates `expr`, then fails with `UndefinedSymbolsInOperand` naming
/// every missing symbol if it isn't fully defined. Used by pass 2, which
/// requires every operand to be fully resolved before it can emit bytes.
pub fn eval_check_defined(expr: &Expr, symbols: &SymbolTable, loc: u32) -> Result<i64, AsmError> {
    match eval(expr, symbols, loc)? {
        ExprResult::Defined(value) => Ok(value),
        ExprResult::Undefined(names) => Err(AsmError::UndefinedSymbolsInOperand(names)),
    }
}

pub fn eval_node(node: &ExprNode, symbols: &SymbolTable, loc: u32) -> Result<ExprResult, AsmError> {
    eval(&node.expr, symbols, loc)
}

pub fn eval_node_check_defined(
    node: &ExprNode,
    symbols: &SymbolTable,
    loc: u32,
) -> Result<i64, AsmError> {
    eval_check_defined(&node.expr, symbols, loc)
}
