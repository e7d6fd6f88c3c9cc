//! Pass 2 — emission.

use crate::ast::{AddressTag, DataElement, DataSize, InstructionAttrs, OperandSize, Statement, StatementKind};
use crate::diagnostics::DiagnosticsSink;
use crate::error::{AsmError, Severity};
use crate::expr::eval_check_defined;
use crate::image::Image;
use crate::opcodes::{Encoding, Instruction, OpMode, OpcodeTable};
use crate::symbol::SymbolTable;

/// Walks `statements` a second time, now requiring every operand to be
/// fully defined, and writes the resulting bytes into `image`. Fills in
/// `next_loc` and `attrs` on each statement for the listing.
pub fn run(
    statements: &mut [Statement],
    symbols: &mut SymbolTable,
    opcodes: &OpcodeTable,
    image: &mut Image,
    diagnostics: &mut DiagnosticsSink,
) {
    let mut loc: u32 = 0;
    for stmt in statements.iter_mut() {
        loc = stmt.loc;
        let result = statement(stmt, &mut loc, symbols, opcodes, image, diagnostics);
        diagnostics.record(stmt.line, result);
        stmt.next_loc = loc;
    }
}

fn statement(
    stmt: &mut Statement,
    loc: &mut u32,
    symbols: &mut SymbolTable,
    opcodes: &OpcodeTable,
    image: &mut Image,
    diagnostics: &mut DiagnosticsSink,
) -> Result<(), AsmError> {
    if let Some(label) = &stmt.label {
        symbols.set_value(label, *loc as i64)?;
    }

    match &stmt.kind {
        StatementKind::Org(expr) => {
            let value = eval_check_defined(&expr.expr, symbols, *loc)?;
            if let Some(pass1_value) = stmt.org_value_pass1 {
                if pass1_value != value {
                    return Err(AsmError::OrgChanged {
                        old: pass1_value,
                        new: value,
                    });
                }
            }
            *loc = value as u32;
        }
        StatementKind::Set(name, expr) => {
            let value = eval_check_defined(&expr.expr, symbols, *loc)?;
            symbols.set_value(name, value)?;
        }
        StatementKind::Instruction(mnemonic, addr) => {
            let instruction = opcodes.lookup(mnemonic)?;
            let attrs = emit_instruction(stmt, mnemonic, instruction, addr, symbols, loc, image, diagnostics)?;
            stmt.attrs = Some(attrs);
        }
        StatementKind::Data(size, elements) => {
            for element in elements {
                emit_data_element(stmt.line, *size, element, symbols, loc, image, diagnostics)?;
            }
        }
        StatementKind::Space(size, count_expr) => {
            let count = eval_check_defined(&count_expr.expr, symbols, *loc)?;
            *loc += count.max(0) as u32 * size.bytes();
        }
        StatementKind::Noop => {}
    }
    Ok(())
}

fn emit_instruction(
    stmt: &Statement,
    mnemonic: &str,
    instruction: &Instruction,
    addr: &crate::ast::Address,
    symbols: &SymbolTable,
    loc: &mut u32,
    image: &mut Image,
    diagnostics: &mut DiagnosticsSink,
) -> Result<InstructionAttrs, AsmError> {
    let encoding = match addr.tag {
        AddressTag::Implied => require_mode(instruction, mnemonic, OpMode::Implied)?,
        AddressTag::Accumulator => require_mode(instruction, mnemonic, OpMode::Accumulator)?,
        AddressTag::Immediate => {
            let encoding = require_mode(instruction, mnemonic, OpMode::Immediate)?;
            let value = operand_value(addr, symbols, *loc)?;
            let byte = checked_byte(stmt.line, value, diagnostics);
            emit_opcode(image, loc, encoding)?;
            image.emit(loc, byte)?;
            return Ok(attrs_of(encoding));
        }
        AddressTag::Indirect => {
            let encoding = require_mode(instruction, mnemonic, OpMode::Indirect)?;
            let value = operand_value(addr, symbols, *loc)?;
            emit_opcode(image, loc, encoding)?;
            emit_word(image, loc, value)?;
            return Ok(attrs_of(encoding));
        }
        AddressTag::IndirectX => {
            let encoding = require_mode(instruction, mnemonic, OpMode::IndirectX)?;
            let value = operand_value(addr, symbols, *loc)?;
            let zp = require_zero_page(value)?;
            emit_opcode(image, loc, encoding)?;
            image.emit(loc, zp)?;
            return Ok(attrs_of(encoding));
        }
        AddressTag::IndirectY => {
            let encoding = require_mode(instruction, mnemonic, OpMode::IndirectY)?;
            let value = operand_value(addr, symbols, *loc)?;
            let zp = require_zero_page(value)?;
            emit_opcode(image, loc, encoding)?;
            image.emit(loc, zp)?;
            return Ok(attrs_of(encoding));
        }
        AddressTag::Address | AddressTag::AddressX | AddressTag::AddressY => {
            return emit_address(stmt, mnemonic, instruction, addr, symbols, loc, image);
        }
    };
    emit_opcode(image, loc, encoding)?;
    Ok(attrs_of(encoding))
}

/// Handles `Address`/`AddressX`/`AddressY`: branches, and the
/// zero-page-vs-absolute choice pass 1 already committed to.
fn emit_address(
    stmt: &Statement,
    mnemonic: &str,
    instruction: &Instruction,
    addr: &crate::ast::Address,
    symbols: &SymbolTable,
    loc: &mut u32,
    image: &mut Image,
) -> Result<InstructionAttrs, AsmError> {
    if let Some(encoding) = instruction.encoding(OpMode::Relative) {
        let target = operand_value(addr, symbols, *loc)?;
        let opcode_addr = *loc;
        emit_opcode(image, loc, encoding)?;
        // The offset is relative to the address of the byte *after* the
        // two-byte branch instruction.
        let offset = target - (opcode_addr as i64 + 2);
        if !(-128..=127).contains(&offset) {
            return Err(AsmError::RelativeBranchOutOfRange(offset));
        }
        image.emit(loc, offset as i8 as u8)?;
        return Ok(attrs_of(encoding));
    }

    let (zero_page_mode, absolute_mode) = match addr.tag {
        AddressTag::Address => (OpMode::ZeroPage, OpMode::Absolute),
        AddressTag::AddressX => (OpMode::ZeroPageX, OpMode::AbsoluteX),
        AddressTag::AddressY => (OpMode::ZeroPageY, OpMode::AbsoluteY),
        _ => unreachable!(),
    };

    let value = operand_value(addr, symbols, *loc)?;

    match stmt.operand_size {
        Some(OperandSize::Byte) => {
            let encoding = require_mode(instruction, mnemonic, zero_page_mode)?;
            let zp = if instruction.encoding(absolute_mode).is_some() {
                require_zero_page(value)?
            } else {
                require_narrow_zero_page(value, mnemonic)?
            };
            emit_opcode(image, loc, encoding)?;
            image.emit(loc, zp)?;
            Ok(attrs_of(encoding))
        }
        Some(OperandSize::Word) | None => {
            if let Some(encoding) = instruction.encoding(absolute_mode) {
                emit_opcode(image, loc, encoding)?;
                emit_word(image, loc, value)?;
                Ok(attrs_of(encoding))
            } else if let Some(encoding) = instruction.encoding(zero_page_mode) {
                // No absolute-indexed encoding exists for this mnemonic;
                // fall back to the zero-page-indexed one, but only when
                // the value actually fits in a single operand byte.
                let zp = require_narrow_zero_page(value, mnemonic)?;
                emit_opcode(image, loc, encoding)?;
                image.emit(loc, zp)?;
                Ok(attrs_of(encoding))
            } else {
                Err(AsmError::NoAbsoluteIndexedMode {
                    mnemonic: mnemonic.to_string(),
                })
            }
        }
    }
}

fn operand_value(addr: &crate::ast::Address, symbols: &SymbolTable, loc: u32) -> Result<i64, AsmError> {
    match &addr.expr {
        Some(expr) => eval_check_defined(&expr.expr, symbols, loc),
        None => Ok(0),
    }
}

fn require_mode<'a>(
    instruction: &'a Instruction,
    mnemonic: &str,
    mode: OpMode,
) -> Result<&'a Encoding, AsmError> {
    instruction.encoding(mode).ok_or_else(|| AsmError::NoSuchAddressingMode {
        mnemonic: mnemonic.to_string(),
        mode: mode.name(),
    })
}

fn require_zero_page(value: i64) -> Result<u8, AsmError> {
    if (0..=0xFF).contains(&value) {
        Ok(value as u8)
    } else {
        Err(AsmError::AddressNotZeroPage(value))
    }
}

/// Used when falling back from a missing absolute-indexed encoding to its
/// zero-page-indexed counterpart: the value must fit the single operand
/// byte that encoding has room for, taken as a signed or unsigned 8-bit
/// quantity.
fn require_narrow_zero_page(value: i64, mnemonic: &str) -> Result<u8, AsmError> {
    if (-127..=255).contains(&value) {
        Ok((value & 0xFF) as u8)
    } else {
        Err(AsmError::NoAbsoluteIndexedMode {
            mnemonic: mnemonic.to_string(),
        })
    }
}

fn checked_byte(line: u32, value: i64, diagnostics: &mut DiagnosticsSink) -> u8 {
    if !(-128..=255).contains(&value) {
        diagnostics.push(
            Severity::Warning,
            line,
            AsmError::OperandDoesNotFitInByte(value).to_string(),
        );
    }
    (value & 0xFF) as u8
}

fn emit_opcode(image: &mut Image, loc: &mut u32, encoding: &Encoding) -> Result<(), AsmError> {
    image.emit(loc, encoding.opcode)
}

fn emit_word(image: &mut Image, loc: &mut u32, value: i64) -> Result<(), AsmError> {
    let word = (value & 0xFFFF) as u16;
    image.emit(loc, (word & 0xFF) as u8)?;
    image.emit(loc, (word >> 8) as u8)
}

fn attrs_of(encoding: &Encoding) -> InstructionAttrs {
    InstructionAttrs {
        clocks: encoding.clocks,
        extra_clocks: encoding.extra_clocks,
        undocumented: encoding.undocumented,
        unstable: encoding.unstable,
    }
}

fn emit_data_element(
    line: u32,
    size: DataSize,
    element: &DataElement,
    symbols: &SymbolTable,
    loc: &mut u32,
    image: &mut Image,
    diagnostics: &mut DiagnosticsSink,
) -> Result<(), AsmError> {
    match element {
        DataElement::Single(expr) => {
            let value = eval_check_defined(&expr.expr, symbols, *loc)?;
            write_sized(line, size, value, loc, image, diagnostics)
        }
        DataElement::Rep { count, value } => {
            let count = match eval_check_defined(&count.expr, symbols, *loc) {
                Ok(n) if n >= 1 => n,
                _ => return Ok(()), // already reported in pass 1
            };
            for _ in 0..count {
                let v = eval_check_defined(&value.expr, symbols, *loc)?;
                write_sized(line, size, v, loc, image, diagnostics)?;
            }
            Ok(())
        }
    }
}

fn write_sized(
    line: u32,
    size: DataSize,
    value: i64,
    loc: &mut u32,
    image: &mut Image,
    diagnostics: &mut DiagnosticsSink,
) -> Result<(), AsmError> {
    match size {
        DataSize::Byte => {
            let byte = checked_byte(line, value, diagnostics);
            image.emit(loc, byte)
        }
        DataSize::Word => emit_word(image, loc, value),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{Address, Expr, ExprNode};
    use crate::pass1;

    fn assemble(mut statements: Vec<Statement>) -> (Image, SymbolTable, DiagnosticsSink) {
        let opcodes = OpcodeTable::new();
        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticsSink::new();
        pass1::run(&mut statements, &mut symbols, &opcodes, &mut diagnostics);
        let mut image = Image::new();
        run(&mut statements, &mut symbols, &opcodes, &mut image, &mut diagnostics);
        (image, symbols, diagnostics)
    }

    #[test]
    fn implied_instruction_emits_single_byte() {
        let (image, _symbols, diagnostics) = assemble(vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Instruction("NOP".into(), Address::no_operand(AddressTag::Implied)),
        )]);
        assert!(!diagnostics.has_errors());
        assert_eq!(image.get(0), Some(0xEA));
    }

    #[test]
    fn forward_branch_computes_relative_offset() {
        let statements = vec![
            Statement::new(
                1,
                None,
                None,
                StatementKind::Instruction(
                    "BNE".into(),
                    Address::with_expr(AddressTag::Address, ExprNode::new(Expr::Symbol("L".into()))),
                ),
            ),
            Statement::new(2, None, None, StatementKind::Instruction(
                "NOP".into(),
                Address::no_operand(AddressTag::Implied),
            )),
            Statement::new(
                3,
                Some("L".into()),
                None,
                StatementKind::Instruction("NOP".into(), Address::no_operand(AddressTag::Implied)),
            ),
        ];
        let (image, _symbols, diagnostics) = assemble(statements);
        assert!(!diagnostics.has_errors());
        assert_eq!(image.get(0), Some(0xD0)); // BNE
        assert_eq!(image.get(1), Some(1)); // skip over the one NOP byte
    }

    #[test]
    fn stx_with_forward_y_reference_falls_back_to_zero_page_y_not_x() {
        let statements = vec![
            Statement::new(
                1,
                None,
                None,
                StatementKind::Instruction(
                    "STX".into(),
                    Address::with_expr(AddressTag::AddressY, ExprNode::new(Expr::Symbol("PTR".into()))),
                ),
            ),
            Statement::new(2, Some("PTR".into()), None, StatementKind::Noop),
        ];
        let (image, _symbols, diagnostics) = assemble(statements);
        assert!(!diagnostics.has_errors());
        // STX has no absolute,Y encoding; the only valid fallback is the
        // zero-page,Y opcode (0x96), never zero-page,X (0x94 is invalid
        // for STX entirely).
        assert_eq!(image.get(0), Some(0x96));
        assert_eq!(image.get(1), Some(2)); // PTR lands right after the 2-byte instruction
        assert_eq!(image.get(2), None); // no spurious third byte
    }

    #[test]
    fn sty_absolute_x_out_of_narrow_range_fails_instead_of_corrupting_the_image() {
        let statements = vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Instruction(
                "STY".into(),
                Address::with_expr(AddressTag::AddressX, ExprNode::new(Expr::Constant(0x1234))),
            ),
        )];
        let (image, _symbols, diagnostics) = assemble(statements);
        assert!(diagnostics.has_errors());
        assert!(diagnostics.iter().any(|d| d.message.contains("absolute")));
        assert_eq!(image.get(0), None);
    }

    #[test]
    fn immediate_out_of_byte_range_warns_and_truncates() {
        let (image, _symbols, diagnostics) = assemble(vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Instruction(
                "LDA".into(),
                Address::with_expr(AddressTag::Immediate, ExprNode::new(Expr::Constant(0x1FF))),
            ),
        )]);
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.iter().count(), 1);
        assert_eq!(image.get(1), Some(0xFF));
    }

    #[test]
    fn org_changing_between_passes_is_an_error() {
        // A legal source program can never make a defined symbol's value
        // change between passes (the symbol table itself forbids it). This
        // exercises the defensive cross-pass check directly by mutating the
        // table in between, standing in for whatever bug it guards against.
        let mut statements = vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Org(ExprNode::new(Expr::Symbol("BASE".into()))),
        )];
        let opcodes = OpcodeTable::new();
        let mut symbols = SymbolTable::new();
        symbols.set_value("BASE", 0x200).unwrap();
        let mut diagnostics = DiagnosticsSink::new();
        pass1::run(&mut statements, &mut symbols, &opcodes, &mut diagnostics);
        symbols.clear();
        symbols.set_value("BASE", 0x300).unwrap();
        let mut image = Image::new();
        run(&mut statements, &mut symbols, &opcodes, &mut image, &mut diagnostics);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn rep_element_repeats_value_expression() {
        let statements = vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Data(
                DataSize::Byte,
                vec![DataElement::Rep {
                    count: ExprNode::new(Expr::Constant(3)),
                    value: ExprNode::new(Expr::Constant(0xAA)),
                }],
            ),
        )];
        let (image, _symbols, diagnostics) = assemble(statements);
        assert!(!diagnostics.has_errors());
        assert_eq!(image.get(0), Some(0xAA));
        assert_eq!(image.get(1), Some(0xAA));
        assert_eq!(image.get(2), Some(0xAA));
    }

    #[test]
    fn space_reserves_without_writing_bytes() {
        let statements = vec![Statement::new(
            1,
            None,
            None,
            StatementKind::Space(DataSize::Byte, ExprNode::new(Expr::Constant(4))),
        )];
        let (image, _symbols, diagnostics) = assemble(statements);
        assert!(!diagnostics.has_errors());
        for addr in 0..4 {
            assert_eq!(image.get(addr), None);
        }
    }
}
