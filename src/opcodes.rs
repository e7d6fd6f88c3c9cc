//! The opcode table.
//!
//! Reshaped from a disassembler's "one `enum` variant per byte" layout into
//! "mnemonic → mode → timing/flags, used by an assembler": a disassembly
//! table answers "what does byte 0xAD mean", this one answers "what byte
//! does `LDA` in absolute mode encode to, and what does it cost".

use std::collections::HashMap;

use crate::error::AsmError;

/// The opcode-mode enumeration, finer-grained than `ast::AddressTag`: it
/// distinguishes zero-page from absolute and splits out the X/Y-indexed and
/// relative forms, because that's the granularity at which encodings exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Relative,
    Indirect,
    IndirectX,
    IndirectY,
}

impl OpMode {
    pub fn name(self) -> &'static str {
        match self {
            OpMode::Implied => "implied",
            OpMode::Accumulator => "accumulator",
            OpMode::Immediate => "immediate",
            OpMode::ZeroPage => "zero page",
            OpMode::ZeroPageX => "zero page,X",
            OpMode::ZeroPageY => "zero page,Y",
            OpMode::Absolute => "absolute",
            OpMode::AbsoluteX => "absolute,X",
            OpMode::AbsoluteY => "absolute,Y",
            OpMode::Relative => "relative",
            OpMode::Indirect => "indirect",
            OpMode::IndirectX => "(indirect,X)",
            OpMode::IndirectY => "(indirect),Y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    pub opcode: u8,
    pub clocks: u8,
    /// The cycle count is a lower bound; real cost depends on page crossings
    /// or whether a branch is taken.
    pub extra_clocks: bool,
    pub undocumented: bool,
    pub unstable: bool,
}

#[derive(Debug)]
pub struct Instruction {
    pub mnemonic: &'static str,
    encodings: HashMap<OpMode, Encoding>,
}

impl Instruction {
    pub fn encoding(&self, mode: OpMode) -> Option<&Encoding> {
        self.encodings.get(&mode)
    }

    pub fn has_mode(&self, mode: OpMode) -> bool {
        self.encodings.contains_key(&mode)
    }
}

pub struct OpcodeTable {
    instructions: HashMap<String, Instruction>,
}

impl OpcodeTable {
    pub fn new() -> OpcodeTable {
        let mut instructions: HashMap<String, Instruction> = HashMap::new();
        for &(mnemonic, mode, opcode, clocks, extra_clocks, undocumented, unstable) in ENTRIES {
            let instruction = instructions.entry(mnemonic.to_string()).or_insert_with(|| {
                log::debug!("registering instruction {mnemonic}");
                Instruction {
                    mnemonic,
                    encodings: HashMap::new(),
                }
            });
            instruction.encodings.insert(
                mode,
                Encoding {
                    opcode,
                    clocks,
                    extra_clocks,
                    undocumented,
                    unstable,
                },
            );
        }

        let table = OpcodeTable { instructions };
        table.assert_zero_page_has_absolute();
        table
    }

    /// For any instruction with a zero-page encoding, the same instruction
    /// also has an absolute encoding — pass 1 depends on always being able
    /// to fall back to absolute when a zero-page guess turns out wrong.
    fn assert_zero_page_has_absolute(&self) {
        for instruction in self.instructions.values() {
            if instruction.has_mode(OpMode::ZeroPage) {
                debug_assert!(
                    instruction.has_mode(OpMode::Absolute),
                    "{} has a zero-page mode but no absolute mode",
                    instruction.mnemonic
                );
            }
        }
    }

    pub fn lookup(&self, mnemonic: &str) -> Result<&Instruction, AsmError> {
        self.instructions
            .get(&mnemonic.to_ascii_uppercase())
            .ok_or_else(|| AsmError::UnknownOpcode(mnemonic.to_string()))
    }
}

impl Default for OpcodeTable {
    fn default() -> OpcodeTable {
        OpcodeTable::new()
    }
}

use OpMode::*;

/// `(mnemonic, mode, opcode, clocks, extra_clocks, undocumented, unstable)`.
///
/// Timing and the undocumented/unstable flags come from the well-documented
/// public 6502 cycle-count and illegal-opcode tables (nesdev/6502.org).
#[rustfmt::skip]
static ENTRIES: &[(&str, OpMode, u8, u8, bool, bool, bool)] = &[
    // ADC
    ("ADC", Immediate, 0x69, 2, false, false, false),
    ("ADC", ZeroPage,  0x65, 3, false, false, false),
    ("ADC", ZeroPageX, 0x75, 4, false, false, false),
    ("ADC", Absolute,  0x6D, 4, false, false, false),
    ("ADC", AbsoluteX, 0x7D, 4, true,  false, false),
    ("ADC", AbsoluteY, 0x79, 4, true,  false, false),
    ("ADC", IndirectX, 0x61, 6, false, false, false),
    ("ADC", IndirectY, 0x71, 5, true,  false, false),
    // AND
    ("AND", Immediate, 0x29, 2, false, false, false),
    ("AND", ZeroPage,  0x25, 3, false, false, false),
    ("AND", ZeroPageX, 0x35, 4, false, false, false),
    ("AND", Absolute,  0x2D, 4, false, false, false),
    ("AND", AbsoluteX, 0x3D, 4, true,  false, false),
    ("AND", AbsoluteY, 0x39, 4, true,  false, false),
    ("AND", IndirectX, 0x21, 6, false, false, false),
    ("AND", IndirectY, 0x31, 5, true,  false, false),
    // ASL
    ("ASL", Accumulator, 0x0A, 2, false, false, false),
    ("ASL", ZeroPage,    0x06, 5, false, false, false),
    ("ASL", ZeroPageX,   0x16, 6, false, false, false),
    ("ASL", Absolute,    0x0E, 6, false, false, false),
    ("ASL", AbsoluteX,   0x1E, 7, false, false, false),
    // BIT
    ("BIT", ZeroPage, 0x24, 3, false, false, false),
    ("BIT", Absolute, 0x2C, 4, false, false, false),
    // Branches (relative, extra clocks on branch taken / page cross)
    ("BPL", Relative, 0x10, 2, true, false, false),
    ("BMI", Relative, 0x30, 2, true, false, false),
    ("BVC", Relative, 0x50, 2, true, false, false),
    ("BVS", Relative, 0x70, 2, true, false, false),
    ("BCC", Relative, 0x90, 2, true, false, false),
    ("BCS", Relative, 0xB0, 2, true, false, false),
    ("BNE", Relative, 0xD0, 2, true, false, false),
    ("BEQ", Relative, 0xF0, 2, true, false, false),
    // BRK
    ("BRK", Implied, 0x00, 7, false, false, false),
    // CMP
    ("CMP", Immediate, 0xC9, 2, false, false, false),
    ("CMP", ZeroPage,  0xC5, 3, false, false, false),
    ("CMP", ZeroPageX, 0xD5, 4, false, false, false),
    ("CMP", Absolute,  0xCD, 4, false, false, false),
    ("CMP", AbsoluteX, 0xDD, 4, true,  false, false),
    ("CMP", AbsoluteY, 0xD9, 4, true,  false, false),
    ("CMP", IndirectX, 0xC1, 6, false, false, false),
    ("CMP", IndirectY, 0xD1, 5, true,  false, false),
    // CPX / CPY
    ("CPX", Immediate, 0xE0, 2, false, false, false),
    ("CPX", ZeroPage,  0xE4, 3, false, false, false),
    ("CPX", Absolute,  0xEC, 4, false, false, false),
    ("CPY", Immediate, 0xC0, 2, false, false, false),
    ("CPY", ZeroPage,  0xC4, 3, false, false, false),
    ("CPY", Absolute,  0xCC, 4, false, false, false),
    // DEC / DEX / DEY
    ("DEC", ZeroPage,  0xC6, 5, false, false, false),
    ("DEC", ZeroPageX, 0xD6, 6, false, false, false),
    ("DEC", Absolute,  0xCE, 6, false, false, false),
    ("DEC", AbsoluteX, 0xDE, 7, false, false, false),
    ("DEX", Implied, 0xCA, 2, false, false, false),
    ("DEY", Implied, 0x88, 2, false, false, false),
    // EOR
    ("EOR", Immediate, 0x49, 2, false, false, false),
    ("EOR", ZeroPage,  0x45, 3, false, false, false),
    ("EOR", ZeroPageX, 0x55, 4, false, false, false),
    ("EOR", Absolute,  0x4D, 4, false, false, false),
    ("EOR", AbsoluteX, 0x5D, 4, true,  false, false),
    ("EOR", AbsoluteY, 0x59, 4, true,  false, false),
    ("EOR", IndirectX, 0x41, 6, false, false, false),
    ("EOR", IndirectY, 0x51, 5, true,  false, false),
    // INC / INX / INY
    ("INC", ZeroPage,  0xE6, 5, false, false, false),
    ("INC", ZeroPageX, 0xF6, 6, false, false, false),
    ("INC", Absolute,  0xEE, 6, false, false, false),
    ("INC", AbsoluteX, 0xFE, 7, false, false, false),
    ("INX", Implied, 0xE8, 2, false, false, false),
    ("INY", Implied, 0xC8, 2, false, false, false),
    // JMP / JSR
    ("JMP", Absolute, 0x4C, 3, false, false, false),
    ("JMP", Indirect, 0x6C, 5, false, false, false),
    ("JSR", Absolute, 0x20, 6, false, false, false),
    // LDA
    ("LDA", Immediate, 0xA9, 2, false, false, false),
    ("LDA", ZeroPage,  0xA5, 3, false, false, false),
    ("LDA", ZeroPageX, 0xB5, 4, false, false, false),
    ("LDA", Absolute,  0xAD, 4, false, false, false),
    ("LDA", AbsoluteX, 0xBD, 4, true,  false, false),
    ("LDA", AbsoluteY, 0xB9, 4, true,  false, false),
    ("LDA", IndirectX, 0xA1, 6, false, false, false),
    ("LDA", IndirectY, 0xB1, 5, true,  false, false),
    // LDX
    ("LDX", Immediate, 0xA2, 2, false, false, false),
    ("LDX", ZeroPage,  0xA6, 3, false, false, false),
    ("LDX", ZeroPageY, 0xB6, 4, false, false, false),
    ("LDX", Absolute,  0xAE, 4, false, false, false),
    ("LDX", AbsoluteY, 0xBE, 4, true,  false, false),
    // LDY
    ("LDY", Immediate, 0xA0, 2, false, false, false),
    ("LDY", ZeroPage,  0xA4, 3, false, false, false),
    ("LDY", ZeroPageX, 0xB4, 4, false, false, false),
    ("LDY", Absolute,  0xAC, 4, false, false, false),
    ("LDY", AbsoluteX, 0xBC, 4, true,  false, false),
    // LSR
    ("LSR", Accumulator, 0x4A, 2, false, false, false),
    ("LSR", ZeroPage,    0x46, 5, false, false, false),
    ("LSR", ZeroPageX,   0x56, 6, false, false, false),
    ("LSR", Absolute,    0x4E, 6, false, false, false),
    ("LSR", AbsoluteX,   0x5E, 7, false, false, false),
    // NOP (documented, implied) plus undocumented modes
    ("NOP", Implied,   0xEA, 2, false, false, false),
    ("NOP", ZeroPage,  0x04, 3, true,  false, false),
    ("NOP", ZeroPageX, 0x14, 4, true,  false, false),
    ("NOP", Absolute,  0x0C, 4, true,  false, false),
    ("NOP", AbsoluteX, 0x1C, 4, true,  true,  false),
    ("NOP", Immediate, 0x80, 2, false, true,  false),
    // ORA
    ("ORA", Immediate, 0x09, 2, false, false, false),
    ("ORA", ZeroPage,  0x05, 3, false, false, false),
    ("ORA", ZeroPageX, 0x15, 4, false, false, false),
    ("ORA", Absolute,  0x0D, 4, false, false, false),
    ("ORA", AbsoluteX, 0x1D, 4, true,  false, false),
    ("ORA", AbsoluteY, 0x19, 4, true,  false, false),
    ("ORA", IndirectX, 0x01, 6, false, false, false),
    ("ORA", IndirectY, 0x11, 5, true,  false, false),
    // Stack ops
    ("PHA", Implied, 0x48, 3, false, false, false),
    ("PHP", Implied, 0x08, 3, false, false, false),
    ("PLA", Implied, 0x68, 4, false, false, false),
    ("PLP", Implied, 0x28, 4, false, false, false),
    // ROL / ROR
    ("ROL", Accumulator, 0x2A, 2, false, false, false),
    ("ROL", ZeroPage,    0x26, 5, false, false, false),
    ("ROL", ZeroPageX,   0x36, 6, false, false, false),
    ("ROL", Absolute,    0x2E, 6, false, false, false),
    ("ROL", AbsoluteX,   0x3E, 7, false, false, false),
    ("ROR", Accumulator, 0x6A, 2, false, false, false),
    ("ROR", ZeroPage,    0x66, 5, false, false, false),
    ("ROR", ZeroPageX,   0x76, 6, false, false, false),
    ("ROR", Absolute,    0x6E, 6, false, false, false),
    ("ROR", AbsoluteX,   0x7E, 7, false, false, false),
    // RTI / RTS
    ("RTI", Implied, 0x40, 6, false, false, false),
    ("RTS", Implied, 0x60, 6, false, false, false),
    // SBC
    ("SBC", Immediate, 0xE9, 2, false, false, false),
    ("SBC", ZeroPage,  0xE5, 3, false, false, false),
    ("SBC", ZeroPageX, 0xF5, 4, false, false, false),
    ("SBC", Absolute,  0xED, 4, false, false, false),
    ("SBC", AbsoluteX, 0xFD, 4, true,  false, false),
    ("SBC", AbsoluteY, 0xF9, 4, true,  false, false),
    ("SBC", IndirectX, 0xE1, 6, false, false, false),
    ("SBC", IndirectY, 0xF1, 5, true,  false, false),
    // STA / STX / STY (store: no page-crossing shortcut, so no extra clock)
    ("STA", ZeroPage,  0x85, 3, false, false, false),
    ("STA", ZeroPageX, 0x95, 4, false, false, false),
    ("STA", Absolute,  0x8D, 4, false, false, false),
    ("STA", AbsoluteX, 0x9D, 5, false, false, false),
    ("STA", AbsoluteY, 0x99, 5, false, false, false),
    ("STA", IndirectX, 0x81, 6, false, false, false),
    ("STA", IndirectY, 0x91, 6, false, false, false),
    ("STX", ZeroPage,  0x86, 3, false, false, false),
    ("STX", ZeroPageY, 0x96, 4, false, false, false),
    ("STX", Absolute,  0x8E, 4, false, false, false),
    ("STY", ZeroPage,  0x84, 3, false, false, false),
    ("STY", ZeroPageX, 0x94, 4, false, false, false),
    ("STY", Absolute,  0x8C, 4, false, false, false),
    // Register transfers
    ("TAX", Implied, 0xAA, 2, false, false, false),
    ("TXA", Implied, 0x8A, 2, false, false, false),
    ("TAY", Implied, 0xA8, 2, false, false, false),
    ("TYA", Implied, 0x98, 2, false, false, false),
    ("TSX", Implied, 0xBA, 2, false, false, false),
    ("TXS", Implied, 0x9A, 2, false, false, false),
    // Flag ops
    ("CLC", Implied, 0x18, 2, false, false, false),
    ("SEC", Implied, 0x38, 2, false, false, false),
    ("CLD", Implied, 0xD8, 2, false, false, false),
    ("SED", Implied, 0xF8, 2, false, false, false),
    ("CLI", Implied, 0x58, 2, false, false, false),
    ("SEI", Implied, 0x78, 2, false, false, false),
    ("CLV", Implied, 0xB8, 2, false, false, false),

    // --- Undocumented opcodes ---
    ("SLO", ZeroPage,  0x07, 5, false, true, false),
    ("SLO", ZeroPageX, 0x17, 6, false, true, false),
    ("SLO", Absolute,  0x0F, 6, false, true, false),
    ("SLO", AbsoluteX, 0x1F, 7, false, true, false),
    ("SLO", AbsoluteY, 0x1B, 7, false, true, false),
    ("SLO", IndirectX, 0x03, 8, false, true, false),
    ("SLO", IndirectY, 0x13, 8, false, true, false),

    ("RLA", ZeroPage,  0x27, 5, false, true, false),
    ("RLA", ZeroPageX, 0x37, 6, false, true, false),
    ("RLA", Absolute,  0x2F, 6, false, true, false),
    ("RLA", AbsoluteX, 0x3F, 7, false, true, false),
    ("RLA", AbsoluteY, 0x3B, 7, false, true, false),
    ("RLA", IndirectX, 0x23, 8, false, true, false),
    ("RLA", IndirectY, 0x33, 8, false, true, false),

    ("SRE", ZeroPage,  0x47, 5, false, true, false),
    ("SRE", ZeroPageX, 0x57, 6, false, true, false),
    ("SRE", Absolute,  0x4F, 6, false, true, false),
    ("SRE", AbsoluteX, 0x5F, 7, false, true, false),
    ("SRE", AbsoluteY, 0x5B, 7, false, true, false),
    ("SRE", IndirectX, 0x43, 8, false, true, false),
    ("SRE", IndirectY, 0x53, 8, false, true, false),

    ("RRA", ZeroPage,  0x67, 5, false, true, false),
    ("RRA", ZeroPageX, 0x77, 6, false, true, false),
    ("RRA", Absolute,  0x6F, 6, false, true, false),
    ("RRA", AbsoluteX, 0x7F, 7, false, true, false),
    ("RRA", AbsoluteY, 0x7B, 7, false, true, false),
    ("RRA", IndirectX, 0x63, 8, false, true, false),
    ("RRA", IndirectY, 0x73, 8, false, true, false),

    ("SAX", ZeroPage,  0x87, 3, false, true, false),
    ("SAX", ZeroPageY, 0x97, 4, false, true, false),
    ("SAX", Absolute,  0x8F, 4, false, true, false),
    ("SAX", IndirectX, 0x83, 6, false, true, false),

    // LAX immediate is unstable on real hardware (it ANDs the fetched byte
    // against a floating bus value); still accepted here, just flagged.
    ("LAX", Immediate, 0xAB, 2, false, true, true),
    ("LAX", ZeroPage,  0xA7, 3, false, true, false),
    ("LAX", ZeroPageY, 0xB7, 4, false, true, false),
    ("LAX", Absolute,  0xAF, 4, false, true, false),
    ("LAX", AbsoluteY, 0xBF, 4, true,  true, false),
    ("LAX", IndirectX, 0xA3, 6, false, true, false),
    ("LAX", IndirectY, 0xB3, 5, true,  true, false),

    ("DCP", ZeroPage,  0xC7, 5, false, true, false),
    ("DCP", ZeroPageX, 0xD7, 6, false, true, false),
    ("DCP", Absolute,  0xCF, 6, false, true, false),
    ("DCP", AbsoluteX, 0xDF, 7, false, true, false),
    ("DCP", AbsoluteY, 0xDB, 7, false, true, false),
    ("DCP", IndirectX, 0xC3, 8, false, true, false),
    ("DCP", IndirectY, 0xD3, 8, false, true, false),

    ("ISC", ZeroPage,  0xE7, 5, false, true, false),
    ("ISC", ZeroPageX, 0xF7, 6, false, true, false),
    ("ISC", Absolute,  0xEF, 6, false, true, false),
    ("ISC", AbsoluteX, 0xFF, 7, false, true, false),
    ("ISC", AbsoluteY, 0xFB, 7, false, true, false),
    ("ISC", IndirectX, 0xE3, 8, false, true, false),
    ("ISC", IndirectY, 0xF3, 8, false, true, false),

    ("ANC", Immediate, 0x0B, 2, false, true, false),
    ("ALR", Immediate, 0x4B, 2, false, true, false),
    ("ARR", Immediate, 0x6B, 2, false, true, false),
    ("XAA", Immediate, 0x8B, 2, false, true, true),
    ("AXS", Immediate, 0xCB, 2, false, true, false),

    ("AHX", AbsoluteY, 0x9F, 5, false, true, true),
    ("AHX", IndirectY, 0x93, 6, false, true, true),
    ("SHX", AbsoluteY, 0x9E, 5, false, true, true),
    ("SHY", AbsoluteX, 0x9C, 5, false, true, true),
    ("TAS", AbsoluteY, 0x9B, 5, false, true, true),
    ("LAS", AbsoluteY, 0xBB, 4, true,  true, false),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = OpcodeTable::new();
        assert!(table.lookup("lda").is_ok());
        assert!(table.lookup("LDA").is_ok());
    }

    #[test]
    fn unknown_mnemonic_fails() {
        let table = OpcodeTable::new();
        assert_eq!(
            table.lookup("ZZZ").unwrap_err(),
            AsmError::UnknownOpcode("ZZZ".to_string())
        );
    }

    #[test]
    fn lda_absolute_is_0xad() {
        let table = OpcodeTable::new();
        let lda = table.lookup("LDA").unwrap();
        assert_eq!(lda.encoding(OpMode::Absolute).unwrap().opcode, 0xAD);
        assert_eq!(lda.encoding(OpMode::ZeroPage).unwrap().opcode, 0xA5);
    }

    #[test]
    fn branch_has_only_relative_mode() {
        let table = OpcodeTable::new();
        let bne = table.lookup("BNE").unwrap();
        assert!(bne.has_mode(OpMode::Relative));
        assert!(!bne.has_mode(OpMode::Absolute));
    }

    #[test]
    fn undocumented_and_unstable_flags_are_set() {
        let table = OpcodeTable::new();
        let lax = table.lookup("LAX").unwrap();
        let lax_imm = lax.encoding(OpMode::Immediate).unwrap();
        assert!(lax_imm.undocumented);
        assert!(lax_imm.unstable);

        let lax_zp = lax.encoding(OpMode::ZeroPage).unwrap();
        assert!(lax_zp.undocumented);
        assert!(!lax_zp.unstable);
    }

    #[test]
    fn every_zero_page_instruction_has_absolute() {
        let table = OpcodeTable::new();
        for instruction in table.instructions.values() {
            if instruction.has_mode(OpMode::ZeroPage) {
                assert!(
                    instruction.has_mode(OpMode::Absolute),
                    "{} missing absolute mode",
                    instruction.mnemonic
                );
            }
        }
    }
}
