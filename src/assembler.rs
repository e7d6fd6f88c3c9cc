//! The glue that wires the lexer, both passes, and the output writers
//! into a single reusable entry point.

use crate::ast::Statement;
use crate::diagnostics::DiagnosticsSink;
use crate::image::Image;
use crate::lexer;
use crate::listing;
use crate::objectfile;
use crate::opcodes::OpcodeTable;
use crate::pass1;
use crate::pass2;
use crate::symbol::SymbolTable;

/// Holds everything a single assembly run needs. Built once, reused across
/// runs via `assemble`, which clears per-run state up front so a caller
/// (the CLI, or a test) can assemble multiple sources with one instance.
pub struct Assembler {
    opcodes: OpcodeTable,
    symbols: SymbolTable,
    image: Image,
    diagnostics: DiagnosticsSink,
    statements: Vec<Statement>,
}

/// The result of one `assemble` call: everything needed to render a
/// listing or an object file, plus whether emission actually happened.
pub struct AssemblyResult<'a> {
    pub statements: &'a [Statement],
    pub image: &'a Image,
    pub symbols: &'a SymbolTable,
    pub diagnostics: &'a DiagnosticsSink,
    pub succeeded: bool,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            opcodes: OpcodeTable::new(),
            symbols: SymbolTable::new(),
            image: Image::new(),
            diagnostics: DiagnosticsSink::new(),
            statements: Vec::new(),
        }
    }

    /// Runs the lexer, pass 1, and pass 2 over `source`. Clears all
    /// per-run state first so repeated calls on the same instance don't
    /// leak symbols or diagnostics between runs.
    pub fn assemble(&mut self, source: &str) -> AssemblyResult<'_> {
        self.symbols.clear();
        self.image.reset();
        self.diagnostics.clear();

        self.statements = lexer::parse(source, &mut self.diagnostics);
        pass1::run(&mut self.statements, &mut self.symbols, &self.opcodes, &mut self.diagnostics);
        pass2::run(
            &mut self.statements,
            &mut self.symbols,
            &self.opcodes,
            &mut self.image,
            &mut self.diagnostics,
        );

        log::info!(
            "assembled {} statement(s), {} error(s)",
            self.statements.len(),
            self.diagnostics.error_count()
        );

        AssemblyResult {
            statements: &self.statements,
            image: &self.image,
            symbols: &self.symbols,
            diagnostics: &self.diagnostics,
            succeeded: !self.diagnostics.has_errors(),
        }
    }

    pub fn render_listing(&self, source: &str) -> String {
        let source_lines: Vec<&str> = source.lines().collect();
        listing::render(&self.statements, &self.image, &self.symbols, &self.diagnostics, &source_lines)
    }

    pub fn render_object_file(&self) -> String {
        objectfile::render(&self.image)
    }
}

impl Default for Assembler {
    fn default() -> Assembler {
        Assembler::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assembling_twice_does_not_leak_symbols_between_runs() {
        let mut assembler = Assembler::new();
        assembler.assemble("SET FOO = 1");
        let result = assembler.assemble("LDA FOO");
        assert!(!result.succeeded);
        assert!(result.diagnostics.has_errors());
    }

    #[test]
    fn a_clean_program_succeeds_and_emits_bytes() {
        let mut assembler = Assembler::new();
        let result = assembler.assemble("ORG $8000\nSTART: LDA #$01\nNOP\n");
        assert!(result.succeeded);
        assert_eq!(result.image.get(0x8000), Some(0xA9));
    }

    #[test]
    fn object_file_round_trips_through_the_renderer() {
        let mut assembler = Assembler::new();
        assembler.assemble("ORG $C000\nNOP\n");
        let object = assembler.render_object_file();
        assert!(object.contains("@C000"));
        assert!(object.contains("EA"));
    }
}
