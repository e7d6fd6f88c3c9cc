//! The human-readable listing: one line per source statement, echoing the
//! bytes it produced and the location it landed at, followed by a dump of
//! the final symbol table.

use std::fmt::Write as _;

use crate::ast::Statement;
use crate::diagnostics::DiagnosticsSink;
use crate::image::Image;
use crate::symbol::SymbolTable;

/// Renders the full listing: per-statement lines, then diagnostics, then
/// the symbol table, each block separated by a blank line.
pub fn render(
    statements: &[Statement],
    image: &Image,
    symbols: &SymbolTable,
    diagnostics: &DiagnosticsSink,
    source_lines: &[&str],
) -> String {
    let mut out = String::new();
    for stmt in statements {
        render_statement_line(&mut out, stmt, image, source_lines);
    }
    out.push('\n');
    render_diagnostics(&mut out, diagnostics);
    out.push('\n');
    render_symbol_table(&mut out, symbols);
    out
}

fn render_statement_line(out: &mut String, stmt: &Statement, image: &Image, source_lines: &[&str]) {
    let bytes: Vec<u8> = (stmt.loc..stmt.next_loc)
        .filter_map(|addr| image.get(addr))
        .collect();
    let byte_column = bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    let source = source_lines.get((stmt.line as usize).saturating_sub(1)).copied().unwrap_or("");

    let _ = write!(
        out,
        "{:>5}  {:04X}  {:<24}  {}",
        stmt.line, stmt.loc, byte_column, source
    );

    if let Some(attrs) = &stmt.attrs {
        let _ = write!(
            out,
            "  ; {} clocks{}{}",
            attrs.clocks,
            if attrs.extra_clocks { "+" } else { "" },
            match (attrs.undocumented, attrs.unstable) {
                (true, true) => " (undocumented, unstable)",
                (true, false) => " (undocumented)",
                (false, _) => "",
            }
        );
    }
    out.push('\n');
}

fn render_diagnostics(out: &mut String, diagnostics: &DiagnosticsSink) {
    out.push_str("Diagnostics:\n");
    let sorted = diagnostics.sorted_for_display();
    if sorted.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for diagnostic in sorted {
        let _ = writeln!(
            out,
            "  line {:>5}: {:<7}: {}",
            diagnostic.line,
            format!("{:?}", diagnostic.severity).to_lowercase(),
            diagnostic.message
        );
    }
}

fn render_symbol_table(out: &mut String, symbols: &SymbolTable) {
    let entries: Vec<(&String, i64)> = symbols
        .iter()
        .filter(|(_, symbol)| symbol.defined)
        .map(|(name, symbol)| (name, symbol.value))
        .collect();

    out.push_str("Symbol table (by name):\n");
    render_symbol_entries(out, &entries, |a, b| a.0.cmp(b.0));
    out.push('\n');
    out.push_str("Symbol table (by value):\n");
    render_symbol_entries(out, &entries, |a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
}

fn render_symbol_entries(
    out: &mut String,
    entries: &[(&String, i64)],
    cmp: impl FnMut(&(&String, i64), &(&String, i64)) -> std::cmp::Ordering,
) {
    let mut entries = entries.to_vec();
    entries.sort_by(cmp);
    if entries.is_empty() {
        out.push_str("  (none)\n");
        return;
    }
    for (name, value) in entries {
        let _ = writeln!(out, "  {name:<24} = {value:#06X}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::opcodes::OpcodeTable;
    use crate::{pass1, pass2};

    #[test]
    fn renders_one_line_per_statement_and_lists_symbols() {
        let source = "START: NOP\n";
        let mut diagnostics = DiagnosticsSink::new();
        let mut statements = crate::lexer::parse(source, &mut diagnostics);
        let opcodes = OpcodeTable::new();
        let mut symbols = SymbolTable::new();
        pass1::run(&mut statements, &mut symbols, &opcodes, &mut diagnostics);
        let mut image = Image::new();
        pass2::run(&mut statements, &mut symbols, &opcodes, &mut image, &mut diagnostics);

        let lines: Vec<&str> = source.lines().collect();
        let rendered = render(&statements, &image, &symbols, &diagnostics, &lines);
        assert!(rendered.contains("EA"));
        assert!(rendered.contains("START"));
    }

    #[test]
    fn unknown_mnemonic_shows_up_in_diagnostics_block() {
        let source = "ZZZ\n";
        let mut diagnostics = DiagnosticsSink::new();
        let mut statements = crate::lexer::parse(source, &mut diagnostics);
        let opcodes = OpcodeTable::new();
        let mut symbols = SymbolTable::new();
        pass1::run(&mut statements, &mut symbols, &opcodes, &mut diagnostics);
        let mut image = Image::new();
        pass2::run(&mut statements, &mut symbols, &opcodes, &mut image, &mut diagnostics);

        let lines: Vec<&str> = source.lines().collect();
        let rendered = render(&statements, &image, &symbols, &diagnostics, &lines);
        assert!(rendered.contains("unknown opcode"));
    }

    #[test]
    fn empty_symbol_table_says_none() {
        let mut out = String::new();
        render_symbol_table(&mut out, &SymbolTable::new());
        assert!(out.contains("(none)"));
    }
}
