//! The symbol table.

use std::collections::HashMap;

use crate::error::AsmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub defined: bool,
    pub value: i64,
}

/// Case-insensitive: names are upper-cased on insert and lookup.
pub struct SymbolTable {
    entries: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            entries: HashMap::new(),
        }
    }

    /// Returns the sentinel `(defined=false, value=1)` if `name` has never
    /// been set. The placeholder value is implementation-private — callers
    /// must check `defined` before trusting `value`.
    pub fn lookup(&self, name: &str) -> Symbol {
        match self.entries.get(&name.to_ascii_uppercase()) {
            Some(symbol) => *symbol,
            None => Symbol {
                defined: false,
                value: 1,
            },
        }
    }

    /// Upserts `name = value`. Fails with `SymbolRedefinition` if the symbol
    /// is already defined with a different value.
    pub fn set_value(&mut self, name: &str, value: i64) -> Result<(), AsmError> {
        let key = name.to_ascii_uppercase();
        if let Some(existing) = self.entries.get(&key) {
            if existing.defined && existing.value != value {
                return Err(AsmError::SymbolRedefinition {
                    name: name.to_string(),
                    old: existing.value,
                    new: value,
                });
            }
        }
        self.entries.insert(
            key,
            Symbol {
                defined: true,
                value,
            },
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates `(name, symbol)` pairs for the listing's symbol-table dump.
    /// Names are stored upper-cased.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.entries.iter()
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn undefined_lookup_returns_sentinel() {
        let table = SymbolTable::new();
        let symbol = table.lookup("FOO");
        assert!(!symbol.defined);
    }

    #[test]
    fn is_case_insensitive() {
        let mut table = SymbolTable::new();
        table.set_value("Foo", 42).unwrap();
        assert_eq!(table.lookup("foo"), Symbol { defined: true, value: 42 });
        assert_eq!(table.lookup("FOO"), Symbol { defined: true, value: 42 });
    }

    #[test]
    fn redefinition_with_same_value_is_ok() {
        let mut table = SymbolTable::new();
        table.set_value("FOO", 42).unwrap();
        table.set_value("FOO", 42).unwrap();
    }

    #[test]
    fn redefinition_with_different_value_fails() {
        let mut table = SymbolTable::new();
        table.set_value("FOO", 42).unwrap();
        let err = table.set_value("FOO", 43).unwrap_err();
        assert_eq!(
            err,
            AsmError::SymbolRedefinition {
                name: "FOO".to_string(),
                old: 42,
                new: 43
            }
        );
    }

    #[test]
    fn clear_wipes_all_entries() {
        let mut table = SymbolTable::new();
        table.set_value("FOO", 42).unwrap();
        table.clear();
        assert!(!table.lookup("FOO").defined);
    }
}
