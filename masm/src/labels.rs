//! Global symbols and per-section numeric local labels.

use crate::node::Node;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
struct Symbol {
    value: Rc<Node>,
    exported: bool,
}

/// Global symbol table. Values persist across passes — a value assigned on
/// pass *n* serves forward references on pass *n+1* until the defining
/// line overwrites it — and export flags are never cleared.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Stores the most recent value for `name`. Redefinition is silent;
    /// the pass loop relies on it to converge forward references.
    pub fn set(&mut self, name: &str, value: Rc<Node>) {
        match self.entries.get_mut(name) {
            Some(symbol) => symbol.value = value,
            None => {
                self.entries.insert(
                    name.to_owned(),
                    Symbol {
                        value,
                        exported: false,
                    },
                );
            }
        }
    }

    pub fn get(&self, name: &str) -> Rc<Node> {
        self.entries
            .get(name)
            .map(|s| Rc::clone(&s.value))
            .unwrap_or_else(Node::undef)
    }

    pub fn export(&mut self, name: &str) {
        self.entries
            .entry(name.to_owned())
            .or_insert_with(|| Symbol {
                value: Node::undef(),
                exported: false,
            })
            .exported = true;
    }

    /// All names with their current values, sorted by name. The pass loop
    /// compares snapshots to decide whether symbol values have settled.
    pub fn snapshot(&self) -> Vec<(String, Rc<Node>)> {
        let mut out: Vec<(String, Rc<Node>)> = self
            .entries
            .iter()
            .map(|(n, s)| (n.clone(), Rc::clone(&s.value)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Exported names with their current values, sorted by name so output
    /// is deterministic.
    pub fn exports(&self) -> Vec<(String, Rc<Node>)> {
        let mut out: Vec<(String, Rc<Node>)> = self
            .entries
            .iter()
            .filter(|(_, s)| s.exported)
            .map(|(n, s)| (n.clone(), Rc::clone(&s.value)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[derive(Debug)]
struct LocalEntry {
    name: i64,
    line: u32,
    value: Rc<Node>,
}

/// Numeric local labels of one section, keyed by (name, line-number).
///
/// The table persists across passes: because the driver assigns identical
/// line numbers on every pass, entries from the previous pass answer
/// forward references on the current one and are overwritten in place as
/// the defining lines are reached again.
#[derive(Debug, Default)]
pub struct LocalLabels {
    entries: Vec<LocalEntry>,
}

impl LocalLabels {
    pub fn new() -> LocalLabels {
        LocalLabels::default()
    }

    pub fn set(&mut self, name: i64, line: u32, value: Rc<Node>) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name == name && e.line == line)
        {
            Some(entry) => entry.value = value,
            None => self.entries.push(LocalEntry { name, line, value }),
        }
    }

    /// Entries in insertion order, for the pass-convergence snapshot.
    pub fn snapshot(&self) -> Vec<(i64, u32, Rc<Node>)> {
        self.entries
            .iter()
            .map(|e| (e.name, e.line, Rc::clone(&e.value)))
            .collect()
    }

    /// Nearest definition of `name` at or before `line` (`NB`). Ties go to
    /// the later-inserted entry.
    pub fn back(&self, name: i64, line: u32) -> Rc<Node> {
        let mut best: Option<&LocalEntry> = None;
        for entry in &self.entries {
            if entry.name == name && entry.line <= line {
                if best.map_or(true, |b| entry.line >= b.line) {
                    best = Some(entry);
                }
            }
        }
        best.map(|e| Rc::clone(&e.value)).unwrap_or_else(Node::undef)
    }

    /// Nearest definition of `name` at or after `line` (`NF`).
    pub fn fwd(&self, name: i64, line: u32) -> Rc<Node> {
        let mut best: Option<&LocalEntry> = None;
        for entry in &self.entries {
            if entry.name == name && entry.line >= line {
                if best.map_or(true, |b| entry.line <= b.line) {
                    best = Some(entry);
                }
            }
        }
        best.map(|e| Rc::clone(&e.value)).unwrap_or_else(Node::undef)
    }
}
