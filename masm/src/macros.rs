//! Macro definition capture and expansion frames.
//!
//! A macro body is the raw parsed lines between `MACRO` and its matching
//! `ENDM`, stored unevaluated by reference. Nested MACRO/ENDM pairs inside
//! a body are tracked with a depth counter and captured verbatim; only the
//! outermost pair opens and closes the definition. Expansion pushes the
//! evaluated argument array as a frame; `&N` interpolations read the top
//! frame only, so arguments never leak across nested expansions.

use crate::error::ErrorKind;
use crate::node::Node;
use crate::parser::Line;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub struct Macro {
    pub name: String,
    pub lines: Vec<Rc<Line>>,
    pass: u32,
}

#[derive(Debug)]
enum DefState {
    Normal,
    InDef {
        name: String,
        depth: u32,
        lines: Vec<Rc<Line>>,
    },
}

#[derive(Debug)]
pub struct MacroSet {
    defs: HashMap<String, Macro>,
    state: DefState,
    frames: Vec<Rc<Node>>,
}

impl MacroSet {
    pub fn new() -> MacroSet {
        MacroSet {
            defs: HashMap::new(),
            state: DefState::Normal,
            frames: Vec::new(),
        }
    }

    pub fn begin_pass(&mut self) {
        self.state = DefState::Normal;
        self.frames.clear();
    }

    pub fn defining(&self) -> bool {
        match self.state {
            DefState::InDef { .. } => true,
            DefState::Normal => false,
        }
    }

    /// Name of the definition currently being captured.
    pub fn pending_name(&self) -> Option<&str> {
        match &self.state {
            DefState::InDef { name, .. } => Some(name),
            DefState::Normal => None,
        }
    }

    pub fn start_def(&mut self, name: String) {
        self.state = DefState::InDef {
            name,
            depth: 0,
            lines: Vec::new(),
        };
    }

    /// Depth of nested MACRO/ENDM pairs inside the body being captured.
    pub fn depth(&self) -> u32 {
        match &self.state {
            DefState::InDef { depth, .. } => *depth,
            DefState::Normal => 0,
        }
    }

    pub fn nest(&mut self) {
        if let DefState::InDef { depth, .. } = &mut self.state {
            *depth += 1;
        }
    }

    pub fn unnest(&mut self) {
        if let DefState::InDef { depth, .. } = &mut self.state {
            *depth -= 1;
        }
    }

    pub fn capture(&mut self, line: Rc<Line>) {
        if let DefState::InDef { lines, .. } = &mut self.state {
            lines.push(line);
        }
    }

    /// Closes the current definition. Redefining a macro within one pass
    /// is an error; across passes the fresh (identical) capture replaces
    /// the stale one.
    pub fn finish(&mut self, pass: u32) -> Result<(), ErrorKind> {
        let state = std::mem::replace(&mut self.state, DefState::Normal);
        let (name, lines) = match state {
            DefState::InDef { name, lines, .. } => (name, lines),
            DefState::Normal => {
                return Err(ErrorKind::Syntax("ENDM outside macro definition".to_owned()))
            }
        };
        if let Some(existing) = self.defs.get(&name) {
            if existing.pass == pass {
                return Err(ErrorKind::Syntax(format!("macro {} redefined", name)));
            }
        }
        self.defs.insert(
            name.clone(),
            Macro { name, lines, pass },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Macro> {
        self.defs.get(name).cloned()
    }

    pub fn push_frame(&mut self, args: Rc<Node>) {
        self.frames.push(args);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn frame(&self) -> Option<&Rc<Node>> {
        self.frames.last()
    }
}
