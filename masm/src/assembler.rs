//! The assembly driver: walks parsed lines, dispatches directives,
//! instructions and macro expansions, and runs passes to a fixed point.
//!
//! Passes work as follows. Pass 1 seeds symbol and local-label values;
//! every later pass runs as a candidate final pass, recording diagnostics
//! and the listing. After each pass the per-instruction sizes and the
//! symbol/local values are compared with the previous pass; when both are
//! unchanged the pass that just ran is the final one and its results
//! stand. The iteration is capped, and still-oscillating sizes are fatal.

use crate::directives::{self, Pseudo};
use crate::error::{Diagnostic, Error, ErrorKind};
use crate::eval::{args_float_to_int, EvalCtx};
use crate::instructions;
use crate::labels::SymbolTable;
use crate::listing::{Listing, ListingLine};
use crate::macros::{Macro, MacroSet};
use crate::node::{Kind, Node};
use crate::parser::{self, Line, Program};
use crate::section::Sections;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

const MAX_PASSES: u32 = 4;

#[derive(Clone, Debug)]
pub struct Config {
    pub max_program_depth: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_program_depth: 128,
        }
    }
}

/// Resolves the files named by INCLUDE and INCLUDEBIN. A seam so tests
/// can assemble multi-file programs from memory.
pub trait SourceLoader {
    fn load_source(&self, name: &str) -> std::io::Result<String>;
    fn load_binary(&self, name: &str) -> std::io::Result<Vec<u8>>;
}

/// Loads includes relative to a base directory.
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    pub fn new<P: Into<PathBuf>>(base: P) -> FsLoader {
        FsLoader { base: base.into() }
    }
}

impl SourceLoader for FsLoader {
    fn load_source(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.base.join(name))
    }

    fn load_binary(&self, name: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base.join(name))
    }
}

/// Everything a successful assembly produces.
#[derive(Debug)]
pub struct Output {
    pub image: binfile::Image,
    pub listing: Listing,
    pub exports: Vec<(String, i64)>,
}

/// End-of-pass snapshot used for convergence: instruction sizes plus all
/// symbol and local-label values.
#[derive(Debug, PartialEq, Default)]
struct PassState {
    sizes: Vec<u32>,
    symbols: Vec<(String, Rc<Node>)>,
    locals: Vec<(String, i64, u32, Rc<Node>)>,
}

enum LineLabel {
    None,
    Local(i64),
    Global(String),
}

pub struct Assembler<'a> {
    config: Config,
    loader: &'a dyn SourceLoader,
    sections: Sections,
    symbols: SymbolTable,
    macros: MacroSet,
    pass: u32,
    final_pass: bool,
    line_number: u32,
    depth: u32,
    current_file: String,
    programs: HashMap<String, Rc<Program>>,
    binaries: HashMap<String, Rc<Vec<u8>>>,
    parse_diagnostics: Vec<Diagnostic>,
    diagnostics: Vec<Diagnostic>,
    listing: Listing,
    sizes: Vec<u32>,
}

impl<'a> Assembler<'a> {
    pub fn new(loader: &'a dyn SourceLoader, config: Config) -> Assembler<'a> {
        Assembler {
            config,
            loader,
            sections: Sections::new(),
            symbols: SymbolTable::new(),
            macros: MacroSet::new(),
            pass: 0,
            final_pass: false,
            line_number: 0,
            depth: 0,
            current_file: String::new(),
            programs: HashMap::new(),
            binaries: HashMap::new(),
            parse_diagnostics: Vec::new(),
            diagnostics: Vec::new(),
            listing: Listing::new(),
            sizes: Vec::new(),
        }
    }

    /// Parses `source` and assembles it. Parse problems are collected as
    /// diagnostics alongside everything the passes report.
    pub fn assemble_source(&mut self, name: &str, source: &str) -> Result<Output, Error> {
        let (program, mut diagnostics) = parser::parse_program(name, source);
        self.parse_diagnostics.append(&mut diagnostics);
        self.current_file = name.to_owned();
        self.assemble(Rc::new(program))
    }

    /// Assembles an already-parsed program.
    pub fn assemble(&mut self, program: Rc<Program>) -> Result<Output, Error> {
        let mut previous: Option<PassState> = None;
        let mut converged = false;
        for pass in 1..=MAX_PASSES {
            self.begin_pass(pass);
            self.run_program(&program).map_err(Error::Fatal)?;
            if self.macros.defining() {
                let name = self.macros.pending_name().unwrap_or("").to_owned();
                self.diagnostics.push(Diagnostic::new(
                    ErrorKind::Syntax(format!("macro {} is missing its ENDM", name)),
                    &program.file,
                    self.line_number,
                    "",
                ));
            }
            let state = self.pass_state();
            if previous.as_ref() == Some(&state) {
                converged = true;
                break;
            }
            previous = Some(state);
        }
        if !converged {
            return Err(Error::Fatal(Diagnostic::new(
                ErrorKind::Fatal(format!(
                    "assembly failed to converge after {} passes",
                    MAX_PASSES
                )),
                &program.file,
                0,
                "",
            )));
        }
        self.finish()
    }

    fn finish(&mut self) -> Result<Output, Error> {
        let mut diagnostics = std::mem::take(&mut self.parse_diagnostics);
        diagnostics.append(&mut self.diagnostics);

        let mut exports = Vec::new();
        for (name, value) in self.symbols.exports() {
            match value.int_value() {
                Some(v) => exports.push((name, v)),
                None => diagnostics.push(Diagnostic::new(
                    ErrorKind::UndefinedSymbol(name),
                    &self.current_file,
                    0,
                    "",
                )),
            }
        }

        if !diagnostics.is_empty() {
            return Err(Error::Assembly(diagnostics));
        }

        let merged = self.sections.coalesce_all(true);
        let (origin, data) = match merged.spans.first() {
            Some(span) => (span.put, span.data.clone()),
            None => (0, Vec::new()),
        };
        Ok(Output {
            image: binfile::Image::from(origin, origin, data),
            listing: std::mem::take(&mut self.listing),
            exports,
        })
    }

    fn begin_pass(&mut self, pass: u32) {
        self.pass = pass;
        self.final_pass = pass >= 2;
        self.line_number = 0;
        self.depth = 0;
        self.sections.begin_pass(pass);
        self.macros.begin_pass();
        self.diagnostics.clear();
        self.listing.clear();
        self.sizes.clear();
    }

    fn pass_state(&mut self) -> PassState {
        PassState {
            sizes: std::mem::take(&mut self.sizes),
            symbols: self.symbols.snapshot(),
            locals: self.sections.locals_snapshot(),
        }
    }

    fn run_program(&mut self, program: &Program) -> Result<(), Diagnostic> {
        self.depth += 1;
        if self.depth > self.config.max_program_depth {
            self.depth -= 1;
            return Err(self.here(ErrorKind::Fatal(format!(
                "program nesting exceeds {} levels",
                self.config.max_program_depth
            ))));
        }
        let saved_file = std::mem::replace(&mut self.current_file, program.file.clone());
        let mut result = Ok(());
        for line in &program.lines {
            result = self.process_line(line);
            if result.is_err() {
                break;
            }
        }
        self.current_file = saved_file;
        self.depth -= 1;
        result
    }

    /// One source line, in the fixed order: blank check, macro-capture
    /// state, argument evaluation, label handling, then dispatch to
    /// directives, the instruction encoder, or macro expansion.
    fn process_line(&mut self, line: &Rc<Line>) -> Result<(), Diagnostic> {
        self.line_number += 1;
        let mark = self.sections.mark();
        let pc_at_line = self.sections.pc();

        if line.is_blank() {
            self.listing_add(None, Vec::new(), line);
            return Ok(());
        }

        if self.macros.defining() {
            self.capture_line(line);
            self.listing_add(None, Vec::new(), line);
            return Ok(());
        }

        let opcode_text = match &line.opcode {
            Some(node) => match self.eval_name(node) {
                Ok(Some(text)) => Some(text.to_uppercase()),
                Ok(None) => {
                    self.report(ErrorKind::Syntax("unresolvable opcode".to_owned()), line);
                    return Ok(());
                }
                Err(kind) => {
                    self.report(kind, line);
                    return Ok(());
                }
            },
            None => None,
        };

        // EXPORT takes its arguments as names, never as values.
        let is_export = opcode_text.as_deref() == Some("EXPORT");
        let eval_args = if is_export {
            line.args.clone()
        } else {
            match &line.args {
                Some(args) => match self.eval(args) {
                    Ok(value) => Some(value),
                    Err(kind) => {
                        self.report(kind, line);
                        return Ok(());
                    }
                },
                None => None,
            }
        };

        let label = match &line.label {
            None => LineLabel::None,
            Some(node) => match &node.kind {
                Kind::Int(n) => LineLabel::Local(*n),
                _ => match self.eval_name(node) {
                    Ok(Some(name)) => LineLabel::Global(name),
                    Ok(None) => {
                        self.report(ErrorKind::Syntax("unresolvable label".to_owned()), line);
                        return Ok(());
                    }
                    Err(kind) => {
                        self.report(kind, line);
                        return Ok(());
                    }
                },
            },
        };

        let pseudo = opcode_text.as_deref().and_then(directives::lookup);
        if let Some(p) = pseudo {
            if p.defines_label() {
                if let Err(kind) = self.run_label_pseudo(p, &label, &eval_args, line) {
                    self.report(kind, line);
                }
                let address = match p {
                    Pseudo::Org => Some(self.sections.pc()),
                    _ => None,
                };
                self.listing_add(address, Vec::new(), line);
                return Ok(());
            }
        }

        if !matches!(label, LineLabel::None) {
            self.bind_label(&label, Node::int(pc_at_line as i64));
        }

        let opcode_text = match opcode_text {
            Some(text) => text,
            None => {
                self.listing_add(None, Vec::new(), line);
                return Ok(());
            }
        };

        let args: Vec<Rc<Node>> = eval_args
            .as_ref()
            .map(|a| a.elements())
            .unwrap_or_default();

        match pseudo {
            Some(p) => {
                if let Err(kind) = self.run_pseudo(p, &label, &args, line) {
                    if kind.is_fatal() {
                        return Err(self.locate(kind, line));
                    }
                    self.report(kind, line);
                }
            }
            None => {
                // A macro may shadow a table mnemonic; once defined it
                // wins so redefining an instruction as a macro works.
                if let Some(mac) = self.macros.get(&opcode_text) {
                    let frame = eval_args.unwrap_or_else(|| Node::array(Vec::new()));
                    self.expand_macro(mac, frame)?;
                } else if let Some(entry) = m6809::lookup(&opcode_text) {
                    let converted: Vec<Rc<Node>> = args_float_to_int(
                        &Node::array(args.clone()),
                    )
                    .elements();
                    let before = self.sections.mark();
                    let result = instructions::encode(
                        entry,
                        &converted,
                        &mut self.sections,
                        self.final_pass,
                    );
                    let emitted = (self.sections.mark() - before) as u32;
                    self.sizes.push(emitted);
                    if let Err(kind) = result {
                        self.report(kind, line);
                    }
                } else {
                    self.report(
                        ErrorKind::Syntax(format!("unknown opcode {}", opcode_text)),
                        line,
                    );
                }
            }
        }

        let bytes = self.sections.bytes_since(mark);
        let address = if !bytes.is_empty() || self.sections.pc() != pc_at_line {
            Some(pc_at_line)
        } else {
            None
        };
        self.listing_add(address, bytes, line);
        Ok(())
    }

    /// Capture state machine while a macro definition is open: nested
    /// MACRO/ENDM pairs are captured verbatim, the outermost ENDM closes
    /// the definition.
    fn capture_line(&mut self, line: &Rc<Line>) {
        let keyword = match &line.opcode {
            Some(node) => match &node.kind {
                Kind::Str(text) => Some(text.to_uppercase()),
                _ => None,
            },
            None => None,
        };
        match keyword.as_deref() {
            Some("MACRO") => {
                self.macros.nest();
                self.macros.capture(Rc::clone(line));
            }
            Some("ENDM") if self.macros.depth() == 0 => {
                if let Err(kind) = self.endm_name_check(line) {
                    self.report(kind, line);
                }
                if let Err(kind) = self.macros.finish(self.pass) {
                    self.report(kind, line);
                }
            }
            Some("ENDM") => {
                self.macros.unnest();
                self.macros.capture(Rc::clone(line));
            }
            _ => self.macros.capture(Rc::clone(line)),
        }
    }

    /// `ENDM name` must name the macro being closed; a bare ENDM always
    /// matches.
    fn endm_name_check(&self, line: &Line) -> Result<(), ErrorKind> {
        let args = match &line.args {
            Some(args) => args.elements(),
            None => return Ok(()),
        };
        if args.len() != 1 {
            return Err(ErrorKind::Syntax("ENDM takes at most one name".to_owned()));
        }
        let name = self
            .eval_name(&args[0])?
            .ok_or_else(|| ErrorKind::Syntax("malformed ENDM name".to_owned()))?;
        match self.macros.pending_name() {
            Some(pending) if pending.eq_ignore_ascii_case(&name) => Ok(()),
            pending => Err(ErrorKind::Syntax(format!(
                "ENDM {} does not close macro {}",
                name,
                pending.unwrap_or("")
            ))),
        }
    }

    fn run_label_pseudo(
        &mut self,
        pseudo: Pseudo,
        label: &LineLabel,
        args: &Option<Rc<Node>>,
        line: &Rc<Line>,
    ) -> Result<(), ErrorKind> {
        let args: Vec<Rc<Node>> = args.as_ref().map(|a| a.elements()).unwrap_or_default();
        match pseudo {
            Pseudo::Equ => {
                if matches!(label, LineLabel::None) {
                    return Err(ErrorKind::Syntax("EQU needs a label".to_owned()));
                }
                let value = Rc::clone(single_arg(&args, "EQU")?);
                self.bind_label(label, value);
                Ok(())
            }
            Pseudo::Org => {
                match single_arg(&args, "ORG")?.int_value() {
                    Some(address) => {
                        self.sections.set_pc(address as u16);
                        self.bind_label(label, Node::int(address));
                        Ok(())
                    }
                    None => {
                        if self.final_pass {
                            Err(ErrorKind::UndefinedSymbol("ORG address".to_owned()))
                        } else {
                            Ok(())
                        }
                    }
                }
            }
            Pseudo::Section => {
                // The section name is textual: it must not resolve
                // through the symbol table.
                let raw = line
                    .args
                    .as_ref()
                    .map(|a| a.elements())
                    .unwrap_or_default();
                let name_node = match raw.as_slice() {
                    [node] => node,
                    _ => return Err(ErrorKind::Syntax("SECTION takes one name".to_owned())),
                };
                let name = self
                    .eval_name(name_node)?
                    .ok_or_else(|| ErrorKind::Syntax("malformed section name".to_owned()))?;
                let pass = self.pass;
                self.sections.set(&name, pass);
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    fn run_pseudo(
        &mut self,
        pseudo: Pseudo,
        label: &LineLabel,
        args: &[Rc<Node>],
        line: &Rc<Line>,
    ) -> Result<(), ErrorKind> {
        match pseudo {
            Pseudo::Put => match single_arg(args, "PUT")?.int_value() {
                Some(address) => {
                    self.sections.set_put(address as u16);
                    Ok(())
                }
                None if self.final_pass => {
                    Err(ErrorKind::UndefinedSymbol("PUT address".to_owned()))
                }
                None => Ok(()),
            },
            Pseudo::SetDp => match single_arg(args, "SETDP")?.int_value() {
                Some(page) => {
                    let dp = if page < 0 { -1 } else { page & 0xFF };
                    self.sections.set_dp(dp as i32);
                    Ok(())
                }
                None if self.final_pass => {
                    Err(ErrorKind::UndefinedSymbol("SETDP page".to_owned()))
                }
                None => Ok(()),
            },
            Pseudo::Export => {
                if args.is_empty() {
                    return Err(ErrorKind::Syntax("EXPORT needs symbol names".to_owned()));
                }
                for arg in args {
                    let name = self
                        .eval_name(arg)?
                        .ok_or_else(|| ErrorKind::Syntax("malformed EXPORT name".to_owned()))?;
                    self.symbols.export(&name);
                }
                Ok(())
            }
            Pseudo::Fcc | Pseudo::Fcb => {
                if args.is_empty() {
                    return Err(ErrorKind::Syntax("byte data needs arguments".to_owned()));
                }
                let converted = args_float_to_int(&Node::array(args.to_vec())).elements();
                directives::emit_byte_data(&mut self.sections, &converted)
            }
            Pseudo::Fdb => {
                if args.is_empty() {
                    return Err(ErrorKind::Syntax("word data needs arguments".to_owned()));
                }
                let converted = args_float_to_int(&Node::array(args.to_vec())).elements();
                directives::emit_word_data(&mut self.sections, &converted)
            }
            Pseudo::Rzb => match single_arg(args, "RZB")?.int_value() {
                Some(count) => directives::emit_zero_block(&mut self.sections, count),
                None if self.final_pass => {
                    Err(ErrorKind::UndefinedSymbol("RZB count".to_owned()))
                }
                None => Ok(()),
            },
            Pseudo::Rmb => match single_arg(args, "RMB")?.int_value() {
                Some(count) => directives::reserve(&mut self.sections, count),
                None if self.final_pass => {
                    Err(ErrorKind::UndefinedSymbol("RMB count".to_owned()))
                }
                None => Ok(()),
            },
            Pseudo::Include => {
                let name = self.filename_arg(line, "INCLUDE")?;
                let program = self.load_program(&name)?;
                self.run_program(&program).map_err(|d| d.kind)
            }
            Pseudo::IncludeBin => {
                let name = self.filename_arg(line, "INCLUDEBIN")?;
                let bytes = self.load_binary(&name)?;
                directives::emit_binary(&mut self.sections, &bytes);
                Ok(())
            }
            Pseudo::Macro => {
                let name = match label {
                    LineLabel::Global(name) => name.clone(),
                    LineLabel::Local(_) => {
                        return Err(ErrorKind::Syntax(
                            "macro names cannot be local labels".to_owned(),
                        ))
                    }
                    LineLabel::None => match args {
                        [arg] => self
                            .eval_name(arg)?
                            .ok_or_else(|| ErrorKind::Syntax("malformed macro name".to_owned()))?,
                        _ => {
                            return Err(ErrorKind::Syntax(
                                "MACRO needs a name from its label or argument".to_owned(),
                            ))
                        }
                    },
                };
                self.macros.start_def(name.to_uppercase());
                Ok(())
            }
            Pseudo::Endm => Err(ErrorKind::Syntax(
                "ENDM outside macro definition".to_owned(),
            )),
            Pseudo::Equ | Pseudo::Org | Pseudo::Section => unreachable!(),
        }
    }

    fn expand_macro(&mut self, mac: Macro, frame: Rc<Node>) -> Result<(), Diagnostic> {
        let program = Program {
            file: self.current_file.clone(),
            lines: mac.lines,
        };
        self.macros.push_frame(frame);
        let result = self.run_program(&program);
        self.macros.pop_frame();
        result
    }

    /// The filename of INCLUDE/INCLUDEBIN, taken textually.
    fn filename_arg(&self, line: &Line, what: &str) -> Result<String, ErrorKind> {
        let raw = line
            .args
            .as_ref()
            .map(|a| a.elements())
            .unwrap_or_default();
        match raw.as_slice() {
            [node] => self
                .eval_name(node)?
                .ok_or_else(|| ErrorKind::Syntax(format!("malformed {} filename", what))),
            _ => Err(ErrorKind::Syntax(format!("{} takes one filename", what))),
        }
    }

    fn load_program(&mut self, name: &str) -> Result<Rc<Program>, ErrorKind> {
        if let Some(program) = self.programs.get(name) {
            return Ok(Rc::clone(program));
        }
        let source = self
            .loader
            .load_source(name)
            .map_err(|_| ErrorKind::FileNotFound(name.to_owned()))?;
        let (program, mut diagnostics) = parser::parse_program(name, &source);
        self.parse_diagnostics.append(&mut diagnostics);
        let program = Rc::new(program);
        self.programs.insert(name.to_owned(), Rc::clone(&program));
        Ok(program)
    }

    fn load_binary(&mut self, name: &str) -> Result<Rc<Vec<u8>>, ErrorKind> {
        if let Some(bytes) = self.binaries.get(name) {
            return Ok(Rc::clone(bytes));
        }
        let bytes = Rc::new(
            self.loader
                .load_binary(name)
                .map_err(|_| ErrorKind::FileNotFound(name.to_owned()))?,
        );
        self.binaries.insert(name.to_owned(), Rc::clone(&bytes));
        Ok(bytes)
    }

    fn bind_label(&mut self, label: &LineLabel, value: Rc<Node>) {
        match label {
            LineLabel::None => {}
            LineLabel::Local(name) => {
                let line = self.line_number;
                self.sections
                    .current_mut()
                    .locals
                    .set(*name, line, value);
            }
            LineLabel::Global(name) => self.symbols.set(name, value),
        }
    }

    fn eval(&self, node: &Rc<Node>) -> Result<Rc<Node>, ErrorKind> {
        self.ctx().eval(node)
    }

    fn eval_name(&self, node: &Rc<Node>) -> Result<Option<String>, ErrorKind> {
        self.ctx().eval_name(node)
    }

    fn ctx(&self) -> EvalCtx {
        let section = self.sections.current();
        EvalCtx {
            symbols: &self.symbols,
            locals: &section.locals,
            pc: section.pc,
            line: self.line_number,
            frame: self.macros.frame(),
        }
    }

    /// Records a recoverable diagnostic; only the final pass keeps them.
    fn report(&mut self, kind: ErrorKind, line: &Line) {
        if self.final_pass {
            let diagnostic =
                Diagnostic::new(kind, &self.current_file, line.number, line.text.trim_end());
            self.diagnostics.push(diagnostic);
        }
    }

    fn locate(&self, kind: ErrorKind, line: &Line) -> Diagnostic {
        Diagnostic::new(kind, &self.current_file, line.number, line.text.trim_end())
    }

    fn here(&self, kind: ErrorKind) -> Diagnostic {
        Diagnostic::new(kind, &self.current_file, self.line_number, "")
    }

    fn listing_add(&mut self, address: Option<u16>, bytes: Vec<u8>, line: &Line) {
        if self.final_pass {
            self.listing.push(ListingLine {
                address,
                bytes,
                source: line.text.clone(),
            });
        }
    }
}

fn single_arg<'n>(args: &'n [Rc<Node>], what: &str) -> Result<&'n Rc<Node>, ErrorKind> {
    match args {
        [arg] => Ok(arg),
        _ => Err(ErrorKind::Syntax(format!("{} takes one argument", what))),
    }
}
