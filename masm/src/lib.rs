//! Two-pass assembler for the Motorola 6809.
//!
//! The main entry points are [`assemble`](fn.assemble.html) and
//! [`assemble_file`](fn.assemble_file.html), which take 6809 assembly
//! source and produce an [`Output`](struct.Output.html): the assembled
//! [`Image`](../binfile/struct.Image.html), a listing, and the values of
//! all exported symbols. Parsing uses [pest]; anything that goes wrong is
//! reported as [`Diagnostic`](struct.Diagnostic.html)s carrying the file,
//! line number and source text of the offending line.
//!
//! Assembly runs at least two passes. Unresolved operands assemble to
//! their widest form on early passes, and passes repeat until instruction
//! sizes and symbol values stop changing, so forward references and
//! direct-page optimisations converge; sources whose sizes never settle
//! are rejected.
//!
//! # Source format
//!
//! A symbol starting in column one is a label (a trailing colon is
//! accepted). The opcode field follows whitespace; operands follow more
//! whitespace. Comments run from `;` to end of line, and a `*` in column
//! one makes the whole line a comment.
//!
//! Integer literals are decimal, hexadecimal (`$` or `0x`), binary (`%`
//! or `0b`), octal (`@` or `0o`) or a character (`'A`). `*` evaluates to
//! the current program counter. Expressions use C precedence with the
//! operators `+ - * / & | ^ << >>` and unary `- ~ +`.
//!
//! Numeric labels are local: they can be redefined freely, and `1B`/`1F`
//! refer to the nearest definition of `1` backwards or forwards.
//!
//! ## Addressing modes
//!
//!  Syntax            | Mode
//! -------------------|--------------------------------------
//! (none)             | inherent
//! `#expr`            | immediate
//! `expr`             | direct or extended, chosen by SETDP
//! `<expr` / `>expr`  | force direct / extended
//! `expr,R`           | indexed with constant offset (`<<` forces 5-bit)
//! `A,R` `B,R` `D,R`  | indexed with accumulator offset
//! `,R+` `,R++`       | indexed with post-increment
//! `,-R` `,--R`       | indexed with pre-decrement
//! `expr,PCR`         | program-counter relative
//! `[...]`            | indirect variant of any indexed form
//! `[expr]`           | extended indirect
//!
//! ## Directives
//!
//!  Directive    | Effect
//! --------------|------------------------------------------------------
//! `EQU`         | bind the label to the operand's value
//! `ORG`         | set the program counter
//! `SECTION`     | switch to a named section
//! `PUT`         | place following output at a different address
//! `SETDP`       | declare the direct page (negative: none)
//! `EXPORT`      | flag symbols for the symbol file
//! `FCC`, `FCB`  | emit bytes and strings
//! `FDB`         | emit big-endian words
//! `RZB`         | emit zero bytes
//! `RMB`         | reserve space without emitting
//! `INCLUDE`     | assemble another source file in place
//! `INCLUDEBIN`  | emit a file's bytes verbatim
//! `MACRO`/`ENDM`| define a macro; `&1`, `&2`, ... name its arguments
//!
//! [pest]: https://docs.rs/pest/

mod assembler;
mod directives;
mod error;
mod eval;
mod instructions;
mod labels;
mod listing;
mod macros;
mod node;
mod parser;
mod section;

#[cfg(test)]
mod test;

use std::path::Path;

pub use assembler::{Assembler, Config, FsLoader, Output, SourceLoader};
pub use error::{Diagnostic, Error, ErrorKind};
pub use listing::{Listing, ListingLine};
pub use parser::{Line, Program};

pub type Result<T> = std::result::Result<T, Error>;

/// Assembles source text with default configuration.
pub fn assemble(input: &str) -> Result<Output> {
    let loader = FsLoader::new(".");
    assemble_with("<source>", input, &loader, Config::default())
}

/// Assembles a source file; INCLUDE paths resolve relative to it.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Output> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|_| {
        Error::Fatal(Diagnostic::new(
            ErrorKind::FileNotFound(path.display().to_string()),
            "",
            0,
            "",
        ))
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let loader = FsLoader::new(base);
    assemble_with(&path.display().to_string(), &source, &loader, Config::default())
}

/// Assembles with an explicit name, loader and configuration.
pub fn assemble_with(
    name: &str,
    input: &str,
    loader: &dyn SourceLoader,
    config: Config,
) -> Result<Output> {
    Assembler::new(loader, config).assemble_source(name, input)
}
