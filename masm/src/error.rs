//! Error kinds and source-located diagnostics.
//!
//! Recoverable problems (bad syntax, out-of-range operands, numeric-domain
//! faults, symbols still undefined on the final pass) are collected as
//! [`Diagnostic`]s so one run reports as many of them as possible; any of
//! them suppresses the output image. Fatal conditions abort immediately.

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    Syntax(String),
    OutOfRange(String),
    NumericDomain(String),
    UndefinedSymbol(String),
    FileNotFound(String),
    Fatal(String),
}

impl ErrorKind {
    /// Fatal kinds terminate the whole assembly instead of being
    /// collected.
    pub fn is_fatal(&self) -> bool {
        match self {
            ErrorKind::Fatal(_) | ErrorKind::FileNotFound(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Syntax(msg) => write!(f, "syntax error: {}", msg),
            ErrorKind::OutOfRange(msg) => write!(f, "out of range: {}", msg),
            ErrorKind::NumericDomain(msg) => write!(f, "numeric error: {}", msg),
            ErrorKind::UndefinedSymbol(name) => write!(f, "undefined symbol: {}", name),
            ErrorKind::FileNotFound(path) => write!(f, "file not found: {}", path),
            ErrorKind::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

/// An error tied to the source line that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub file: String,
    pub line: u32,
    pub text: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, file: &str, line: u32, text: &str) -> Diagnostic {
        Diagnostic {
            kind,
            file: file.to_owned(),
            line,
            text: text.to_owned(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.kind)?;
        if !self.text.is_empty() {
            write!(f, "\n    {}", self.text)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum Error {
    /// One or more recoverable errors; the image was suppressed.
    Assembly(Vec<Diagnostic>),
    /// A fatal condition stopped the run.
    Fatal(Diagnostic),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Assembly(diagnostics) => {
                for d in diagnostics {
                    writeln!(f, "{}", d)?;
                }
                write!(f, "{} error(s), no output generated", diagnostics.len())
            }
            Error::Fatal(d) => write!(f, "{}", d),
        }
    }
}

impl std::error::Error for Error {}

impl From<Diagnostic> for Error {
    fn from(d: Diagnostic) -> Error {
        if d.kind.is_fatal() {
            Error::Fatal(d)
        } else {
            Error::Assembly(vec![d])
        }
    }
}
