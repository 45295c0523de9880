//! Pseudo-op table and the data-emitting directive bodies.
//!
//! Control directives (EQU, ORG, SECTION, INCLUDE, MACRO, ...) are handled
//! by the driver, which owns the state they touch; the byte-emitting ones
//! live here and work directly against the section engine.

use crate::error::ErrorKind;
use crate::node::{Kind, Node};
use crate::section::Sections;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pseudo {
    Equ,
    Org,
    Section,
    Put,
    SetDp,
    Export,
    Fcc,
    Fcb,
    Fdb,
    Rzb,
    Rmb,
    Include,
    IncludeBin,
    Macro,
    Endm,
}

/// Looks up a directive name, supplied upper-cased.
pub fn lookup(name: &str) -> Option<Pseudo> {
    Some(match name {
        "EQU" => Pseudo::Equ,
        "ORG" => Pseudo::Org,
        "SECTION" => Pseudo::Section,
        "PUT" => Pseudo::Put,
        "SETDP" => Pseudo::SetDp,
        "EXPORT" => Pseudo::Export,
        "FCC" => Pseudo::Fcc,
        "FCB" => Pseudo::Fcb,
        "FDB" => Pseudo::Fdb,
        "RZB" => Pseudo::Rzb,
        "RMB" => Pseudo::Rmb,
        "INCLUDE" => Pseudo::Include,
        "INCLUDEBIN" => Pseudo::IncludeBin,
        "MACRO" => Pseudo::Macro,
        "ENDM" => Pseudo::Endm,
        _ => return None,
    })
}

impl Pseudo {
    /// Directives that define the line's label themselves instead of
    /// having it default to the current PC.
    pub fn defines_label(self) -> bool {
        match self {
            Pseudo::Equ | Pseudo::Org | Pseudo::Section => true,
            _ => false,
        }
    }
}

/// FCC/FCB body: bytes, strings and padding from each evaluated argument.
pub fn emit_byte_data(sections: &mut Sections, args: &[Rc<Node>]) -> Result<(), ErrorKind> {
    for arg in args {
        match &arg.kind {
            Kind::Undef => sections.emit_pad(1),
            Kind::Empty => sections.emit_imm8(0),
            Kind::Int(v) => sections.emit_imm8(*v as u8),
            Kind::Str(text) => {
                for byte in text.bytes() {
                    sections.emit_imm8(byte);
                }
            }
            _ => {
                return Err(ErrorKind::Syntax(
                    "byte data must be integers or strings".to_owned(),
                ))
            }
        }
    }
    Ok(())
}

/// FDB body: big-endian words.
pub fn emit_word_data(sections: &mut Sections, args: &[Rc<Node>]) -> Result<(), ErrorKind> {
    for arg in args {
        match &arg.kind {
            Kind::Undef => sections.emit_pad(2),
            Kind::Empty => sections.emit_imm16(0),
            Kind::Int(v) => sections.emit_imm16(*v as u16),
            _ => {
                return Err(ErrorKind::Syntax(
                    "word data must be integers".to_owned(),
                ))
            }
        }
    }
    Ok(())
}

/// RZB body: `count` zero bytes.
pub fn emit_zero_block(sections: &mut Sections, count: i64) -> Result<(), ErrorKind> {
    if count < 0 {
        return Err(ErrorKind::OutOfRange(
            "negative reservation".to_owned(),
        ));
    }
    sections.emit_pad(count as u32);
    Ok(())
}

/// RMB body: advance PC without emitting.
pub fn reserve(sections: &mut Sections, count: i64) -> Result<(), ErrorKind> {
    if count < 0 {
        return Err(ErrorKind::OutOfRange(
            "negative reservation".to_owned(),
        ));
    }
    sections.reserve(count as u16);
    Ok(())
}

/// INCLUDEBIN body: file contents as a literal byte stream.
pub fn emit_binary(sections: &mut Sections, bytes: &[u8]) {
    for byte in bytes {
        sections.emit_imm8(*byte);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> Sections {
        let mut sections = Sections::new();
        sections.begin_pass(1);
        sections.set_pc(0x1000);
        sections
    }

    #[test]
    fn byte_data_mixes_strings_and_ints() {
        let mut sections = fresh();
        let args = [
            Node::string("AB"),
            Node::int(0),
            Node::string("C"),
        ];
        emit_byte_data(&mut sections, &args).unwrap();
        assert_eq!(sections.bytes_since(0), vec![0x41, 0x42, 0x00, 0x43]);
    }

    #[test]
    fn undef_byte_data_pads() {
        let mut sections = fresh();
        let args = [Node::undef(), Node::empty(), Node::int(7)];
        emit_byte_data(&mut sections, &args).unwrap();
        assert_eq!(sections.bytes_since(0), vec![0x00, 0x00, 0x07]);
    }

    #[test]
    fn word_data_is_big_endian() {
        let mut sections = fresh();
        let args = [Node::int(0x1234), Node::undef(), Node::empty()];
        emit_word_data(&mut sections, &args).unwrap();
        assert_eq!(
            sections.bytes_since(0),
            vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn strings_are_not_words() {
        let mut sections = fresh();
        let args = [Node::string("AB")];
        assert!(emit_word_data(&mut sections, &args).is_err());
    }

    #[test]
    fn reservations_must_be_non_negative() {
        let mut sections = fresh();
        assert!(emit_zero_block(&mut sections, -1).is_err());
        assert!(reserve(&mut sections, -1).is_err());
        emit_zero_block(&mut sections, 3).unwrap();
        assert_eq!(sections.bytes_since(0), vec![0, 0, 0]);
        let pc = sections.pc();
        reserve(&mut sections, 5).unwrap();
        assert_eq!(sections.pc(), pc + 5);
    }
}
