//! Turns source text into parsed lines.
//!
//! Parsing is line-oriented: every source line is matched against the
//! `line` grammar rule on its own, so a malformed line produces a single
//! diagnostic and a blank placeholder that keeps line numbering stable for
//! the rest of the file.

use crate::error::{Diagnostic, ErrorKind};
use crate::node::{Attr, Kind, Node, Op};
use m6809::RegisterId;
use matches::debug_assert_matches;
use num::Num;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::rc::Rc;

#[derive(Parser)]
#[grammar = "asm.pest"]
pub struct AsmParser;

/// One parsed source line: optional label, optional opcode, optional
/// argument array, plus the original text.
#[derive(Debug)]
pub struct Line {
    pub label: Option<Rc<Node>>,
    pub opcode: Option<Rc<Node>>,
    pub args: Option<Rc<Node>>,
    pub text: String,
    pub number: u32,
}

impl Line {
    pub fn blank(text: &str, number: u32) -> Line {
        Line {
            label: None,
            opcode: None,
            args: None,
            text: text.to_owned(),
            number,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.label.is_none() && self.opcode.is_none() && self.args.is_none()
    }
}

/// An ordered list of parsed lines: a file or a macro body.
#[derive(Debug)]
pub struct Program {
    pub file: String,
    pub lines: Vec<Rc<Line>>,
}

/// Parses a whole source file. Unparsable lines are reported and replaced
/// with blanks so every pass sees an identical line sequence.
pub fn parse_program(file: &str, source: &str) -> (Program, Vec<Diagnostic>) {
    let mut lines = Vec::new();
    let mut diagnostics = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let number = (index + 1) as u32;
        match parse_line(raw, number) {
            Ok(line) => lines.push(Rc::new(line)),
            Err(message) => {
                diagnostics.push(Diagnostic::new(
                    ErrorKind::Syntax(message),
                    file,
                    number,
                    raw,
                ));
                lines.push(Rc::new(Line::blank(raw, number)));
            }
        }
    }
    (
        Program {
            file: file.to_owned(),
            lines,
        },
        diagnostics,
    )
}

pub fn parse_line(text: &str, number: u32) -> Result<Line, String> {
    let mut pairs =
        AsmParser::parse(Rule::line, text).map_err(|e| e.variant.message().into_owned())?;
    let line_pair = pairs.next().unwrap();

    let mut line = Line::blank(text, number);
    for part in line_pair.into_inner() {
        match part.as_rule() {
            Rule::stmt_line => lower_stmt_line(part, &mut line)?,
            Rule::star_comment | Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    Ok(line)
}

fn lower_stmt_line(pair: Pair<Rule>, line: &mut Line) -> Result<(), String> {
    debug_assert_matches!(pair.as_rule(), Rule::stmt_line);
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::label_field => {
                let inner = part.into_inner().next().unwrap();
                line.label = Some(match inner.as_rule() {
                    Rule::local_label => Node::int(parse_radix(inner.as_str(), 10)?),
                    Rule::name => lower_name(inner),
                    _ => unreachable!(),
                });
            }
            Rule::statement => {
                let mut inner = part.into_inner();
                line.opcode = Some(lower_name(inner.next().unwrap()));
                if let Some(args) = inner.next() {
                    line.args = lower_args(args)?;
                }
            }
            Rule::comment => {}
            _ => unreachable!(),
        }
    }
    Ok(())
}

fn lower_name(pair: Pair<Rule>) -> Rc<Node> {
    debug_assert_matches!(pair.as_rule(), Rule::name);
    let mut parts: Vec<Rc<Node>> = Vec::new();
    for piece in pair.into_inner() {
        match piece.as_rule() {
            Rule::name_frag => parts.push(Node::string(piece.as_str())),
            Rule::interp => parts.push(Node::interp(parse_interp(piece.as_str()))),
            _ => unreachable!(),
        }
    }
    if parts.len() == 1 {
        Rc::clone(&parts[0])
    } else {
        Node::new(Kind::Id(parts))
    }
}

fn parse_interp(text: &str) -> usize {
    text[1..].parse().unwrap_or(0)
}

/// An args match may be vacuous (the grammar lets the slot list be empty
/// so `NOP ; note` parses); treat that as no arguments at all.
fn lower_args(pair: Pair<Rule>) -> Result<Option<Rc<Node>>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::args);
    if pair.as_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(lower_slot_list(pair)?))
}

fn lower_slot_list(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    let mut slots = Vec::new();
    for slot in pair.into_inner() {
        debug_assert_matches!(slot.as_rule(), Rule::arg_slot);
        match slot.into_inner().next() {
            Some(arg) => slots.push(lower_arg(arg)?),
            None => slots.push(Node::empty()),
        }
    }
    Ok(Node::array(slots))
}

fn lower_arg(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::arg);
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::indirect => lower_slot_list(inner),
        Rule::auto_reg => {
            let form = inner.into_inner().next().unwrap();
            let attr = match form.as_rule() {
                Rule::predec => Attr::PreDec,
                Rule::predec2 => Attr::PreDec2,
                Rule::postinc => Attr::PostInc,
                Rule::postinc2 => Attr::PostInc2,
                _ => unreachable!(),
            };
            let register = lower_register(form.into_inner().next().unwrap())?;
            Ok(Node::with_attr(Kind::Reg(register), attr))
        }
        Rule::immediate => {
            let expr = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .unwrap();
            Ok(Node::reattr(&lower_expr(expr)?, Attr::Immediate))
        }
        Rule::sized => {
            let mut attr = Attr::None;
            let mut node = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::size_hint => {
                        attr = match part.as_str() {
                            "<<" => Attr::FiveBit,
                            "<" => Attr::EightBit,
                            ">" => Attr::SixteenBit,
                            _ => unreachable!(),
                        }
                    }
                    Rule::expr => node = Some(lower_expr(part)?),
                    _ => unreachable!(),
                }
            }
            let node = node.unwrap();
            Ok(if attr == Attr::None {
                node
            } else {
                Node::reattr(&node, attr)
            })
        }
        _ => unreachable!(),
    }
}

fn lower_register(pair: Pair<Rule>) -> Result<RegisterId, String> {
    debug_assert_matches!(pair.as_rule(), Rule::register);
    pair.as_str()
        .to_uppercase()
        .parse()
        .map_err(|e| format!("{}", e))
}

fn lower_expr(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::expr);
    lower_binary(pair.into_inner().next().unwrap())
}

/// Folds one precedence layer: `operand (op operand)*`, left-associative.
fn lower_binary(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    let mut inner = pair.into_inner();
    let mut node = lower_operand(inner.next().unwrap())?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "|" => Op::BitOr,
            "^" => Op::BitXor,
            "&" => Op::BitAnd,
            "<<" => Op::Shl,
            ">>" => Op::Shr,
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            other => return Err(format!("unknown operator {}", other)),
        };
        let rhs = lower_operand(inner.next().unwrap())?;
        node = Node::oper(op, vec![node, rhs]);
    }
    Ok(node)
}

fn lower_operand(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    match pair.as_rule() {
        Rule::or_e | Rule::xor_e | Rule::and_e | Rule::sh_e | Rule::add_e | Rule::mul_e => {
            lower_binary(pair)
        }
        Rule::unary => lower_unary(pair),
        _ => unreachable!(),
    }
}

fn lower_unary(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::unary);
    let mut ops = Vec::new();
    let mut node = None;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::un_op => ops.push(match part.as_str() {
                "-" => Op::Neg,
                "~" => Op::Com,
                "+" => Op::Pos,
                _ => unreachable!(),
            }),
            Rule::primary => node = Some(lower_primary(part)?),
            _ => unreachable!(),
        }
    }
    let mut node = node.unwrap();
    for op in ops.into_iter().rev() {
        node = Node::oper(op, vec![node]);
    }
    Ok(node)
}

fn lower_primary(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::primary);
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::paren => lower_expr(inner.into_inner().next().unwrap()),
        Rule::backref => {
            let text = inner.as_str();
            Ok(Node::back_ref(parse_radix(&text[..text.len() - 1], 10)?))
        }
        Rule::fwdref => {
            let text = inner.as_str();
            Ok(Node::fwd_ref(parse_radix(&text[..text.len() - 1], 10)?))
        }
        Rule::number => lower_number(inner),
        Rule::string => Ok(lower_string(inner.as_str())),
        Rule::pcref => Ok(Node::pc()),
        Rule::register => Ok(Node::reg(lower_register(inner)?)),
        Rule::name => Ok(lower_name(inner)),
        _ => unreachable!(),
    }
}

fn lower_number(pair: Pair<Rule>) -> Result<Rc<Node>, String> {
    debug_assert_matches!(pair.as_rule(), Rule::number);
    let inner = pair.into_inner().next().unwrap();
    let text = inner.as_str();
    match inner.as_rule() {
        Rule::hex => Ok(Node::int(parse_radix(strip_prefix(text, "$"), 16)?)),
        Rule::bin => Ok(Node::int(parse_radix(strip_prefix(text, "%"), 2)?)),
        Rule::oct => Ok(Node::int(parse_radix(strip_prefix(text, "@"), 8)?)),
        Rule::dec => Ok(Node::int(parse_radix(text, 10)?)),
        Rule::float => text
            .parse::<f64>()
            .map(Node::float)
            .map_err(|e| format!("bad float literal: {}", e)),
        Rule::char_lit => {
            let c = text.chars().nth(1).unwrap();
            Ok(Node::int(c as i64))
        }
        _ => unreachable!(),
    }
}

/// Drops a one-character prefix, or the two-character `0x`-style one.
fn strip_prefix<'t>(text: &'t str, short: &str) -> &'t str {
    if text.starts_with(short) {
        &text[1..]
    } else {
        &text[2..]
    }
}

fn parse_radix(text: &str, radix: u32) -> Result<i64, String> {
    <i64 as Num>::from_str_radix(text, radix)
        .map_err(|e| format!("bad integer literal: {}", e))
}

/// A string literal; `&N` sequences inside it become interpolations.
fn lower_string(quoted: &str) -> Rc<Node> {
    let content = &quoted[1..quoted.len() - 1];
    let mut parts: Vec<Rc<Node>> = Vec::new();
    let mut fragment = String::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' && chars.peek().map_or(false, |d| d.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(d) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(*d);
                    chars.next();
                } else {
                    break;
                }
            }
            if !fragment.is_empty() {
                parts.push(Node::string(std::mem::replace(&mut fragment, String::new())));
            }
            parts.push(Node::interp(digits.parse().unwrap_or(0)));
        } else {
            fragment.push(c);
        }
    }
    if parts.is_empty() {
        return Node::string(fragment);
    }
    if !fragment.is_empty() {
        parts.push(Node::string(fragment));
    }
    Node::new(Kind::Text(parts))
}
