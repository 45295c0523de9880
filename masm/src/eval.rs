//! Reduces argument trees to concrete leaves.
//!
//! `eval` turns any node into an `Int`, `Float`, `Str` or `Reg` leaf, or
//! into `Undef` when something it depends on is not resolvable on the
//! current pass. Attributes survive to the root of the evaluation so size
//! hints and the immediate marker reach the encoders.

use crate::error::ErrorKind;
use crate::labels::{LocalLabels, SymbolTable};
use crate::node::{Attr, Kind, Node, Op};
use std::rc::Rc;

pub struct EvalCtx<'a> {
    pub symbols: &'a SymbolTable,
    pub locals: &'a LocalLabels,
    pub pc: u16,
    pub line: u32,
    /// Argument array of the innermost active macro expansion.
    pub frame: Option<&'a Rc<Node>>,
}

type EvalResult = Result<Rc<Node>, ErrorKind>;

impl<'a> EvalCtx<'a> {
    pub fn eval(&self, node: &Rc<Node>) -> EvalResult {
        let value = match &node.kind {
            Kind::Undef
            | Kind::Empty
            | Kind::Int(_)
            | Kind::Float(_)
            | Kind::Reg(_) => Rc::clone(node),
            Kind::Pc => Node::int(self.pc as i64),
            Kind::BackRef(name) => self.locals.back(*name, self.line),
            Kind::FwdRef(name) => self.locals.fwd(*name, self.line),
            Kind::Str(name) => self.symbols.get(name),
            Kind::Interp(index) => self.frame_arg(*index)?,
            Kind::Id(parts) => match self.flatten(parts)? {
                Some(name) => self.symbols.get(&name),
                None => Node::undef(),
            },
            Kind::Text(parts) => Node::string(self.flatten_text(parts)?),
            Kind::Oper(op, children) => self.eval_oper(*op, children)?,
            Kind::Array(children) => {
                let mut evaluated = Vec::with_capacity(children.len());
                for child in children {
                    evaluated.push(self.eval(child)?);
                }
                Node::array(evaluated)
            }
        };
        Ok(if node.attr != Attr::None {
            Node::reattr(&value, node.attr)
        } else {
            value
        })
    }

    /// Evaluates to an integer, truncating floats. `None` means the value
    /// is not resolvable on this pass.
    pub fn eval_int(&self, node: &Rc<Node>) -> Result<Option<i64>, ErrorKind> {
        let value = self.eval(node)?;
        match value.kind {
            Kind::Undef => Ok(None),
            Kind::Int(v) => Ok(Some(v)),
            Kind::Float(v) => Ok(Some(v as i64)),
            _ => Err(ErrorKind::Syntax("integer expected".to_owned())),
        }
    }

    /// Evaluates a node to its textual name, without resolving it through
    /// the symbol table: the form wanted by EXPORT, SECTION and the
    /// macro-name position.
    pub fn eval_name(&self, node: &Rc<Node>) -> Result<Option<String>, ErrorKind> {
        match &node.kind {
            Kind::Str(s) => Ok(Some(s.clone())),
            Kind::Int(v) => Ok(Some(v.to_string())),
            Kind::Interp(index) => {
                let arg = self.frame_arg(*index)?;
                Ok(fragment_text(&arg))
            }
            Kind::Id(parts) | Kind::Text(parts) => self.flatten(parts),
            _ => Ok(None),
        }
    }

    fn frame_arg(&self, index: usize) -> EvalResult {
        let frame = self.frame.as_ref().ok_or_else(|| {
            ErrorKind::Syntax("macro argument reference outside macro".to_owned())
        })?;
        let children = match &frame.kind {
            Kind::Array(children) => children,
            _ => return Err(ErrorKind::Syntax("malformed macro frame".to_owned())),
        };
        if index == 0 || index > children.len() {
            return Err(ErrorKind::Syntax(format!(
                "macro argument &{} out of range",
                index
            )));
        }
        Ok(Rc::clone(&children[index - 1]))
    }

    /// Text of one fragment of an identifier or string build. `Str`
    /// fragments are literal text here, never symbol references.
    fn part_text(&self, part: &Rc<Node>) -> Result<Option<String>, ErrorKind> {
        match &part.kind {
            Kind::Str(text) => Ok(Some(text.clone())),
            Kind::Interp(index) => Ok(fragment_text(&self.frame_arg(*index)?)),
            _ => Ok(fragment_text(&self.eval(part)?)),
        }
    }

    /// Concatenates fragments into one string; `None` as soon as any
    /// fragment is unresolvable.
    fn flatten(&self, parts: &[Rc<Node>]) -> Result<Option<String>, ErrorKind> {
        let mut out = String::new();
        for part in parts {
            match self.part_text(part)? {
                Some(text) => out.push_str(&text),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// Like `flatten`, but unresolvable fragments keep their source
    /// rendering instead of poisoning the whole string.
    fn flatten_text(&self, parts: &[Rc<Node>]) -> Result<String, ErrorKind> {
        let mut out = String::new();
        for part in parts {
            match self.part_text(part)? {
                Some(text) => out.push_str(&text),
                None => out.push_str(&raw_text(part)),
            }
        }
        Ok(out)
    }

    fn eval_oper(&self, op: Op, children: &[Rc<Node>]) -> EvalResult {
        let mut values = Vec::with_capacity(children.len());
        for child in children {
            let value = self.eval(child)?;
            if value.is_undef() {
                return Ok(Node::undef());
            }
            values.push(value);
        }
        match values.len() {
            1 => eval_unary(op, &values[0]),
            2 => eval_binary(op, &values[0], &values[1]),
            n => Err(ErrorKind::Syntax(format!("operator with {} operands", n))),
        }
    }
}

/// Rendering of an evaluated leaf inside an identifier or string build.
fn fragment_text(node: &Rc<Node>) -> Option<String> {
    match &node.kind {
        Kind::Str(s) => Some(s.clone()),
        Kind::Int(v) => Some(v.to_string()),
        Kind::Float(v) => Some(v.to_string()),
        Kind::Reg(r) => Some(r.to_string()),
        _ => None,
    }
}

/// Source-shaped rendering of an unevaluated fragment.
fn raw_text(node: &Rc<Node>) -> String {
    match &node.kind {
        Kind::Interp(index) => format!("&{}", index),
        Kind::Str(s) => s.clone(),
        _ => String::new(),
    }
}

fn numeric(node: &Rc<Node>) -> Result<(i64, Option<f64>), ErrorKind> {
    match node.kind {
        Kind::Int(v) => Ok((v, None)),
        Kind::Float(v) => Ok((v as i64, Some(v))),
        _ => Err(ErrorKind::Syntax("number expected in expression".to_owned())),
    }
}

fn eval_unary(op: Op, value: &Rc<Node>) -> EvalResult {
    let (int, float) = numeric(value)?;
    Ok(match op {
        Op::Neg => match float {
            Some(f) => Node::float(-f),
            None => Node::int(int.wrapping_neg()),
        },
        Op::Com => Node::int(!int),
        Op::Pos => Rc::clone(value),
        _ => {
            return Err(ErrorKind::Syntax(
                "binary operator used with one operand".to_owned(),
            ))
        }
    })
}

fn eval_binary(op: Op, lhs: &Rc<Node>, rhs: &Rc<Node>) -> EvalResult {
    let (li, lf) = numeric(lhs)?;
    let (ri, rf) = numeric(rhs)?;
    let as_float = lf.is_some() || rf.is_some();
    let (a, b) = (
        lf.unwrap_or(li as f64),
        rf.unwrap_or(ri as f64),
    );

    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div if as_float => {
            if op == Op::Div && b == 0.0 {
                return Err(ErrorKind::NumericDomain("division by zero".to_owned()));
            }
            Ok(Node::float(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                _ => a / b,
            }))
        }
        Op::Add => Ok(Node::int(li.wrapping_add(ri))),
        Op::Sub => Ok(Node::int(li.wrapping_sub(ri))),
        Op::Mul => Ok(Node::int(li.wrapping_mul(ri))),
        Op::Div => {
            if ri == 0 {
                Err(ErrorKind::NumericDomain("division by zero".to_owned()))
            } else {
                Ok(Node::int(li.wrapping_div(ri)))
            }
        }
        Op::BitAnd => Ok(Node::int(li & ri)),
        Op::BitOr => Ok(Node::int(li | ri)),
        Op::BitXor => Ok(Node::int(li ^ ri)),
        Op::Shl | Op::Shr => {
            if ri < 0 || ri > 63 {
                Err(ErrorKind::NumericDomain("shift count out of range".to_owned()))
            } else if op == Op::Shl {
                Ok(Node::int(li.wrapping_shl(ri as u32)))
            } else {
                Ok(Node::int(li >> ri))
            }
        }
        Op::Neg | Op::Com | Op::Pos => Err(ErrorKind::Syntax(
            "unary operator used with two operands".to_owned(),
        )),
    }
}

/// Truncates any `Float` elements of an argument array to `Int`, for
/// emission contexts that do not accept floats.
pub fn args_float_to_int(args: &Rc<Node>) -> Rc<Node> {
    match &args.kind {
        Kind::Array(children) => {
            let converted = children
                .iter()
                .map(|child| match child.kind {
                    Kind::Float(v) => Node::reattr(&Node::int(v as i64), child.attr),
                    _ => Rc::clone(child),
                })
                .collect();
            Node::reattr(&Node::array(converted), args.attr)
        }
        _ => Rc::clone(args),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::Op;

    fn ctx<'a>(
        symbols: &'a SymbolTable,
        locals: &'a LocalLabels,
    ) -> EvalCtx<'a> {
        EvalCtx {
            symbols,
            locals,
            pc: 0x1000,
            line: 10,
            frame: None,
        }
    }

    fn empty_ctx_eval(node: &Rc<Node>) -> EvalResult {
        let symbols = SymbolTable::new();
        let locals = LocalLabels::new();
        ctx(&symbols, &locals).eval(node)
    }

    #[test]
    fn arithmetic_on_ints() {
        let n = Node::oper(Op::Add, vec![Node::int(2), Node::int(3)]);
        assert_eq!(empty_ctx_eval(&n).unwrap().int_value(), Some(5));
        let n = Node::oper(Op::Shl, vec![Node::int(1), Node::int(4)]);
        assert_eq!(empty_ctx_eval(&n).unwrap().int_value(), Some(16));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let n = Node::oper(Op::Mul, vec![Node::float(1.5), Node::int(4)]);
        match empty_ctx_eval(&n).unwrap().kind {
            Kind::Float(v) => assert!((v - 6.0).abs() < 1e-9),
            ref other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn division_by_zero_is_a_numeric_error() {
        let n = Node::oper(Op::Div, vec![Node::int(1), Node::int(0)]);
        match empty_ctx_eval(&n) {
            Err(ErrorKind::NumericDomain(_)) => {}
            other => panic!("expected numeric-domain error, got {:?}", other),
        }
    }

    #[test]
    fn undef_operand_poisons_the_expression() {
        let n = Node::oper(Op::Add, vec![Node::string("nowhere"), Node::int(1)]);
        assert!(empty_ctx_eval(&n).unwrap().is_undef());
    }

    #[test]
    fn pc_reads_the_section_counter() {
        assert_eq!(empty_ctx_eval(&Node::pc()).unwrap().int_value(), Some(0x1000));
    }

    #[test]
    fn symbols_resolve_in_value_position() {
        let mut symbols = SymbolTable::new();
        symbols.set("answer", Node::int(42));
        let locals = LocalLabels::new();
        let c = ctx(&symbols, &locals);
        assert_eq!(
            c.eval(&Node::string("answer")).unwrap().int_value(),
            Some(42)
        );
        // ... but not in name position.
        assert_eq!(
            c.eval_name(&Node::string("answer")).unwrap(),
            Some("answer".to_owned())
        );
    }

    #[test]
    fn local_refs_search_by_line() {
        let symbols = SymbolTable::new();
        let mut locals = LocalLabels::new();
        locals.set(1, 5, Node::int(0x2000));
        locals.set(1, 15, Node::int(0x3000));
        let c = ctx(&symbols, &locals);
        assert_eq!(c.eval(&Node::back_ref(1)).unwrap().int_value(), Some(0x2000));
        assert_eq!(c.eval(&Node::fwd_ref(1)).unwrap().int_value(), Some(0x3000));
    }

    #[test]
    fn interp_resolves_against_the_frame() {
        let symbols = SymbolTable::new();
        let locals = LocalLabels::new();
        let frame = Node::array(vec![Node::int(7), Node::string("x")]);
        let c = EvalCtx {
            symbols: &symbols,
            locals: &locals,
            pc: 0,
            line: 0,
            frame: Some(&frame),
        };
        assert_eq!(c.eval(&Node::interp(1)).unwrap().int_value(), Some(7));
        match c.eval(&Node::interp(3)) {
            Err(ErrorKind::Syntax(_)) => {}
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn attrs_survive_evaluation() {
        let n = Node::with_attr(
            Kind::Oper(Op::Add, vec![Node::int(0x10), Node::int(0x45)]),
            Attr::EightBit,
        );
        let v = empty_ctx_eval(&n).unwrap();
        assert_eq!(v.int_value(), Some(0x55));
        assert_eq!(v.attr, Attr::EightBit);
    }

    #[test]
    fn float_args_truncate_for_emission() {
        let args = Node::array(vec![Node::float(3.7), Node::int(1)]);
        let converted = args_float_to_int(&args);
        match &converted.kind {
            Kind::Array(children) => {
                assert_eq!(children[0].int_value(), Some(3));
                assert_eq!(children[1].int_value(), Some(1));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }
}
