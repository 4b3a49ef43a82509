//! Textual disassembly and reassembly.
//!
//! Each instruction renders on one line: a zero-padded three-digit index, the
//! opcode mnemonic, the canonical operand text if the opcode carries one, and
//! optionally a ` @ start..end` source-span suffix. The grammar is bit-exact:
//! `reassemble(disassemble(seq))` reproduces the instruction sequence
//! (spans excluded, since the text without suffixes does not carry them).

use core::fmt::Write as _;

use thiserror::Error;

use super::{ArmItem, ChannelRef, FailData, Instruction, InvocationData, Opcode, Operand, OperandKind};
use crate::ast::Span;
use crate::registry::{FnRef, ParametricEnv};
use crate::types::Type;
use crate::values::{Bits, Builtin, Value};

/// Renders an instruction sequence in the canonical textual form.
pub fn disassemble(instructions: &[Instruction], source_locs: bool) -> String {
    let mut out = String::new();
    for (index, instr) in instructions.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        write!(out, "{:03} {}", index, instr).unwrap();
        if source_locs {
            write!(out, " @ {}", instr.span()).unwrap();
        }
    }
    out
}

/// A reassembly failure, with the 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct DisasmError {
    pub line: usize,
    pub message: String,
}

/// Parses disassembly text back into an instruction sequence.
///
/// Span suffixes are tolerated and ignored; reassembled instructions carry
/// default spans (which instruction equality does not inspect).
pub fn reassemble(text: &str) -> Result<Vec<Instruction>, DisasmError> {
    let mut out = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let instr = parse_line(line).map_err(|message| DisasmError {
            line: index + 1,
            message,
        })?;
        out.push(instr);
    }
    Ok(out)
}

fn parse_line(line: &str) -> Result<Instruction, String> {
    // Drop a trailing source-location suffix if present.
    let line = match line.rfind(" @ ") {
        Some(at) => &line[..at],
        None => line,
    };

    let mut cur = Cursor::new(line);
    let index = cur.take_while(|c| c.is_ascii_digit());
    if index.is_empty() {
        return Err("expected instruction index".to_string());
    }
    cur.expect(' ')?;

    let mnemonic = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
    let op = Opcode::from_mnemonic(mnemonic)
        .ok_or_else(|| format!("unknown opcode `{}`", mnemonic))?;

    let instr = match op.operand_kind() {
        None => Instruction::new(op, Span::default()),
        Some(kind) => {
            cur.expect(' ')?;
            let operand = parse_operand(kind, &mut cur)?;
            Instruction::with_operand(op, operand, Span::default())
        }
    };
    if !cur.is_empty() {
        return Err(format!("trailing input `{}`", cur.rest));
    }
    Ok(instr)
}

fn parse_operand(kind: OperandKind, cur: &mut Cursor<'_>) -> Result<Operand, String> {
    match kind {
        OperandKind::Literal => Ok(Operand::Literal(parse_value(cur)?)),
        OperandKind::Slot => Ok(Operand::Slot(parse_usize(cur)?)),
        OperandKind::Count => Ok(Operand::Count(parse_usize(cur)?)),
        OperandKind::Offset => {
            let negative = match cur.bump() {
                Some('+') => false,
                Some('-') => true,
                _ => return Err("expected signed jump displacement".to_string()),
            };
            let magnitude = parse_usize(cur)? as isize;
            Ok(Operand::Offset(if negative { -magnitude } else { magnitude }))
        }
        OperandKind::Type => Ok(Operand::Type(parse_type(cur)?)),
        OperandKind::Arm => {
            if cur.eat_str("wildcard") {
                Ok(Operand::Arm(ArmItem::Wildcard))
            } else if cur.eat_str("value:") {
                Ok(Operand::Arm(ArmItem::Value(parse_value(cur)?)))
            } else if cur.eat_str("bind:") {
                Ok(Operand::Arm(ArmItem::Bind(parse_usize(cur)?)))
            } else {
                Err("expected match-arm item".to_string())
            }
        }
        OperandKind::Invocation => {
            let rest = cur.rest;
            let open = rest.find('(').ok_or("expected `(` in call operand")?;
            let close = rest.rfind(") : ").ok_or("malformed call operand")?;
            if close < open {
                return Err("malformed call operand".to_string());
            }
            let callee = rest[..open].to_string();
            let args = rest[open + 1..close].to_string();
            let mut env_cur = Cursor::new(&rest[close + 4..]);
            let bindings = parse_parametric_env(&mut env_cur)?;
            if !env_cur.is_empty() {
                return Err(format!("trailing input `{}`", env_cur.rest));
            }
            cur.rest = "";
            Ok(Operand::Invocation(InvocationData {
                callee,
                args,
                bindings,
            }))
        }
        OperandKind::Channel => {
            if cur.is_empty() {
                return Err("expected channel name".to_string());
            }
            let name = cur.rest.to_string();
            cur.rest = "";
            Ok(Operand::Channel(ChannelRef { name }))
        }
        OperandKind::Fail => {
            let (label, message) = cur
                .rest
                .split_once(": ")
                .ok_or("expected `label: message` in fail operand")?;
            let data = FailData {
                label: label.to_string(),
                message: message.to_string(),
            };
            cur.rest = "";
            Ok(Operand::Fail(data))
        }
    }
}

fn parse_usize(cur: &mut Cursor<'_>) -> Result<usize, String> {
    let digits = cur.take_while(|c| c.is_ascii_digit());
    digits
        .parse::<usize>()
        .map_err(|_| format!("expected number, found `{}`", cur.rest))
}

fn parse_value(cur: &mut Cursor<'_>) -> Result<Value, String> {
    if cur.eat_str("builtin:") {
        let name = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let builtin =
            Builtin::from_name(name).ok_or_else(|| format!("unknown builtin `{}`", name))?;
        return Ok(Value::Builtin(builtin));
    }
    if cur.eat_str("fn:") {
        let name = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
        let bindings = if cur.peek() == Some('{') {
            parse_parametric_env(cur)?
        } else {
            ParametricEnv::default()
        };
        return Ok(Value::Function(FnRef::new(name, bindings)));
    }
    match cur.peek() {
        Some('[') => {
            cur.bump();
            let mut elems = Vec::new();
            if !cur.eat(']') {
                loop {
                    elems.push(parse_value(cur)?);
                    if cur.eat(']') {
                        break;
                    }
                    cur.expect_str(", ")?;
                }
            }
            Ok(Value::Array(elems))
        }
        Some('(') => {
            cur.bump();
            let mut elems = Vec::new();
            if !cur.eat(')') {
                loop {
                    elems.push(parse_value(cur)?);
                    if cur.eat(')') {
                        break;
                    }
                    cur.expect_str(", ")?;
                }
            }
            Ok(Value::Tuple(elems))
        }
        Some(sign @ ('u' | 's')) => {
            cur.bump();
            let signed = sign == 's';
            let width = parse_usize(cur)?;
            cur.expect(':')?;
            if cur.eat_str("0x") {
                let digits = cur.take_while(|c| c.is_ascii_hexdigit());
                let bits = Bits::from_hex(signed, width, digits)
                    .ok_or_else(|| format!("bad hex literal for width {}", width))?;
                Ok(Value::Bits(bits))
            } else if signed {
                let start = cur.rest;
                cur.eat('-');
                cur.take_while(|c| c.is_ascii_digit());
                let text = &start[..start.len() - cur.rest.len()];
                let value = text
                    .parse::<i64>()
                    .map_err(|_| format!("bad signed literal `{}`", text))?;
                Ok(Value::Bits(Bits::sbits(width, value)))
            } else {
                let digits = cur.take_while(|c| c.is_ascii_digit());
                let value = digits
                    .parse::<u64>()
                    .map_err(|_| format!("bad unsigned literal `{}`", digits))?;
                Ok(Value::Bits(Bits::ubits(width, value)))
            }
        }
        _ => Err(format!("expected value, found `{}`", cur.rest)),
    }
}

fn parse_parametric_env(cur: &mut Cursor<'_>) -> Result<ParametricEnv, String> {
    cur.expect('{')?;
    let mut bindings = Vec::new();
    if !cur.eat('}') {
        loop {
            let name = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            if name.is_empty() {
                return Err("expected parametric name".to_string());
            }
            cur.expect_str(": ")?;
            let value = parse_value(cur)?;
            bindings.push((name.to_string(), value));
            if cur.eat('}') {
                break;
            }
            cur.expect_str(", ")?;
        }
    }
    Ok(ParametricEnv::new(bindings))
}

fn parse_type(cur: &mut Cursor<'_>) -> Result<Type, String> {
    let mut base = if cur.eat_str("uN[") {
        let width = parse_usize(cur)?;
        cur.expect(']')?;
        Type::u(width)
    } else if cur.eat_str("sN[") {
        let width = parse_usize(cur)?;
        cur.expect(']')?;
        Type::s(width)
    } else if cur.peek() == Some('(') {
        cur.bump();
        let mut elems = Vec::new();
        if !cur.eat(')') {
            loop {
                elems.push(parse_type(cur)?);
                if cur.eat(')') {
                    break;
                }
                cur.expect_str(", ")?;
            }
        }
        Type::Tuple(elems)
    } else if cur.eat_str("token") {
        Type::Token
    } else if cur.eat_str("chan<") {
        let payload = parse_type(cur)?;
        cur.expect('>')?;
        Type::Channel {
            payload: Box::new(payload),
        }
    } else {
        // Enum form: `Name:underlying`.
        let name = cur.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if name.is_empty() {
            return Err(format!("expected type, found `{}`", cur.rest));
        }
        cur.expect(':')?;
        let underlying = parse_type(cur)?;
        Type::Enum {
            name: name.to_string(),
            underlying: Box::new(underlying),
        }
    };
    // Array suffixes bind tighter left-to-right: `uN[8][4][2]`.
    while cur.peek() == Some('[') {
        cur.bump();
        let size = parse_usize(cur)?;
        cur.expect(']')?;
        base = Type::Array {
            elem: Box::new(base),
            size,
        };
    }
    Ok(base)
}

/// A tiny scanning cursor over one line of text.
struct Cursor<'t> {
    rest: &'t str,
}

impl<'t> Cursor<'t> {
    fn new(text: &'t str) -> Cursor<'t> {
        Cursor { rest: text }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.rest = &self.rest[ch.len_utf8()..];
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if let Some(rest) = self.rest.strip_prefix(expected) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected `{}`, found `{}`", expected, self.rest))
        }
    }

    fn expect_str(&mut self, expected: &str) -> Result<(), String> {
        if self.eat_str(expected) {
            Ok(())
        } else {
            Err(format!("expected `{}`, found `{}`", expected, self.rest))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'t str {
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}
