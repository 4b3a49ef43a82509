//! Immutable immediate values.
//!
//! These are the units the interpreter manipulates and the payload of
//! `literal` instructions. The emitter constructs and compares them but never
//! computes with them; constant folding happened upstream in the type oracle.

mod bits;

pub use bits::Bits;

use core::fmt;

use crate::registry::FnRef;

/// An immediate value: the operand of a `literal` instruction and the thing
/// pattern tests compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An arbitrary-width bit vector. Enum members are represented as the
    /// bits of their underlying type.
    Bits(Bits),
    /// A tuple of values; the empty tuple is the unit value.
    Tuple(Vec<Value>),
    /// An array of values.
    Array(Vec<Value>),
    /// A builtin function used as a callee.
    Builtin(Builtin),
    /// A resolved (monomorphized) user function used as a callee.
    Function(FnRef),
}

impl Value {
    /// The unit value.
    pub fn unit() -> Value {
        Value::Tuple(Vec::new())
    }

    /// Shorthand for an unsigned bits value.
    pub fn ubits(width: usize, value: u64) -> Value {
        Value::Bits(Bits::ubits(width, value))
    }

    /// Shorthand for a signed bits value.
    pub fn sbits(width: usize, value: i64) -> Value {
        Value::Bits(Bits::sbits(width, value))
    }

    /// A boolean as its canonical `u1` encoding.
    pub fn bool(value: bool) -> Value {
        Value::Bits(Bits::from_bool(value))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Tuple(elems) if elems.is_empty())
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(bits) => Some(bits),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Canonical value text; part of the disassembly grammar.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bits(bits) => write!(f, "{}", bits),
            Value::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            Value::Array(elems) => {
                write!(f, "[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Value::Builtin(builtin) => write!(f, "builtin:{}", builtin.name()),
            Value::Function(fn_ref) => write!(f, "{}", fn_ref),
        }
    }
}

/// The closed set of builtin functions the emitter knows by name.
///
/// Channel operations are listed here because they are resolved through the
/// same name table, but they never become `call` instructions; invocation
/// lowering routes them to their dedicated opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    AssertEq,
    Range,
    Trace,
    Send,
    SendIf,
    Recv,
    RecvIf,
    RecvNonBlocking,
    Join,
}

impl Builtin {
    pub const ALL: [Builtin; 9] = [
        Builtin::AssertEq,
        Builtin::Range,
        Builtin::Trace,
        Builtin::Send,
        Builtin::SendIf,
        Builtin::Recv,
        Builtin::RecvIf,
        Builtin::RecvNonBlocking,
        Builtin::Join,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::AssertEq => "assert_eq",
            Builtin::Range => "range",
            Builtin::Trace => "trace",
            Builtin::Send => "send",
            Builtin::SendIf => "send_if",
            Builtin::Recv => "recv",
            Builtin::RecvIf => "recv_if",
            Builtin::RecvNonBlocking => "recv_non_blocking",
            Builtin::Join => "join",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }

    /// True for the builtins that lower to dedicated channel opcodes.
    pub fn is_channel_op(&self) -> bool {
        matches!(
            self,
            Builtin::Send
                | Builtin::SendIf
                | Builtin::Recv
                | Builtin::RecvIf
                | Builtin::RecvNonBlocking
                | Builtin::Join
        )
    }
}
