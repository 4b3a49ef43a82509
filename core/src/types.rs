//! Resolved concrete types.
//!
//! The type checker annotates every expression node with one of these before
//! the emitter ever sees the tree. The emitter never infers anything; it only
//! reads sizes, field orders and signedness off the annotations.

use core::fmt;

/// A fully resolved Quartz type.
///
/// All sizes are static. There are no type variables left by the time a tree
/// reaches the emitter; a tree containing an unresolved type is a front-end
/// bug, not something this crate has to defend against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A bit vector of fixed width, signed or unsigned.
    Bits { signed: bool, width: usize },
    /// A tuple; the empty tuple doubles as the unit type.
    Tuple(Vec<Type>),
    /// An array with a statically known element count.
    Array { elem: Box<Type>, size: usize },
    /// A struct; fields are in declaration order.
    Struct {
        name: String,
        fields: Vec<(String, Type)>,
    },
    /// An enum with the given underlying bits type.
    Enum { name: String, underlying: Box<Type> },
    /// The token type threaded through channel operations.
    Token,
    /// A channel carrying values of the payload type.
    Channel { payload: Box<Type> },
}

impl Type {
    /// Shorthand for an unsigned bits type.
    pub fn u(width: usize) -> Type {
        Type::Bits {
            signed: false,
            width,
        }
    }

    /// Shorthand for a signed bits type.
    pub fn s(width: usize) -> Type {
        Type::Bits {
            signed: true,
            width,
        }
    }

    /// The unit type (empty tuple).
    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Tuple(elems) if elems.is_empty())
    }

    pub fn is_bits(&self) -> bool {
        matches!(self, Type::Bits { .. })
    }

    /// The static element count, if this is an array type.
    pub fn array_size(&self) -> Option<usize> {
        match self {
            Type::Array { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// The element type at tuple position `index`, if applicable.
    pub fn tuple_elem(&self, index: usize) -> Option<&Type> {
        match self {
            Type::Tuple(elems) => elems.get(index),
            _ => None,
        }
    }

    /// Position of `field` in declaration order, if this is a struct type.
    pub fn struct_field_index(&self, field: &str) -> Option<usize> {
        match self {
            Type::Struct { fields, .. } => fields.iter().position(|(name, _)| name == field),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    /// Canonical type text, e.g. `uN[32]`, `sN[8]`, `uN[8][4]`, `(uN[8], uN[16])`.
    ///
    /// This rendering is part of the disassembly grammar (`cast` and
    /// `width_slice` operands) and must stay parseable; see
    /// [`crate::bytecode::disasm`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bits { signed, width } => {
                write!(f, "{}N[{}]", if *signed { 's' } else { 'u' }, width)
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            Type::Array { elem, size } => write!(f, "{}[{}]", elem, size),
            Type::Struct { name, .. } => write!(f, "{}", name),
            // Enums render with their underlying type so the text is
            // self-describing when it comes back through the reassembler.
            Type::Enum { name, underlying } => write!(f, "{}:{}", name, underlying),
            Type::Token => write!(f, "token"),
            Type::Channel { payload } => write!(f, "chan<{}>", payload),
        }
    }
}
