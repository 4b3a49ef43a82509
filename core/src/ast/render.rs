//! Compact source-like rendering of expressions.
//!
//! Used for the call-site text carried by `call` instructions. This is a
//! diagnostic aid, not a pretty printer: statement-bearing forms render as
//! `{ .. }` rather than reproducing their bodies.

use core::fmt;

use super::{BinaryOp, Callee, Expr, ExprKind, IndexOp, UnaryOp};

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Concat => "++",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

impl fmt::Display for Callee<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Name(name) => write!(f, "{}", name),
            Callee::ColonRef { subject, member } => write!(f, "{}::{}", subject, member),
        }
    }
}

impl fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write!(f, "{}", value),
            ExprKind::NameRef(name) | ExprKind::ConstRef(name) => write!(f, "{}", name),
            ExprKind::ColonRef { subject, member } => write!(f, "{}::{}", subject, member),
            ExprKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, op.symbol(), rhs)
            }
            ExprKind::Unary { op, operand } => {
                let sym = match op {
                    UnaryOp::Negate => '-',
                    UnaryOp::Invert => '!',
                };
                write!(f, "{}{}", sym, operand)
            }
            ExprKind::Block { .. } => write!(f, "{{ .. }}"),
            ExprKind::Tuple { elements } => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            ExprKind::Array { elements } => {
                write!(f, "[")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            ExprKind::Index { subject, index } => match index {
                IndexOp::Element(index) => write!(f, "{}[{}]", subject, index),
                IndexOp::Slice { start, limit } => {
                    write!(f, "{}[{}:{}]", subject, start, limit)
                }
                IndexOp::Width { start, width } => {
                    write!(f, "{}[{} +: {}]", subject, start, width)
                }
            },
            ExprKind::TupleIndex { subject, index } => {
                write!(f, "{}.{}", subject, index.as_u64().unwrap_or(0))
            }
            ExprKind::Attr { subject, field } => write!(f, "{}.{}", subject, field),
            ExprKind::StructInstance { fields } => {
                write!(f, "{} {{ ", self.ty)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            ExprKind::SplatStructInstance { base, fields } => {
                write!(f, "{} {{ ", self.ty)?;
                for (name, value) in fields.iter() {
                    write!(f, "{}: {}, ", name, value)?;
                }
                write!(f, "..{} }}", base)
            }
            ExprKind::Conditional { cond, .. } => write!(f, "if {} {{ .. }}", cond),
            ExprKind::Match { scrutinee, .. } => write!(f, "match {} {{ .. }}", scrutinee),
            ExprKind::For(_) => write!(f, "for {{ .. }}"),
            ExprKind::UnrollFor(_) => write!(f, "unroll_for! {{ .. }}"),
            ExprKind::Range { start, limit } => write!(f, "{}..{}", start, limit),
            ExprKind::Cast { operand } => write!(f, "{} as {}", operand, self.ty),
            ExprKind::Invocation { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstBuilder, BinaryOp};
    use crate::types::Type;
    use bumpalo::Bump;

    #[test]
    fn renders_call_site_shapes() {
        let arena = Bump::new();
        let b = AstBuilder::new(&arena);

        let add = b.binary(
            Type::u(32),
            BinaryOp::Add,
            b.name(Type::u(32), "foo"),
            b.ulit(32, 2),
        );
        assert_eq!(add.to_string(), "foo + u32:2");

        let call = b.call(Type::unit(), "assert_eq", &[b.name(Type::u(32), "foo"), b.ulit(32, 2)]);
        assert_eq!(call.to_string(), "assert_eq(foo, u32:2)");
    }
}
