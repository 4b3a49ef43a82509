//! The typed expression tree.
//!
//! This is the emitter's input: every node already carries a resolved
//! concrete [`Type`], names are plain strings (uniqueness within a scope is
//! the front end's problem), and compile-time constants arrive pre-evaluated
//! as [`Value`] literals. Nodes are arena-allocated and immutable; a tree is
//! built once by the front end (or by [`AstBuilder`] in tests) and then only
//! read.

mod render;

use core::fmt;
use core::ops::Range;

use bumpalo::Bump;

use crate::registry::ParametricEnv;
use crate::types::Type;
use crate::values::{Bits, Value};

/// A byte range into the original source text.
///
/// Carried on every node and every emitted instruction for diagnostics; it
/// has no semantic weight and is excluded from instruction equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span(pub Range<usize>);

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span(start..end)
    }

    pub fn combine(a: &Span, b: &Span) -> Span {
        Span::new(a.0.start, b.0.end)
    }
}

impl Default for Span {
    fn default() -> Span {
        Span(0..0)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.0.start, self.0.end)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Negate,
    /// Bitwise inversion.
    Invert,
}

/// A typed expression node.
#[derive(Debug, Clone)]
pub struct Expr<'a> {
    pub ty: Type,
    pub kind: ExprKind<'a>,
    pub span: Span,
}

/// The closed set of expression forms the emitter can lower.
///
/// The emitter matches on this exhaustively, so a new node kind cannot be
/// added without the compiler pointing at every place that must learn about
/// it.
#[derive(Debug, Clone)]
pub enum ExprKind<'a> {
    /// A pre-evaluated constant (number, string as a `u8` array, constant
    /// array, enum member, ...).
    Literal(Value),
    /// A reference to a bound name.
    NameRef(&'a str),
    /// A reference to a module-level constant.
    ConstRef(&'a str),
    /// A qualified reference: imported constant, enum member, or imported
    /// enum member (`subject` may itself be `module::Enum`).
    ColonRef { subject: &'a str, member: &'a str },
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    Block {
        statements: &'a [Statement<'a>],
    },
    Tuple {
        elements: &'a [&'a Expr<'a>],
    },
    Array {
        elements: &'a [&'a Expr<'a>],
    },
    Index {
        subject: &'a Expr<'a>,
        index: IndexOp<'a>,
    },
    /// Tuple element access with a constant position.
    TupleIndex {
        subject: &'a Expr<'a>,
        index: Bits,
    },
    /// Struct field access.
    Attr {
        subject: &'a Expr<'a>,
        field: &'a str,
    },
    /// Struct construction; field order in the node may differ from
    /// declaration order (the emitter reorders via the node's type).
    StructInstance {
        fields: &'a [(&'a str, &'a Expr<'a>)],
    },
    /// Functional-update struct construction: unmentioned fields are read
    /// off `base` by position.
    SplatStructInstance {
        base: &'a Expr<'a>,
        fields: &'a [(&'a str, &'a Expr<'a>)],
    },
    /// `if`/`else if`/`else` chain; a nested chain arrives as another
    /// `Conditional` in `alternate`. A missing alternate is unit-valued.
    Conditional {
        cond: &'a Expr<'a>,
        consequent: &'a Expr<'a>,
        alternate: Option<&'a Expr<'a>>,
    },
    Match {
        scrutinee: &'a Expr<'a>,
        arms: &'a [MatchArm<'a>],
    },
    /// A bounded loop over a statically sized iterable.
    For(LoopExpr<'a>),
    /// A loop unrolled at emission time; the iterable must be a
    /// compile-time-known sequence.
    UnrollFor(LoopExpr<'a>),
    /// A half-open range `start..limit`; its type is a statically sized
    /// array.
    Range {
        start: &'a Expr<'a>,
        limit: &'a Expr<'a>,
    },
    /// A cast; the target type is the node's own type.
    Cast { operand: &'a Expr<'a> },
    Invocation {
        callee: Callee<'a>,
        args: &'a [&'a Expr<'a>],
        /// Concrete parametric bindings for this call site, resolved by the
        /// type oracle. Empty for non-parametric callees.
        bindings: ParametricEnv,
    },
}

/// The three index forms that share the `subject[...]` surface syntax.
#[derive(Debug, Clone)]
pub enum IndexOp<'a> {
    /// Array element access with a computed index.
    Element(&'a Expr<'a>),
    /// Bit slice with bounds pre-resolved by the type oracle (negative
    /// indices already folded away).
    Slice { start: Bits, limit: Bits },
    /// Width slice: a computed start position and a static result type.
    Width {
        start: &'a Expr<'a>,
        width: Type,
    },
}

/// The callee position of an invocation, as a tagged variant.
#[derive(Debug, Clone)]
pub enum Callee<'a> {
    /// A plain name: builtin or module-local function.
    Name(&'a str),
    /// An imported function.
    ColonRef { subject: &'a str, member: &'a str },
}

/// One statement of a block.
#[derive(Debug, Clone)]
pub enum Statement<'a> {
    Let {
        pattern: &'a BindPattern<'a>,
        value: &'a Expr<'a>,
        span: Span,
    },
    Expr(&'a Expr<'a>),
}

/// A destructuring pattern for `let` bindings and loop carries.
#[derive(Debug, Clone)]
pub enum BindPattern<'a> {
    /// Binds one fresh slot.
    Name(&'a str),
    /// Binds nothing; the value is discarded.
    Wildcard,
    /// Expects a tuple of matching arity; elements destructure recursively.
    Tuple(&'a [&'a BindPattern<'a>]),
}

/// One arm of a `match` expression.
#[derive(Debug, Clone)]
pub struct MatchArm<'a> {
    pub pattern: MatchPattern<'a>,
    pub body: &'a Expr<'a>,
    pub span: Span,
}

/// A match-arm discriminator.
#[derive(Debug, Clone)]
pub enum MatchPattern<'a> {
    /// Matches iff the scrutinee equals the value.
    Literal(Value),
    /// Always matches, binds nothing.
    Wildcard,
    /// Always matches, binds the scrutinee to a fresh slot.
    Binding(&'a str),
}

impl MatchPattern<'_> {
    /// True when the arm cannot fail to match.
    pub fn is_irrefutable(&self) -> bool {
        matches!(self, MatchPattern::Wildcard | MatchPattern::Binding(_))
    }
}

/// The common fields of `For` and `UnrollFor`.
#[derive(Debug, Clone)]
pub struct LoopExpr<'a> {
    /// The `(element, accumulator)` carry pattern.
    pub pattern: &'a BindPattern<'a>,
    pub iterable: &'a Expr<'a>,
    /// Initial accumulator value.
    pub init: &'a Expr<'a>,
    pub body: &'a Expr<'a>,
}

/// A function parameter.
#[derive(Debug, Clone)]
pub struct Param<'a> {
    pub name: &'a str,
    pub ty: Type,
    pub span: Span,
}

/// One function (or process lifecycle) body ready for emission.
#[derive(Debug, Clone)]
pub struct Function<'a> {
    pub name: &'a str,
    pub params: &'a [Param<'a>],
    pub body: &'a Expr<'a>,
    pub span: Span,
}

/// Arena-backed construction helper for typed trees.
///
/// The real front end builds trees directly; tests (and embedders without a
/// parser) use this to keep node construction readable.
#[derive(Copy, Clone)]
pub struct AstBuilder<'a> {
    arena: &'a Bump,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a Bump) -> AstBuilder<'a> {
        AstBuilder { arena }
    }

    pub fn expr(&self, ty: Type, kind: ExprKind<'a>, span: Span) -> &'a Expr<'a> {
        self.arena.alloc(Expr { ty, kind, span })
    }

    pub fn str(&self, s: &str) -> &'a str {
        self.arena.alloc_str(s)
    }

    pub fn exprs(&self, elements: &[&'a Expr<'a>]) -> &'a [&'a Expr<'a>] {
        self.arena.alloc_slice_copy(elements)
    }

    pub fn lit(&self, ty: Type, value: Value) -> &'a Expr<'a> {
        self.expr(ty, ExprKind::Literal(value), Span::default())
    }

    /// An unsigned bits literal, e.g. `ulit(32, 42)` for `u32:42`.
    pub fn ulit(&self, width: usize, value: u64) -> &'a Expr<'a> {
        self.lit(Type::u(width), Value::ubits(width, value))
    }

    /// A signed bits literal.
    pub fn slit(&self, width: usize, value: i64) -> &'a Expr<'a> {
        self.lit(Type::s(width), Value::sbits(width, value))
    }

    pub fn bool_lit(&self, value: bool) -> &'a Expr<'a> {
        self.lit(Type::u(1), Value::bool(value))
    }

    pub fn name(&self, ty: Type, name: &str) -> &'a Expr<'a> {
        let name = self.str(name);
        self.expr(ty, ExprKind::NameRef(name), Span::default())
    }

    pub fn const_ref(&self, ty: Type, name: &str) -> &'a Expr<'a> {
        let name = self.str(name);
        self.expr(ty, ExprKind::ConstRef(name), Span::default())
    }

    pub fn colon_ref(&self, ty: Type, subject: &str, member: &str) -> &'a Expr<'a> {
        let subject = self.str(subject);
        let member = self.str(member);
        self.expr(ty, ExprKind::ColonRef { subject, member }, Span::default())
    }

    pub fn binary(
        &self,
        ty: Type,
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        self.expr(ty, ExprKind::Binary { op, lhs, rhs }, Span::default())
    }

    pub fn unary(&self, ty: Type, op: UnaryOp, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(ty, ExprKind::Unary { op, operand }, Span::default())
    }

    pub fn block(&self, ty: Type, statements: Vec<Statement<'a>>) -> &'a Expr<'a> {
        let statements = self.arena.alloc_slice_clone(&statements);
        self.expr(ty, ExprKind::Block { statements }, Span::default())
    }

    pub fn let_(&self, pattern: &'a BindPattern<'a>, value: &'a Expr<'a>) -> Statement<'a> {
        Statement::Let {
            pattern,
            value,
            span: Span::default(),
        }
    }

    pub fn pat_name(&self, name: &str) -> &'a BindPattern<'a> {
        let name = self.str(name);
        self.arena.alloc(BindPattern::Name(name))
    }

    pub fn pat_wild(&self) -> &'a BindPattern<'a> {
        self.arena.alloc(BindPattern::Wildcard)
    }

    pub fn pat_tuple(&self, elements: &[&'a BindPattern<'a>]) -> &'a BindPattern<'a> {
        let elements = self.arena.alloc_slice_copy(elements);
        self.arena.alloc(BindPattern::Tuple(elements))
    }

    pub fn tuple(&self, ty: Type, elements: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let elements = self.exprs(elements);
        self.expr(ty, ExprKind::Tuple { elements }, Span::default())
    }

    pub fn array(&self, ty: Type, elements: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let elements = self.exprs(elements);
        self.expr(ty, ExprKind::Array { elements }, Span::default())
    }

    pub fn conditional(
        &self,
        ty: Type,
        cond: &'a Expr<'a>,
        consequent: &'a Expr<'a>,
        alternate: Option<&'a Expr<'a>>,
    ) -> &'a Expr<'a> {
        self.expr(
            ty,
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            },
            Span::default(),
        )
    }

    pub fn arm(&self, pattern: MatchPattern<'a>, body: &'a Expr<'a>) -> MatchArm<'a> {
        MatchArm {
            pattern,
            body,
            span: Span::default(),
        }
    }

    pub fn match_(
        &self,
        ty: Type,
        scrutinee: &'a Expr<'a>,
        arms: Vec<MatchArm<'a>>,
    ) -> &'a Expr<'a> {
        let arms = self.arena.alloc_slice_clone(&arms);
        self.expr(ty, ExprKind::Match { scrutinee, arms }, Span::default())
    }

    pub fn for_(
        &self,
        ty: Type,
        pattern: &'a BindPattern<'a>,
        iterable: &'a Expr<'a>,
        init: &'a Expr<'a>,
        body: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        self.expr(
            ty,
            ExprKind::For(LoopExpr {
                pattern,
                iterable,
                init,
                body,
            }),
            Span::default(),
        )
    }

    pub fn unroll_for(
        &self,
        ty: Type,
        pattern: &'a BindPattern<'a>,
        iterable: &'a Expr<'a>,
        init: &'a Expr<'a>,
        body: &'a Expr<'a>,
    ) -> &'a Expr<'a> {
        self.expr(
            ty,
            ExprKind::UnrollFor(LoopExpr {
                pattern,
                iterable,
                init,
                body,
            }),
            Span::default(),
        )
    }

    pub fn range(&self, ty: Type, start: &'a Expr<'a>, limit: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(ty, ExprKind::Range { start, limit }, Span::default())
    }

    pub fn cast(&self, ty: Type, operand: &'a Expr<'a>) -> &'a Expr<'a> {
        self.expr(ty, ExprKind::Cast { operand }, Span::default())
    }

    pub fn call(&self, ty: Type, callee: &str, args: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        self.call_parametric(ty, callee, args, ParametricEnv::default())
    }

    pub fn call_parametric(
        &self,
        ty: Type,
        callee: &str,
        args: &[&'a Expr<'a>],
        bindings: ParametricEnv,
    ) -> &'a Expr<'a> {
        let callee = Callee::Name(self.str(callee));
        let args = self.exprs(args);
        self.expr(
            ty,
            ExprKind::Invocation {
                callee,
                args,
                bindings,
            },
            Span::default(),
        )
    }

    pub fn fields(
        &self,
        fields: &[(&'a str, &'a Expr<'a>)],
    ) -> &'a [(&'a str, &'a Expr<'a>)] {
        self.arena.alloc_slice_copy(fields)
    }

    pub fn param(&self, name: &str, ty: Type) -> Param<'a> {
        Param {
            name: self.str(name),
            ty,
            span: Span::default(),
        }
    }

    pub fn function(
        &self,
        name: &str,
        params: Vec<Param<'a>>,
        body: &'a Expr<'a>,
    ) -> Function<'a> {
        Function {
            name: self.str(name),
            params: self.arena.alloc_slice_clone(&params),
            body,
            span: Span::default(),
        }
    }
}
