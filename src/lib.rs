//! Quartz - bytecode emitter for the Quartz hardware description language
//!
//! # Overview
//!
//! Quartz is a statically-typed, hardware-oriented expression language. This
//! crate is the public face of its bytecode emitter: the component that
//! lowers type-checked expression trees into linear, stack-based instruction
//! sequences for the bytecode interpreter.
//!
//! The front end (parsing, type checking, constant folding) runs upstream;
//! the emitter consumes fully typed trees in which every node carries a
//! resolved concrete type and compile-time constants are already evaluated.
//!
//! # Quick Start
//!
//! ```
//! use bumpalo::Bump;
//! use quartz::{AstBuilder, Emitter, ParametricEnv, Registry, Statement, Type};
//!
//! // Build the typed tree for: let foo = u32:1; foo + u32:2
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let body = b.block(
//!     Type::u(32),
//!     vec![
//!         b.let_(b.pat_name("foo"), b.ulit(32, 1)),
//!         Statement::Expr(b.binary(
//!             Type::u(32),
//!             quartz::BinaryOp::Add,
//!             b.name(Type::u(32), "foo"),
//!             b.ulit(32, 2),
//!         )),
//!     ],
//! );
//! let function = b.function("one_plus_two", vec![], body);
//!
//! // Emit it against an (empty) resolution context.
//! let registry = Registry::new();
//! let code = Emitter::emit_function(&registry, &function, &ParametricEnv::default()).unwrap();
//! assert_eq!(code.instructions().len(), 5);
//! assert_eq!(code.slot_count(), 1);
//! ```
//!
//! # Disassembly
//!
//! Instruction sequences have a bit-exact textual form used for golden tests
//! and debugging; see [`disassemble`] and [`reassemble`].

// Re-export the public API from quartz-core
pub use quartz_core::ast::{
    AstBuilder, BinaryOp, BindPattern, Callee, Expr, ExprKind, Function, IndexOp, LoopExpr,
    MatchArm, MatchPattern, Param, Span, Statement, UnaryOp,
};
pub use quartz_core::bytecode::{
    ArmItem, ChannelRef, Code, DisasmError, FailData, Instruction, InvocationData, Opcode,
    Operand, OperandKind, SlotIndex, ValidateError, disassemble, reassemble,
};
pub use quartz_core::emitter::{EmitError, Emitter};
pub use quartz_core::registry::{
    EnumDef, FnDecl, FnRef, ImportedModule, ParametricEnv, Registry,
};
pub use quartz_core::types::Type;
pub use quartz_core::values::{Bits, Builtin, Value};

mod error_renderer;

pub use error_renderer::{render_error, render_error_to_string, render_error_to_string_no_color};
