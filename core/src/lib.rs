//! Core data model and bytecode emitter for the Quartz hardware description
//! language.
//!
//! Quartz sources are parsed and type checked by the front end; this crate
//! picks up from there. It consumes fully typed, fully resolved expression
//! trees and lowers one function or process body at a time into a linear,
//! stack-based instruction sequence for the bytecode interpreter.
//!
//! The main pieces:
//!
//! - [`values`]: immutable immediate values (arbitrary-width bit vectors,
//!   tuples, arrays) used as literal operands.
//! - [`types`]: resolved concrete types attached to every expression node.
//! - [`ast`]: the typed, arena-allocated expression tree handed to us by the
//!   type checker.
//! - [`bytecode`]: the instruction model plus textual disassembly and
//!   reassembly (used for golden tests and debugging).
//! - [`registry`]: the read-only cross-module resolution context (imported
//!   constants, enum definitions, builtin name table).
//! - [`emitter`]: the tree-walking compiler itself.

pub mod ast;
pub mod bytecode;
pub mod emitter;
pub mod registry;
pub mod types;
pub mod values;
