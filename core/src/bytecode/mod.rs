//! The bytecode instruction model.
//!
//! An instruction is an opcode, an optional operand whose shape is fixed by
//! the opcode, and a source span for diagnostics. A finished body is a
//! [`Code`] value: the instruction list plus the frame's slot count.
//!
//! Control flow is expressed with relative jumps whose displacements must
//! land exactly on `jump_dest` marker instructions; [`Code::validate`] checks
//! that invariant (and the operand-shape invariant) for a whole sequence, so
//! a sequence can be verified independently of the emitter that produced it.

pub mod disasm;

pub use disasm::{DisasmError, disassemble, reassemble};

use core::fmt;

use thiserror::Error;

use crate::ast::Span;
use crate::registry::ParametricEnv;
use crate::types::Type;
use crate::values::Value;

/// Index of a storage cell in an activation frame.
pub type SlotIndex = usize;

/// Sentinel displacement for a jump that has not been patched yet.
///
/// Emission replaces every occurrence before finishing; one surviving to
/// validation is an emitter bug.
pub const PLACEHOLDER_OFFSET: isize = isize::MAX;

/// The closed instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Stack manipulation
    Dup,
    Pop,
    Swap,
    // Literals and slots
    Literal,
    Load,
    Store,
    // Aggregates
    CreateTuple,
    CreateArray,
    ExpandTuple,
    // Indexing
    Index,
    TupleIndex,
    Slice,
    WidthSlice,
    // Binary operators
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
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
    // Unary operators
    Negate,
    Invert,
    // Conversion and invocation
    Cast,
    Call,
    // Channel operations
    Send,
    SendIf,
    Recv,
    RecvIf,
    RecvNonBlocking,
    Join,
    // Ranges
    Range,
    // Control flow
    JumpRel,
    JumpRelIf,
    JumpDest,
    // Pattern matching and failure
    MatchArm,
    Fail,
}

/// The shape of operand an opcode carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Literal,
    Slot,
    Count,
    Offset,
    Type,
    Arm,
    Invocation,
    Channel,
    Fail,
}

impl Opcode {
    /// Canonical lowercase name used by the textual disassembly.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Dup => "dup",
            Opcode::Pop => "pop",
            Opcode::Swap => "swap",
            Opcode::Literal => "literal",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::CreateTuple => "create_tuple",
            Opcode::CreateArray => "create_array",
            Opcode::ExpandTuple => "expand_tuple",
            Opcode::Index => "index",
            Opcode::TupleIndex => "tuple_index",
            Opcode::Slice => "slice",
            Opcode::WidthSlice => "width_slice",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Concat => "concat",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Lt => "lt",
            Opcode::Le => "le",
            Opcode::Gt => "gt",
            Opcode::Ge => "ge",
            Opcode::LogicalAnd => "logical_and",
            Opcode::LogicalOr => "logical_or",
            Opcode::Negate => "negate",
            Opcode::Invert => "invert",
            Opcode::Cast => "cast",
            Opcode::Call => "call",
            Opcode::Send => "send",
            Opcode::SendIf => "send_if",
            Opcode::Recv => "recv",
            Opcode::RecvIf => "recv_if",
            Opcode::RecvNonBlocking => "recv_non_blocking",
            Opcode::Join => "join",
            Opcode::Range => "range",
            Opcode::JumpRel => "jump_rel",
            Opcode::JumpRelIf => "jump_rel_if",
            Opcode::JumpDest => "jump_dest",
            Opcode::MatchArm => "match_arm",
            Opcode::Fail => "fail",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        ALL_OPCODES.iter().copied().find(|op| op.mnemonic() == name)
    }

    /// The operand shape this opcode requires, or `None` for no operand.
    ///
    /// Presence and shape are fixed per opcode; there is never an optional
    /// operand.
    pub fn operand_kind(&self) -> Option<OperandKind> {
        match self {
            Opcode::Literal => Some(OperandKind::Literal),
            Opcode::Load | Opcode::Store => Some(OperandKind::Slot),
            Opcode::CreateTuple | Opcode::CreateArray | Opcode::Join => Some(OperandKind::Count),
            Opcode::JumpRel | Opcode::JumpRelIf => Some(OperandKind::Offset),
            Opcode::Cast | Opcode::WidthSlice => Some(OperandKind::Type),
            Opcode::MatchArm => Some(OperandKind::Arm),
            Opcode::Call => Some(OperandKind::Invocation),
            Opcode::Send
            | Opcode::SendIf
            | Opcode::Recv
            | Opcode::RecvIf
            | Opcode::RecvNonBlocking => Some(OperandKind::Channel),
            Opcode::Fail => Some(OperandKind::Fail),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

pub(crate) const ALL_OPCODES: [Opcode; 47] = [
    Opcode::Dup,
    Opcode::Pop,
    Opcode::Swap,
    Opcode::Literal,
    Opcode::Load,
    Opcode::Store,
    Opcode::CreateTuple,
    Opcode::CreateArray,
    Opcode::ExpandTuple,
    Opcode::Index,
    Opcode::TupleIndex,
    Opcode::Slice,
    Opcode::WidthSlice,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::And,
    Opcode::Or,
    Opcode::Xor,
    Opcode::Shl,
    Opcode::Shr,
    Opcode::Concat,
    Opcode::Eq,
    Opcode::Ne,
    Opcode::Lt,
    Opcode::Le,
    Opcode::Gt,
    Opcode::Ge,
    Opcode::LogicalAnd,
    Opcode::LogicalOr,
    Opcode::Negate,
    Opcode::Invert,
    Opcode::Cast,
    Opcode::Call,
    Opcode::Send,
    Opcode::SendIf,
    Opcode::Recv,
    Opcode::RecvIf,
    Opcode::RecvNonBlocking,
    Opcode::Join,
    Opcode::Range,
    Opcode::JumpRel,
    Opcode::JumpRelIf,
    Opcode::JumpDest,
    Opcode::MatchArm,
    Opcode::Fail,
];

/// A pattern test carried by a `match_arm` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmItem {
    /// Matches iff the scrutinee equals the value.
    Value(Value),
    /// Always matches.
    Wildcard,
    /// Always matches; stores the scrutinee copy into the slot.
    Bind(SlotIndex),
}

impl fmt::Display for ArmItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmItem::Value(value) => write!(f, "value:{}", value),
            ArmItem::Wildcard => write!(f, "wildcard"),
            ArmItem::Bind(slot) => write!(f, "bind:{}", slot),
        }
    }
}

/// Call-site metadata carried by a `call` instruction.
///
/// Purely diagnostic: the callee was resolved at emission time and is already
/// on the stack as a literal when `call` executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationData {
    /// The callee name as written at the call site.
    pub callee: String,
    /// A compact rendering of the argument list.
    pub args: String,
    /// The callee's concrete parametric bindings.
    pub bindings: ParametricEnv,
}

impl fmt::Display for InvocationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) : {}", self.callee, self.args, self.bindings)
    }
}

/// The channel identity carried by channel-operation instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub name: String,
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The payload of a `fail` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailData {
    pub label: String,
    pub message: String,
}

impl fmt::Display for FailData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)
    }
}

/// An instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(Value),
    Slot(SlotIndex),
    Count(usize),
    Offset(isize),
    Type(Type),
    Arm(ArmItem),
    Invocation(InvocationData),
    Channel(ChannelRef),
    Fail(FailData),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Literal(_) => OperandKind::Literal,
            Operand::Slot(_) => OperandKind::Slot,
            Operand::Count(_) => OperandKind::Count,
            Operand::Offset(_) => OperandKind::Offset,
            Operand::Type(_) => OperandKind::Type,
            Operand::Arm(_) => OperandKind::Arm,
            Operand::Invocation(_) => OperandKind::Invocation,
            Operand::Channel(_) => OperandKind::Channel,
            Operand::Fail(_) => OperandKind::Fail,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Slot(slot) => write!(f, "{}", slot),
            Operand::Count(count) => write!(f, "{}", count),
            Operand::Offset(offset) => write!(f, "{:+}", offset),
            Operand::Type(ty) => write!(f, "{}", ty),
            Operand::Arm(item) => write!(f, "{}", item),
            Operand::Invocation(data) => write!(f, "{}", data),
            Operand::Channel(channel) => write!(f, "{}", channel),
            Operand::Fail(data) => write!(f, "{}", data),
        }
    }
}

/// One instruction.
///
/// Equality compares opcode and operand only; the span is diagnostic
/// metadata and two sequences that differ only in spans are the same
/// program.
#[derive(Debug, Clone)]
pub struct Instruction {
    op: Opcode,
    operand: Option<Operand>,
    span: Span,
}

impl Instruction {
    /// An operand-less instruction.
    pub fn new(op: Opcode, span: Span) -> Instruction {
        debug_assert!(
            op.operand_kind().is_none(),
            "{} requires an operand",
            op.mnemonic()
        );
        Instruction {
            op,
            operand: None,
            span,
        }
    }

    /// An instruction with its operand; the shape must match the opcode.
    pub fn with_operand(op: Opcode, operand: Operand, span: Span) -> Instruction {
        debug_assert_eq!(
            op.operand_kind(),
            Some(operand.kind()),
            "operand shape mismatch for {}",
            op.mnemonic()
        );
        Instruction {
            op,
            operand: Some(operand),
            span,
        }
    }

    pub fn literal(value: Value, span: Span) -> Instruction {
        Instruction::with_operand(Opcode::Literal, Operand::Literal(value), span)
    }

    pub fn load(slot: SlotIndex, span: Span) -> Instruction {
        Instruction::with_operand(Opcode::Load, Operand::Slot(slot), span)
    }

    pub fn store(slot: SlotIndex, span: Span) -> Instruction {
        Instruction::with_operand(Opcode::Store, Operand::Slot(slot), span)
    }

    pub fn op(&self) -> Opcode {
        self.op
    }

    pub fn operand(&self) -> Option<&Operand> {
        self.operand.as_ref()
    }

    pub fn has_operand(&self) -> bool {
        self.operand.is_some()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn slot(&self) -> Option<SlotIndex> {
        match self.operand {
            Some(Operand::Slot(slot)) => Some(slot),
            _ => None,
        }
    }

    pub fn offset(&self) -> Option<isize> {
        match self.operand {
            Some(Operand::Offset(offset)) => Some(offset),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<&Value> {
        match &self.operand {
            Some(Operand::Literal(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn set_offset(&mut self, offset: isize) {
        debug_assert_eq!(self.op.operand_kind(), Some(OperandKind::Offset));
        self.operand = Some(Operand::Offset(offset));
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.operand == other.operand
    }
}

impl Eq for Instruction {}

impl fmt::Display for Instruction {
    /// The instruction without its index prefix or span suffix, e.g.
    /// `literal u32:3` or `jump_rel_if +4`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.mnemonic())?;
        if let Some(operand) = &self.operand {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// A sequence-level invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("instruction {index}: operand shape mismatch for {op}")]
    OperandShape { index: usize, op: Opcode },
    #[error("instruction {index}: jump was never patched")]
    UnpatchedJump { index: usize },
    #[error("instruction {index}: jump target {target} is out of bounds")]
    JumpOutOfBounds { index: usize, target: isize },
    #[error("instruction {index}: jump target {target} is not a jump_dest")]
    JumpNotOnMarker { index: usize, target: usize },
    #[error("instruction {index}: slot {slot} exceeds frame size {slot_count}")]
    SlotOutOfRange {
        index: usize,
        slot: SlotIndex,
        slot_count: usize,
    },
}

/// The compiled output for one function or process body: an ordered,
/// immutable instruction list plus the activation frame's slot count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    instructions: Vec<Instruction>,
    slot_count: usize,
}

impl Code {
    pub fn new(instructions: Vec<Instruction>, slot_count: usize) -> Code {
        Code {
            instructions,
            slot_count,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Renders the instruction list in the canonical textual form.
    pub fn disassemble(&self, source_locs: bool) -> String {
        disassemble(&self.instructions, source_locs)
    }

    /// Checks the sequence-level invariants:
    ///
    /// - every operand's shape matches its opcode (and presence matches);
    /// - every jump displacement was patched, lands in bounds, and lands
    ///   exactly on a `jump_dest` marker;
    /// - every referenced slot is below the frame's slot count.
    pub fn validate(&self) -> Result<(), ValidateError> {
        for (index, instr) in self.instructions.iter().enumerate() {
            let expected = instr.op().operand_kind();
            let actual = instr.operand().map(|operand| operand.kind());
            if expected != actual {
                return Err(ValidateError::OperandShape {
                    index,
                    op: instr.op(),
                });
            }

            if let Some(offset) = instr.offset() {
                if offset == PLACEHOLDER_OFFSET {
                    return Err(ValidateError::UnpatchedJump { index });
                }
                let target = index as isize + offset;
                if target < 0 || target as usize >= self.instructions.len() {
                    return Err(ValidateError::JumpOutOfBounds { index, target });
                }
                let target = target as usize;
                if self.instructions[target].op() != Opcode::JumpDest {
                    return Err(ValidateError::JumpNotOnMarker { index, target });
                }
            }

            let referenced = match instr.operand() {
                Some(Operand::Slot(slot)) => Some(*slot),
                Some(Operand::Arm(ArmItem::Bind(slot))) => Some(*slot),
                _ => None,
            };
            if let Some(slot) = referenced {
                if slot >= self.slot_count {
                    return Err(ValidateError::SlotOutOfRange {
                        index,
                        slot,
                        slot_count: self.slot_count,
                    });
                }
            }
        }
        Ok(())
    }
}
