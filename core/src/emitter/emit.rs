//! The tree-walking compiler from typed expressions to bytecode.

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::ast::{
    BinaryOp, BindPattern, Callee, Expr, ExprKind, Function, IndexOp, LoopExpr, MatchArm,
    MatchPattern, Span, Statement, UnaryOp,
};
use crate::bytecode::{
    ArmItem, ChannelRef, Code, FailData, Instruction, InvocationData, Opcode, Operand,
    PLACEHOLDER_OFFSET, SlotIndex,
};
use crate::registry::{FnRef, ParametricEnv, Registry};
use crate::types::Type;
use crate::values::{Builtin, Value};

use super::error::EmitError;
use super::slots::ScopeChain;

/// Compiles one typed body into an instruction sequence.
///
/// An emitter owns a private instruction buffer and scope chain for the
/// duration of one body; the only shared input is the read-only [`Registry`].
/// Use the three entry points ([`Emitter::emit_function`],
/// [`Emitter::emit_expression`], [`Emitter::emit_proc_step`]); an emitter is
/// not reusable across bodies.
pub struct Emitter<'a, 'r> {
    registry: &'r Registry,
    /// Caller parametric bindings; parametric names in the body resolve
    /// through these to literal pushes.
    bindings: &'r ParametricEnv,
    /// Expression-local name environment (standalone expression emission
    /// only); names found here lower to literal pushes, not slot loads.
    env: HashMap<&'a str, Value>,
    code: Vec<Instruction>,
    scopes: ScopeChain<'a>,
}

impl<'a, 'r> Emitter<'a, 'r> {
    fn new(registry: &'r Registry, bindings: &'r ParametricEnv) -> Emitter<'a, 'r> {
        Emitter {
            registry,
            bindings,
            env: HashMap::new(),
            code: Vec::new(),
            scopes: ScopeChain::new(),
        }
    }

    /// Compiles a function body. Parameters are bound to slots 0..N in
    /// declaration order; the interpreter seeds those slots at call time.
    pub fn emit_function(
        registry: &Registry,
        function: &Function<'a>,
        bindings: &ParametricEnv,
    ) -> Result<Code, EmitError> {
        debug!(function = function.name, "emitting function body");
        let mut emitter = Emitter::new(registry, bindings);
        for param in function.params {
            emitter.scopes.bind(param.name);
        }
        emitter.emit_expr(function.body)?;
        emitter.finish()
    }

    /// Compiles a standalone expression against a name environment of
    /// precomputed values.
    pub fn emit_expression(
        registry: &Registry,
        expr: &'a Expr<'a>,
        env: &[(&'a str, Value)],
    ) -> Result<Code, EmitError> {
        let bindings = ParametricEnv::default();
        let mut emitter = Emitter::new(registry, &bindings);
        emitter.env = env.iter().cloned().collect();
        emitter.emit_expr(expr)?;
        emitter.finish()
    }

    /// Compiles a process step body. The process's persistent members occupy
    /// slots 0..M in the given order, ahead of the step's own parameters;
    /// member names are visible here and only here (never in the
    /// configuration body, which is emitted as a plain function).
    pub fn emit_proc_step(
        registry: &Registry,
        function: &Function<'a>,
        bindings: &ParametricEnv,
        members: &[&'a str],
    ) -> Result<Code, EmitError> {
        debug!(
            step = function.name,
            members = members.len(),
            "emitting process step body"
        );
        let mut emitter = Emitter::new(registry, bindings);
        for member in members.iter().copied() {
            emitter.scopes.bind(member);
        }
        for param in function.params {
            emitter.scopes.bind(param.name);
        }
        emitter.emit_expr(function.body)?;
        emitter.finish()
    }

    fn finish(self) -> Result<Code, EmitError> {
        for (index, instr) in self.code.iter().enumerate() {
            if instr.offset() == Some(PLACEHOLDER_OFFSET) {
                return Err(EmitError::Internal(format!(
                    "jump at instruction {} was never patched",
                    index
                )));
            }
        }
        let code = Code::new(self.code, self.scopes.slot_count());
        code.validate()
            .map_err(|err| EmitError::Internal(err.to_string()))?;
        Ok(code)
    }

    // === Instruction buffer ===

    fn add(&mut self, instr: Instruction) {
        self.code.push(instr);
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    /// Appends a jump with a placeholder displacement; the returned handle
    /// is patched once the destination is known.
    fn emit_jump(&mut self, op: Opcode, span: &Span) -> usize {
        let at = self.here();
        self.add(Instruction::with_operand(
            op,
            Operand::Offset(PLACEHOLDER_OFFSET),
            span.clone(),
        ));
        at
    }

    /// Appends a `jump_dest` marker and returns its index.
    fn mark_dest(&mut self, span: &Span) -> usize {
        let at = self.here();
        self.add(Instruction::new(Opcode::JumpDest, span.clone()));
        at
    }

    /// Points the jump at `jump` to the marker at `dest`. The buffer is
    /// append-only during emission, so both indices stay valid.
    fn patch_jump(&mut self, jump: usize, dest: usize) {
        trace!(jump, dest, "patching jump");
        self.code[jump].set_offset(dest as isize - jump as isize);
    }

    // === Expression lowering ===

    fn emit_expr(&mut self, expr: &'a Expr<'a>) -> Result<(), EmitError> {
        match &expr.kind {
            ExprKind::Literal(value) => {
                self.add(Instruction::literal(value.clone(), expr.span.clone()));
                Ok(())
            }
            ExprKind::NameRef(name) => self.emit_name_ref(name, &expr.span),
            ExprKind::ConstRef(name) => match self.registry.constant(name).cloned() {
                Some(value) => {
                    self.add(Instruction::literal(value, expr.span.clone()));
                    Ok(())
                }
                None => Err(EmitError::unresolved(*name, &expr.span)),
            },
            ExprKind::ColonRef { subject, member } => {
                match self.registry.colon_ref(subject, member) {
                    Some(value) => {
                        self.add(Instruction::literal(value, expr.span.clone()));
                        Ok(())
                    }
                    None => Err(EmitError::unresolved(
                        format!("{}::{}", subject, member),
                        &expr.span,
                    )),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.emit_expr(lhs)?;
                self.emit_expr(rhs)?;
                self.add(Instruction::new(binary_opcode(*op), expr.span.clone()));
                Ok(())
            }
            ExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;
                let opcode = match op {
                    UnaryOp::Negate => Opcode::Negate,
                    UnaryOp::Invert => Opcode::Invert,
                };
                self.add(Instruction::new(opcode, expr.span.clone()));
                Ok(())
            }
            ExprKind::Block { statements } => self.emit_block(statements, &expr.span),
            ExprKind::Tuple { elements } => {
                for element in elements.iter() {
                    self.emit_expr(element)?;
                }
                self.add(Instruction::with_operand(
                    Opcode::CreateTuple,
                    Operand::Count(elements.len()),
                    expr.span.clone(),
                ));
                Ok(())
            }
            ExprKind::Array { elements } => {
                for element in elements.iter() {
                    self.emit_expr(element)?;
                }
                self.add(Instruction::with_operand(
                    Opcode::CreateArray,
                    Operand::Count(elements.len()),
                    expr.span.clone(),
                ));
                Ok(())
            }
            ExprKind::Index { subject, index } => {
                self.emit_expr(subject)?;
                match index {
                    IndexOp::Element(index) => {
                        self.emit_expr(index)?;
                        self.add(Instruction::new(Opcode::Index, expr.span.clone()));
                    }
                    IndexOp::Slice { start, limit } => {
                        self.add(Instruction::literal(
                            Value::Bits(start.clone()),
                            expr.span.clone(),
                        ));
                        self.add(Instruction::literal(
                            Value::Bits(limit.clone()),
                            expr.span.clone(),
                        ));
                        self.add(Instruction::new(Opcode::Slice, expr.span.clone()));
                    }
                    IndexOp::Width { start, width } => {
                        self.emit_expr(start)?;
                        self.add(Instruction::with_operand(
                            Opcode::WidthSlice,
                            Operand::Type(width.clone()),
                            expr.span.clone(),
                        ));
                    }
                }
                Ok(())
            }
            ExprKind::TupleIndex { subject, index } => {
                self.emit_expr(subject)?;
                self.add(Instruction::literal(
                    Value::Bits(index.clone()),
                    expr.span.clone(),
                ));
                self.add(Instruction::new(Opcode::TupleIndex, expr.span.clone()));
                Ok(())
            }
            ExprKind::Attr { subject, field } => {
                let index = subject.ty.struct_field_index(field).ok_or_else(|| {
                    EmitError::Internal(format!("field `{}` not found on {}", field, subject.ty))
                })?;
                self.emit_expr(subject)?;
                self.add(Instruction::literal(
                    Value::ubits(64, index as u64),
                    expr.span.clone(),
                ));
                self.add(Instruction::new(Opcode::TupleIndex, expr.span.clone()));
                Ok(())
            }
            ExprKind::StructInstance { fields } => {
                let declared = struct_fields(&expr.ty)?;
                for (field_name, _) in declared {
                    let value = fields
                        .iter()
                        .find(|(name, _)| name == field_name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            EmitError::Internal(format!(
                                "struct instance is missing field `{}`",
                                field_name
                            ))
                        })?;
                    self.emit_expr(value)?;
                }
                self.add(Instruction::with_operand(
                    Opcode::CreateTuple,
                    Operand::Count(declared.len()),
                    expr.span.clone(),
                ));
                Ok(())
            }
            ExprKind::SplatStructInstance { base, fields } => {
                let base = *base;
                let declared = struct_fields(&expr.ty)?;
                for (index, (field_name, _)) in declared.iter().enumerate() {
                    match fields.iter().find(|(name, _)| name == field_name) {
                        Some((_, value)) => self.emit_expr(value)?,
                        None => {
                            // Unmentioned fields are read off the base value
                            // by position.
                            self.emit_expr(base)?;
                            self.add(Instruction::literal(
                                Value::ubits(64, index as u64),
                                expr.span.clone(),
                            ));
                            self.add(Instruction::new(Opcode::Index, expr.span.clone()));
                        }
                    }
                }
                self.add(Instruction::with_operand(
                    Opcode::CreateTuple,
                    Operand::Count(declared.len()),
                    expr.span.clone(),
                ));
                Ok(())
            }
            ExprKind::Conditional {
                cond,
                consequent,
                alternate,
            } => self.emit_conditional(cond, consequent, *alternate, &expr.span),
            ExprKind::Match { scrutinee, arms } => self.emit_match(scrutinee, arms, &expr.span),
            ExprKind::For(loop_expr) => self.emit_for(loop_expr, &expr.span),
            ExprKind::UnrollFor(loop_expr) => self.emit_unroll_for(loop_expr, &expr.span),
            ExprKind::Range { start, limit } => {
                self.emit_expr(start)?;
                self.emit_expr(limit)?;
                self.add(Instruction::new(Opcode::Range, expr.span.clone()));
                Ok(())
            }
            ExprKind::Cast { operand } => {
                if !castable(&operand.ty, &expr.ty) {
                    return Err(EmitError::unsupported(
                        format!("cannot cast {} to {}", operand.ty, expr.ty),
                        &expr.span,
                    ));
                }
                self.emit_expr(operand)?;
                self.add(Instruction::with_operand(
                    Opcode::Cast,
                    Operand::Type(expr.ty.clone()),
                    expr.span.clone(),
                ));
                Ok(())
            }
            ExprKind::Invocation {
                callee,
                args,
                bindings,
            } => self.emit_invocation(callee, args, bindings, &expr.span),
        }
    }

    fn emit_name_ref(&mut self, name: &str, span: &Span) -> Result<(), EmitError> {
        if let Some(slot) = self.scopes.lookup(name) {
            self.add(Instruction::load(slot, span.clone()));
            return Ok(());
        }
        if let Some(value) = self.bindings.lookup(name).cloned() {
            self.add(Instruction::literal(value, span.clone()));
            return Ok(());
        }
        if let Some(value) = self.env.get(name).cloned() {
            self.add(Instruction::literal(value, span.clone()));
            return Ok(());
        }
        if let Some(value) = self.registry.constant(name).cloned() {
            self.add(Instruction::literal(value, span.clone()));
            return Ok(());
        }
        if let Some(builtin) = self.registry.builtin(name) {
            self.add(Instruction::literal(Value::Builtin(builtin), span.clone()));
            return Ok(());
        }
        Err(EmitError::unresolved(name, span))
    }

    /// Lowers a block: every non-final expression statement is popped, a
    /// `let` leaves no residue, and the final statement's value is the
    /// block's value. A block that is empty or ends with a `let` is
    /// unit-valued.
    fn emit_block(
        &mut self,
        statements: &'a [Statement<'a>],
        span: &Span,
    ) -> Result<(), EmitError> {
        self.scopes.push_scope();
        if statements.is_empty() {
            self.add(Instruction::with_operand(
                Opcode::CreateTuple,
                Operand::Count(0),
                span.clone(),
            ));
        }
        let last = statements.len().saturating_sub(1);
        for (index, statement) in statements.iter().enumerate() {
            match statement {
                Statement::Let {
                    pattern,
                    value,
                    span: let_span,
                } => {
                    self.emit_expr(value)?;
                    self.destructure(pattern, Some(&value.ty), let_span)?;
                    if index == last {
                        self.add(Instruction::with_operand(
                            Opcode::CreateTuple,
                            Operand::Count(0),
                            let_span.clone(),
                        ));
                    }
                }
                Statement::Expr(value) => {
                    self.emit_expr(value)?;
                    if index != last {
                        self.add(Instruction::new(Opcode::Pop, value.span.clone()));
                    }
                }
            }
        }
        self.scopes.pop_scope();
        Ok(())
    }

    /// Binds a destructuring pattern against the value on top of the stack.
    ///
    /// A flat name stores into a fresh slot, a wildcard pops, and a tuple
    /// pattern expands the tuple and recurses element by element
    /// (`expand_tuple` leaves the first element on top). When the bound
    /// value's type is known, a tuple-arity mismatch is an internal error:
    /// the oracle vouched for this tree.
    fn destructure(
        &mut self,
        pattern: &'a BindPattern<'a>,
        ty: Option<&Type>,
        span: &Span,
    ) -> Result<(), EmitError> {
        match pattern {
            BindPattern::Name(name) => {
                let slot = self.scopes.bind(name);
                self.add(Instruction::store(slot, span.clone()));
                Ok(())
            }
            BindPattern::Wildcard => {
                self.add(Instruction::new(Opcode::Pop, span.clone()));
                Ok(())
            }
            BindPattern::Tuple(elements) => {
                if let Some(Type::Tuple(elem_tys)) = ty {
                    if elem_tys.len() != elements.len() {
                        return Err(EmitError::Internal(format!(
                            "destructuring arity mismatch: pattern has {} elements, type {} has {}",
                            elements.len(),
                            Type::Tuple(elem_tys.clone()),
                            elem_tys.len()
                        )));
                    }
                }
                self.add(Instruction::new(Opcode::ExpandTuple, span.clone()));
                for (index, element) in elements.iter().enumerate() {
                    let elem_ty = ty.and_then(|ty| ty.tuple_elem(index));
                    self.destructure(element, elem_ty, span)?;
                }
                Ok(())
            }
        }
    }

    /// Conditional lowering, else-first: the alternate is the fall-through
    /// path and taking the branch jumps forward over it.
    fn emit_conditional(
        &mut self,
        cond: &'a Expr<'a>,
        consequent: &'a Expr<'a>,
        alternate: Option<&'a Expr<'a>>,
        span: &Span,
    ) -> Result<(), EmitError> {
        self.emit_expr(cond)?;
        let to_consequent = self.emit_jump(Opcode::JumpRelIf, span);
        match alternate {
            // An `else if` chain arrives as a nested conditional here and
            // recurses through this same path.
            Some(alternate) => self.emit_expr(alternate)?,
            None => self.add(Instruction::with_operand(
                Opcode::CreateTuple,
                Operand::Count(0),
                span.clone(),
            )),
        }
        let to_end = self.emit_jump(Opcode::JumpRel, span);
        let consequent_dest = self.mark_dest(span);
        self.patch_jump(to_consequent, consequent_dest);
        self.emit_expr(consequent)?;
        let end = self.mark_dest(span);
        self.patch_jump(to_end, end);
        Ok(())
    }

    /// Match lowering. Each arm duplicates the scrutinee, tests it, and on
    /// failure skips to the next arm's marker; on success the original copy
    /// is popped before the body runs. Without an irrefutable arm the final
    /// fallthrough compiles to a `fail` instruction, deferring the
    /// exhaustiveness violation to run time.
    fn emit_match(
        &mut self,
        scrutinee: &'a Expr<'a>,
        arms: &'a [MatchArm<'a>],
        span: &Span,
    ) -> Result<(), EmitError> {
        self.emit_expr(scrutinee)?;
        let has_irrefutable = arms.iter().any(|arm| arm.pattern.is_irrefutable());
        let mut end_jumps = Vec::with_capacity(arms.len());
        for arm in arms.iter() {
            self.add(Instruction::new(Opcode::Dup, arm.span.clone()));
            self.scopes.push_scope();
            let item = match &arm.pattern {
                MatchPattern::Literal(value) => ArmItem::Value(value.clone()),
                MatchPattern::Wildcard => ArmItem::Wildcard,
                MatchPattern::Binding(name) => ArmItem::Bind(self.scopes.bind(name)),
            };
            self.add(Instruction::with_operand(
                Opcode::MatchArm,
                Operand::Arm(item),
                arm.span.clone(),
            ));
            self.add(Instruction::new(Opcode::Invert, arm.span.clone()));
            let skip = self.emit_jump(Opcode::JumpRelIf, &arm.span);
            self.add(Instruction::new(Opcode::Pop, arm.span.clone()));
            self.emit_expr(arm.body)?;
            end_jumps.push(self.emit_jump(Opcode::JumpRel, &arm.span));
            self.scopes.pop_scope();
            let next_arm = self.mark_dest(&arm.span);
            self.patch_jump(skip, next_arm);
        }
        if !has_irrefutable {
            self.add(Instruction::with_operand(
                Opcode::Fail,
                Operand::Fail(FailData {
                    label: "match".to_string(),
                    message: "value was not matched".to_string(),
                }),
                span.clone(),
            ));
        }
        let end = self.mark_dest(span);
        for jump in end_jumps {
            self.patch_jump(jump, end);
        }
        Ok(())
    }

    /// Bounded-loop lowering. The iterable is materialized once into a slot,
    /// the index and accumulator live in slots of their own, and each
    /// iteration pairs `(element, accumulator)` into a tuple that the loop
    /// pattern destructures into fresh slots.
    fn emit_for(&mut self, loop_expr: &LoopExpr<'a>, span: &Span) -> Result<(), EmitError> {
        let &LoopExpr {
            pattern,
            iterable,
            init,
            body,
        } = loop_expr;
        let len = iterable.ty.array_size().ok_or_else(|| {
            EmitError::unsupported(
                "loop iterable must have a statically sized array type",
                &iterable.span,
            )
        })?;
        let carry_ty = loop_carry_type(iterable, init);

        self.emit_expr(iterable)?;
        let arr_slot = self.alloc_stored_temp(span);
        self.add(Instruction::literal(Value::ubits(32, 0), span.clone()));
        let idx_slot = self.alloc_stored_temp(span);
        self.emit_expr(init)?;
        let acc_slot = self.alloc_stored_temp(span);

        let head = self.mark_dest(span);
        self.add(Instruction::load(idx_slot, span.clone()));
        self.add(Instruction::literal(
            Value::ubits(32, len as u64),
            span.clone(),
        ));
        self.add(Instruction::new(Opcode::Eq, span.clone()));
        let to_exit = self.emit_jump(Opcode::JumpRelIf, span);

        self.add(Instruction::load(arr_slot, span.clone()));
        self.add(Instruction::load(idx_slot, span.clone()));
        self.add(Instruction::new(Opcode::Index, span.clone()));
        self.add(Instruction::load(acc_slot, span.clone()));
        self.add(Instruction::with_operand(
            Opcode::CreateTuple,
            Operand::Count(2),
            span.clone(),
        ));
        self.scopes.push_scope();
        self.destructure(pattern, carry_ty.as_ref(), span)?;
        self.emit_expr(body)?;
        self.add(Instruction::store(acc_slot, span.clone()));
        self.scopes.pop_scope();

        self.add(Instruction::load(idx_slot, span.clone()));
        self.add(Instruction::literal(Value::ubits(32, 1), span.clone()));
        self.add(Instruction::new(Opcode::Add, span.clone()));
        self.add(Instruction::store(idx_slot, span.clone()));
        let back = self.emit_jump(Opcode::JumpRel, span);
        self.patch_jump(back, head);

        let exit = self.mark_dest(span);
        self.patch_jump(to_exit, exit);
        self.add(Instruction::load(acc_slot, span.clone()));
        Ok(())
    }

    /// Unrolled-loop lowering: same carry shape as [`Emitter::emit_for`] but
    /// fully expanded at emission time, so no jumps and no array or index
    /// slots. The iterable must be a compile-time-known sequence.
    fn emit_unroll_for(&mut self, loop_expr: &LoopExpr<'a>, span: &Span) -> Result<(), EmitError> {
        let &LoopExpr {
            pattern,
            iterable,
            init,
            body,
        } = loop_expr;
        let elements = constant_iterable(iterable)?;
        let carry_ty = loop_carry_type(iterable, init);

        self.emit_expr(init)?;
        let acc_slot = self.alloc_stored_temp(span);
        for element in elements {
            self.add(Instruction::literal(element, span.clone()));
            self.add(Instruction::load(acc_slot, span.clone()));
            self.add(Instruction::with_operand(
                Opcode::CreateTuple,
                Operand::Count(2),
                span.clone(),
            ));
            self.scopes.push_scope();
            self.destructure(pattern, carry_ty.as_ref(), span)?;
            self.emit_expr(body)?;
            self.add(Instruction::store(acc_slot, span.clone()));
            self.scopes.pop_scope();
        }
        self.add(Instruction::load(acc_slot, span.clone()));
        Ok(())
    }

    /// Allocates an anonymous slot and stores the value on top of the stack
    /// into it.
    fn alloc_stored_temp(&mut self, span: &Span) -> SlotIndex {
        let slot = self.scopes.alloc_temp();
        self.add(Instruction::store(slot, span.clone()));
        slot
    }

    /// Invocation lowering: arguments in order, then the resolved callee as
    /// a literal, then `call`. The callee is resolved here, at emission
    /// time; the instruction's operand is diagnostic metadata, not a
    /// runtime lookup. Channel builtins take their dedicated opcodes
    /// instead.
    fn emit_invocation(
        &mut self,
        callee: &Callee<'a>,
        args: &'a [&'a Expr<'a>],
        bindings: &ParametricEnv,
        span: &Span,
    ) -> Result<(), EmitError> {
        match callee {
            Callee::Name(name) => {
                if let Some(builtin) = self.registry.builtin(name) {
                    if builtin.is_channel_op() {
                        return self.emit_channel_op(builtin, args, span);
                    }
                    self.emit_args(args)?;
                    self.add(Instruction::literal(Value::Builtin(builtin), span.clone()));
                    self.add_call(name, args, bindings, span);
                    return Ok(());
                }
                if self.registry.function(name).is_some() {
                    self.emit_args(args)?;
                    self.add(Instruction::literal(
                        Value::Function(FnRef::new(name, bindings.clone())),
                        span.clone(),
                    ));
                    self.add_call(name, args, bindings, span);
                    return Ok(());
                }
                Err(EmitError::unresolved(*name, span))
            }
            Callee::ColonRef { subject, member } => {
                let full_name = format!("{}::{}", subject, member);
                if self.registry.module_function(subject, member).is_none() {
                    return Err(EmitError::unresolved(full_name, span));
                }
                self.emit_args(args)?;
                self.add(Instruction::literal(
                    Value::Function(FnRef::new(&full_name, bindings.clone())),
                    span.clone(),
                ));
                self.add_call(&full_name, args, bindings, span);
                Ok(())
            }
        }
    }

    fn emit_args(&mut self, args: &'a [&'a Expr<'a>]) -> Result<(), EmitError> {
        for arg in args.iter() {
            self.emit_expr(arg)?;
        }
        Ok(())
    }

    fn add_call(
        &mut self,
        callee: &str,
        args: &[&'a Expr<'a>],
        bindings: &ParametricEnv,
        span: &Span,
    ) {
        let args = args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.add(Instruction::with_operand(
            Opcode::Call,
            Operand::Invocation(InvocationData {
                callee: callee.to_string(),
                args,
                bindings: bindings.clone(),
            }),
            span.clone(),
        ));
    }

    /// Channel operations lower to dedicated opcodes carrying the channel
    /// identity; all arguments (token, channel, condition, payload as
    /// applicable) are still evaluated onto the stack first.
    fn emit_channel_op(
        &mut self,
        builtin: Builtin,
        args: &'a [&'a Expr<'a>],
        span: &Span,
    ) -> Result<(), EmitError> {
        let op = match builtin {
            Builtin::Send => Opcode::Send,
            Builtin::SendIf => Opcode::SendIf,
            Builtin::Recv => Opcode::Recv,
            Builtin::RecvIf => Opcode::RecvIf,
            Builtin::RecvNonBlocking => Opcode::RecvNonBlocking,
            Builtin::Join => {
                self.emit_args(args)?;
                self.add(Instruction::with_operand(
                    Opcode::Join,
                    Operand::Count(args.len()),
                    span.clone(),
                ));
                return Ok(());
            }
            _ => {
                return Err(EmitError::Internal(format!(
                    "{} is not a channel operation",
                    builtin.name()
                )));
            }
        };
        // The channel is always the second argument, after the token.
        let channel = args.get(1).copied().ok_or_else(|| {
            EmitError::Internal(format!("{} expects a channel argument", builtin.name()))
        })?;
        let ExprKind::NameRef(channel_name) = &channel.kind else {
            return Err(EmitError::unsupported(
                "channel argument must be a name reference",
                &channel.span,
            ));
        };
        self.emit_args(args)?;
        self.add(Instruction::with_operand(
            op,
            Operand::Channel(ChannelRef {
                name: channel_name.to_string(),
            }),
            span.clone(),
        ));
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::BitAnd => Opcode::And,
        BinaryOp::BitOr => Opcode::Or,
        BinaryOp::BitXor => Opcode::Xor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::Concat => Opcode::Concat,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::LogicalAnd => Opcode::LogicalAnd,
        BinaryOp::LogicalOr => Opcode::LogicalOr,
    }
}

/// Whether a value of `from` can be converted to `to` by the `cast`
/// instruction.
fn castable(from: &Type, to: &Type) -> bool {
    matches!(
        (from, to),
        (Type::Bits { .. }, Type::Bits { .. })
            | (Type::Bits { .. }, Type::Array { .. })
            | (Type::Array { .. }, Type::Bits { .. })
            | (Type::Bits { .. }, Type::Enum { .. })
            | (Type::Enum { .. }, Type::Bits { .. })
    )
}

fn struct_fields(ty: &Type) -> Result<&[(String, Type)], EmitError> {
    match ty {
        Type::Struct { fields, .. } => Ok(fields),
        _ => Err(EmitError::Internal(format!(
            "struct instance with non-struct type {}",
            ty
        ))),
    }
}

/// The `(element, accumulator)` tuple type of a loop carry, when the
/// iterable's element type is known. Used to cross-check the loop pattern's
/// arity.
fn loop_carry_type(iterable: &Expr<'_>, init: &Expr<'_>) -> Option<Type> {
    match &iterable.ty {
        Type::Array { elem, .. } => Some(Type::Tuple(vec![(**elem).clone(), init.ty.clone()])),
        _ => None,
    }
}

/// Extracts the element values of a compile-time-known iterable: a literal
/// array, or a range with literal bounds (materialized here, at emission
/// time).
fn constant_iterable(iterable: &Expr<'_>) -> Result<Vec<Value>, EmitError> {
    match &iterable.kind {
        ExprKind::Literal(Value::Array(elements)) => Ok(elements.clone()),
        ExprKind::Range { start, limit } => {
            let (ExprKind::Literal(Value::Bits(start)), ExprKind::Literal(Value::Bits(limit))) =
                (&start.kind, &limit.kind)
            else {
                return Err(EmitError::unsupported(
                    "unrolled loop bounds must be literals",
                    &iterable.span,
                ));
            };
            if start.width() != limit.width() {
                return Err(EmitError::Internal(
                    "range bounds have mismatched widths".to_string(),
                ));
            }
            let mut elements = Vec::new();
            let mut current = start.clone();
            while current.ult(limit) {
                elements.push(Value::Bits(current.clone()));
                current = current.wrapping_increment();
            }
            Ok(elements)
        }
        _ => Err(EmitError::unsupported(
            "unrolled loop iterable must be a compile-time constant sequence",
            &iterable.span,
        )),
    }
}
