//! Golden tests for the emitter.
//!
//! Most tests compare full disassembly listings; the textual form keeps the
//! whole instruction run, operands included, under test at once.

use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::ast::{AstBuilder, BinaryOp, Expr, MatchPattern, UnaryOp};
use crate::bytecode::{Code, Opcode, reassemble};
use crate::emitter::{EmitError, Emitter};
use crate::registry::{EnumDef, FnDecl, ImportedModule, ParametricEnv, Registry};
use crate::types::Type;
use crate::values::Value;

fn emit<'a>(b: &AstBuilder<'a>, registry: &Registry, body: &'a Expr<'a>) -> Code {
    let function = b.function("test_fn", vec![], body);
    Emitter::emit_function(registry, &function, &ParametricEnv::default()).unwrap()
}

fn emit_err<'a>(b: &AstBuilder<'a>, registry: &Registry, body: &'a Expr<'a>) -> EmitError {
    let function = b.function("test_fn", vec![], body);
    Emitter::emit_function(registry, &function, &ParametricEnv::default()).unwrap_err()
}

#[test]
fn simple_translation() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let foo = u32:1; foo + u32:2
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("foo"), b.ulit(32, 1)),
            crate::ast::Statement::Expr(b.binary(
                Type::u(32),
                BinaryOp::Add,
                b.name(Type::u(32), "foo"),
                b.ulit(32, 2),
            )),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions().len(), 5);
    assert_eq!(
        code.disassemble(false),
        "000 literal u32:1\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:2\n\
         004 add"
    );
    assert_eq!(code.slot_count(), 1);
    assert_eq!(
        code.instructions()[0].literal_value(),
        Some(&Value::ubits(32, 1))
    );
    assert_eq!(code.instructions()[1].slot(), Some(0));
    assert!(!code.instructions()[4].has_operand());
}

#[test]
fn shadowing_allocates_increasing_slots() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let x = u32:42; let x = u32:64; x
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("x"), b.ulit(32, 42)),
            b.let_(b.pat_name("x"), b.ulit(32, 64)),
            crate::ast::Statement::Expr(b.name(Type::u(32), "x")),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:42\n\
         001 store 0\n\
         002 literal u32:64\n\
         003 store 1\n\
         004 load 1"
    );
    assert_eq!(code.slot_count(), 2);
}

#[test]
fn destructuring_let() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let (a, b, (c, d)) = (u4:0, u8:1, (u16:2, (u32:3, u64:4, u128:5))); d
    let triple_ty = Type::Tuple(vec![Type::u(32), Type::u(64), Type::u(128)]);
    let triple = b.tuple(
        triple_ty.clone(),
        &[b.ulit(32, 3), b.ulit(64, 4), b.ulit(128, 5)],
    );
    let inner_ty = Type::Tuple(vec![Type::u(16), triple_ty.clone()]);
    let inner = b.tuple(inner_ty.clone(), &[b.ulit(16, 2), triple]);
    let outer_ty = Type::Tuple(vec![Type::u(4), Type::u(8), inner_ty]);
    let outer = b.tuple(outer_ty, &[b.ulit(4, 0), b.ulit(8, 1), inner]);

    let pattern = b.pat_tuple(&[
        b.pat_name("a"),
        b.pat_name("b"),
        b.pat_tuple(&[b.pat_name("c"), b.pat_name("d")]),
    ]);
    let body = b.block(
        triple_ty,
        vec![
            b.let_(pattern, outer),
            crate::ast::Statement::Expr(b.name(Type::u(128), "d")),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u4:0\n\
         001 literal u8:1\n\
         002 literal u16:2\n\
         003 literal u32:3\n\
         004 literal u64:4\n\
         005 literal u128:0x5\n\
         006 create_tuple 3\n\
         007 create_tuple 2\n\
         008 create_tuple 3\n\
         009 expand_tuple\n\
         010 store 0\n\
         011 store 1\n\
         012 expand_tuple\n\
         013 store 2\n\
         014 store 3\n\
         015 load 3"
    );
    assert_eq!(code.slot_count(), 4);
}

#[test]
fn destructuring_arity_mismatch_is_internal() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let pair_ty = Type::Tuple(vec![Type::u(8), Type::u(8)]);
    let pair = b.tuple(pair_ty, &[b.ulit(8, 1), b.ulit(8, 2)]);
    let pattern = b.pat_tuple(&[b.pat_name("a"), b.pat_name("b"), b.pat_name("c")]);
    let body = b.block(Type::unit(), vec![b.let_(pattern, pair)]);

    let err = emit_err(&b, &registry, body);
    assert!(matches!(err, EmitError::Internal(_)), "got {:?}", err);
}

#[test]
fn ternary() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // if true { u32:42 } else { u32:64 }
    let body = b.conditional(
        Type::u(32),
        b.bool_lit(true),
        b.block(
            Type::u(32),
            vec![crate::ast::Statement::Expr(b.ulit(32, 42))],
        ),
        Some(b.block(
            Type::u(32),
            vec![crate::ast::Statement::Expr(b.ulit(32, 64))],
        )),
    );
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions().len(), 7);
    assert_eq!(
        code.disassemble(false),
        "000 literal u1:1\n\
         001 jump_rel_if +3\n\
         002 literal u32:64\n\
         003 jump_rel +3\n\
         004 jump_dest\n\
         005 literal u32:42\n\
         006 jump_dest"
    );
    assert_eq!(code.validate(), Ok(()));
}

#[test]
fn else_if_chain_nests_as_alternate() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // if false { u32:1 } else if true { u32:2 } else { u32:3 }
    let inner = b.conditional(
        Type::u(32),
        b.bool_lit(true),
        b.ulit(32, 2),
        Some(b.ulit(32, 3)),
    );
    let body = b.conditional(Type::u(32), b.bool_lit(false), b.ulit(32, 1), Some(inner));
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u1:0\n\
         001 jump_rel_if +9\n\
         002 literal u1:1\n\
         003 jump_rel_if +3\n\
         004 literal u32:3\n\
         005 jump_rel +3\n\
         006 jump_dest\n\
         007 literal u32:2\n\
         008 jump_dest\n\
         009 jump_rel +3\n\
         010 jump_dest\n\
         011 literal u32:1\n\
         012 jump_dest"
    );
    assert_eq!(code.validate(), Ok(()));
}

#[test]
fn conditional_without_else_is_unit_valued() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let body = b.conditional(
        Type::unit(),
        b.bool_lit(true),
        b.tuple(Type::unit(), &[]),
        None,
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u1:1\n\
         001 jump_rel_if +3\n\
         002 create_tuple 0\n\
         003 jump_rel +3\n\
         004 jump_dest\n\
         005 create_tuple 0\n\
         006 jump_dest"
    );
}

#[test]
fn match_with_wildcard_has_no_fail() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let x = u32:77;
    // match x { u32:42 => u32:64, u32:64 => u32:42, _ => x + u32:1 }
    let fallthrough = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "x"),
        b.ulit(32, 1),
    );
    let match_expr = b.match_(
        Type::u(32),
        b.name(Type::u(32), "x"),
        vec![
            b.arm(MatchPattern::Literal(Value::ubits(32, 42)), b.ulit(32, 64)),
            b.arm(MatchPattern::Literal(Value::ubits(32, 64)), b.ulit(32, 42)),
            b.arm(MatchPattern::Wildcard, fallthrough),
        ],
    );
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("x"), b.ulit(32, 77)),
            crate::ast::Statement::Expr(match_expr),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:77\n\
         001 store 0\n\
         002 load 0\n\
         003 dup\n\
         004 match_arm value:u32:42\n\
         005 invert\n\
         006 jump_rel_if +4\n\
         007 pop\n\
         008 literal u32:64\n\
         009 jump_rel +20\n\
         010 jump_dest\n\
         011 dup\n\
         012 match_arm value:u32:64\n\
         013 invert\n\
         014 jump_rel_if +4\n\
         015 pop\n\
         016 literal u32:42\n\
         017 jump_rel +12\n\
         018 jump_dest\n\
         019 dup\n\
         020 match_arm wildcard\n\
         021 invert\n\
         022 jump_rel_if +6\n\
         023 pop\n\
         024 load 0\n\
         025 literal u32:1\n\
         026 add\n\
         027 jump_rel +2\n\
         028 jump_dest\n\
         029 jump_dest"
    );
    assert!(
        code.instructions()
            .iter()
            .all(|instr| instr.op() != Opcode::Fail)
    );
    assert_eq!(code.validate(), Ok(()));
}

#[test]
fn match_without_catch_all_compiles_to_fail() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let match_expr = b.match_(
        Type::u(32),
        b.ulit(32, 77),
        vec![b.arm(MatchPattern::Literal(Value::ubits(32, 42)), b.ulit(32, 0))],
    );
    let code = emit(&b, &registry, match_expr);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:77\n\
         001 dup\n\
         002 match_arm value:u32:42\n\
         003 invert\n\
         004 jump_rel_if +4\n\
         005 pop\n\
         006 literal u32:0\n\
         007 jump_rel +3\n\
         008 jump_dest\n\
         009 fail match: value was not matched\n\
         010 jump_dest"
    );
    assert_eq!(code.validate(), Ok(()));
}

#[test]
fn match_binding_arm_binds_a_fresh_slot() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let match_expr = b.match_(
        Type::u(32),
        b.ulit(32, 5),
        vec![b.arm(MatchPattern::Binding(b.str("y")), b.name(Type::u(32), "y"))],
    );
    let code = emit(&b, &registry, match_expr);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:5\n\
         001 dup\n\
         002 match_arm bind:0\n\
         003 invert\n\
         004 jump_rel_if +4\n\
         005 pop\n\
         006 load 0\n\
         007 jump_rel +2\n\
         008 jump_dest\n\
         009 jump_dest"
    );
    assert_eq!(code.slot_count(), 1);
}

#[test]
fn simple_for() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // for (i, accum) in u32:0..u32:8 { accum + i }(u32:1)
    let iter_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 8,
    };
    let iterable = b.range(iter_ty, b.ulit(32, 0), b.ulit(32, 8));
    let loop_body = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "accum"),
        b.name(Type::u(32), "i"),
    );
    let body = b.for_(
        Type::u(32),
        b.pat_tuple(&[b.pat_name("i"), b.pat_name("accum")]),
        iterable,
        b.ulit(32, 1),
        loop_body,
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:0\n\
         001 literal u32:8\n\
         002 range\n\
         003 store 0\n\
         004 literal u32:0\n\
         005 store 1\n\
         006 literal u32:1\n\
         007 store 2\n\
         008 jump_dest\n\
         009 load 1\n\
         010 literal u32:8\n\
         011 eq\n\
         012 jump_rel_if +18\n\
         013 load 0\n\
         014 load 1\n\
         015 index\n\
         016 load 2\n\
         017 create_tuple 2\n\
         018 expand_tuple\n\
         019 store 3\n\
         020 store 4\n\
         021 load 4\n\
         022 load 3\n\
         023 add\n\
         024 store 2\n\
         025 load 1\n\
         026 literal u32:1\n\
         027 add\n\
         028 store 1\n\
         029 jump_rel -21\n\
         030 jump_dest\n\
         031 load 2"
    );
    assert_eq!(code.slot_count(), 5);

    // Exactly one loop-head marker and one loop-exit marker, and the back
    // edge is the only negative displacement and lands on the head marker.
    let markers: Vec<usize> = code
        .instructions()
        .iter()
        .enumerate()
        .filter(|(_, instr)| instr.op() == Opcode::JumpDest)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(markers, vec![8, 30]);
    let back_edges: Vec<(usize, isize)> = code
        .instructions()
        .iter()
        .enumerate()
        .filter_map(|(index, instr)| instr.offset().map(|offset| (index, offset)))
        .filter(|(_, offset)| *offset < 0)
        .collect();
    assert_eq!(back_edges, vec![(29, -21)]);
    assert_eq!(
        code.instructions()[(29 + (-21_isize)) as usize].op(),
        Opcode::JumpDest
    );
    assert_eq!(code.validate(), Ok(()));
}

#[test]
fn unroll_for_has_no_jumps() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // unroll_for! (i, acc) in u32:0..u32:2 { acc + i }(u32:0)
    let iter_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 2,
    };
    let iterable = b.range(iter_ty, b.ulit(32, 0), b.ulit(32, 2));
    let loop_body = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "acc"),
        b.name(Type::u(32), "i"),
    );
    let body = b.unroll_for(
        Type::u(32),
        b.pat_tuple(&[b.pat_name("i"), b.pat_name("acc")]),
        iterable,
        b.ulit(32, 0),
        loop_body,
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:0\n\
         001 store 0\n\
         002 literal u32:0\n\
         003 load 0\n\
         004 create_tuple 2\n\
         005 expand_tuple\n\
         006 store 1\n\
         007 store 2\n\
         008 load 2\n\
         009 load 1\n\
         010 add\n\
         011 store 0\n\
         012 literal u32:1\n\
         013 load 0\n\
         014 create_tuple 2\n\
         015 expand_tuple\n\
         016 store 3\n\
         017 store 4\n\
         018 load 4\n\
         019 load 3\n\
         020 add\n\
         021 store 0\n\
         022 load 0"
    );
    assert!(code.instructions().iter().all(|instr| {
        instr.op() != Opcode::JumpRel
            && instr.op() != Opcode::JumpRelIf
            && instr.op() != Opcode::JumpDest
    }));
}

#[test]
fn unroll_for_rejects_dynamic_iterable() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let iter_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 4,
    };
    let body = b.unroll_for(
        Type::u(32),
        b.pat_tuple(&[b.pat_name("i"), b.pat_name("acc")]),
        b.name(iter_ty, "xs"),
        b.ulit(32, 0),
        b.name(Type::u(32), "acc"),
    );
    let err = emit_err(&b, &registry, body);
    assert!(matches!(err, EmitError::Unsupported { .. }), "got {:?}", err);
}

#[test]
fn arrays_and_indexing() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let a = u32:32; [u32:0, u32:1, a]
    let array_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 3,
    };
    let array = b.array(
        array_ty.clone(),
        &[b.ulit(32, 0), b.ulit(32, 1), b.name(Type::u(32), "a")],
    );
    let body = b.block(
        array_ty,
        vec![
            b.let_(b.pat_name("a"), b.ulit(32, 32)),
            crate::ast::Statement::Expr(array),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:32\n\
         001 store 0\n\
         002 literal u32:0\n\
         003 literal u32:1\n\
         004 load 0\n\
         005 create_array 3"
    );
}

#[test]
fn element_index() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let array_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 3,
    };
    let subject = b.name(array_ty, "a");
    let index = b.expr(
        Type::u(32),
        crate::ast::ExprKind::Index {
            subject,
            index: crate::ast::IndexOp::Element(b.ulit(32, 0)),
        },
        crate::ast::Span::default(),
    );
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(
                b.pat_name("a"),
                b.lit(
                    Type::Array {
                        elem: Box::new(Type::u(32)),
                        size: 3,
                    },
                    Value::Array(vec![
                        Value::ubits(32, 0),
                        Value::ubits(32, 1),
                        Value::ubits(32, 2),
                    ]),
                ),
            ),
            crate::ast::Statement::Expr(index),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal [u32:0, u32:1, u32:2]\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:0\n\
         004 index"
    );
}

#[test]
fn bit_slice_and_width_slice() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let a = u32:0xdeadbeef; a[16:32]
    let slice = b.expr(
        Type::u(16),
        crate::ast::ExprKind::Index {
            subject: b.name(Type::u(32), "a"),
            index: crate::ast::IndexOp::Slice {
                start: crate::values::Bits::ubits(32, 16),
                limit: crate::values::Bits::ubits(32, 32),
            },
        },
        crate::ast::Span::default(),
    );
    let body = b.block(
        Type::u(16),
        vec![
            b.let_(b.pat_name("a"), b.ulit(32, 0xdeadbeef)),
            crate::ast::Statement::Expr(slice),
        ],
    );
    let code = emit(&b, &registry, body);
    assert_eq!(
        code.disassemble(false),
        "000 literal u32:3735928559\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:16\n\
         004 literal u32:32\n\
         005 slice"
    );

    // let a = u32:0xdeadbeef; a[u32:8 +: u16]
    let width_slice = b.expr(
        Type::u(16),
        crate::ast::ExprKind::Index {
            subject: b.name(Type::u(32), "a"),
            index: crate::ast::IndexOp::Width {
                start: b.ulit(32, 8),
                width: Type::u(16),
            },
        },
        crate::ast::Span::default(),
    );
    let body = b.block(
        Type::u(16),
        vec![
            b.let_(b.pat_name("a"), b.ulit(32, 0xdeadbeef)),
            crate::ast::Statement::Expr(width_slice),
        ],
    );
    let code = emit(&b, &registry, body);
    assert_eq!(
        code.disassemble(false),
        "000 literal u32:3735928559\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:8\n\
         004 width_slice uN[16]"
    );
}

fn my_struct_ty() -> Type {
    Type::Struct {
        name: "MyStruct".into(),
        fields: vec![
            ("x".into(), Type::u(16)),
            ("y".into(), Type::u(32)),
            ("z".into(), Type::u(64)),
        ],
    }
}

#[test]
fn struct_instance_emits_fields_in_declaration_order() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let a = u16:2; MyStruct { z: u64:0xbeef, x: a, y: u32:3 }
    let fields = b.fields(&[
        (b.str("z"), b.ulit(64, 0xbeef)),
        (b.str("x"), b.name(Type::u(16), "a")),
        (b.str("y"), b.ulit(32, 3)),
    ]);
    let instance = b.expr(
        my_struct_ty(),
        crate::ast::ExprKind::StructInstance { fields },
        crate::ast::Span::default(),
    );
    let body = b.block(
        my_struct_ty(),
        vec![
            b.let_(b.pat_name("a"), b.ulit(16, 2)),
            crate::ast::Statement::Expr(instance),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u16:2\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:3\n\
         004 literal u64:48879\n\
         005 create_tuple 3"
    );
}

#[test]
fn splat_struct_instance_reads_base_fields_by_index() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // MyStruct { y: u32:0xf00d, ..base }
    let base = b.name(my_struct_ty(), "base");
    let fields = b.fields(&[(b.str("y"), b.ulit(32, 0xf00d))]);
    let splat = b.expr(
        my_struct_ty(),
        crate::ast::ExprKind::SplatStructInstance { base, fields },
        crate::ast::Span::default(),
    );
    let body = b.block(
        my_struct_ty(),
        vec![
            b.let_(
                b.pat_name("base"),
                b.expr(
                    my_struct_ty(),
                    crate::ast::ExprKind::StructInstance {
                        fields: b.fields(&[
                            (b.str("x"), b.ulit(16, 1)),
                            (b.str("y"), b.ulit(32, 2)),
                            (b.str("z"), b.ulit(64, 3)),
                        ]),
                    },
                    crate::ast::Span::default(),
                ),
            ),
            crate::ast::Statement::Expr(splat),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u16:1\n\
         001 literal u32:2\n\
         002 literal u64:3\n\
         003 create_tuple 3\n\
         004 store 0\n\
         005 load 0\n\
         006 literal u64:0\n\
         007 index\n\
         008 literal u32:61453\n\
         009 load 0\n\
         010 literal u64:2\n\
         011 index\n\
         012 create_tuple 3"
    );
}

#[test]
fn attr_lowers_to_tuple_index() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let attr = b.expr(
        Type::u(32),
        crate::ast::ExprKind::Attr {
            subject: b.name(my_struct_ty(), "s"),
            field: b.str("y"),
        },
        crate::ast::Span::default(),
    );
    let function = b.function("test_fn", vec![b.param("s", my_struct_ty())], attr);
    let code = Emitter::emit_function(&registry, &function, &ParametricEnv::default()).unwrap();

    assert_eq!(
        code.disassemble(false),
        "000 load 0\n\
         001 literal u64:1\n\
         002 tuple_index"
    );
}

#[test]
fn tuple_index() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let pair_ty = Type::Tuple(vec![Type::u(16), Type::u(32)]);
    let pair = b.tuple(pair_ty, &[b.ulit(16, 0), b.ulit(32, 1)]);
    let access = b.expr(
        Type::u(32),
        crate::ast::ExprKind::TupleIndex {
            subject: pair,
            index: crate::values::Bits::ubits(64, 1),
        },
        crate::ast::Span::default(),
    );
    let code = emit(&b, &registry, access);

    assert_eq!(
        code.disassemble(false),
        "000 literal u16:0\n\
         001 literal u32:1\n\
         002 create_tuple 2\n\
         003 literal u64:1\n\
         004 tuple_index"
    );
}

#[test]
fn local_enum_ref_resolves_to_literal() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let mut registry = Registry::new();
    registry.add_enum(EnumDef::new(
        "MyEnum",
        Type::u(23),
        &[("VAL_0", 0), ("VAL_1", 1), ("VAL_2", 2)],
    ));

    let body = b.colon_ref(Type::u(23), "MyEnum", "VAL_1");
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions().len(), 1);
    assert_eq!(code.disassemble(false), "000 literal u23:1");
}

#[test]
fn imported_constant_and_enum_resolve_to_literals() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let mut registry = Registry::new();
    registry.add_module(
        "imported",
        ImportedModule::new()
            .with_constant("MY_CONST", Value::ubits(3, 2))
            .with_enum(EnumDef::new(
                "ImportedEnum",
                Type::u(4),
                &[("VAL_2", 2), ("VAL_3", 3)],
            )),
    );

    let constant = b.colon_ref(Type::u(3), "imported", "MY_CONST");
    let code = emit(&b, &registry, constant);
    assert_eq!(code.disassemble(false), "000 literal u3:2");

    let member = b.colon_ref(Type::u(4), "imported::ImportedEnum", "VAL_2");
    let code = emit(&b, &registry, member);
    assert_eq!(code.disassemble(false), "000 literal u4:2");
}

#[test]
fn unresolved_colon_ref_is_a_resolution_error() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let body = b.colon_ref(Type::u(8), "nope", "MISSING");
    let err = emit_err(&b, &registry, body);
    assert_eq!(
        err,
        EmitError::Unresolved {
            name: "nope::MISSING".to_string(),
            span: crate::ast::Span::default(),
        }
    );
}

#[test]
fn const_refs_resolve_through_the_registry() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let mut registry = Registry::new();
    registry.add_constant("K_FOO", Value::ubits(32, 100));

    // let a = u32:200; a + K_FOO
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("a"), b.ulit(32, 200)),
            crate::ast::Statement::Expr(b.binary(
                Type::u(32),
                BinaryOp::Add,
                b.name(Type::u(32), "a"),
                b.const_ref(Type::u(32), "K_FOO"),
            )),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:200\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:100\n\
         004 add"
    );
}

#[test]
fn assert_eq_call() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let foo = u32:3; assert_eq(foo, u32:2); foo
    let call = b.call(
        Type::unit(),
        "assert_eq",
        &[b.name(Type::u(32), "foo"), b.ulit(32, 2)],
    );
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("foo"), b.ulit(32, 3)),
            crate::ast::Statement::Expr(call),
            crate::ast::Statement::Expr(b.name(Type::u(32), "foo")),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:3\n\
         001 store 0\n\
         002 load 0\n\
         003 literal u32:2\n\
         004 literal builtin:assert_eq\n\
         005 call assert_eq(foo, u32:2) : {}\n\
         006 pop\n\
         007 load 0"
    );
}

#[test]
fn parametric_invocation_records_bindings() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let mut registry = Registry::new();
    registry.add_function(
        "foo",
        FnDecl {
            parametrics: vec!["N".to_string()],
        },
    );

    let bindings = ParametricEnv::default().with("N", Value::ubits(32, 16));
    let call = b.call_parametric(Type::u(16), "foo", &[b.ulit(16, 4)], bindings);
    let code = emit(&b, &registry, call);

    assert_eq!(
        code.disassemble(false),
        "000 literal u16:4\n\
         001 literal fn:foo{N: u32:16}\n\
         002 call foo(u16:4) : {N: u32:16}"
    );
}

#[test]
fn parametric_names_resolve_through_caller_bindings() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // fn foo<N: u32>() -> u32 { N }
    let function = b.function("foo", vec![], b.name(Type::u(32), "N"));
    let bindings = ParametricEnv::default().with("N", Value::ubits(32, 8));
    let code = Emitter::emit_function(&registry, &function, &bindings).unwrap();

    assert_eq!(code.disassemble(false), "000 literal u32:8");
}

#[test]
fn unknown_callee_is_a_resolution_error() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let call = b.call(Type::u(32), "mystery", &[]);
    let err = emit_err(&b, &registry, call);
    assert!(
        matches!(err, EmitError::Unresolved { ref name, .. } if name == "mystery"),
        "got {:?}",
        err
    );
}

#[test]
fn unresolved_name_is_a_resolution_error() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let err = emit_err(&b, &registry, b.name(Type::u(32), "ghost"));
    assert!(
        matches!(err, EmitError::Unresolved { ref name, .. } if name == "ghost"),
        "got {:?}",
        err
    );
}

#[test]
fn shl_and_shr() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let x = u32:8; let y = u32:16; x << y >> y
    let shifted = b.binary(
        Type::u(32),
        BinaryOp::Shr,
        b.binary(
            Type::u(32),
            BinaryOp::Shl,
            b.name(Type::u(32), "x"),
            b.name(Type::u(32), "y"),
        ),
        b.name(Type::u(32), "y"),
    );
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_name("x"), b.ulit(32, 8)),
            b.let_(b.pat_name("y"), b.ulit(32, 16)),
            crate::ast::Statement::Expr(shifted),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions().len(), 9);
    assert_eq!(code.instructions()[6].op(), Opcode::Shl);
    assert_eq!(code.instructions()[8].op(), Opcode::Shr);
}

#[test]
fn unops() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let a = s32:32; let b = !a; let c = -b; c
    let body = b.block(
        Type::s(32),
        vec![
            b.let_(b.pat_name("a"), b.slit(32, 32)),
            b.let_(
                b.pat_name("b"),
                b.unary(Type::s(32), UnaryOp::Invert, b.name(Type::s(32), "a")),
            ),
            b.let_(
                b.pat_name("c"),
                b.unary(Type::s(32), UnaryOp::Negate, b.name(Type::s(32), "b")),
            ),
            crate::ast::Statement::Expr(b.name(Type::s(32), "c")),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions()[3].op(), Opcode::Invert);
    assert_eq!(code.instructions()[6].op(), Opcode::Negate);
}

#[test]
fn range_expression() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let x = u32:8; let y = u32:16; x..y
    let range_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 8,
    };
    let body = b.block(
        range_ty.clone(),
        vec![
            b.let_(b.pat_name("x"), b.ulit(32, 8)),
            b.let_(b.pat_name("y"), b.ulit(32, 16)),
            crate::ast::Statement::Expr(b.range(
                range_ty,
                b.name(Type::u(32), "x"),
                b.name(Type::u(32), "y"),
            )),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(code.instructions().len(), 7);
    assert_eq!(code.instructions()[6].op(), Opcode::Range);
}

#[test]
fn cast_bits_to_bits() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let a = s16:-4; a as u64
    let body = b.block(
        Type::u(64),
        vec![
            b.let_(b.pat_name("a"), b.slit(16, -4)),
            crate::ast::Statement::Expr(b.cast(Type::u(64), b.name(Type::s(16), "a"))),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal s16:-4\n\
         001 store 0\n\
         002 load 0\n\
         003 cast uN[64]"
    );
}

#[test]
fn cast_between_incompatible_types_is_unsupported() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let tuple_ty = Type::Tuple(vec![Type::u(8)]);
    let operand = b.tuple(tuple_ty, &[b.ulit(8, 1)]);
    let err = emit_err(&b, &registry, b.cast(Type::u(8), operand));
    assert!(
        matches!(err, EmitError::Unsupported { ref what, .. } if what.contains("cannot cast")),
        "got {:?}",
        err
    );
}

#[test]
fn block_ending_in_let_is_unit_valued() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let body = b.block(
        Type::unit(),
        vec![b.let_(b.pat_name("x"), b.ulit(32, 1))],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:1\n\
         001 store 0\n\
         002 create_tuple 0"
    );
}

#[test]
fn empty_block_is_unit_valued() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let code = emit(&b, &registry, b.block(Type::unit(), vec![]));
    assert_eq!(code.disassemble(false), "000 create_tuple 0");
}

#[test]
fn wildcard_let_discards_the_value() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // let _ = u32:5; u32:7
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_wild(), b.ulit(32, 5)),
            crate::ast::Statement::Expr(b.ulit(32, 7)),
        ],
    );
    let code = emit(&b, &registry, body);

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:5\n\
         001 pop\n\
         002 literal u32:7"
    );
    assert_eq!(code.slot_count(), 0);
}

#[test]
fn expression_env_names_lower_to_literals() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // MY_CONST + u32:1 with MY_CONST bound in the environment
    let expr = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "MY_CONST"),
        b.ulit(32, 1),
    );
    let code =
        Emitter::emit_expression(&registry, expr, &[(b.str("MY_CONST"), Value::ubits(32, 4))])
            .unwrap();

    assert_eq!(
        code.disassemble(false),
        "000 literal u32:4\n\
         001 literal u32:1\n\
         002 add"
    );
    assert_eq!(code.slot_count(), 0);
}

#[test]
fn proc_step_seeds_members_before_params() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    // Members (c, x, y) occupy slots 0..3; params (tok, a) get 3 and 4.
    // next(tok: token, a: u32) { let (tok2, b) = recv(tok, c); b + x }
    let chan_ty = Type::Channel {
        payload: Box::new(Type::u(32)),
    };
    let recv_ty = Type::Tuple(vec![Type::Token, Type::u(32)]);
    let recv = b.expr(
        recv_ty,
        crate::ast::ExprKind::Invocation {
            callee: crate::ast::Callee::Name(b.str("recv")),
            args: b.exprs(&[b.name(Type::Token, "tok"), b.name(chan_ty, "c")]),
            bindings: ParametricEnv::default(),
        },
        crate::ast::Span::default(),
    );
    let sum = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "b"),
        b.name(Type::u(32), "x"),
    );
    let body = b.block(
        Type::u(32),
        vec![
            b.let_(b.pat_tuple(&[b.pat_name("tok2"), b.pat_name("b")]), recv),
            crate::ast::Statement::Expr(sum),
        ],
    );
    let function = b.function(
        "next",
        vec![b.param("tok", Type::Token), b.param("a", Type::u(32))],
        body,
    );
    let code = Emitter::emit_proc_step(
        &registry,
        &function,
        &ParametricEnv::default(),
        &[b.str("c"), b.str("x"), b.str("y")],
    )
    .unwrap();

    assert_eq!(
        code.disassemble(false),
        "000 load 3\n\
         001 load 0\n\
         002 recv c\n\
         003 expand_tuple\n\
         004 store 5\n\
         005 store 6\n\
         006 load 6\n\
         007 load 1\n\
         008 add"
    );
    assert_eq!(code.slot_count(), 7);
}

#[test]
fn send_and_join_lower_to_channel_opcodes() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let chan_ty = Type::Channel {
        payload: Box::new(Type::u(32)),
    };
    // send(tok, c, u32:7)
    let send = b.expr(
        Type::Token,
        crate::ast::ExprKind::Invocation {
            callee: crate::ast::Callee::Name(b.str("send")),
            args: b.exprs(&[
                b.name(Type::Token, "tok"),
                b.name(chan_ty.clone(), "c"),
                b.ulit(32, 7),
            ]),
            bindings: ParametricEnv::default(),
        },
        crate::ast::Span::default(),
    );
    let function = b.function("next", vec![b.param("tok", Type::Token)], send);
    let code = Emitter::emit_proc_step(
        &registry,
        &function,
        &ParametricEnv::default(),
        &[b.str("c")],
    )
    .unwrap();
    assert_eq!(
        code.disassemble(false),
        "000 load 1\n\
         001 load 0\n\
         002 literal u32:7\n\
         003 send c"
    );

    // join(t0, t1)
    let join = b.expr(
        Type::Token,
        crate::ast::ExprKind::Invocation {
            callee: crate::ast::Callee::Name(b.str("join")),
            args: b.exprs(&[b.name(Type::Token, "t0"), b.name(Type::Token, "t1")]),
            bindings: ParametricEnv::default(),
        },
        crate::ast::Span::default(),
    );
    let function = b.function(
        "next",
        vec![b.param("t0", Type::Token), b.param("t1", Type::Token)],
        join,
    );
    let code =
        Emitter::emit_proc_step(&registry, &function, &ParametricEnv::default(), &[]).unwrap();
    assert_eq!(
        code.disassemble(false),
        "000 load 0\n\
         001 load 1\n\
         002 join 2"
    );
}

#[test]
fn channel_argument_must_be_a_name() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let chan_ty = Type::Channel {
        payload: Box::new(Type::u(32)),
    };
    let recv = b.expr(
        Type::Tuple(vec![Type::Token, Type::u(32)]),
        crate::ast::ExprKind::Invocation {
            callee: crate::ast::Callee::Name(b.str("recv")),
            args: b.exprs(&[
                b.name(Type::Token, "tok"),
                b.tuple(Type::Tuple(vec![chan_ty]), &[]),
            ]),
            bindings: ParametricEnv::default(),
        },
        crate::ast::Span::default(),
    );
    let function = b.function("next", vec![b.param("tok", Type::Token)], recv);
    let err = Emitter::emit_proc_step(&registry, &function, &ParametricEnv::default(), &[])
        .unwrap_err();
    assert!(matches!(err, EmitError::Unsupported { .. }), "got {:?}", err);
}

#[test]
fn emitted_sequences_round_trip_through_text() {
    let arena = Bump::new();
    let b = AstBuilder::new(&arena);
    let registry = Registry::new();

    let iter_ty = Type::Array {
        elem: Box::new(Type::u(32)),
        size: 8,
    };
    let iterable = b.range(iter_ty, b.ulit(32, 0), b.ulit(32, 8));
    let loop_body = b.binary(
        Type::u(32),
        BinaryOp::Add,
        b.name(Type::u(32), "accum"),
        b.name(Type::u(32), "i"),
    );
    let body = b.for_(
        Type::u(32),
        b.pat_tuple(&[b.pat_name("i"), b.pat_name("accum")]),
        iterable,
        b.ulit(32, 1),
        loop_body,
    );
    let code = emit(&b, &registry, body);

    let text = code.disassemble(false);
    let parsed = reassemble(&text).unwrap();
    assert_eq!(parsed.as_slice(), code.instructions());
}
