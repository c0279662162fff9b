//! The acceptance scenarios: lowered chains and whole programs run
//! end-to-end.

use dm_codegen::{
    CallArg, ChainOp, CompileErrorKind, ConstantExpr, DerefChain, DerefOp, LowerContext,
    ShortCircuitMode,
};
use dm_ir::{Constant, Span, TypePath};
use dm_objtree::Parameter;

use super::helpers::*;
use crate::{ArgSlot, ProcArguments, Value};

fn null_head() -> Box<dyn dm_codegen::OperandExpr> {
    Box::new(ConstantExpr::new(Constant::Null, Span::DUMMY))
}

fn field(name: &str, safe: bool) -> ChainOp {
    ChainOp {
        op: DerefOp::Field {
            name: name.to_string(),
            safe,
            search: true,
        },
        path: None,
        span: Span::DUMMY,
    }
}

fn call_op(name: &str) -> ChainOp {
    ChainOp {
        op: DerefOp::Call {
            name: name.to_string(),
            args: Vec::new(),
            safe: false,
            search: true,
        },
        path: None,
        span: Span::point(9),
    }
}

/// Scenario: a null head flows through `?.a.b.c` - the whole chain
/// yields null and none of the dereferences run.
#[test]
fn test_safe_chain_short_circuits_on_null_head() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    let chain = DerefChain::new(
        null_head(),
        vec![field("a", true), field("b", false), field("c", false)],
    );
    assert!(chain.can_short_circuit());

    let result = run(&rt, |b| {
        chain.emit_read(b, &ctx).unwrap();
        b.ret();
    })
    .unwrap();
    // Had any dereference executed, the run would have failed with a
    // null-dereference error.
    assert!(result.equals(&Value::Null));
}

#[test]
fn test_unsafe_chain_on_null_fails() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    let chain = DerefChain::new(null_head(), vec![field("a", false)]);
    assert!(!chain.can_short_circuit());

    let err = run(&rt, |b| {
        chain.emit_read(b, &ctx).unwrap();
        b.ret();
    })
    .unwrap_err();
    assert!(matches!(
        err.kind,
        crate::RuntimeErrorKind::NullDereference { .. }
    ));
}

/// Scenario: `initial(x.f().g)` is rejected at the call-result stage.
#[test]
fn test_initial_of_call_result_is_shape_error() {
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(null_head(), vec![call_op("f"), field("g", false)]);

    let mut builder = dm_codegen::BytecodeBuilder::new();
    let err = chain.emit_initial(&mut builder, &ctx, false).unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::ShapeError(_)));
    // The error points at the call, not the terminal field.
    assert_eq!(err.span, Span::point(9));
}

#[test]
fn test_reference_of_call_result_is_shape_error() {
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(null_head(), vec![call_op("f")]);

    let mut builder = dm_codegen::BytecodeBuilder::new();
    let err = chain
        .emit_reference(&mut builder, &ctx, ShortCircuitMode::KeepNull)
        .unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::ShapeError(_)));
}

/// Scenario: `~0` is `0xFFFFFF`, `~1` is `0xFFFFFE`.
#[test]
fn test_bit_not_truncates() {
    let rt = fixture_runtime();
    for (input, expected) in [(0, 0xFF_FFFF), (1, 0xFF_FFFE)] {
        let result = run(&rt, |b| {
            b.push_int(input);
            b.bit_not();
            b.ret();
        })
        .unwrap();
        assert!(result.equals(&Value::integer(expected)));
    }
}

/// Scenario: `args["n"] = 3` writes through to the local binding.
#[test]
fn test_args_string_write_through() {
    let rt = fixture_runtime();
    let result = run_args(
        &rt,
        None,
        ProcArguments::from_values([Value::integer(1)]),
        vec![Parameter::new("n")],
        |b| {
            b.push_int(3);
            b.get_identifier("args").unwrap();
            b.push_string("n").unwrap();
            b.index_list();
            b.assign();
            b.get_identifier("n").unwrap();
            b.ret();
        },
    )
    .unwrap();
    assert!(result.equals(&Value::integer(3)));
}

/// Integer-keyed writes update the positionally-matching binding too.
#[test]
fn test_args_integer_write_through() {
    let rt = fixture_runtime();
    let result = run_args(
        &rt,
        None,
        ProcArguments::from_values([Value::integer(1)]),
        vec![Parameter::new("n")],
        |b| {
            b.push_int(9);
            b.get_identifier("args").unwrap();
            b.push_int(1);
            b.index_list();
            b.assign();
            b.get_identifier("n").unwrap();
            b.ret();
        },
    )
    .unwrap();
    assert!(result.equals(&Value::integer(9)));
}

/// Scenario: splatting `[1, "k" = 2, 3]` yields positional `[1, 3]` and
/// named `{k: 2}`; with parameters `(a, k, b)` that binds a=1, k=2, b=3.
#[test]
fn test_arglist_splat_binding() {
    let rt = fixture_runtime();
    let src = player(&rt);
    let result = run_src(&rt, &src, |b| {
        b.get_identifier("take").unwrap();
        b.create_list();
        b.push_int(1);
        b.list_append();
        b.push_string("k").unwrap();
        b.push_int(2);
        b.list_append_associated();
        b.push_int(3);
        b.list_append();
        b.push_argument_list();
        b.call();
        b.ret();
    })
    .unwrap();
    assert!(result.equals(&Value::integer(123)));
}

/// Iteration walks a snapshot: appending during the loop is invisible.
#[test]
fn test_iteration_snapshot() {
    let rt = fixture_runtime();
    let result = run(&rt, |b| {
        b.create_list();
        b.push_int(1);
        b.list_append();
        b.push_int(2);
        b.list_append();
        b.define_variable("L").unwrap();
        b.push_int(0);
        b.define_variable("count").unwrap();
        b.get_identifier("L").unwrap();
        b.create_list_enumerator();
        let top = b.label();
        let done = b.label();
        b.bind(top);
        b.enumerate_list("x").unwrap();
        b.jump_if_false(done);
        // Append to the source list mid-iteration.
        b.push_int(99);
        b.get_identifier("L").unwrap();
        b.append();
        b.push_int(1);
        b.get_identifier("count").unwrap();
        b.append();
        b.jump(top);
        b.bind(done);
        b.destroy_list_enumerator();
        b.get_identifier("count").unwrap();
        b.ret();
    })
    .unwrap();
    // Two iterations despite the growth; the appends themselves landed.
    assert!(result.equals(&Value::integer(2)));
}

/// Folding a const chain matches the fully lowered read.
#[test]
fn test_fold_matches_lowered_chain() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    let chain = DerefChain::new(
        Box::new(VarExpr::new("it", Some(path("/obj/item")))),
        vec![ChainOp {
            op: DerefOp::Field {
                name: "max_stack".to_string(),
                safe: false,
                search: false,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );

    let folded = chain.try_fold(&tree).unwrap();
    assert_eq!(folded, Constant::Integer(5));

    let it = item(&rt);
    let lowered = run_args(
        &rt,
        None,
        {
            let mut args = ProcArguments::empty();
            args.push(ArgSlot::Value(Value::object(it)));
            args
        },
        vec![Parameter::new("it")],
        |b| {
            chain.emit_read(b, &ctx).unwrap();
            b.ret();
        },
    )
    .unwrap();
    assert!(lowered.equals(&Value::from_constant(&folded)));
}

/// Safe call operands still emit fine for plain reads.
#[test]
fn test_safe_call_in_read_chain() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    // pet?.greet() with a null pet: whole chain yields null.
    let chain = DerefChain::new(
        Box::new(VarExpr::new("pet", None)),
        vec![ChainOp {
            op: DerefOp::Call {
                name: "greet".to_string(),
                args: Vec::new(),
                safe: true,
                search: true,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );

    let src = player(&rt);
    let result = run_src(&rt, &src, |b| {
        chain.emit_read(b, &ctx).unwrap();
        b.ret();
    })
    .unwrap();
    assert!(result.equals(&Value::Null));

    // With a live pet the call goes through.
    let src = player(&rt);
    let pet = player(&rt);
    src.borrow_mut()
        .set_field("pet", Value::object(pet))
        .unwrap();
    let result = run_src(&rt, &src, |b| {
        chain.emit_read(b, &ctx).unwrap();
        b.ret();
    })
    .unwrap();
    assert!(result.equals(&Value::integer(42)));
}

/// Call arguments inside a chain lower with named records intact.
#[test]
fn test_chain_call_with_arguments() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    let chain = DerefChain::new(
        Box::new(VarExpr::new("pet", None)),
        vec![ChainOp {
            op: DerefOp::Call {
                name: "add".to_string(),
                args: vec![
                    CallArg::positional(Box::new(ConstantExpr::new(
                        Constant::Integer(2),
                        Span::DUMMY,
                    ))),
                    CallArg::named(
                        "b",
                        Box::new(ConstantExpr::new(Constant::Integer(3), Span::DUMMY)),
                    ),
                ],
                safe: false,
                search: true,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );

    let src = player(&rt);
    let pet = player(&rt);
    src.borrow_mut()
        .set_field("pet", Value::object(pet))
        .unwrap();
    let result = run_src(&rt, &src, |b| {
        chain.emit_read(b, &ctx).unwrap();
        b.ret();
    })
    .unwrap();
    assert!(result.equals(&Value::integer(5)));
}

/// A reference chain assigns through the terminal field.
#[test]
fn test_reference_chain_assignment() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    let chain = DerefChain::new(
        Box::new(VarExpr::new("pet", None)),
        vec![field("health", false)],
    );

    let src = player(&rt);
    let pet = player(&rt);
    src.borrow_mut()
        .set_field("pet", Value::object(pet.clone()))
        .unwrap();
    run_src(&rt, &src, |b| {
        b.push_int(31);
        chain
            .emit_reference(b, &ctx, ShortCircuitMode::KeepNull)
            .unwrap();
        b.assign();
        b.push_null();
        b.ret();
    })
    .unwrap();
    assert!(pet
        .borrow()
        .get_field("health")
        .unwrap()
        .equals(&Value::integer(31)));
}

/// TypePath helper used by proc references.
#[test]
fn test_chain_index_terminal_under_initial() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    // initial(L[2]) on a list reads the current slot.
    let chain = DerefChain::new(
        Box::new(VarExpr::new("L", None)),
        vec![ChainOp {
            op: DerefOp::Index {
                index: Box::new(ConstantExpr::new(Constant::Integer(2), Span::DUMMY)),
                safe: false,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );

    let result = run(&rt, |b| {
        b.create_list();
        b.push_int(7);
        b.list_append();
        b.push_int(8);
        b.list_append();
        b.define_variable("L").unwrap();
        chain.emit_initial(b, &ctx, false).unwrap();
        b.ret();
    })
    .unwrap();
    assert!(result.equals(&Value::integer(8)));
}

/// Scope reference on a type with a known path.
#[test]
fn test_scope_reference_reads_default_and_global() {
    let rt = fixture_runtime();
    let tree = fixture_tree();
    let ctx = LowerContext { tree: &tree };

    // player::health reads the definition default even when the live
    // field differs.
    let reference = dm_codegen::ScopeReference::new(
        Box::new(VarExpr::new("who", Some(path("/mob/base/player")))),
        "health",
        Span::DUMMY,
    );
    let src = player(&rt);
    src.borrow_mut()
        .set_field("health", Value::integer(5))
        .unwrap();
    let result = run_args(
        &rt,
        None,
        {
            let mut args = ProcArguments::empty();
            args.push(ArgSlot::Value(Value::object(src)));
            args
        },
        vec![Parameter::new("who")],
        |b| {
            reference.emit(b, &ctx).unwrap();
            b.ret();
        },
    )
    .unwrap();
    assert!(result.equals(&Value::integer(100)));

    // player::score resolves to the global slot.
    let global = dm_codegen::ScopeReference::new(
        Box::new(VarExpr::new("who", Some(path("/mob/base/player")))),
        "score",
        Span::DUMMY,
    );
    let src = player(&rt);
    let result = run_args(
        &rt,
        None,
        {
            let mut args = ProcArguments::empty();
            args.push(ArgSlot::Value(Value::object(src)));
            args
        },
        vec![Parameter::new("who")],
        |b| {
            global.emit(b, &ctx).unwrap();
            b.ret();
        },
    )
    .unwrap();
    assert!(result.equals(&Value::integer(0)));
}

#[test]
fn test_path_proc_marker_helper() {
    let reference = TypePath::parse("/mob/base/proc/rank").unwrap();
    assert_eq!(
        reference.sub_path_after("proc").unwrap().elements(),
        ["rank"]
    );
}
