use super::*;
use crate::errors::CompileErrorKind;
use crate::expr::ConstantExpr;
use dm_ir::{BytecodeReader, Constant, Opcode};
use dm_objtree::{DefinitionBuilder, ObjectTree, Variable, VariableFlags};

fn tree() -> ObjectTree {
    let mut tree = ObjectTree::with_builtins();
    tree.define(
        DefinitionBuilder::new(dm_ir::TypePath::absolute(["obj", "item"]))
            .variable(Variable::new("weight", Constant::Integer(1)))
            .variable(
                Variable::new("max_stack", Constant::Integer(5)).with_flags(VariableFlags::CONST),
            ),
    )
    .unwrap();
    tree
}

fn item_head() -> Box<dyn OperandExpr> {
    Box::new(ConstantExpr::new(
        Constant::Path(dm_ir::TypePath::absolute(["obj", "item"])),
        Span::DUMMY,
    ))
}

fn field_op(name: &str, safe: bool, search: bool) -> ChainOp {
    ChainOp {
        op: DerefOp::Field {
            name: name.to_string(),
            safe,
            search,
        },
        path: None,
        span: Span::DUMMY,
    }
}

fn emit_read(chain: &DerefChain, tree: &ObjectTree) -> CompileResult<Vec<u8>> {
    let ctx = LowerContext { tree };
    let mut builder = BytecodeBuilder::new();
    chain.emit_read(&mut builder, &ctx)?;
    builder.finish()
}

#[test]
fn test_plain_field_read_emits_dereference() {
    let tree = tree();
    let chain = DerefChain::new(item_head(), vec![field_op("weight", false, false)]);
    let bytes = emit_read(&chain, &tree).unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    assert_eq!(reader.opcode().unwrap(), Opcode::PushPath);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::Dereference);
    assert_eq!(reader.read_string().unwrap(), "weight");
    assert!(reader.at_end());
}

#[test]
fn test_safe_field_guards_to_chain_end() {
    let tree = tree();
    let chain = DerefChain::new(
        item_head(),
        vec![field_op("weight", true, false), field_op("weight", false, false)],
    );
    assert!(chain.can_short_circuit());
    let bytes = emit_read(&chain, &tree).unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    assert_eq!(reader.opcode().unwrap(), Opcode::PushPath);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::JumpIfNull);
    // One end label for the whole chain: the guard jumps past the last
    // dereference.
    assert_eq!(reader.read_i32().unwrap() as usize, bytes.len());
}

#[test]
fn test_non_search_unknown_name_is_unresolved() {
    let tree = tree();
    let chain = DerefChain::new(item_head(), vec![field_op("missing", false, false)]);
    let err = emit_read(&chain, &tree).unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::UnresolvedName(_)));
}

#[test]
fn test_search_variant_defers_unknown_names_to_runtime() {
    let tree = tree();
    let chain = DerefChain::new(item_head(), vec![field_op("missing", false, true)]);
    assert!(emit_read(&chain, &tree).is_ok());
}

#[test]
fn test_unknown_receiver_type_defers_to_runtime() {
    let tree = tree();
    let chain = DerefChain::new(
        Box::new(ConstantExpr::new(Constant::Null, Span::DUMMY)),
        vec![field_op("anything", false, false)],
    );
    // No static path, so nothing to check at compile time.
    assert!(emit_read(&chain, &tree).is_ok());
}

#[test]
fn test_index_op_emits_index_list() {
    let tree = tree();
    let chain = DerefChain::new(
        item_head(),
        vec![ChainOp {
            op: DerefOp::Index {
                index: Box::new(ConstantExpr::new(Constant::Integer(2), Span::DUMMY)),
                safe: false,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );
    let bytes = emit_read(&chain, &tree).unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    assert_eq!(reader.opcode().unwrap(), Opcode::PushPath);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::PushInt);
    assert_eq!(reader.read_i32().unwrap(), 2);
    assert_eq!(reader.opcode().unwrap(), Opcode::IndexList);
}

#[test]
fn test_call_emits_dereference_arguments_call() {
    let tree = tree();
    let chain = DerefChain::new(
        item_head(),
        vec![ChainOp {
            op: DerefOp::Call {
                name: "weight".to_string(),
                args: vec![CallArg::positional(Box::new(ConstantExpr::new(
                    Constant::Integer(1),
                    Span::DUMMY,
                )))],
                safe: false,
                search: true,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );
    let bytes = emit_read(&chain, &tree).unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    assert_eq!(reader.opcode().unwrap(), Opcode::PushPath);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::Dereference);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::PushInt);
    reader.read_i32().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::PushArguments);
    let records = reader.read_argument_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(reader.opcode().unwrap(), Opcode::Call);
}

#[test]
fn test_reference_rejects_bare_head() {
    let tree = tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(item_head(), vec![]);
    let mut builder = BytecodeBuilder::new();
    let err = chain
        .emit_reference(&mut builder, &ctx, ShortCircuitMode::PopNull)
        .unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::ShapeError(_)));
}

#[test]
fn test_reference_pop_null_mode_uses_pop_guard() {
    let tree = tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(item_head(), vec![field_op("weight", true, false)]);
    let mut builder = BytecodeBuilder::new();
    chain
        .emit_reference(&mut builder, &ctx, ShortCircuitMode::PopNull)
        .unwrap();
    let bytes = builder.finish().unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    reader.opcode().unwrap();
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::JumpIfNullPop);
}

#[test]
fn test_initial_field_emits_name_then_unary() {
    let tree = tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(item_head(), vec![field_op("weight", false, false)]);
    let mut builder = BytecodeBuilder::new();
    chain.emit_initial(&mut builder, &ctx, false).unwrap();
    let bytes = builder.finish().unwrap();
    let mut reader = BytecodeReader::new(&bytes);
    assert_eq!(reader.opcode().unwrap(), Opcode::PushPath);
    reader.read_string().unwrap();
    assert_eq!(reader.opcode().unwrap(), Opcode::PushString);
    assert_eq!(reader.read_string().unwrap(), "weight");
    assert_eq!(reader.opcode().unwrap(), Opcode::Initial);
}

#[test]
fn test_issaved_field_emits_is_saved() {
    let tree = tree();
    let ctx = LowerContext { tree: &tree };
    let chain = DerefChain::new(item_head(), vec![field_op("weight", false, false)]);
    let mut builder = BytecodeBuilder::new();
    chain.emit_initial(&mut builder, &ctx, true).unwrap();
    let bytes = builder.finish().unwrap();
    assert_eq!(*bytes.last().unwrap(), Opcode::IsSaved as u8);
}

#[test]
fn test_invalid_op_is_not_implemented() {
    let tree = tree();
    let chain = DerefChain::new(
        item_head(),
        vec![ChainOp {
            op: DerefOp::Invalid,
            path: None,
            span: Span::DUMMY,
        }],
    );
    let err = emit_read(&chain, &tree).unwrap_err();
    assert!(matches!(err.kind, CompileErrorKind::NotImplemented(_)));
}
