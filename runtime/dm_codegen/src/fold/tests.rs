use dm_ir::{Constant, Span, TypePath};
use dm_objtree::{DefinitionBuilder, ObjectTree, Variable, VariableFlags};

use crate::deref::{ChainOp, DerefChain, DerefOp};
use crate::expr::ConstantExpr;

fn tree() -> ObjectTree {
    let mut tree = ObjectTree::with_builtins();
    tree.define(
        DefinitionBuilder::new(TypePath::absolute(["obj", "item"]))
            .variable(Variable::new("weight", Constant::Integer(1)))
            .variable(
                Variable::new("max_stack", Constant::Integer(5)).with_flags(VariableFlags::CONST),
            )
            .variable(
                Variable::new("quality", Constant::from("fine"))
                    .with_flags(VariableFlags::READONLY),
            ),
    )
    .unwrap();
    tree
}

fn item_path() -> TypePath {
    TypePath::absolute(["obj", "item"])
}

fn head() -> Box<dyn crate::OperandExpr> {
    Box::new(ConstantExpr::new(Constant::Path(item_path()), Span::DUMMY))
}

fn field(name: &str, safe: bool) -> ChainOp {
    ChainOp {
        op: DerefOp::Field {
            name: name.to_string(),
            safe,
            search: false,
        },
        path: None,
        span: Span::DUMMY,
    }
}

#[test]
fn test_const_field_folds_to_value() {
    let tree = tree();
    let chain = DerefChain::new(head(), vec![field("max_stack", false)]);
    assert_eq!(chain.try_fold(&tree), Some(Constant::Integer(5)));
}

#[test]
fn test_safe_variant_still_folds() {
    let tree = tree();
    let chain = DerefChain::new(head(), vec![field("max_stack", true)]);
    assert_eq!(chain.try_fold(&tree), Some(Constant::Integer(5)));
}

#[test]
fn test_readonly_folds_opportunistically() {
    let tree = tree();
    let chain = DerefChain::new(head(), vec![field("quality", false)]);
    assert_eq!(chain.try_fold(&tree), Some(Constant::from("fine")));
}

#[test]
fn test_plain_variable_does_not_fold() {
    let tree = tree();
    let chain = DerefChain::new(head(), vec![field("weight", false)]);
    assert_eq!(chain.try_fold(&tree), None);
}

#[test]
fn test_unknown_receiver_does_not_fold() {
    let tree = tree();
    let chain = DerefChain::new(
        Box::new(ConstantExpr::new(Constant::Null, Span::DUMMY)),
        vec![field("max_stack", false)],
    );
    assert_eq!(chain.try_fold(&tree), None);
}

#[test]
fn test_penultimate_path_drives_longer_chains() {
    let tree = tree();
    // head.holder (statically an item) .max_stack folds through the
    // tracked path on the penultimate op.
    let chain = DerefChain::new(
        Box::new(ConstantExpr::new(Constant::Null, Span::DUMMY)),
        vec![
            ChainOp {
                op: DerefOp::Field {
                    name: "holder".to_string(),
                    safe: false,
                    search: true,
                },
                path: Some(item_path()),
                span: Span::DUMMY,
            },
            field("max_stack", false),
        ],
    );
    assert_eq!(chain.try_fold(&tree), Some(Constant::Integer(5)));
}

#[test]
fn test_terminal_call_does_not_fold() {
    let tree = tree();
    let chain = DerefChain::new(
        head(),
        vec![ChainOp {
            op: DerefOp::Call {
                name: "max_stack".to_string(),
                args: Vec::new(),
                safe: false,
                search: true,
            },
            path: None,
            span: Span::DUMMY,
        }],
    );
    assert_eq!(chain.try_fold(&tree), None);
}

#[test]
fn test_empty_chain_does_not_fold() {
    let tree = tree();
    let chain = DerefChain::new(head(), vec![]);
    assert_eq!(chain.try_fold(&tree), None);
}
