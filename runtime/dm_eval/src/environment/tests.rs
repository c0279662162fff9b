use super::*;
use crate::errors::RuntimeErrorKind;
use crate::runtime::Runtime;
use dm_ir::Constant;
use dm_objtree::{DefinitionBuilder, ObjectTree, Variable};

fn runtime_with_mob() -> Runtime {
    let mut tree = ObjectTree::with_builtins();
    tree.define(
        DefinitionBuilder::new(dm_ir::TypePath::absolute(["mob", "player"]))
            .variable(Variable::new("health", Constant::Integer(100)))
            .global("score", Constant::Integer(0)),
    )
    .unwrap();
    Runtime::new(tree)
}

fn player(rt: &Runtime) -> crate::ObjectRef {
    rt.create_instance(&dm_ir::TypePath::absolute(["mob", "player"]))
        .unwrap()
}

#[test]
fn test_define_and_resolve_local() {
    let rt = runtime_with_mob();
    let scope = Scope::root(None);
    scope.borrow_mut().define("x", Value::integer(42));
    assert!(Scope::resolve(&scope, "x", &rt)
        .unwrap()
        .equals(&Value::integer(42)));
}

#[test]
fn test_child_shadowing() {
    let rt = runtime_with_mob();
    let root = Scope::root(None);
    root.borrow_mut().define("x", Value::integer(1));
    let child = Scope::child_of(&root);
    child.borrow_mut().define("x", Value::integer(2));
    assert!(Scope::resolve(&child, "x", &rt)
        .unwrap()
        .equals(&Value::integer(2)));
    assert!(Scope::resolve(&root, "x", &rt)
        .unwrap()
        .equals(&Value::integer(1)));
}

#[test]
fn test_assign_writes_nearest_local() {
    let rt = runtime_with_mob();
    let root = Scope::root(None);
    root.borrow_mut().define("x", Value::integer(1));
    let child = Scope::child_of(&root);
    Scope::assign(&child, "x", Value::integer(5), &rt).unwrap();
    assert!(Scope::resolve(&root, "x", &rt)
        .unwrap()
        .equals(&Value::integer(5)));
}

#[test]
fn test_resolve_falls_back_to_src_field() {
    let rt = runtime_with_mob();
    let src = player(&rt);
    let scope = Scope::root(Some(src.clone()));
    assert!(Scope::resolve(&scope, "health", &rt)
        .unwrap()
        .equals(&Value::integer(100)));

    // A local shadows the field.
    scope.borrow_mut().define("health", Value::integer(5));
    assert!(Scope::resolve(&scope, "health", &rt)
        .unwrap()
        .equals(&Value::integer(5)));
    assert!(src
        .borrow()
        .get_field("health")
        .unwrap()
        .equals(&Value::integer(100)));
}

#[test]
fn test_assign_writes_src_field() {
    let rt = runtime_with_mob();
    let src = player(&rt);
    let scope = Scope::root(Some(src.clone()));
    Scope::assign(&scope, "health", Value::integer(55), &rt).unwrap();
    assert!(src
        .borrow()
        .get_field("health")
        .unwrap()
        .equals(&Value::integer(55)));
}

#[test]
fn test_resolve_falls_back_to_global() {
    let rt = runtime_with_mob();
    let scope = Scope::root(Some(player(&rt)));
    assert!(Scope::resolve(&scope, "score", &rt)
        .unwrap()
        .equals(&Value::integer(0)));
    Scope::assign(&scope, "score", Value::integer(9), &rt).unwrap();
    assert!(Scope::resolve(&scope, "score", &rt)
        .unwrap()
        .equals(&Value::integer(9)));
}

#[test]
fn test_unknown_name_fails() {
    let rt = runtime_with_mob();
    let scope = Scope::root(None);
    let err = Scope::resolve(&scope, "nope", &rt).unwrap_err();
    assert!(matches!(err.kind, RuntimeErrorKind::UnknownIdentifier { .. }));
}

#[test]
fn test_assign_unknown_creates_local_in_topmost() {
    let rt = runtime_with_mob();
    let root = Scope::root(None);
    let child = Scope::child_of(&root);
    Scope::assign(&child, "fresh", Value::integer(3), &rt).unwrap();
    // The binding landed in the child (topmost), not the root.
    assert!(child.borrow().has_local("fresh"));
    assert!(!root.borrow().has_local("fresh"));
}

#[test]
fn test_child_shares_src() {
    let rt = runtime_with_mob();
    let src = player(&rt);
    let root = Scope::root(Some(src.clone()));
    let child = Scope::child_of(&root);
    assert!(Scope::resolve(&child, "health", &rt)
        .unwrap()
        .equals(&Value::integer(100)));
}
