use super::*;
use crate::environment::Scope;
use crate::identifier::Identifier;
use crate::Runtime;
use dm_objtree::ObjectTree;

fn rt() -> Runtime {
    Runtime::new(ObjectTree::with_builtins())
}

#[test]
fn test_splat_separates_named_and_positional() {
    // [1, "k" = 2, 3] -> positional [1, 3], named {k: 2}
    let mut list = ListInstance::new();
    list.add(Value::integer(1));
    list.set(Value::string("k"), Value::integer(2)).unwrap();
    list.add(Value::integer(3));

    let args = ProcArguments::from_list(&list);
    let positional: Vec<i32> = args
        .positional
        .iter()
        .map(|slot| match slot {
            ArgSlot::Value(v) => v.as_integer().unwrap(),
            ArgSlot::Ident(_) => panic!("splat produces values"),
        })
        .collect();
    assert_eq!(positional, [1, 3]);
    assert_eq!(args.named.len(), 1);
    assert_eq!(args.named[0].0, "k");
    match &args.named[0].1 {
        ArgSlot::Value(v) => assert!(v.equals(&Value::integer(2))),
        ArgSlot::Ident(_) => panic!("splat produces values"),
    }
}

#[test]
fn test_splat_keeps_plain_strings_positional() {
    let mut list = ListInstance::new();
    list.add(Value::string("plain"));
    let args = ProcArguments::from_list(&list);
    assert_eq!(args.positional.len(), 1);
    assert!(args.named.is_empty());
}

#[test]
fn test_materialize_resolves_identifiers() {
    let rt = rt();
    let scope = Scope::root(None);
    scope.borrow_mut().define("x", Value::integer(7));

    let mut args = ProcArguments::empty();
    args.push(ArgSlot::Ident(Identifier::Local {
        scope: scope.clone(),
        name: "x".into(),
    }));
    args.push_named("n", ArgSlot::Value(Value::integer(1)));

    let materialized = args.materialize(&rt).unwrap();
    assert!(materialized.positional[0].equals(&Value::integer(7)));
    assert!(materialized.named[0].1.equals(&Value::integer(1)));

    // Materialization reads the identifier's value at call time.
    scope.borrow_mut().define("x", Value::integer(8));
    let again = args.materialize(&rt).unwrap();
    assert!(again.positional[0].equals(&Value::integer(8)));
}

#[test]
fn test_round_trip_to_arguments() {
    let materialized = MaterializedArgs {
        positional: [Value::integer(1)].into_iter().collect(),
        named: vec![("k".into(), Value::integer(2))],
    };
    let args = materialized.to_arguments();
    assert_eq!(args.positional.len(), 1);
    assert_eq!(args.named.len(), 1);
    assert!(!args.is_empty());
    assert!(ProcArguments::empty().is_empty());
}
