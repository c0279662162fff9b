use std::sync::{Arc, Mutex};

use dm_codegen::{BytecodeBuilder, LowerContext, OperandExpr};
use dm_ir::{Constant, Span, TypePath};
use dm_objtree::{
    DefinitionBuilder, ObjectTree, Parameter, ProcDef, Variable, VariableFlags,
};

use crate::{
    run_proc, Connection, ObjectRef, ProcArguments, RunResult, Runtime, Value,
};

pub fn path(text: &str) -> TypePath {
    TypePath::parse(text).unwrap()
}

/// Assemble a proc body.
pub fn body(build: impl FnOnce(&mut BytecodeBuilder)) -> Vec<u8> {
    let mut builder = BytecodeBuilder::new();
    build(&mut builder);
    builder.finish().unwrap()
}

fn proc_def(
    name: &str,
    owner: &str,
    parameters: Vec<Parameter>,
    build: impl FnOnce(&mut BytecodeBuilder),
) -> ProcDef {
    ProcDef::new(name, path(owner), body(build)).with_parameters(parameters)
}

/// The fixture tree every end-to-end test runs against.
///
/// - `/mob/base`: vars `client`, `health = 100`, `name`, `pet`; global
///   `score = 0`; procs `rank() = 1`, `add(a, b) = a + b`,
///   `greet() = 42`, `take(a, k, b) = a*100 + k*10 + b`
/// - `/mob/base/player`: overrides `rank() = ..() + 1` and
///   `add(a, b) = ..()` (bare super forward)
/// - `/obj/thing`: var `v = 0`, `New(n)` stores `n` into `v`
/// - `/obj/item`: `weight = 1`, const `max_stack = 5`, readonly
///   `quality = "fine"`, temporary `scratch`
pub fn fixture_tree() -> ObjectTree {
    let mut tree = ObjectTree::with_builtins();

    tree.define(
        DefinitionBuilder::new(path("/mob/base"))
            .variable(Variable::new("client", Constant::Null))
            .variable(Variable::new("health", Constant::Integer(100)))
            .variable(Variable::new("name", Constant::from("base")))
            .variable(Variable::new("pet", Constant::Null))
            .global("score", Constant::Integer(0))
            .proc(proc_def("rank", "/mob/base", vec![], |b| {
                b.push_int(1);
                b.ret();
            }))
            .proc(proc_def(
                "add",
                "/mob/base",
                vec![Parameter::new("a"), Parameter::new("b")],
                |b| {
                    b.get_identifier("a").unwrap();
                    b.get_identifier("b").unwrap();
                    b.add();
                    b.ret();
                },
            ))
            .proc(proc_def("greet", "/mob/base", vec![], |b| {
                b.push_int(42);
                b.ret();
            }))
            .proc(proc_def(
                "take",
                "/mob/base",
                vec![
                    Parameter::new("a"),
                    Parameter::new("k"),
                    Parameter::new("b"),
                ],
                |b| {
                    b.get_identifier("a").unwrap();
                    b.push_int(100);
                    b.multiply();
                    b.get_identifier("k").unwrap();
                    b.push_int(10);
                    b.multiply();
                    b.add();
                    b.get_identifier("b").unwrap();
                    b.add();
                    b.ret();
                },
            )),
    )
    .unwrap();

    tree.define(
        DefinitionBuilder::new(path("/mob/base/player"))
            .proc(proc_def("rank", "/mob/base/player", vec![], |b| {
                b.push_super_proc();
                b.push_arguments(&[]).unwrap();
                b.call();
                b.push_int(1);
                b.add();
                b.ret();
            }))
            .proc(proc_def(
                "add",
                "/mob/base/player",
                vec![Parameter::new("a"), Parameter::new("b")],
                |b| {
                    b.push_super_proc();
                    b.push_arguments(&[]).unwrap();
                    b.call();
                    b.ret();
                },
            )),
    )
    .unwrap();

    tree.define(
        DefinitionBuilder::new(path("/obj/thing"))
            .variable(Variable::new("v", Constant::Integer(0)))
            .proc(proc_def(
                "New",
                "/obj/thing",
                vec![Parameter::new("n")],
                |b| {
                    b.get_identifier("n").unwrap();
                    b.get_identifier("v").unwrap();
                    b.assign();
                },
            )),
    )
    .unwrap();

    tree.define(
        DefinitionBuilder::new(path("/obj/item"))
            .variable(Variable::new("weight", Constant::Integer(1)))
            .variable(
                Variable::new("max_stack", Constant::Integer(5)).with_flags(VariableFlags::CONST),
            )
            .variable(
                Variable::new("quality", Constant::from("fine"))
                    .with_flags(VariableFlags::READONLY),
            )
            .variable(
                Variable::new("scratch", Constant::Null).with_flags(VariableFlags::TEMPORARY),
            ),
    )
    .unwrap();

    tree
}

pub fn fixture_runtime() -> Runtime {
    Runtime::new(fixture_tree())
}

/// Run an assembled body as an anonymous top-level proc.
pub fn run(runtime: &Runtime, build: impl FnOnce(&mut BytecodeBuilder)) -> RunResult<Value> {
    run_args(runtime, None, ProcArguments::empty(), vec![], build)
}

/// Run with a `src` object.
pub fn run_src(
    runtime: &Runtime,
    src: &ObjectRef,
    build: impl FnOnce(&mut BytecodeBuilder),
) -> RunResult<Value> {
    run_args(runtime, Some(src.clone()), ProcArguments::empty(), vec![], build)
}

/// Run with a `src`, parameters, and arguments.
pub fn run_args(
    runtime: &Runtime,
    src: Option<ObjectRef>,
    args: ProcArguments,
    parameters: Vec<Parameter>,
    build: impl FnOnce(&mut BytecodeBuilder),
) -> RunResult<Value> {
    let proc = Arc::new(
        ProcDef::new("main", TypePath::root(), body(build)).with_parameters(parameters),
    );
    run_proc(runtime, proc, src, None, args)
}

pub fn player(runtime: &Runtime) -> ObjectRef {
    runtime.create_instance(&path("/mob/base/player")).unwrap()
}

pub fn item(runtime: &Runtime) -> ObjectRef {
    runtime.create_instance(&path("/obj/item")).unwrap()
}

/// Host connection that records every bridge call.
#[derive(Default)]
pub struct MockConnection {
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl MockConnection {
    fn record(&self, kind: &str, a: &str, b: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((kind.to_string(), a.to_string(), b.to_string()));
    }
}

impl Connection for MockConnection {
    fn browse(&self, html: &str, options: &str) {
        self.record("browse", html, options);
    }

    fn browse_resource(&self, resource: &str, filename: &str) {
        self.record("browse_rsc", resource, filename);
    }

    fn output_control(&self, message: &str, control: &str) {
        self.record("output", message, control);
    }
}

/// A name read with a statically known type, for lowering tests.
pub struct VarExpr {
    name: String,
    static_path: Option<TypePath>,
}

impl VarExpr {
    pub fn new(name: &str, static_path: Option<TypePath>) -> Self {
        VarExpr {
            name: name.to_string(),
            static_path,
        }
    }
}

impl OperandExpr for VarExpr {
    fn span(&self) -> Span {
        Span::DUMMY
    }

    fn emit(
        &self,
        builder: &mut BytecodeBuilder,
        _ctx: &LowerContext<'_>,
    ) -> dm_codegen::CompileResult<()> {
        builder.get_identifier(&self.name)
    }

    fn static_path(&self) -> Option<TypePath> {
        self.static_path.clone()
    }
}
