//! Lowering end to end: build extended trees, lower them to the core
//! vocabulary and run the result on the reference tree compiler.

use std::rc::Rc;

use arbor_common::registry::{TypeDef, TypeDefKind};
use arbor_common::{IrError, IrResult, Indexer, Literal, Member, Method, Param, Ty, TypeRegistry};
use arbor_interp::{compile, Host, Object, RuntimeError, Value};
use arbor_ir::ext::{Argument, CaseTest, DynamicArg, InterpolationPart, LoopLabels, MemberInit, SwitchCase};
use arbor_ir::print::print;
use arbor_ir::{
    AssignOp, BinaryOp, Binder, BinderRef, CallSite, DynamicFlags, DynamicOp, Expr, LabelTarget, Placeholder,
    UnaryAssignOp, UnaryOp, Variable,
};
use arbor_lower::{lower, optimize, reduce, reduce_with, LowerOptions};

// ── Helpers ──────────────────────────────────────────────────────────

/// Records every host call as `Name(arg, ...)`, with `[N]` after the name
/// when the receiver carries an `N` field.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    /// Position of the scripted enumerator.
    step: i64,
}

impl Host for Recorder {
    fn call(&mut self, method: &Method, receiver: Option<&Value>, args: &mut [Value]) -> Result<Value, Value> {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let tag = match receiver {
            Some(Value::Object(obj)) => obj.get("N").map(|n| format!("[{n}]")).unwrap_or_default(),
            _ => String::new(),
        };
        self.calls.push(format!("{}{tag}({})", method.name(), rendered.join(", ")));
        match method.name() {
            "Id" => Ok(args[0].clone()),
            "Open" => Ok(Value::Object(Rc::new(Object::new(resource_ty())))),
            "OpenHandle" => Ok(Value::Object(Rc::new(Object::new(handle_ty())))),
            "Fail" => Err(Value::exception("Boom", "failed")),
            "get_Item" => Ok(Value::Int(10)),
            "Take" => {
                args[0] = args[1].clone();
                Ok(Value::Unit)
            }
            "GetEnumerator" => Ok(Value::Object(Rc::new(Object::new(Ty::class("BagIter"))))),
            "MoveNext" => {
                self.step += 1;
                Ok(Value::Bool(self.step <= 2))
            }
            "get_Current" => Ok(Value::Int(self.step * 10)),
            _ => Ok(Value::default_of(method.ret())),
        }
    }

    fn await_value(&mut self, value: Value) -> Result<Value, Value> {
        self.calls.push("await".to_string());
        Ok(value)
    }
}

impl Recorder {
    fn log(&self) -> String {
        self.calls.join("; ")
    }
}

fn console() -> Ty {
    Ty::class("Console")
}

fn resource_ty() -> Ty {
    Ty::class("Resource")
}

fn handle_ty() -> Ty {
    Ty::struct_ty("Handle")
}

fn log(value: Expr) -> Expr {
    let method = Method::new_static("Log", console(), vec![Param::new("value", Ty::Object)], Ty::Void).unwrap();
    Expr::call_static(&method, vec![value]).unwrap()
}

/// `Id(x)`: returns its argument, leaving a trace of when it ran.
fn id(value: i64) -> Expr {
    let method = Method::new_static("Id", console(), vec![Param::new("x", Ty::Int)], Ty::Int).unwrap();
    Expr::call_static(&method, vec![Expr::int(value)]).unwrap()
}

fn fail() -> Expr {
    let method = Method::new_static("Fail", console(), vec![], Ty::Void).unwrap();
    Expr::call_static(&method, vec![]).unwrap()
}

fn int(name: &str) -> Variable {
    Variable::new(name, Ty::Int)
}

fn binary(op: BinaryOp, a: Expr, b: Expr) -> Expr {
    Expr::binary(op, a, b).unwrap()
}

/// Lower with default options and run with `args`.
fn run(tree: &Expr, args: Vec<Value>) -> (Result<Value, RuntimeError>, Recorder) {
    let lowered = lower(tree, &LowerOptions::default()).unwrap();
    assert!(!contains_extended(&lowered), "{}", print(&lowered));
    let compiled = compile(&lowered).unwrap();
    let mut host = Recorder::default();
    let result = compiled.invoke(&mut host, args);
    (result, host)
}

fn contains_extended(expr: &Expr) -> bool {
    expr.is_extended() || expr.children_ref().into_iter().any(contains_extended)
}

// ── Identity ─────────────────────────────────────────────────────────

#[test]
fn core_trees_come_back_unchanged() {
    let x = int("x");
    let tree = Expr::block(
        vec![x.clone()],
        vec![Expr::assign(Expr::var(&x), Expr::int(1)).unwrap(), log(Expr::var(&x))],
    )
    .unwrap();
    let out = reduce(&tree).unwrap();
    assert!(Expr::ptr_eq(&out, &tree));
}

#[test]
fn lowering_is_stable_under_reoptimization() {
    let i = int("i");
    let tree = Expr::for_loop(
        vec![i.clone()],
        vec![Expr::assign(Expr::var(&i), Expr::int(0)).unwrap()],
        Some(binary(BinaryOp::Less, Expr::var(&i), Expr::int(3))),
        vec![Expr::unary_assign(UnaryAssignOp::PostIncrement, Expr::var(&i), None).unwrap()],
        log(Expr::var(&i)),
        LoopLabels::none(),
    )
    .unwrap();
    let once = lower(&tree, &LowerOptions::default()).unwrap();
    let again = optimize(&once);
    assert_eq!(print(&again), print(&once));
}

#[test]
fn temporaries_use_the_configured_prefix() {
    let node = Ty::class("Node");
    let value = Member::field("Value", node.clone(), Ty::Int).unwrap();
    let x = Variable::new("x", node.clone());
    let p = Placeholder::new(node);
    let tree = Expr::conditional_access(
        Expr::var(&x),
        p.clone(),
        Expr::member(Some(Expr::receiver(&p)), &value).unwrap(),
    )
    .unwrap();
    let options = LowerOptions::from_toml("temp_prefix = \"tmp.\"").unwrap();
    let out = reduce_with(&tree, &options).unwrap();
    assert!(print(&out).contains("tmp.receiver"), "{}", print(&out));
}

// ── Loops ────────────────────────────────────────────────────────────

#[test]
fn for_loop_counts_up() {
    let i = int("i");
    let tree = Expr::for_loop(
        vec![i.clone()],
        vec![Expr::assign(Expr::var(&i), Expr::int(0)).unwrap()],
        Some(binary(BinaryOp::Less, Expr::var(&i), Expr::int(3))),
        vec![Expr::unary_assign(UnaryAssignOp::PostIncrement, Expr::var(&i), None).unwrap()],
        log(Expr::var(&i)),
        LoopLabels::none(),
    )
    .unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Log(0); Log(1); Log(2)");
}

#[test]
fn while_loop_honors_break_and_continue() {
    let i = int("i");
    let brk = LabelTarget::new("brk");
    let cont = LabelTarget::new("cont");
    let body = Expr::seq(vec![
        Expr::unary_assign(UnaryAssignOp::PreIncrement, Expr::var(&i), None).unwrap(),
        Expr::if_then(
            binary(BinaryOp::Equal, Expr::var(&i), Expr::int(2)),
            Expr::continue_to(&cont).unwrap(),
        )
        .unwrap(),
        Expr::if_then(
            binary(BinaryOp::Equal, Expr::var(&i), Expr::int(4)),
            Expr::break_to(&brk).unwrap(),
        )
        .unwrap(),
        log(Expr::var(&i)),
    ])
    .unwrap();
    let looped = Expr::while_loop(
        binary(BinaryOp::Less, Expr::var(&i), Expr::int(10)),
        body,
        LoopLabels::new(Some(brk), Some(cont)),
    )
    .unwrap();
    let tree = Expr::block(
        vec![i.clone()],
        vec![Expr::assign(Expr::var(&i), Expr::int(0)).unwrap(), looped],
    )
    .unwrap();

    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Log(1); Log(3)");
}

#[test]
fn do_while_runs_the_body_first() {
    let tree = Expr::do_while(log(Expr::str("once")), Expr::bool(false), LoopLabels::none()).unwrap();
    let (_, host) = run(&tree, vec![]);
    insta::assert_snapshot!(host.log(), @"Log(once)");
}

#[test]
fn for_each_walks_an_array() {
    let items = Variable::new("items", Ty::array(Ty::Int));
    let item = int("item");
    let body = Expr::for_each(
        item.clone(),
        Expr::var(&items),
        None,
        log(Expr::var(&item)),
        LoopLabels::none(),
        &TypeRegistry::new(),
    )
    .unwrap();
    let tree = Expr::lambda(vec![items], body, Ty::Void).unwrap();
    let array = Value::array(Ty::Int, vec![Value::Int(10), Value::Int(20)]);

    let (result, host) = run(&tree, vec![array]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Log(10); Log(20)");
}

#[test]
fn for_each_disposes_a_pattern_enumerator() {
    let bag = Ty::class("Bag");
    let iter = Ty::class("BagIter");
    let mut registry = TypeRegistry::new();
    registry.define(
        TypeDef::new("Bag", TypeDefKind::Class)
            .with_method(Method::new_instance("GetEnumerator", bag.clone(), vec![], iter.clone()).unwrap()),
    );
    registry.define(
        TypeDef::new("BagIter", TypeDefKind::Class)
            .implementing("IDisposable")
            .with_method(Method::new_instance("MoveNext", iter.clone(), vec![], Ty::Bool).unwrap())
            .with_method(Method::new_instance("Dispose", iter.clone(), vec![], Ty::Void).unwrap())
            .with_member(Member::property("Current", iter, Ty::Int, true, false).unwrap()),
    );
    let b = Variable::new("b", bag.clone());
    let item = int("item");
    let body = Expr::for_each(
        item.clone(),
        Expr::var(&b),
        None,
        log(Expr::var(&item)),
        LoopLabels::none(),
        &registry,
    )
    .unwrap();
    let tree = Expr::lambda(vec![b], body, Ty::Void).unwrap();

    let (result, host) = run(&tree, vec![Value::Object(Rc::new(Object::new(bag)))]);
    assert!(result.is_ok());
    insta::assert_snapshot!(
        host.log(),
        @"GetEnumerator(); MoveNext(); get_Current(); Log(10); MoveNext(); get_Current(); Log(20); MoveNext(); Dispose()"
    );
}

// ── Switch and statement blocks ──────────────────────────────────────

#[test]
fn goto_case_moves_between_bodies() {
    let x = int("x");
    let cases = vec![
        SwitchCase::new(
            vec![CaseTest::int(1)],
            Expr::seq(vec![log(Expr::str("A")), Expr::goto_case(Literal::Int(2))]).unwrap(),
        )
        .unwrap(),
        SwitchCase::new(vec![CaseTest::int(2)], log(Expr::str("B"))).unwrap(),
    ];
    let body = Expr::switch(Expr::var(&x), cases, None, None, vec![]).unwrap();
    let tree = Expr::lambda(vec![x], body, Ty::Void).unwrap();
    let lowered = lower(&tree, &LowerOptions::default()).unwrap();
    let compiled = compile(&lowered).unwrap();

    let trace = |n: i64| {
        let mut host = Recorder::default();
        compiled.invoke(&mut host, vec![Value::Int(n)]).unwrap();
        host.log()
    };
    assert_eq!(trace(1), "Log(A); Log(B)");
    assert_eq!(trace(2), "Log(B)");
    assert_eq!(trace(3), "");
}

#[test]
fn goto_case_targets_the_innermost_switch() {
    let x = int("x");
    let y = int("y");
    let inner = Expr::switch(
        Expr::var(&y),
        vec![
            SwitchCase::new(
                vec![CaseTest::int(1)],
                Expr::seq(vec![log(Expr::str("inner 1")), Expr::goto_case(Literal::Int(2))]).unwrap(),
            )
            .unwrap(),
            SwitchCase::new(vec![CaseTest::int(2)], log(Expr::str("inner 2"))).unwrap(),
        ],
        None,
        None,
        vec![],
    )
    .unwrap();
    let outer = Expr::switch(
        Expr::var(&x),
        vec![
            SwitchCase::new(vec![CaseTest::int(1)], inner).unwrap(),
            SwitchCase::new(vec![CaseTest::int(2)], log(Expr::str("outer 2"))).unwrap(),
        ],
        None,
        None,
        vec![],
    )
    .unwrap();
    let tree = Expr::lambda(vec![x, y], outer, Ty::Void).unwrap();

    let (result, host) = run(&tree, vec![Value::Int(1), Value::Int(1)]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Log(inner 1); Log(inner 2)");
}

#[test]
fn jumps_without_a_target_are_internal_errors() {
    let l = LabelTarget::new("l");
    let stray = Expr::seq(vec![log(Expr::int(1)), Expr::goto(&l).unwrap()]).unwrap();
    assert!(reduce(&stray).unwrap_err().is_internal());

    // A lambda body cannot jump to a label of the enclosing tree.
    let escaping = Expr::lambda(vec![], Expr::goto(&l).unwrap(), Ty::Void).unwrap();
    let tree = Expr::seq(vec![escaping, Expr::label(&l, None).unwrap()]).unwrap();
    assert!(reduce(&tree).unwrap_err().is_internal());

    let twice = Expr::seq(vec![Expr::label(&l, None).unwrap(), Expr::label(&l, None).unwrap()]).unwrap();
    assert!(reduce(&twice).unwrap_err().is_internal());

    let orphan = Expr::seq(vec![Expr::goto_case(Literal::Int(1))]).unwrap();
    assert!(reduce(&orphan).unwrap_err().is_internal());
}

#[test]
fn default_case_and_companion_tests() {
    let x = int("x");
    let cases = vec![
        SwitchCase::new(vec![CaseTest::int(1), CaseTest::int(2)], log(Expr::str("small"))).unwrap(),
        SwitchCase::new(vec![CaseTest::Default], log(Expr::str("other"))).unwrap(),
    ];
    let body = Expr::switch(Expr::var(&x), cases, None, None, vec![]).unwrap();
    let tree = Expr::lambda(vec![x], body, Ty::Void).unwrap();
    let lowered = lower(&tree, &LowerOptions::default()).unwrap();
    let compiled = compile(&lowered).unwrap();

    let mut host = Recorder::default();
    for n in [2, 5] {
        compiled.invoke(&mut host, vec![Value::Int(n)]).unwrap();
    }
    insta::assert_snapshot!(host.log(), @"Log(small); Log(other)");
}

#[test]
fn statement_block_returns_through_its_label() {
    let n = int("n");
    let ret = LabelTarget::typed("return", Ty::Int);
    let body = Expr::stmt_block(
        vec![],
        vec![
            Expr::if_then(
                binary(BinaryOp::Less, Expr::var(&n), Expr::int(0)),
                Expr::return_to(&ret, Some(Expr::int(-1))).unwrap(),
            )
            .unwrap(),
            Expr::return_to(&ret, Some(binary(BinaryOp::Mul, Expr::var(&n), Expr::int(2)))).unwrap(),
        ],
        Some(ret.clone()),
    )
    .unwrap();
    let tree = Expr::lambda(vec![n], body, Ty::Int).unwrap();
    let lowered = lower(&tree, &LowerOptions::default()).unwrap();
    let compiled = compile(&lowered).unwrap();
    let mut host = Recorder::default();

    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(4)]).unwrap(), Value::Int(8));
    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(-4)]).unwrap(), Value::Int(-1));
}

// ── Resources ────────────────────────────────────────────────────────

fn registry() -> TypeRegistry {
    let dispose = Method::new_instance("Dispose", resource_ty(), vec![], Ty::Void).unwrap();
    let dispose_async = Method::new_instance("DisposeAsync", resource_ty(), vec![], Ty::class("Task")).unwrap();
    let release = Method::new_instance("Dispose", handle_ty(), vec![], Ty::Void).unwrap();
    let mut registry = TypeRegistry::new();
    registry.define(
        TypeDef::new("Resource", TypeDefKind::Class)
            .with_method(dispose)
            .with_method(dispose_async),
    );
    registry.define(TypeDef::new("Handle", TypeDefKind::Struct).with_method(release));
    registry
}

fn open(name: &str) -> Expr {
    let method = Method::new_static(name, console(), vec![], resource_ty()).unwrap();
    Expr::call_static(&method, vec![]).unwrap()
}

#[test]
fn using_disposes_after_the_body() {
    let tree = Expr::using(open("Open"), log(Expr::str("body")), false, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Open(); Log(body); Dispose()");
}

#[test]
fn using_disposes_when_the_body_throws() {
    let tree = Expr::using(open("Open"), fail(), false, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(matches!(result, Err(RuntimeError::Thrown(_))));
    insta::assert_snapshot!(host.log(), @"Open(); Fail(); Dispose()");
}

#[test]
fn using_skips_a_null_resource() {
    let tree = Expr::using(open("OpenNothing"), log(Expr::str("body")), false, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"OpenNothing(); Log(body)");
}

#[test]
fn async_using_awaits_the_release() {
    let tree = Expr::using(open("Open"), log(Expr::str("body")), true, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Open(); Log(body); DisposeAsync(); await");
}

#[test]
fn using_a_nullable_struct_checks_for_a_value() {
    let acquire = |name: &str| {
        let method = Method::new_static(name, console(), vec![], Ty::nullable(handle_ty())).unwrap();
        Expr::call_static(&method, vec![]).unwrap()
    };

    let tree = Expr::using(acquire("OpenHandle"), log(Expr::str("body")), false, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"OpenHandle(); Log(body); Dispose()");

    let tree = Expr::using(acquire("OpenNoHandle"), log(Expr::str("body")), false, &registry()).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"OpenNoHandle(); Log(body)");
}

// ── Access ───────────────────────────────────────────────────────────

#[test]
fn conditional_access_chain_short_circuits() {
    let node = Ty::class("Node");
    let next = Member::field("Next", node.clone(), node.clone()).unwrap();
    let value = Member::field("Value", node.clone(), Ty::Int).unwrap();
    let x = Variable::new("x", node.clone());
    let outer = Placeholder::new(node.clone());
    let inner = Placeholder::new(node.clone());

    // x?.Next?.Value
    let tail = Expr::conditional_access(
        Expr::member(Some(Expr::receiver(&outer)), &next).unwrap(),
        inner.clone(),
        Expr::member(Some(Expr::receiver(&inner)), &value).unwrap(),
    )
    .unwrap();
    let chain = Expr::conditional_access(Expr::var(&x), outer, tail).unwrap();
    let ty = chain.ty();
    assert_eq!(ty, Ty::nullable(Ty::Int));
    let tree = Expr::lambda(vec![x], chain, ty).unwrap();
    let lowered = lower(&tree, &LowerOptions::default()).unwrap();
    let compiled = compile(&lowered).unwrap();
    let mut host = Recorder::default();

    let leaf = Object::with_fields(node.clone(), [("Value".to_string(), Value::Int(7))]);
    let root = Object::with_fields(node.clone(), [("Next".to_string(), Value::Object(Rc::new(leaf)))]);
    let lonely = Object::with_fields(node, [("Next".to_string(), Value::Null)]);

    assert_eq!(compiled.invoke(&mut host, vec![Value::Null]).unwrap(), Value::Null);
    assert_eq!(compiled.invoke(&mut host, vec![Value::Object(Rc::new(lonely))]).unwrap(), Value::Null);
    assert_eq!(compiled.invoke(&mut host, vec![Value::Object(Rc::new(root))]).unwrap(), Value::Int(7));
}

#[test]
fn conditional_access_runs_no_getter_on_null() {
    let node = Ty::class("Node");
    let next = Member::property("Next", node.clone(), node.clone(), true, false).unwrap();
    let value = Member::property("Value", node.clone(), Ty::Int, true, false).unwrap();
    let x = Variable::new("x", node.clone());
    let outer = Placeholder::new(node.clone());
    let inner = Placeholder::new(node.clone());

    // x?.Next?.Value through host accessors
    let tail = Expr::conditional_access(
        Expr::member(Some(Expr::receiver(&outer)), &next).unwrap(),
        inner.clone(),
        Expr::member(Some(Expr::receiver(&inner)), &value).unwrap(),
    )
    .unwrap();
    let chain = Expr::conditional_access(Expr::var(&x), outer, tail).unwrap();
    let ty = chain.ty();
    let tree = Expr::lambda(vec![x], chain, ty).unwrap();
    let lowered = lower(&tree, &LowerOptions::default()).unwrap();
    let compiled = compile(&lowered).unwrap();

    let mut host = Recorder::default();
    assert_eq!(compiled.invoke(&mut host, vec![Value::Null]).unwrap(), Value::Null);
    assert_eq!(host.log(), "");

    // `Next` comes back null, so `Value` is never asked for.
    let mut host = Recorder::default();
    let root = Value::Object(Rc::new(Object::new(node)));
    assert_eq!(compiled.invoke(&mut host, vec![root]).unwrap(), Value::Null);
    insta::assert_snapshot!(host.log(), @"get_Next()");
}

#[test]
fn from_end_indexes_and_ranges() {
    let items = Variable::new("items", Ty::array(Ty::Int));
    let array = || Value::array(Ty::Int, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);

    let last = Expr::array_access(Expr::var(&items), Expr::from_end(Expr::int(1)).unwrap()).unwrap();
    let tree = Expr::lambda(vec![items.clone()], last, Ty::Int).unwrap();
    let (result, _) = run(&tree, vec![array()]);
    assert_eq!(result.unwrap(), Value::Int(30));

    let range = Expr::range(None, Some(Expr::from_end(Expr::int(1)).unwrap())).unwrap();
    let slice = Expr::array_access(Expr::var(&items), range).unwrap();
    let tree = Expr::lambda(vec![items], slice, Ty::array(Ty::Int)).unwrap();
    let (result, _) = run(&tree, vec![array()]);
    let Value::Array(sliced) = result.unwrap() else {
        panic!("expected an array");
    };
    assert_eq!(sliced.to_vec(), vec![Value::Int(10), Value::Int(20)]);
}

// ── Assignment and calls ─────────────────────────────────────────────

#[test]
fn compound_assign_on_an_indexer_evaluates_operands_once() {
    let bag = Ty::class("Bag");
    let indexer = Indexer::new(bag.clone(), Ty::Int, vec![Param::new("i", Ty::Int)], true, true).unwrap();
    let b = Variable::new("b", bag.clone());
    let target = Expr::index(Expr::var(&b), Some(&indexer), vec![id(0)]).unwrap();
    let body = Expr::compound_assign(AssignOp::Add, target, Expr::int(5)).unwrap();
    let tree = Expr::lambda(vec![b], body, Ty::Int).unwrap();

    let (result, host) = run(&tree, vec![Value::Object(Rc::new(Object::new(bag)))]);
    assert_eq!(result.unwrap(), Value::Int(15));
    insta::assert_snapshot!(host.log(), @"Id(0); get_Item(0); set_Item(0, 15)");
}

#[test]
fn named_arguments_run_in_written_order() {
    let pair = Method::new_static(
        "Pair",
        console(),
        vec![
            Param::new("a", Ty::Int),
            Param::new("b", Ty::Int),
            Param::new("c", Ty::Int).with_default(Literal::Int(7)),
        ],
        Ty::Void,
    )
    .unwrap();
    let tree = Expr::call_with(
        None,
        &pair,
        vec![Argument::named("b", id(2)), Argument::named("a", id(1))],
    )
    .unwrap();

    let (result, host) = run(&tree, vec![]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Id(2); Id(1); Pair(1, 2, 7)");
}

fn counter(n: i64) -> Value {
    let obj = Object::with_fields(Ty::class("Counter"), [("N".to_string(), Value::Int(n))]);
    Value::Object(Rc::new(obj))
}

#[test]
fn receiver_is_read_before_reordered_arguments() {
    let counter_ty = Ty::class("Counter");
    let m = Method::new_instance(
        "M",
        counter_ty.clone(),
        vec![Param::new("a", Ty::Int), Param::new("b", Ty::Int)],
        Ty::Void,
    )
    .unwrap();
    let x = Variable::new("x", counter_ty.clone());
    let y = Variable::new("y", counter_ty);

    // x.M(b: { x = y; 2 }, a: 1)
    let swap = Expr::block(
        vec![],
        vec![Expr::assign(Expr::var(&x), Expr::var(&y)).unwrap(), Expr::int(2)],
    )
    .unwrap();
    let call = Expr::call_with(
        Some(Expr::var(&x)),
        &m,
        vec![Argument::named("b", swap), Argument::named("a", Expr::int(1))],
    )
    .unwrap();
    let tree = Expr::lambda(vec![x, y], call, Ty::Void).unwrap();

    let (result, host) = run(&tree, vec![counter(1), counter(2)]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"M[1](1, 2)");
}

#[test]
fn by_ref_element_keeps_the_index_it_was_given() {
    let take = Method::new_static(
        "Take",
        console(),
        vec![Param::new("x", Ty::Int).by_ref(), Param::new("v", Ty::Int)],
        Ty::Void,
    )
    .unwrap();
    let items = Variable::new("items", Ty::array(Ty::Int));
    let i = int("i");

    // Take(ref items[i], { i = 1; 5 })
    let element = Expr::array_access(Expr::var(&items), Expr::var(&i)).unwrap();
    let moved = Expr::block(
        vec![],
        vec![Expr::assign(Expr::var(&i), Expr::int(1)).unwrap(), Expr::int(5)],
    )
    .unwrap();
    let call = Expr::call_static(&take, vec![element, moved]).unwrap();
    let tree = Expr::lambda(vec![items, i], call, Ty::Void).unwrap();

    let array = Value::array(Ty::Int, vec![Value::Int(10), Value::Int(20)]);
    let (result, host) = run(&tree, vec![array.clone(), Value::Int(0)]);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Take(10, 5)");
    let Value::Array(cells) = array else {
        panic!("expected an array");
    };
    assert_eq!(cells.to_vec(), vec![Value::Int(5), Value::Int(20)]);
}

#[test]
fn with_copies_a_struct() {
    let point = Ty::struct_ty("Point");
    let x = Member::field("X", point.clone(), Ty::Int).unwrap();
    let p = Variable::new("p", point.clone());
    let q = Variable::new("q", point.clone());
    let body = Expr::block_typed(
        vec![q.clone()],
        vec![
            Expr::assign(
                Expr::var(&q),
                Expr::with_copy(Expr::var(&p), vec![MemberInit::new(&x, Expr::int(5))]).unwrap(),
            )
            .unwrap(),
            Expr::new_tuple(vec![
                Expr::member(Some(Expr::var(&q)), &x).unwrap(),
                Expr::member(Some(Expr::var(&p)), &x).unwrap(),
            ])
            .unwrap(),
        ],
        Ty::Tuple(vec![Ty::Int, Ty::Int]),
    )
    .unwrap();
    let tree = Expr::lambda(vec![p], body, Ty::Tuple(vec![Ty::Int, Ty::Int])).unwrap();
    let source = Object::with_fields(point, [("X".to_string(), Value::Int(1))]);

    let (result, _) = run(&tree, vec![Value::Object(Rc::new(source))]);
    assert_eq!(result.unwrap().to_string(), "(5, 1)");
}

// ── Values ───────────────────────────────────────────────────────────

#[test]
fn interpolation_formats_each_slot() {
    let parts = || {
        vec![
            InterpolationPart::text("n="),
            InterpolationPart::formatted(Expr::int(42), Some(5), Some("D3")),
            InterpolationPart::text(" {ok}"),
        ]
    };
    let plain = Expr::interpolated(parts(), Ty::String).unwrap();
    let (result, _) = run(&plain, vec![]);
    assert_eq!(result.unwrap(), Value::str("n=  042 {ok}"));

    let deferred = Expr::interpolated(parts(), Ty::Formattable).unwrap();
    let (result, _) = run(&deferred, vec![]);
    assert_eq!(result.unwrap().to_string(), "n=  042 {ok}");
}

#[test]
fn long_tuples_nest_and_convert() {
    let wide = Expr::tuple_literal((1..=9).map(Expr::int).collect()).unwrap();
    let (result, _) = run(&wide, vec![]);
    assert_eq!(result.unwrap().to_string(), "(1, 2, 3, 4, 5, 6, 7, 8, 9)");

    let pair = Expr::tuple_literal(vec![Expr::int(1), Expr::str("x")]).unwrap();
    let boxed = Expr::tuple_convert(pair, Ty::Tuple(vec![Ty::Object, Ty::Object]), vec![]).unwrap();
    let (result, _) = run(&boxed, vec![]);
    assert_eq!(result.unwrap().to_string(), "(1, x)");

    let unboxed = Expr::tuple_convert(boxed, Ty::Tuple(vec![Ty::Int, Ty::String]), vec![]).unwrap();
    let (result, _) = run(&unboxed, vec![]);
    assert_eq!(result.unwrap(), Value::tuple(vec![Value::Int(1), Value::str("x")]));
}

#[test]
fn lifted_tuple_conversion_keeps_null() {
    let pair = Ty::Tuple(vec![Ty::Int, Ty::Int]);
    let boxed = Ty::nullable(Ty::Tuple(vec![Ty::Object, Ty::Object]));
    let t = Variable::new("t", Ty::nullable(pair));
    let body = Expr::tuple_convert(Expr::var(&t), boxed.clone(), vec![]).unwrap();
    let tree = Expr::lambda(vec![t], body, boxed).unwrap();

    let (result, _) = run(&tree, vec![Value::Null]);
    assert_eq!(result.unwrap(), Value::Null);
    let (result, _) = run(&tree, vec![Value::tuple(vec![Value::Int(1), Value::Int(2)])]);
    assert_eq!(result.unwrap().to_string(), "(1, 2)");
}

#[test]
fn tuple_survives_a_conversion_and_its_inverse() {
    let scale = |op: BinaryOp| {
        let v = int("v");
        let body = binary(op, Expr::var(&v), Expr::int(10));
        Expr::lambda(vec![v], body, Ty::Int).unwrap()
    };
    let pair = Ty::Tuple(vec![Ty::Int, Ty::Int]);
    let source = Expr::tuple_literal(vec![Expr::int(3), Expr::int(4)]).unwrap();
    let there = Expr::tuple_convert(source, pair.clone(), vec![Some(scale(BinaryOp::Mul)), None]).unwrap();
    let (result, _) = run(&there, vec![]);
    assert_eq!(result.unwrap().to_string(), "(30, 4)");

    let back = Expr::tuple_convert(there, pair, vec![Some(scale(BinaryOp::Div)), None]).unwrap();
    let (result, _) = run(&back, vec![]);
    assert_eq!(result.unwrap(), Value::tuple(vec![Value::Int(3), Value::Int(4)]));
}

// ── Late binding ─────────────────────────────────────────────────────

/// Binds `+` on any two Ints.
struct IntAdd;

impl Binder for IntAdd {
    fn bind(&self, _site: &CallSite, shapes: &[Ty]) -> IrResult<Expr> {
        let params: Vec<Variable> = shapes
            .iter()
            .enumerate()
            .map(|(i, _)| Variable::new(format!("a{i}"), Ty::Object))
            .collect();
        let left = Expr::convert(Expr::var(&params[0]), Ty::Int)?;
        let right = Expr::convert(Expr::var(&params[1]), Ty::Int)?;
        let sum = Expr::convert(Expr::binary(BinaryOp::Add, left, right)?, Ty::Object)?;
        Expr::lambda(params, sum, Ty::Object)
    }
}

#[test]
fn dynamic_operations_bind_at_run_time() {
    let tree = Expr::dynamic_binary(BinaryOp::Add, id(1), Expr::int(2), BinderRef::new(IntAdd)).unwrap();
    let (result, host) = run(&tree, vec![]);
    assert_eq!(result.unwrap(), Value::Int(3));
    insta::assert_snapshot!(host.log(), @"Id(1)");
}

/// Binds element access, arithmetic and truth tests over `Int[]` cells.
struct Cells;

impl Binder for Cells {
    fn bind(&self, site: &CallSite, shapes: &[Ty]) -> IrResult<Expr> {
        let params: Vec<Variable> = (0..shapes.len())
            .map(|i| Variable::new(format!("a{i}"), Ty::Object))
            .collect();
        let arg = |i: usize, ty: Ty| Expr::convert(Expr::var(&params[i]), ty);
        let cells = Ty::array(Ty::Int);
        let body = match &site.op {
            DynamicOp::GetIndex => Expr::array_index(arg(0, cells)?, arg(1, Ty::Int)?)?,
            DynamicOp::SetIndex => {
                let element = Expr::array_index(arg(0, cells)?, arg(1, Ty::Int)?)?;
                Expr::assign(element, arg(2, Ty::Int)?)?
            }
            DynamicOp::Binary(op @ (BinaryOp::AndAlso | BinaryOp::OrElse)) => {
                Expr::binary(*op, arg(0, Ty::Bool)?, arg(1, Ty::Bool)?)?
            }
            DynamicOp::Binary(op) => Expr::binary(*op, arg(0, Ty::Int)?, arg(1, Ty::Int)?)?,
            DynamicOp::Unary(UnaryOp::Increment) => Expr::binary(BinaryOp::Add, arg(0, Ty::Int)?, Expr::int(1))?,
            DynamicOp::Unary(UnaryOp::IsTrue) => arg(0, Ty::Bool)?,
            DynamicOp::Unary(UnaryOp::IsFalse) => Expr::unary(UnaryOp::Not, arg(0, Ty::Bool)?)?,
            DynamicOp::InvokeMember(_) => Expr::null(Ty::Object)?,
            other => return Err(IrError::unsupported(other.name())),
        };
        let body = Expr::convert_if_needed(body, &Ty::Object)?;
        Expr::lambda(params, body, Ty::Object)
    }
}

fn cells(items: &[i64]) -> Value {
    Value::array(Ty::Int, items.iter().copied().map(Value::Int).collect())
}

fn cell_values(value: &Value) -> Vec<Value> {
    let Value::Array(cells) = value else {
        panic!("expected an array");
    };
    cells.to_vec()
}

#[test]
fn dynamic_compound_assign_keeps_its_index() {
    let d = Variable::new("d", Ty::Object);
    let i = int("i");
    let target = Expr::dynamic_get_index(Expr::var(&d), vec![Expr::var(&i)], BinderRef::new(Cells)).unwrap();

    // d[i] += { i = 1; 5 }
    let operand = Expr::block(
        vec![],
        vec![Expr::assign(Expr::var(&i), Expr::int(1)).unwrap(), Expr::int(5)],
    )
    .unwrap();
    let body = Expr::compound_assign(AssignOp::Add, target, operand).unwrap();
    let tree = Expr::lambda(vec![d, i], body, Ty::Object).unwrap();

    let array = cells(&[10, 20]);
    let (result, _) = run(&tree, vec![array.clone(), Value::Int(0)]);
    assert_eq!(result.unwrap(), Value::Int(15));
    assert_eq!(cell_values(&array), vec![Value::Int(15), Value::Int(20)]);
}

#[test]
fn dynamic_increment_reads_and_writes_once() {
    let d = Variable::new("d", Ty::Object);
    let target = Expr::dynamic_get_index(Expr::var(&d), vec![id(0)], BinderRef::new(Cells)).unwrap();
    let body = Expr::unary_assign(UnaryAssignOp::PostIncrement, target, None).unwrap();
    let tree = Expr::lambda(vec![d], body, Ty::Object).unwrap();

    let array = cells(&[10, 20]);
    let (result, host) = run(&tree, vec![array.clone()]);
    assert_eq!(result.unwrap(), Value::Int(10));
    assert_eq!(cell_values(&array), vec![Value::Int(11), Value::Int(20)]);
    insta::assert_snapshot!(host.log(), @"Id(0)");
}

#[test]
fn dynamic_logic_skips_the_right_operand() {
    let flag = Method::new_static("Flag", console(), vec![], Ty::Bool).unwrap();
    let right = || Expr::call_static(&flag, vec![]).unwrap();

    let and = Expr::dynamic_binary(BinaryOp::AndAlso, Expr::bool(false), right(), BinderRef::new(Cells)).unwrap();
    let (result, host) = run(&and, vec![]);
    assert_eq!(result.unwrap(), Value::Bool(false));
    assert_eq!(host.log(), "");

    let or = Expr::dynamic_binary(BinaryOp::OrElse, Expr::bool(true), right(), BinderRef::new(Cells)).unwrap();
    let (result, host) = run(&or, vec![]);
    assert_eq!(result.unwrap(), Value::Bool(true));
    assert_eq!(host.log(), "");

    let decided_late = Expr::dynamic_binary(BinaryOp::OrElse, Expr::bool(false), right(), BinderRef::new(Cells)).unwrap();
    let (result, host) = run(&decided_late, vec![]);
    assert_eq!(result.unwrap(), Value::Bool(false));
    insta::assert_snapshot!(host.log(), @"Flag()");
}

#[test]
fn dynamic_arguments_run_in_order_around_a_by_ref_element() {
    let r = Variable::new("r", Ty::Object);
    let items = Variable::new("items", Ty::array(Ty::Int));
    let element = Expr::array_access(Expr::var(&items), id(0)).unwrap();

    // r.M(r, Id(1), ref items[Id(0)])
    let tree = Expr::dynamic(
        DynamicOp::InvokeMember("M".to_string()),
        vec![DynamicArg::new(Expr::var(&r)), DynamicArg::new(id(1)), DynamicArg::by_ref(element)],
        DynamicFlags::NONE,
        None,
        BinderRef::new(Cells),
    )
    .unwrap();
    let tree = Expr::lambda(vec![r, items], tree, Ty::Object).unwrap();

    let (result, host) = run(&tree, vec![Value::Null, cells(&[10, 20])]);
    assert_eq!(result.unwrap(), Value::Null);
    insta::assert_snapshot!(host.log(), @"Id(1); Id(0)");
}

