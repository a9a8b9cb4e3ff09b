//! End-to-end tests for the reference tree compiler: build core trees with
//! the factories, compile them and run them against a recording host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_common::{intrinsics, IrResult, Member, Method, Param, Ty};
use arbor_interp::{compile, exceptions, Host, RuntimeError, Value};
use arbor_ir::{
    BinaryOp, Binder, BinderRef, CallSite, CatchBlock, DynamicArgInfo, DynamicFlags, DynamicOp,
    Expr, LabelTarget, UnaryOp, Variable,
};

// ── Helpers ──────────────────────────────────────────────────────────

/// Records every call as `Name(arg, ...)`.
#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
}

impl Host for Recorder {
    fn call(&mut self, method: &Method, _receiver: Option<&Value>, args: &mut [Value]) -> Result<Value, Value> {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.calls.push(format!("{}({})", method.name(), rendered.join(", ")));
        match method.name() {
            "Fail" => Err(Value::exception("Boom", "host failure")),
            "Bump" => {
                let current = args[0].as_int().unwrap_or(0);
                args[0] = Value::Int(current + 1);
                Ok(Value::Unit)
            }
            _ => Ok(Value::default_of(method.ret())),
        }
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

fn log_method() -> Method {
    Method::new_static("Log", console(), vec![Param::new("value", Ty::Object)], Ty::Void).unwrap()
}

fn log(value: Expr) -> Expr {
    Expr::call_static(&log_method(), vec![value]).unwrap()
}

fn run(tree: &Expr) -> (Result<Value, RuntimeError>, Recorder) {
    let compiled = compile(tree).unwrap();
    let mut host = Recorder::default();
    let result = compiled.invoke(&mut host, vec![]);
    (result, host)
}

fn int(name: &str) -> Variable {
    Variable::new(name, Ty::Int)
}

fn add(a: Expr, b: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, a, b).unwrap()
}

// ── Control flow ─────────────────────────────────────────────────────

#[test]
fn loop_with_break_and_continue() {
    let i = int("i");
    let sum = int("sum");
    let brk = LabelTarget::new("brk");
    let cont = LabelTarget::new("cont");
    let body = Expr::seq(vec![
        Expr::if_then(
            Expr::binary(BinaryOp::GreaterEqual, Expr::var(&i), Expr::int(5)).unwrap(),
            Expr::break_to(&brk).unwrap(),
        )
        .unwrap(),
        Expr::assign(Expr::var(&i), add(Expr::var(&i), Expr::int(1))).unwrap(),
        Expr::if_then(
            Expr::binary(BinaryOp::Equal, Expr::var(&i), Expr::int(3)).unwrap(),
            Expr::continue_to(&cont).unwrap(),
        )
        .unwrap(),
        Expr::assign(Expr::var(&sum), add(Expr::var(&sum), Expr::var(&i))).unwrap(),
    ])
    .unwrap();
    let tree = Expr::block_typed(
        vec![i.clone(), sum.clone()],
        vec![
            Expr::loop_expr(body, Some(brk), Some(cont)).unwrap(),
            Expr::var(&sum),
        ],
        Ty::Int,
    )
    .unwrap();

    let (result, _) = run(&tree);
    assert_eq!(result.unwrap(), Value::Int(12));
}

#[test]
fn goto_enters_a_nested_block() {
    let target = LabelTarget::new("L");
    let tree = Expr::seq(vec![
        Expr::goto(&target).unwrap(),
        log(Expr::str("skipped")),
        Expr::seq(vec![
            log(Expr::str("skipped too")),
            Expr::label(&target, None).unwrap(),
            log(Expr::str("landed")),
        ])
        .unwrap(),
    ])
    .unwrap();

    let (result, host) = run(&tree);
    assert_eq!(result.unwrap(), Value::Unit);
    insta::assert_snapshot!(host.log(), @"Log(landed)");
}

#[test]
fn return_label_carries_the_value() {
    let n = int("n");
    let ret = LabelTarget::typed("return", Ty::Int);
    let body = Expr::block_typed(
        vec![],
        vec![
            Expr::if_then(
                Expr::binary(BinaryOp::Less, Expr::var(&n), Expr::int(0)).unwrap(),
                Expr::return_to(&ret, Some(Expr::int(0))).unwrap(),
            )
            .unwrap(),
            Expr::label(&ret, Some(Expr::var(&n))).unwrap(),
        ],
        Ty::Int,
    )
    .unwrap();
    let lambda = Expr::lambda(vec![n], body, Ty::Int).unwrap();
    let compiled = compile(&lambda).unwrap();
    let mut host = Recorder::default();

    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(7)]).unwrap(), Value::Int(7));
    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(-3)]).unwrap(), Value::Int(0));
}

#[test]
fn postfix_increment_yields_the_old_value() {
    let x = int("x");
    let old = int("old");
    let tree = Expr::block_typed(
        vec![x.clone(), old.clone()],
        vec![
            Expr::assign(Expr::var(&x), Expr::int(4)).unwrap(),
            Expr::assign(
                Expr::var(&old),
                Expr::unary(UnaryOp::PostIncrementAssign, Expr::var(&x)).unwrap(),
            )
            .unwrap(),
            Expr::new_tuple(vec![Expr::var(&old), Expr::var(&x)]).unwrap(),
        ],
        Ty::Tuple(vec![Ty::Int, Ty::Int]),
    )
    .unwrap();

    let (result, _) = run(&tree);
    assert_eq!(result.unwrap().to_string(), "(4, 5)");
}

// ── Exceptions ───────────────────────────────────────────────────────

#[test]
fn catch_then_finally_in_order() {
    let boom = Ty::class("Boom");
    let e = Variable::new("e", boom.clone());
    let tree = Expr::seq(vec![
        Expr::try_expr(
            Expr::seq(vec![
                log(Expr::str("body")),
                Expr::throw(Some(Expr::new_instance(boom.clone()).unwrap()), Ty::Void).unwrap(),
                log(Expr::str("unreachable")),
            ])
            .unwrap(),
            vec![CatchBlock::new(boom, Some(e), None, log(Expr::str("caught"))).unwrap()],
            Some(log(Expr::str("finally"))),
            None,
        )
        .unwrap(),
        log(Expr::str("after")),
    ])
    .unwrap();

    let (result, host) = run(&tree);
    assert!(result.is_ok());
    insta::assert_snapshot!(host.log(), @"Log(body); Log(caught); Log(finally); Log(after)");
}

#[test]
fn filter_rejects_and_rethrow_escapes() {
    let fail = Method::new_static("Fail", console(), vec![], Ty::Void).unwrap();
    let skipped = CatchBlock::new(Ty::Object, None, Some(Expr::bool(false)), log(Expr::str("filtered"))).unwrap();
    let rethrown = CatchBlock::new(
        Ty::Object,
        None,
        None,
        Expr::seq(vec![log(Expr::str("handler")), Expr::rethrow()]).unwrap(),
    )
    .unwrap();
    let tree = Expr::try_catch(Expr::call_static(&fail, vec![]).unwrap(), vec![skipped, rethrown]).unwrap();

    let (result, host) = run(&tree);
    let err = result.unwrap_err();
    assert!(err.thrown().is_some_and(|v| v.is_instance_of(&Ty::class("Boom"))));
    insta::assert_snapshot!(host.log(), @"Fail(); Log(handler)");
}

#[test]
fn fault_runs_only_on_throw() {
    let fail = Method::new_static("Fail", console(), vec![], Ty::Void).unwrap();
    let quiet = Expr::try_fault(log(Expr::str("ok")), log(Expr::str("fault"))).unwrap();
    let (_, host) = run(&quiet);
    insta::assert_snapshot!(host.log(), @"Log(ok)");

    let failing = Expr::try_fault(Expr::call_static(&fail, vec![]).unwrap(), log(Expr::str("fault"))).unwrap();
    let (result, host) = run(&failing);
    assert!(matches!(result, Err(RuntimeError::Thrown(_))));
    insta::assert_snapshot!(host.log(), @"Fail(); Log(fault)");
}

#[test]
fn division_by_zero_is_catchable() {
    let x = int("x");
    let body = Expr::try_catch(
        Expr::binary(BinaryOp::Div, Expr::var(&x), Expr::int(0)).unwrap(),
        vec![CatchBlock::new(Ty::class(exceptions::DIVIDE_BY_ZERO), None, None, Expr::int(-1)).unwrap()],
    )
    .unwrap();
    let lambda = Expr::lambda(vec![x], body, Ty::Int).unwrap();
    let compiled = compile(&lambda).unwrap();

    let result = compiled.invoke(&mut Recorder::default(), vec![Value::Int(10)]);
    assert_eq!(result.unwrap(), Value::Int(-1));
}

// ── Values and calls ─────────────────────────────────────────────────

#[test]
fn structs_are_copied_on_assignment() {
    let point = Ty::struct_ty("Point");
    let x = Member::field("X", point.clone(), Ty::Int).unwrap();
    let a = Variable::new("a", point.clone());
    let b = Variable::new("b", point.clone());
    let field = |v: &Variable| Expr::member(Some(Expr::var(v)), &x).unwrap();
    let tree = Expr::block_typed(
        vec![a.clone(), b.clone()],
        vec![
            Expr::assign(Expr::var(&a), Expr::new_instance(point).unwrap()).unwrap(),
            Expr::assign(field(&a), Expr::int(1)).unwrap(),
            Expr::assign(Expr::var(&b), Expr::var(&a)).unwrap(),
            Expr::assign(field(&b), Expr::int(2)).unwrap(),
            field(&a),
        ],
        Ty::Int,
    )
    .unwrap();

    let (result, _) = run(&tree);
    assert_eq!(result.unwrap(), Value::Int(1));
}

#[test]
fn by_ref_arguments_are_written_back() {
    let bump = Method::new_static("Bump", console(), vec![Param::new("x", Ty::Int).by_ref()], Ty::Void).unwrap();
    let x = int("x");
    let tree = Expr::block_typed(
        vec![x.clone()],
        vec![
            Expr::assign(Expr::var(&x), Expr::int(5)).unwrap(),
            Expr::call_static(&bump, vec![Expr::var(&x)]).unwrap(),
            Expr::var(&x),
        ],
        Ty::Int,
    )
    .unwrap();

    let (result, host) = run(&tree);
    assert_eq!(result.unwrap(), Value::Int(6));
    insta::assert_snapshot!(host.log(), @"Bump(5)");
}

#[test]
fn closures_share_captured_variables() {
    let counter = int("counter");
    let inc = Variable::new("inc", Ty::fun(vec![], Ty::Int));
    let bump = Expr::lambda(
        vec![],
        Expr::assign(Expr::var(&counter), add(Expr::var(&counter), Expr::int(1))).unwrap(),
        Ty::Int,
    )
    .unwrap();
    let tree = Expr::block_typed(
        vec![counter.clone(), inc.clone()],
        vec![
            Expr::assign(Expr::var(&inc), bump).unwrap(),
            Expr::invoke(Expr::var(&inc), vec![]).unwrap(),
            Expr::invoke(Expr::var(&inc), vec![]).unwrap(),
            Expr::var(&counter),
        ],
        Ty::Int,
    )
    .unwrap();

    let (result, _) = run(&tree);
    assert_eq!(result.unwrap(), Value::Int(2));
}

#[test]
fn intrinsics_run_without_the_host() {
    let formatted = Expr::call_static(
        &intrinsics::format_value(),
        vec![Expr::int(42), Expr::int(5), Expr::str("D3")],
    )
    .unwrap();
    let (result, host) = run(&formatted);
    assert_eq!(result.unwrap(), Value::str("  042"));
    assert!(host.calls.is_empty());
}

#[test]
fn wrong_argument_count_is_reported() {
    let x = int("x");
    let lambda = Expr::lambda(vec![x.clone()], Expr::var(&x), Ty::Int).unwrap();
    let compiled = compile(&lambda).unwrap();
    let err = compiled.invoke(&mut Recorder::default(), vec![]).unwrap_err();
    assert_eq!(err.to_string(), "expected 1 arguments, found 0");
}

// ── Late binding ─────────────────────────────────────────────────────

/// Binds `+` on two Ints to `(a, b) => (Object)((Int)a + (Int)b)` and
/// counts how often it is asked.
struct IntAdd {
    binds: Arc<AtomicUsize>,
}

impl Binder for IntAdd {
    fn bind(&self, _site: &CallSite, shapes: &[Ty]) -> IrResult<Expr> {
        self.binds.fetch_add(1, Ordering::SeqCst);
        assert_eq!(shapes, [Ty::Int, Ty::Int]);
        let a = Variable::new("a", Ty::Object);
        let b = Variable::new("b", Ty::Object);
        let sum = add(
            Expr::convert(Expr::var(&a), Ty::Int)?,
            Expr::convert(Expr::var(&b), Ty::Int)?,
        );
        Expr::lambda(vec![a, b], Expr::convert(sum, Ty::Object)?, Ty::Object)
    }
}

#[test]
fn dynamic_sites_bind_once_per_shape() {
    let binds = Arc::new(AtomicUsize::new(0));
    let site = CallSite {
        op: DynamicOp::Binary(BinaryOp::Add),
        flags: DynamicFlags::NONE,
        args: vec![DynamicArgInfo::default(); 2],
        context: None,
        binder: BinderRef::new(IntAdd { binds: binds.clone() }),
    };
    let x = int("x");
    let call = Expr::dynamic_call(site, vec![Expr::var(&x), Expr::int(1)], Ty::Object).unwrap();
    let lambda = Expr::lambda(vec![x], call, Ty::Object).unwrap();
    let compiled = compile(&lambda).unwrap();
    let mut host = Recorder::default();

    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(41)]).unwrap(), Value::Int(42));
    assert_eq!(compiled.invoke(&mut host, vec![Value::Int(1)]).unwrap(), Value::Int(2));
    assert_eq!(binds.load(Ordering::SeqCst), 1);
}
