//! The tree-walking evaluator.
//!
//! Every node evaluates to a [`Value`] or to a [`Flow`] that unwinds the
//! Rust stack: a jump travelling to the block or loop that owns its label,
//! a thrown value travelling to the nearest matching handler, or a fatal
//! error. A block that owns the target label resumes at the label,
//! entering nested blocks on the way when the label sits inside one.

use std::rc::Rc;

use arbor_common::{Indexer, Member, MemberKind, Method, Ty};
use arbor_ir::expr::{Binary, Block, Call, CatchBlock, DynamicCall, Lambda, Loop, New, Try, Unary};
use arbor_ir::labels::declares_label;
use arbor_ir::{BinaryOp, Expr, ExprKind, LabelTarget, UnaryOp, Variable};

use crate::compile::Shared;
use crate::env::Env;
use crate::error::RuntimeError;
use crate::host::Host;
use crate::intrinsics;
use crate::value::{exceptions, Array, Closure, IndexValue, Object, Value};

pub(crate) enum Flow {
    Jump { target: LabelTarget, value: Value },
    Throw(Value),
    Fatal(RuntimeError),
}

type Eval<T = Value> = Result<T, Flow>;

fn internal(message: impl Into<String>) -> Flow {
    Flow::Fatal(RuntimeError::Internal(message.into()))
}

fn throw(ty_name: &str, message: impl Into<String>) -> Flow {
    Flow::Throw(Value::exception(ty_name, message))
}

fn truth(value: &Value) -> Eval<bool> {
    value
        .as_bool()
        .ok_or_else(|| internal(format!("expected a Bool, found {value:?}")))
}

/// A storage location, with its receiver and index arguments already
/// evaluated.
enum Location {
    Variable(Variable),
    Field(Rc<Object>, Member),
    Static(Member),
    Property(Option<Value>, Member),
    Element(Rc<Array>, i64),
    Indexed(Value, Indexer, Vec<Value>),
}

pub(crate) struct Interpreter<'a> {
    host: &'a mut dyn Host,
    shared: &'a Shared,
    /// Exceptions being handled, innermost last; `throw;` rethrows the top.
    handling: Vec<Value>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(host: &'a mut dyn Host, shared: &'a Shared) -> Self {
        Interpreter {
            host,
            shared,
            handling: Vec::new(),
        }
    }

    pub(crate) fn run(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        let result = self.eval(expr, env);
        finish(result)
    }

    pub(crate) fn run_lambda_root(&mut self, lambda: &Lambda, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let result = self.run_lambda(lambda, &Env::default(), args);
        finish(result)
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr, env: &Env) -> Eval {
        match expr.kind() {
            ExprKind::Constant(c) => Ok(Value::from_literal(&c.value)),
            ExprKind::Default(ty) => Ok(Value::default_of(ty)),
            ExprKind::Variable(v) => env
                .get(v)
                .ok_or_else(|| internal(format!("variable `{}` is unbound", v.name()))),
            ExprKind::Lambda(_) => Ok(Value::Closure(Rc::new(Closure {
                lambda: expr.clone(),
                env: env.clone(),
            }))),
            ExprKind::Assign(a) => {
                let location = self.locate(&a.target, env)?;
                let value = self.eval(&a.value, env)?.copied();
                self.write(&location, value.clone(), env)?;
                Ok(value)
            }
            ExprKind::Unary(u) => self.eval_unary(u, env),
            ExprKind::Binary(b) => self.eval_binary(b, env),
            ExprKind::Convert(c) => {
                let value = self.eval(&c.operand, env)?;
                convert(value, &c.ty)
            }
            ExprKind::Conditional(c) => {
                let test = self.eval(&c.test, env)?;
                let branch = if truth(&test)? { &c.if_true } else { &c.if_false };
                let value = self.eval(branch, env)?;
                Ok(if c.ty.is_void() { Value::Unit } else { value })
            }
            ExprKind::Block(b) => self.eval_block(b, env, None),
            ExprKind::Loop(l) => self.eval_loop(l, env),
            ExprKind::Goto(g) => {
                let value = match &g.value {
                    Some(v) => self.eval(v, env)?,
                    None => Value::Unit,
                };
                Err(Flow::Jump {
                    target: g.target.clone(),
                    value,
                })
            }
            ExprKind::Label(l) => match &l.default {
                Some(d) => self.eval(d, env),
                None => Ok(Value::Unit),
            },
            ExprKind::Try(t) => self.eval_try(t, env),
            ExprKind::Throw(t) => match &t.value {
                Some(v) => match self.eval(v, env)? {
                    Value::Null => Err(throw(exceptions::NULL_REFERENCE, "thrown value is null")),
                    value => Err(Flow::Throw(value)),
                },
                None => match self.handling.last() {
                    Some(current) => Err(Flow::Throw(current.clone())),
                    None => Err(internal("rethrow outside a catch clause")),
                },
            },
            ExprKind::Call(c) => self.eval_call(c, env),
            ExprKind::Invoke(i) => {
                let target = self.eval(&i.target, env)?;
                let args = self.eval_all(&i.args, env)?;
                self.invoke_value(&target, args)
            }
            ExprKind::New(n) => self.eval_new(n, env),
            ExprKind::NewArray(n) => {
                let items = self.eval_all(&n.items, env)?;
                Ok(Value::array(n.elem.clone(), items))
            }
            ExprKind::NewTuple(t) => Ok(Value::Tuple(self.eval_all(&t.items, env)?.into())),
            ExprKind::TupleItem(t) => match self.eval(&t.tuple, env)? {
                Value::Tuple(items) => items
                    .get(t.index)
                    .cloned()
                    .ok_or_else(|| internal(format!("tuple has no slot {}", t.index))),
                other => Err(internal(format!("expected a tuple, found {other:?}"))),
            },
            ExprKind::Member(_) | ExprKind::Index(_) => {
                let location = self.locate(expr, env)?;
                self.read(&location, env)
            }
            ExprKind::ArrayLength(a) => match self.eval(a, env)? {
                Value::Array(arr) => Ok(Value::Int(arr.len() as i64)),
                Value::Null => Err(throw(exceptions::NULL_REFERENCE, "array is null")),
                other => Err(internal(format!("expected an array, found {other:?}"))),
            },
            ExprKind::Dynamic(d) => self.eval_dynamic(d, env),
            ExprKind::Await(a) => {
                let value = self.eval(&a.operand, env)?;
                self.host.await_value(value).map_err(Flow::Throw)
            }
            _ => Err(internal(format!("{} must be reduced before compilation", expr.kind_name()))),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Env) -> Eval<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, env).map(|v| v.copied())).collect()
    }

    // ── Blocks and jumps ─────────────────────────────────────────────

    /// Run `block`, or resume it at `entry` when a jump arrives from an
    /// enclosing block.
    fn eval_block(&mut self, block: &Block, env: &Env, entry: Option<(LabelTarget, Value)>) -> Eval {
        let env = if block.variables.is_empty() {
            env.clone()
        } else {
            env.child(block.variables.iter().map(|v| (v, Value::default_of(v.ty()))))
        };
        let mut resume = entry;
        let mut next = 0;
        let mut last = Value::Unit;
        loop {
            let step = match resume.take() {
                Some((target, value)) => {
                    let Some(at) = label_position(&block.exprs, &target) else {
                        return Err(Flow::Jump { target, value });
                    };
                    next = at;
                    self.resume_at(&block.exprs[at], target, value, &env)
                }
                None if next < block.exprs.len() => self.eval(&block.exprs[next], &env),
                None => break,
            };
            match step {
                Ok(value) => {
                    last = value;
                    next += 1;
                }
                Err(Flow::Jump { target, value }) if declares_label(&block.exprs, &target) => {
                    resume = Some((target, value));
                }
                Err(flow) => return Err(flow),
            }
        }
        Ok(if block.ty.is_void() { Value::Unit } else { last })
    }

    /// Continue at the label statement `stmt`, or inside the nested block
    /// `stmt` that holds it.
    fn resume_at(&mut self, stmt: &Expr, target: LabelTarget, value: Value, env: &Env) -> Eval {
        match stmt.kind() {
            ExprKind::Label(_) => Ok(value),
            ExprKind::Block(b) => self.eval_block(b, env, Some((target, value))),
            _ => Err(internal(format!("label `{}` is not a statement", target.name()))),
        }
    }

    fn eval_loop(&mut self, l: &Loop, env: &Env) -> Eval {
        loop {
            match self.eval(&l.body, env) {
                Ok(_) => {}
                Err(Flow::Jump { target, value }) => {
                    if l.break_label.as_ref() == Some(&target) {
                        return Ok(value);
                    }
                    if l.continue_label.as_ref() != Some(&target) {
                        return Err(Flow::Jump { target, value });
                    }
                }
                Err(flow) => return Err(flow),
            }
        }
    }

    // ── Exceptions ───────────────────────────────────────────────────

    fn eval_try(&mut self, t: &Try, env: &Env) -> Eval {
        let mut outcome = self.eval(&t.body, env);
        if let Err(Flow::Throw(exception)) = &outcome {
            let exception = exception.clone();
            if let Some(handled) = self.catch(&t.handlers, &exception, env) {
                outcome = handled;
            }
        }
        if let (Some(fault), Err(Flow::Throw(_))) = (&t.fault, &outcome) {
            self.eval(fault, env)?;
        }
        if let Some(finally) = &t.finally {
            self.eval(finally, env)?;
        }
        outcome.map(|v| if t.ty.is_void() { Value::Unit } else { v })
    }

    /// Run the first handler whose type test and filter accept
    /// `exception`; `None` when no handler does. A filter that throws
    /// counts as rejecting.
    fn catch(&mut self, handlers: &[CatchBlock], exception: &Value, env: &Env) -> Option<Eval> {
        for handler in handlers {
            if !exception.is_instance_of(&handler.test) {
                continue;
            }
            let scope = match &handler.variable {
                Some(v) => env.child([(v, exception.clone())]),
                None => env.clone(),
            };
            if let Some(filter) = &handler.filter {
                match self.eval(filter, &scope) {
                    Ok(Value::Bool(true)) => {}
                    Ok(_) | Err(Flow::Throw(_)) => continue,
                    Err(flow) => return Some(Err(flow)),
                }
            }
            self.handling.push(exception.clone());
            let result = self.eval(&handler.body, &scope);
            self.handling.pop();
            return Some(result);
        }
        None
    }

    // ── Operators ────────────────────────────────────────────────────

    fn eval_unary(&mut self, u: &Unary, env: &Env) -> Eval {
        if u.op.is_assignment() {
            let location = self.locate(&u.operand, env)?;
            let old = self.read(&location, env)?;
            let delta = match u.op {
                UnaryOp::PreIncrementAssign | UnaryOp::PostIncrementAssign => 1,
                _ => -1,
            };
            let new = step(&old, delta)?;
            self.write(&location, new.clone(), env)?;
            return Ok(match u.op {
                UnaryOp::PreIncrementAssign | UnaryOp::PreDecrementAssign => new,
                _ => old,
            });
        }
        let operand = self.eval(&u.operand, env)?;
        if let Some(method) = &u.method {
            return self.call_method(method, None, vec![operand]);
        }
        match (u.op, &operand) {
            (UnaryOp::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
            (UnaryOp::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Not, Value::Int(i)) => Ok(Value::Int(!i)),
            (UnaryOp::Increment, v) => step(v, 1),
            (UnaryOp::Decrement, v) => step(v, -1),
            (UnaryOp::IsTrue, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (UnaryOp::IsFalse, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (op, v) => Err(internal(format!("{} is not defined on {v:?}", op.name()))),
        }
    }

    fn eval_binary(&mut self, b: &Binary, env: &Env) -> Eval {
        match b.op {
            BinaryOp::AndAlso | BinaryOp::OrElse if b.method.is_none() => {
                let left = truth(&self.eval(&b.left, env)?)?;
                if left == (b.op == BinaryOp::OrElse) {
                    return Ok(Value::Bool(left));
                }
                let right = self.eval(&b.right, env)?;
                return Ok(Value::Bool(truth(&right)?));
            }
            BinaryOp::Coalesce => {
                let left = self.eval(&b.left, env)?;
                if !left.is_null() {
                    return Ok(left);
                }
                return self.eval(&b.right, env);
            }
            _ => {}
        }
        let left = self.eval(&b.left, env)?;
        let right = self.eval(&b.right, env)?;
        match &b.method {
            Some(method) => self.call_method(method, None, vec![left, right]),
            None => arithmetic(b.op, &left, &right),
        }
    }

    // ── Locations ────────────────────────────────────────────────────

    fn locate(&mut self, target: &Expr, env: &Env) -> Eval<Location> {
        match target.kind() {
            ExprKind::Variable(v) => Ok(Location::Variable(v.clone())),
            ExprKind::Member(m) => {
                let receiver = match &m.object {
                    Some(o) => Some(self.eval(o, env)?),
                    None => None,
                };
                member_location(receiver, &m.member)
            }
            ExprKind::Index(i) => {
                let object = self.eval(&i.object, env)?;
                let args = self.eval_all(&i.args, env)?;
                match (&i.indexer, object) {
                    (_, Value::Null) => Err(throw(exceptions::NULL_REFERENCE, "indexed value is null")),
                    (None, Value::Array(arr)) => match args.first() {
                        Some(Value::Int(index)) => Ok(Location::Element(arr, *index)),
                        _ => Err(internal("an array element takes one Int index")),
                    },
                    (Some(indexer), object) => Ok(Location::Indexed(object, indexer.clone(), args)),
                    (None, other) => Err(internal(format!("cannot index {other:?}"))),
                }
            }
            _ => Err(internal(format!("cannot write to {}", target.kind_name()))),
        }
    }

    fn read(&mut self, location: &Location, env: &Env) -> Eval {
        match location {
            Location::Variable(v) => env
                .get(v)
                .ok_or_else(|| internal(format!("variable `{}` is unbound", v.name()))),
            Location::Field(obj, member) => Ok(match obj.get(member.name()) {
                Some(value) => value,
                None => {
                    let value = Value::default_of(member.ty());
                    obj.set(member.name(), value.clone());
                    value
                }
            }),
            Location::Static(member) => {
                let mut statics = self.shared.statics.borrow_mut();
                Ok(statics
                    .entry(member.to_string())
                    .or_insert_with(|| Value::default_of(member.ty()))
                    .clone())
            }
            Location::Property(receiver, member) => match member.getter() {
                Some(getter) => self.call_method(getter, receiver.clone(), vec![]),
                None => Err(internal(format!("{member} has no getter"))),
            },
            Location::Element(arr, index) => arr.get(*index).ok_or_else(|| {
                throw(
                    exceptions::INDEX_OUT_OF_RANGE,
                    format!("index {index} is outside an array of {}", arr.len()),
                )
            }),
            Location::Indexed(object, indexer, args) => match indexer.getter() {
                Some(getter) => self.call_method(getter, Some(object.clone()), args.clone()),
                None => Err(internal(format!("{indexer} has no getter"))),
            },
        }
    }

    fn write(&mut self, location: &Location, value: Value, env: &Env) -> Eval<()> {
        match location {
            Location::Variable(v) => {
                if env.set(v, value) {
                    Ok(())
                } else {
                    Err(internal(format!("variable `{}` is unbound", v.name())))
                }
            }
            Location::Field(obj, member) => {
                obj.set(member.name(), value);
                Ok(())
            }
            Location::Static(member) => {
                self.shared.statics.borrow_mut().insert(member.to_string(), value);
                Ok(())
            }
            Location::Property(receiver, member) => match member.setter() {
                Some(setter) => self.call_method(setter, receiver.clone(), vec![value]).map(drop),
                None => Err(internal(format!("{member} has no setter"))),
            },
            Location::Element(arr, index) => {
                if arr.set(*index, value) {
                    Ok(())
                } else {
                    Err(throw(
                        exceptions::INDEX_OUT_OF_RANGE,
                        format!("index {index} is outside an array of {}", arr.len()),
                    ))
                }
            }
            Location::Indexed(object, indexer, args) => match indexer.setter() {
                Some(setter) => {
                    let mut args = args.clone();
                    args.push(value);
                    self.call_method(setter, Some(object.clone()), args).map(drop)
                }
                None => Err(internal(format!("{indexer} has no setter"))),
            },
        }
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// By-reference arguments are read from their location before the
    /// call and written back after it returns.
    fn eval_call(&mut self, c: &Call, env: &Env) -> Eval {
        let receiver = match &c.object {
            Some(o) => Some(self.eval(o, env)?),
            None => None,
        };
        let mut args = Vec::with_capacity(c.args.len());
        let mut by_ref = Vec::new();
        for (param, arg) in c.method.params().iter().zip(&c.args) {
            if param.by_ref {
                let location = self.locate(arg, env)?;
                args.push(self.read(&location, env)?);
                by_ref.push((param.position, location));
            } else {
                args.push(self.eval(arg, env)?.copied());
            }
        }
        let result = self.call_with(&c.method, receiver.as_ref(), &mut args)?;
        for (position, location) in by_ref {
            let value = args.get(position).cloned().unwrap_or(Value::Null);
            self.write(&location, value, env)?;
        }
        Ok(result)
    }

    fn call_method(&mut self, method: &Method, receiver: Option<Value>, mut args: Vec<Value>) -> Eval {
        self.call_with(method, receiver.as_ref(), &mut args)
    }

    fn call_with(&mut self, method: &Method, receiver: Option<&Value>, args: &mut [Value]) -> Eval {
        if let Some(kind) = method.intrinsic_kind() {
            return intrinsics::call(kind, args).map_err(Flow::Throw);
        }
        if !method.is_static() && receiver.is_none_or(Value::is_null) {
            return Err(throw(exceptions::NULL_REFERENCE, format!("{method} called on null")));
        }
        log::trace!("host call {method}");
        self.host.call(method, receiver, args).map_err(Flow::Throw)
    }

    fn invoke_value(&mut self, target: &Value, args: Vec<Value>) -> Eval {
        match target {
            Value::Closure(closure) => match closure.lambda.as_lambda() {
                Some(lambda) => self.run_lambda(lambda, &closure.env, args),
                None => Err(internal("closure does not hold a lambda")),
            },
            Value::Null => Err(throw(exceptions::NULL_REFERENCE, "invoked a null function")),
            other => Err(internal(format!("cannot invoke {other:?}"))),
        }
    }

    fn run_lambda(&mut self, lambda: &Lambda, env: &Env, args: Vec<Value>) -> Eval {
        if args.len() != lambda.params.len() {
            return Err(Flow::Fatal(RuntimeError::Arity {
                expected: lambda.params.len(),
                found: args.len(),
            }));
        }
        let scope = env.child(lambda.params.iter().zip(args));
        let handling = std::mem::take(&mut self.handling);
        let result = self.eval(&lambda.body, &scope);
        self.handling = handling;
        match result {
            Ok(value) => Ok(if lambda.ret.is_void() { Value::Unit } else { value }),
            Err(Flow::Jump { target, .. }) => Err(internal(format!(
                "jump to `{}` escaped its lambda",
                target.name()
            ))),
            Err(flow) => Err(flow),
        }
    }

    fn eval_new(&mut self, n: &New, env: &Env) -> Eval {
        let mut args = self.eval_all(&n.args, env)?;
        if let Some(ctor) = &n.ctor {
            return self.call_with(ctor, None, &mut args);
        }
        match (&n.ty, args.as_slice()) {
            (Ty::Index, [Value::Int(value), Value::Bool(from_end)]) => Ok(Value::Index(IndexValue {
                value: *value,
                from_end: *from_end,
            })),
            (Ty::Range, [Value::Index(start), Value::Index(end)]) => Ok(Value::Range(*start, *end)),
            (ty @ (Ty::Class(_) | Ty::Struct(_)), []) => Ok(Value::Object(Rc::new(Object::new(ty.clone())))),
            (ty, args) => Err(internal(format!("cannot construct {ty} from {args:?}"))),
        }
    }

    // ── Late binding ─────────────────────────────────────────────────

    /// Bind the site against the runtime types of its arguments (once per
    /// distinct shape list) and invoke the bound lambda.
    fn eval_dynamic(&mut self, d: &DynamicCall, env: &Env) -> Eval {
        let args = self.eval_all(&d.args, env)?;
        let shapes: Vec<Ty> = args.iter().map(Value::runtime_ty).collect();
        let key = (&d.site as *const arbor_ir::CallSite as usize, shapes);
        let cached = self.shared.bound.borrow().get(&key).cloned();
        let operation = match cached {
            Some(op) => op,
            None => {
                let op = bind(d, &key.1).map_err(|e| Flow::Fatal(RuntimeError::Bind(e)))?;
                log::debug!("bound {} for {:?}", d.site.op.name(), key.1);
                self.shared.bound.borrow_mut().insert(key, op.clone());
                op
            }
        };
        self.invoke_value(&operation, args)
    }
}

fn bind(d: &DynamicCall, shapes: &[Ty]) -> arbor_common::IrResult<Value> {
    let lambda = d.site.bind(shapes)?;
    match lambda.as_lambda() {
        Some(l) if l.params.len() == shapes.len() => {}
        _ => {
            return Err(arbor_common::IrError::shape(
                "site",
                format!("binder returned no {}-parameter lambda for {}", shapes.len(), d.site.op.name()),
            ))
        }
    }
    crate::compile::check(&lambda)?;
    Ok(Value::Closure(Rc::new(Closure {
        lambda,
        env: Env::default(),
    })))
}

fn finish(result: Eval) -> Result<Value, RuntimeError> {
    match result {
        Ok(value) => Ok(value),
        Err(Flow::Throw(value)) => Err(RuntimeError::Thrown(value)),
        Err(Flow::Fatal(err)) => Err(err),
        Err(Flow::Jump { target, .. }) => Err(RuntimeError::Internal(format!(
            "jump to `{}` left the tree",
            target.name()
        ))),
    }
}

/// Index of the statement that is, or contains, the label for `target`.
fn label_position(exprs: &[Expr], target: &LabelTarget) -> Option<usize> {
    exprs
        .iter()
        .position(|e| declares_label(std::slice::from_ref(e), target))
}

fn member_location(receiver: Option<Value>, member: &Member) -> Eval<Location> {
    match (&member.info().kind, receiver) {
        (MemberKind::Property { .. }, receiver) => Ok(Location::Property(receiver, member.clone())),
        (MemberKind::Field { .. }, None) => Ok(Location::Static(member.clone())),
        (MemberKind::Field { .. }, Some(Value::Object(obj))) => Ok(Location::Field(obj, member.clone())),
        (MemberKind::Field { .. }, Some(Value::Null)) => Err(throw(
            exceptions::NULL_REFERENCE,
            format!("{member} read through null"),
        )),
        (MemberKind::Field { .. }, Some(other)) => {
            Err(internal(format!("{member} is not a field of {other:?}")))
        }
    }
}

// ── Value operations ─────────────────────────────────────────────────

fn step(value: &Value, delta: i64) -> Eval {
    match value {
        Value::Int(i) => Ok(Value::Int(i.wrapping_add(delta))),
        Value::Float(x) => Ok(Value::Float(x + delta as f64)),
        other => Err(internal(format!("cannot increment {other:?}"))),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Eval {
    match (op, left, right) {
        (BinaryOp::Equal, l, r) => Ok(Value::Bool(l.equals(r))),
        (BinaryOp::NotEqual, l, r) => Ok(Value::Bool(!l.equals(r))),
        (BinaryOp::Add, Value::Str(_) | Value::Null, Value::Str(_) | Value::Null) => {
            Ok(Value::str(&format!("{left}{right}")))
        }
        (op, Value::Int(a), Value::Int(b)) => int_op(op, *a, *b),
        (op, Value::Float(a), Value::Float(b)) => float_op(op, *a, *b),
        (BinaryOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a & b)),
        (BinaryOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a | b)),
        (BinaryOp::Xor, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a ^ b)),
        (op, l, r) => Err(internal(format!("{op} is not defined on {l:?} and {r:?}"))),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Eval {
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => {
            return Err(throw(exceptions::DIVIDE_BY_ZERO, format!("{a} {op} 0")));
        }
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem => a.wrapping_rem(b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl((b & 63) as u32),
        BinaryOp::Shr => a.wrapping_shr((b & 63) as u32),
        BinaryOp::Less => return Ok(Value::Bool(a < b)),
        BinaryOp::LessEqual => return Ok(Value::Bool(a <= b)),
        BinaryOp::Greater => return Ok(Value::Bool(a > b)),
        BinaryOp::GreaterEqual => return Ok(Value::Bool(a >= b)),
        op => return Err(internal(format!("{op} is not defined on Int"))),
    };
    Ok(Value::Int(value))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Eval {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Less => return Ok(Value::Bool(a < b)),
        BinaryOp::LessEqual => return Ok(Value::Bool(a <= b)),
        BinaryOp::Greater => return Ok(Value::Bool(a > b)),
        BinaryOp::GreaterEqual => return Ok(Value::Bool(a >= b)),
        op => return Err(internal(format!("{op} is not defined on Float"))),
    };
    Ok(Value::Float(value))
}

/// The explicit conversions a core convert node performs: numeric
/// conversions, nullable wrapping and unwrapping, boxing, `Int` to
/// `Index`, element-wise tuple conversion and checked reference casts.
fn convert(value: Value, to: &Ty) -> Eval {
    match (to, value) {
        (to, Value::Null) if to.is_nullable() => Ok(Value::Null),
        (to, Value::Null) => Err(throw(
            exceptions::INVALID_OPERATION,
            format!("null cannot be converted to {to}"),
        )),
        (Ty::Nullable(inner), value) => convert(value, inner),
        (Ty::Object | Ty::Interface(_), value) => Ok(value),
        (Ty::Int, Value::Float(x)) => Ok(Value::Int(x as i64)),
        (Ty::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Ty::Index, Value::Int(i)) => Ok(Value::Index(IndexValue::start(i))),
        (Ty::Tuple(slots), Value::Tuple(items)) if slots.len() == items.len() => {
            let converted = slots
                .iter()
                .zip(items.iter())
                .map(|(ty, item)| convert(item.clone(), ty))
                .collect::<Eval<Vec<_>>>()?;
            Ok(Value::Tuple(converted.into()))
        }
        (to, value) if value.is_instance_of(to) => Ok(value),
        (to, value) => Err(throw(
            exceptions::INVALID_CAST,
            format!("cannot convert {} to {to}", value.runtime_ty()),
        )),
    }
}
