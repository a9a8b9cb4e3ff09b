//! Validating factories for the core vocabulary.
//!
//! Factories check every invariant that can be decided from the node and
//! its direct children, and fail with `ArgumentNull` / `ArgumentShape`.
//! Nothing is deferred to reduction.

use rustc_hash::FxHashSet;

use arbor_common::{IrError, IrResult, Indexer, Literal, Member, Method, Param, Ty};

use crate::binder::CallSite;
use crate::expr::{
    Assign, Await, Binary, Block, Call, CatchBlock, Conditional, Constant, Convert, DynamicCall,
    Expr, ExprKind, Goto, IndexAccess, Invoke, LabelStmt, Lambda, Loop, MemberAccess, New,
    NewArray, NewTuple, Throw, Try, TupleItem, Unary,
};
use crate::node::{LabelTarget, Variable};
use crate::ops::{BinaryOp, GotoKind, UnaryOp};

// ── Shared checks ────────────────────────────────────────────────────

/// Whether `expr` denotes a storage location that can be written.
pub fn is_writable(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Variable(_) => true,
        ExprKind::Member(m) => m.member.is_writable(),
        ExprKind::Index(i) => match &i.indexer {
            None => true,
            Some(indexer) => indexer.setter().is_some(),
        },
        ExprKind::IndexBinding(i) => i.indexer.setter().is_some(),
        ExprKind::ArrayAccess(a) => a.is_element(),
        ExprKind::DynamicOp(d) => d.is_member_or_index_get(),
        _ => false,
    }
}

/// Check that `arg` can be passed by reference: a writable location whose
/// address does not depend on a computed offset.
pub(crate) fn check_by_ref(arg: &Expr, name: &str) -> IrResult<()> {
    if let ExprKind::ArrayAccess(a) = arg.kind() {
        if a.index.ty() != Ty::Int {
            return Err(IrError::shape(
                name,
                "an array element addressed by an Index or Range cannot be passed by reference",
            ));
        }
    }
    if !is_writable(arg) || matches!(arg.kind(), ExprKind::DynamicOp(_)) {
        return Err(IrError::shape(name, "a by-reference argument must be a writable location"));
    }
    Ok(())
}

/// Arity and per-argument type check against a parameter list.
pub(crate) fn check_args(params: &[Param], args: &[Expr], what: &str) -> IrResult<()> {
    if params.len() != args.len() {
        return Err(IrError::shape(
            "args",
            format!("{what} expects {} arguments, got {}", params.len(), args.len()),
        ));
    }
    for (param, arg) in params.iter().zip(args) {
        if !param.ty.accepts(&arg.ty()) {
            return Err(IrError::shape(
                &param.name,
                format!("expected {}, found {}", param.ty, arg.ty()),
            ));
        }
        if param.by_ref {
            check_by_ref(arg, &param.name)?;
        }
    }
    Ok(())
}

/// Check the receiver of an instance operation declared on `declaring`.
pub(crate) fn check_receiver(
    object: Option<&Expr>,
    is_static: bool,
    declaring: &Ty,
    what: &str,
) -> IrResult<()> {
    match (object, is_static) {
        (Some(_), true) => Err(IrError::shape(
            "object",
            format!("static {what} takes no receiver"),
        )),
        (None, false) => Err(IrError::argument_null("object")),
        (None, true) => Ok(()),
        (Some(obj), false) => {
            let ty = obj.ty();
            if declaring.accepts(ty.non_nullable()) {
                Ok(())
            } else {
                Err(IrError::shape(
                    "object",
                    format!("{what} is declared on {declaring}, receiver is {ty}"),
                ))
            }
        }
    }
}

pub(crate) fn check_distinct_variables(vars: &[Variable], what: &str) -> IrResult<()> {
    let mut seen = FxHashSet::default();
    for v in vars {
        if v.ty().is_void() {
            return Err(IrError::shape(v.name(), format!("{what} `{}` cannot be Void", v.name())));
        }
        if !seen.insert(v.clone()) {
            return Err(IrError::shape(v.name(), format!("duplicate {what} `{}`", v.name())));
        }
    }
    Ok(())
}

pub(crate) fn check_bool(expr: &Expr, name: &str) -> IrResult<()> {
    if expr.ty() != Ty::Bool {
        return Err(IrError::shape(name, format!("expected Bool, found {}", expr.ty())));
    }
    Ok(())
}

pub(crate) fn check_void_label(label: Option<&LabelTarget>, name: &str) -> IrResult<()> {
    match label {
        Some(l) if !l.ty().is_void() => Err(IrError::shape(name, "this label must be Void")),
        _ => Ok(()),
    }
}

pub(crate) fn check_distinct_labels(a: Option<&LabelTarget>, b: Option<&LabelTarget>) -> IrResult<()> {
    if let (Some(a), Some(b)) = (a, b) {
        if a == b {
            return Err(IrError::shape("continue_label", "break and continue labels must differ"));
        }
    }
    Ok(())
}

/// Whether a value of `ty` may be placed where `expected` is required;
/// a Void slot discards any value.
pub(crate) fn fits_slot(expected: &Ty, ty: &Ty) -> bool {
    expected.is_void() || expected.accepts(ty)
}

fn check_operator_method(method: &Method, arity: usize, operands: &[&Expr]) -> IrResult<()> {
    if !method.is_static() {
        return Err(IrError::shape("method", "an operator method must be static"));
    }
    if method.params().len() != arity {
        return Err(IrError::shape(
            "method",
            format!("an operator method must take {arity} parameters"),
        ));
    }
    for (param, operand) in method.params().iter().zip(operands) {
        if !param.ty.accepts(&operand.ty()) {
            return Err(IrError::shape(
                &param.name,
                format!("operator parameter is {}, operand is {}", param.ty, operand.ty()),
            ));
        }
    }
    if method.ret().is_void() {
        return Err(IrError::shape("method", "an operator method must return a value"));
    }
    Ok(())
}

/// Result type of a builtin unary operator, `None` when undefined.
pub fn unary_result(op: UnaryOp, operand: &Ty) -> Option<Ty> {
    match op {
        UnaryOp::Negate | UnaryOp::Increment | UnaryOp::Decrement => {
            operand.is_numeric().then(|| operand.clone())
        }
        UnaryOp::Not => matches!(operand, Ty::Bool | Ty::Int).then(|| operand.clone()),
        UnaryOp::IsTrue | UnaryOp::IsFalse => (operand == &Ty::Bool).then_some(Ty::Bool),
        UnaryOp::PreIncrementAssign
        | UnaryOp::PreDecrementAssign
        | UnaryOp::PostIncrementAssign
        | UnaryOp::PostDecrementAssign => operand.is_numeric().then(|| operand.clone()),
    }
}

/// Result type of a builtin binary operator, `None` when undefined.
pub fn binary_result(op: BinaryOp, left: &Ty, right: &Ty) -> Option<Ty> {
    match op {
        BinaryOp::Add if left == &Ty::String && right == &Ty::String => Some(Ty::String),
        op if op.is_arithmetic() => (left == right && left.is_numeric()).then(|| left.clone()),
        op if op.is_bitwise() => {
            (left == right && matches!(left, Ty::Int | Ty::Bool)).then(|| left.clone())
        }
        op if op.is_shift() => (left == &Ty::Int && right == &Ty::Int).then_some(Ty::Int),
        op if op.is_equality() => {
            let comparable = left == right
                || left.non_nullable() == right.non_nullable()
                || (left.is_reference_type() && right.is_reference_type());
            comparable.then_some(Ty::Bool)
        }
        op if op.is_comparison() => {
            (left == right && left.is_numeric()).then_some(Ty::Bool)
        }
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            (left == &Ty::Bool && right == &Ty::Bool).then_some(Ty::Bool)
        }
        BinaryOp::Coalesce => {
            if !left.is_nullable() {
                None
            } else if left.is_nullable_value_type() && right == left.non_nullable() {
                Some(right.clone())
            } else if left.accepts(right) {
                Some(left.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

// ── Leaves ───────────────────────────────────────────────────────────

impl Expr {
    pub fn constant(value: Literal, ty: Ty) -> IrResult<Expr> {
        if !value.fits(&ty) {
            return Err(IrError::shape("value", format!("{value} is not a value of {ty}")));
        }
        Ok(Expr::from_kind(ExprKind::Constant(Constant { value, ty })))
    }

    pub fn int(value: i64) -> Expr {
        Expr::from_kind(ExprKind::Constant(Constant {
            value: Literal::Int(value),
            ty: Ty::Int,
        }))
    }

    pub fn float(value: f64) -> Expr {
        Expr::from_kind(ExprKind::Constant(Constant {
            value: Literal::Float(value),
            ty: Ty::Float,
        }))
    }

    pub fn bool(value: bool) -> Expr {
        Expr::from_kind(ExprKind::Constant(Constant {
            value: Literal::Bool(value),
            ty: Ty::Bool,
        }))
    }

    pub fn str(value: impl Into<String>) -> Expr {
        Expr::from_kind(ExprKind::Constant(Constant {
            value: Literal::Str(value.into()),
            ty: Ty::String,
        }))
    }

    pub fn null(ty: Ty) -> IrResult<Expr> {
        Expr::constant(Literal::Null, ty)
    }

    pub fn default_of(ty: Ty) -> Expr {
        Expr::from_kind(ExprKind::Default(ty))
    }

    /// The empty statement.
    pub fn empty() -> Expr {
        Expr::default_of(Ty::Void)
    }

    pub fn var(variable: &Variable) -> Expr {
        Expr::from_kind(ExprKind::Variable(variable.clone()))
    }

    pub fn lambda(params: Vec<Variable>, body: Expr, ret: Ty) -> IrResult<Expr> {
        Expr::build_lambda(None, params, body, ret)
    }

    pub fn named_lambda(name: &str, params: Vec<Variable>, body: Expr, ret: Ty) -> IrResult<Expr> {
        if name.is_empty() {
            return Err(IrError::argument_null("name"));
        }
        Expr::build_lambda(Some(name.to_string()), params, body, ret)
    }

    fn build_lambda(name: Option<String>, params: Vec<Variable>, body: Expr, ret: Ty) -> IrResult<Expr> {
        check_distinct_variables(&params, "parameter")?;
        if !fits_slot(&ret, &body.ty()) {
            return Err(IrError::shape(
                "body",
                format!("lambda returns {ret}, body is {}", body.ty()),
            ));
        }
        Ok(Expr::from_kind(ExprKind::Lambda(Lambda {
            params,
            body,
            ret,
            name,
        })))
    }
}

// ── Operators ────────────────────────────────────────────────────────

impl Expr {
    pub fn assign(target: Expr, value: Expr) -> IrResult<Expr> {
        let core_target = matches!(
            target.kind(),
            ExprKind::Variable(_) | ExprKind::Member(_) | ExprKind::Index(_)
        );
        if !core_target || !is_writable(&target) {
            return Err(IrError::shape("target", format!("cannot assign to {}", target.kind_name())));
        }
        let target_ty = target.ty();
        if !target_ty.accepts(&value.ty()) {
            return Err(IrError::shape(
                "value",
                format!("cannot assign {} to {target_ty}", value.ty()),
            ));
        }
        Ok(Expr::from_kind(ExprKind::Assign(Assign { target, value })))
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> IrResult<Expr> {
        let operand_ty = operand.ty();
        let Some(ty) = unary_result(op, &operand_ty) else {
            return Err(IrError::shape(
                "operand",
                format!("operator {} is not defined on {operand_ty}", op.name()),
            ));
        };
        if op.is_assignment() && operand.as_variable().is_none() {
            return Err(IrError::shape("operand", "increment-assign needs a variable operand"));
        }
        Ok(Expr::from_kind(ExprKind::Unary(Unary {
            op,
            operand,
            method: None,
            ty,
        })))
    }

    pub fn unary_method(op: UnaryOp, operand: Expr, method: Method) -> IrResult<Expr> {
        if op.is_assignment() {
            return Err(IrError::shape("op", "increment-assign with an operator method is an extended node"));
        }
        check_operator_method(&method, 1, &[&operand])?;
        let ty = method.ret().clone();
        Ok(Expr::from_kind(ExprKind::Unary(Unary {
            op,
            operand,
            method: Some(method),
            ty,
        })))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> IrResult<Expr> {
        let (lt, rt) = (left.ty(), right.ty());
        let Some(ty) = binary_result(op, &lt, &rt) else {
            return Err(IrError::shape(
                "right",
                format!("operator {op} is not defined on {lt} and {rt}"),
            ));
        };
        Ok(Expr::from_kind(ExprKind::Binary(Binary {
            op,
            left,
            right,
            method: None,
            ty,
        })))
    }

    pub fn binary_method(op: BinaryOp, left: Expr, right: Expr, method: Method) -> IrResult<Expr> {
        check_operator_method(&method, 2, &[&left, &right])?;
        if op.is_short_circuit() && method.ret() != &Ty::Bool {
            return Err(IrError::shape("method", "a short-circuit operator method must return Bool"));
        }
        let ty = method.ret().clone();
        Ok(Expr::from_kind(ExprKind::Binary(Binary {
            op,
            left,
            right,
            method: Some(method),
            ty,
        })))
    }

    pub fn convert(operand: Expr, ty: Ty) -> IrResult<Expr> {
        let from = operand.ty();
        if ty.is_void() || from.is_void() || !ty.is_convertible_from(&from) {
            return Err(IrError::shape("ty", format!("no conversion from {from} to {ty}")));
        }
        Ok(Expr::from_kind(ExprKind::Convert(Convert { operand, ty })))
    }

    /// `operand` as `ty`, or `operand` itself when it already has that type.
    pub fn convert_if_needed(operand: Expr, ty: &Ty) -> IrResult<Expr> {
        if &operand.ty() == ty {
            Ok(operand)
        } else {
            Expr::convert(operand, ty.clone())
        }
    }
}

// ── Control flow ─────────────────────────────────────────────────────

impl Expr {
    pub fn condition(test: Expr, if_true: Expr, if_false: Expr, ty: Ty) -> IrResult<Expr> {
        check_bool(&test, "test")?;
        for (name, branch) in [("if_true", &if_true), ("if_false", &if_false)] {
            if !fits_slot(&ty, &branch.ty()) {
                return Err(IrError::shape(
                    name,
                    format!("branch is {}, conditional is {ty}", branch.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::Conditional(Conditional {
            test,
            if_true,
            if_false,
            ty,
        })))
    }

    pub fn if_then(test: Expr, body: Expr) -> IrResult<Expr> {
        Expr::condition(test, body, Expr::empty(), Ty::Void)
    }

    pub fn if_then_else(test: Expr, if_true: Expr, if_false: Expr) -> IrResult<Expr> {
        Expr::condition(test, if_true, if_false, Ty::Void)
    }

    /// A block whose type is that of its last expression (Void if empty).
    pub fn block(variables: Vec<Variable>, exprs: Vec<Expr>) -> IrResult<Expr> {
        let ty = exprs.last().map(Expr::ty).unwrap_or(Ty::Void);
        Expr::block_typed(variables, exprs, ty)
    }

    /// A Void block.
    pub fn seq(exprs: Vec<Expr>) -> IrResult<Expr> {
        Expr::block_typed(vec![], exprs, Ty::Void)
    }

    pub fn block_typed(variables: Vec<Variable>, exprs: Vec<Expr>, ty: Ty) -> IrResult<Expr> {
        check_distinct_variables(&variables, "local")?;
        if !ty.is_void() {
            let Some(last) = exprs.last() else {
                return Err(IrError::shape("exprs", format!("an empty block cannot produce {ty}")));
            };
            if !ty.accepts(&last.ty()) {
                return Err(IrError::shape(
                    "exprs",
                    format!("block yields {}, expected {ty}", last.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::Block(Block {
            variables,
            exprs,
            ty,
        })))
    }

    pub fn loop_expr(
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> IrResult<Expr> {
        check_void_label(continue_label.as_ref(), "continue_label")?;
        check_distinct_labels(break_label.as_ref(), continue_label.as_ref())?;
        Ok(Expr::from_kind(ExprKind::Loop(Loop {
            body,
            break_label,
            continue_label,
        })))
    }

    pub fn jump(kind: GotoKind, target: LabelTarget, value: Option<Expr>) -> IrResult<Expr> {
        match (&value, target.ty().is_void()) {
            (Some(_), true) => {
                return Err(IrError::shape("value", "a jump to a Void label carries no value"));
            }
            (None, false) => return Err(IrError::argument_null("value")),
            (Some(v), false) if !target.ty().accepts(&v.ty()) => {
                return Err(IrError::shape(
                    "value",
                    format!("label expects {}, jump carries {}", target.ty(), v.ty()),
                ));
            }
            _ => {}
        }
        Ok(Expr::from_kind(ExprKind::Goto(Goto {
            kind,
            target,
            value,
        })))
    }

    pub fn goto(target: &LabelTarget) -> IrResult<Expr> {
        Expr::jump(GotoKind::Goto, target.clone(), None)
    }

    pub fn break_to(target: &LabelTarget) -> IrResult<Expr> {
        Expr::jump(GotoKind::Break, target.clone(), None)
    }

    pub fn continue_to(target: &LabelTarget) -> IrResult<Expr> {
        Expr::jump(GotoKind::Continue, target.clone(), None)
    }

    pub fn return_to(target: &LabelTarget, value: Option<Expr>) -> IrResult<Expr> {
        Expr::jump(GotoKind::Return, target.clone(), value)
    }

    pub fn label(target: &LabelTarget, default: Option<Expr>) -> IrResult<Expr> {
        if let Some(d) = &default {
            if target.ty().is_void() {
                return Err(IrError::shape("default", "a Void label has no default value"));
            }
            if !target.ty().accepts(&d.ty()) {
                return Err(IrError::shape(
                    "default",
                    format!("label is {}, default is {}", target.ty(), d.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::Label(LabelStmt {
            target: target.clone(),
            default,
        })))
    }

    pub fn try_expr(
        body: Expr,
        handlers: Vec<CatchBlock>,
        finally: Option<Expr>,
        fault: Option<Expr>,
    ) -> IrResult<Expr> {
        if handlers.is_empty() && finally.is_none() && fault.is_none() {
            return Err(IrError::shape("handlers", "a try needs a handler, a finally or a fault"));
        }
        if fault.is_some() && (finally.is_some() || !handlers.is_empty()) {
            return Err(IrError::shape("fault", "a fault block cannot be combined with other handlers"));
        }
        let ty = body.ty();
        for handler in &handlers {
            if !fits_slot(&ty, &handler.body.ty()) {
                return Err(IrError::shape(
                    "handlers",
                    format!("handler yields {}, try yields {ty}", handler.body.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::Try(Try {
            body,
            handlers,
            finally,
            fault,
            ty,
        })))
    }

    pub fn try_finally(body: Expr, finally: Expr) -> IrResult<Expr> {
        Expr::try_expr(body, vec![], Some(finally), None)
    }

    pub fn try_catch(body: Expr, handlers: Vec<CatchBlock>) -> IrResult<Expr> {
        Expr::try_expr(body, handlers, None, None)
    }

    pub fn try_fault(body: Expr, fault: Expr) -> IrResult<Expr> {
        Expr::try_expr(body, vec![], None, Some(fault))
    }

    pub fn throw(value: Option<Expr>, ty: Ty) -> IrResult<Expr> {
        if let Some(v) = &value {
            if v.ty().is_void() {
                return Err(IrError::shape("value", "cannot throw a Void value"));
            }
        }
        Ok(Expr::from_kind(ExprKind::Throw(Throw { value, ty })))
    }

    pub fn rethrow() -> Expr {
        Expr::from_kind(ExprKind::Throw(Throw {
            value: None,
            ty: Ty::Void,
        }))
    }
}

impl CatchBlock {
    pub fn new(test: Ty, variable: Option<Variable>, filter: Option<Expr>, body: Expr) -> IrResult<CatchBlock> {
        if let Some(v) = &variable {
            if !v.ty().accepts(&test) {
                return Err(IrError::shape(
                    "variable",
                    format!("catch variable is {}, caught type is {test}", v.ty()),
                ));
            }
        }
        if let Some(f) = &filter {
            check_bool(f, "filter")?;
        }
        Ok(CatchBlock {
            test,
            variable,
            filter,
            body,
        })
    }

    pub fn catch_all(body: Expr) -> CatchBlock {
        CatchBlock {
            test: Ty::Object,
            variable: None,
            filter: None,
            body,
        }
    }
}

// ── Calls and construction ───────────────────────────────────────────

impl Expr {
    pub fn call(object: Option<Expr>, method: &Method, args: Vec<Expr>) -> IrResult<Expr> {
        if method.is_constructor() {
            return Err(IrError::shape("method", "constructors are invoked with `new`"));
        }
        check_receiver(object.as_ref(), method.is_static(), method.declaring(), "method")?;
        check_args(method.params(), &args, method.name())?;
        Ok(Expr::from_kind(ExprKind::Call(Call {
            object,
            method: method.clone(),
            args,
        })))
    }

    pub fn call_static(method: &Method, args: Vec<Expr>) -> IrResult<Expr> {
        Expr::call(None, method, args)
    }

    pub fn invoke(target: Expr, args: Vec<Expr>) -> IrResult<Expr> {
        let Ty::Fn(params, ret) = target.ty() else {
            return Err(IrError::shape("target", format!("cannot invoke a {}", target.ty())));
        };
        if params.len() != args.len() {
            return Err(IrError::shape(
                "args",
                format!("expected {} arguments, got {}", params.len(), args.len()),
            ));
        }
        for (i, (param, arg)) in params.iter().zip(&args).enumerate() {
            if !param.accepts(&arg.ty()) {
                return Err(IrError::shape(
                    "args",
                    format!("argument {i} is {}, expected {param}", arg.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::Invoke(Invoke {
            target,
            args,
            ty: *ret,
        })))
    }

    pub fn new_object(ctor: &Method, args: Vec<Expr>) -> IrResult<Expr> {
        if !ctor.is_constructor() {
            return Err(IrError::shape("ctor", format!("{ctor} is not a constructor")));
        }
        check_args(ctor.params(), &args, "constructor")?;
        Ok(Expr::from_kind(ExprKind::New(New {
            ctor: Some(ctor.clone()),
            ty: ctor.declaring().clone(),
            args,
        })))
    }

    /// A fresh instance of a class or struct with every field at its default.
    pub fn new_instance(ty: Ty) -> IrResult<Expr> {
        if !matches!(ty, Ty::Class(_) | Ty::Struct(_)) {
            return Err(IrError::shape("ty", format!("cannot instantiate {ty}")));
        }
        Ok(Expr::from_kind(ExprKind::New(New {
            ctor: None,
            ty,
            args: vec![],
        })))
    }

    /// `Index(value, from_end)`.
    pub fn new_index(value: Expr, from_end: Expr) -> IrResult<Expr> {
        if value.ty() != Ty::Int {
            return Err(IrError::shape("value", format!("an index is an Int, found {}", value.ty())));
        }
        check_bool(&from_end, "from_end")?;
        Ok(Expr::from_kind(ExprKind::New(New {
            ctor: None,
            ty: Ty::Index,
            args: vec![value, from_end],
        })))
    }

    /// `Range(start, end)`.
    pub fn new_range(start: Expr, end: Expr) -> IrResult<Expr> {
        for (name, bound) in [("start", &start), ("end", &end)] {
            if bound.ty() != Ty::Index {
                return Err(IrError::shape(name, format!("a range bound is an Index, found {}", bound.ty())));
            }
        }
        Ok(Expr::from_kind(ExprKind::New(New {
            ctor: None,
            ty: Ty::Range,
            args: vec![start, end],
        })))
    }

    pub fn new_array(elem: Ty, items: Vec<Expr>) -> IrResult<Expr> {
        if elem.is_void() {
            return Err(IrError::shape("elem", "array elements cannot be Void"));
        }
        for item in &items {
            if !elem.accepts(&item.ty()) {
                return Err(IrError::shape(
                    "items",
                    format!("array of {elem} cannot hold {}", item.ty()),
                ));
            }
        }
        Ok(Expr::from_kind(ExprKind::NewArray(NewArray { elem, items })))
    }

    /// One tuple level; an eighth item must itself be a tuple (the rest).
    pub fn new_tuple(items: Vec<Expr>) -> IrResult<Expr> {
        if items.is_empty() || items.len() > arbor_common::ty::TUPLE_REST_ARITY + 1 {
            return Err(IrError::shape("items", format!("a tuple level holds 1 to 8 items, got {}", items.len())));
        }
        if items.len() == arbor_common::ty::TUPLE_REST_ARITY + 1 {
            if let Some(rest) = items.last() {
                if !matches!(rest.ty(), Ty::Tuple(_)) {
                    return Err(IrError::shape("items", "the eighth tuple item must be the rest tuple"));
                }
            }
        }
        let mut slots = Vec::with_capacity(items.len());
        for item in &items {
            let ty = item.ty();
            if ty.is_void() {
                return Err(IrError::shape("items", "tuple items cannot be Void"));
            }
            slots.push(ty);
        }
        Ok(Expr::from_kind(ExprKind::NewTuple(NewTuple {
            items,
            ty: Ty::Tuple(slots),
        })))
    }

    pub fn tuple_item(tuple: Expr, index: usize) -> IrResult<Expr> {
        let Ty::Tuple(slots) = tuple.ty() else {
            return Err(IrError::shape("tuple", format!("expected a tuple, found {}", tuple.ty())));
        };
        let Some(ty) = slots.get(index).cloned() else {
            return Err(IrError::shape("index", format!("tuple has {} slots, index {index}", slots.len())));
        };
        Ok(Expr::from_kind(ExprKind::TupleItem(TupleItem { tuple, index, ty })))
    }
}

// ── Access ───────────────────────────────────────────────────────────

impl Expr {
    pub fn member(object: Option<Expr>, member: &Member) -> IrResult<Expr> {
        check_receiver(object.as_ref(), member.is_static(), member.declaring(), "member")?;
        Ok(Expr::from_kind(ExprKind::Member(MemberAccess {
            object,
            member: member.clone(),
        })))
    }

    pub fn index(object: Expr, indexer: Option<&Indexer>, args: Vec<Expr>) -> IrResult<Expr> {
        let ty = match indexer {
            None => {
                let Some(elem) = object.ty().element_type().cloned() else {
                    return Err(IrError::shape("object", format!("cannot index a {}", object.ty())));
                };
                if args.len() != 1 || args[0].ty() != Ty::Int {
                    return Err(IrError::shape("args", "an array element takes one Int index"));
                }
                elem
            }
            Some(indexer) => {
                check_receiver(Some(&object), false, indexer.declaring(), "indexer")?;
                check_args(indexer.params(), &args, "indexer")?;
                indexer.ty().clone()
            }
        };
        Ok(Expr::from_kind(ExprKind::Index(IndexAccess {
            object,
            indexer: indexer.cloned(),
            args,
            ty,
        })))
    }

    pub fn array_index(array: Expr, index: Expr) -> IrResult<Expr> {
        Expr::index(array, None, vec![index])
    }

    pub fn array_length(array: Expr) -> IrResult<Expr> {
        if array.ty().element_type().is_none() {
            return Err(IrError::shape("array", format!("expected an array, found {}", array.ty())));
        }
        Ok(Expr::from_kind(ExprKind::ArrayLength(array)))
    }

    pub fn dynamic_call(site: CallSite, args: Vec<Expr>, ty: Ty) -> IrResult<Expr> {
        let (min, max) = site.op.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(IrError::shape(
                "args",
                format!("{} does not take {} arguments", site.op.name(), args.len()),
            ));
        }
        if site.args.len() != args.len() {
            return Err(IrError::shape("site", "one argument descriptor per argument is required"));
        }
        if args.iter().any(|a| a.ty().is_void()) {
            return Err(IrError::shape("args", "dynamic arguments cannot be Void"));
        }
        Ok(Expr::from_kind(ExprKind::Dynamic(DynamicCall { site, args, ty })))
    }

    pub fn await_expr(operand: Expr, ty: Ty) -> IrResult<Expr> {
        if operand.ty().is_void() {
            return Err(IrError::shape("operand", "cannot await a Void expression"));
        }
        Ok(Expr::from_kind(ExprKind::Await(Await { operand, ty })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::ErrorKind;

    #[test]
    fn constant_must_fit() {
        assert!(Expr::constant(Literal::Int(1), Ty::Int).is_ok());
        assert!(Expr::constant(Literal::Int(1), Ty::nullable(Ty::Int)).is_ok());
        let err = Expr::constant(Literal::Null, Ty::Int).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }

    #[test]
    fn binary_typing() {
        let add = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2)).unwrap();
        assert_eq!(add.ty(), Ty::Int);
        let cat = Expr::binary(BinaryOp::Add, Expr::str("a"), Expr::str("b")).unwrap();
        assert_eq!(cat.ty(), Ty::String);
        let lifted = Expr::binary(
            BinaryOp::Equal,
            Expr::null(Ty::nullable(Ty::Int)).unwrap(),
            Expr::int(1),
        )
        .unwrap();
        assert_eq!(lifted.ty(), Ty::Bool);
        assert!(Expr::binary(BinaryOp::Add, Expr::int(1), Expr::str("b")).is_err());
        assert!(Expr::binary(BinaryOp::AndAlso, Expr::int(1), Expr::bool(true)).is_err());
    }

    #[test]
    fn coalesce_unwraps_nullable_value() {
        let n = Expr::null(Ty::nullable(Ty::Int)).unwrap();
        let e = Expr::binary(BinaryOp::Coalesce, n, Expr::int(3)).unwrap();
        assert_eq!(e.ty(), Ty::Int);
    }

    #[test]
    fn assign_requires_writable_target() {
        let x = Variable::new("x", Ty::Int);
        assert!(Expr::assign(Expr::var(&x), Expr::int(1)).is_ok());
        let err = Expr::assign(Expr::int(2), Expr::int(1)).unwrap_err();
        assert_eq!(err.argument.as_deref(), Some("target"));
        let ro = Member::readonly_field("X", Ty::class("P"), Ty::Int).unwrap();
        let p = Variable::new("p", Ty::class("P"));
        let target = Expr::member(Some(Expr::var(&p)), &ro).unwrap();
        assert!(Expr::assign(target, Expr::int(1)).is_err());
    }

    #[test]
    fn increment_assign_needs_variable() {
        let x = Variable::new("x", Ty::Int);
        assert!(Expr::unary(UnaryOp::PostIncrementAssign, Expr::var(&x)).is_ok());
        assert!(Expr::unary(UnaryOp::PostIncrementAssign, Expr::int(1)).is_err());
    }

    #[test]
    fn block_typing_and_duplicates() {
        let x = Variable::new("x", Ty::Int);
        let b = Expr::block(vec![x.clone()], vec![Expr::var(&x)]).unwrap();
        assert_eq!(b.ty(), Ty::Int);
        let err = Expr::block(vec![x.clone(), x.clone()], vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
        assert!(Expr::block_typed(vec![], vec![], Ty::Int).is_err());
    }

    #[test]
    fn jumps_match_label_type() {
        let brk = LabelTarget::new("brk");
        assert!(Expr::break_to(&brk).is_ok());
        assert!(Expr::jump(GotoKind::Break, brk.clone(), Some(Expr::int(1))).is_err());
        let ret = LabelTarget::typed("ret", Ty::Int);
        let err = Expr::return_to(&ret, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentNull);
        assert!(Expr::return_to(&ret, Some(Expr::int(1))).is_ok());
    }

    #[test]
    fn loop_labels_must_differ() {
        let l = LabelTarget::new("l");
        assert!(Expr::loop_expr(Expr::empty(), Some(l.clone()), Some(l)).is_err());
    }

    #[test]
    fn call_checks_receiver_and_args() {
        let m = Method::new_instance("Scale", Ty::class("P"), vec![Param::new("k", Ty::Int)], Ty::Int).unwrap();
        let p = Variable::new("p", Ty::class("P"));
        assert!(Expr::call(Some(Expr::var(&p)), &m, vec![Expr::int(2)]).is_ok());
        let err = Expr::call(None, &m, vec![Expr::int(2)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentNull);
        assert!(Expr::call(Some(Expr::var(&p)), &m, vec![]).is_err());
        let q = Variable::new("q", Ty::class("Q"));
        assert!(Expr::call(Some(Expr::var(&q)), &m, vec![Expr::int(2)]).is_err());
    }

    #[test]
    fn try_shapes() {
        assert!(Expr::try_expr(Expr::empty(), vec![], None, None).is_err());
        assert!(Expr::try_expr(Expr::empty(), vec![CatchBlock::catch_all(Expr::empty())], None, Some(Expr::empty())).is_err());
        assert!(Expr::try_finally(Expr::int(1), Expr::empty()).is_ok());
    }

    #[test]
    fn tuple_levels() {
        let t = Expr::new_tuple(vec![Expr::int(1), Expr::str("a")]).unwrap();
        assert_eq!(t.ty(), Ty::Tuple(vec![Ty::Int, Ty::String]));
        assert_eq!(Expr::tuple_item(t.clone(), 1).unwrap().ty(), Ty::String);
        assert!(Expr::tuple_item(t, 2).is_err());
        assert!(Expr::new_tuple(vec![Expr::int(0); 8]).is_err());
    }
}
