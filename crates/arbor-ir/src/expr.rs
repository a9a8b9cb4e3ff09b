//! The node catalog.
//!
//! `Expr` is an immutable, `Arc`-shared tree. `ExprKind` is a closed sum
//! over the core vocabulary (what the tree compiler executes) and the
//! extended kinds (what frontends build and the reducer lowers). Nodes are
//! created only through the validating factories in [`crate::build`] and
//! [`crate::ext`]; the payload structs are public for inspection.

use std::fmt;
use std::sync::Arc;

use arbor_common::{Indexer, Literal, Member, Method, Ty};

use crate::binder::CallSite;
use crate::ext::{
    ArrayAccess, CallBinding, CompoundAssign, ConditionalAccess, DoWhile, DynamicExpr, For,
    ForEach, IndexBinding, InterpolatedString, InvokeBinding, NewBinding, RangeExpr, StmtBlock,
    Switch, TupleConvert, TupleLiteral, UnaryAssign, Using, While, With,
};
use crate::node::{LabelTarget, Placeholder, Variable};
use crate::ops::{BinaryOp, GotoKind, UnaryOp};

/// A node of an expression tree.
#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    // ── Core ─────────────────────────────────────────────────────────
    Constant(Constant),
    /// The default value of a type; `Default(Void)` is the empty statement.
    Default(Ty),
    Variable(Variable),
    Lambda(Lambda),
    Assign(Assign),
    Unary(Unary),
    Binary(Binary),
    Convert(Convert),
    Conditional(Conditional),
    Block(Block),
    Loop(Loop),
    Goto(Goto),
    Label(LabelStmt),
    Try(Try),
    Throw(Throw),
    Call(Call),
    Invoke(Invoke),
    New(New),
    NewArray(NewArray),
    NewTuple(NewTuple),
    TupleItem(TupleItem),
    Member(MemberAccess),
    Index(IndexAccess),
    ArrayLength(Expr),
    Dynamic(DynamicCall),
    Await(Await),

    // ── Extended ─────────────────────────────────────────────────────
    While(While),
    DoWhile(DoWhile),
    For(For),
    ForEach(ForEach),
    Switch(Switch),
    /// `goto case <value>` inside a switch body.
    GotoCase(Literal),
    /// `goto default` inside a switch body.
    GotoDefault,
    StmtBlock(StmtBlock),
    Using(Using),
    ConditionalAccess(ConditionalAccess),
    ConditionalReceiver(Placeholder),
    CompoundAssign(CompoundAssign),
    UnaryAssign(UnaryAssign),
    CallBinding(CallBinding),
    InvokeBinding(InvokeBinding),
    NewBinding(NewBinding),
    IndexBinding(IndexBinding),
    ArrayAccess(ArrayAccess),
    /// `^n`: an index counted from the end.
    FromEndIndex(Expr),
    Range(RangeExpr),
    InterpolatedString(InterpolatedString),
    TupleConvert(TupleConvert),
    TupleLiteral(TupleLiteral),
    DynamicOp(DynamicExpr),
    With(With),
}

// ── Core payloads ────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub struct Constant {
    pub value: Literal,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Lambda {
    pub params: Vec<Variable>,
    pub body: Expr,
    pub ret: Ty,
    pub name: Option<String>,
}

impl Lambda {
    pub fn ty(&self) -> Ty {
        Ty::fun(self.params.iter().map(|p| p.ty().clone()).collect(), self.ret.clone())
    }
}

#[derive(Debug, PartialEq)]
pub struct Assign {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Expr,
    /// A user-defined operator; when present the node is a call to it.
    pub method: Option<Method>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    pub method: Option<Method>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Convert {
    pub operand: Expr,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Conditional {
    pub test: Expr,
    pub if_true: Expr,
    pub if_false: Expr,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub variables: Vec<Variable>,
    pub exprs: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Loop {
    pub body: Expr,
    pub break_label: Option<LabelTarget>,
    /// Jumping here restarts the body.
    pub continue_label: Option<LabelTarget>,
}

#[derive(Debug, PartialEq)]
pub struct Goto {
    pub kind: GotoKind,
    pub target: LabelTarget,
    pub value: Option<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct LabelStmt {
    pub target: LabelTarget,
    /// Value of the label when reached by falling through.
    pub default: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatchBlock {
    /// Thrown values assignable to this type are caught.
    pub test: Ty,
    pub variable: Option<Variable>,
    pub filter: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, PartialEq)]
pub struct Try {
    pub body: Expr,
    pub handlers: Vec<CatchBlock>,
    pub finally: Option<Expr>,
    /// Runs only when the body exits by throwing.
    pub fault: Option<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Throw {
    /// `None` rethrows the exception being handled.
    pub value: Option<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Call {
    pub object: Option<Expr>,
    pub method: Method,
    pub args: Vec<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct Invoke {
    pub target: Expr,
    pub args: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct New {
    /// `None` constructs a builtin value (`Index`, `Range`) or an
    /// uninitialized instance of a class or struct.
    pub ctor: Option<Method>,
    pub ty: Ty,
    pub args: Vec<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct NewArray {
    pub elem: Ty,
    pub items: Vec<Expr>,
}

/// Builds one tuple level; a rest slot holds a nested `NewTuple`.
#[derive(Debug, PartialEq)]
pub struct NewTuple {
    pub items: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct TupleItem {
    pub tuple: Expr,
    /// Physical slot (the rest tuple lives in slot 7).
    pub index: usize,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct MemberAccess {
    pub object: Option<Expr>,
    pub member: Member,
}

/// Array element access (`indexer == None`) or an indexed property.
#[derive(Debug, PartialEq)]
pub struct IndexAccess {
    pub object: Expr,
    pub indexer: Option<Indexer>,
    pub args: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct DynamicCall {
    pub site: CallSite,
    pub args: Vec<Expr>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct Await {
    pub operand: Expr,
    pub ty: Ty,
}

// ── Expr ─────────────────────────────────────────────────────────────

impl Expr {
    pub(crate) fn from_kind(kind: ExprKind) -> Expr {
        Expr(Arc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn ptr_eq(a: &Expr, b: &Expr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The static result type.
    pub fn ty(&self) -> Ty {
        match self.kind() {
            ExprKind::Constant(c) => c.ty.clone(),
            ExprKind::Default(ty) => ty.clone(),
            ExprKind::Variable(v) => v.ty().clone(),
            ExprKind::Lambda(l) => l.ty(),
            ExprKind::Assign(a) => a.target.ty(),
            ExprKind::Unary(u) => u.ty.clone(),
            ExprKind::Binary(b) => b.ty.clone(),
            ExprKind::Convert(c) => c.ty.clone(),
            ExprKind::Conditional(c) => c.ty.clone(),
            ExprKind::Block(b) => b.ty.clone(),
            ExprKind::Loop(l) => l
                .break_label
                .as_ref()
                .map(|l| l.ty().clone())
                .unwrap_or(Ty::Void),
            ExprKind::Goto(_) => Ty::Void,
            ExprKind::Label(l) => l.target.ty().clone(),
            ExprKind::Try(t) => t.ty.clone(),
            ExprKind::Throw(t) => t.ty.clone(),
            ExprKind::Call(c) => c.method.ret().clone(),
            ExprKind::Invoke(i) => i.ty.clone(),
            ExprKind::New(n) => n.ty.clone(),
            ExprKind::NewArray(n) => Ty::array(n.elem.clone()),
            ExprKind::NewTuple(t) => t.ty.clone(),
            ExprKind::TupleItem(t) => t.ty.clone(),
            ExprKind::Member(m) => m.member.ty().clone(),
            ExprKind::Index(i) => i.ty.clone(),
            ExprKind::ArrayLength(_) => Ty::Int,
            ExprKind::Dynamic(d) => d.ty.clone(),
            ExprKind::Await(a) => a.ty.clone(),

            ExprKind::While(_) | ExprKind::DoWhile(_) | ExprKind::For(_) | ExprKind::ForEach(_) => {
                Ty::Void
            }
            ExprKind::Switch(_) | ExprKind::GotoCase(_) | ExprKind::GotoDefault => Ty::Void,
            ExprKind::StmtBlock(b) => b.ty(),
            ExprKind::Using(u) => u.body.ty(),
            ExprKind::ConditionalAccess(c) => c.ty.clone(),
            ExprKind::ConditionalReceiver(p) => p.ty().clone(),
            ExprKind::CompoundAssign(c) => c.target.ty(),
            ExprKind::UnaryAssign(u) => u.target.ty(),
            ExprKind::CallBinding(c) => c.method.ret().clone(),
            ExprKind::InvokeBinding(i) => i.ty.clone(),
            ExprKind::NewBinding(n) => n.ctor.declaring().clone(),
            ExprKind::IndexBinding(i) => i.indexer.ty().clone(),
            ExprKind::ArrayAccess(a) => a.ty.clone(),
            ExprKind::FromEndIndex(_) => Ty::Index,
            ExprKind::Range(_) => Ty::Range,
            ExprKind::InterpolatedString(s) => s.ty.clone(),
            ExprKind::TupleConvert(t) => t.ty.clone(),
            ExprKind::TupleLiteral(t) => t.ty.clone(),
            ExprKind::DynamicOp(d) => d.op.result_ty(),
            ExprKind::With(w) => w.source.ty(),
        }
    }

    /// Whether this node belongs to the extended vocabulary and must be
    /// reduced before compilation. Children are not inspected.
    pub fn is_extended(&self) -> bool {
        !matches!(
            self.kind(),
            ExprKind::Constant(_)
                | ExprKind::Default(_)
                | ExprKind::Variable(_)
                | ExprKind::Lambda(_)
                | ExprKind::Assign(_)
                | ExprKind::Unary(_)
                | ExprKind::Binary(_)
                | ExprKind::Convert(_)
                | ExprKind::Conditional(_)
                | ExprKind::Block(_)
                | ExprKind::Loop(_)
                | ExprKind::Goto(_)
                | ExprKind::Label(_)
                | ExprKind::Try(_)
                | ExprKind::Throw(_)
                | ExprKind::Call(_)
                | ExprKind::Invoke(_)
                | ExprKind::New(_)
                | ExprKind::NewArray(_)
                | ExprKind::NewTuple(_)
                | ExprKind::TupleItem(_)
                | ExprKind::Member(_)
                | ExprKind::Index(_)
                | ExprKind::ArrayLength(_)
                | ExprKind::Dynamic(_)
                | ExprKind::Await(_)
        )
    }

    /// Short kind name used in logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self.kind() {
            ExprKind::Constant(_) => "constant",
            ExprKind::Default(_) => "default",
            ExprKind::Variable(_) => "variable",
            ExprKind::Lambda(_) => "lambda",
            ExprKind::Assign(_) => "assign",
            ExprKind::Unary(_) => "unary",
            ExprKind::Binary(_) => "binary",
            ExprKind::Convert(_) => "convert",
            ExprKind::Conditional(_) => "conditional",
            ExprKind::Block(_) => "block",
            ExprKind::Loop(_) => "loop",
            ExprKind::Goto(_) => "goto",
            ExprKind::Label(_) => "label",
            ExprKind::Try(_) => "try",
            ExprKind::Throw(_) => "throw",
            ExprKind::Call(_) => "call",
            ExprKind::Invoke(_) => "invoke",
            ExprKind::New(_) => "new",
            ExprKind::NewArray(_) => "new-array",
            ExprKind::NewTuple(_) => "new-tuple",
            ExprKind::TupleItem(_) => "tuple-item",
            ExprKind::Member(_) => "member",
            ExprKind::Index(_) => "index",
            ExprKind::ArrayLength(_) => "array-length",
            ExprKind::Dynamic(_) => "dynamic-call",
            ExprKind::Await(_) => "await",
            ExprKind::While(_) => "while",
            ExprKind::DoWhile(_) => "do-while",
            ExprKind::For(_) => "for",
            ExprKind::ForEach(_) => "for-each",
            ExprKind::Switch(_) => "switch",
            ExprKind::GotoCase(_) => "goto-case",
            ExprKind::GotoDefault => "goto-default",
            ExprKind::StmtBlock(_) => "statement-block",
            ExprKind::Using(_) => "using",
            ExprKind::ConditionalAccess(_) => "conditional-access",
            ExprKind::ConditionalReceiver(_) => "conditional-receiver",
            ExprKind::CompoundAssign(_) => "compound-assign",
            ExprKind::UnaryAssign(_) => "unary-assign",
            ExprKind::CallBinding(_) => "call-binding",
            ExprKind::InvokeBinding(_) => "invoke-binding",
            ExprKind::NewBinding(_) => "new-binding",
            ExprKind::IndexBinding(_) => "index-binding",
            ExprKind::ArrayAccess(_) => "array-access",
            ExprKind::FromEndIndex(_) => "from-end-index",
            ExprKind::Range(_) => "range",
            ExprKind::InterpolatedString(_) => "interpolated-string",
            ExprKind::TupleConvert(_) => "tuple-convert",
            ExprKind::TupleLiteral(_) => "tuple-literal",
            ExprKind::DynamicOp(_) => "dynamic",
            ExprKind::With(_) => "with",
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self.kind() {
            ExprKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self.kind() {
            ExprKind::Lambda(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant(_))
    }

    /// `Default(Void)`, the empty statement.
    pub fn is_empty(&self) -> bool {
        matches!(self.kind(), ExprKind::Default(Ty::Void))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Expr::ptr_eq(self, other) || self.0 == other.0
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::print::print(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::print::print(self))
    }
}
