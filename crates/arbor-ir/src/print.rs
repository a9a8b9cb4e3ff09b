//! S-expression debug view of a tree.
//!
//! Used by `Debug`/`Display` on [`Expr`] and by snapshot tests. Variables,
//! labels and placeholders are identities, so two distinct slots may share a
//! name; the printer disambiguates them with a `#k` suffix in order of first
//! appearance. Lists that fit in [`WIDTH`] columns print on one line,
//! otherwise each element goes on its own indented line.

use rustc_hash::FxHashMap;

use arbor_common::{Literal, Member, Method, Param, Ty};

use crate::binder::DynamicOp;
use crate::expr::{Expr, ExprKind};
use crate::ext::{ArgBinding, CaseTest, InterpolationPart};
use crate::node::{LabelTarget, Variable};

const WIDTH: usize = 80;

/// Render `expr` as an S-expression.
pub fn print(expr: &Expr) -> String {
    let mut p = Printer::default();
    let doc = p.expr(expr);
    let mut out = String::new();
    render(&doc, 0, &mut out);
    out
}

// ── Documents ────────────────────────────────────────────────────────

enum Doc {
    Atom(String),
    List(Vec<Doc>),
}

fn atom(s: impl Into<String>) -> Doc {
    Doc::Atom(s.into())
}

fn flat_width(doc: &Doc) -> usize {
    match doc {
        Doc::Atom(s) => s.chars().count(),
        Doc::List(items) => 2 + items.iter().map(flat_width).sum::<usize>() + items.len().saturating_sub(1),
    }
}

fn render_flat(doc: &Doc, out: &mut String) {
    match doc {
        Doc::Atom(s) => out.push_str(s),
        Doc::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                render_flat(item, out);
            }
            out.push(')');
        }
    }
}

fn render(doc: &Doc, indent: usize, out: &mut String) {
    match doc {
        Doc::List(items) if indent + flat_width(doc) > WIDTH && items.len() > 1 => {
            out.push('(');
            render(&items[0], indent + 1, out);
            for item in &items[1..] {
                out.push('\n');
                out.push_str(&" ".repeat(indent + 2));
                render(item, indent + 2, out);
            }
            out.push(')');
        }
        _ => render_flat(doc, out),
    }
}

// ── Names ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Names {
    assigned: FxHashMap<usize, String>,
    used: FxHashMap<String, usize>,
}

impl Names {
    fn name(&mut self, id: usize, base: &str) -> String {
        if let Some(name) = self.assigned.get(&id) {
            return name.clone();
        }
        let base = if base.is_empty() { "_" } else { base };
        let count = self.used.entry(base.to_string()).or_insert(0);
        let name = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}#{count}")
        };
        *count += 1;
        self.assigned.insert(id, name.clone());
        name
    }
}

#[derive(Default)]
struct Printer {
    vars: Names,
    labels: Names,
}

fn literal(value: &Literal) -> String {
    value.to_string()
}

fn method_name(m: &Method) -> String {
    if m.is_static() {
        m.to_string()
    } else {
        format!(".{}", m.name())
    }
}

fn member_name(m: &Member) -> String {
    format!(".{}", m.name())
}

fn dynamic_op(op: &DynamicOp) -> String {
    match op {
        DynamicOp::Binary(op) => op.symbol().to_string(),
        DynamicOp::Unary(op) => op.name().to_string(),
        DynamicOp::Convert(ty) => format!("convert:{ty}"),
        DynamicOp::GetMember(name) => format!("get.{name}"),
        DynamicOp::SetMember(name) => format!("set.{name}"),
        DynamicOp::InvokeMember(name) => format!("invoke.{name}"),
        DynamicOp::Invoke => "invoke".to_string(),
        DynamicOp::GetIndex => "get[]".to_string(),
        DynamicOp::SetIndex => "set[]".to_string(),
    }
}

impl Printer {
    fn var(&mut self, v: &Variable) -> String {
        self.vars.name(v.id(), v.name())
    }

    fn label(&mut self, l: &LabelTarget) -> String {
        self.labels.name(l.id(), l.name())
    }

    fn var_list(&mut self, vars: &[Variable]) -> Doc {
        let names: Vec<String> = vars.iter().map(|v| self.var(v)).collect();
        atom(format!("[{}]", names.join(" ")))
    }

    fn labelled(&mut self, key: &str, label: Option<&LabelTarget>, items: &mut Vec<Doc>) {
        if let Some(l) = label {
            let name = self.label(l);
            items.push(atom(format!("{key}:{name}")));
        }
    }

    fn exprs<'a>(&mut self, exprs: impl IntoIterator<Item = &'a Expr>, items: &mut Vec<Doc>) {
        for e in exprs {
            let d = self.expr(e);
            items.push(d);
        }
    }

    fn bindings(&mut self, bindings: &[ArgBinding], items: &mut Vec<Doc>) {
        for b in bindings {
            let value = self.expr(&b.value);
            items.push(Doc::List(vec![atom(param_name(&b.param)), value]));
        }
    }

    fn expr(&mut self, expr: &Expr) -> Doc {
        match expr.kind() {
            ExprKind::Constant(c) => match c.value.natural_type() {
                Some(natural) if natural != c.ty => Doc::List(vec![atom("const"), atom(c.ty.to_string()), atom(literal(&c.value))]),
                _ => atom(literal(&c.value)),
            },
            ExprKind::Default(Ty::Void) => atom("nop"),
            ExprKind::Default(ty) => Doc::List(vec![atom("default"), atom(ty.to_string())]),
            ExprKind::Variable(v) => atom(self.var(v)),
            ExprKind::Lambda(l) => {
                let mut items = vec![atom("lambda")];
                if let Some(name) = &l.name {
                    items.push(atom(name.clone()));
                }
                items.push(self.var_list(&l.params));
                items.push(self.expr(&l.body));
                Doc::List(items)
            }
            ExprKind::Assign(a) => {
                let mut items = vec![atom("=")];
                self.exprs([&a.target, &a.value], &mut items);
                Doc::List(items)
            }
            ExprKind::Unary(u) => {
                let head = match &u.method {
                    Some(m) => format!("{}:{m}", u.op.name()),
                    None => u.op.name().to_string(),
                };
                Doc::List(vec![atom(head), self.expr(&u.operand)])
            }
            ExprKind::Binary(b) => {
                let head = match &b.method {
                    Some(m) => format!("{}:{m}", b.op.symbol()),
                    None => b.op.symbol().to_string(),
                };
                let mut items = vec![atom(head)];
                self.exprs([&b.left, &b.right], &mut items);
                Doc::List(items)
            }
            ExprKind::Convert(c) => Doc::List(vec![atom("convert"), atom(c.ty.to_string()), self.expr(&c.operand)]),
            ExprKind::Conditional(c) => {
                let mut items = vec![atom("if")];
                if c.ty.is_void() && c.if_false.is_empty() {
                    self.exprs([&c.test, &c.if_true], &mut items);
                } else {
                    self.exprs([&c.test, &c.if_true, &c.if_false], &mut items);
                }
                Doc::List(items)
            }
            ExprKind::Block(b) => {
                let mut items = vec![atom("block")];
                if !b.variables.is_empty() {
                    items.push(self.var_list(&b.variables));
                }
                self.exprs(&b.exprs, &mut items);
                Doc::List(items)
            }
            ExprKind::Loop(l) => {
                let mut items = vec![atom("loop")];
                self.labelled("break", l.break_label.as_ref(), &mut items);
                self.labelled("continue", l.continue_label.as_ref(), &mut items);
                items.push(self.expr(&l.body));
                Doc::List(items)
            }
            ExprKind::Goto(g) => {
                let mut items = vec![atom(g.kind.name()), atom(self.label(&g.target))];
                self.exprs(&g.value, &mut items);
                Doc::List(items)
            }
            ExprKind::Label(l) => {
                let mut items = vec![atom("label"), atom(self.label(&l.target))];
                self.exprs(&l.default, &mut items);
                Doc::List(items)
            }
            ExprKind::Try(t) => {
                let mut items = vec![atom("try"), self.expr(&t.body)];
                for h in &t.handlers {
                    let mut catch = vec![atom("catch"), atom(h.test.to_string())];
                    if let Some(v) = &h.variable {
                        catch.push(atom(self.var(v)));
                    }
                    if let Some(f) = &h.filter {
                        catch.push(Doc::List(vec![atom("when"), self.expr(f)]));
                    }
                    catch.push(self.expr(&h.body));
                    items.push(Doc::List(catch));
                }
                if let Some(f) = &t.finally {
                    items.push(Doc::List(vec![atom("finally"), self.expr(f)]));
                }
                if let Some(f) = &t.fault {
                    items.push(Doc::List(vec![atom("fault"), self.expr(f)]));
                }
                Doc::List(items)
            }
            ExprKind::Throw(t) => match &t.value {
                Some(v) => Doc::List(vec![atom("throw"), self.expr(v)]),
                None => Doc::List(vec![atom("rethrow")]),
            },
            ExprKind::Call(c) => {
                let mut items = vec![atom("call"), atom(method_name(&c.method))];
                self.exprs(&c.object, &mut items);
                self.exprs(&c.args, &mut items);
                Doc::List(items)
            }
            ExprKind::Invoke(i) => {
                let mut items = vec![atom("invoke"), self.expr(&i.target)];
                self.exprs(&i.args, &mut items);
                Doc::List(items)
            }
            ExprKind::New(n) => {
                let mut items = vec![atom("new"), atom(n.ty.to_string())];
                self.exprs(&n.args, &mut items);
                Doc::List(items)
            }
            ExprKind::NewArray(n) => {
                let mut items = vec![atom("new-array"), atom(n.elem.to_string())];
                self.exprs(&n.items, &mut items);
                Doc::List(items)
            }
            ExprKind::NewTuple(t) => {
                let mut items = vec![atom("tuple")];
                self.exprs(&t.items, &mut items);
                Doc::List(items)
            }
            ExprKind::TupleItem(t) => Doc::List(vec![atom("item"), atom(t.index.to_string()), self.expr(&t.tuple)]),
            ExprKind::Member(m) => match &m.object {
                Some(obj) => Doc::List(vec![atom(member_name(&m.member)), self.expr(obj)]),
                None => atom(m.member.to_string()),
            },
            ExprKind::Index(i) => {
                let mut items = vec![atom("index"), self.expr(&i.object)];
                self.exprs(&i.args, &mut items);
                Doc::List(items)
            }
            ExprKind::ArrayLength(a) => Doc::List(vec![atom("len"), self.expr(a)]),
            ExprKind::Dynamic(d) => {
                let mut items = vec![atom("dynamic"), atom(dynamic_op(&d.site.op))];
                self.exprs(&d.args, &mut items);
                Doc::List(items)
            }
            ExprKind::Await(a) => Doc::List(vec![atom("await"), self.expr(&a.operand)]),

            ExprKind::While(w) => {
                let mut items = vec![atom("while")];
                self.labelled("break", w.labels.break_label.as_ref(), &mut items);
                self.labelled("continue", w.labels.continue_label.as_ref(), &mut items);
                self.exprs([&w.test, &w.body], &mut items);
                Doc::List(items)
            }
            ExprKind::DoWhile(d) => {
                let mut items = vec![atom("do-while")];
                self.labelled("break", d.labels.break_label.as_ref(), &mut items);
                self.labelled("continue", d.labels.continue_label.as_ref(), &mut items);
                self.exprs([&d.body, &d.test], &mut items);
                Doc::List(items)
            }
            ExprKind::For(f) => {
                let mut items = vec![atom("for")];
                self.labelled("break", f.labels.break_label.as_ref(), &mut items);
                self.labelled("continue", f.labels.continue_label.as_ref(), &mut items);
                items.push(self.var_list(&f.variables));
                let mut init = vec![atom("init")];
                self.exprs(&f.initializers, &mut init);
                items.push(Doc::List(init));
                if let Some(test) = &f.test {
                    items.push(Doc::List(vec![atom("test"), self.expr(test)]));
                }
                let mut step = vec![atom("step")];
                self.exprs(&f.iterators, &mut step);
                items.push(Doc::List(step));
                items.push(self.expr(&f.body));
                Doc::List(items)
            }
            ExprKind::ForEach(f) => {
                let mut items = vec![atom("for-each")];
                self.labelled("break", f.labels.break_label.as_ref(), &mut items);
                self.labelled("continue", f.labels.continue_label.as_ref(), &mut items);
                items.push(atom(self.var(&f.variable)));
                items.push(self.expr(&f.collection));
                if let Some(conv) = &f.conversion {
                    items.push(Doc::List(vec![atom("via"), self.expr(conv)]));
                }
                items.push(self.expr(&f.body));
                Doc::List(items)
            }
            ExprKind::Switch(s) => {
                let mut items = vec![atom("switch")];
                self.labelled("break", s.break_label.as_ref(), &mut items);
                if !s.variables.is_empty() {
                    items.push(self.var_list(&s.variables));
                }
                items.push(self.expr(&s.subject));
                for case in &s.cases {
                    let tests: Vec<String> = case
                        .tests
                        .iter()
                        .map(|t| match t {
                            CaseTest::Value(v) => literal(v),
                            CaseTest::Default => "default".to_string(),
                        })
                        .collect();
                    items.push(Doc::List(vec![
                        atom("case"),
                        atom(format!("[{}]", tests.join(" "))),
                        self.expr(&case.body),
                    ]));
                }
                Doc::List(items)
            }
            ExprKind::GotoCase(v) => Doc::List(vec![atom("goto-case"), atom(literal(v))]),
            ExprKind::GotoDefault => Doc::List(vec![atom("goto-default")]),
            ExprKind::StmtBlock(b) => {
                let mut items = vec![atom("stmts")];
                if !b.variables.is_empty() {
                    items.push(self.var_list(&b.variables));
                }
                self.labelled("return", b.return_label.as_ref(), &mut items);
                self.exprs(&b.statements, &mut items);
                Doc::List(items)
            }
            ExprKind::Using(u) => {
                let mut items = vec![atom(if u.is_async { "await-using" } else { "using" })];
                for r in &u.resources {
                    let name = match &r.variable {
                        Some(v) => self.var(v),
                        None => "_".to_string(),
                    };
                    items.push(Doc::List(vec![atom(name), self.expr(&r.resource)]));
                }
                items.push(self.expr(&u.body));
                Doc::List(items)
            }
            ExprKind::ConditionalAccess(c) => {
                let mut items = vec![atom("?.")];
                self.exprs([&c.receiver, &c.when_not_null], &mut items);
                Doc::List(items)
            }
            ExprKind::ConditionalReceiver(_) => atom("<recv>"),
            ExprKind::CompoundAssign(c) => {
                let mut items = vec![atom(c.op.symbol())];
                self.exprs([&c.target, &c.operand], &mut items);
                if let Some(m) = &c.method {
                    items.push(atom(format!("via:{m}")));
                }
                if let Some(conv) = &c.left_conversion {
                    items.push(Doc::List(vec![atom("left"), self.expr(conv)]));
                }
                if let Some(conv) = &c.final_conversion {
                    items.push(Doc::List(vec![atom("final"), self.expr(conv)]));
                }
                Doc::List(items)
            }
            ExprKind::UnaryAssign(u) => {
                let mut items = vec![atom(u.op.symbol()), self.expr(&u.target)];
                if let Some(m) = &u.method {
                    items.push(atom(format!("via:{m}")));
                }
                Doc::List(items)
            }
            ExprKind::CallBinding(c) => {
                let mut items = vec![atom("call-with"), atom(method_name(&c.method))];
                self.exprs(&c.object, &mut items);
                self.bindings(&c.bindings, &mut items);
                Doc::List(items)
            }
            ExprKind::InvokeBinding(i) => {
                let mut items = vec![atom("invoke-with"), self.expr(&i.target)];
                self.bindings(&i.bindings, &mut items);
                Doc::List(items)
            }
            ExprKind::NewBinding(n) => {
                let mut items = vec![atom("new-with"), atom(n.ctor.declaring().to_string())];
                self.bindings(&n.bindings, &mut items);
                Doc::List(items)
            }
            ExprKind::IndexBinding(i) => {
                let mut items = vec![atom("index-with"), self.expr(&i.object)];
                self.bindings(&i.bindings, &mut items);
                Doc::List(items)
            }
            ExprKind::ArrayAccess(a) => {
                let mut items = vec![atom("at")];
                self.exprs([&a.array, &a.index], &mut items);
                Doc::List(items)
            }
            ExprKind::FromEndIndex(v) => Doc::List(vec![atom("^"), self.expr(v)]),
            ExprKind::Range(r) => {
                let start = r.start.as_ref().map_or_else(|| atom("_"), |s| self.expr(s));
                let end = r.end.as_ref().map_or_else(|| atom("_"), |e| self.expr(e));
                Doc::List(vec![atom(".."), start, end])
            }
            ExprKind::InterpolatedString(s) => {
                let head = if s.ty == Ty::Formattable { "formattable" } else { "interp" };
                let mut items = vec![atom(head)];
                for part in &s.parts {
                    match part {
                        InterpolationPart::Text(t) => items.push(atom(format!("{t:?}"))),
                        InterpolationPart::Slot(slot) => {
                            let mut fmt = vec![atom("fmt"), self.expr(&slot.value)];
                            if let Some(a) = slot.alignment {
                                fmt.push(atom(format!("align:{a}")));
                            }
                            if let Some(f) = &slot.format {
                                fmt.push(atom(format!("format:{f:?}")));
                            }
                            items.push(Doc::List(fmt));
                        }
                    }
                }
                Doc::List(items)
            }
            ExprKind::TupleConvert(t) => {
                let mut items = vec![atom("tuple-convert"), atom(t.ty.to_string()), self.expr(&t.operand)];
                if t.conversions.iter().any(Option::is_some) {
                    for conv in &t.conversions {
                        match conv {
                            Some(c) => {
                                let d = self.expr(c);
                                items.push(d);
                            }
                            None => items.push(atom("_")),
                        }
                    }
                }
                Doc::List(items)
            }
            ExprKind::TupleLiteral(t) => {
                let mut items = vec![atom("tuple-lit")];
                self.exprs(&t.items, &mut items);
                Doc::List(items)
            }
            ExprKind::DynamicOp(d) => {
                let mut items = vec![atom("dyn"), atom(dynamic_op(&d.op))];
                for arg in &d.args {
                    let value = self.expr(&arg.value);
                    let prefix = match (&arg.name, arg.by_ref) {
                        (Some(name), _) => Some(name.clone()),
                        (None, true) => Some("ref".to_string()),
                        (None, false) => None,
                    };
                    match prefix {
                        Some(p) => items.push(Doc::List(vec![atom(format!("{p}:")), value])),
                        None => items.push(value),
                    }
                }
                Doc::List(items)
            }
            ExprKind::With(w) => {
                let mut items = vec![atom("with"), self.expr(&w.source)];
                for init in &w.initializers {
                    let value = self.expr(&init.value);
                    items.push(Doc::List(vec![atom(member_name(&init.member)), value]));
                }
                Doc::List(items)
            }
        }
    }
}

fn param_name(p: &Param) -> String {
    p.name.clone()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Placeholder;
    use crate::ops::BinaryOp;

    #[test]
    fn shadowed_names_get_suffixes() {
        let x = Variable::new("x", Ty::Int);
        let y = Variable::new("x", Ty::Int);
        let e = Expr::block(
            vec![x.clone(), y.clone()],
            vec![
                Expr::assign(Expr::var(&x), Expr::int(1)).unwrap(),
                Expr::assign(Expr::var(&y), Expr::binary(BinaryOp::Add, Expr::var(&x), Expr::int(2)).unwrap()).unwrap(),
                Expr::var(&y),
            ],
        )
        .unwrap();
        insta::assert_snapshot!(print(&e), @"(block [x x#1] (= x 1) (= x#1 (+ x 2)) x#1)");
    }

    #[test]
    fn loops_and_statements() {
        let brk = LabelTarget::new("brk");
        let e = Expr::loop_expr(Expr::break_to(&brk).unwrap(), Some(brk.clone()), None).unwrap();
        assert_eq!(print(&e), "(loop break:brk (break brk))");
        let e = Expr::if_then(Expr::bool(true), Expr::empty()).unwrap();
        assert_eq!(print(&e), "(if true nop)");
    }

    #[test]
    fn extended_forms() {
        let a = Variable::new("a", Ty::array(Ty::Int));
        let e = Expr::array_access(Expr::var(&a), Expr::from_end(Expr::int(1)).unwrap()).unwrap();
        assert_eq!(print(&e), "(at a (^ 1))");

        let n = Variable::new("n", Ty::nullable(Ty::Int));
        let p = Placeholder::new(Ty::Int);
        let e = Expr::conditional_access(Expr::var(&n), p.clone(), Expr::receiver(&p)).unwrap();
        assert_eq!(print(&e), "(?. n <recv>)");
    }

    #[test]
    fn long_lists_break_across_lines() {
        let counter = Variable::new("counter", Ty::Int);
        let stmts = (0..6)
            .map(|i| Expr::assign(Expr::var(&counter), Expr::int(i)).unwrap())
            .collect();
        let e = Expr::block(vec![counter.clone()], stmts).unwrap();
        insta::assert_snapshot!(print(&e), @r"
        (block
          [counter]
          (= counter 0)
          (= counter 1)
          (= counter 2)
          (= counter 3)
          (= counter 4)
          (= counter 5))
        ");
    }
}
