//! Bounded loops: `while`, `do-while`, `for`, `for-each`.

use arbor_common::registry::well_known;
use arbor_common::{IrError, IrResult, Member, Method, Ty, TypeRegistry};

use crate::build::{check_bool, check_distinct_labels, check_distinct_variables, check_void_label};
use crate::expr::{Expr, ExprKind};
use crate::node::{LabelTarget, Variable};

/// The optional `break` / `continue` targets of a loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopLabels {
    pub break_label: Option<LabelTarget>,
    pub continue_label: Option<LabelTarget>,
}

impl LoopLabels {
    pub fn new(break_label: Option<LabelTarget>, continue_label: Option<LabelTarget>) -> LoopLabels {
        LoopLabels {
            break_label,
            continue_label,
        }
    }

    pub fn none() -> LoopLabels {
        LoopLabels::default()
    }

    fn check(&self) -> IrResult<()> {
        check_void_label(self.break_label.as_ref(), "break_label")?;
        check_void_label(self.continue_label.as_ref(), "continue_label")?;
        check_distinct_labels(self.break_label.as_ref(), self.continue_label.as_ref())
    }
}

#[derive(Debug, PartialEq)]
pub struct While {
    pub test: Expr,
    pub body: Expr,
    pub labels: LoopLabels,
}

#[derive(Debug, PartialEq)]
pub struct DoWhile {
    pub body: Expr,
    pub test: Expr,
    pub labels: LoopLabels,
}

#[derive(Debug, PartialEq)]
pub struct For {
    /// Locals scoped to the whole loop.
    pub variables: Vec<Variable>,
    pub initializers: Vec<Expr>,
    /// `None` loops until a jump leaves it.
    pub test: Option<Expr>,
    pub iterators: Vec<Expr>,
    pub body: Expr,
    pub labels: LoopLabels,
}

/// How a `for-each` walks its collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Enumeration {
    /// Index loop from 0 to the array length.
    Array { elem: Ty },
    /// `GetEnumerator` / `MoveNext` / `Current`, disposing the enumerator
    /// afterwards when it is disposable.
    Pattern(EnumeratorInfo),
}

impl Enumeration {
    pub fn element_ty(&self) -> &Ty {
        match self {
            Enumeration::Array { elem } => elem,
            Enumeration::Pattern(info) => info.current.ty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumeratorInfo {
    pub get_enumerator: Method,
    pub move_next: Method,
    pub current: Member,
    pub dispose: Option<Method>,
}

impl EnumeratorInfo {
    pub fn enumerator_ty(&self) -> &Ty {
        self.get_enumerator.ret()
    }

    /// Resolve the enumerator pattern of `collection` by convention.
    pub fn resolve(collection: &Ty, registry: &TypeRegistry) -> IrResult<EnumeratorInfo> {
        let Some(get_enumerator) = registry.find_method(collection, well_known::GET_ENUMERATOR, 0)
        else {
            return Err(IrError::shape(
                "collection",
                format!("{collection} has no {}", well_known::GET_ENUMERATOR),
            ));
        };
        let enumerator = get_enumerator.ret().clone();
        let move_next = registry
            .find_method(&enumerator, well_known::MOVE_NEXT, 0)
            .filter(|m| m.ret() == &Ty::Bool)
            .ok_or_else(|| {
                IrError::shape(
                    "collection",
                    format!("enumerator {enumerator} has no {}", well_known::MOVE_NEXT),
                )
            })?;
        let current = registry
            .find_member(&enumerator, well_known::CURRENT)
            .filter(Member::is_readable)
            .ok_or_else(|| {
                IrError::shape(
                    "collection",
                    format!("enumerator {enumerator} has no {}", well_known::CURRENT),
                )
            })?;
        let dispose = if registry.implements(&enumerator, well_known::DISPOSABLE) {
            registry.find_method(&enumerator, well_known::DISPOSE, 0)
        } else {
            None
        };
        Ok(EnumeratorInfo {
            get_enumerator,
            move_next,
            current,
            dispose,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct ForEach {
    /// The iteration variable, scoped to the body.
    pub variable: Variable,
    pub collection: Expr,
    /// Optional element conversion `(elem) -> variable type`.
    pub conversion: Option<Expr>,
    pub body: Expr,
    pub enumeration: Enumeration,
    pub labels: LoopLabels,
}

fn redeclares(expr: &Expr, variables: &[Variable]) -> bool {
    match expr.kind() {
        ExprKind::Block(b) => b.variables.iter().any(|v| variables.contains(v)),
        ExprKind::StmtBlock(b) => b.variables.iter().any(|v| variables.contains(v)),
        _ => false,
    }
}

impl Expr {
    pub fn while_loop(test: Expr, body: Expr, labels: LoopLabels) -> IrResult<Expr> {
        check_bool(&test, "test")?;
        labels.check()?;
        Ok(Expr::from_kind(ExprKind::While(While { test, body, labels })))
    }

    pub fn do_while(body: Expr, test: Expr, labels: LoopLabels) -> IrResult<Expr> {
        check_bool(&test, "test")?;
        labels.check()?;
        Ok(Expr::from_kind(ExprKind::DoWhile(DoWhile { body, test, labels })))
    }

    pub fn for_loop(
        variables: Vec<Variable>,
        initializers: Vec<Expr>,
        test: Option<Expr>,
        iterators: Vec<Expr>,
        body: Expr,
        labels: LoopLabels,
    ) -> IrResult<Expr> {
        check_distinct_variables(&variables, "loop local")?;
        if let Some(test) = &test {
            check_bool(test, "test")?;
        }
        labels.check()?;
        if initializers.iter().any(|e| redeclares(e, &variables)) {
            return Err(IrError::shape("initializers", "an initializer re-declares a loop local"));
        }
        if iterators.iter().any(|e| redeclares(e, &variables)) {
            return Err(IrError::shape("iterators", "an iterator re-declares a loop local"));
        }
        Ok(Expr::from_kind(ExprKind::For(For {
            variables,
            initializers,
            test,
            iterators,
            body,
            labels,
        })))
    }

    /// A `for-each`, resolving the enumeration from the collection type.
    pub fn for_each(
        variable: Variable,
        collection: Expr,
        conversion: Option<Expr>,
        body: Expr,
        labels: LoopLabels,
        registry: &TypeRegistry,
    ) -> IrResult<Expr> {
        let enumeration = match collection.ty() {
            Ty::Array(elem) => Enumeration::Array { elem: *elem },
            other => Enumeration::Pattern(EnumeratorInfo::resolve(&other, registry)?),
        };
        Expr::for_each_resolved(variable, collection, conversion, body, enumeration, labels)
    }

    pub fn for_each_resolved(
        variable: Variable,
        collection: Expr,
        conversion: Option<Expr>,
        body: Expr,
        enumeration: Enumeration,
        labels: LoopLabels,
    ) -> IrResult<Expr> {
        labels.check()?;
        match (&enumeration, collection.ty()) {
            (Enumeration::Array { elem }, Ty::Array(actual)) if *elem == *actual => {}
            (Enumeration::Array { .. }, other) => {
                return Err(IrError::shape("collection", format!("expected an array, found {other}")));
            }
            (Enumeration::Pattern(info), other) => {
                if !info.get_enumerator.declaring().accepts(other.non_nullable()) {
                    return Err(IrError::shape(
                        "collection",
                        format!("{} is not declared on {other}", info.get_enumerator),
                    ));
                }
            }
        }
        let elem = enumeration.element_ty().clone();
        let produced = match &conversion {
            None => elem,
            Some(conv) => match conv.ty() {
                Ty::Fn(params, ret) if params.len() == 1 && params[0].accepts(&elem) => *ret,
                other => {
                    return Err(IrError::shape(
                        "conversion",
                        format!("expected a conversion from {elem}, found {other}"),
                    ));
                }
            },
        };
        if !variable.ty().accepts(&produced) {
            return Err(IrError::shape(
                "variable",
                format!("cannot iterate {produced} into {}", variable.ty()),
            ));
        }
        Ok(Expr::from_kind(ExprKind::ForEach(ForEach {
            variable,
            collection,
            conversion,
            body,
            enumeration,
            labels,
        })))
    }
}
