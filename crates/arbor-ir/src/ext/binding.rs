//! Named/positional argument binding for calls, invocations, construction
//! and indexers.
//!
//! A binding list pairs each supplied argument with the parameter it binds,
//! in the caller's textual order. Parameters the caller left out are filled
//! in when the node is reduced (defaults, an empty variadic array).

use rustc_hash::FxHashSet;

use arbor_common::member::build_signature;
use arbor_common::{IrError, IrResult, Indexer, Method, Param, Ty};

use crate::build::{check_by_ref, check_receiver};
use crate::expr::{Expr, ExprKind};

/// An argument as written by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Positional(Expr),
    Named(String, Expr),
}

impl Argument {
    pub fn named(name: impl Into<String>, value: Expr) -> Argument {
        Argument::Named(name.into(), value)
    }
}

/// One supplied argument and the parameter it binds.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgBinding {
    pub param: Param,
    pub value: Expr,
}

/// Bind `args` against `params`: positional arguments first, then named
/// ones. Trailing positional arguments beyond a variadic parameter are
/// packed into an array.
pub fn bind_arguments(params: &[Param], args: Vec<Argument>) -> IrResult<Vec<ArgBinding>> {
    let mut positional = Vec::new();
    let mut named = Vec::new();
    for arg in args {
        match arg {
            Argument::Positional(value) => {
                if !named.is_empty() {
                    return Err(IrError::shape("args", "a positional argument follows a named one"));
                }
                positional.push(value);
            }
            Argument::Named(name, value) => {
                if name.is_empty() {
                    return Err(IrError::argument_null("name"));
                }
                named.push((name, value));
            }
        }
    }

    let mut bindings = Vec::new();
    let mut rest = positional.into_iter();
    for param in params {
        if param.variadic {
            let remaining: Vec<Expr> = rest.by_ref().collect();
            let direct = remaining.len() == 1 && remaining[0].ty() == param.ty;
            if direct {
                bindings.extend(remaining.into_iter().map(|value| ArgBinding {
                    param: param.clone(),
                    value,
                }));
            } else if !remaining.is_empty() {
                let elem = param.ty.element_type().cloned().unwrap_or(Ty::Object);
                let packed = Expr::new_array(elem, remaining).map_err(|e| IrError::shape(&param.name, e.message))?;
                bindings.push(ArgBinding {
                    param: param.clone(),
                    value: packed,
                });
            }
            break;
        }
        match rest.next() {
            Some(value) => bindings.push(ArgBinding {
                param: param.clone(),
                value,
            }),
            None => break,
        }
    }
    if rest.next().is_some() {
        return Err(IrError::shape("args", format!("too many arguments, expected at most {}", params.len())));
    }

    for (name, value) in named {
        let Some(param) = params.iter().find(|p| p.name == name) else {
            return Err(IrError::shape(&name, format!("no parameter named `{name}`")));
        };
        bindings.push(ArgBinding {
            param: param.clone(),
            value,
        });
    }
    Ok(bindings)
}

/// Check a binding list: no duplicates, no foreign parameters, every
/// required parameter bound, values of the right type.
pub fn validate_bindings(params: &[Param], bindings: &[ArgBinding]) -> IrResult<()> {
    let mut bound = FxHashSet::default();
    for b in bindings {
        let belongs = params.get(b.param.position).is_some_and(|p| p == &b.param);
        if !belongs {
            return Err(IrError::shape(
                &b.param.name,
                format!("`{}` is not a parameter of this signature", b.param.name),
            ));
        }
        if !bound.insert(b.param.position) {
            return Err(IrError::shape(&b.param.name, format!("`{}` is bound twice", b.param.name)));
        }
        if !b.param.ty.accepts(&b.value.ty()) {
            return Err(IrError::shape(
                &b.param.name,
                format!("expected {}, found {}", b.param.ty, b.value.ty()),
            ));
        }
        if b.param.by_ref {
            check_by_ref(&b.value, &b.param.name)?;
        }
    }
    if let Some(missing) = params.iter().find(|p| p.is_required() && !bound.contains(&p.position)) {
        return Err(IrError::shape(&missing.name, format!("`{}` is not bound", missing.name)));
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
pub struct CallBinding {
    pub object: Option<Expr>,
    pub method: Method,
    pub bindings: Vec<ArgBinding>,
}

#[derive(Debug, PartialEq)]
pub struct InvokeBinding {
    pub target: Expr,
    /// Parameter names and defaults of the invoked delegate.
    pub params: Vec<Param>,
    pub bindings: Vec<ArgBinding>,
    pub ty: Ty,
}

#[derive(Debug, PartialEq)]
pub struct NewBinding {
    pub ctor: Method,
    pub bindings: Vec<ArgBinding>,
}

#[derive(Debug, PartialEq)]
pub struct IndexBinding {
    pub object: Expr,
    pub indexer: Indexer,
    pub bindings: Vec<ArgBinding>,
}

impl Expr {
    pub fn call_binding(object: Option<Expr>, method: &Method, bindings: Vec<ArgBinding>) -> IrResult<Expr> {
        if method.is_constructor() {
            return Err(IrError::shape("method", "constructors are invoked with `new`"));
        }
        check_receiver(object.as_ref(), method.is_static(), method.declaring(), "method")?;
        validate_bindings(method.params(), &bindings)?;
        Ok(Expr::from_kind(ExprKind::CallBinding(CallBinding {
            object,
            method: method.clone(),
            bindings,
        })))
    }

    pub fn call_with(object: Option<Expr>, method: &Method, args: Vec<Argument>) -> IrResult<Expr> {
        let bindings = bind_arguments(method.params(), args)?;
        Expr::call_binding(object, method, bindings)
    }

    /// Invoke a delegate through a signature that names its parameters.
    pub fn invoke_binding(target: Expr, params: Vec<Param>, bindings: Vec<ArgBinding>) -> IrResult<Expr> {
        let params = build_signature(params)?;
        let Ty::Fn(param_tys, ret) = target.ty() else {
            return Err(IrError::shape("target", format!("cannot invoke a {}", target.ty())));
        };
        let shape_matches = param_tys.len() == params.len()
            && param_tys.iter().zip(&params).all(|(t, p)| t == &p.ty);
        if !shape_matches {
            return Err(IrError::shape("params", "the signature does not match the delegate type"));
        }
        validate_bindings(&params, &bindings)?;
        Ok(Expr::from_kind(ExprKind::InvokeBinding(InvokeBinding {
            target,
            params,
            bindings,
            ty: *ret,
        })))
    }

    pub fn invoke_with(target: Expr, params: Vec<Param>, args: Vec<Argument>) -> IrResult<Expr> {
        let params = build_signature(params)?;
        let bindings = bind_arguments(&params, args)?;
        Expr::invoke_binding(target, params, bindings)
    }

    pub fn new_binding(ctor: &Method, bindings: Vec<ArgBinding>) -> IrResult<Expr> {
        if !ctor.is_constructor() {
            return Err(IrError::shape("ctor", format!("{ctor} is not a constructor")));
        }
        validate_bindings(ctor.params(), &bindings)?;
        Ok(Expr::from_kind(ExprKind::NewBinding(NewBinding {
            ctor: ctor.clone(),
            bindings,
        })))
    }

    pub fn new_with(ctor: &Method, args: Vec<Argument>) -> IrResult<Expr> {
        let bindings = bind_arguments(ctor.params(), args)?;
        Expr::new_binding(ctor, bindings)
    }

    pub fn index_binding(object: Expr, indexer: &Indexer, bindings: Vec<ArgBinding>) -> IrResult<Expr> {
        check_receiver(Some(&object), false, indexer.declaring(), "indexer")?;
        validate_bindings(indexer.params(), &bindings)?;
        Ok(Expr::from_kind(ExprKind::IndexBinding(IndexBinding {
            object,
            indexer: indexer.clone(),
            bindings,
        })))
    }

    pub fn index_with(object: Expr, indexer: &Indexer, args: Vec<Argument>) -> IrResult<Expr> {
        let bindings = bind_arguments(indexer.params(), args)?;
        Expr::index_binding(object, indexer, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Variable;
    use arbor_common::{ErrorKind, Literal};

    fn method() -> Method {
        Method::new_static(
            "F",
            Ty::class("C"),
            vec![
                Param::new("a", Ty::Int),
                Param::new("b", Ty::Int).with_default(Literal::Int(7)),
                Param::new("rest", Ty::array(Ty::Int)).variadic(),
            ],
            Ty::Int,
        )
        .unwrap()
    }

    #[test]
    fn named_out_of_order() {
        let m = method();
        let bindings = bind_arguments(
            m.params(),
            vec![Argument::named("b", Expr::int(2)), Argument::named("a", Expr::int(1))],
        )
        .unwrap();
        let names: Vec<&str> = bindings.iter().map(|b| b.param.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(validate_bindings(m.params(), &bindings).is_ok());
    }

    #[test]
    fn extra_positionals_pack_into_variadic() {
        let m = method();
        let bindings = bind_arguments(
            m.params(),
            vec![
                Argument::Positional(Expr::int(1)),
                Argument::Positional(Expr::int(2)),
                Argument::Positional(Expr::int(3)),
                Argument::Positional(Expr::int(4)),
            ],
        )
        .unwrap();
        assert_eq!(bindings.len(), 3);
        assert!(matches!(bindings[2].value.kind(), ExprKind::NewArray(a) if a.items.len() == 2));
    }

    #[test]
    fn missing_required_is_rejected() {
        let m = method();
        let err = Expr::call_with(None, &m, vec![Argument::named("b", Expr::int(2))]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
        assert_eq!(err.argument.as_deref(), Some("a"));
    }

    #[test]
    fn duplicate_and_foreign_parameters() {
        let m = method();
        let err = Expr::call_with(
            None,
            &m,
            vec![Argument::Positional(Expr::int(1)), Argument::named("a", Expr::int(2))],
        )
        .unwrap_err();
        assert_eq!(err.argument.as_deref(), Some("a"));

        let foreign = ArgBinding {
            param: Param::new("z", Ty::Int),
            value: Expr::int(1),
        };
        assert!(Expr::call_binding(None, &m, vec![foreign]).is_err());
        assert!(Expr::call_with(None, &m, vec![Argument::named("zz", Expr::int(1))]).is_err());
    }

    #[test]
    fn by_ref_rejects_computed_array_element() {
        let m = Method::new_static("Swap", Ty::class("C"), vec![Param::new("x", Ty::Int).by_ref()], Ty::Void).unwrap();
        let xs = Expr::var(&Variable::new("xs", Ty::array(Ty::Int)));
        let elem = Expr::array_access(xs.clone(), Expr::int(0)).unwrap();
        assert!(Expr::call_with(None, &m, vec![Argument::Positional(elem)]).is_ok());
        let from_end = Expr::array_access(xs, Expr::from_end(Expr::int(1)).unwrap()).unwrap();
        let err = Expr::call_with(None, &m, vec![Argument::Positional(from_end)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }
}
