//! Scoped-resource blocks.

use arbor_common::registry::well_known;
use arbor_common::{IrError, IrResult, Method, Ty, TypeRegistry};

use crate::build::check_distinct_variables;
use crate::expr::{Expr, ExprKind};
use crate::node::Variable;

/// One acquired resource and how to release it.
#[derive(Debug, PartialEq)]
pub struct UsingResource {
    /// `None` holds the resource in an implicit temporary.
    pub variable: Option<Variable>,
    pub resource: Expr,
    pub dispose: Method,
    /// Set when the dispose operation is reached through an interface the
    /// resource type implements; the call goes through a conversion to it.
    pub via_interface: Option<Ty>,
}

impl UsingResource {
    /// Find the dispose operation of `resource` by convention: a matching
    /// method on the type itself, else the disposable interface.
    pub fn resolve(
        variable: Option<Variable>,
        resource: Expr,
        is_async: bool,
        registry: &TypeRegistry,
    ) -> IrResult<UsingResource> {
        let (name, interface) = dispose_names(is_async);
        let ty = resource.ty();
        let target = ty.non_nullable().clone();
        if let Some(dispose) = registry.find_declared_method(&target, name, 0) {
            return UsingResource::build(variable, resource, dispose, None);
        }
        if registry.implements(&target, interface) {
            if let Some(dispose) = registry.find_method(&target, name, 0) {
                return UsingResource::build(variable, resource, dispose, Some(Ty::interface(interface)));
            }
        }
        Err(IrError::shape(
            "resource",
            format!("{ty} has no resolvable {name} operation"),
        ))
    }

    /// Use a known dispose operation. It must be declared by the resource
    /// type or by an interface the type implements.
    pub fn with_dispose(
        variable: Option<Variable>,
        resource: Expr,
        dispose: Method,
        registry: &TypeRegistry,
    ) -> IrResult<UsingResource> {
        let ty = resource.ty();
        let target = ty.non_nullable();
        let declaring = dispose.declaring().clone();
        if &declaring == target {
            return UsingResource::build(variable, resource, dispose, None);
        }
        match &declaring {
            Ty::Interface(name) if registry.implements(target, name) => {
                UsingResource::build(variable, resource, dispose, Some(declaring.clone()))
            }
            _ => Err(IrError::shape(
                "dispose",
                format!("{dispose} is not an operation of {ty}"),
            )),
        }
    }

    fn build(
        variable: Option<Variable>,
        resource: Expr,
        dispose: Method,
        via_interface: Option<Ty>,
    ) -> IrResult<UsingResource> {
        if dispose.is_static() || !dispose.params().is_empty() {
            return Err(IrError::shape("dispose", "a dispose operation takes no arguments"));
        }
        let ty = resource.ty();
        if ty.is_void() {
            return Err(IrError::shape("resource", "a resource cannot be Void"));
        }
        if let Some(v) = &variable {
            if !v.ty().accepts(&ty) {
                return Err(IrError::shape(
                    v.name(),
                    format!("cannot hold a {ty} in `{}: {}`", v.name(), v.ty()),
                ));
            }
        }
        Ok(UsingResource {
            variable,
            resource,
            dispose,
            via_interface,
        })
    }

    /// The same declaration over a replacement resource expression.
    pub(crate) fn with_resource(&self, resource: Expr) -> IrResult<UsingResource> {
        UsingResource::build(
            self.variable.clone(),
            resource,
            self.dispose.clone(),
            self.via_interface.clone(),
        )
    }

    /// Whether the resource must be null-checked before disposal.
    pub fn is_nullable(&self) -> bool {
        let ty = match &self.variable {
            Some(v) => v.ty().clone(),
            None => self.resource.ty(),
        };
        ty.is_nullable()
    }
}

pub(crate) fn dispose_names(is_async: bool) -> (&'static str, &'static str) {
    if is_async {
        (well_known::DISPOSE_ASYNC, well_known::ASYNC_DISPOSABLE)
    } else {
        (well_known::DISPOSE, well_known::DISPOSABLE)
    }
}

#[derive(Debug, PartialEq)]
pub struct Using {
    /// Acquired in order, released in reverse order.
    pub resources: Vec<UsingResource>,
    pub body: Expr,
    /// Release through the asynchronous dispose operation, awaited.
    pub is_async: bool,
}

impl Expr {
    /// `using (resource) body` with an implicit temporary.
    pub fn using(resource: Expr, body: Expr, is_async: bool, registry: &TypeRegistry) -> IrResult<Expr> {
        let resource = UsingResource::resolve(None, resource, is_async, registry)?;
        Expr::using_resources(vec![resource], body, is_async)
    }

    /// `using (T a = x, b = y) body`.
    pub fn using_declarations(
        declarations: Vec<(Variable, Expr)>,
        body: Expr,
        is_async: bool,
        registry: &TypeRegistry,
    ) -> IrResult<Expr> {
        let resources = declarations
            .into_iter()
            .map(|(v, e)| UsingResource::resolve(Some(v), e, is_async, registry))
            .collect::<IrResult<Vec<_>>>()?;
        Expr::using_resources(resources, body, is_async)
    }

    pub fn using_resources(resources: Vec<UsingResource>, body: Expr, is_async: bool) -> IrResult<Expr> {
        if resources.is_empty() {
            return Err(IrError::argument_null("resources"));
        }
        let variables: Vec<Variable> = resources.iter().filter_map(|r| r.variable.clone()).collect();
        check_distinct_variables(&variables, "resource variable")?;
        let (name, _) = dispose_names(is_async);
        if let Some(r) = resources.iter().find(|r| r.dispose.name() != name) {
            return Err(IrError::shape(
                "dispose",
                format!("{} cannot release an {} resource", r.dispose, if is_async { "async" } else { "sync" }),
            ));
        }
        Ok(Expr::from_kind(ExprKind::Using(Using {
            resources,
            body,
            is_async,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::{ErrorKind, TypeDef, TypeDefKind};

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        let disposable = Ty::interface(well_known::DISPOSABLE);
        reg.define(
            TypeDef::new(well_known::DISPOSABLE, TypeDefKind::Interface)
                .with_method(Method::new_instance("Dispose", disposable, vec![], Ty::Void).unwrap()),
        );
        reg.define(TypeDef::new("File", TypeDefKind::Class).implementing(well_known::DISPOSABLE));
        reg.define(
            TypeDef::new("Lock", TypeDefKind::Struct)
                .with_method(Method::new_instance("Dispose", Ty::struct_ty("Lock"), vec![], Ty::Void).unwrap()),
        );
        reg.define(TypeDef::new("Plain", TypeDefKind::Class));
        reg
    }

    #[test]
    fn resolves_interface_and_direct_dispose() {
        let reg = registry();
        let f = Variable::new("f", Ty::class("File"));
        let r = UsingResource::resolve(None, Expr::var(&f), false, &reg).unwrap();
        assert_eq!(r.via_interface, Some(Ty::interface(well_known::DISPOSABLE)));
        assert!(r.is_nullable());

        let l = Variable::new("l", Ty::struct_ty("Lock"));
        let r = UsingResource::resolve(None, Expr::var(&l), false, &reg).unwrap();
        assert_eq!(r.via_interface, None);
        assert!(!r.is_nullable());
    }

    #[test]
    fn unresolvable_dispose_is_rejected() {
        let reg = registry();
        let p = Variable::new("p", Ty::class("Plain"));
        let err = Expr::using(Expr::var(&p), Expr::empty(), false, &reg).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }

    #[test]
    fn wrong_declaring_type_is_rejected() {
        let reg = registry();
        let f = Variable::new("f", Ty::class("File"));
        let foreign = Method::new_instance("Dispose", Ty::class("Other"), vec![], Ty::Void).unwrap();
        let err = UsingResource::with_dispose(None, Expr::var(&f), foreign, &reg).unwrap_err();
        assert_eq!(err.argument.as_deref(), Some("dispose"));
    }

    #[test]
    fn empty_declarations_are_null() {
        let err = Expr::using_resources(vec![], Expr::empty(), false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentNull);
    }
}
