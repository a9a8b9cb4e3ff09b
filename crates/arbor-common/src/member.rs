//! Operation descriptors: parameters, methods, fields/properties, indexers.
//!
//! Descriptors are metadata only. They say what an operation looks like
//! (name, declaring type, signature); executing it is the tree compiler's
//! business. All descriptors are cheap to clone (`Arc`-backed) and compare
//! structurally.

use std::fmt;
use std::sync::Arc;

use crate::error::{IrError, IrResult};
use crate::literal::Literal;
use crate::ty::Ty;

// ── Parameters ───────────────────────────────────────────────────────

/// A formal parameter of a method, indexer or delegate signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
    /// Value used when the caller does not supply the argument.
    pub default: Option<Literal>,
    /// Collects trailing positional arguments into an array (`params`).
    pub variadic: bool,
    /// Passed by reference; the argument must be an lvalue.
    pub by_ref: bool,
    /// Zero-based position, assigned when the signature is built.
    pub position: usize,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Param {
            name: name.into(),
            ty,
            default: None,
            variadic: false,
            by_ref: false,
            position: 0,
        }
    }

    pub fn with_default(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn by_ref(mut self) -> Self {
        self.by_ref = true;
        self
    }

    /// Required parameters must be bound by every caller.
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.variadic
    }
}

/// Assign positions and check a parameter list: unique non-empty names,
/// defaults that fit their type, a single variadic array parameter in last
/// position.
pub fn build_signature(params: Vec<Param>) -> IrResult<Vec<Param>> {
    let count = params.len();
    let mut out: Vec<Param> = Vec::with_capacity(count);
    for (position, mut param) in params.into_iter().enumerate() {
        if param.name.is_empty() {
            return Err(IrError::argument_null("param.name"));
        }
        if out.iter().any(|p| p.name == param.name) {
            return Err(IrError::shape(
                &param.name,
                format!("duplicate parameter `{}`", param.name),
            ));
        }
        if param.ty.is_void() {
            return Err(IrError::shape(&param.name, "parameter cannot be of type Void"));
        }
        if let Some(default) = &param.default {
            if !default.fits(&param.ty) {
                return Err(IrError::shape(
                    &param.name,
                    format!("default value {} does not fit type {}", default, param.ty),
                ));
            }
        }
        if param.variadic {
            if position + 1 != count {
                return Err(IrError::shape(&param.name, "only the last parameter may be variadic"));
            }
            if param.ty.element_type().is_none() {
                return Err(IrError::shape(&param.name, "a variadic parameter must be an array"));
            }
            if param.by_ref {
                return Err(IrError::shape(&param.name, "a variadic parameter cannot be by-ref"));
            }
        }
        param.position = position;
        out.push(param);
    }
    Ok(out)
}

// ── Intrinsics ───────────────────────────────────────────────────────

/// Operations implemented by the tree compiler itself rather than by the
/// embedding host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `(value: Object, alignment: Int, format: String) -> String`
    FormatValue,
    /// `(format: String, args: Object[]) -> Formattable`
    CreateFormattable,
    /// `(index: Index, length: Int) -> Int`
    IndexOffset,
    /// `(array: T[], range: Range) -> T[]`
    ArraySlice,
    /// `(value: Object) -> String`
    ToString,
}

// ── Methods ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub declaring: Ty,
    pub params: Vec<Param>,
    pub ret: Ty,
    pub is_static: bool,
    pub intrinsic: Option<Intrinsic>,
}

/// A method (or constructor, or accessor) descriptor.
#[derive(Clone, Debug)]
pub struct Method(Arc<MethodInfo>);

impl Method {
    fn build(
        name: &str,
        declaring: Ty,
        params: Vec<Param>,
        ret: Ty,
        is_static: bool,
    ) -> IrResult<Method> {
        if name.is_empty() {
            return Err(IrError::argument_null("method.name"));
        }
        let params = build_signature(params)?;
        Ok(Method(Arc::new(MethodInfo {
            name: name.to_string(),
            declaring,
            params,
            ret,
            is_static,
            intrinsic: None,
        })))
    }

    pub fn new_static(name: &str, declaring: Ty, params: Vec<Param>, ret: Ty) -> IrResult<Method> {
        Method::build(name, declaring, params, ret, true)
    }

    pub fn new_instance(name: &str, declaring: Ty, params: Vec<Param>, ret: Ty) -> IrResult<Method> {
        Method::build(name, declaring, params, ret, false)
    }

    /// A constructor of `declaring`. Constructors are static and return the
    /// type they construct.
    pub fn constructor(declaring: Ty, params: Vec<Param>) -> IrResult<Method> {
        Method::build(".ctor", declaring.clone(), params, declaring, true)
    }

    pub(crate) fn intrinsic(
        kind: Intrinsic,
        name: &str,
        params: Vec<(&str, Ty)>,
        ret: Ty,
    ) -> Method {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(position, (name, ty))| Param {
                position,
                ..Param::new(name, ty)
            })
            .collect();
        Method(Arc::new(MethodInfo {
            name: name.to_string(),
            declaring: Ty::class("Intrinsics"),
            params,
            ret,
            is_static: true,
            intrinsic: Some(kind),
        }))
    }

    pub fn info(&self) -> &MethodInfo {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn declaring(&self) -> &Ty {
        &self.0.declaring
    }

    pub fn params(&self) -> &[Param] {
        &self.0.params
    }

    pub fn ret(&self) -> &Ty {
        &self.0.ret
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    pub fn is_constructor(&self) -> bool {
        self.0.name == ".ctor"
    }

    pub fn intrinsic_kind(&self) -> Option<Intrinsic> {
        self.0.intrinsic
    }

    /// Parameter types in order, i.e. the shape of a call's argument list.
    pub fn param_types(&self) -> Vec<Ty> {
        self.0.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn ptr_eq(a: &Method, b: &Method) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.declaring, self.0.name)
    }
}

// ── Fields and properties ────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum MemberKind {
    Field { readonly: bool },
    Property {
        getter: Option<Method>,
        setter: Option<Method>,
    },
}

#[derive(Debug, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub declaring: Ty,
    pub ty: Ty,
    pub kind: MemberKind,
    pub is_static: bool,
}

/// A field or property descriptor.
#[derive(Clone, Debug)]
pub struct Member(Arc<MemberInfo>);

impl Member {
    fn build(name: &str, declaring: Ty, ty: Ty, kind: MemberKind, is_static: bool) -> IrResult<Member> {
        if name.is_empty() {
            return Err(IrError::argument_null("member.name"));
        }
        if ty.is_void() {
            return Err(IrError::shape(name, "a member cannot be of type Void"));
        }
        Ok(Member(Arc::new(MemberInfo {
            name: name.to_string(),
            declaring,
            ty,
            kind,
            is_static,
        })))
    }

    pub fn field(name: &str, declaring: Ty, ty: Ty) -> IrResult<Member> {
        Member::build(name, declaring, ty, MemberKind::Field { readonly: false }, false)
    }

    pub fn readonly_field(name: &str, declaring: Ty, ty: Ty) -> IrResult<Member> {
        Member::build(name, declaring, ty, MemberKind::Field { readonly: true }, false)
    }

    pub fn static_field(name: &str, declaring: Ty, ty: Ty) -> IrResult<Member> {
        Member::build(name, declaring, ty, MemberKind::Field { readonly: false }, true)
    }

    /// A property backed by host accessors `get_{name}` / `set_{name}`.
    pub fn property(name: &str, declaring: Ty, ty: Ty, readable: bool, writable: bool) -> IrResult<Member> {
        let getter = if readable {
            Some(Method::new_instance(&format!("get_{name}"), declaring.clone(), vec![], ty.clone())?)
        } else {
            None
        };
        let setter = if writable {
            Some(Method::new_instance(
                &format!("set_{name}"),
                declaring.clone(),
                vec![Param::new("value", ty.clone())],
                Ty::Void,
            )?)
        } else {
            None
        };
        Member::build(name, declaring, ty, MemberKind::Property { getter, setter }, false)
    }

    pub fn info(&self) -> &MemberInfo {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn declaring(&self) -> &Ty {
        &self.0.declaring
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    pub fn is_readable(&self) -> bool {
        match &self.0.kind {
            MemberKind::Field { .. } => true,
            MemberKind::Property { getter, .. } => getter.is_some(),
        }
    }

    pub fn is_writable(&self) -> bool {
        match &self.0.kind {
            MemberKind::Field { readonly } => !readonly,
            MemberKind::Property { setter, .. } => setter.is_some(),
        }
    }

    pub fn getter(&self) -> Option<&Method> {
        match &self.0.kind {
            MemberKind::Property { getter, .. } => getter.as_ref(),
            MemberKind::Field { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<&Method> {
        match &self.0.kind {
            MemberKind::Property { setter, .. } => setter.as_ref(),
            MemberKind::Field { .. } => None,
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.declaring, self.0.name)
    }
}

// ── Indexers ─────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub struct IndexerInfo {
    pub declaring: Ty,
    pub ty: Ty,
    pub params: Vec<Param>,
    pub getter: Option<Method>,
    pub setter: Option<Method>,
}

/// An indexed property. The getter takes the index parameters; the setter
/// takes the same parameters followed by the value.
#[derive(Clone, Debug)]
pub struct Indexer(Arc<IndexerInfo>);

impl Indexer {
    pub fn new(declaring: Ty, ty: Ty, params: Vec<Param>, readable: bool, writable: bool) -> IrResult<Indexer> {
        if params.is_empty() {
            return Err(IrError::shape("params", "an indexer needs at least one parameter"));
        }
        let params = build_signature(params)?;
        if params.iter().any(|p| p.by_ref) {
            return Err(IrError::shape("params", "indexer parameters cannot be by-ref"));
        }
        let getter = if readable {
            Some(Method::new_instance("get_Item", declaring.clone(), params.clone(), ty.clone())?)
        } else {
            None
        };
        let setter = if writable {
            let mut setter_params = params.clone();
            setter_params.push(Param::new("value", ty.clone()));
            Some(Method::new_instance("set_Item", declaring.clone(), setter_params, Ty::Void)?)
        } else {
            None
        };
        if getter.is_none() && setter.is_none() {
            return Err(IrError::shape("indexer", "an indexer must be readable or writable"));
        }
        Ok(Indexer(Arc::new(IndexerInfo {
            declaring,
            ty,
            params,
            getter,
            setter,
        })))
    }

    pub fn info(&self) -> &IndexerInfo {
        &self.0
    }

    pub fn declaring(&self) -> &Ty {
        &self.0.declaring
    }

    pub fn ty(&self) -> &Ty {
        &self.0.ty
    }

    pub fn params(&self) -> &[Param] {
        &self.0.params
    }

    pub fn getter(&self) -> Option<&Method> {
        self.0.getter.as_ref()
    }

    pub fn setter(&self) -> Option<&Method> {
        self.0.setter.as_ref()
    }
}

impl PartialEq for Indexer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl fmt::Display for Indexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.Item", self.0.declaring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn signature_assigns_positions() {
        let m = Method::new_static(
            "Max",
            Ty::class("Math"),
            vec![Param::new("a", Ty::Int), Param::new("b", Ty::Int)],
            Ty::Int,
        )
        .unwrap();
        assert_eq!(m.params()[0].position, 0);
        assert_eq!(m.params()[1].position, 1);
        assert_eq!(m.to_string(), "Math.Max");
    }

    #[test]
    fn variadic_must_be_last_array() {
        let err = Method::new_static(
            "F",
            Ty::class("C"),
            vec![Param::new("xs", Ty::array(Ty::Int)).variadic(), Param::new("y", Ty::Int)],
            Ty::Void,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);

        let err = Method::new_static("F", Ty::class("C"), vec![Param::new("xs", Ty::Int).variadic()], Ty::Void)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }

    #[test]
    fn default_must_fit() {
        let err = Method::new_static(
            "F",
            Ty::class("C"),
            vec![Param::new("x", Ty::Int).with_default(Literal::Str("no".into()))],
            Ty::Void,
        )
        .unwrap_err();
        assert_eq!(err.argument.as_deref(), Some("x"));
    }

    #[test]
    fn duplicate_parameter_rejected() {
        let err = Method::new_static(
            "F",
            Ty::class("C"),
            vec![Param::new("x", Ty::Int), Param::new("x", Ty::Int)],
            Ty::Void,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentShape);
    }

    #[test]
    fn indexer_accessors_are_symmetric() {
        let idx = Indexer::new(Ty::class("List"), Ty::Int, vec![Param::new("i", Ty::Int)], true, true).unwrap();
        let get = idx.getter().unwrap();
        let set = idx.setter().unwrap();
        assert_eq!(get.params().len(), 1);
        assert_eq!(set.params().len(), 2);
        assert_eq!(set.params()[1].name, "value");
        assert_eq!(get.params()[0], set.params()[0]);
    }

    #[test]
    fn property_writability() {
        let ro = Member::property("Count", Ty::class("List"), Ty::Int, true, false).unwrap();
        assert!(ro.is_readable());
        assert!(!ro.is_writable());
        let field = Member::readonly_field("X", Ty::struct_ty("P"), Ty::Int).unwrap();
        assert!(!field.is_writable());
    }

    #[test]
    fn structural_equality() {
        let a = Method::new_instance("Dispose", Ty::class("R"), vec![], Ty::Void).unwrap();
        let b = Method::new_instance("Dispose", Ty::class("R"), vec![], Ty::Void).unwrap();
        assert_eq!(a, b);
        assert!(!Method::ptr_eq(&a, &b));
    }
}
