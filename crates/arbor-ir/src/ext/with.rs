//! Non-destructive mutation: `source with { A = x, B = y }`.

use arbor_common::registry::well_known;
use arbor_common::{IrError, IrResult, Member, Method, TypeRegistry};

use crate::expr::{Expr, ExprKind};

#[derive(Debug, PartialEq)]
pub struct MemberInit {
    pub member: Member,
    pub value: Expr,
}

impl MemberInit {
    pub fn new(member: &Member, value: Expr) -> MemberInit {
        MemberInit {
            member: member.clone(),
            value,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct With {
    pub source: Expr,
    /// `None` copies a value-type source by assignment.
    pub clone: Option<Method>,
    pub initializers: Vec<MemberInit>,
}

fn check_initializers(source: &Expr, initializers: &[MemberInit]) -> IrResult<()> {
    let ty = source.ty();
    for (i, init) in initializers.iter().enumerate() {
        let member = &init.member;
        if initializers[..i].iter().any(|prev| prev.member == *member) {
            return Err(IrError::shape(member.name(), format!("`{}` is initialized twice", member.name())));
        }
        if member.is_static() || !member.declaring().accepts(&ty) {
            return Err(IrError::shape(member.name(), format!("{member} is not an instance member of {ty}")));
        }
        if !member.is_writable() {
            return Err(IrError::shape(member.name(), format!("{member} is not writable")));
        }
        if !member.ty().accepts(&init.value.ty()) {
            return Err(IrError::shape(
                member.name(),
                format!("cannot store {} into {member}", init.value.ty()),
            ));
        }
    }
    Ok(())
}

impl Expr {
    /// Copy a value-type source, or clone a reference-type source through
    /// its conventional no-argument clone operation.
    pub fn with(source: Expr, initializers: Vec<MemberInit>, registry: &TypeRegistry) -> IrResult<Expr> {
        let ty = source.ty();
        if ty.is_value_type() && !ty.is_nullable_value_type() {
            return Expr::with_copy(source, initializers);
        }
        let Some(clone) = registry.find_method(&ty, well_known::CLONE, 0) else {
            return Err(IrError::shape("source", format!("{ty} has no {} operation", well_known::CLONE)));
        };
        Expr::with_clone(source, clone, initializers)
    }

    /// Copy a value-type source by assignment.
    pub fn with_copy(source: Expr, initializers: Vec<MemberInit>) -> IrResult<Expr> {
        let ty = source.ty();
        if !ty.is_value_type() || ty.is_nullable_value_type() {
            return Err(IrError::shape("source", format!("{ty} is not copied by assignment")));
        }
        check_initializers(&source, &initializers)?;
        Ok(Expr::from_kind(ExprKind::With(With {
            source,
            clone: None,
            initializers,
        })))
    }

    pub fn with_clone(source: Expr, clone: Method, initializers: Vec<MemberInit>) -> IrResult<Expr> {
        let ty = source.ty();
        if clone.is_static() || !clone.params().is_empty() {
            return Err(IrError::shape("clone", "a clone operation is an instance method without arguments"));
        }
        if !clone.declaring().accepts(&ty) {
            return Err(IrError::shape("clone", format!("{clone} is not an operation of {ty}")));
        }
        if !ty.accepts(clone.ret()) {
            return Err(IrError::shape("clone", format!("{clone} returns {}, not {ty}", clone.ret())));
        }
        check_initializers(&source, &initializers)?;
        Ok(Expr::from_kind(ExprKind::With(With {
            source,
            clone: Some(clone),
            initializers,
        })))
    }
}
