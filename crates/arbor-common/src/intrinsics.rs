//! Descriptors for built-in operations the reducer emits.
//!
//! These are ordinary static [`Method`]s tagged with an [`Intrinsic`] kind,
//! so the tree compiler can implement them natively instead of routing them
//! to the host.

use crate::member::{Intrinsic, Method};
use crate::ty::Ty;

/// `FormatValue(value, alignment, format) -> String`. An alignment of zero
/// and an empty format mean "plain `ToString`".
pub fn format_value() -> Method {
    Method::intrinsic(
        Intrinsic::FormatValue,
        "FormatValue",
        vec![("value", Ty::Object), ("alignment", Ty::Int), ("format", Ty::String)],
        Ty::String,
    )
}

/// `CreateFormattable(format, args) -> Formattable`.
pub fn create_formattable() -> Method {
    Method::intrinsic(
        Intrinsic::CreateFormattable,
        "CreateFormattable",
        vec![("format", Ty::String), ("args", Ty::array(Ty::Object))],
        Ty::Formattable,
    )
}

/// `IndexOffset(index, length) -> Int`: the absolute position an index
/// designates in a sequence of `length` elements.
pub fn index_offset() -> Method {
    Method::intrinsic(
        Intrinsic::IndexOffset,
        "IndexOffset",
        vec![("index", Ty::Index), ("length", Ty::Int)],
        Ty::Int,
    )
}

/// `ArraySlice(array, range) -> T[]` for arrays of `elem`.
pub fn array_slice(elem: &Ty) -> Method {
    let array = Ty::array(elem.clone());
    Method::intrinsic(
        Intrinsic::ArraySlice,
        "ArraySlice",
        vec![("array", array.clone()), ("range", Ty::Range)],
        array,
    )
}

/// `ToString(value) -> String`.
pub fn to_string() -> Method {
    Method::intrinsic(
        Intrinsic::ToString,
        "ToString",
        vec![("value", Ty::Object)],
        Ty::String,
    )
}
