//! Registered element types
//!
//! The set of element types is closed and enumerated once, in
//! `for_each_element!`. Everything that must exist per type (scalar
//! converters, vector classes, registry entries) is generated from that list.

use std::borrow::Cow;
use std::fmt;
use std::mem::{align_of, size_of};

use num_traits::NumCast;

use super::sequence::Vector;
use super::{FromHost, IntoHost};
use crate::errors::BridgeError;
use crate::host::HostValue;

/// A scalar type that can live inside a `Vector<T>`
pub trait Element: Clone + PartialEq + Send + Sync + fmt::Debug + 'static {
    /// Canonical name; the host class of `Vector<T>` is `Vector_<NAME>`
    const NAME: &'static str;

    /// Convert a single host value, or `None` if it is not convertible
    fn extract(value: &HostValue) -> Option<Self>;

    fn to_host(&self) -> HostValue;

    /// Buffer layout, for element types that support zero-copy export
    fn dtype() -> Option<DType> {
        None
    }

    /// Zero-copy host buffer over `vector`'s storage
    fn export_host(_vector: &Vector<Self>) -> Result<HostValue, BridgeError> {
        Err(BridgeError::NotImplemented(format!(
            "{} does not support array export",
            Vector::<Self>::class_name()
        )))
    }
}

/// Element types with a fixed-width numeric layout, eligible for array export
pub trait ArrayElement: Element + Copy {
    const DTYPE: DType;
}

/// Element category in the buffer layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DTypeKind {
    Bool,
    Signed,
    Unsigned,
    Float,
}

impl DTypeKind {
    /// Array-interface kind code
    pub const fn code(self) -> char {
        match self {
            Self::Bool => 'b',
            Self::Signed => 'i',
            Self::Unsigned => 'u',
            Self::Float => 'f',
        }
    }
}

/// Native byte layout of an exportable element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub kind: DTypeKind,
    pub itemsize: usize,
    pub alignment: usize,
    /// Buffer-protocol format character
    pub format: &'static str,
}

impl DType {
    pub const fn of<T>(kind: DTypeKind, format: &'static str) -> Self {
        Self {
            kind,
            itemsize: size_of::<T>(),
            alignment: align_of::<T>(),
            format,
        }
    }

    /// Array-interface type string, e.g. `<i4`
    pub fn typestr(&self) -> String {
        let order = if self.itemsize == 1 {
            '|'
        } else if cfg!(target_endian = "little") {
            '<'
        } else {
            '>'
        };
        format!("{}{}{}", order, self.kind.code(), self.itemsize)
    }
}

/// Invoke `$m!(type)` once per registered element type, in registration order
macro_rules! for_each_element {
    ($m:ident) => {
        $m!(bool);
        $m!(u8);
        $m!(i32);
        $m!(i64);
        $m!(u64);
        $m!(f64);
        $m!(String);
    };
}
pub(crate) use for_each_element;

fn extract_integer<T: NumCast>(value: &HostValue) -> Option<T> {
    match value {
        HostValue::Int(i) => num_traits::cast(*i),
        HostValue::Bool(b) => num_traits::cast(<u8 as From<bool>>::from(*b)),
        _ => None,
    }
}

fn extract_float(value: &HostValue) -> Option<f64> {
    match value {
        HostValue::Float(f) => Some(*f),
        HostValue::Int(i) => Some(*i as f64),
        HostValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// `FromHost`/`IntoHost` for a scalar, routed through its `Element` impl
macro_rules! scalar_conversions {
    ($ty:ty) => {
        impl FromHost for $ty {
            fn type_name() -> Cow<'static, str> {
                Cow::Borrowed(<$ty as Element>::NAME)
            }

            fn convertible(value: &HostValue) -> bool {
                <$ty as Element>::extract(value).is_some()
            }

            fn construct(value: &HostValue) -> Result<Self, BridgeError> {
                <$ty as Element>::extract(value)
                    .ok_or_else(|| BridgeError::conversion(<$ty as Element>::NAME, value))
            }
        }

        impl IntoHost for $ty {
            fn into_host(self) -> HostValue {
                Element::to_host(&self)
            }
        }
    };
}

macro_rules! integer_element {
    ($ty:ty, $name:literal, $kind:ident, $format:literal) => {
        impl Element for $ty {
            const NAME: &'static str = $name;

            fn extract(value: &HostValue) -> Option<Self> {
                extract_integer(value)
            }

            fn to_host(&self) -> HostValue {
                HostValue::Int(<i128 as From<$ty>>::from(*self))
            }

            fn dtype() -> Option<DType> {
                Some(<$ty as ArrayElement>::DTYPE)
            }

            fn export_host(vector: &Vector<Self>) -> Result<HostValue, BridgeError> {
                vector.export_host_array()
            }
        }

        impl ArrayElement for $ty {
            const DTYPE: DType = DType::of::<$ty>(DTypeKind::$kind, $format);
        }

        scalar_conversions!($ty);
    };
}

integer_element!(u8, "uint8_t", Unsigned, "B");
integer_element!(i32, "int32_t", Signed, "i");
integer_element!(i64, "int64_t", Signed, "q");
integer_element!(u64, "uint64_t", Unsigned, "Q");

impl Element for bool {
    const NAME: &'static str = "bool";

    fn extract(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Bool(b) => Some(*b),
            HostValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    fn to_host(&self) -> HostValue {
        HostValue::Bool(*self)
    }

    fn dtype() -> Option<DType> {
        Some(<bool as ArrayElement>::DTYPE)
    }

    fn export_host(vector: &Vector<Self>) -> Result<HostValue, BridgeError> {
        vector.export_host_array()
    }
}

impl ArrayElement for bool {
    const DTYPE: DType = DType::of::<bool>(DTypeKind::Bool, "?");
}

scalar_conversions!(bool);

impl Element for f64 {
    const NAME: &'static str = "double";

    fn extract(value: &HostValue) -> Option<Self> {
        extract_float(value)
    }

    fn to_host(&self) -> HostValue {
        HostValue::Float(*self)
    }

    fn dtype() -> Option<DType> {
        Some(<f64 as ArrayElement>::DTYPE)
    }

    fn export_host(vector: &Vector<Self>) -> Result<HostValue, BridgeError> {
        vector.export_host_array()
    }
}

impl ArrayElement for f64 {
    const DTYPE: DType = DType::of::<f64>(DTypeKind::Float, "d");
}

scalar_conversions!(f64);

impl Element for String {
    const NAME: &'static str = "string";

    fn extract(value: &HostValue) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }

    fn to_host(&self) -> HostValue {
        HostValue::Str(self.clone())
    }
}

scalar_conversions!(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(i32::extract(&HostValue::Int(-7)), Some(-7));
        assert_eq!(u8::extract(&HostValue::Int(255)), Some(255));
        assert_eq!(u8::extract(&HostValue::Int(256)), None);
        assert_eq!(u64::extract(&HostValue::Int(-1)), None);
        assert_eq!(i32::extract(&HostValue::Int(i64::MAX as i128)), None);
        assert_eq!(i64::extract(&HostValue::Bool(true)), Some(1));
    }

    #[test]
    fn test_floats_do_not_narrow_to_integers() {
        assert_eq!(i64::extract(&HostValue::Float(1.0)), None);
        assert_eq!(f64::extract(&HostValue::Int(3)), Some(3.0));
    }

    #[test]
    fn test_strings_only_from_str() {
        assert_eq!(String::extract(&HostValue::from("a")), Some("a".to_owned()));
        assert_eq!(String::extract(&HostValue::Int(1)), None);
        assert!(String::dtype().is_none());
    }

    #[test]
    fn test_checked_from_host() {
        assert_eq!(<i32 as FromHost>::from_host(&HostValue::Int(4)).unwrap(), 4);
        let err = <i32 as FromHost>::from_host(&HostValue::from("x")).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert str to int32_t");
    }

    #[test]
    fn test_dtypes() {
        assert_eq!(i32::DTYPE.itemsize, 4);
        assert_eq!(f64::DTYPE.kind, DTypeKind::Float);
        assert_eq!(u8::DTYPE.typestr(), "|u1");
        assert_eq!(bool::DTYPE.typestr(), "|b1");
        if cfg!(target_endian = "little") {
            assert_eq!(i64::DTYPE.typestr(), "<i8");
        }
    }

    #[test]
    fn test_element_list_order() {
        let mut names = Vec::new();
        macro_rules! push_name {
            ($ty:ty) => {
                names.push(<$ty as Element>::NAME);
            };
        }
        for_each_element!(push_name);
        assert_eq!(
            names,
            ["bool", "uint8_t", "int32_t", "int64_t", "uint64_t", "double", "string"]
        );
    }
}
