//! Host value model - the dynamically-typed side of the boundary
//!
//! Design: a single enum covers every value the host can hand to the bridge.
//! Natively implemented classes (vectors, engine handles, metadata) travel
//! behind `Object` as shared trait objects, host callables behind `Function`.

mod class;
mod function;

pub use class::{HostClass, HostSequence};
pub use function::HostFunction;

use std::borrow::Cow;
use std::sync::Arc;

/// A value owned by the host runtime
#[derive(Debug, Clone)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<HostValue>),
    Tuple(Vec<HostValue>),
    Object(Arc<dyn HostClass>),
    Function(HostFunction),
}

impl HostValue {
    /// Wrap a native class instance
    pub fn object<T: HostClass>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// Host-visible type name, used in conversion errors
    pub fn type_name(&self) -> Cow<'_, str> {
        match self {
            Self::None => Cow::Borrowed("NoneType"),
            Self::Bool(_) => Cow::Borrowed("bool"),
            Self::Int(_) => Cow::Borrowed("int"),
            Self::Float(_) => Cow::Borrowed("float"),
            Self::Str(_) => Cow::Borrowed("str"),
            Self::Bytes(_) => Cow::Borrowed("bytes"),
            Self::List(_) => Cow::Borrowed("list"),
            Self::Tuple(_) => Cow::Borrowed("tuple"),
            Self::Object(obj) => obj.class_name(),
            Self::Function(_) => Cow::Borrowed("function"),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostClass>> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Downcast an `Object` to a concrete native class
    pub fn downcast_ref<T: HostClass>(&self) -> Option<&T> {
        self.as_object()
            .and_then(|obj| obj.as_any().downcast_ref::<T>())
    }

    /// Sequence protocol of a native class instance, if it has one
    pub fn as_sequence(&self) -> Option<&dyn HostSequence> {
        self.as_object().and_then(|obj| obj.as_sequence())
    }

    /// Positional elements, if the value is host-iterable
    ///
    /// Lists and tuples are borrowed; native sequence objects are read into a
    /// fresh buffer. Strings are not iterable.
    pub fn items(&self) -> Option<Cow<'_, [HostValue]>> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(Cow::Borrowed(items.as_slice())),
            Self::Object(obj) => obj
                .as_sequence()
                .and_then(|seq| seq.values().ok())
                .map(Cow::Owned),
            _ => None,
        }
    }

    /// Numeric view used for host-level equality (bool and int compare as numbers)
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Object(a), Self::Object(b)) if same_object(a, b) => true,
            (Self::Object(a), _) => a.host_eq(other).unwrap_or(false),
            (_, Self::Object(b)) => b.host_eq(self).unwrap_or(false),
            (Self::Function(a), Self::Function(b)) => a.same_as(b),
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

/// Identity comparison of two class instances (data pointer only)
#[inline]
pub(crate) fn same_object(a: &Arc<dyn HostClass>, b: &Arc<dyn HostClass>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Int(i128::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        Self::List(items)
    }
}

impl From<HostFunction> for HostValue {
    fn from(function: HostFunction) -> Self {
        Self::Function(function)
    }
}
