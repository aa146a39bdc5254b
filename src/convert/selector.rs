//! Degree selectors, type-erased property handles and engine handles

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::variant::{Alternative, VariantAdapter};
use super::{FromHost, IntoHost};
use crate::errors::{BridgeError, HostError};
use crate::host::{HostClass, HostValue};

/// Which incident edges a degree counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Degree {
    In,
    Out,
    Total,
}

impl Degree {
    pub const ALL: [Self; 3] = [Self::In, Self::Out, Self::Total];

    pub const fn name(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::Out => "Out",
            Self::Total => "Total",
        }
    }

    pub const fn value(self) -> i64 {
        match self {
            Self::In => 0,
            Self::Out => 1,
            Self::Total => 2,
        }
    }
}

impl HostClass for Degree {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed("Degree")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        match name {
            "name" => Ok(HostValue::from(self.name())),
            "value" => Ok(HostValue::from(self.value())),
            _ => Err(BridgeError::UnknownAttribute {
                class: "Degree".to_owned(),
                attr: name.to_owned(),
            }
            .into()),
        }
    }

    fn host_eq(&self, other: &HostValue) -> Result<bool, HostError> {
        Ok(other.downcast_ref::<Self>() == Some(self))
    }
}

/// Only `Degree` enum values convert; plain ints do not
impl FromHost for Degree {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("degree_t")
    }

    fn convertible(value: &HostValue) -> bool {
        value.downcast_ref::<Self>().is_some()
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        value
            .downcast_ref::<Self>()
            .copied()
            .ok_or_else(|| BridgeError::conversion("degree_t", value))
    }
}

impl IntoHost for Degree {
    fn into_host(self) -> HostValue {
        HostValue::object(self)
    }
}

/// A type-erased native value, possibly empty
///
/// The host passes `None` where an absent property is meant; it converts to
/// an empty handle.
#[derive(Clone, Default)]
pub struct AnyHandle {
    value: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl AnyHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Name of the held type, empty for an empty handle
    pub fn held_type(&self) -> &'static str {
        self.type_name
    }

    pub fn holds<T: Any>(&self) -> bool {
        self.value
            .as_ref()
            .is_some_and(|v| (**v).type_id() == TypeId::of::<T>())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl fmt::Debug for AnyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("any(<empty>)")
        } else {
            write!(f, "any({})", self.type_name)
        }
    }
}

impl HostClass for AnyHandle {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed("any")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FromHost for AnyHandle {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("any")
    }

    fn convertible(value: &HostValue) -> bool {
        value.is_none() || value.downcast_ref::<Self>().is_some()
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        if value.is_none() {
            return Ok(Self::empty());
        }
        value
            .downcast_ref::<Self>()
            .cloned()
            .ok_or_else(|| BridgeError::conversion("any", value))
    }
}

impl IntoHost for AnyHandle {
    fn into_host(self) -> HostValue {
        if self.is_empty() {
            HostValue::None
        } else {
            HostValue::object(self)
        }
    }
}

/// Degree argument of engine operations: a built-in degree or a scalar
/// vertex property used as the degree
#[derive(Debug, Clone)]
pub enum DegreeSelector {
    Degree(Degree),
    Property(AnyHandle),
}

impl DegreeSelector {
    /// Conversion priority list; the enum alternative is the more specific one
    pub fn adapter() -> VariantAdapter<Self> {
        VariantAdapter::new("deg_t")
            .alternative(Alternative::of::<Degree>())
            .alternative(Alternative::of::<AnyHandle>())
    }
}

impl From<Degree> for DegreeSelector {
    fn from(degree: Degree) -> Self {
        Self::Degree(degree)
    }
}

impl From<AnyHandle> for DegreeSelector {
    fn from(handle: AnyHandle) -> Self {
        Self::Property(handle)
    }
}

impl IntoHost for DegreeSelector {
    fn into_host(self) -> HostValue {
        match self {
            Self::Degree(degree) => degree.into_host(),
            Self::Property(handle) => handle.into_host(),
        }
    }
}

/// Shared handle to a native engine object held by the host
pub struct Handle<E: HostClass> {
    object: Arc<dyn HostClass>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: HostClass> Handle<E> {
    pub fn new(engine: E) -> Self {
        Self {
            object: Arc::new(engine),
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> &E {
        match self.object.as_any().downcast_ref::<E>() {
            Some(engine) => engine,
            // Every constructor checks the concrete type
            None => unreachable!("handle holds a {}", self.object.class_name()),
        }
    }
}

impl<E: HostClass> Clone for Handle<E> {
    fn clone(&self) -> Self {
        Self {
            object: Arc::clone(&self.object),
            _marker: PhantomData,
        }
    }
}

impl<E: HostClass> std::ops::Deref for Handle<E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.get()
    }
}

impl<E: HostClass> fmt::Debug for Handle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.object).finish()
    }
}

impl<E: HostClass> FromHost for Handle<E> {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<E>())
    }

    fn convertible(value: &HostValue) -> bool {
        value.downcast_ref::<E>().is_some()
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        match value.as_object() {
            Some(object) if object.as_any().is::<E>() => Ok(Self {
                object: Arc::clone(object),
                _marker: PhantomData,
            }),
            _ => Err(BridgeError::conversion(Self::type_name(), value)),
        }
    }
}

impl<E: HostClass> IntoHost for Handle<E> {
    fn into_host(self) -> HostValue {
        HostValue::Object(self.object)
    }
}
