//! Value conversion between native types and host values
//!
//! Architecture:
//! - `element.rs` - the statically enumerated element types and their layouts
//! - `registry.rs` - per-type convertible/construct pairs keyed by `TypeId`
//! - `sequence.rs` - `Vector<T>`, the host-visible native sequence class
//! - `array.rs` - zero-copy buffer views over numeric vectors
//! - `pair.rs` - two-element tuples
//! - `variant.rs` - first-match tagged-union probing
//! - `selector.rs` - degree selectors, `any` handles and engine handles

mod array;
mod element;
mod pair;
mod registry;
mod selector;
mod sequence;
mod variant;

pub use array::{ArrayView, HostArray};
pub use element::{ArrayElement, DType, DTypeKind, Element};
pub use registry::{ConverterRegistry, EntryKind};
pub use selector::{AnyHandle, Degree, DegreeSelector, Handle};
pub use sequence::{equals, not_equals, Vector};
pub use variant::{Alternative, VariantAdapter};

pub(crate) use element::for_each_element;

use std::borrow::Cow;

use crate::errors::BridgeError;
use crate::host::HostValue;

/// Host → native conversion for a registered type
pub trait FromHost: Sized + Send + 'static {
    /// Canonical native type name
    fn type_name() -> Cow<'static, str>;

    /// Whether `value` can be converted, without converting it
    fn convertible(value: &HostValue) -> bool;

    /// Perform the conversion; only meaningful after `convertible` accepted `value`
    fn construct(value: &HostValue) -> Result<Self, BridgeError>;

    /// Checked conversion
    fn from_host(value: &HostValue) -> Result<Self, BridgeError> {
        if !Self::convertible(value) {
            return Err(BridgeError::conversion(Self::type_name(), value));
        }
        Self::construct(value)
    }
}

/// Native → host conversion
pub trait IntoHost {
    fn into_host(self) -> HostValue;
}

impl IntoHost for HostValue {
    fn into_host(self) -> HostValue {
        self
    }
}

impl IntoHost for () {
    fn into_host(self) -> HostValue {
        HostValue::None
    }
}

/// Host values pass through unchanged (the host's generic `object`)
impl FromHost for HostValue {
    fn type_name() -> Cow<'static, str> {
        Cow::Borrowed("object")
    }

    fn convertible(_value: &HostValue) -> bool {
        true
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        Ok(value.clone())
    }
}
