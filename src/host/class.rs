//! Native classes visible to the host
//!
//! Every natively implemented object the host can hold (vectors, engine
//! handles, enum values, metadata) implements `HostClass`. Indexable
//! containers additionally expose `HostSequence`.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use super::HostValue;
use crate::convert::DType;
use crate::errors::{BridgeError, HostError};

/// A natively implemented class instance held by the host
pub trait HostClass: Any + Send + Sync + fmt::Debug {
    /// Host-visible class name
    fn class_name(&self) -> Cow<'_, str>;

    fn as_any(&self) -> &dyn Any;

    /// Read a named attribute
    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        Err(BridgeError::UnknownAttribute {
            class: self.class_name().into_owned(),
            attr: name.to_owned(),
        }
        .into())
    }

    /// Write a named attribute
    fn set_attr(&self, name: &str, _value: HostValue) -> Result<(), HostError> {
        Err(BridgeError::ReadOnlyAttribute {
            class: self.class_name().into_owned(),
            attr: name.to_owned(),
        }
        .into())
    }

    /// Host `==` against an arbitrary value; identity is checked by the caller
    fn host_eq(&self, _other: &HostValue) -> Result<bool, HostError> {
        Ok(false)
    }

    fn as_sequence(&self) -> Option<&dyn HostSequence> {
        None
    }
}

/// The indexable-container contract the host expects from sequence classes
///
/// All methods take `&self`: instances are shared between host references and
/// guard their storage internally.
pub trait HostSequence {
    fn len(&self) -> Result<usize, HostError>;

    fn is_empty(&self) -> Result<bool, HostError> {
        Ok(self.len()? == 0)
    }

    /// Element at `index`; negative indices count from the end
    fn get_item(&self, index: isize) -> Result<HostValue, HostError>;

    fn set_item(&self, index: isize, value: &HostValue) -> Result<(), HostError>;

    fn del_item(&self, index: isize) -> Result<(), HostError>;

    fn append(&self, value: &HostValue) -> Result<(), HostError>;

    /// Append every element of a host iterable, or nothing if any element fails
    fn extend(&self, values: &HostValue) -> Result<(), HostError>;

    /// Copy of the elements selected by a host slice
    fn get_slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    ) -> Result<HostValue, HostError>;

    fn contains(&self, value: &HostValue) -> Result<bool, HostError>;

    /// Every element converted to a host value, in order
    fn values(&self) -> Result<Vec<HostValue>, HostError>;

    /// Host `!=`, always the negation of `host_eq`
    fn host_ne(&self, other: &HostValue) -> Result<bool, HostError>;

    /// Buffer layout when the element type supports zero-copy export
    fn array_dtype(&self) -> Option<DType>;

    /// Zero-copy buffer object over the storage
    ///
    /// The sequence stays locked until the returned object is released or
    /// its last host reference is dropped.
    fn export_array(&self) -> Result<HostValue, HostError> {
        Err(BridgeError::NotImplemented("sequence does not support array export".to_owned()).into())
    }

    /// Drop an exported buffer's hold on its vector; false if nothing was held
    fn release(&self) -> bool {
        false
    }
}
