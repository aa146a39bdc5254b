//! Zero-copy array export
//!
//! An `ArrayView` aliases a vector's backing storage directly. It owns the
//! vector's write guard, so the storage cannot move or be resized while the
//! view lives, and dropping the view is what releases it.
//!
//! `HostArray` hands a view to the host as an object of class
//! `Array_<name>`. The host reads the buffer layout through its `typestr`,
//! `shape`, `strides` and `data` attributes; releasing the object (or
//! dropping the last host reference) unlocks the vector.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{ArcRwLockWriteGuard, Mutex, RawRwLock};

use super::element::{ArrayElement, DType, Element};
use super::sequence::{normalize_index, slice_indices, Vector};
use crate::errors::{BridgeError, HostError};
use crate::host::{HostClass, HostSequence, HostValue};

/// Mutable, non-owning buffer over a `Vector<T>`'s elements
pub struct ArrayView<T: ArrayElement> {
    guard: ArcRwLockWriteGuard<RawRwLock, Vec<T>>,
}

impl<T: ArrayElement> ArrayView<T> {
    pub(super) fn new(guard: ArcRwLockWriteGuard<RawRwLock, Vec<T>>) -> Self {
        Self { guard }
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// One-dimensional shape
    pub fn shape(&self) -> [usize; 1] {
        [self.guard.len()]
    }

    /// Byte stride between consecutive elements
    pub fn strides(&self) -> [usize; 1] {
        [T::DTYPE.itemsize]
    }

    /// Total size of the viewed storage in bytes
    pub fn nbytes(&self) -> usize {
        self.guard.len() * T::DTYPE.itemsize
    }

    pub fn as_slice(&self) -> &[T] {
        &self.guard
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.guard
    }

    /// Raw data pointer, valid while the view is alive
    pub fn as_ptr(&self) -> *const T {
        self.guard.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.guard.as_mut_ptr()
    }
}

impl<T: ArrayElement> Deref for ArrayView<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: ArrayElement> DerefMut for ArrayView<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: ArrayElement> fmt::Debug for ArrayView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("dtype", &T::DTYPE.typestr())
            .field("len", &self.len())
            .finish()
    }
}

/// An exported view held by the host
pub struct HostArray<T: ArrayElement> {
    view: Mutex<Option<ArrayView<T>>>,
}

impl<T: ArrayElement> HostArray<T> {
    pub fn new(view: ArrayView<T>) -> Self {
        Self {
            view: Mutex::new(Some(view)),
        }
    }

    /// Host class name, e.g. `Array_double`
    pub fn class_name() -> String {
        format!("Array_{}", T::NAME)
    }

    /// Give the vector back; returns false if already released
    pub fn release(&self) -> bool {
        self.view.lock().take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.view.lock().is_none()
    }

    fn with_view<R>(
        &self,
        f: impl FnOnce(&mut ArrayView<T>) -> Result<R, BridgeError>,
    ) -> Result<R, BridgeError> {
        match self.view.lock().as_mut() {
            Some(view) => f(view),
            None => Err(BridgeError::InvalidArgument(format!(
                "{} was released",
                Self::class_name()
            ))),
        }
    }

    fn fixed_size() -> HostError {
        BridgeError::InvalidArgument(format!("{} cannot be resized", Self::class_name())).into()
    }
}

impl<T: ArrayElement> fmt::Debug for HostArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view.lock().as_ref() {
            Some(view) => write!(f, "{}({:?})", Self::class_name(), view.as_slice()),
            None => write!(f, "{}(<released>)", Self::class_name()),
        }
    }
}

impl<T: ArrayElement> HostClass for HostArray<T> {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Owned(Self::class_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        let dtype = T::DTYPE;
        let value = match name {
            "typestr" => HostValue::Str(dtype.typestr()),
            "format" => HostValue::from(dtype.format),
            "itemsize" => HostValue::Int(dtype.itemsize as i128),
            "released" => HostValue::Bool(self.is_released()),
            "shape" => self.with_view(|view| {
                Ok(HostValue::Tuple(vec![HostValue::Int(view.len() as i128)]))
            })?,
            "strides" => HostValue::Tuple(vec![HostValue::Int(dtype.itemsize as i128)]),
            "data" => {
                self.with_view(|view| Ok(HostValue::Int(view.as_mut_ptr() as usize as i128)))?
            }
            _ => {
                return Err(BridgeError::UnknownAttribute {
                    class: Self::class_name(),
                    attr: name.to_owned(),
                }
                .into())
            }
        };
        Ok(value)
    }

    fn host_eq(&self, other: &HostValue) -> Result<bool, HostError> {
        let mine = HostSequence::values(self)?;
        Ok(match other.items() {
            Some(items) => *items == *mine,
            None => false,
        })
    }

    fn as_sequence(&self) -> Option<&dyn HostSequence> {
        Some(self)
    }
}

impl<T: ArrayElement> HostSequence for HostArray<T> {
    fn len(&self) -> Result<usize, HostError> {
        Ok(self.with_view(|view| Ok(view.len()))?)
    }

    fn get_item(&self, index: isize) -> Result<HostValue, HostError> {
        Ok(self.with_view(|view| {
            let i = normalize_index(index, view.len())?;
            Ok(view[i].to_host())
        })?)
    }

    fn set_item(&self, index: isize, value: &HostValue) -> Result<(), HostError> {
        let value = T::extract(value).ok_or_else(|| BridgeError::conversion(T::NAME, value))?;
        Ok(self.with_view(|view| {
            let i = normalize_index(index, view.len())?;
            view[i] = value;
            Ok(())
        })?)
    }

    fn del_item(&self, _index: isize) -> Result<(), HostError> {
        Err(Self::fixed_size())
    }

    fn append(&self, _value: &HostValue) -> Result<(), HostError> {
        Err(Self::fixed_size())
    }

    fn extend(&self, _values: &HostValue) -> Result<(), HostError> {
        Err(Self::fixed_size())
    }

    fn get_slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    ) -> Result<HostValue, HostError> {
        let picked = self.with_view(|view| {
            Ok(slice_indices(view.len(), start, stop, step)?
                .into_iter()
                .map(|i| view[i])
                .collect::<Vec<T>>())
        })?;
        Ok(Vector::from_vec(picked).into_host())
    }

    fn contains(&self, value: &HostValue) -> Result<bool, HostError> {
        let Some(needle) = T::extract(value) else {
            return Ok(false);
        };
        Ok(self.with_view(|view| Ok(view.contains(&needle)))?)
    }

    fn values(&self) -> Result<Vec<HostValue>, HostError> {
        Ok(self.with_view(|view| Ok(view.iter().map(Element::to_host).collect()))?)
    }

    fn host_ne(&self, other: &HostValue) -> Result<bool, HostError> {
        Ok(!self.host_eq(other)?)
    }

    fn array_dtype(&self) -> Option<DType> {
        Some(T::DTYPE)
    }

    fn release(&self) -> bool {
        HostArray::release(self)
    }
}
