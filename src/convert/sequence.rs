//! Native sequences and their host class
//!
//! Design: `Vector<T>` is a shared handle to `RwLock<Vec<T>>`. The host holds
//! one as an object of class `Vector_<name>`; native code receives either a
//! copy (`Vec<T>`) or the shared handle itself. Locks are only ever tried;
//! a held lock means an exported array view is alive and the access fails
//! with `BridgeError::Exported`.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::array::{ArrayView, HostArray};
use super::element::{ArrayElement, DType, Element};
use super::{FromHost, IntoHost};
use crate::errors::{BridgeError, HostError};
use crate::host::{HostClass, HostSequence, HostValue};

/// Sequences at least this long are compared on the rayon pool
#[cfg(feature = "parallel")]
const PARALLEL_EQ_THRESHOLD: usize = 1 << 16;

/// Structural equality: same length and pairwise equal elements
pub fn equals<T: Element>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && pairwise_equal(a, b)
}

#[cfg(feature = "parallel")]
fn pairwise_equal<T: Element>(a: &[T], b: &[T]) -> bool {
    use rayon::prelude::*;

    if a.len() >= PARALLEL_EQ_THRESHOLD {
        a.par_iter().zip(b.par_iter()).all(|(x, y)| x == y)
    } else {
        a.iter().zip(b).all(|(x, y)| x == y)
    }
}

#[cfg(not(feature = "parallel"))]
fn pairwise_equal<T: Element>(a: &[T], b: &[T]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

/// Always the negation of `equals`
pub fn not_equals<T: Element>(a: &[T], b: &[T]) -> bool {
    !equals(a, b)
}

/// A native, resizable, homogeneous sequence shared with the host
pub struct Vector<T: Element> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T: Element> Vector<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }

    /// Host class name, e.g. `Vector_int32_t`
    pub fn class_name() -> String {
        format!("Vector_{}", T::NAME.replace(' ', "_"))
    }

    /// Wrap in a host object; the host now shares this storage
    pub fn into_host(self) -> HostValue {
        HostValue::object(self)
    }

    pub fn len(&self) -> Result<usize, BridgeError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, BridgeError> {
        Ok(self.read()?.is_empty())
    }

    /// Copy of the current contents
    pub fn to_vec(&self) -> Result<Vec<T>, BridgeError> {
        Ok(self.read()?.clone())
    }

    pub fn get(&self, index: isize) -> Result<T, BridgeError> {
        let values = self.read()?;
        let i = normalize_index(index, values.len())?;
        Ok(values[i].clone())
    }

    pub fn set(&self, index: isize, value: T) -> Result<(), BridgeError> {
        let mut values = self.write()?;
        let i = normalize_index(index, values.len())?;
        values[i] = value;
        Ok(())
    }

    pub fn push(&self, value: T) -> Result<(), BridgeError> {
        self.write()?.push(value);
        Ok(())
    }

    pub fn remove(&self, index: isize) -> Result<T, BridgeError> {
        let mut values = self.write()?;
        let i = normalize_index(index, values.len())?;
        Ok(values.remove(i))
    }

    /// New vector holding the elements selected by a host slice
    pub fn slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    ) -> Result<Self, BridgeError> {
        let values = self.read()?;
        let picked = slice_indices(values.len(), start, stop, step)?
            .into_iter()
            .map(|i| values[i].clone())
            .collect();
        Ok(Self::from_vec(picked))
    }

    pub fn equals(&self, other: &Self) -> Result<bool, BridgeError> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Ok(true);
        }
        Ok(equals(&self.read()?, &other.read()?))
    }

    pub fn not_equals(&self, other: &Self) -> Result<bool, BridgeError> {
        self.equals(other).map(|eq| !eq)
    }

    /// True when both handles share the same storage
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<T>>, BridgeError> {
        self.inner.try_read().ok_or_else(exported::<T>)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<T>>, BridgeError> {
        self.inner.try_write().ok_or_else(exported::<T>)
    }

    /// Host `==`: same-class vectors and convertible host iterables compare
    /// by value; other sequence classes are unsupported, not unequal
    fn compare(&self, other: &HostValue) -> Result<bool, BridgeError> {
        if let Some(vector) = other.downcast_ref::<Self>() {
            return self.equals(vector);
        }
        if other.as_sequence().is_none() && <Vec<T> as FromHost>::convertible(other) {
            let values = <Vec<T> as FromHost>::construct(other)?;
            return Ok(equals(&self.read()?, &values));
        }
        Err(BridgeError::NotImplemented(format!(
            "cannot compare {} with {}",
            Self::class_name(),
            other.type_name()
        )))
    }
}

impl<T: ArrayElement> Vector<T> {
    /// Zero-copy mutable view over the backing storage
    ///
    /// The view holds the vector's write lock: until it is dropped the vector
    /// cannot be read, resized or exported again through any handle.
    pub fn export_array(&self) -> Result<ArrayView<T>, BridgeError> {
        self.inner
            .try_write_arc()
            .map(ArrayView::new)
            .ok_or_else(exported::<T>)
    }

    /// Export as a host object of class `Array_<name>`
    pub fn export_host_array(&self) -> Result<HostValue, BridgeError> {
        Ok(HostValue::object(HostArray::new(self.export_array()?)))
    }
}

fn extract_element<T: Element>(value: &HostValue) -> Result<T, BridgeError> {
    T::extract(value).ok_or_else(|| BridgeError::conversion(T::NAME, value))
}

fn exported<T: Element>() -> BridgeError {
    BridgeError::Exported {
        class: Vector::<T>::class_name(),
    }
}

/// Resolve a possibly negative host index
pub(super) fn normalize_index(index: isize, len: usize) -> Result<usize, BridgeError> {
    let resolved = if index < 0 {
        index + len as isize
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(BridgeError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

/// Indices selected by a host slice over a sequence of length `len`
pub(super) fn slice_indices(
    len: usize,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> Result<Vec<usize>, BridgeError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(BridgeError::InvalidArgument(
            "slice step cannot be zero".to_owned(),
        ));
    }
    let len = len as isize;
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let clamp = |bound: Option<isize>, default: isize| match bound {
        None => default,
        Some(v) if v < 0 => (v + len).max(lower),
        Some(v) => v.min(upper),
    };
    let (start, stop) = if step < 0 {
        (clamp(start, upper), clamp(stop, lower))
    } else {
        (clamp(start, lower), clamp(stop, upper))
    };

    let mut picked = Vec::new();
    let mut next = Some(start);
    while let Some(i) = next {
        if (step > 0 && i >= stop) || (step < 0 && i <= stop) {
            break;
        }
        picked.push(i as usize);
        next = i.checked_add(step);
    }
    Ok(picked)
}

impl<T: Element> Clone for Vector<T> {
    /// Another handle to the same storage
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> From<Vec<T>> for Vector<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Element> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_read() {
            Some(values) => write!(f, "{}({:?})", Self::class_name(), *values),
            None => write!(f, "{}(<exported>)", Self::class_name()),
        }
    }
}

impl<T: Element> HostClass for Vector<T> {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Owned(Self::class_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn host_eq(&self, other: &HostValue) -> Result<bool, HostError> {
        Ok(self.compare(other)?)
    }

    fn as_sequence(&self) -> Option<&dyn HostSequence> {
        Some(self)
    }
}

impl<T: Element> HostSequence for Vector<T> {
    fn len(&self) -> Result<usize, HostError> {
        Ok(Vector::len(self)?)
    }

    fn get_item(&self, index: isize) -> Result<HostValue, HostError> {
        Ok(self.get(index)?.to_host())
    }

    fn set_item(&self, index: isize, value: &HostValue) -> Result<(), HostError> {
        let value = extract_element::<T>(value)?;
        Ok(self.set(index, value)?)
    }

    fn del_item(&self, index: isize) -> Result<(), HostError> {
        self.remove(index)?;
        Ok(())
    }

    fn append(&self, value: &HostValue) -> Result<(), HostError> {
        let value = extract_element::<T>(value)?;
        Ok(self.push(value)?)
    }

    fn extend(&self, values: &HostValue) -> Result<(), HostError> {
        // Convert everything before touching the storage
        let values = <Vec<T> as FromHost>::from_host(values)?;
        self.write()?.extend(values);
        Ok(())
    }

    fn get_slice(
        &self,
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    ) -> Result<HostValue, HostError> {
        Ok(self.slice(start, stop, step)?.into_host())
    }

    fn contains(&self, value: &HostValue) -> Result<bool, HostError> {
        Ok(match T::extract(value) {
            Some(needle) => self.read()?.contains(&needle),
            None => false,
        })
    }

    fn values(&self) -> Result<Vec<HostValue>, HostError> {
        Ok(self.read()?.iter().map(Element::to_host).collect())
    }

    fn host_ne(&self, other: &HostValue) -> Result<bool, HostError> {
        Ok(!self.compare(other)?)
    }

    fn array_dtype(&self) -> Option<DType> {
        T::dtype()
    }

    fn export_array(&self) -> Result<HostValue, HostError> {
        Ok(T::export_host(self)?)
    }
}

/// Copying conversion from any host iterable whose elements all convert
impl<T: Element> FromHost for Vec<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("vector<{}>", T::NAME))
    }

    fn convertible(value: &HostValue) -> bool {
        if let Some(vector) = value.downcast_ref::<Vector<T>>() {
            return vector.read().is_ok();
        }
        match value.items() {
            Some(items) => items.iter().all(|item| T::extract(item).is_some()),
            None => false,
        }
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        if let Some(vector) = value.downcast_ref::<Vector<T>>() {
            return vector.to_vec();
        }
        let items = value
            .items()
            .ok_or_else(|| BridgeError::conversion(Self::type_name(), value))?;
        items
            .iter()
            .map(extract_element::<T>)
            .collect()
    }
}

impl<T: Element> IntoHost for Vec<T> {
    fn into_host(self) -> HostValue {
        Vector::from_vec(self).into_host()
    }
}

/// Shared-handle conversion: only an existing `Vector_<name>` object qualifies
impl<T: Element> FromHost for Vector<T> {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(Self::class_name())
    }

    fn convertible(value: &HostValue) -> bool {
        value.downcast_ref::<Self>().is_some()
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        value
            .downcast_ref::<Self>()
            .cloned()
            .ok_or_else(|| BridgeError::conversion(Self::class_name(), value))
    }
}

impl<T: Element> IntoHost for Vector<T> {
    fn into_host(self) -> HostValue {
        Vector::into_host(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i128]) -> HostValue {
        HostValue::List(values.iter().map(|&v| HostValue::Int(v)).collect())
    }

    #[test]
    fn test_class_names() {
        assert_eq!(Vector::<i32>::class_name(), "Vector_int32_t");
        assert_eq!(Vector::<f64>::class_name(), "Vector_double");
        assert_eq!(Vector::<String>::class_name(), "Vector_string");
    }

    #[test]
    fn test_from_host_copies_in_order() {
        let values = <Vec<i64> as FromHost>::from_host(&ints(&[3, 1, 2])).unwrap();
        assert_eq!(values, vec![3, 1, 2]);

        let tuple = HostValue::Tuple(vec![HostValue::Float(0.5), HostValue::Int(2)]);
        let values = <Vec<f64> as FromHost>::from_host(&tuple).unwrap();
        assert_eq!(values, vec![0.5, 2.0]);
    }

    #[test]
    fn test_from_host_is_all_or_nothing() {
        let mixed = HostValue::List(vec![HostValue::Int(1), HostValue::from("x")]);
        assert!(!<Vec<i32> as FromHost>::convertible(&mixed));
        assert!(matches!(
            <Vec<i32> as FromHost>::from_host(&mixed),
            Err(BridgeError::TypeConversion { .. })
        ));
        assert!(!<Vec<i32> as FromHost>::convertible(&HostValue::Int(1)));
    }

    #[test]
    fn test_host_round_trip() {
        let source = ints(&[5, -4, 9]);
        let native = <Vec<i32> as FromHost>::from_host(&source).unwrap();
        let host = native.into_host();
        let seq = host.as_sequence().unwrap();
        assert_eq!(seq.values().unwrap(), source.items().unwrap().to_vec());
        assert_eq!(host, source);
    }

    #[test]
    fn test_indexing_protocol() {
        let host = vec![1_i32, 2, 3].into_host();
        let seq = host.as_sequence().unwrap();

        assert_eq!(seq.len().unwrap(), 3);
        assert_eq!(seq.get_item(-1).unwrap(), HostValue::Int(3));
        seq.set_item(0, &HostValue::Int(10)).unwrap();
        seq.append(&HostValue::Int(4)).unwrap();
        assert_eq!(seq.values().unwrap(), ints(&[10, 2, 3, 4]).items().unwrap().to_vec());

        assert!(matches!(
            seq.get_item(4).map_err(|e| e.kind()),
            Err(crate::errors::HostErrorKind::Index)
        ));
        assert!(seq.set_item(0, &HostValue::from("no")).is_err());
        assert_eq!(seq.get_item(0).unwrap(), HostValue::Int(10));

        seq.del_item(1).unwrap();
        assert!(seq.contains(&HostValue::Int(3)).unwrap());
        assert!(!seq.contains(&HostValue::Int(2)).unwrap());
        assert!(!seq.contains(&HostValue::from("3")).unwrap());
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let vector = Vector::from_vec(vec![1_u8]);
        let bad = HostValue::List(vec![HostValue::Int(2), HostValue::Int(300)]);
        assert!(HostSequence::extend(&vector, &bad).is_err());
        assert_eq!(vector.to_vec().unwrap(), vec![1]);

        HostSequence::extend(&vector, &ints(&[2, 3])).unwrap();
        assert_eq!(vector.to_vec().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_slices() {
        let vector = Vector::from_vec((0..6).collect::<Vec<i64>>());
        let pick = |start, stop, step| vector.slice(start, stop, step).unwrap().to_vec().unwrap();

        assert_eq!(pick(Some(1), Some(4), None), vec![1, 2, 3]);
        assert_eq!(pick(None, None, Some(2)), vec![0, 2, 4]);
        assert_eq!(pick(None, None, Some(-1)), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(pick(Some(-2), None, None), vec![4, 5]);
        assert_eq!(pick(Some(10), None, None), Vec::<i64>::new());
        assert_eq!(pick(Some(4), Some(1), Some(-2)), vec![4, 2]);
        assert!(matches!(
            vector.slice(None, None, Some(0)),
            Err(BridgeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_slices_with_extreme_steps() {
        let vector = Vector::from_vec((0..6).collect::<Vec<i64>>());
        let pick = |start, stop, step| vector.slice(start, stop, step).unwrap().to_vec().unwrap();

        assert_eq!(pick(Some(1), None, Some(isize::MAX)), vec![1]);
        assert_eq!(pick(None, None, Some(isize::MAX)), vec![0]);
        assert_eq!(pick(Some(4), None, Some(isize::MIN)), vec![4]);
        assert_eq!(pick(None, None, Some(isize::MIN)), vec![5]);
        assert_eq!(pick(Some(isize::MIN), Some(isize::MAX), Some(isize::MAX)), vec![0]);

        let host = vector.clone().into_host();
        let sliced = host
            .as_sequence()
            .unwrap()
            .get_slice(Some(1), None, Some(isize::MAX))
            .unwrap();
        assert_eq!(sliced, HostValue::List(vec![HostValue::Int(1)]));
    }

    #[test]
    fn test_equality_laws() {
        let a = Vector::from_vec(vec![1.0, 2.0]);
        let b = Vector::from_vec(vec![1.0, 2.0]);
        let c = Vector::from_vec(vec![1.0]);
        for (x, y) in [(&a, &b), (&a, &c), (&c, &c)] {
            assert_eq!(x.equals(y).unwrap(), !x.not_equals(y).unwrap());
        }
        assert!(a.equals(&b).unwrap());
        assert!(!a.equals(&c).unwrap());
    }

    #[test]
    fn test_cross_type_comparison_is_unsupported() {
        let ints = vec![1_i32, 2].into_host();
        let floats = vec![1.0_f64, 2.0].into_host();
        let err = ints.as_object().unwrap().host_eq(&floats).unwrap_err();
        assert_eq!(err.kind(), crate::errors::HostErrorKind::NotImplemented);
        assert!(ints.as_sequence().unwrap().host_ne(&floats).is_err());
    }

    #[test]
    fn test_compare_with_host_list() {
        let host = vec![1_i32, 2].into_host();
        assert_eq!(host, HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]));
        assert!(host.as_sequence().unwrap().host_ne(&HostValue::List(vec![])).unwrap());
    }

    #[test]
    fn test_shared_handle_conversion() {
        let host = vec![7_u64].into_host();
        let shared = <Vector<u64> as FromHost>::from_host(&host).unwrap();
        shared.push(8).unwrap();
        assert_eq!(host.as_sequence().unwrap().len().unwrap(), 2);

        let copy = <Vec<u64> as FromHost>::from_host(&host).unwrap();
        shared.push(9).unwrap();
        assert_eq!(copy, vec![7, 8]);

        assert!(!<Vector<u64> as FromHost>::convertible(&HostValue::List(vec![])));
    }
}
