//! CPython binding of the bridge
//!
//! Python objects are converted to `HostValue`s at the boundary and back;
//! native class instances travel as `NativeObject` wrappers sharing the
//! underlying object.

use std::sync::Arc;

use pyo3::exceptions::{
    PyAttributeError, PyIOError, PyIndexError, PyNotImplementedError, PyRuntimeError, PyTypeError,
    PyValueError,
};
use pyo3::prelude::*;
use pyo3::pyclass::CompareOp;
use pyo3::types::{
    PyBool, PyBytes, PyDict, PyFloat, PyList, PyLong, PySlice, PyString, PyTuple,
};

use crate::bridge::{self, Bridge, BridgeBuilder};
use crate::config::BridgeConfig;
use crate::convert::{for_each_element, Degree, IntoHost, Vector};
use crate::errors::{BridgeError, HostError, HostErrorKind};
use crate::host::{HostClass, HostFunction, HostSequence, HostValue};

fn to_py_err(py: Python<'_>, err: HostError) -> PyErr {
    let message = err.message().to_owned();
    let py_err = match err.kind() {
        HostErrorKind::Runtime => PyRuntimeError::new_err(message.clone()),
        HostErrorKind::Io => PyIOError::new_err(message.clone()),
        HostErrorKind::Value => PyValueError::new_err(message.clone()),
        HostErrorKind::Type => PyTypeError::new_err(message.clone()),
        HostErrorKind::Index => PyIndexError::new_err(message.clone()),
        HostErrorKind::Attribute => PyAttributeError::new_err(message.clone()),
        HostErrorKind::NotImplemented => PyNotImplementedError::new_err(message.clone()),
    };
    // Best effort; some builtin exception types reject new attributes
    let _ = py_err.value(py).setattr("message", message);
    py_err
}

/// Nearest class in the exception's MRO with a host category
fn exception_kind(py: Python<'_>, err: &PyErr) -> Option<HostErrorKind> {
    let mro = err.get_type(py).getattr("__mro__").ok()?;
    mro.iter().ok()?.flatten().find_map(|class| {
        let name = class.getattr("__name__").ok()?.extract::<String>().ok()?;
        HostErrorKind::from_host_name(&name)
    })
}

fn from_py_err(py: Python<'_>, err: PyErr) -> HostError {
    let message = err.value(py).to_string();
    let kind = exception_kind(py, &err).unwrap_or(HostErrorKind::Runtime);
    HostError::new(kind, message)
}

/// Python object → host value
pub fn to_host(obj: &PyAny) -> PyResult<HostValue> {
    if obj.is_none() {
        return Ok(HostValue::None);
    }
    if let Ok(b) = obj.downcast::<PyBool>() {
        return Ok(HostValue::Bool(b.is_true()));
    }
    if obj.is_instance_of::<PyLong>() {
        return Ok(HostValue::Int(obj.extract::<i128>()?));
    }
    if let Ok(f) = obj.downcast::<PyFloat>() {
        return Ok(HostValue::Float(f.value()));
    }
    if let Ok(s) = obj.downcast::<PyString>() {
        return Ok(HostValue::Str(s.to_str()?.to_owned()));
    }
    if let Ok(bytes) = obj.downcast::<PyBytes>() {
        return Ok(HostValue::Bytes(bytes.as_bytes().to_vec()));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        return list.iter().map(to_host).collect::<PyResult<_>>().map(HostValue::List);
    }
    if let Ok(tuple) = obj.downcast::<PyTuple>() {
        return tuple.iter().map(to_host).collect::<PyResult<_>>().map(HostValue::Tuple);
    }
    if let Ok(native) = obj.extract::<PyRef<'_, NativeObject>>() {
        return Ok(HostValue::Object(Arc::clone(&native.inner)));
    }
    if let Ok(function) = obj.extract::<PyRef<'_, NativeFunction>>() {
        return Ok(HostValue::Function(function.inner.clone()));
    }
    if obj.is_callable() {
        let name = obj
            .getattr("__name__")
            .and_then(|n| n.extract::<String>())
            .unwrap_or_else(|_| "<callable>".to_owned());
        let callable: PyObject = obj.into();
        return Ok(HostValue::Function(HostFunction::new(name, move |args| {
            Python::with_gil(|py| {
                let args = PyTuple::new(py, args.iter().map(|a| to_py(py, a)));
                let result = callable.call1(py, args).map_err(|e| from_py_err(py, e))?;
                to_host(result.as_ref(py)).map_err(|e| from_py_err(py, e))
            })
        })));
    }
    Err(PyTypeError::new_err(format!(
        "cannot pass {} to native code",
        obj.get_type().name()?
    )))
}

/// Host value → Python object
pub fn to_py(py: Python<'_>, value: &HostValue) -> PyObject {
    match value {
        HostValue::None => py.None(),
        HostValue::Bool(b) => b.into_py(py),
        HostValue::Int(i) => i.into_py(py),
        HostValue::Float(f) => f.into_py(py),
        HostValue::Str(s) => s.into_py(py),
        HostValue::Bytes(b) => PyBytes::new(py, b).into(),
        HostValue::List(items) => PyList::new(py, items.iter().map(|v| to_py(py, v))).into(),
        HostValue::Tuple(items) => PyTuple::new(py, items.iter().map(|v| to_py(py, v))).into(),
        HostValue::Object(obj) => NativeObject {
            inner: Arc::clone(obj),
        }
        .into_py(py),
        HostValue::Function(f) => NativeFunction { inner: f.clone() }.into_py(py),
    }
}

/// A natively implemented class instance
#[pyclass(name = "NativeObject", module = "graft_core")]
pub struct NativeObject {
    inner: Arc<dyn HostClass>,
}

impl NativeObject {
    /// NumPy array interface (version 3) of an exported buffer
    fn array_interface(&self, py: Python<'_>) -> PyResult<PyObject> {
        let attr = |name: &str| {
            self.inner
                .get_attr(name)
                .map(|value| to_py(py, &value))
                .map_err(|e| to_py_err(py, e))
        };
        let interface = PyDict::new(py);
        interface.set_item("version", 3)?;
        interface.set_item("typestr", attr("typestr")?)?;
        interface.set_item("shape", attr("shape")?)?;
        interface.set_item("strides", attr("strides")?)?;
        interface.set_item("data", (attr("data")?, false))?;
        Ok(interface.into())
    }

    fn sequence(&self) -> PyResult<&dyn HostSequence> {
        self.inner.as_sequence().ok_or_else(|| {
            PyTypeError::new_err(format!("'{}' object is not a sequence", self.inner.class_name()))
        })
    }
}

#[pymethods]
impl NativeObject {
    fn __getattr__(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        if name == "__array_interface__" {
            return self.array_interface(py);
        }
        let value = self.inner.get_attr(name).map_err(|e| to_py_err(py, e))?;
        Ok(to_py(py, &value))
    }

    /// Zero-copy buffer over a numeric vector
    ///
    /// The vector is locked until the buffer is released or collected.
    fn get_array(&self, py: Python<'_>) -> PyResult<PyObject> {
        let buffer = self.sequence()?.export_array().map_err(|e| to_py_err(py, e))?;
        Ok(to_py(py, &buffer))
    }

    /// Unlock the vector behind an exported buffer
    fn release(&self) -> PyResult<bool> {
        Ok(self.sequence()?.release())
    }

    fn __setattr__(&self, py: Python<'_>, name: &str, value: &PyAny) -> PyResult<()> {
        let value = to_host(value)?;
        self.inner.set_attr(name, value).map_err(|e| to_py_err(py, e))
    }

    fn __len__(&self, py: Python<'_>) -> PyResult<usize> {
        self.sequence()?.len().map_err(|e| to_py_err(py, e))
    }

    fn __getitem__(&self, py: Python<'_>, index: &PyAny) -> PyResult<PyObject> {
        let seq = self.sequence()?;
        let value = if let Ok(slice) = index.downcast::<PySlice>() {
            let start = slice.getattr("start")?.extract::<Option<isize>>()?;
            let stop = slice.getattr("stop")?.extract::<Option<isize>>()?;
            let step = slice.getattr("step")?.extract::<Option<isize>>()?;
            seq.get_slice(start, stop, step)
        } else {
            seq.get_item(index.extract::<isize>()?)
        };
        value.map(|v| to_py(py, &v)).map_err(|e| to_py_err(py, e))
    }

    fn __setitem__(&self, py: Python<'_>, index: isize, value: &PyAny) -> PyResult<()> {
        let value = to_host(value)?;
        self.sequence()?
            .set_item(index, &value)
            .map_err(|e| to_py_err(py, e))
    }

    fn __delitem__(&self, py: Python<'_>, index: isize) -> PyResult<()> {
        self.sequence()?.del_item(index).map_err(|e| to_py_err(py, e))
    }

    fn __contains__(&self, py: Python<'_>, value: &PyAny) -> PyResult<bool> {
        let value = to_host(value)?;
        self.sequence()?.contains(&value).map_err(|e| to_py_err(py, e))
    }

    fn append(&self, py: Python<'_>, value: &PyAny) -> PyResult<()> {
        let value = to_host(value)?;
        self.sequence()?.append(&value).map_err(|e| to_py_err(py, e))
    }

    fn extend(&self, py: Python<'_>, values: &PyAny) -> PyResult<()> {
        let values = to_host(values)?;
        self.sequence()?.extend(&values).map_err(|e| to_py_err(py, e))
    }

    fn __richcmp__(&self, py: Python<'_>, other: &PyAny, op: CompareOp) -> PyResult<PyObject> {
        let other = match to_host(other) {
            Ok(other) => other,
            Err(_) => return Ok(py.NotImplemented()),
        };
        let result = match op {
            CompareOp::Eq => self.inner.host_eq(&other),
            CompareOp::Ne => match self.inner.as_sequence() {
                Some(seq) => seq.host_ne(&other),
                None => self.inner.host_eq(&other).map(|eq| !eq),
            },
            _ => return Ok(py.NotImplemented()),
        };
        match result {
            Ok(flag) => Ok(flag.into_py(py)),
            Err(err) if err.kind() == HostErrorKind::NotImplemented => Ok(py.NotImplemented()),
            Err(err) => Err(to_py_err(py, err)),
        }
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

/// A host callable handed back to Python
#[pyclass(name = "NativeFunction", module = "graft_core")]
pub struct NativeFunction {
    inner: HostFunction,
}

#[pymethods]
impl NativeFunction {
    #[pyo3(signature = (*args))]
    fn __call__(&self, py: Python<'_>, args: &PyTuple) -> PyResult<PyObject> {
        let args = args.iter().map(to_host).collect::<PyResult<Vec<_>>>()?;
        let result = self.inner.call(&args).map_err(|e| to_py_err(py, e))?;
        Ok(to_py(py, &result))
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

/// `Degree.In`, `Degree.Out`, `Degree.Total`
#[pyclass(name = "Degree", module = "graft_core")]
pub struct DegreeClass;

#[pymethods]
impl DegreeClass {
    #[classattr]
    #[allow(non_snake_case)]
    fn In(py: Python<'_>) -> PyObject {
        to_py(py, &Degree::In.into_host())
    }

    #[classattr]
    #[allow(non_snake_case)]
    fn Out(py: Python<'_>) -> PyObject {
        to_py(py, &Degree::Out.into_host())
    }

    #[classattr]
    #[allow(non_snake_case)]
    fn Total(py: Python<'_>) -> PyObject {
        to_py(py, &Degree::Total.into_host())
    }
}

fn bridge() -> PyResult<&'static Bridge> {
    if let Some(bridge) = bridge::global() {
        return Ok(bridge);
    }
    let config = std::env::current_dir()
        .map(|dir| BridgeConfig::discover(&dir))
        .unwrap_or_default();
    config.init_logging();
    match bridge::init(BridgeBuilder::new(config)) {
        Ok(bridge) => Ok(bridge),
        Err(BridgeError::AlreadyInitialized) => bridge::global()
            .ok_or_else(|| PyRuntimeError::new_err("bridge is not initialized")),
        Err(err) => Err(PyRuntimeError::new_err(err.to_string())),
    }
}

fn dispatch(py: Python<'_>, name: &str, args: &[&PyAny]) -> PyResult<PyObject> {
    let args = args.iter().map(|a| to_host(a)).collect::<PyResult<Vec<_>>>()?;
    let result = bridge()?.call(name, &args).map_err(|e| to_py_err(py, e))?;
    Ok(to_py(py, &result))
}

/// Call any bridged operation by name
#[pyfunction]
#[pyo3(signature = (name, *args))]
fn call(py: Python<'_>, name: &str, args: &PyTuple) -> PyResult<PyObject> {
    let args: Vec<&PyAny> = args.iter().collect();
    dispatch(py, name, &args)
}

#[pyfunction]
fn raise_error(py: Python<'_>, message: &PyAny) -> PyResult<PyObject> {
    dispatch(py, "raise_error", &[message])
}

#[pyfunction]
fn get_property_types(py: Python<'_>) -> PyResult<PyObject> {
    dispatch(py, "get_property_types", &[])
}

#[pyfunction]
fn graph_filtering_enabled(py: Python<'_>) -> PyResult<PyObject> {
    dispatch(py, "graph_filtering_enabled", &[])
}

#[pyfunction]
fn openmp_enabled(py: Python<'_>) -> PyResult<PyObject> {
    dispatch(py, "openmp_enabled", &[])
}

#[pyfunction]
fn set_pickler(py: Python<'_>, hook: &PyAny) -> PyResult<PyObject> {
    dispatch(py, "set_pickler", &[hook])
}

#[pyfunction]
fn set_unpickler(py: Python<'_>, hook: &PyAny) -> PyResult<PyObject> {
    dispatch(py, "set_unpickler", &[hook])
}

#[pyfunction]
fn mod_info(py: Python<'_>) -> PyResult<PyObject> {
    dispatch(py, "mod_info", &[])
}

/// Create a `Vector_<name>` from an optional iterable
#[pyfunction]
#[pyo3(signature = (class_name, values = None))]
fn new_vector(py: Python<'_>, class_name: &str, values: Option<&PyAny>) -> PyResult<PyObject> {
    let values = match values {
        Some(values) => to_host(values)?,
        None => HostValue::List(Vec::new()),
    };
    macro_rules! try_class {
        ($ty:ty) => {
            if class_name == Vector::<$ty>::class_name() {
                let items = bridge()?
                    .extract::<Vec<$ty>>(&values)
                    .map_err(|e| to_py_err(py, e.into()))?;
                return Ok(to_py(py, &Vector::from_vec(items).into_host()));
            }
        };
    }
    for_each_element!(try_class);
    Err(PyValueError::new_err(format!("unknown vector class '{class_name}'")))
}

/// Names of the vector classes `new_vector` accepts
#[pyfunction]
fn vector_classes() -> Vec<String> {
    let mut names = Vec::new();
    macro_rules! push_class {
        ($ty:ty) => {
            names.push(Vector::<$ty>::class_name());
        };
    }
    for_each_element!(push_class);
    names
}

#[pymodule]
fn graft_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<NativeObject>()?;
    m.add_class::<NativeFunction>()?;
    m.add_class::<DegreeClass>()?;
    m.add_function(wrap_pyfunction!(call, m)?)?;
    m.add_function(wrap_pyfunction!(raise_error, m)?)?;
    m.add_function(wrap_pyfunction!(get_property_types, m)?)?;
    m.add_function(wrap_pyfunction!(graph_filtering_enabled, m)?)?;
    m.add_function(wrap_pyfunction!(openmp_enabled, m)?)?;
    m.add_function(wrap_pyfunction!(set_pickler, m)?)?;
    m.add_function(wrap_pyfunction!(set_unpickler, m)?)?;
    m.add_function(wrap_pyfunction!(mod_info, m)?)?;
    m.add_function(wrap_pyfunction!(new_vector, m)?)?;
    m.add_function(wrap_pyfunction!(vector_classes, m)?)?;
    Ok(())
}
