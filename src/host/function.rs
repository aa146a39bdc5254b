//! Host callables
//!
//! A host function is opaque to the bridge: it can be stored and invoked,
//! nothing else. Bindings wrap their interpreter's callable objects in one.

use std::fmt;
use std::sync::Arc;

use super::HostValue;
use crate::errors::HostError;

type Callable = dyn Fn(&[HostValue]) -> Result<HostValue, HostError> + Send + Sync;

/// A callable supplied by the host
#[derive(Clone)]
pub struct HostFunction {
    name: Arc<str>,
    callable: Arc<Callable>,
}

impl HostFunction {
    pub fn new<F>(name: impl Into<Arc<str>>, callable: F) -> Self
    where
        F: Fn(&[HostValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callable: Arc::new(callable),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, HostError> {
        (self.callable)(args)
    }

    /// True when both handles refer to the same callable
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.callable) as *const () == Arc::as_ptr(&other.callable) as *const ()
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}
