//! Native operation table
//!
//! Operations are typed Rust functions. At definition time every parameter
//! type must already have a host → native converter and the return type a
//! native → host one; at call time arguments are extracted left to right and
//! the first failure aborts the call before the native function runs.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::convert::{ConverterRegistry, IntoHost};
use crate::errors::{BridgeError, ErrorTranslator, HostError, NativeResult};
use crate::host::HostValue;

/// What an operation body sees besides its arguments
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub registry: &'a ConverterRegistry,
    pub translator: &'a ErrorTranslator,
}

type RawFn = Arc<dyn Fn(&CallContext<'_>, &[HostValue]) -> Result<HostValue, HostError> + Send + Sync>;

/// Declared parameter and return type names of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<String>,
    pub returns: String,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) -> {}", self.params.join(", "), self.returns)
    }
}

/// A native function callable from the host by name
pub trait NativeFn<Args>: Send + Sync + 'static {
    /// Resolve the signature, failing if a type has no converter
    fn signature(registry: &ConverterRegistry) -> Result<Signature, BridgeError>;

    /// Convert `args`, run the function and convert its result
    fn invoke(&self, ctx: &CallContext<'_>, args: &[HostValue]) -> Result<HostValue, HostError>;
}

fn param_name<T: Any>(registry: &ConverterRegistry) -> Result<String, BridgeError> {
    registry
        .name_of::<T>()
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::UnregisteredType {
            type_name: std::any::type_name::<T>().to_owned(),
        })
}

fn return_name<R: Any>(registry: &ConverterRegistry) -> Result<String, BridgeError> {
    registry
        .return_name::<R>()
        .map(str::to_owned)
        .ok_or_else(|| BridgeError::UnregisteredType {
            type_name: format!("{} (to host)", std::any::type_name::<R>()),
        })
}

macro_rules! impl_native_fn {
    ($($arg:ident : $var:ident),*) => {
        impl<F, R, $($arg,)*> NativeFn<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> NativeResult<R> + Send + Sync + 'static,
            R: IntoHost + Any,
            $($arg: Any + Send,)*
        {
            fn signature(registry: &ConverterRegistry) -> Result<Signature, BridgeError> {
                Ok(Signature {
                    params: vec![$(param_name::<$arg>(registry)?),*],
                    returns: return_name::<R>(registry)?,
                })
            }

            #[allow(unused_variables, unused_mut)]
            fn invoke(
                &self,
                ctx: &CallContext<'_>,
                args: &[HostValue],
            ) -> Result<HostValue, HostError> {
                let mut args = args.iter();
                $(
                    let $var = match args.next() {
                        Some(value) => ctx.registry.extract::<$arg>(value)?,
                        None => return Err(BridgeError::InvalidArgument("missing argument".into()).into()),
                    };
                )*
                match (self)($($var),*) {
                    Ok(result) => Ok(result.into_host()),
                    Err(err) => Err(ctx.translator.translate(err)),
                }
            }
        }
    };
}

impl_native_fn!();
impl_native_fn!(A1: a1);
impl_native_fn!(A1: a1, A2: a2);
impl_native_fn!(A1: a1, A2: a2, A3: a3);
impl_native_fn!(A1: a1, A2: a2, A3: a3, A4: a4);
impl_native_fn!(A1: a1, A2: a2, A3: a3, A4: a4, A5: a5);

/// One named entry of the table
#[derive(Clone)]
pub struct Operation {
    name: String,
    signature: Signature,
    func: RawFn,
}

impl Operation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.params.len()
    }

    pub fn call(&self, ctx: &CallContext<'_>, args: &[HostValue]) -> Result<HostValue, HostError> {
        if args.len() != self.arity() {
            return Err(BridgeError::ArgumentCount {
                operation: self.name.clone(),
                expected: self.arity(),
                found: args.len(),
            }
            .into());
        }
        trace!(target: "graft::ops", op = %self.name, argc = args.len(), "call");
        (self.func)(ctx, args)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Name → operation, immutable once built
#[derive(Debug, Default, Clone)]
pub struct OperationTable {
    ops: HashMap<String, Operation>,
    order: Vec<String>,
}

impl OperationTable {
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Operation names in definition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Collects operations against a finished converter registry
pub struct OperationTableBuilder<'r> {
    registry: &'r ConverterRegistry,
    table: OperationTable,
}

impl<'r> OperationTableBuilder<'r> {
    pub fn new(registry: &'r ConverterRegistry) -> Self {
        Self {
            registry,
            table: OperationTable::default(),
        }
    }

    /// Define a typed operation
    pub fn def<Args, F>(&mut self, name: &str, func: F) -> Result<&mut Self, BridgeError>
    where
        Args: 'static,
        F: NativeFn<Args>,
    {
        let signature = F::signature(self.registry)?;
        let func: RawFn = Arc::new(move |ctx: &CallContext<'_>, args: &[HostValue]| {
            NativeFn::<Args>::invoke(&func, ctx, args)
        });
        self.insert(name, signature, func)?;
        Ok(self)
    }

    /// Define an operation that works on host values directly
    pub fn def_raw<G>(
        &mut self,
        name: &str,
        params: &[&str],
        returns: &str,
        func: G,
    ) -> Result<&mut Self, BridgeError>
    where
        G: Fn(&CallContext<'_>, &[HostValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    {
        let signature = Signature {
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            returns: returns.to_owned(),
        };
        self.insert(name, signature, Arc::new(func))?;
        Ok(self)
    }

    fn insert(&mut self, name: &str, signature: Signature, func: RawFn) -> Result<(), BridgeError> {
        if self.table.contains(name) {
            return Err(BridgeError::DuplicateRegistration {
                type_name: format!("operation '{name}'"),
            });
        }
        debug!(target: "graft::ops", op = name, %signature, "defined operation");
        self.table.order.push(name.to_owned());
        self.table.ops.insert(
            name.to_owned(),
            Operation {
                name: name.to_owned(),
                signature,
                func,
            },
        );
        Ok(())
    }

    pub fn registry(&self) -> &ConverterRegistry {
        self.registry
    }

    pub fn build(self) -> OperationTable {
        self.table
    }
}
