//! Value converter registry
//!
//! Design: one entry per native type, keyed by `TypeId`. Each entry pairs a
//! `convertible` predicate with a `construct` function; extraction always runs
//! the predicate first. Entries are written while the bridge is built and only
//! read afterwards.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;

use tracing::trace;

use super::variant::VariantAdapter;
use super::{FromHost, IntoHost};
use crate::errors::BridgeError;
use crate::host::HostValue;

type ConvertibleFn = Box<dyn Fn(&HostValue) -> bool + Send + Sync>;
type ConstructFn = Box<dyn Fn(&HostValue) -> Result<Box<dyn Any + Send>, BridgeError> + Send + Sync>;

/// What a registry entry converts into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A property value type (scalar or vector), listed by `get_property_types`
    Value,
    /// A native class instance shared with the host
    Class,
    Pair,
    Variant,
    /// Anything else: raw host objects, handles
    Other,
}

struct ConverterEntry {
    name: Cow<'static, str>,
    kind: EntryKind,
    convertible: ConvertibleFn,
    construct: ConstructFn,
}

/// Per-type host → native converters, plus the set of types allowed to travel back
#[derive(Default)]
pub struct ConverterRegistry {
    entries: HashMap<TypeId, ConverterEntry>,
    order: Vec<TypeId>,
    to_host: HashMap<TypeId, Cow<'static, str>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the host → native converter of a `FromHost` type
    pub fn register<T: FromHost>(&mut self, kind: EntryKind) -> Result<(), BridgeError> {
        self.register_with::<T, _, _>(
            T::type_name(),
            kind,
            T::convertible,
            |value| T::construct(value),
        )
    }

    /// Register an arbitrary convertible/construct pair for `T`
    pub fn register_with<T, C, K>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        kind: EntryKind,
        convertible: C,
        construct: K,
    ) -> Result<(), BridgeError>
    where
        T: Any + Send,
        C: Fn(&HostValue) -> bool + Send + Sync + 'static,
        K: Fn(&HostValue) -> Result<T, BridgeError> + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        let name = name.into();
        if self.entries.contains_key(&id) {
            return Err(BridgeError::DuplicateRegistration {
                type_name: name.into_owned(),
            });
        }
        trace!(target: "graft::registry", type_name = %name, ?kind, "registered converter");
        self.entries.insert(
            id,
            ConverterEntry {
                name,
                kind,
                convertible: Box::new(convertible),
                construct: Box::new(move |value| {
                    construct(value).map(|v| Box::new(v) as Box<dyn Any + Send>)
                }),
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Register a tagged union; probing follows the adapter's priority list
    pub fn register_variant<V: Any + Send>(
        &mut self,
        adapter: VariantAdapter<V>,
    ) -> Result<(), BridgeError> {
        let adapter = std::sync::Arc::new(adapter);
        let probe = std::sync::Arc::clone(&adapter);
        self.register_with::<V, _, _>(
            adapter.union_name().to_owned(),
            EntryKind::Variant,
            move |value| probe.convertible(value),
            move |value| adapter.convert(value),
        )
    }

    /// Allow `T` to be returned to the host
    pub fn register_to_host<T: IntoHost + 'static>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<(), BridgeError> {
        let id = TypeId::of::<T>();
        let name = name.into();
        if self.to_host.contains_key(&id) {
            return Err(BridgeError::DuplicateRegistration {
                type_name: format!("{name} (to host)"),
            });
        }
        trace!(target: "graft::registry", type_name = %name, "registered to-host converter");
        self.to_host.insert(id, name);
        Ok(())
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn can_return<T: Any>(&self) -> bool {
        self.to_host.contains_key(&TypeId::of::<T>())
    }

    /// Name `T` was registered under for the trip back to the host
    pub fn return_name<T: Any>(&self) -> Option<&str> {
        self.to_host.get(&TypeId::of::<T>()).map(|name| name.as_ref())
    }

    /// Registered name of `T`
    pub fn name_of<T: Any>(&self) -> Option<&str> {
        self.entries
            .get(&TypeId::of::<T>())
            .map(|entry| entry.name.as_ref())
    }

    /// Run `T`'s convertibility predicate
    pub fn convertible<T: Any>(&self, value: &HostValue) -> Result<bool, BridgeError> {
        Ok((self.entry::<T>()?.convertible)(value))
    }

    /// Convert `value` to `T`
    pub fn extract<T: Any>(&self, value: &HostValue) -> Result<T, BridgeError> {
        let entry = self.entry::<T>()?;
        if !(entry.convertible)(value) {
            return Err(BridgeError::conversion(entry.name.as_ref(), value));
        }
        let boxed = (entry.construct)(value)?;
        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| BridgeError::conversion(entry.name.as_ref(), value))
    }

    /// Names of every registered entry of `kind`, in registration order
    pub fn names(&self, kind: EntryKind) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.name.as_ref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry<T: Any>(&self) -> Result<&ConverterEntry, BridgeError> {
        self.entries
            .get(&TypeId::of::<T>())
            .ok_or_else(|| BridgeError::UnregisteredType {
                type_name: std::any::type_name::<T>().to_owned(),
            })
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| entry.name.as_ref())
            .collect();
        f.debug_struct("ConverterRegistry")
            .field("entries", &names)
            .field("to_host", &self.to_host.len())
            .finish()
    }
}
