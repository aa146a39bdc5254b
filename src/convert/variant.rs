//! Tagged-union conversion
//!
//! Design: alternatives are probed in an explicit priority list and the first
//! one whose predicate accepts the value wins. Order the list from most to
//! least specific; a permissive early alternative masks everything after it.
//! Strict mode additionally rejects values that more than one alternative
//! accepts.

use std::borrow::Cow;
use std::fmt;

use super::FromHost;
use crate::errors::BridgeError;
use crate::host::HostValue;

/// One candidate kind of a tagged union `V`
pub struct Alternative<V> {
    name: Cow<'static, str>,
    convertible: fn(&HostValue) -> bool,
    construct: fn(&HostValue) -> Result<V, BridgeError>,
}

impl<V> Alternative<V> {
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        convertible: fn(&HostValue) -> bool,
        construct: fn(&HostValue) -> Result<V, BridgeError>,
    ) -> Self {
        Self {
            name: name.into(),
            convertible,
            construct,
        }
    }

    /// Alternative backed by a registered type that converts into `V`
    pub fn of<T>() -> Self
    where
        T: FromHost + Into<V>,
        V: 'static,
    {
        Self::new(T::type_name(), T::convertible, construct_into::<T, V>)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn construct_into<T: FromHost + Into<V>, V>(value: &HostValue) -> Result<V, BridgeError> {
    T::construct(value).map(Into::into)
}

impl<V> fmt::Debug for Alternative<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Alternative").field(&self.name).finish()
    }
}

/// Ordered set of alternatives for one tagged union
#[derive(Debug)]
pub struct VariantAdapter<V> {
    union_name: Cow<'static, str>,
    alternatives: Vec<Alternative<V>>,
    strict: bool,
}

impl<V> VariantAdapter<V> {
    pub fn new(union_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            union_name: union_name.into(),
            alternatives: Vec::new(),
            strict: false,
        }
    }

    /// Append an alternative with the next-lower priority
    pub fn alternative(mut self, alternative: Alternative<V>) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// Reject values accepted by more than one alternative
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn union_name(&self) -> &str {
        &self.union_name
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Alternative names in priority order
    pub fn names(&self) -> Vec<&str> {
        self.alternatives.iter().map(Alternative::name).collect()
    }

    /// Index of the first alternative that accepts `value`
    pub fn probe(&self, value: &HostValue) -> Option<usize> {
        self.alternatives
            .iter()
            .position(|alt| (alt.convertible)(value))
    }

    pub fn convertible(&self, value: &HostValue) -> bool {
        if self.strict {
            self.matches(value).len() == 1
        } else {
            self.probe(value).is_some()
        }
    }

    /// Convert through the first accepting alternative
    pub fn convert(&self, value: &HostValue) -> Result<V, BridgeError> {
        let index = if self.strict {
            match self.matches(value).as_slice() {
                [] => None,
                [only] => Some(*only),
                many => {
                    return Err(BridgeError::AmbiguousAlternative {
                        union: self.union_name.to_string(),
                        found: value.type_name().into_owned(),
                        candidates: many
                            .iter()
                            .map(|&i| self.alternatives[i].name.to_string())
                            .collect(),
                    })
                }
            }
        } else {
            self.probe(value)
        };

        match index {
            Some(i) => (self.alternatives[i].construct)(value),
            None => Err(BridgeError::conversion(self.union_name.as_ref(), value)),
        }
    }

    fn matches(&self, value: &HostValue) -> Vec<usize> {
        self.alternatives
            .iter()
            .enumerate()
            .filter(|(_, alt)| (alt.convertible)(value))
            .map(|(i, _)| i)
            .collect()
    }
}
