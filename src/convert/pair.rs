//! Two-element pairs ⟷ host tuples

use std::borrow::Cow;

use super::element::Element;
use super::{FromHost, IntoHost};
use crate::errors::BridgeError;
use crate::host::HostValue;

/// Accepts any host value with at least two positional elements, each of
/// which converts; the conversion is all-or-nothing
impl<A: Element, B: Element> FromHost for (A, B) {
    fn type_name() -> Cow<'static, str> {
        Cow::Owned(format!("pair<{},{}>", A::NAME, B::NAME))
    }

    fn convertible(value: &HostValue) -> bool {
        match value.items() {
            Some(items) if items.len() >= 2 => {
                A::extract(&items[0]).is_some() && B::extract(&items[1]).is_some()
            }
            _ => false,
        }
    }

    fn construct(value: &HostValue) -> Result<Self, BridgeError> {
        let items = value
            .items()
            .filter(|items| items.len() >= 2)
            .ok_or_else(|| BridgeError::conversion(Self::type_name(), value))?;
        match (A::extract(&items[0]), B::extract(&items[1])) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(BridgeError::conversion(Self::type_name(), value)),
        }
    }
}

impl<A: Element, B: Element> IntoHost for (A, B) {
    fn into_host(self) -> HostValue {
        HostValue::Tuple(vec![self.0.to_host(), self.1.to_host()])
    }
}
