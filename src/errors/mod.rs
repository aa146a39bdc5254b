//! Error taxonomy on both sides of the boundary
//!
//! - `NativeError` is what engine code raises.
//! - `BridgeError` covers failures of the bridge itself (conversion, registration).
//! - `HostError` is the only form an error takes once it reaches the host.

mod translate;

pub use translate::ErrorTranslator;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::host::{HostClass, HostValue};

/// Error kinds the native engine can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    /// Generic engine failure
    Graph,
    Io,
    Value,
}

/// An error raised by native engine code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    #[error("{0}")]
    Graph(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Value(String),
}

impl NativeError {
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }

    pub fn kind(&self) -> NativeErrorKind {
        match self {
            Self::Graph(_) => NativeErrorKind::Graph,
            Self::Io(_) => NativeErrorKind::Io,
            Self::Value(_) => NativeErrorKind::Value,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Graph(msg) | Self::Io(msg) | Self::Value(msg) => msg,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            Self::Graph(msg) | Self::Io(msg) | Self::Value(msg) => msg,
        }
    }
}

impl From<std::io::Error> for NativeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for native operations
pub type NativeResult<T> = Result<T, NativeError>;

/// Failures of the bridge machinery itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("cannot convert {found} to {expected}")]
    TypeConversion { expected: String, found: String },

    #[error("{type_name} is already registered")]
    DuplicateRegistration { type_name: String },

    #[error("no converter registered for {type_name}")]
    UnregisteredType { type_name: String },

    #[error("{found} matches several alternatives of {union}: {}", .candidates.join(", "))]
    AmbiguousAlternative {
        union: String,
        found: String,
        candidates: Vec<String>,
    },

    #[error("bridge is already initialized")]
    AlreadyInitialized,

    #[error("no operation named '{name}'")]
    UnknownOperation { name: String },

    #[error("{operation}() takes {expected} arguments ({found} given)")]
    ArgumentCount {
        operation: String,
        expected: usize,
        found: usize,
    },

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{class} is exported as an array view and cannot be accessed")]
    Exported { class: String },

    #[error("'{class}' object has no attribute '{attr}'")]
    UnknownAttribute { class: String, attr: String },

    #[error("attribute '{attr}' of '{class}' objects is not writable")]
    ReadOnlyAttribute { class: String, attr: String },
}

impl BridgeError {
    /// Conversion failure for `value` against the named native type
    pub fn conversion(expected: impl Into<String>, value: &HostValue) -> Self {
        Self::TypeConversion {
            expected: expected.into(),
            found: value.type_name().into_owned(),
        }
    }
}

/// Host error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostErrorKind {
    Runtime,
    Io,
    Value,
    Type,
    Index,
    Attribute,
    NotImplemented,
}

impl HostErrorKind {
    /// Name of the matching host exception class
    pub const fn host_name(self) -> &'static str {
        match self {
            Self::Runtime => "RuntimeError",
            Self::Io => "IOError",
            Self::Value => "ValueError",
            Self::Type => "TypeError",
            Self::Index => "IndexError",
            Self::Attribute => "AttributeError",
            Self::NotImplemented => "NotImplementedError",
        }
    }

    /// Category for a host exception class name; `OSError` is an alias of `IOError`
    pub fn from_host_name(name: &str) -> Option<Self> {
        let kind = match name {
            "RuntimeError" => Self::Runtime,
            "IOError" | "OSError" => Self::Io,
            "ValueError" => Self::Value,
            "TypeError" => Self::Type,
            "IndexError" => Self::Index,
            "AttributeError" => Self::Attribute,
            "NotImplementedError" => Self::NotImplemented,
            _ => return None,
        };
        Some(kind)
    }
}

/// An error as the host sees it: a category plus a message
///
/// The message is both the display text and the `message` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    kind: HostErrorKind,
    message: String,
}

impl HostError {
    pub fn new(kind: HostErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Runtime, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Io, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Value, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(HostErrorKind::Type, message)
    }

    pub fn kind(&self) -> HostErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

impl HostClass for HostError {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.kind.host_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        match name {
            "message" => Ok(HostValue::Str(self.message.clone())),
            _ => Err(BridgeError::UnknownAttribute {
                class: self.kind.host_name().to_owned(),
                attr: name.to_owned(),
            }
            .into()),
        }
    }
}

impl From<BridgeError> for HostError {
    fn from(err: BridgeError) -> Self {
        let kind = match &err {
            BridgeError::TypeConversion { .. }
            | BridgeError::AmbiguousAlternative { .. }
            | BridgeError::ArgumentCount { .. }
            | BridgeError::UnregisteredType { .. } => HostErrorKind::Type,
            BridgeError::IndexOutOfRange { .. } => HostErrorKind::Index,
            BridgeError::InvalidArgument(_) => HostErrorKind::Value,
            BridgeError::NotImplemented(_) => HostErrorKind::NotImplemented,
            BridgeError::UnknownOperation { .. }
            | BridgeError::UnknownAttribute { .. }
            | BridgeError::ReadOnlyAttribute { .. } => HostErrorKind::Attribute,
            BridgeError::DuplicateRegistration { .. }
            | BridgeError::AlreadyInitialized
            | BridgeError::Exported { .. } => HostErrorKind::Runtime,
        };
        Self::new(kind, err.to_string())
    }
}
