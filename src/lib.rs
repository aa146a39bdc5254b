//! graft - marshalling bridge between a native graph engine and a scripting host
//!
//! Layout:
//! - `host` - the host's dynamic value model and class protocols
//! - `convert` - converter registry, sequence/pair/union adapters, array export
//! - `errors` - native, bridge and host errors plus the translation table
//! - `bridge` - operation table, assembly and the process-wide instance
//! - `config`, `logging` - ambient setup
//! - `python` - CPython extension module (feature `python`)

pub mod bridge;
pub mod config;
pub mod convert;
pub mod errors;
pub mod host;
pub mod logging;

#[cfg(feature = "python")]
pub mod python;

pub use bridge::{global, init, Bridge, BridgeBuilder, ModInfo, NativeModule, OperationTableBuilder};
pub use config::{BridgeConfig, ConfigError};
pub use convert::{
    AnyHandle, ArrayView, ConverterRegistry, Degree, DegreeSelector, Element, EntryKind, FromHost,
    Handle, HostArray, IntoHost, VariantAdapter, Vector,
};
pub use errors::{
    BridgeError, ErrorTranslator, HostError, HostErrorKind, NativeError, NativeErrorKind,
    NativeResult,
};
pub use host::{HostClass, HostFunction, HostSequence, HostValue};
