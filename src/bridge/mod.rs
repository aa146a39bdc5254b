//! Bridge assembly and the process-wide instance
//!
//! Architecture:
//! - `ops.rs` - the typed operation table and its builder
//! - `hooks.rs` - host-installed persistence callables
//! - `info.rs` - `mod_info` build metadata
//!
//! A `Bridge` is assembled in a fixed order: element and vector converters,
//! pair converters, tagged unions, engine types, error translators, and last
//! the operation table. Operations check their signatures against the
//! finished registry, so every type they mention must be registered by then.

mod hooks;
mod info;
mod ops;

pub use hooks::PersistenceHooks;
pub use info::ModInfo;
pub use ops::{CallContext, NativeFn, Operation, OperationTable, OperationTableBuilder, Signature};

use std::any::Any;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::convert::{
    for_each_element, AnyHandle, ConverterRegistry, Degree, DegreeSelector, EntryKind, Vector,
};
use crate::errors::{BridgeError, ErrorTranslator, HostError, NativeError, NativeResult};
use crate::host::HostValue;

/// A native engine contributing types, error kinds and operations
pub trait NativeModule: Send + Sync {
    fn name(&self) -> &str;

    /// Engine-specific converters (engine handles, extra unions)
    fn register_types(&self, _registry: &mut ConverterRegistry) -> Result<(), BridgeError> {
        Ok(())
    }

    fn register_errors(&self, _translator: &mut ErrorTranslator) -> Result<(), BridgeError> {
        Ok(())
    }

    fn register_operations(&self, ops: &mut OperationTableBuilder<'_>) -> Result<(), BridgeError>;
}

/// Collects modules and assembles a `Bridge`
pub struct BridgeBuilder {
    config: BridgeConfig,
    modules: Vec<Box<dyn NativeModule>>,
}

impl BridgeBuilder {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            modules: Vec::new(),
        }
    }

    pub fn module(mut self, module: impl NativeModule + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn build(self) -> Result<Bridge, BridgeError> {
        let BridgeBuilder { config, modules } = self;

        let mut registry = ConverterRegistry::new();
        register_elements(&mut registry)?;
        register_pairs(&mut registry)?;
        registry.register_variant(
            DegreeSelector::adapter().strict(config.conversion.strict_variants),
        )?;
        registry.register_to_host::<DegreeSelector>("deg_t")?;
        for module in &modules {
            debug!(target: "graft::bridge", module = module.name(), "registering types");
            module.register_types(&mut registry)?;
        }

        let mut translator = ErrorTranslator::standard();
        for module in &modules {
            module.register_errors(&mut translator)?;
        }

        let hooks = PersistenceHooks::new();
        let mod_info = ModInfo::current();
        let mut ops = OperationTableBuilder::new(&registry);
        define_builtins(&mut ops, &hooks, &mod_info)?;
        for module in &modules {
            debug!(target: "graft::bridge", module = module.name(), "registering operations");
            module.register_operations(&mut ops)?;
        }
        let operations = ops.build();

        info!(
            target: "graft::bridge",
            converters = registry.len(),
            operations = operations.len(),
            modules = modules.len(),
            "bridge assembled"
        );

        Ok(Bridge {
            config,
            registry,
            translator,
            operations,
            hooks,
            info: mod_info,
        })
    }
}

/// Scalars, then copying vector converters, then vector classes, then the
/// generic host object and the built-in enum and handle types
fn register_elements(registry: &mut ConverterRegistry) -> Result<(), BridgeError> {
    macro_rules! scalar {
        ($ty:ty) => {
            registry.register::<$ty>(EntryKind::Value)?;
            registry.register_to_host::<$ty>(<$ty as crate::convert::Element>::NAME)?;
        };
    }
    macro_rules! vector {
        ($ty:ty) => {
            registry.register::<Vec<$ty>>(EntryKind::Value)?;
            registry.register_to_host::<Vec<$ty>>(Vector::<$ty>::class_name())?;
        };
    }
    macro_rules! vector_class {
        ($ty:ty) => {
            registry.register::<Vector<$ty>>(EntryKind::Class)?;
            registry.register_to_host::<Vector<$ty>>(Vector::<$ty>::class_name())?;
        };
    }
    for_each_element!(scalar);
    for_each_element!(vector);
    for_each_element!(vector_class);

    registry.register::<HostValue>(EntryKind::Value)?;
    registry.register_to_host::<HostValue>("object")?;
    registry.register_to_host::<()>("None")?;
    registry.register::<Degree>(EntryKind::Class)?;
    registry.register_to_host::<Degree>("Degree")?;
    registry.register::<AnyHandle>(EntryKind::Other)?;
    registry.register_to_host::<AnyHandle>("any")?;
    Ok(())
}

fn register_pairs(registry: &mut ConverterRegistry) -> Result<(), BridgeError> {
    registry.register::<(f64, f64)>(EntryKind::Pair)?;
    registry.register::<(u64, u64)>(EntryKind::Pair)?;
    registry.register_to_host::<(String, bool)>("tuple")?;
    registry.register_to_host::<(u64, u64)>("tuple")?;
    registry.register_to_host::<(f64, f64)>("tuple")?;
    Ok(())
}

fn define_builtins(
    ops: &mut OperationTableBuilder<'_>,
    hooks: &PersistenceHooks,
    mod_info: &ModInfo,
) -> Result<(), BridgeError> {
    ops.def("raise_error", |message: String| -> NativeResult<()> {
        Err(NativeError::graph(message))
    })?;

    ops.def_raw("get_property_types", &[], "list", |ctx, _| {
        Ok(HostValue::List(
            ctx.registry
                .names(EntryKind::Value)
                .into_iter()
                .map(HostValue::from)
                .collect(),
        ))
    })?;

    ops.def("graph_filtering_enabled", || Ok(cfg!(feature = "filtering")))?;
    ops.def("openmp_enabled", || Ok(cfg!(feature = "parallel")))?;

    let slots = hooks.clone();
    ops.def_raw("set_pickler", &["function"], "None", move |_, args| {
        slots.set_pickler(expect_function(&args[0])?);
        Ok(HostValue::None)
    })?;
    let slots = hooks.clone();
    ops.def_raw("set_unpickler", &["function"], "None", move |_, args| {
        slots.set_unpickler(expect_function(&args[0])?);
        Ok(HostValue::None)
    })?;

    let mod_info = mod_info.clone();
    ops.def_raw("mod_info", &[], "mod_info", move |_, _| {
        Ok(HostValue::object(mod_info.clone()))
    })?;
    Ok(())
}

fn expect_function(value: &HostValue) -> Result<crate::host::HostFunction, HostError> {
    match value {
        HostValue::Function(function) => Ok(function.clone()),
        other => Err(BridgeError::conversion("function", other).into()),
    }
}

/// Converters, translators and operations of one host binding
pub struct Bridge {
    config: BridgeConfig,
    registry: ConverterRegistry,
    translator: ErrorTranslator,
    operations: OperationTable,
    hooks: PersistenceHooks,
    info: ModInfo,
}

impl Bridge {
    pub fn builder(config: BridgeConfig) -> BridgeBuilder {
        BridgeBuilder::new(config)
    }

    /// A bridge with only the built-in types and functions
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        BridgeBuilder::new(config).build()
    }

    /// Call an operation by name with host arguments
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, HostError> {
        let op = self
            .operations
            .get(name)
            .ok_or_else(|| BridgeError::UnknownOperation {
                name: name.to_owned(),
            })?;
        op.call(&self.context(), args)
    }

    pub fn context(&self) -> CallContext<'_> {
        CallContext {
            registry: &self.registry,
            translator: &self.translator,
        }
    }

    /// Convert a host value through the registry
    pub fn extract<T: Any>(&self, value: &HostValue) -> Result<T, BridgeError> {
        self.registry.extract(value)
    }

    pub fn translate(&self, err: NativeError) -> HostError {
        self.translator.translate(err)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn hooks(&self) -> &PersistenceHooks {
        &self.hooks
    }

    pub fn info(&self) -> &ModInfo {
        &self.info
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("operations", &self.operations.len())
            .finish()
    }
}

static BRIDGE: OnceCell<Bridge> = OnceCell::new();

/// Build and install the process-wide bridge
///
/// Only the first call succeeds; later calls fail with `AlreadyInitialized`
/// and leave the installed bridge untouched.
pub fn init(builder: BridgeBuilder) -> Result<&'static Bridge, BridgeError> {
    if BRIDGE.get().is_some() {
        return Err(BridgeError::AlreadyInitialized);
    }
    let bridge = builder.build()?;
    BRIDGE
        .set(bridge)
        .map_err(|_| BridgeError::AlreadyInitialized)?;
    info!(target: "graft::bridge", "process bridge installed");
    BRIDGE.get().ok_or(BridgeError::AlreadyInitialized)
}

/// The process-wide bridge, once `init` succeeded
pub fn global() -> Option<&'static Bridge> {
    BRIDGE.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::IntoHost;
    use crate::errors::HostErrorKind;
    use crate::host::HostFunction;

    fn bridge() -> Bridge {
        Bridge::new(BridgeConfig::default()).unwrap()
    }

    #[test]
    fn test_property_types_in_registration_order() {
        let types = bridge().call("get_property_types", &[]).unwrap();
        let names: Vec<_> = types
            .items()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names[..7], ["bool", "uint8_t", "int32_t", "int64_t", "uint64_t", "double", "string"]);
        assert_eq!(names[7], "vector<bool>");
        assert_eq!(names.last().map(String::as_str), Some("object"));
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_raise_error_is_runtime() {
        let err = bridge()
            .call("raise_error", &[HostValue::from("custom")])
            .unwrap_err();
        assert_eq!(err.kind(), HostErrorKind::Runtime);
        assert_eq!(err.message(), "custom");
    }

    #[test]
    fn test_feature_flags() {
        let bridge = bridge();
        assert_eq!(
            bridge.call("openmp_enabled", &[]).unwrap(),
            HostValue::Bool(cfg!(feature = "parallel"))
        );
        assert_eq!(
            bridge.call("graph_filtering_enabled", &[]).unwrap(),
            HostValue::Bool(cfg!(feature = "filtering"))
        );
    }

    #[test]
    fn test_unknown_operation() {
        let err = bridge().call("nope", &[]).unwrap_err();
        assert_eq!(err.kind(), HostErrorKind::Attribute);
    }

    #[test]
    fn test_set_pickler_requires_a_callable() {
        let bridge = bridge();
        let err = bridge.call("set_pickler", &[HostValue::Int(1)]).unwrap_err();
        assert_eq!(err.kind(), HostErrorKind::Type);

        let hook = HostFunction::new("dumps", |_| Ok(HostValue::Bytes(vec![0])));
        bridge.call("set_pickler", &[HostValue::Function(hook)]).unwrap();
        assert_eq!(
            bridge.hooks().pickle(&HostValue::None).unwrap(),
            HostValue::Bytes(vec![0])
        );
    }

    #[test]
    fn test_strict_variants_from_config() {
        let mut config = BridgeConfig::default();
        config.conversion.strict_variants = true;
        let bridge = Bridge::new(config).unwrap();
        let selector: DegreeSelector = bridge.extract(&Degree::In.into_host()).unwrap();
        assert!(matches!(selector, DegreeSelector::Degree(Degree::In)));
    }
}
