use std::any::Any;
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

use graft::bridge::OperationTableBuilder;
use graft::errors::HostErrorKind;
use graft::{
    AnyHandle, Bridge, BridgeConfig, BridgeError, ConverterRegistry, Degree, DegreeSelector,
    EntryKind, Handle, HostClass, HostError, HostFunction, HostValue, IntoHost, NativeError,
    NativeModule, NativeResult, Vector,
};
use parking_lot::RwLock;

/// Minimal adjacency-list engine standing in for the graph library
#[derive(Debug, Default)]
struct ToyGraph {
    edges: RwLock<Vec<(u64, u64)>>,
    vertices: RwLock<u64>,
}

impl ToyGraph {
    fn degree(&self, v: u64, which: Degree) -> usize {
        let edges = self.edges.read();
        let out = edges.iter().filter(|(s, _)| *s == v).count();
        let inc = edges.iter().filter(|(_, t)| *t == v).count();
        match which {
            Degree::In => inc,
            Degree::Out => out,
            Degree::Total => inc + out,
        }
    }
}

impl HostClass for ToyGraph {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed("GraphInterface")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_attr(&self, name: &str) -> Result<HostValue, HostError> {
        match name {
            "num_vertices" => Ok(HostValue::Int(i128::from(*self.vertices.read()))),
            _ => Err(BridgeError::UnknownAttribute {
                class: "GraphInterface".into(),
                attr: name.into(),
            }
            .into()),
        }
    }
}

static GUARDED_CALLS: AtomicUsize = AtomicUsize::new(0);

struct ToyEngine;

impl NativeModule for ToyEngine {
    fn name(&self) -> &str {
        "toy"
    }

    fn register_types(&self, registry: &mut ConverterRegistry) -> Result<(), BridgeError> {
        registry.register::<Handle<ToyGraph>>(EntryKind::Class)?;
        registry.register_to_host::<Handle<ToyGraph>>("GraphInterface")
    }

    fn register_operations(&self, ops: &mut OperationTableBuilder<'_>) -> Result<(), BridgeError> {
        ops.def("new_graph", || Ok(Handle::new(ToyGraph::default())))?
            .def("add_vertices", |g: Handle<ToyGraph>, n: u64| {
                let mut vertices = g.vertices.write();
                *vertices += n;
                Ok(*vertices)
            })?
            .def("add_edge", |g: Handle<ToyGraph>, s: u64, t: u64| -> NativeResult<()> {
                let n = *g.vertices.read();
                if s >= n || t >= n {
                    return Err(NativeError::value(format!("invalid vertex: {}", s.max(t))));
                }
                g.edges.write().push((s, t));
                Ok(())
            })?
            .def("edges", |g: Handle<ToyGraph>| {
                let flat: Vec<u64> = g.edges.read().iter().flat_map(|&(s, t)| [s, t]).collect();
                Ok(Vector::from_vec(flat))
            })?
            .def("degree", |g: Handle<ToyGraph>, v: u64, deg: DegreeSelector| {
                match deg {
                    DegreeSelector::Degree(which) => Ok(g.degree(v, which) as f64),
                    DegreeSelector::Property(prop) => prop
                        .downcast_ref::<Vec<f64>>()
                        .and_then(|values| values.get(v as usize).copied())
                        .ok_or_else(|| NativeError::graph("degree property must be a double map")),
                }
            })?
            .def("fail", |kind: String, message: String| -> NativeResult<()> {
                Err(match kind.as_str() {
                    "io" => NativeError::io(message),
                    "value" => NativeError::value(message),
                    _ => NativeError::graph(message),
                })
            })?
            .def("swap", |p: (u64, u64)| Ok((p.1, p.0)))?
            .def("midpoint", |p: (f64, f64)| Ok((p.0 + p.1) / 2.0))?
            .def("flag", |name: String| Ok((name, true)))?
            .def("sum", |values: Vec<f64>| Ok(values.iter().sum::<f64>()))?
            .def("scale", |values: Vector<f64>, factor: f64| -> NativeResult<()> {
                let mut view = values
                    .export_array()
                    .map_err(|e| NativeError::value(e.to_string()))?;
                view.iter_mut().for_each(|x| *x *= factor);
                Ok(())
            })?
            .def("guarded", |_a: u64, _b: String| {
                GUARDED_CALLS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
        Ok(())
    }
}

fn bridge() -> Bridge {
    Bridge::builder(BridgeConfig::default())
        .module(ToyEngine)
        .build()
        .unwrap()
}

fn graph_with_path(bridge: &Bridge) -> HostValue {
    let g = bridge.call("new_graph", &[]).unwrap();
    bridge.call("add_vertices", &[g.clone(), HostValue::Int(3)]).unwrap();
    for (s, t) in [(0, 1), (1, 2), (0, 2)] {
        bridge
            .call("add_edge", &[g.clone(), HostValue::Int(s), HostValue::Int(t)])
            .unwrap();
    }
    g
}

#[test]
fn test_engine_handle_round_trip() {
    let bridge = bridge();
    let g = graph_with_path(&bridge);
    assert_eq!(g.type_name(), "GraphInterface");
    assert_eq!(
        g.as_object().unwrap().get_attr("num_vertices").unwrap(),
        HostValue::Int(3)
    );

    let edges = bridge.call("edges", &[g]).unwrap();
    assert_eq!(edges.type_name(), "Vector_uint64_t");
    let pairs: Vec<u64> = bridge.extract(&edges).unwrap();
    assert_eq!(pairs, [0, 1, 1, 2, 0, 2]);
}

#[test]
fn test_degree_selector() {
    let bridge = bridge();
    let g = graph_with_path(&bridge);

    let degree = |sel: HostValue| bridge.call("degree", &[g.clone(), HostValue::Int(2), sel]);
    assert_eq!(degree(Degree::In.into_host()).unwrap(), HostValue::Float(2.0));
    assert_eq!(degree(Degree::Out.into_host()).unwrap(), HostValue::Float(0.0));
    assert_eq!(degree(Degree::Total.into_host()).unwrap(), HostValue::Float(2.0));

    let weights = AnyHandle::new(vec![0.5_f64, 1.5, 2.5]).into_host();
    assert_eq!(degree(weights).unwrap(), HostValue::Float(2.5));

    // None is the empty property, which this engine rejects itself
    let err = degree(HostValue::None).unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Runtime);

    let err = degree(HostValue::Int(1)).unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Type);
    assert_eq!(err.message(), "cannot convert int to deg_t");
}

#[test]
fn test_error_translation_per_kind() {
    let bridge = bridge();
    for (kind, expected) in [
        ("graph", HostErrorKind::Runtime),
        ("io", HostErrorKind::Io),
        ("value", HostErrorKind::Value),
    ] {
        let err = bridge
            .call("fail", &[HostValue::from(kind), HostValue::from("boom")])
            .unwrap_err();
        assert_eq!(err.kind(), expected);
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.get_attr("message").unwrap(), HostValue::from("boom"));
    }

    let g = graph_with_path(&bridge);
    let err = bridge
        .call("add_edge", &[g, HostValue::Int(0), HostValue::Int(9)])
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Value);
    assert_eq!(err.message(), "invalid vertex: 9");
}

#[test]
fn test_pairs_cross_as_tuples() {
    let bridge = bridge();
    let swapped = bridge
        .call("swap", &[HostValue::Tuple(vec![HostValue::Int(1), HostValue::Int(2)])])
        .unwrap();
    assert_eq!(swapped, HostValue::Tuple(vec![HostValue::Int(2), HostValue::Int(1)]));

    let mid = bridge
        .call("midpoint", &[HostValue::List(vec![HostValue::Float(1.0), HostValue::Int(2)])])
        .unwrap();
    assert_eq!(mid, HostValue::Float(1.5));

    let flag = bridge.call("flag", &[HostValue::from("directed")]).unwrap();
    assert_eq!(
        flag,
        HostValue::Tuple(vec![HostValue::from("directed"), HostValue::Bool(true)])
    );

    let err = bridge
        .call("swap", &[HostValue::Tuple(vec![HostValue::Int(1)])])
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Type);
}

#[test]
fn test_sequences_copy_in_and_share_out() {
    let bridge = bridge();
    let values = HostValue::List(vec![HostValue::Float(1.0), HostValue::Int(2)]);
    assert_eq!(bridge.call("sum", &[values]).unwrap(), HostValue::Float(3.0));

    let vector = Vector::from_vec(vec![1.0_f64, 2.0]).into_host();
    bridge
        .call("scale", &[vector.clone(), HostValue::Float(10.0)])
        .unwrap();
    let seq = vector.as_sequence().unwrap();
    assert_eq!(seq.get_item(1).unwrap(), HostValue::Float(20.0));

    // A plain list is not a shared vector
    let err = bridge
        .call("scale", &[HostValue::List(vec![]), HostValue::Float(1.0)])
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Type);
}

#[test]
fn test_host_exported_buffer_locks_native_access() {
    let bridge = bridge();
    let vector = Vector::from_vec(vec![1.0_f64, 2.0, 3.0]).into_host();
    let seq = vector.as_sequence().unwrap();

    let buffer = seq.export_array().unwrap();
    let array = buffer.as_sequence().unwrap();
    array.set_item(0, &HostValue::Float(5.0)).unwrap();
    assert_eq!(
        buffer.as_object().unwrap().get_attr("typestr").unwrap(),
        HostValue::from(if cfg!(target_endian = "little") { "<f8" } else { ">f8" })
    );

    let err = bridge
        .call("scale", &[vector.clone(), HostValue::Float(2.0)])
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Value);
    assert!(seq.get_item(0).is_err());

    drop(buffer);
    bridge
        .call("scale", &[vector.clone(), HostValue::Float(2.0)])
        .unwrap();
    assert_eq!(seq.get_item(0).unwrap(), HostValue::Float(10.0));
    assert_eq!(seq.get_item(2).unwrap(), HostValue::Float(6.0));
}

#[test]
fn test_failed_argument_stops_before_native_code() {
    let bridge = bridge();
    let before = GUARDED_CALLS.load(Ordering::SeqCst);

    let err = bridge
        .call("guarded", &[HostValue::Int(1), HostValue::Int(2)])
        .unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Type);
    let err = bridge
        .call("guarded", &[HostValue::Int(-1), HostValue::from("ok")])
        .unwrap_err();
    assert_eq!(err.message(), "cannot convert int to uint64_t");
    assert_eq!(GUARDED_CALLS.load(Ordering::SeqCst), before);

    bridge
        .call("guarded", &[HostValue::Int(1), HostValue::from("ok")])
        .unwrap();
    assert!(GUARDED_CALLS.load(Ordering::SeqCst) > before);
}

#[test]
fn test_wrong_argument_count() {
    let bridge = bridge();
    let err = bridge.call("swap", &[]).unwrap_err();
    assert_eq!(err.kind(), HostErrorKind::Type);
    assert_eq!(err.message(), "swap() takes 1 arguments (0 given)");
}

#[test]
fn test_engine_operations_need_registered_types() {
    struct Careless;

    impl NativeModule for Careless {
        fn name(&self) -> &str {
            "careless"
        }

        fn register_operations(
            &self,
            ops: &mut OperationTableBuilder<'_>,
        ) -> Result<(), BridgeError> {
            ops.def("graph_size", |g: Handle<ToyGraph>| Ok(*g.vertices.read()))?;
            Ok(())
        }
    }

    let err = Bridge::builder(BridgeConfig::default())
        .module(Careless)
        .build()
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnregisteredType { .. }));
}

#[test]
fn test_persistence_hooks_through_builtins() {
    let bridge = bridge();
    let dumps = HostFunction::new("dumps", |args| match &args[0] {
        HostValue::Str(s) => Ok(HostValue::Bytes(s.as_bytes().to_vec())),
        other => Err(HostError::type_error(format!("cannot pickle {}", other.type_name()))),
    });
    let loads = HostFunction::new("loads", |args| match &args[0] {
        HostValue::Bytes(b) => Ok(HostValue::Str(String::from_utf8_lossy(b).into_owned())),
        _ => Err(HostError::value("bad state")),
    });
    bridge.call("set_pickler", &[HostValue::Function(dumps)]).unwrap();
    bridge.call("set_unpickler", &[HostValue::Function(loads)]).unwrap();

    let state = bridge.hooks().pickle(&HostValue::from("abc")).unwrap();
    assert_eq!(state, HostValue::Bytes(b"abc".to_vec()));
    assert_eq!(bridge.hooks().unpickle(&state).unwrap(), HostValue::from("abc"));
    assert_eq!(
        bridge.hooks().pickle(&HostValue::Int(1)).unwrap_err().kind(),
        HostErrorKind::Type
    );
}

#[test]
fn test_mod_info_properties() {
    let bridge = bridge();
    let info = bridge.call("mod_info", &[]).unwrap();
    let info = info.as_object().unwrap();
    assert_eq!(info.class_name(), "mod_info");
    assert_eq!(info.get_attr("name").unwrap(), HostValue::from("graft"));
    assert!(info.get_attr("version").is_ok());
    assert!(info.set_attr("name", HostValue::from("x")).is_err());
}
