use graft::{BridgeBuilder, BridgeConfig, BridgeError, HostValue};

// The process-wide bridge can only be installed once per test binary, so
// everything about it lives in this single test.
#[test]
fn test_second_init_is_rejected() {
    assert!(graft::global().is_none());

    let bridge = graft::init(BridgeBuilder::new(BridgeConfig::default())).unwrap();
    assert_eq!(
        bridge.call("openmp_enabled", &[]).unwrap(),
        HostValue::Bool(cfg!(feature = "parallel"))
    );

    let mut strict = BridgeConfig::default();
    strict.conversion.strict_variants = true;
    let err = graft::init(BridgeBuilder::new(strict)).unwrap_err();
    assert_eq!(err, BridgeError::AlreadyInitialized);

    let installed = graft::global().unwrap();
    assert!(std::ptr::eq(installed, bridge));
    assert!(!installed.config().conversion.strict_variants);
}
