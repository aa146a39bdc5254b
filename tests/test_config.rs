use graft::config::CONFIG_FILE;
use graft::logging::LogFormat;
use graft::{Bridge, BridgeConfig, ConfigError, Degree, DegreeSelector, IntoHost};
use tempfile::TempDir;

#[test]
fn test_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);

    let mut config = BridgeConfig::default();
    config.conversion.strict_variants = true;
    config.logging.format = LogFormat::Compact;
    config.save(&path).unwrap();

    let loaded = BridgeConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_discover_walks_up() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE),
        "[logging]\nlevel = \"trace\"\n",
    )
    .unwrap();
    let nested = dir.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    let config = BridgeConfig::discover(&nested);
    assert_eq!(config.logging.level, "trace");
    assert!(!config.conversion.strict_variants);
}

#[test]
fn test_discover_ignores_broken_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "[conversion\n").unwrap();
    assert_eq!(BridgeConfig::discover(dir.path()), BridgeConfig::default());
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_config_drives_the_bridge() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, "[conversion]\nstrict_variants = true\n").unwrap();

    let bridge = Bridge::new(BridgeConfig::load(&path).unwrap()).unwrap();
    assert!(bridge.config().conversion.strict_variants);
    let selector: DegreeSelector = bridge.extract(&Degree::Total.into_host()).unwrap();
    assert!(matches!(selector, DegreeSelector::Degree(Degree::Total)));
}

#[test]
fn test_logging_table_installs_the_subscriber() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE),
        "[logging]\nlevel = \"debug\"\nformat = \"compact\"\nfilter = \"graft::ops=trace\"\n",
    )
    .unwrap();
    let config = BridgeConfig::discover(dir.path());

    assert!(config.init_logging());
    assert!(tracing::enabled!(tracing::Level::DEBUG));
    assert!(tracing::enabled!(target: "graft::ops", tracing::Level::TRACE));

    // Later calls keep the first subscriber
    assert!(!config.init_logging());
    assert!(!BridgeConfig::default().init_logging());
}
