use fusewatt::dynconfig::{ConfigStore, DataManagerConfig, Direction, ManualConfig, Mode};

#[test]
fn reload_after_crash_between_writes_reflects_last_committed_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fusewatt_config.json");

    let mut store = ConfigStore::load_or_default(&path).unwrap();
    store.set_mode_manual(ManualConfig { amount: 1200, direction: Direction::Discharge }).unwrap();
    store.set_data_manager(DataManagerConfig { host: "10.0.0.5".to_string(), port: 502, max_fuse_current: 35.0 }).unwrap();

    assert!(!path.with_extension("json.tmp").exists());

    let reloaded = ConfigStore::load_or_default(&path).unwrap();
    assert_eq!(reloaded.mode_manual().amount, 1200);
    assert_eq!(reloaded.data_manager().host, "10.0.0.5");
    assert_eq!(reloaded.general().mode, Mode::Idle);
}

#[test]
fn rejected_mutation_leaves_prior_document_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fusewatt_config.json");

    let mut store = ConfigStore::load_or_default(&path).unwrap();
    store.set_mode_manual(ManualConfig { amount: 500, direction: Direction::Charge }).unwrap();

    let bad = fusewatt::dynconfig::GeneralConfig { mode: Mode::Idle, autostart: false, debug: false, loop_delay_seconds: 0 };
    assert!(store.set_general(bad).is_err());

    // the rejected mutation must not have been persisted
    let reloaded = ConfigStore::load_or_default(&path).unwrap();
    assert_eq!(reloaded.mode_manual().amount, 500);
    assert_eq!(reloaded.general().loop_delay_seconds, 10);
}
