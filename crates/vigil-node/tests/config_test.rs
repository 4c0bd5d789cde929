use tempfile::TempDir;
use vigil_node::{NodeConfig, DEFAULT_CONFIG_FILE};
use vigil_protocol::SelectionPolicy;
use vigil_types::{TokenAmount, DAY};

#[test]
fn test_config_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(DEFAULT_CONFIG_FILE);

    let mut config = NodeConfig::default();
    config.protocol.escrow.dispute_window = 3 * DAY;
    config.protocol.factory.selection_policy = SelectionPolicy::HighestStake;
    config.protocol.committee.reward_per_vote = "2.5".parse().unwrap();
    config.logging.format = "json".to_string();
    config
        .logging
        .module_filters
        .insert("vigil_protocol::arbitration".to_string(), "debug".to_string());
    config.simulation.beacon_seed = "roundtrip".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = NodeConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.protocol.committee.reward_per_vote,
        TokenAmount::from_base_units(2_500_000_000_000_000_000)
    );
    loaded.validate().unwrap();
}

#[test]
fn test_partial_config_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
[protocol.escrow]
dispute_window = 86400

[protocol.factory]
platform_fee_bps = 100
min_payout = "5"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = NodeConfig::from_file(&path).unwrap();
    assert_eq!(config.protocol.escrow.dispute_window, DAY);
    assert_eq!(config.protocol.escrow.worker_share_bps, 8_000);
    assert_eq!(config.protocol.factory.platform_fee_bps, 100);
    assert_eq!(config.protocol.factory.min_payout, TokenAmount::from_tokens(5));
    assert_eq!(config.protocol.committee.panel_size, 3);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "pretty");
    assert_eq!(config.simulation.start_time, 1_700_000_000);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[protocol.committee]\npanel_size = 9\n").unwrap();

    let config = NodeConfig::from_file(&path).unwrap();
    assert!(config.validate().is_err());

    std::fs::write(&path, "[protocol.escrow\n").unwrap();
    assert!(NodeConfig::from_file(&path).is_err());
    assert!(NodeConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
}
