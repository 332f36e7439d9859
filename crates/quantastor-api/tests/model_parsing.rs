//! Integration tests for parsing QuantaStor response data.
//!
//! These tests validate that the quantastor-api models deserialize the
//! response shapes the array sends: flat objects, `obj` envelopes and bare
//! enumeration lists.

use quantastor_api::models::{parse, parse_list, parse_optional};
use quantastor_api::{Host, HostGroup, Pool, TaskState, Volume};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load a JSON fixture from disk.
fn load_fixture(name: &str) -> Value {
    let fixture_path = fixtures_dir().join(name);
    let data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&data)
        .unwrap_or_else(|e| panic!("Fixture {} is not valid JSON: {}", name, e))
}

#[test]
fn test_flat_and_enveloped_volume_are_identical() {
    let flat: Volume = parse(&load_fixture("storage_volume.json")).unwrap();
    let enveloped: Volume = parse(&load_fixture("storage_volume_envelope.json")).unwrap();

    assert_eq!(flat, enveloped);
    assert_eq!(flat.name, "volume-6f1c2a1e");
    assert_eq!(flat.id, "8f3d0b5c-4a2e-9c71-0d1b-7e55a1f0c2d4");
    assert_eq!(flat.size, 1_073_741_824);
    assert!(flat.iqn.ends_with(":volume-6f1c2a1e"));
}

#[test]
fn test_volume_list() {
    let volumes: Vec<Volume> = parse_list(&load_fixture("storage_volume_list.json")).unwrap();

    assert_eq!(volumes.len(), 2, "Expected 2 volumes in test data");
    assert_eq!(volumes[0].name, "volume-6f1c2a1e");
    // Sizes may arrive as decimal strings
    assert_eq!(volumes[1].size, 2_147_483_648);
}

#[test]
fn test_host_initiators_prefer_iqn_then_wwpn() {
    let host: Host = parse(&load_fixture("host.json")).unwrap();

    assert_eq!(host.name, "compute-07");
    assert_eq!(host.id, "5d2a7c91-3e0f-4b68-a1c4-f29e6b8d0a13");
    assert_eq!(
        host.initiators,
        vec![
            "iqn.1993-08.org.debian:01:7c3e9a5b1f2d".to_string(),
            "21:00:00:24:ff:4c:9a:12".to_string(),
        ]
    );
}

#[test]
fn test_host_group_members() {
    let group: HostGroup = parse(&load_fixture("host_group.json")).unwrap();

    assert_eq!(group.name, "compute-rack-2");
    assert_eq!(group.hosts.len(), 2);
    assert_eq!(group.hosts[0].initiators.len(), 1);
    assert!(group.hosts[1].initiators.is_empty());
}

#[test]
fn test_pool_space_accounting() {
    let pool: Pool = parse(&load_fixture("storage_pool.json")).unwrap();

    assert_eq!(pool.name, "pool-A");
    assert_eq!(pool.size, 10_995_116_277_760);
    assert_eq!(pool.free_space, 8_796_093_022_208);
    assert_eq!(pool.used_space(), 2_199_023_255_552);
}

#[test]
fn test_empty_lookup_shapes_read_as_absent() {
    for body in [Value::Null, serde_json::json!({}), serde_json::json!({ "obj": {} })] {
        let volume: Option<Volume> = parse_optional(&body).unwrap();
        assert_eq!(volume, None, "Expected {body} to be absent");
    }
}

#[test]
fn test_completed_task_fixture() {
    let task = load_fixture("task_completed.json");

    let state = TaskState::from_code(task["taskState"].as_i64().unwrap());
    assert_eq!(state, TaskState::Completed);
    assert!(state.is_terminal());
    assert_eq!(
        task["customId"].as_str(),
        Some("8f3d0b5c-4a2e-9c71-0d1b-7e55a1f0c2d4")
    );
}
