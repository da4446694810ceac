use std::sync::Arc;

use serde_json::json;

use super::picker::ProxyPicker;
use super::registry::{NodeRegistry, MAX_FAILURES};
use super::StatsMap;
use crate::config::{NodeAddr, Strategy};

fn addr(port: u16) -> NodeAddr {
    NodeAddr::new("127.0.0.1", port)
}

fn picker_for(strategy: Strategy, ports: &[u16]) -> (ProxyPicker, Arc<NodeRegistry>, Arc<StatsMap>) {
    let pool: Vec<NodeAddr> = ports.iter().map(|p| addr(*p)).collect();
    let registry = Arc::new(NodeRegistry::new(pool.clone()));
    let stats = Arc::new(StatsMap::new());
    for node in &pool {
        stats.insert(node.clone(), None);
    }
    let picker = ProxyPicker::new(strategy, registry.clone(), stats.clone());
    (picker, registry, stats)
}

#[test]
fn test_empty_pool_yields_none() {
    let (picker, _, _) = picker_for(Strategy::RoundRobin, &[]);
    assert_eq!(picker.pick(), None);
    assert_eq!(picker.cursor(), 0);
}

#[test]
fn test_round_robin_cycles_in_configured_order() {
    let (picker, _, _) = picker_for(Strategy::RoundRobin, &[9001, 9002, 9003]);
    assert_eq!(picker.pick().unwrap(), addr(9001));
    assert_eq!(picker.pick().unwrap(), addr(9002));
    assert_eq!(picker.pick().unwrap(), addr(9003));
    assert_eq!(picker.pick().unwrap(), addr(9001));
    assert_eq!(picker.cursor(), 4);
}

#[test]
fn test_round_robin_skips_unhealthy_nodes() {
    let (picker, registry, _) = picker_for(Strategy::RoundRobin, &[9001, 9002]);
    for _ in 0..MAX_FAILURES {
        registry.mark_unhealthy(&addr(9001));
    }
    assert_eq!(picker.pick().unwrap(), addr(9002));
    assert_eq!(picker.pick().unwrap(), addr(9002));
}

#[test]
fn test_round_robin_cursor_survives_health_changes() {
    let (picker, registry, _) = picker_for(Strategy::RoundRobin, &[9001, 9002, 9003]);
    picker.pick();
    picker.pick();
    assert_eq!(picker.cursor(), 2);

    for _ in 0..MAX_FAILURES {
        registry.mark_unhealthy(&addr(9002));
    }
    // Cursor keeps counting from 2; the modulus shrinks to the two
    // remaining candidates [9001, 9003].
    assert_eq!(picker.pick().unwrap(), addr(9001));
    assert_eq!(picker.cursor(), 3);

    registry.mark_healthy(&addr(9002));
    assert_eq!(picker.pick().unwrap(), addr(9001));
    assert_eq!(picker.cursor(), 4);
}

#[test]
fn test_round_robin_fail_open_uses_full_pool() {
    let (picker, registry, _) = picker_for(Strategy::RoundRobin, &[9001, 9002]);
    for _ in 0..MAX_FAILURES {
        registry.mark_unhealthy(&addr(9001));
        registry.mark_unhealthy(&addr(9002));
    }
    assert_eq!(picker.pick().unwrap(), addr(9001));
    assert_eq!(picker.pick().unwrap(), addr(9002));
}

#[test]
fn test_least_loaded_picks_smallest_total_requests() {
    let (picker, _, stats) = picker_for(Strategy::LeastLoaded, &[9001, 9002, 9003]);
    stats.insert(addr(9001), Some(json!({"total_requests": 40})));
    stats.insert(addr(9002), Some(json!({"total_requests": 7})));
    stats.insert(addr(9003), Some(json!({"total_requests": 12})));

    assert_eq!(picker.pick().unwrap(), addr(9002));
    // No cursor movement under least-loaded.
    assert_eq!(picker.cursor(), 0);
}

#[test]
fn test_least_loaded_prefers_never_polled_nodes() {
    let (picker, _, stats) = picker_for(Strategy::LeastLoaded, &[9001, 9002]);
    stats.insert(addr(9001), Some(json!({"total_requests": 3})));
    // 9002 has no snapshot; it counts as zero load.
    assert_eq!(picker.pick().unwrap(), addr(9002));
}

#[test]
fn test_least_loaded_ties_break_by_configured_order() {
    let (picker, _, stats) = picker_for(Strategy::LeastLoaded, &[9003, 9001, 9002]);
    for port in [9001, 9002, 9003] {
        stats.insert(addr(port), Some(json!({"total_requests": 5})));
    }
    assert_eq!(picker.pick().unwrap(), addr(9003));
}

#[test]
fn test_least_loaded_ignores_unhealthy_nodes() {
    let (picker, registry, stats) = picker_for(Strategy::LeastLoaded, &[9001, 9002]);
    stats.insert(addr(9001), Some(json!({"total_requests": 0})));
    stats.insert(addr(9002), Some(json!({"total_requests": 100})));
    for _ in 0..MAX_FAILURES {
        registry.mark_unhealthy(&addr(9001));
    }
    assert_eq!(picker.pick().unwrap(), addr(9002));
}
