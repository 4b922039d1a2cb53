//! Invariant enforcement with contract tracking for the setup passes.

#[cfg(feature = "contracts")]
use lazy_static::lazy_static;
#[cfg(feature = "contracts")]
use std::collections::HashSet;
#[cfg(feature = "contracts")]
use std::sync::Mutex;

// Invariant constants for contract tracking.
pub const REGISTRY_UNIQUE_NAMES: u32 = 1;
pub const BOOK_REJECTS_INVALID: u32 = 2;
pub const CLUSTERS_FULLY_FLATTENED: u32 = 3;
pub const DATA_DEP_DRAINED: u32 = 4;
pub const FLOW_TYPES_RESOLVED: u32 = 5;
pub const EDGES_MATCH_CONNECTIONS: u32 = 6;
pub const REQUIRED_PORTS_COVERED: u32 = 7;
pub const GRAPH_CONNECTED: u32 = 8;
pub const GRAPH_ACYCLIC: u32 = 9;
pub const FREQUENCIES_CONSISTENT: u32 = 10;
pub const RESET_REPLAYS_PLANNED: u32 = 11;

#[cfg(feature = "contracts")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "contracts")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        panic!("{}", full_message);
    }
    INVARIANT_LOG.lock().unwrap().insert(id);
}

#[cfg(not(feature = "contracts"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "contracts")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock().unwrap();
    let mut missing = Vec::new();
    for &inv in required_invariants {
        if !log.contains(&inv) {
            missing.push(inv);
        }
    }
    drop(log);
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "contracts"))]
/// Contract test: no-op when the contracts feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "contracts")]
/// Clear the invariant log (for between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG.lock().unwrap().clear();
}

#[cfg(not(feature = "contracts"))]
/// Clear the invariant log: no-op when the contracts feature is disabled.
pub fn clear_invariant_log() {}
