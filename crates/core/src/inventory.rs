// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inventory filtering.
//!
//! Inventory maps are supplied by the host; the agent only filters them
//! through the configured allow/deny globs before registration.

use std::collections::BTreeMap;

use crate::InventoryFilter;

/// Keep only the keys the filter admits.
pub fn filter_inventory(
    inventory: BTreeMap<String, serde_json::Value>,
    filter: &InventoryFilter,
) -> BTreeMap<String, serde_json::Value> {
    inventory.into_iter().filter(|(key, _)| filter.keeps(key)).collect()
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
