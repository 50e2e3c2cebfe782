// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_instance_starts_registered_without_vm_id() {
    let vm = VmInstance::new("1.0.0", "abc1234", 1_000);
    assert_eq!(vm.state, VmState::Registered);
    assert!(vm.vm_id.is_none());

    let json = serde_json::to_value(&vm).unwrap();
    assert!(json.get("vmId").is_none());
    assert_eq!(json["agentVersion"], "1.0.0");
    assert_eq!(json["state"], "REGISTERED");
}

#[test]
fn states_use_server_spelling() {
    for (state, wire) in [
        (VmState::Registered, "\"REGISTERED\""),
        (VmState::Running, "\"RUNNING\""),
        (VmState::Terminated, "\"TERMINATED\""),
        (VmState::Offline, "\"OFFLINE\""),
    ] {
        assert_eq!(serde_json::to_string(&state).unwrap(), wire);
    }
}
