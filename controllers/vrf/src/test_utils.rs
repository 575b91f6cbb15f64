//! Test utilities for unit testing the reconciler
//!
//! This module provides helpers for creating test data and setting up a mock
//! fabric with three switches.

use crate::reconciler::inventory::{Inventory, SwitchInfo};
use crate::reconciler::model::{AttachmentRecord, FabricVrfs, InstanceValues, ReconciliationContext, VrfAttach, VrfRecord};
use crate::reconciler::want::vrf_record;
use crate::reconciler::{Reconciler, ReconcilerSettings};
use ndfc_client::{ApiPaths, ApiVersion, MockNdfcClient};
use vrf_playbook::{State, VrfConfig};

pub const FABRIC: &str = "fabric1";

/// Switches of the test fabric: two leaves and a border gateway
pub fn test_switches() -> Vec<SwitchInfo> {
    vec![
        SwitchInfo::new("10.0.0.1", "S1", "leaf"),
        SwitchInfo::new("10.0.0.2", "S2", "leaf"),
        SwitchInfo::new("10.0.0.3", "S3", "border gateway"),
    ]
}

pub fn test_inventory() -> Inventory {
    Inventory::from_switches(test_switches(), "Switch_Fabric")
}

/// Settings that never sleep and give each request a single attempt
pub fn test_settings() -> ReconcilerSettings {
    ReconcilerSettings {
        check_mode: false,
        wait_time_for_delete_loop: 1,
        delete_wait_timeout: 5,
        rest_timeout: 1,
        send_interval: 1,
        unit_test: true,
    }
}

/// Mock controller serving `fabric1` with the test switches
pub fn mock_fabric() -> MockNdfcClient {
    let client = MockNdfcClient::new("http://ndfc.test").with_fabric(FABRIC);
    for switch in test_switches() {
        client.add_switch(&switch.ip_address, &switch.serial_number, &switch.role);
    }
    client
}

pub fn create_test_reconciler(client: &MockNdfcClient) -> Reconciler {
    create_test_reconciler_with(client, test_inventory(), test_settings())
}

pub fn create_test_reconciler_with(
    client: &MockNdfcClient,
    inventory: Inventory,
    settings: ReconcilerSettings,
) -> Reconciler {
    Reconciler::new(
        client.clone(),
        ApiPaths::for_version(ApiVersion::V12),
        FABRIC,
        inventory,
        settings,
    )
}

/// VRF record as the playbook would produce it
pub fn create_test_vrf(vrf_name: &str, vrf_id: Option<u64>, vlan_id: Option<u64>) -> VrfRecord {
    let config = VrfConfig {
        vrf_id,
        vlan_id,
        ..VrfConfig::named(vrf_name)
    };
    vrf_record(FABRIC, &config)
}

/// Attached and deployed attachment with empty instance values
pub fn create_test_attachment(vrf_name: &str, serial_number: &str, vlan: u64) -> AttachmentRecord {
    let instance_values: InstanceValues = ["loopbackId", "loopbackIpAddress", "loopbackIpV6Address"]
        .iter()
        .map(|k| ((*k).to_string(), String::new()))
        .collect();
    AttachmentRecord {
        fabric: FABRIC.to_string(),
        vrf_name: vrf_name.to_string(),
        serial_number: serial_number.to_string(),
        vlan,
        is_attached: true,
        deployment: true,
        is_deploy: true,
        extension_values: None,
        instance_values: Some(instance_values),
        freeform_config: String::new(),
        vrf_lite: Vec::new(),
    }
}

pub fn vrf_attach(vrf_name: &str, lan_attach_list: Vec<AttachmentRecord>) -> VrfAttach {
    VrfAttach {
        vrf_name: vrf_name.to_string(),
        lan_attach_list,
    }
}

/// Fabric state holding `vrfs` and `attach`, deployed where attached
pub fn fabric_vrfs(vrfs: Vec<VrfRecord>, attach: Vec<VrfAttach>) -> FabricVrfs {
    let deploy = attach
        .iter()
        .filter(|a| a.lan_attach_list.iter().any(|r| r.deployment && r.is_deploy))
        .map(|a| a.vrf_name.clone())
        .collect();
    FabricVrfs {
        create: vrfs,
        attach,
        deploy,
    }
}

pub fn create_test_context(state: State, want: FabricVrfs, have: FabricVrfs) -> ReconciliationContext {
    ReconciliationContext {
        fabric: FABRIC.to_string(),
        state,
        want,
        have,
    }
}
