//! Playbook to desired state

use super::inventory::Inventory;
use super::model::{
    AttachmentRecord, CONTROLLER_INSTANCE_KEYS, ExtensionValues, InstanceValues, TemplateConfig, VRF_LITE_JYTHON_TEMPLATE,
    VrfAttach, VrfLiteConn, VrfRecord, Want,
};
use crate::error::ControllerError;
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use tracing::debug;
use vrf_playbook::{Playbook, VrfAttachConfig, VrfConfig, VrfLiteConfig};

/// Build the desired state for every VRF in the playbook.
///
/// Deleted and query runs only need the VRF names, so attachments are not
/// resolved for them.
pub fn build_want(playbook: &Playbook, inventory: &Inventory) -> Result<Want, ControllerError> {
    let mut want = Want::default();
    for vrf in &playbook.config {
        want.create.push(vrf_record(&playbook.fabric, vrf));
        if vrf.deploy {
            want.deploy.insert(vrf.vrf_name.clone());
        }
        if playbook.state.name_only() {
            continue;
        }
        let Some(attach) = vrf.attach.as_ref().filter(|a| !a.is_empty()) else {
            continue;
        };

        let mut seen = BTreeSet::new();
        let mut lan_attach_list = Vec::with_capacity(attach.len());
        for entry in attach {
            if !seen.insert(entry.ip_address.as_str()) {
                return Err(ControllerError::InvalidConfig(format!(
                    "switch {} is attached to vrf {} more than once",
                    entry.ip_address, vrf.vrf_name
                )));
            }
            lan_attach_list.push(attachment_record(&playbook.fabric, vrf, entry, inventory)?);
        }
        want.attach.push(VrfAttach {
            vrf_name: vrf.vrf_name.clone(),
            lan_attach_list,
        });
    }
    debug!(
        "Want has {} vrfs, {} with attachments",
        want.create.len(),
        want.attach.len()
    );
    Ok(want)
}

pub fn vrf_record(fabric: &str, vrf: &VrfConfig) -> VrfRecord {
    VrfRecord {
        fabric: fabric.to_string(),
        vrf_name: vrf.vrf_name.clone(),
        vrf_id: vrf.vrf_id,
        vrf_template: vrf.vrf_template.clone(),
        vrf_extension_template: vrf.vrf_extension_template.clone(),
        service_vrf_template: vrf.service_vrf_template.clone(),
        template_config: template_config(vrf),
        source: None,
    }
}

/// `vrfTemplateConfig` for a playbook entry; a missing VLAN becomes 0
pub fn template_config(vrf: &VrfConfig) -> TemplateConfig {
    let mut map = Map::new();
    let mut put = |key: &str, value: Value| {
        map.insert(key.to_string(), value);
    };
    put("vrfSegmentId", vrf.vrf_id.map_or(Value::Null, |id| json!(id)));
    put("vrfName", json!(vrf.vrf_name));
    put("vrfVlanId", json!(vrf.vlan_id.unwrap_or(0)));
    put("vrfVlanName", json!(vrf.vrf_vlan_name));
    put("vrfIntfDescription", json!(vrf.vrf_intf_desc));
    put("vrfDescription", json!(vrf.vrf_description));
    put("mtu", json!(vrf.vrf_int_mtu));
    put("tag", json!(vrf.loopback_route_tag));
    put("vrfRouteMap", json!(vrf.redist_direct_rmap));
    put("maxBgpPaths", json!(vrf.max_bgp_paths));
    put("maxIbgpPaths", json!(vrf.max_ibgp_paths));
    put("ipv6LinkLocalFlag", json!(vrf.ipv6_linklocal_enable));
    put("trmEnabled", json!(vrf.trm_enable));
    put("isRPAbsent", json!(vrf.no_rp));
    put("isRPExternal", json!(vrf.rp_external));
    put("rpAddress", json!(vrf.rp_address));
    put("loopbackNumber", vrf.rp_loopback_id.map_or(json!(""), |id| json!(id)));
    put("L3VniMcastGroup", json!(vrf.underlay_mcast_ip));
    put("multicastGroup", json!(vrf.overlay_mcast_group));
    put("trmBGWMSiteEnabled", json!(vrf.trm_bgw_msite));
    put("advertiseHostRouteFlag", json!(vrf.adv_host_routes));
    put("advertiseDefaultRouteFlag", json!(vrf.adv_default_routes));
    put("configureStaticDefaultRouteFlag", json!(vrf.static_default_route));
    put("bgpPassword", json!(vrf.bgp_password));
    put("bgpPasswordKeyType", json!(vrf.bgp_passwd_encrypt));
    put("ENABLE_NETFLOW", json!(vrf.netflow_enable));
    put("NETFLOW_MONITOR", json!(vrf.nf_monitor));
    put("disableRtAuto", json!(vrf.disable_rt_auto));
    put("routeTargetImport", json!(vrf.import_vpn_rt));
    put("routeTargetExport", json!(vrf.export_vpn_rt));
    put("routeTargetImportEvpn", json!(vrf.import_evpn_rt));
    put("routeTargetExportEvpn", json!(vrf.export_evpn_rt));
    put("routeTargetImportMvpn", json!(vrf.import_mvpn_rt));
    put("routeTargetExportMvpn", json!(vrf.export_mvpn_rt));
    TemplateConfig::new(map)
}

fn attachment_record(
    fabric: &str,
    vrf: &VrfConfig,
    entry: &VrfAttachConfig,
    inventory: &Inventory,
) -> Result<AttachmentRecord, ControllerError> {
    let switch = inventory
        .by_ip(&entry.ip_address)
        .ok_or_else(|| ControllerError::SwitchNotFound(entry.ip_address.clone()))?;

    let vrf_lite = entry.vrf_lite.clone().unwrap_or_default();
    let extension_values = if vrf_lite.is_empty() {
        None
    } else {
        if !switch.is_border() {
            return Err(ControllerError::VrfLiteNotAllowed(format!(
                "vrf_lite is only supported on border switches, {} has role {}",
                entry.ip_address, switch.role
            )));
        }
        Some(vrf_lite_extension(&vrf_lite))
    };

    let mut instance_values: InstanceValues = CONTROLLER_INSTANCE_KEYS
        .iter()
        .map(|key| ((*key).to_string(), String::new()))
        .collect();
    instance_values.insert("switchRouteTargetImportEvpn".to_string(), entry.import_evpn_rt.clone());
    instance_values.insert("switchRouteTargetExportEvpn".to_string(), entry.export_evpn_rt.clone());

    let deploy = entry.deploy && vrf.deploy;
    Ok(AttachmentRecord {
        fabric: fabric.to_string(),
        vrf_name: vrf.vrf_name.clone(),
        serial_number: switch.serial_number.clone(),
        vlan: vrf.vlan_id.unwrap_or(0),
        is_attached: true,
        deployment: deploy,
        is_deploy: deploy,
        extension_values,
        instance_values: Some(instance_values),
        freeform_config: String::new(),
        vrf_lite,
    })
}

/// Extension values as configured; unset properties stay empty until the
/// attachment is pushed
pub fn vrf_lite_extension(intents: &[VrfLiteConfig]) -> ExtensionValues {
    let vrf_lite_conn = intents
        .iter()
        .map(|intent| {
            let mut conn = VrfLiteConn::new();
            let text = |v: &Option<String>| v.clone().unwrap_or_default();
            conn.insert("IF_NAME".to_string(), text(&intent.interface));
            conn.insert(
                "DOT1Q_ID".to_string(),
                intent.dot1q.map(|d| d.to_string()).unwrap_or_default(),
            );
            conn.insert("IP_MASK".to_string(), text(&intent.ipv4_addr));
            conn.insert("NEIGHBOR_IP".to_string(), text(&intent.neighbor_ipv4));
            conn.insert("NEIGHBOR_ASN".to_string(), String::new());
            conn.insert("IPV6_MASK".to_string(), text(&intent.ipv6_addr));
            conn.insert("IPV6_NEIGHBOR".to_string(), text(&intent.neighbor_ipv6));
            conn.insert("AUTO_VRF_LITE_FLAG".to_string(), "false".to_string());
            conn.insert("PEER_VRF_NAME".to_string(), text(&intent.peer_vrf));
            conn.insert(
                "VRF_LITE_JYTHON_TEMPLATE".to_string(),
                VRF_LITE_JYTHON_TEMPLATE.to_string(),
            );
            conn
        })
        .collect();
    ExtensionValues {
        vrf_lite_conn,
        multisite_conn: Vec::new(),
    }
}
