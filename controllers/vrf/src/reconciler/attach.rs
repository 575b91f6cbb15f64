//! Per-switch attachment diffing

use super::model::{
    AttachmentRecord, CONTROLLER_INSTANCE_KEYS, InstanceValues, VRF_LITE_PROPERTIES, VrfLiteConn,
};
use tracing::debug;

/// Compare the desired attachments of one VRF with the controller's.
///
/// Returns the attachments that must be (re)sent and whether the VRF needs
/// a deploy even when nothing is sent. Freeform config and controller-owned
/// loopback values are carried over from the controller. With `replace`,
/// a differing number of VRF-LITE connections forces a resend.
pub fn diff_for_attach_deploy(
    want_list: &[AttachmentRecord],
    have_list: &[AttachmentRecord],
    replace: bool,
) -> (Vec<AttachmentRecord>, bool) {
    let mut attach_list = Vec::new();
    let mut dep_vrf = false;

    for want in want_list {
        let mut want = want.clone();
        let mut found = false;
        let mut pushed = false;

        if let Some(have) = have_list.iter().find(|h| h.serial_number == want.serial_number) {
            want.freeform_config = have.freeform_config.clone();
            let (want_inst, have_inst) = merge_instance_values(&mut want, have);

            match (want.has_vrf_lite(), have.has_vrf_lite()) {
                (true, true) => {
                    let (want_conns, have_conns) = (lite_conns(&want), lite_conns(have));
                    if replace && want_conns.len() != have_conns.len() {
                        debug!(
                            "vrf {} switch {}: VRF-LITE count {} != {}",
                            want.vrf_name,
                            want.serial_number,
                            want_conns.len(),
                            have_conns.len()
                        );
                        found = false;
                    } else {
                        found = vrf_lite_matches(want_conns, have_conns);
                    }
                }
                (true, false) => found = false,
                (false, true) => found = !replace,
                (false, false) => {
                    found = true;
                    if have.is_attached != want.is_attached {
                        want.deployment = true;
                        if want.is_deploy {
                            dep_vrf = true;
                        }
                        attach_list.push(want.clone());
                        pushed = true;
                    } else if (want.deployment != have.deployment || want.is_deploy != have.is_deploy)
                        && want.is_deploy
                    {
                        dep_vrf = true;
                    }
                }
            }

            if found && instance_values_differ(&want_inst, &have_inst) {
                debug!(
                    "vrf {} switch {}: instance values differ",
                    want.vrf_name, want.serial_number
                );
                found = false;
            }
        }

        if !found && !pushed && want.is_attached {
            want.deployment = true;
            if want.is_deploy {
                dep_vrf = true;
            }
            attach_list.push(want);
        }
    }
    (attach_list, dep_vrf)
}

/// Take the controller-assigned loopback values from `have`.
///
/// Returns the instance values of both sides for comparison.
fn merge_instance_values(
    want: &mut AttachmentRecord,
    have: &AttachmentRecord,
) -> (InstanceValues, InstanceValues) {
    let (Some(want_inst), Some(have_inst)) = (want.instance_values.as_mut(), have.instance_values.as_ref())
    else {
        return (InstanceValues::new(), InstanceValues::new());
    };
    for key in CONTROLLER_INSTANCE_KEYS {
        if let Some(value) = have_inst.get(key) {
            want_inst.insert(key.to_string(), value.clone());
        }
    }
    (want_inst.clone(), have_inst.clone())
}

/// A key differs when the controller lacks it or holds another value;
/// a missing key equals an empty one
fn instance_values_differ(want: &InstanceValues, have: &InstanceValues) -> bool {
    want.iter()
        .any(|(key, value)| have.get(key).map_or("", String::as_str) != value.as_str())
}

fn lite_conns(record: &AttachmentRecord) -> &[VrfLiteConn] {
    record
        .extension_values
        .as_ref()
        .map(|ext| ext.vrf_lite_conn.as_slice())
        .unwrap_or_default()
}

/// Every desired connection has a controller connection on the same
/// interface with the same properties. Properties left empty in the
/// playbook are filled by the controller, so they match any value.
fn vrf_lite_matches(want: &[VrfLiteConn], have: &[VrfLiteConn]) -> bool {
    want.iter().all(|wlite| {
        let want_if = wlite.get("IF_NAME").map_or("", String::as_str);
        have.iter()
            .filter(|hlite| want_if.is_empty() || hlite.get("IF_NAME").map(String::as_str) == Some(want_if))
            .any(|hlite| vrf_lite_properties_match(wlite, hlite))
    })
}

fn vrf_lite_properties_match(want: &VrfLiteConn, have: &VrfLiteConn) -> bool {
    VRF_LITE_PROPERTIES.iter().all(|prop| {
        let want_value = want.get(*prop).map_or("", String::as_str);
        want_value.is_empty() || have.get(*prop).map_or("", String::as_str) == want_value
    })
}
