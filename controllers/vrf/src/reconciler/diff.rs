//! Diff engine
//!
//! Pure functions from a [`ReconciliationContext`] to the [`DiffSets`] a run
//! has to push. Nothing here talks to the controller.

use super::attach::diff_for_attach_deploy;
use super::model::{
    AttachmentRecord, DeleteState, DiffSets, ReconciliationContext, VrfAttach, VrfRecord, value_eq,
};
use crate::error::ControllerError;
use std::collections::BTreeMap;
use tracing::debug;
use vrf_playbook::State;

/// Compare a desired VRF with the existing one.
///
/// Returns the record to PUT when the template differs, and whether it
/// differs. A `vrfVlanId` of 0 in the playbook means "keep whatever the
/// controller assigned" and is not compared.
pub fn diff_for_create(
    want: &VrfRecord,
    have: &VrfRecord,
) -> Result<(Option<VrfRecord>, bool), ControllerError> {
    if let (Some(want_id), Some(have_id)) = (want.vrf_id, have.vrf_id) {
        if want_id != have_id {
            return Err(ControllerError::VrfIdImmutable {
                vrf: want.vrf_name.clone(),
                have: have_id,
                want: want_id,
            });
        }
    }

    let want_vlan = want.template_config.vlan_id();
    let mut changed = want.vrf_template != have.vrf_template
        || want.vrf_extension_template != have.vrf_extension_template
        || !value_eq(
            &serde_json::json!(want.service_vrf_template),
            &serde_json::json!(have.service_vrf_template),
        );

    for (key, value) in want.template_config.iter() {
        if key == "vrfSegmentId" || (key == "vrfVlanId" && want_vlan == 0) {
            continue;
        }
        let have_value = have.template_config.get(key).unwrap_or(&serde_json::Value::Null);
        if !value_eq(value, have_value) {
            debug!(
                "vrf {}: {} changed from {} to {}",
                want.vrf_name, key, have_value, value
            );
            changed = true;
        }
    }

    if !changed {
        return Ok((None, false));
    }

    let mut update = want.clone();
    if let Some(id) = want.vrf_id.or(have.vrf_id) {
        update.set_vrf_id(id);
    }
    if want_vlan == 0 {
        update.template_config.set_vlan_id(have.template_config.vlan_id());
    }
    Ok((Some(update), true))
}

/// Attachments of a VRF that are currently attached, turned into detaches
pub fn get_items_to_detach(attachments: &[AttachmentRecord]) -> Vec<AttachmentRecord> {
    attachments
        .iter()
        .filter(|a| a.is_attached)
        .map(AttachmentRecord::detached)
        .collect()
}

/// Create or update what the playbook lists; leave everything else alone
pub fn get_diff_merge(ctx: &ReconciliationContext, replace: bool) -> Result<DiffSets, ControllerError> {
    let mut diff = DiffSets::default();
    let mut conf_changed: BTreeMap<&str, bool> = BTreeMap::new();

    for want in &ctx.want.create {
        match ctx.have.vrf(&want.vrf_name) {
            Some(have) => {
                let (update, changed) = diff_for_create(want, have)?;
                conf_changed.insert(want.vrf_name.as_str(), changed);
                if let Some(update) = update {
                    diff.create_update.push(update);
                }
            }
            None if want.vrf_id.is_none() => diff.create_quick.push(want.clone()),
            None => diff.create.push(want.clone()),
        }
    }

    for want_a in &ctx.want.attach {
        let vrf_name = want_a.vrf_name.as_str();
        let deploy_vrf = match ctx.have.attachments(vrf_name) {
            Some(have_a) => {
                let (list, dep_vrf) =
                    diff_for_attach_deploy(&want_a.lan_attach_list, &have_a.lan_attach_list, replace);
                if !list.is_empty() {
                    diff.attach.push(VrfAttach {
                        vrf_name: vrf_name.to_string(),
                        lan_attach_list: list,
                    });
                }
                dep_vrf
                    || (conf_changed.get(vrf_name).copied().unwrap_or(false)
                        && ctx.want.deploy.contains(vrf_name))
            }
            None => {
                let list: Vec<AttachmentRecord> = want_a
                    .lan_attach_list
                    .iter()
                    .map(|a| AttachmentRecord {
                        deployment: true,
                        ..a.clone()
                    })
                    .collect();
                let deploy = list.iter().any(|a| a.is_deploy);
                if !list.is_empty() {
                    diff.attach.push(VrfAttach {
                        vrf_name: vrf_name.to_string(),
                        lan_attach_list: list,
                    });
                }
                deploy
            }
        };
        if deploy_vrf {
            diff.deploy.insert(vrf_name.to_string());
        }
    }

    debug!(
        "merge diff: {} create, {} quick create, {} update, {} attach, {} deploy",
        diff.create.len(),
        diff.create_quick.len(),
        diff.create_update.len(),
        diff.attach.len(),
        diff.deploy.len()
    );
    Ok(diff)
}

/// Merge, then detach switches the playbook no longer lists for its VRFs
pub fn get_diff_replace(ctx: &ReconciliationContext) -> Result<DiffSets, ControllerError> {
    let mut diff = get_diff_merge(ctx, true)?;

    for have_a in &ctx.have.attach {
        let vrf_name = have_a.vrf_name.as_str();
        let detach_list: Vec<AttachmentRecord> = match ctx.want.attachments(vrf_name) {
            Some(want_a) => have_a
                .lan_attach_list
                .iter()
                .filter(|h| h.is_attached)
                .filter(|h| {
                    !want_a
                        .lan_attach_list
                        .iter()
                        .any(|w| w.serial_number == h.serial_number)
                })
                .map(AttachmentRecord::detached)
                .collect(),
            None if ctx.want.vrf(vrf_name).is_some() => get_items_to_detach(&have_a.lan_attach_list),
            None => continue,
        };
        if detach_list.is_empty() {
            continue;
        }

        debug!("replace: detaching {} switches from vrf {}", detach_list.len(), vrf_name);
        match diff.attach.iter_mut().find(|a| a.vrf_name == vrf_name) {
            Some(existing) => existing.lan_attach_list.extend(detach_list),
            None => diff.attach.push(VrfAttach {
                vrf_name: vrf_name.to_string(),
                lan_attach_list: detach_list,
            }),
        }
        diff.deploy.insert(vrf_name.to_string());
    }
    Ok(diff)
}

/// Replace, then remove every VRF the playbook does not list
pub fn get_diff_override(ctx: &ReconciliationContext) -> Result<DiffSets, ControllerError> {
    let mut diff = get_diff_replace(ctx)?;

    for have in &ctx.have.create {
        if ctx.want.vrf(&have.vrf_name).is_some() {
            continue;
        }
        schedule_delete(ctx, &have.vrf_name, &mut diff);
    }
    Ok(diff)
}

/// Remove the listed VRFs, or every VRF when the playbook lists none
pub fn get_diff_delete(ctx: &ReconciliationContext) -> Result<DiffSets, ControllerError> {
    let mut diff = DiffSets::default();

    if ctx.want.create.is_empty() {
        for have in &ctx.have.create {
            schedule_delete(ctx, &have.vrf_name, &mut diff);
        }
    } else {
        for want in &ctx.want.create {
            if ctx.have.vrf(&want.vrf_name).is_some() {
                schedule_delete(ctx, &want.vrf_name, &mut diff);
            }
        }
    }
    Ok(diff)
}

fn schedule_delete(ctx: &ReconciliationContext, vrf_name: &str, diff: &mut DiffSets) {
    if let Some(have_a) = ctx.have.attachments(vrf_name) {
        let items = get_items_to_detach(&have_a.lan_attach_list);
        if !items.is_empty() {
            diff.detach.push(VrfAttach {
                vrf_name: vrf_name.to_string(),
                lan_attach_list: items,
            });
            diff.undeploy.insert(vrf_name.to_string());
        }
    }
    debug!("scheduling delete of vrf {}", vrf_name);
    diff.delete.insert(vrf_name.to_string(), DeleteState::Deployed);
}

/// Diff for the requested state; query never changes anything
pub fn diff_for_state(ctx: &ReconciliationContext) -> Result<DiffSets, ControllerError> {
    match ctx.state {
        State::Merged => get_diff_merge(ctx, false),
        State::Replaced => get_diff_replace(ctx),
        State::Overridden => get_diff_override(ctx),
        State::Deleted => get_diff_delete(ctx),
        State::Query => Ok(DiffSets::default()),
    }
}
