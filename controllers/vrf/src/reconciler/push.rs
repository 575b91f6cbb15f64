//! Ordered writes to the controller
//!
//! A push runs its phases in a fixed order: update existing VRFs, detach,
//! undeploy, delete, create, attach, deploy. Removals finish before any
//! creation so that VLANs and segment ids freed by a delete can be reused
//! in the same run.

use super::Reconciler;
use super::model::{
    AttachmentRecord, DeleteState, DiffSets, ExtensionValues, VRF_LITE_JYTHON_TEMPLATE, VrfLiteConn, VrfRecord,
    as_u64,
};
use super::response::{Action, handle_response};
use super::wire::{AttachPayload, ControllerVrfAttachments, DeployPayload, VrfPayload, data_list, decode, to_payload};
use crate::error::ControllerError;
use ndfc_client::{ControllerResponse, Verb};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Attempts at reading a fresh segment id before settling for the last one
const VRF_ID_ATTEMPTS: usize = 10;

impl Reconciler {
    /// Push every phase of `diff`.
    ///
    /// Quick-create records get their segment ids in place and attachments
    /// their VRF-LITE values.
    /// During a rollback refused writes are recorded and the push goes on.
    pub(crate) async fn push_to_remote(&self, diff: &mut DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        self.push_diff_create_update(diff, is_rollback).await?;
        self.push_diff_detach(diff, is_rollback).await?;
        self.push_diff_undeploy(diff, is_rollback).await?;
        self.push_diff_delete(diff, is_rollback).await?;
        self.push_diff_create_quick(diff, is_rollback).await?;
        self.push_diff_create(diff, is_rollback).await?;
        self.push_diff_attach(diff, is_rollback).await?;
        self.push_diff_deploy(diff, is_rollback).await?;
        Ok(())
    }

    /// Send one write, record its response and classify it.
    pub(crate) async fn send_to_controller(
        &self,
        action: Action,
        verb: Verb,
        path: String,
        payload: Option<Value>,
        is_rollback: bool,
    ) -> Result<ControllerResponse, ControllerError> {
        let mut rest = self.rest_send();
        rest.verb(verb)
            .path(path)
            .payload(payload)
            .check_mode(self.settings.check_mode);
        let response = rest.commit().await?;
        self.log().responses.push(response.to_value());

        let (fail, changed) = handle_response(&response, action);
        if fail {
            if is_rollback {
                warn!(
                    "Rollback {} {} refused: {} {}",
                    response.method,
                    response.request_path,
                    response.return_code,
                    response.error_text()
                );
                self.log().failed_to_rollback = true;
                return Ok(response);
            }
            error!(
                "{} {} refused: {} {} {}",
                response.method,
                response.request_path,
                response.return_code,
                response.message(),
                response.error_text()
            );
            return Err(ControllerError::PushFailed {
                response: response.to_value(),
                rollback: None,
            });
        }
        if changed {
            self.log().changed = true;
        }
        Ok(response)
    }

    async fn push_diff_create_update(&self, diff: &DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        for record in &diff.create_update {
            info!("Updating vrf {}", record.vrf_name);
            let payload = to_payload(&VrfPayload::from(record))?;
            self.send_to_controller(
                Action::Update,
                Verb::Put,
                self.paths.vrf(&self.fabric, &record.vrf_name),
                Some(payload),
                is_rollback,
            )
            .await?;
        }
        Ok(())
    }

    async fn push_diff_detach(&self, diff: &DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        if diff.detach.is_empty() {
            return Ok(());
        }
        info!("Detaching {} vrfs", diff.detach.len());
        let payload: Vec<AttachPayload> = diff.detach.iter().map(AttachPayload::from).collect();
        self.send_to_controller(
            Action::Attach,
            Verb::Post,
            self.paths.vrf_attachments_post(&self.fabric),
            Some(to_payload(&payload)?),
            is_rollback,
        )
        .await?;
        Ok(())
    }

    async fn push_diff_undeploy(&self, diff: &DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        if diff.undeploy.is_empty() {
            return Ok(());
        }
        info!("Undeploying vrfs {:?}", diff.undeploy);
        self.send_to_controller(
            Action::Deploy,
            Verb::Post,
            self.paths.vrf_deployments(&self.fabric),
            Some(to_payload(&DeployPayload::new(&diff.undeploy))?),
            is_rollback,
        )
        .await?;
        Ok(())
    }

    /// Delete VRFs once their attachments have settled.
    ///
    /// VRFs with out-of-sync attachments are left in place and reported
    /// together after the others have been deleted.
    async fn push_diff_delete(&self, diff: &mut DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        if diff.delete.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = diff.delete.keys().cloned().collect();
        let mut skipped = Vec::new();
        for vrf_name in names {
            let state = if self.settings.check_mode {
                DeleteState::Na
            } else {
                self.wait_for_vrf_del_ready(&vrf_name).await?
            };
            diff.delete.insert(vrf_name.clone(), state);
            if state == DeleteState::OutOfSync {
                warn!("vrf {} has out-of-sync attachments, not deleting it", vrf_name);
                skipped.push(vrf_name);
                continue;
            }

            info!("Deleting vrf {}", vrf_name);
            self.send_to_controller(
                Action::Delete,
                Verb::Delete,
                self.paths.vrf(&self.fabric, &vrf_name),
                None,
                is_rollback,
            )
            .await?;
            self.release_orphaned_resources(&vrf_name, is_rollback).await?;
        }

        if !skipped.is_empty() {
            return Err(ControllerError::DeleteFailed(skipped));
        }
        Ok(())
    }

    /// Poll the attachments of a VRF until none is in transition.
    ///
    /// A deployed attachment still in use by a network is an error, an
    /// out-of-sync or failed one makes the VRF undeletable.
    pub(crate) async fn wait_for_vrf_del_ready(&self, vrf_name: &str) -> Result<DeleteState, ControllerError> {
        let step = self.settings.wait_time_for_delete_loop.max(1);
        let mut waited = 0u64;

        loop {
            let response = self
                .query(self.paths.vrf_attachments(&self.fabric, vrf_name))
                .await?;

            let settled = if response.data.is_null() {
                false
            } else {
                let entries: Vec<ControllerVrfAttachments> = decode(data_list(&response.data))?;
                let mut in_transition = false;
                for attachment in entries.into_iter().flat_map(|e| e.lan_attach_list.unwrap_or_default()) {
                    match attachment.lan_attach_state.as_str() {
                        "OUT-OF-SYNC" | "FAILED" => return Ok(DeleteState::OutOfSync),
                        "DEPLOYED" if attachment.is_lan_attached => {
                            let switch = if attachment.switch_name.is_empty() {
                                attachment.switch_serial_no
                            } else {
                                attachment.switch_name
                            };
                            return Err(ControllerError::NetworkAttachmentsPresent {
                                vrf: vrf_name.to_string(),
                                switch,
                            });
                        }
                        "NA" => {}
                        _ => in_transition = true,
                    }
                }
                !in_transition
            };

            if settled {
                return Ok(DeleteState::Na);
            }

            waited += step;
            if waited >= self.settings.delete_wait_timeout {
                return Err(ControllerError::DeleteWaitTimeout {
                    vrf: vrf_name.to_string(),
                    seconds: self.settings.delete_wait_timeout,
                });
            }
            debug!("vrf {} attachments still in transition, waited {}s", vrf_name, waited);
            if !self.settings.unit_test {
                tokio::time::sleep(Duration::from_secs(step)).await;
            }
        }
    }

    /// Free VLAN pool entries a deleted VRF left unallocated
    pub(crate) async fn release_orphaned_resources(
        &self,
        vrf_name: &str,
        is_rollback: bool,
    ) -> Result<(), ControllerError> {
        let response = self.query(self.paths.resource_pool(&self.fabric)).await?;
        let (missing, not_ok) = handle_response(&response, Action::Query);
        if missing {
            return Ok(());
        }
        self.check_read(&response, not_ok, "vrf vlan pool")?;

        let ids: Vec<u64> = data_list(&response.data)
            .iter()
            .filter(|r| r.get("entityName").and_then(Value::as_str) == Some(vrf_name))
            .filter(|r| r.get("allocatedFlag").and_then(Value::as_bool) == Some(false))
            .filter_map(|r| as_u64(r.get("id")))
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        info!("Releasing {} orphaned resources of vrf {}", ids.len(), vrf_name);
        self.send_to_controller(Action::Delete, Verb::Delete, self.paths.resources(&ids), None, is_rollback)
            .await?;
        Ok(())
    }

    /// Hand a segment id to every quick-create VRF that has none yet
    pub(crate) async fn assign_quick_vrf_ids(&self, diff: &mut DiffSets) -> Result<(), ControllerError> {
        let mut previous = None;
        for record in &mut diff.create_quick {
            if let Some(vrf_id) = record.vrf_id {
                previous = Some(vrf_id);
                continue;
            }
            let vrf_id = self.allocate_vrf_id(&record.vrf_name, previous).await?;
            previous = Some(vrf_id);
            record.set_vrf_id(vrf_id);
        }
        Ok(())
    }

    /// Create VRFs the playbook gave no segment id
    async fn push_diff_create_quick(&self, diff: &mut DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        self.assign_quick_vrf_ids(diff).await?;
        for record in &diff.create_quick {
            if self.settings.check_mode {
                debug!("check mode: not creating vrf {}", record.vrf_name);
                continue;
            }
            self.post_vrf(record, is_rollback).await?;
        }
        Ok(())
    }

    async fn push_diff_create(&self, diff: &DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        for record in &diff.create {
            self.post_vrf(record, is_rollback).await?;
        }
        Ok(())
    }

    /// POST one VRF. A VLAN of 0 is resolved for the payload only, so the
    /// diff keeps it as a placeholder; check mode leaves it unresolved.
    async fn post_vrf(&self, record: &VrfRecord, is_rollback: bool) -> Result<(), ControllerError> {
        let mut record = record.clone();
        if record.template_config.vlan_id() == 0 && !self.settings.check_mode {
            let vlan = self.allocate_vlan(&record.vrf_name).await?;
            record.template_config.set_vlan_id(vlan);
        }
        info!(
            "Creating vrf {} (id {:?}, vlan {})",
            record.vrf_name,
            record.vrf_id,
            record.template_config.vlan_id()
        );
        let payload = to_payload(&VrfPayload::from(&record))?;
        self.send_to_controller(
            Action::Create,
            Verb::Post,
            self.paths.vrfs(&self.fabric),
            Some(payload),
            is_rollback,
        )
        .await?;
        Ok(())
    }

    /// Next free segment id, distinct from the one handed to the previous VRF
    /// of this run when the controller produces one in time
    async fn allocate_vrf_id(&self, vrf_name: &str, previous: Option<u64>) -> Result<u64, ControllerError> {
        let key = self.paths.version().vrf_id_key();
        let mut last = None;

        for attempt in 1..=VRF_ID_ATTEMPTS {
            let response = self.query(self.paths.vrf_id(&self.fabric)).await?;
            if !matches!(response.return_code, 200 | 404) {
                return Err(ControllerError::ResourceAllocation(format!(
                    "Unable to read a vrf_id for vrf {}: {} {}",
                    vrf_name,
                    response.return_code,
                    response.message()
                )));
            }
            let Some(vrf_id) = as_u64(response.data.get(key)) else {
                continue;
            };
            if Some(vrf_id) != previous {
                debug!("vrf {} gets vrf_id {}", vrf_name, vrf_id);
                return Ok(vrf_id);
            }
            debug!("vrf_id {} already handed out, attempt {}", vrf_id, attempt);
            last = Some(vrf_id);
        }

        last.ok_or_else(|| ControllerError::ResourceAllocation(format!("Unable to generate vrf_id for vrf {vrf_name}")))
    }

    async fn allocate_vlan(&self, vrf_name: &str) -> Result<u64, ControllerError> {
        let response = self.query(self.paths.vlan(&self.fabric)).await?;
        let (_, not_ok) = handle_response(&response, Action::Query);
        match as_u64(Some(&response.data)) {
            Some(vlan) if !not_ok && vlan != 0 => {
                debug!("vrf {} gets vlan {}", vrf_name, vlan);
                Ok(vlan)
            }
            _ => Err(ControllerError::ResourceAllocation(format!(
                "Unable to allocate a vlan for vrf {}: {} {}",
                vrf_name,
                response.return_code,
                response.message()
            ))),
        }
    }

    async fn push_diff_attach(&self, diff: &mut DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        if diff.attach.is_empty() {
            return Ok(());
        }
        for vrf_attach in &mut diff.attach {
            for record in &mut vrf_attach.lan_attach_list {
                if record.deployment && !record.vrf_lite.is_empty() {
                    self.complete_vrf_lite(record).await?;
                }
            }
        }

        info!("Attaching {} vrfs", diff.attach.len());
        let payload: Vec<AttachPayload> = diff.attach.iter().map(AttachPayload::from).collect();
        self.send_to_controller(
            Action::Attach,
            Verb::Post,
            self.paths.vrf_attachments_post(&self.fabric),
            Some(to_payload(&payload)?),
            is_rollback,
        )
        .await?;
        Ok(())
    }

    /// Fill the VRF-LITE connections of an attachment from the interface
    /// prototypes the controller offers for the switch.
    ///
    /// Values set in the playbook win over the prototype; the neighbor ASN
    /// always comes from the prototype. A connection without an interface
    /// takes the first VRF-LITE capable one.
    async fn complete_vrf_lite(&self, record: &mut AttachmentRecord) -> Result<(), ControllerError> {
        let serial = record.serial_number.clone();
        let prototypes: Vec<_> = self
            .switch_detail(&record.vrf_name, &serial)
            .await?
            .and_then(|detail| detail.extension_prototype_values)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.is_vrf_lite())
            .collect();
        if prototypes.is_empty() {
            return Err(ControllerError::VrfLiteNotAllowed(format!(
                "No VRF LITE capable interfaces found on switch {serial}"
            )));
        }

        let mut extension = ExtensionValues::default();
        for intent in &record.vrf_lite {
            let interface = intent.interface.as_deref().unwrap_or_default();
            let prototype = if interface.is_empty() {
                prototypes.first()
            } else {
                prototypes.iter().find(|p| p.interface_name == interface)
            };
            let Some(prototype) = prototype else {
                return Err(ControllerError::VrfLiteNotAllowed(format!(
                    "Interface {interface} on switch {serial} is not VRF LITE capable"
                )));
            };

            let auto = prototype.values();
            let pick = |user: Option<String>, key: &str| {
                user.filter(|v| !v.is_empty())
                    .or_else(|| auto.get(key).cloned())
                    .unwrap_or_default()
            };

            let mut conn = VrfLiteConn::new();
            conn.insert("IF_NAME".to_string(), prototype.interface_name.clone());
            conn.insert("DOT1Q_ID".to_string(), pick(intent.dot1q.map(|d| d.to_string()), "DOT1Q_ID"));
            conn.insert("IP_MASK".to_string(), pick(intent.ipv4_addr.clone(), "IP_MASK"));
            conn.insert("NEIGHBOR_IP".to_string(), pick(intent.neighbor_ipv4.clone(), "NEIGHBOR_IP"));
            conn.insert("NEIGHBOR_ASN".to_string(), pick(None, "NEIGHBOR_ASN"));
            conn.insert("IPV6_MASK".to_string(), pick(intent.ipv6_addr.clone(), "IPV6_MASK"));
            conn.insert("IPV6_NEIGHBOR".to_string(), pick(intent.neighbor_ipv6.clone(), "IPV6_NEIGHBOR"));
            conn.insert("AUTO_VRF_LITE_FLAG".to_string(), "false".to_string());
            conn.insert("PEER_VRF_NAME".to_string(), pick(intent.peer_vrf.clone(), "PEER_VRF_NAME"));
            conn.insert(
                "VRF_LITE_JYTHON_TEMPLATE".to_string(),
                VRF_LITE_JYTHON_TEMPLATE.to_string(),
            );
            debug!("vrf {} switch {}: VRF-LITE on {}", record.vrf_name, serial, prototype.interface_name);
            extension.vrf_lite_conn.push(conn);
        }
        record.extension_values = Some(extension);
        Ok(())
    }

    async fn push_diff_deploy(&self, diff: &DiffSets, is_rollback: bool) -> Result<(), ControllerError> {
        if diff.deploy.is_empty() {
            return Ok(());
        }
        info!("Deploying vrfs {:?}", diff.deploy);
        self.send_to_controller(
            Action::Deploy,
            Verb::Post,
            self.paths.vrf_deployments(&self.fabric),
            Some(to_payload(&DeployPayload::new(&diff.deploy))?),
            is_rollback,
        )
        .await?;
        Ok(())
    }
}
