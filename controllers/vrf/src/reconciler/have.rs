//! Current state as read from the controller

use super::Reconciler;
use super::model::{AttachmentRecord, ExtensionValues, Have, VRF_LITE_JYTHON_TEMPLATE, VrfAttach};
use super::response::{Action, handle_response};
use super::wire::{
    ControllerAttachment, ControllerSwitchDetails, ControllerVrf, ControllerVrfAttachments, SwitchDetail,
    data_list, decode,
};
use crate::error::ControllerError;
use ndfc_client::ControllerResponse;
use ndfc_client::paths::chunk_items;
use tracing::{debug, info};

impl Reconciler {
    /// Read every VRF of the fabric with its attachments.
    ///
    /// Attachment reads are chunked so that no URL exceeds the controller's
    /// length limit. Extension values and freeform config are only read for
    /// switches the VRF is attached to.
    pub(crate) async fn get_have(&self) -> Result<Have, ControllerError> {
        let mut have = Have::default();

        let response = self.query(self.paths.vrfs(&self.fabric)).await?;
        let (missing, not_ok) = handle_response(&response, Action::Query);
        if missing {
            return Err(ControllerError::InvalidConfig(format!(
                "Fabric {} not present on the controller",
                self.fabric
            )));
        }
        self.check_read(&response, not_ok, "vrfs")?;

        let vrfs: Vec<ControllerVrf> = decode(data_list(&response.data))?;
        for vrf in vrfs {
            have.create.push(vrf.into_record(&self.fabric)?);
        }
        if have.create.is_empty() {
            info!("Fabric {} has no vrfs", self.fabric);
            return Ok(have);
        }

        let names: Vec<&str> = have.create.iter().map(|v| v.vrf_name.as_str()).collect();
        let full_len = self.paths.vrf_attachments(&self.fabric, &names.join(",")).len();
        for chunk in chunk_items(full_len, &names) {
            let response = self
                .query(self.paths.vrf_attachments(&self.fabric, &chunk.join(",")))
                .await?;
            let (_, not_ok) = handle_response(&response, Action::Query);
            self.check_read(&response, not_ok, "vrf attachments")?;

            let entries: Vec<ControllerVrfAttachments> = decode(data_list(&response.data))?;
            for entry in entries {
                let mut lan_attach_list = Vec::new();
                for attachment in entry.lan_attach_list.unwrap_or_default() {
                    lan_attach_list.push(self.have_attachment(&entry.vrf_name, attachment).await?);
                }
                if lan_attach_list.iter().any(|a| a.is_deploy && a.deployment) {
                    have.deploy.insert(entry.vrf_name.clone());
                }
                have.attach.push(VrfAttach {
                    vrf_name: entry.vrf_name,
                    lan_attach_list,
                });
            }
        }

        info!(
            "Fabric {} has {} vrfs, {} deployed",
            self.fabric,
            have.create.len(),
            have.deploy.len()
        );
        Ok(have)
    }

    async fn have_attachment(
        &self,
        vrf_name: &str,
        attachment: ControllerAttachment,
    ) -> Result<AttachmentRecord, ControllerError> {
        let state = attachment.lan_attach_state.as_str();
        let is_attached = state != "NA";
        let is_deploy = !(attachment.is_lan_attached && matches!(state, "OUT-OF-SYNC" | "PENDING"));

        let mut record = AttachmentRecord {
            fabric: self.fabric.clone(),
            vrf_name: vrf_name.to_string(),
            serial_number: attachment.switch_serial_no.clone(),
            vlan: attachment.vlan_id.unwrap_or(0),
            is_attached,
            deployment: attachment.is_lan_attached,
            is_deploy,
            extension_values: None,
            instance_values: attachment.instance_values(),
            freeform_config: String::new(),
            vrf_lite: Vec::new(),
        };

        if is_attached {
            if let Some(detail) = self.switch_detail(vrf_name, &record.serial_number).await? {
                record.freeform_config = detail.freeform_config;
                record.extension_values = ExtensionValues::parse(&detail.extension_values).map(|mut ext| {
                    for conn in &mut ext.vrf_lite_conn {
                        conn.insert("AUTO_VRF_LITE_FLAG".to_string(), "false".to_string());
                        conn.insert(
                            "VRF_LITE_JYTHON_TEMPLATE".to_string(),
                            VRF_LITE_JYTHON_TEMPLATE.to_string(),
                        );
                    }
                    ext
                });
            }
        }

        debug!(
            "vrf {} switch {}: state {}, attached {}, deploy {}",
            vrf_name, record.serial_number, state, record.is_attached, record.is_deploy
        );
        Ok(record)
    }

    /// Details of one switch for one VRF, prototypes included
    pub(crate) async fn switch_detail(
        &self,
        vrf_name: &str,
        serial_number: &str,
    ) -> Result<Option<SwitchDetail>, ControllerError> {
        let response = self
            .query(self.paths.vrf_switches(&self.fabric, vrf_name, serial_number))
            .await?;
        let (_, not_ok) = handle_response(&response, Action::Query);
        self.check_read(&response, not_ok, "vrf switch details")?;

        let details: Vec<ControllerSwitchDetails> = decode(data_list(&response.data))?;
        Ok(details
            .into_iter()
            .flat_map(|d| d.switch_details_list.unwrap_or_default())
            .find(|d| d.serial_number == serial_number))
    }

    pub(crate) fn check_read(
        &self,
        response: &ControllerResponse,
        not_ok: bool,
        what: &str,
    ) -> Result<(), ControllerError> {
        if !not_ok {
            return Ok(());
        }
        Err(ControllerError::Query(format!(
            "Unable to read {} of fabric {}: {} {} {}",
            what,
            self.fabric,
            response.return_code,
            response.message(),
            response.error_text()
        )))
    }
}
