//! Read-only report for the query state

use super::Reconciler;
use super::model::ReconciliationContext;
use super::response::{Action, handle_response};
use super::wire::{ControllerVrfAttachments, data_list, decode};
use crate::error::ControllerError;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::debug;

impl Reconciler {
    /// Report the listed VRFs, or every VRF when the playbook lists none.
    ///
    /// Each entry holds the controller's VRF object under `parent` and the
    /// switch details of each attachment under `attach`. Listed VRFs the
    /// controller does not know are left out.
    pub(crate) async fn get_diff_query(&self, ctx: &ReconciliationContext) -> Result<Vec<Value>, ControllerError> {
        let response = self.query(self.paths.vrfs(&self.fabric)).await?;
        let (missing, not_ok) = handle_response(&response, Action::Query);
        if missing {
            return Err(ControllerError::InvalidConfig(format!(
                "Fabric {} not present on the controller",
                self.fabric
            )));
        }
        self.check_read(&response, not_ok, "vrfs")?;

        let listed: BTreeSet<&str> = ctx.want.create.iter().map(|v| v.vrf_name.as_str()).collect();
        let mut report = Vec::new();

        for vrf in data_list(&response.data) {
            let Some(vrf_name) = vrf.get("vrfName").and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            if !listed.is_empty() && !listed.contains(vrf_name.as_str()) {
                continue;
            }

            let response = self
                .query(self.paths.vrf_attachments(&self.fabric, &vrf_name))
                .await?;
            let (_, not_ok) = handle_response(&response, Action::Query);
            self.check_read(&response, not_ok, "vrf attachments")?;
            let entries: Vec<ControllerVrfAttachments> = decode(data_list(&response.data))?;

            let mut attach = Vec::new();
            for attachment in entries.into_iter().flat_map(|e| e.lan_attach_list.unwrap_or_default()) {
                let response = self
                    .query(
                        self.paths
                            .vrf_switches(&self.fabric, &vrf_name, &attachment.switch_serial_no),
                    )
                    .await?;
                if let Some(details) = data_list(&response.data).into_iter().next() {
                    attach.push(details);
                }
            }

            debug!("query: vrf {} has {} attachments", vrf_name, attach.len());
            report.push(json!({ "parent": vrf, "attach": attach }));
        }
        Ok(report)
    }
}
