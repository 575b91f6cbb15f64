//! Reconciliation of NDFC VRFs.
//!
//! This module is organized by reconciliation phase:
//! - `want`: playbook to desired state
//! - `have`: controller reads to current state
//! - `diff` / `attach`: pure diffing of want against have
//! - `push`: ordered writes, delete gating and rollback
//! - `query`: read-only report for the query state
//! - `response`: classification of controller replies

pub mod attach;
pub mod diff;
pub mod have;
pub mod inventory;
pub mod model;
pub mod push;
pub mod query;
pub mod response;
pub mod want;
pub mod wire;

#[cfg(test)]
mod attach_test;
#[cfg(test)]
mod push_test;

use crate::error::ControllerError;
use inventory::Inventory;
use model::{DiffSets, ReconciliationContext};
use ndfc_client::rest_send::{DEFAULT_SEND_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};
use ndfc_client::{ApiPaths, ControllerResponse, NdfcClientTrait, RestSend, Verb};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};
use vrf_playbook::{Playbook, State};

/// Rollback outcome reported when every rollback request went through
pub const ROLLBACK_SUCCEEDED: &str = "SUCCESS - Attempted rollback of the task has succeeded";

/// Rollback outcome reported when a rollback request failed
pub const ROLLBACK_FAILED: &str =
    "FAILED - Attempted rollback of the task has failed, may need manual intervention";

const HIDDEN_STACK_TRACE: &str = "Stack trace is hidden, enable debug logging to print it";

/// Knobs for one reconciler instance
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Compute and report the diff without writing to the controller
    pub check_mode: bool,
    /// Seconds between attachment polls while waiting to delete a VRF
    pub wait_time_for_delete_loop: u64,
    /// Upper bound in seconds for the delete wait of one VRF
    pub delete_wait_timeout: u64,
    /// Retry budget in seconds for a single request
    pub rest_timeout: u64,
    /// Seconds between retries of a single request
    pub send_interval: u64,
    /// Skip every sleep
    pub unit_test: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            check_mode: false,
            wait_time_for_delete_loop: 5,
            delete_wait_timeout: 600,
            rest_timeout: DEFAULT_TIMEOUT_SECS,
            send_interval: DEFAULT_SEND_INTERVAL_SECS,
            unit_test: false,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    pub changed: bool,
    pub diff: Vec<Value>,
    pub response: Vec<Value>,
    pub query: Vec<Value>,
}

#[derive(Debug, Default)]
pub(crate) struct PushLog {
    responses: Vec<Value>,
    changed: bool,
    failed_to_rollback: bool,
}

/// Reconciles the VRFs of one fabric.
pub struct Reconciler {
    pub(crate) client: Box<dyn NdfcClientTrait + Send + Sync>,
    pub(crate) paths: ApiPaths,
    pub(crate) fabric: String,
    pub(crate) inventory: Inventory,
    pub(crate) settings: ReconcilerSettings,
    log: Mutex<PushLog>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("base_url", &self.client.base_url())
            .field("fabric", &self.fabric)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: impl NdfcClientTrait + Send + Sync + 'static,
        paths: ApiPaths,
        fabric: impl Into<String>,
        inventory: Inventory,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            client: Box::new(client),
            paths,
            fabric: fabric.into(),
            inventory,
            settings,
            log: Mutex::new(PushLog::default()),
        }
    }

    /// Bring the fabric to the state the playbook describes.
    pub async fn run(&self, playbook: &Playbook) -> Result<RunResult, ControllerError> {
        if playbook.fabric != self.fabric {
            return Err(ControllerError::InvalidConfig(format!(
                "playbook targets fabric {} but the reconciler serves {}",
                playbook.fabric, self.fabric
            )));
        }
        *self.log() = PushLog::default();

        info!(
            "Reconciling {} vrfs in fabric {} (state {}, check mode {})",
            playbook.config.len(),
            self.fabric,
            playbook.state,
            self.settings.check_mode
        );

        let want = want::build_want(playbook, &self.inventory)?;
        let have = self.get_have().await?;
        let ctx = ReconciliationContext {
            fabric: self.fabric.clone(),
            state: playbook.state,
            want,
            have,
        };

        if ctx.state == State::Query {
            let query = self.get_diff_query(&ctx).await?;
            return Ok(RunResult {
                query,
                ..RunResult::default()
            });
        }

        let mut diff = diff::diff_for_state(&ctx)?;
        if diff.is_empty() {
            info!("Fabric {} already matches the playbook", self.fabric);
            return Ok(RunResult::default());
        }

        self.assign_quick_vrf_ids(&mut diff).await?;
        let report = format_diff(&diff, &self.inventory);

        match self.push_to_remote(&mut diff, false).await {
            Ok(()) => {}
            Err(ControllerError::PushFailed { response, .. }) => {
                return Err(self.failure(&ctx, response).await);
            }
            Err(e) => return Err(e),
        }

        let log = std::mem::take(&mut *self.log());
        info!(
            "Reconciled fabric {}: {} requests sent, changed={}",
            self.fabric,
            log.responses.len(),
            log.changed
        );
        Ok(RunResult {
            changed: log.changed,
            diff: report,
            response: log.responses,
            query: Vec::new(),
        })
    }

    /// Roll the fabric back to the state read before the failed push and
    /// build the error reported for it.
    ///
    /// Multisite fabrics are never rolled back.
    pub(crate) async fn failure(&self, ctx: &ReconciliationContext, response: Value) -> ControllerError {
        if self.inventory.is_multisite() {
            error!("Push to multisite fabric {} failed, not rolling back", self.fabric);
            return ControllerError::PushFailed {
                response,
                rollback: None,
            };
        }

        warn!("Push to fabric {} failed, rolling back", self.fabric);
        self.log().failed_to_rollback = false;
        let rollback_ok = match self.rollback(ctx).await {
            Ok(()) => !self.log().failed_to_rollback,
            Err(e) => {
                error!("Rollback of fabric {} failed: {}", self.fabric, e);
                false
            }
        };
        let outcome = if rollback_ok { ROLLBACK_SUCCEEDED } else { ROLLBACK_FAILED };
        info!("{}", outcome);

        let mut report = match response {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("DATA".to_string(), other);
                map
            }
        };
        report.insert("ROLLBACK_RESULT".to_string(), json!(outcome));
        if let Some(Value::Object(data)) = report.get_mut("DATA") {
            if data.contains_key("stackTrace") {
                data.insert("stackTrace".to_string(), json!(HIDDEN_STACK_TRACE));
            }
        }
        ControllerError::PushFailed {
            response: Value::Object(report),
            rollback: Some(outcome.to_string()),
        }
    }

    /// Override the fabric with what it held before this run
    async fn rollback(&self, ctx: &ReconciliationContext) -> Result<(), ControllerError> {
        let have = self.get_have().await?;
        let rollback_ctx = ReconciliationContext {
            fabric: ctx.fabric.clone(),
            state: State::Overridden,
            want: ctx.have.clone(),
            have,
        };
        let mut diff = diff::get_diff_override(&rollback_ctx)?;
        if diff.is_empty() {
            return Ok(());
        }
        self.push_to_remote(&mut diff, true).await
    }

    pub(crate) fn log(&self) -> MutexGuard<'_, PushLog> {
        self.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn rest_send(&self) -> RestSend<'_> {
        let mut rest = RestSend::new(self.client.as_ref());
        rest.timeout(self.settings.rest_timeout)
            .send_interval(self.settings.send_interval)
            .unit_test(self.settings.unit_test);
        rest
    }

    /// GET that always reaches the controller, check mode or not
    pub(crate) async fn query(&self, path: String) -> Result<ControllerResponse, ControllerError> {
        let mut rest = self.rest_send();
        rest.verb(Verb::Get).path(path);
        Ok(rest.commit().await?)
    }
}

/// Per-VRF summary of what a run changes
///
/// Creates, updates and attachment changes are reported with their switch
/// list; VRFs that are only deployed or deleted are reported by name.
pub fn format_diff(diff: &DiffSets, inventory: &Inventory) -> Vec<Value> {
    let mut entries: Vec<Map<String, Value>> = Vec::new();

    fn entry<'a>(entries: &'a mut Vec<Map<String, Value>>, vrf_name: &str) -> &'a mut Map<String, Value> {
        let index = match entries
            .iter()
            .position(|e| e.get("vrf_name").and_then(Value::as_str) == Some(vrf_name))
        {
            Some(index) => index,
            None => {
                let mut map = Map::new();
                map.insert("vrf_name".to_string(), json!(vrf_name));
                entries.push(map);
                entries.len() - 1
            }
        };
        &mut entries[index]
    }

    for record in diff.create.iter().chain(&diff.create_quick).chain(&diff.create_update) {
        let e = entry(&mut entries, &record.vrf_name);
        e.insert("vrf_id".to_string(), json!(record.vrf_id));
        e.insert("vlan_id".to_string(), json!(record.template_config.vlan_id()));
        e.insert("vrf_template".to_string(), json!(record.vrf_template));
        e.insert(
            "vrf_extension_template".to_string(),
            json!(record.vrf_extension_template),
        );
        e.insert("attach".to_string(), json!([]));
    }

    for vrf_attach in diff.attach.iter().chain(&diff.detach) {
        let e = entry(&mut entries, &vrf_attach.vrf_name);
        let items: Vec<Value> = vrf_attach
            .lan_attach_list
            .iter()
            .map(|a| {
                json!({
                    "ip_address": inventory.ip_for_serial(&a.serial_number),
                    "vlan_id": a.vlan,
                    "deploy": a.deployment,
                })
            })
            .collect();
        match e.get_mut("attach").and_then(Value::as_array_mut) {
            Some(existing) => existing.extend(items),
            None => {
                e.insert("attach".to_string(), Value::Array(items));
            }
        }
    }

    for vrf_name in diff.deploy.iter().chain(diff.delete.keys()) {
        entry(&mut entries, vrf_name);
    }

    entries.into_iter().map(Value::Object).collect()
}
