//! Mock NdfcClient for unit testing
//!
//! This module provides an in-memory stand-in for an NDFC controller that
//! implements `NdfcClientTrait`, so the reconciler can be exercised end to end
//! without a running controller.
//!
//! The mock is organized into:
//! - `vrfs.rs` - VRF, attachment, deployment and switch-detail endpoints
//! - `helpers.rs` - envelope builders and path parsing

mod helpers;
mod vrfs;

use crate::error::NdfcError;
use crate::models::{ControllerResponse, Verb};
use crate::ndfc_trait::NdfcClientTrait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A request as seen by the mock controller
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub verb: Verb,
    pub path: String,
    pub payload: Option<Value>,
}

/// Switch known to the mock fabric inventory
#[derive(Debug, Clone, PartialEq)]
pub struct MockSwitch {
    pub ip_address: String,
    pub serial_number: String,
    pub name: String,
    pub role: String,
}

/// Attachment of a VRF to a switch, in controller terms
#[derive(Debug, Clone, PartialEq)]
pub struct MockAttachment {
    pub vlan_id: u64,
    pub is_lan_attached: bool,
    pub lan_attach_state: String,
    pub instance_values: Option<String>,
    pub extension_values: String,
    pub freeform_config: String,
}

/// VRF-LITE capable interface advertised for a switch
#[derive(Debug, Clone, PartialEq)]
pub struct MockLitePrototype {
    pub interface_name: String,
    /// Auto-generated `VRF_LITE_CONN` properties for the interface
    pub values: BTreeMap<String, String>,
}

/// VLAN pool resource tracked by the resource manager
#[derive(Debug, Clone, PartialEq)]
pub struct MockResource {
    pub id: u64,
    pub entity_name: String,
    pub allocated: bool,
    pub vlan_id: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FabricState {
    pub(crate) fabric_type: String,
    pub(crate) vrfs: BTreeMap<String, Value>,
    pub(crate) attachments: BTreeMap<(String, String), MockAttachment>,
    pub(crate) switches: BTreeMap<String, MockSwitch>,
    pub(crate) lite_prototypes: BTreeMap<String, Vec<MockLitePrototype>>,
    pub(crate) resources: Vec<MockResource>,
    pub(crate) next_vrf_id: u64,
    pub(crate) next_vlan_id: u64,
    pub(crate) next_resource_id: u64,
}

/// Mock NdfcClient for testing
///
/// Holds a single fabric. Requests for any other fabric name answer
/// `404 Not Found`, as the controller does.
#[derive(Clone)]
pub struct MockNdfcClient {
    pub(crate) base_url: String,
    pub(crate) fabric: Arc<Mutex<String>>,
    pub(crate) state: Arc<Mutex<FabricState>>,
    pub(crate) injected: Arc<Mutex<Vec<(Verb, String, VecDeque<ControllerResponse>)>>>,
    pub(crate) dropped: Arc<Mutex<Vec<(Verb, String)>>>,
    pub(crate) requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl std::fmt::Debug for MockNdfcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNdfcClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MockNdfcClient {
    /// Create a new mock client with an empty fabric named `fabric1`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            fabric: Arc::new(Mutex::new("fabric1".to_string())),
            state: Arc::new(Mutex::new(FabricState {
                fabric_type: "Switch_Fabric".to_string(),
                next_vrf_id: 50000,
                next_vlan_id: 2000,
                next_resource_id: 1,
                ..FabricState::default()
            })),
            injected: Arc::new(Mutex::new(Vec::new())),
            dropped: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rename the fabric served by the mock
    pub fn with_fabric(self, fabric: impl Into<String>) -> Self {
        *self.fabric.lock().unwrap() = fabric.into();
        self
    }

    /// Set the fabric type (`MFD` for multisite)
    pub fn set_fabric_type(&self, fabric_type: &str) {
        self.state.lock().unwrap().fabric_type = fabric_type.to_string();
    }

    /// Add a switch to the fabric inventory (for test setup)
    pub fn add_switch(&self, ip_address: &str, serial_number: &str, role: &str) {
        let switch = MockSwitch {
            ip_address: ip_address.to_string(),
            serial_number: serial_number.to_string(),
            name: format!("switch-{serial_number}"),
            role: role.to_string(),
        };
        self.state.lock().unwrap().switches.insert(serial_number.to_string(), switch);
    }

    /// Seed an existing VRF (for test setup)
    pub fn add_vrf(&self, vrf_name: &str, vrf_id: u64, vlan_id: u64) {
        let fabric = self.fabric.lock().unwrap().clone();
        let template_config = helpers::default_template_config(vrf_name, vrf_id, vlan_id);
        let vrf = json!({
            "fabric": fabric,
            "vrfName": vrf_name,
            "vrfId": vrf_id,
            "vrfTemplate": "Default_VRF_Universal",
            "vrfExtensionTemplate": "Default_VRF_Extension_Universal",
            "vrfTemplateConfig": template_config.to_string(),
            "serviceVrfTemplate": null,
            "source": null,
            "vrfStatus": "DEPLOYED",
        });
        self.state.lock().unwrap().vrfs.insert(vrf_name.to_string(), vrf);
    }

    /// Seed an attachment (for test setup)
    pub fn add_attachment(&self, vrf_name: &str, serial_number: &str, attachment: MockAttachment) {
        self.state
            .lock()
            .unwrap()
            .attachments
            .insert((vrf_name.to_string(), serial_number.to_string()), attachment);
    }

    /// Seed a deployed attachment with no extensions (for test setup)
    pub fn add_deployed_attachment(&self, vrf_name: &str, serial_number: &str, vlan_id: u64) {
        self.add_attachment(
            vrf_name,
            serial_number,
            MockAttachment {
                vlan_id,
                is_lan_attached: true,
                lan_attach_state: "DEPLOYED".to_string(),
                instance_values: Some(helpers::default_instance_values().to_string()),
                extension_values: String::new(),
                freeform_config: String::new(),
            },
        );
    }

    /// Overwrite the lifecycle state of an attachment
    pub fn set_attachment_state(&self, vrf_name: &str, serial_number: &str, state: &str, lan_attached: bool) {
        if let Some(attachment) = self
            .state
            .lock()
            .unwrap()
            .attachments
            .get_mut(&(vrf_name.to_string(), serial_number.to_string()))
        {
            attachment.lan_attach_state = state.to_string();
            attachment.is_lan_attached = lan_attached;
        }
    }

    /// Advertise a VRF-LITE capable interface on a switch
    pub fn add_lite_prototype(&self, serial_number: &str, interface_name: &str, values: &[(&str, &str)]) {
        let prototype = MockLitePrototype {
            interface_name: interface_name.to_string(),
            values: values.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        };
        self.state
            .lock()
            .unwrap()
            .lite_prototypes
            .entry(serial_number.to_string())
            .or_default()
            .push(prototype);
    }

    /// Add a VLAN pool resource (for test setup)
    pub fn add_resource(&self, entity_name: &str, allocated: bool, vlan_id: u64) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_resource_id;
        state.next_resource_id += 1;
        state.resources.push(MockResource {
            id,
            entity_name: entity_name.to_string(),
            allocated,
            vlan_id,
        });
        id
    }

    /// Queue a canned response for the next request matching `verb` and
    /// containing `path_fragment`. Canned responses are consumed in order
    /// and take precedence over the simulated controller.
    pub fn inject(&self, verb: Verb, path_fragment: &str, response: ControllerResponse) {
        let mut injected = self.injected.lock().unwrap();
        if let Some((_, _, queue)) = injected
            .iter_mut()
            .find(|(v, p, _)| *v == verb && p == path_fragment)
        {
            queue.push_back(response);
            return;
        }
        injected.push((verb, path_fragment.to_string(), VecDeque::from([response])));
    }

    /// Make the next matching request fail with a `500`
    pub fn fail_next(&self, verb: Verb, path_fragment: &str) {
        self.inject(
            verb,
            path_fragment,
            ControllerResponse::error(
                verb,
                path_fragment,
                500,
                "Internal Server Error",
                "injected failure",
                Value::Null,
            ),
        );
    }

    /// Make the next matching request fail before any reply, like a reset
    /// connection
    pub fn drop_next(&self, verb: Verb, path_fragment: &str) {
        self.dropped.lock().unwrap().push((verb, path_fragment.to_string()));
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests with `verb` whose path contains `fragment`
    pub fn requests_matching(&self, verb: Verb, fragment: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.verb == verb && r.path.contains(fragment))
            .collect()
    }

    /// Forget recorded requests
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Current controller-side VRF object
    pub fn vrf(&self, vrf_name: &str) -> Option<Value> {
        self.state.lock().unwrap().vrfs.get(vrf_name).cloned()
    }

    /// Names of every VRF in the fabric
    pub fn vrf_names(&self) -> Vec<String> {
        self.state.lock().unwrap().vrfs.keys().cloned().collect()
    }

    /// Current controller-side attachment
    pub fn attachment(&self, vrf_name: &str, serial_number: &str) -> Option<MockAttachment> {
        self.state
            .lock()
            .unwrap()
            .attachments
            .get(&(vrf_name.to_string(), serial_number.to_string()))
            .cloned()
    }

    /// Resources still held by the VLAN pool
    pub fn resources(&self) -> Vec<MockResource> {
        self.state.lock().unwrap().resources.clone()
    }

    fn take_injected(&self, verb: Verb, path: &str) -> Option<ControllerResponse> {
        let mut injected = self.injected.lock().unwrap();
        let (_, _, queue) = injected
            .iter_mut()
            .find(|(v, p, q)| *v == verb && path.contains(p.as_str()) && !q.is_empty())?;
        let mut response = queue.pop_front()?;
        response.method = verb.to_string();
        response.request_path = path.to_string();
        Some(response)
    }
}

#[async_trait::async_trait]
impl NdfcClientTrait for MockNdfcClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        verb: Verb,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<ControllerResponse, NdfcError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            verb,
            path: path.to_string(),
            payload: payload.cloned(),
        });

        {
            let mut dropped = self.dropped.lock().unwrap();
            if let Some(index) = dropped.iter().position(|(v, p)| *v == verb && path.contains(p.as_str())) {
                dropped.remove(index);
                return Err(NdfcError::Transport(format!("connection reset during {verb} {path}")));
            }
        }

        if let Some(response) = self.take_injected(verb, path) {
            return Ok(response);
        }
        Ok(vrfs::dispatch(self, verb, path, payload))
    }
}
