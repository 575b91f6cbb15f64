//! Internal reconciliation model
//!
//! These types are what the diff engine works on. They are built from the
//! playbook (want) or from controller reads (have) and turned into wire
//! payloads only when pushed, see `wire.rs`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use vrf_playbook::{State, VrfLiteConfig};

/// VRF-LITE properties compared between want and have, matched by `IF_NAME`
pub const VRF_LITE_PROPERTIES: [&str; 7] = [
    "DOT1Q_ID",
    "IF_NAME",
    "IP_MASK",
    "IPV6_MASK",
    "IPV6_NEIGHBOR",
    "NEIGHBOR_IP",
    "PEER_VRF_NAME",
];

pub const VRF_LITE_JYTHON_TEMPLATE: &str = "Ext_VRF_Lite_Jython";

/// Instance values the controller assigns and the playbook cannot set
pub const CONTROLLER_INSTANCE_KEYS: [&str; 3] =
    ["loopbackId", "loopbackIpAddress", "loopbackIpV6Address"];

/// Read an integer that the controller may have encoded as a string
pub fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compare template values the way the controller treats them.
///
/// `null`, `""` and `"none"` are all unset, numbers and booleans equal their
/// string forms.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
                Some(trimmed.to_ascii_lowercase())
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Ordered `vrfTemplateConfig` map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateConfig(Map<String, Value>);

impl TemplateConfig {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse the controller's JSON-string form; an empty string is an empty map
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// `vrfVlanId`; 0 means "let the controller pick"
    pub fn vlan_id(&self) -> u64 {
        as_u64(self.get("vrfVlanId")).unwrap_or(0)
    }

    pub fn set_vlan_id(&mut self, vlan_id: u64) {
        self.set("vrfVlanId", json!(vlan_id));
    }

    pub fn segment_id(&self) -> Option<u64> {
        as_u64(self.get("vrfSegmentId"))
    }
}

/// A VRF as configured or as found on the controller
#[derive(Debug, Clone, PartialEq)]
pub struct VrfRecord {
    pub fabric: String,
    pub vrf_name: String,
    pub vrf_id: Option<u64>,
    pub vrf_template: String,
    pub vrf_extension_template: String,
    pub service_vrf_template: Option<String>,
    pub template_config: TemplateConfig,
    pub source: Option<String>,
}

impl VrfRecord {
    /// Record the segment id in both places the controller expects it
    pub fn set_vrf_id(&mut self, vrf_id: u64) {
        self.vrf_id = Some(vrf_id);
        self.template_config.set("vrfSegmentId", json!(vrf_id));
    }
}

/// One `VRF_LITE_CONN` entry keyed by controller property name
pub type VrfLiteConn = BTreeMap<String, String>;

/// Per-attachment instance values (loopbacks, switch route targets)
pub type InstanceValues = BTreeMap<String, String>;

/// Decoded `extensionValues` of an attachment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionValues {
    pub vrf_lite_conn: Vec<VrfLiteConn>,
    pub multisite_conn: Vec<Value>,
}

impl ExtensionValues {
    /// Decode the controller's doubly JSON-encoded form.
    ///
    /// Returns `None` for an empty string or when `VRF_LITE_CONN` is absent.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return None;
        }
        let outer: Value = serde_json::from_str(raw).ok()?;
        let lite = nested_list(outer.get("VRF_LITE_CONN")?, "VRF_LITE_CONN")?;
        let multisite = outer
            .get("MULTISITE_CONN")
            .and_then(|v| nested_list(v, "MULTISITE_CONN"))
            .unwrap_or_default();

        let vrf_lite_conn = lite
            .iter()
            .filter_map(Value::as_object)
            .map(|conn| {
                conn.iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::String(s) => s.clone(),
                            Value::Null => String::new(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect()
            })
            .collect();
        Some(Self { vrf_lite_conn, multisite_conn: multisite })
    }

    /// Encode back into the controller's doubly JSON-encoded form
    pub fn encode(&self) -> String {
        let lite = json!({ "VRF_LITE_CONN": self.vrf_lite_conn }).to_string();
        let multisite = json!({ "MULTISITE_CONN": self.multisite_conn }).to_string();
        json!({ "VRF_LITE_CONN": lite, "MULTISITE_CONN": multisite }).to_string()
    }

    pub fn has_vrf_lite(&self) -> bool {
        !self.vrf_lite_conn.is_empty()
    }
}

/// `{"KEY": "{\"KEY\": [...]}"}` or `{"KEY": {"KEY": [...]}}` or `{"KEY": [...]}`
fn nested_list(value: &Value, key: &str) -> Option<Vec<Value>> {
    match value {
        Value::String(s) => {
            let inner: Value = serde_json::from_str(s).ok()?;
            nested_list(&inner, key)
        }
        Value::Object(map) => nested_list(map.get(key)?, key),
        Value::Array(items) => Some(items.clone()),
        _ => None,
    }
}

/// Attachment of a VRF to one switch
///
/// `is_attached` and `is_deploy` are bookkeeping for the diff and are never
/// sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRecord {
    pub fabric: String,
    pub vrf_name: String,
    pub serial_number: String,
    pub vlan: u64,
    pub is_attached: bool,
    pub deployment: bool,
    pub is_deploy: bool,
    pub extension_values: Option<ExtensionValues>,
    pub instance_values: Option<InstanceValues>,
    pub freeform_config: String,
    /// VRF-LITE entries from the playbook, completed at push time
    pub vrf_lite: Vec<VrfLiteConfig>,
}

impl AttachmentRecord {
    pub fn has_vrf_lite(&self) -> bool {
        self.extension_values.as_ref().is_some_and(ExtensionValues::has_vrf_lite)
    }

    /// Copy of this attachment that removes it from the switch
    pub fn detached(&self) -> Self {
        Self {
            deployment: false,
            ..self.clone()
        }
    }
}

/// Attachments of one VRF
#[derive(Debug, Clone, PartialEq)]
pub struct VrfAttach {
    pub vrf_name: String,
    pub lan_attach_list: Vec<AttachmentRecord>,
}

/// Readiness of a VRF scheduled for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteState {
    #[serde(rename = "DEPLOYED")]
    Deployed,
    #[serde(rename = "OUT-OF-SYNC")]
    OutOfSync,
    #[serde(rename = "NA")]
    Na,
}

impl DeleteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteState::Deployed => "DEPLOYED",
            DeleteState::OutOfSync => "OUT-OF-SYNC",
            DeleteState::Na => "NA",
        }
    }
}

/// Everything one run has to push
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffSets {
    /// New VRFs with a segment id
    pub create: Vec<VrfRecord>,
    /// Existing VRFs whose template changed
    pub create_update: Vec<VrfRecord>,
    /// New VRFs that need a segment id from the controller first
    pub create_quick: Vec<VrfRecord>,
    pub attach: Vec<VrfAttach>,
    pub detach: Vec<VrfAttach>,
    pub deploy: BTreeSet<String>,
    pub undeploy: BTreeSet<String>,
    pub delete: BTreeMap<String, DeleteState>,
}

impl DiffSets {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.create_update.is_empty()
            && self.create_quick.is_empty()
            && self.attach.is_empty()
            && self.detach.is_empty()
            && self.deploy.is_empty()
            && self.undeploy.is_empty()
            && self.delete.is_empty()
    }
}

/// VRFs, their attachments and the VRFs to deploy, for one side of the diff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FabricVrfs {
    pub create: Vec<VrfRecord>,
    pub attach: Vec<VrfAttach>,
    pub deploy: BTreeSet<String>,
}

impl FabricVrfs {
    pub fn vrf(&self, vrf_name: &str) -> Option<&VrfRecord> {
        self.create.iter().find(|v| v.vrf_name == vrf_name)
    }

    pub fn attachments(&self, vrf_name: &str) -> Option<&VrfAttach> {
        self.attach.iter().find(|a| a.vrf_name == vrf_name)
    }
}

/// Desired state
pub type Want = FabricVrfs;

/// Controller state
pub type Have = FabricVrfs;

/// Immutable input of the diff functions
#[derive(Debug, Clone)]
pub struct ReconciliationContext {
    pub fabric: String,
    pub state: State,
    pub want: Want,
    pub have: Have,
}
