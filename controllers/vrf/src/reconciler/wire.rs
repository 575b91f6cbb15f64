//! Controller wire shapes
//!
//! Request payloads are built from the internal model right before they are
//! sent; controller reads are decoded into the `Controller*` structs and then
//! normalized into the model.

use super::model::{
    AttachmentRecord, InstanceValues, TemplateConfig, VrfAttach, VrfRecord, as_u64,
};
use crate::error::ControllerError;
use ndfc_client::NdfcError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Body of `POST vrfs` and `PUT vrfs/{name}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfPayload {
    pub fabric: String,
    pub vrf_name: String,
    pub vrf_id: Option<u64>,
    pub vrf_template: String,
    pub vrf_extension_template: String,
    pub vrf_template_config: String,
    pub service_vrf_template: Option<String>,
    pub source: Option<String>,
}

impl From<&VrfRecord> for VrfPayload {
    fn from(record: &VrfRecord) -> Self {
        Self {
            fabric: record.fabric.clone(),
            vrf_name: record.vrf_name.clone(),
            vrf_id: record.vrf_id,
            vrf_template: record.vrf_template.clone(),
            vrf_extension_template: record.vrf_extension_template.clone(),
            vrf_template_config: record.template_config.to_json_string(),
            service_vrf_template: record.service_vrf_template.clone(),
            source: record.source.clone(),
        }
    }
}

/// One entry of an attach or detach list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanAttachItem {
    pub fabric: String,
    pub vrf_name: String,
    pub serial_number: String,
    pub vlan: u64,
    pub deployment: bool,
    pub extension_values: String,
    pub instance_values: String,
    pub freeform_config: String,
}

impl From<&AttachmentRecord> for LanAttachItem {
    fn from(record: &AttachmentRecord) -> Self {
        let instance_values = record
            .instance_values
            .as_ref()
            .map(|values| serde_json::to_string(values).unwrap_or_default())
            .unwrap_or_default();
        Self {
            fabric: record.fabric.clone(),
            vrf_name: record.vrf_name.clone(),
            serial_number: record.serial_number.clone(),
            vlan: record.vlan,
            deployment: record.deployment,
            extension_values: record
                .extension_values
                .as_ref()
                .map(|ext| ext.encode())
                .unwrap_or_default(),
            instance_values,
            freeform_config: record.freeform_config.clone(),
        }
    }
}

/// Body element of `POST vrfs/attachments`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachPayload {
    pub vrf_name: String,
    pub lan_attach_list: Vec<LanAttachItem>,
}

impl From<&VrfAttach> for AttachPayload {
    fn from(attach: &VrfAttach) -> Self {
        Self {
            vrf_name: attach.vrf_name.clone(),
            lan_attach_list: attach.lan_attach_list.iter().map(LanAttachItem::from).collect(),
        }
    }
}

/// Body of `POST vrfs/deployments`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployPayload {
    pub vrf_names: String,
}

impl DeployPayload {
    pub fn new(vrf_names: &BTreeSet<String>) -> Self {
        Self {
            vrf_names: vrf_names.iter().map(String::as_str).collect::<Vec<_>>().join(","),
        }
    }
}

pub fn to_payload<T: Serialize>(payload: &T) -> Result<Value, ControllerError> {
    Ok(serde_json::to_value(payload).map_err(NdfcError::from)?)
}

/// `DATA` as a list; `null` is an empty list and an object is a list of one
pub fn data_list(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        Value::Object(_) => vec![data.clone()],
        _ => Vec::new(),
    }
}

/// Decode every item of a `DATA` list
pub fn decode<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, ControllerError> {
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| ControllerError::from(NdfcError::from(e))))
        .collect()
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(as_u64(value.as_ref()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// VRF object from `GET vrfs`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerVrf {
    pub vrf_name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub vrf_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vrf_template: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vrf_extension_template: String,
    #[serde(default)]
    pub vrf_template_config: Value,
    #[serde(default)]
    pub service_vrf_template: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ControllerVrf {
    pub fn into_record(self, fabric: &str) -> Result<VrfRecord, ControllerError> {
        let template_config = match self.vrf_template_config {
            Value::String(raw) => TemplateConfig::from_json_str(&raw).map_err(NdfcError::from)?,
            Value::Object(map) => TemplateConfig::new(map),
            _ => TemplateConfig::default(),
        };
        Ok(VrfRecord {
            fabric: fabric.to_string(),
            vrf_name: self.vrf_name,
            vrf_id: self.vrf_id,
            vrf_template: self.vrf_template,
            vrf_extension_template: self.vrf_extension_template,
            service_vrf_template: self.service_vrf_template,
            template_config,
            source: self.source,
        })
    }
}

/// Attachments of one VRF from `GET vrfs/attachments`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerVrfAttachments {
    pub vrf_name: String,
    #[serde(default)]
    pub lan_attach_list: Option<Vec<ControllerAttachment>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerAttachment {
    #[serde(default, deserialize_with = "lenient_string")]
    pub vrf_name: String,
    pub switch_serial_no: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub switch_name: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub vlan_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lan_attach_state: String,
    #[serde(default)]
    pub is_lan_attached: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub instance_values: String,
}

impl ControllerAttachment {
    pub fn instance_values(&self) -> Option<InstanceValues> {
        parse_instance_values(&self.instance_values)
    }
}

/// Instance values arrive as a JSON string; non-string values are stringified
pub fn parse_instance_values(raw: &str) -> Option<InstanceValues> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let map = value.as_object()?;
    Some(
        map.iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect(),
    )
}

/// Per-switch details of one VRF from `GET vrfs/switches`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSwitchDetails {
    pub vrf_name: String,
    #[serde(default)]
    pub switch_details_list: Option<Vec<SwitchDetail>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDetail {
    pub serial_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extension_values: String,
    #[serde(default)]
    pub extension_prototype_values: Option<Vec<ExtensionPrototype>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub freeform_config: String,
}

/// Auto-generated extension values the controller offers for an interface
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPrototype {
    pub interface_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extension_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extension_values: String,
}

impl ExtensionPrototype {
    pub fn is_vrf_lite(&self) -> bool {
        self.extension_type == "VRF_LITE"
    }

    /// Decoded `extensionValues`, stringified
    pub fn values(&self) -> std::collections::BTreeMap<String, String> {
        parse_instance_values(&self.extension_values).unwrap_or_default()
    }
}
