//! Fabric inventory lookup
//!
//! Maps switch management IPs to serial numbers and roles, and records the
//! fabric type so multisite (MFD) fabrics can opt out of rollback.

use crate::error::ControllerError;
use crate::reconciler::response::{Action, handle_response};
use crate::reconciler::wire::{data_list, decode};
use ndfc_client::{ApiPaths, NdfcClientTrait, RestSend, Verb};
use serde::Deserialize;
use tracing::{debug, info};

/// Roles that may carry VRF-LITE extensions
pub const BORDER_ROLES: [&str; 5] = [
    "border",
    "border spine",
    "border gateway",
    "border gateway spine",
    "border super spine",
];

/// Fabric type of multisite domains
pub const MULTISITE_FABRIC_TYPE: &str = "MFD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchInfo {
    pub ip_address: String,
    pub serial_number: String,
    pub name: String,
    pub role: String,
}

impl SwitchInfo {
    pub fn new(ip_address: &str, serial_number: &str, role: &str) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            serial_number: serial_number.to_string(),
            name: format!("switch-{serial_number}"),
            role: role.to_string(),
        }
    }

    pub fn is_border(&self) -> bool {
        let role = self.role.to_ascii_lowercase();
        BORDER_ROLES.contains(&role.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryEntry {
    ip_address: String,
    serial_number: String,
    #[serde(default)]
    logical_name: Option<String>,
    #[serde(default)]
    switch_role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FabricDetails {
    #[serde(default)]
    fabric_type: Option<String>,
}

/// Switches of one fabric
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    switches: Vec<SwitchInfo>,
    fabric_type: String,
}

impl Inventory {
    pub fn from_switches(switches: Vec<SwitchInfo>, fabric_type: &str) -> Self {
        Self {
            switches,
            fabric_type: fabric_type.to_string(),
        }
    }

    /// Read the fabric type and switch inventory from the controller
    pub async fn fetch(
        client: &dyn NdfcClientTrait,
        paths: &ApiPaths,
        fabric: &str,
    ) -> Result<Self, ControllerError> {
        let mut rest = RestSend::new(client);

        rest.verb(Verb::Get).path(paths.fabric(fabric));
        let response = rest.commit().await?;
        let (missing_fabric, not_ok) = handle_response(&response, Action::Query);
        if missing_fabric {
            return Err(ControllerError::InvalidConfig(format!(
                "Fabric {fabric} not present on the controller"
            )));
        }
        if not_ok {
            return Err(ControllerError::Query(format!(
                "Unable to read fabric {}: {} {}",
                fabric,
                response.return_code,
                response.message()
            )));
        }
        let details: FabricDetails =
            serde_json::from_value(response.data.clone()).map_err(ndfc_client::NdfcError::from)?;
        let fabric_type = details.fabric_type.unwrap_or_default();
        debug!("Fabric {} has type {}", fabric, fabric_type);

        rest.path(paths.inventory(fabric));
        let response = rest.commit().await?;
        let (missing_fabric, not_ok) = handle_response(&response, Action::Query);
        if missing_fabric || not_ok {
            return Err(ControllerError::Query(format!(
                "Unable to read inventory of fabric {}: {} {}",
                fabric,
                response.return_code,
                response.message()
            )));
        }
        let entries: Vec<InventoryEntry> = decode(data_list(&response.data))?;
        let switches: Vec<SwitchInfo> = entries
            .into_iter()
            .map(|entry| SwitchInfo {
                name: entry.logical_name.unwrap_or_default(),
                role: entry.switch_role.unwrap_or_default(),
                ip_address: entry.ip_address,
                serial_number: entry.serial_number,
            })
            .collect();

        info!("Fabric {} inventory has {} switches", fabric, switches.len());
        Ok(Self { switches, fabric_type })
    }

    pub fn by_ip(&self, ip_address: &str) -> Option<&SwitchInfo> {
        self.switches.iter().find(|s| s.ip_address == ip_address)
    }

    pub fn by_serial(&self, serial_number: &str) -> Option<&SwitchInfo> {
        self.switches.iter().find(|s| s.serial_number == serial_number)
    }

    /// Management IP for a serial, falling back to the serial itself
    pub fn ip_for_serial<'a>(&'a self, serial_number: &'a str) -> &'a str {
        self.by_serial(serial_number)
            .map_or(serial_number, |s| s.ip_address.as_str())
    }

    pub fn fabric_type(&self) -> &str {
        &self.fabric_type
    }

    pub fn is_multisite(&self) -> bool {
        self.fabric_type == MULTISITE_FABRIC_TYPE
    }
}
