//! VRF, attachment and VRF-LITE playbook entries

use serde::{Deserialize, Serialize};

pub const DEFAULT_VRF_TEMPLATE: &str = "Default_VRF_Universal";
pub const DEFAULT_VRF_EXTENSION_TEMPLATE: &str = "Default_VRF_Extension_Universal";

/// One VRF in the playbook `config` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrfConfig {
    /// VRF name, unique within the fabric
    pub vrf_name: String,

    /// Segment id; allocated by the controller when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_id: Option<u64>,

    /// VLAN id; allocated by the controller when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u64>,

    #[serde(default = "default_vrf_template")]
    pub vrf_template: String,

    #[serde(default = "default_vrf_extension_template")]
    pub vrf_extension_template: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_vrf_template: Option<String>,

    #[serde(default)]
    pub vrf_vlan_name: String,

    #[serde(default)]
    pub vrf_intf_desc: String,

    #[serde(default)]
    pub vrf_description: String,

    #[serde(default = "default_mtu")]
    pub vrf_int_mtu: u32,

    #[serde(default = "default_route_tag")]
    pub loopback_route_tag: u32,

    #[serde(default = "default_route_map")]
    pub redist_direct_rmap: String,

    #[serde(default = "default_max_bgp_paths")]
    pub max_bgp_paths: u32,

    #[serde(default = "default_max_ibgp_paths")]
    pub max_ibgp_paths: u32,

    #[serde(default = "default_true")]
    pub ipv6_linklocal_enable: bool,

    #[serde(default)]
    pub trm_enable: bool,

    #[serde(default)]
    pub no_rp: bool,

    #[serde(default)]
    pub rp_external: bool,

    #[serde(default)]
    pub rp_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_loopback_id: Option<u32>,

    #[serde(default)]
    pub underlay_mcast_ip: String,

    #[serde(default)]
    pub overlay_mcast_group: String,

    #[serde(default)]
    pub trm_bgw_msite: bool,

    #[serde(default)]
    pub adv_host_routes: bool,

    #[serde(default = "default_true")]
    pub adv_default_routes: bool,

    #[serde(default = "default_true")]
    pub static_default_route: bool,

    #[serde(default)]
    pub bgp_password: String,

    #[serde(default = "default_bgp_passwd_encrypt")]
    pub bgp_passwd_encrypt: u32,

    #[serde(default)]
    pub netflow_enable: bool,

    #[serde(default)]
    pub nf_monitor: String,

    #[serde(default)]
    pub disable_rt_auto: bool,

    #[serde(default)]
    pub import_vpn_rt: String,

    #[serde(default)]
    pub export_vpn_rt: String,

    #[serde(default)]
    pub import_evpn_rt: String,

    #[serde(default)]
    pub export_evpn_rt: String,

    #[serde(default)]
    pub import_mvpn_rt: String,

    #[serde(default)]
    pub export_mvpn_rt: String,

    /// Switch attachments; `None` means "not specified" rather than "none"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach: Option<Vec<VrfAttachConfig>>,

    /// Push configuration to switches after attaching
    #[serde(default = "default_true")]
    pub deploy: bool,
}

impl VrfConfig {
    /// Entry carrying only a name and defaults for everything else
    pub fn named(vrf_name: impl Into<String>) -> Self {
        Self {
            vrf_name: vrf_name.into(),
            vrf_id: None,
            vlan_id: None,
            vrf_template: default_vrf_template(),
            vrf_extension_template: default_vrf_extension_template(),
            service_vrf_template: None,
            vrf_vlan_name: String::new(),
            vrf_intf_desc: String::new(),
            vrf_description: String::new(),
            vrf_int_mtu: default_mtu(),
            loopback_route_tag: default_route_tag(),
            redist_direct_rmap: default_route_map(),
            max_bgp_paths: default_max_bgp_paths(),
            max_ibgp_paths: default_max_ibgp_paths(),
            ipv6_linklocal_enable: true,
            trm_enable: false,
            no_rp: false,
            rp_external: false,
            rp_address: String::new(),
            rp_loopback_id: None,
            underlay_mcast_ip: String::new(),
            overlay_mcast_group: String::new(),
            trm_bgw_msite: false,
            adv_host_routes: false,
            adv_default_routes: true,
            static_default_route: true,
            bgp_password: String::new(),
            bgp_passwd_encrypt: default_bgp_passwd_encrypt(),
            netflow_enable: false,
            nf_monitor: String::new(),
            disable_rt_auto: false,
            import_vpn_rt: String::new(),
            export_vpn_rt: String::new(),
            import_evpn_rt: String::new(),
            export_evpn_rt: String::new(),
            import_mvpn_rt: String::new(),
            export_mvpn_rt: String::new(),
            attach: None,
            deploy: true,
        }
    }
}

/// Attachment of a VRF to one switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VrfAttachConfig {
    /// Management IP of the switch; resolved to a serial number via inventory
    pub ip_address: String,

    /// VRF-LITE connections, border switches only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_lite: Option<Vec<VrfLiteConfig>>,

    #[serde(default)]
    pub import_evpn_rt: String,

    #[serde(default)]
    pub export_evpn_rt: String,

    #[serde(default = "default_true")]
    pub deploy: bool,
}

impl VrfAttachConfig {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            vrf_lite: None,
            import_evpn_rt: String::new(),
            export_evpn_rt: String::new(),
            deploy: true,
        }
    }
}

/// One VRF-LITE connection on a border switch interface
///
/// Unset properties are filled in from the controller's auto-generated
/// values for the interface when the attachment is pushed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VrfLiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_vrf: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbor_ipv4: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbor_ipv6: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dot1q: Option<u32>,
}

fn default_vrf_template() -> String {
    DEFAULT_VRF_TEMPLATE.to_string()
}

fn default_vrf_extension_template() -> String {
    DEFAULT_VRF_EXTENSION_TEMPLATE.to_string()
}

fn default_mtu() -> u32 {
    9216
}

fn default_route_tag() -> u32 {
    12345
}

fn default_route_map() -> String {
    "FABRIC-RMAP-REDIST-SUBNET".to_string()
}

fn default_max_bgp_paths() -> u32 {
    1
}

fn default_max_ibgp_paths() -> u32 {
    2
}

fn default_bgp_passwd_encrypt() -> u32 {
    3
}

fn default_true() -> bool {
    true
}
