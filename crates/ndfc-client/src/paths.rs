//! Controller API path table
//!
//! Paths differ between DCNM 11 and NDFC 12. The table is a plain value that
//! is built once from the detected [`ApiVersion`] and handed to whoever needs
//! to address the controller.

use crate::error::NdfcError;
use std::str::FromStr;

/// Controllers accept URLs up to this many characters
pub const MAX_URL_LEN: usize = 6144;

/// Budget used to size chunks once a URL is over [`MAX_URL_LEN`]
pub const URL_CHUNK_BUDGET: usize = 5900;

/// Controller API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    /// DCNM 11.x
    V11,
    /// NDFC 12.x
    #[default]
    V12,
}

impl ApiVersion {
    /// Key holding the next free segment id in the `vrfinfo` payload
    pub fn vrf_id_key(&self) -> &'static str {
        match self {
            ApiVersion::V11 => "partitionSegmentId",
            ApiVersion::V12 => "l3vni",
        }
    }
}

impl FromStr for ApiVersion {
    type Err = NdfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "11" => Ok(ApiVersion::V11),
            "12" => Ok(ApiVersion::V12),
            other => Err(NdfcError::Api(format!("Unsupported controller API version: {other}"))),
        }
    }
}

/// Path templates for the VRF family of endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    version: ApiVersion,
    prefix: &'static str,
}

impl ApiPaths {
    pub fn for_version(version: ApiVersion) -> Self {
        let prefix = match version {
            ApiVersion::V11 => "/rest",
            ApiVersion::V12 => "/appcenter/Cisco/ndfc/api/v1/lan-fabric/rest",
        };
        Self { version, prefix }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// `GET`/`POST` the VRF list of a fabric
    pub fn vrfs(&self, fabric: &str) -> String {
        format!("{}/top-down/fabrics/{}/vrfs", self.prefix, fabric)
    }

    /// `PUT`/`DELETE` a single VRF
    pub fn vrf(&self, fabric: &str, vrf_name: &str) -> String {
        format!("{}/{}", self.vrfs(fabric), vrf_name)
    }

    /// `GET` attachment state for a comma separated list of VRFs
    pub fn vrf_attachments(&self, fabric: &str, vrf_names: &str) -> String {
        format!("{}/attachments?vrf-names={}", self.vrfs(fabric), vrf_names)
    }

    /// `POST` attach/detach lists
    pub fn vrf_attachments_post(&self, fabric: &str) -> String {
        format!("{}/attachments", self.vrfs(fabric))
    }

    /// `POST` deploy/undeploy requests
    pub fn vrf_deployments(&self, fabric: &str) -> String {
        format!("{}/deployments", self.vrfs(fabric))
    }

    /// `GET` per-switch VRF details, including VRF-LITE extension prototypes
    pub fn vrf_switches(&self, fabric: &str, vrf_names: &str, serials: &str) -> String {
        format!(
            "{}/switches?vrf-names={}&serial-numbers={}",
            self.vrfs(fabric),
            vrf_names,
            serials
        )
    }

    /// `GET` the next free VRF segment id
    pub fn vrf_id(&self, fabric: &str) -> String {
        match self.version {
            ApiVersion::V11 => format!("{}/managed-pool/fabrics/{}/partitions/ids", self.prefix, fabric),
            ApiVersion::V12 => format!("{}/top-down/fabrics/{}/vrfinfo", self.prefix, fabric),
        }
    }

    /// `GET` the next free VRF VLAN id
    pub fn vlan(&self, fabric: &str) -> String {
        format!(
            "{}/resource-manager/vlan/{}?vlanUsageType=TOP_DOWN_VRF_VLAN",
            self.prefix, fabric
        )
    }

    /// `GET` the VRF VLAN resource pool of a fabric
    pub fn resource_pool(&self, fabric: &str) -> String {
        format!(
            "{}/resource-manager/fabrics/{}/pools/TOP_DOWN_VRF_VLAN",
            self.prefix, fabric
        )
    }

    /// `DELETE` resource-manager entries by id
    pub fn resources(&self, ids: &[u64]) -> String {
        let ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        format!("{}/resource-manager/resources?id={}", self.prefix, ids)
    }

    /// `GET` fabric details (type, template)
    pub fn fabric(&self, fabric: &str) -> String {
        format!("{}/control/fabrics/{}", self.prefix, fabric)
    }

    /// `GET` switch inventory of a fabric
    pub fn inventory(&self, fabric: &str) -> String {
        match self.version {
            ApiVersion::V11 => format!("{}/control/fabrics/{}/inventory", self.prefix, fabric),
            ApiVersion::V12 => format!(
                "{}/control/fabrics/{}/inventory/switchesByFabric",
                self.prefix, fabric
            ),
        }
    }
}

/// Split `items` so that each URL built from a group stays under the
/// controller's length limit.
///
/// `full_len` is the length of the URL built with every item. When it fits,
/// one group holding everything is returned. Otherwise the items are split
/// into `ceil(full_len / URL_CHUNK_BUDGET)` evenly sized groups, the last one
/// taking the remainder.
pub fn chunk_items<'a>(full_len: usize, items: &[&'a str]) -> Vec<Vec<&'a str>> {
    if full_len <= MAX_URL_LEN || items.len() < 2 {
        return vec![items.to_vec()];
    }
    let send_count = full_len.div_ceil(URL_CHUNK_BUDGET).min(items.len());
    let per_chunk = items.len() / send_count;
    (0..send_count)
        .map(|i| {
            let start = i * per_chunk;
            if i == send_count - 1 {
                items[start..].to_vec()
            } else {
                items[start..start + per_chunk].to_vec()
            }
        })
        .collect()
}
