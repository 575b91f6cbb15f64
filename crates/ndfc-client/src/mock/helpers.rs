//! Envelope builders and path parsing for the mock controller

use crate::models::{ControllerResponse, Verb};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub(crate) fn ok(verb: Verb, path: &str, data: Value) -> ControllerResponse {
    ControllerResponse::ok(verb, path, data)
}

pub(crate) fn not_found(verb: Verb, path: &str) -> ControllerResponse {
    ControllerResponse {
        return_code: 404,
        message: Some("Not Found".to_string()),
        error: Some("Not Found".to_string()),
        method: verb.to_string(),
        request_path: path.to_string(),
        data: Value::Null,
        check_mode: false,
    }
}

pub(crate) fn bad_request(verb: Verb, path: &str, error: &str) -> ControllerResponse {
    ControllerResponse::error(verb, path, 400, "Bad Request", error, json!({ "message": error }))
}

/// Split `path?query` into the path and its decoded key/value pairs
pub(crate) fn split_query(path: &str) -> (&str, BTreeMap<String, String>) {
    match path.split_once('?') {
        Some((base, query)) => {
            let params = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (base, params)
        }
        None => (path, BTreeMap::new()),
    }
}

/// Comma separated query value as a list, skipping empty items
pub(crate) fn csv(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Template config as the controller stores it for a default VRF
pub(crate) fn default_template_config(vrf_name: &str, vrf_id: u64, vlan_id: u64) -> Value {
    json!({
        "vrfSegmentId": vrf_id.to_string(),
        "vrfName": vrf_name,
        "vrfVlanId": vlan_id.to_string(),
        "vrfVlanName": "",
        "vrfIntfDescription": "",
        "vrfDescription": "",
        "mtu": "9216",
        "tag": "12345",
        "vrfRouteMap": "FABRIC-RMAP-REDIST-SUBNET",
        "maxBgpPaths": "1",
        "maxIbgpPaths": "2",
        "ipv6LinkLocalFlag": "true",
        "trmEnabled": "false",
        "isRPAbsent": "false",
        "isRPExternal": "false",
        "rpAddress": "",
        "loopbackNumber": "",
        "L3VniMcastGroup": "",
        "multicastGroup": "",
        "trmBGWMSiteEnabled": "false",
        "advertiseHostRouteFlag": "false",
        "advertiseDefaultRouteFlag": "true",
        "configureStaticDefaultRouteFlag": "true",
        "bgpPassword": "",
        "bgpPasswordKeyType": "3",
        "ENABLE_NETFLOW": "false",
        "NETFLOW_MONITOR": "",
        "disableRtAuto": "false",
        "routeTargetImport": "",
        "routeTargetExport": "",
        "routeTargetImportEvpn": "",
        "routeTargetExportEvpn": "",
        "routeTargetImportMvpn": "",
        "routeTargetExportMvpn": "",
    })
}

pub(crate) fn default_instance_values() -> Value {
    json!({
        "loopbackId": "",
        "loopbackIpAddress": "",
        "loopbackIpV6Address": "",
    })
}

/// Read an integer that the controller may have encoded as a string
pub(crate) fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
