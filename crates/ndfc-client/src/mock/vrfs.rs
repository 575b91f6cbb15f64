//! VRF family endpoints for MockNdfcClient
//!
//! Handles VRFs, attachments, deployments, switch details, id/VLAN
//! allocation, the VLAN resource pool and fabric inventory.

use super::helpers::{self, as_u64, bad_request, csv, not_found, ok, split_query};
use super::{FabricState, MockAttachment, MockNdfcClient};
use crate::models::{ControllerResponse, Verb};
use serde_json::{json, Map, Value};

#[derive(Debug, PartialEq)]
enum Route {
    Vrfs,
    Vrf(String),
    Attachments,
    Deployments,
    Switches,
    VrfInfo,
    Vlan,
    ResourcePool,
    Resources,
    Fabric,
    Inventory,
}

/// Resolve a request path; `Err(())` means the fabric is not the one served
fn route(fabric: &str, base: &str) -> Option<Result<Route, ()>> {
    let check = |f: &str, r: Route| if f == fabric { Ok(r) } else { Err(()) };

    if let Some((_, rest)) = base.split_once("/top-down/fabrics/") {
        let segments: Vec<&str> = rest.split('/').collect();
        return match segments.as_slice() {
            [f, "vrfs"] => Some(check(f, Route::Vrfs)),
            [f, "vrfs", "attachments"] => Some(check(f, Route::Attachments)),
            [f, "vrfs", "deployments"] => Some(check(f, Route::Deployments)),
            [f, "vrfs", "switches"] => Some(check(f, Route::Switches)),
            [f, "vrfs", name] => Some(check(f, Route::Vrf((*name).to_string()))),
            [f, "vrfinfo"] => Some(check(f, Route::VrfInfo)),
            _ => None,
        };
    }
    if let Some((_, rest)) = base.split_once("/managed-pool/fabrics/") {
        let fabric_name = rest.split('/').next().unwrap_or_default();
        return Some(check(fabric_name, Route::VrfInfo));
    }
    if let Some((_, rest)) = base.split_once("/resource-manager/vlan/") {
        return Some(check(rest, Route::Vlan));
    }
    if let Some((_, rest)) = base.split_once("/resource-manager/fabrics/") {
        let fabric_name = rest.split('/').next().unwrap_or_default();
        return Some(check(fabric_name, Route::ResourcePool));
    }
    if base.ends_with("/resource-manager/resources") {
        return Some(Ok(Route::Resources));
    }
    if let Some((_, rest)) = base.split_once("/control/fabrics/") {
        let mut segments = rest.split('/');
        let fabric_name = segments.next().unwrap_or_default();
        return match segments.next() {
            Some("inventory") => Some(check(fabric_name, Route::Inventory)),
            None => Some(check(fabric_name, Route::Fabric)),
            Some(_) => None,
        };
    }
    None
}

pub(crate) fn dispatch(
    client: &MockNdfcClient,
    verb: Verb,
    path: &str,
    payload: Option<&Value>,
) -> ControllerResponse {
    let fabric = client.fabric.lock().unwrap().clone();
    let (base, query) = split_query(path);
    let route = match route(&fabric, base) {
        Some(Ok(route)) => route,
        _ => return not_found(verb, path),
    };

    let mut state = client.state.lock().unwrap();
    let state = &mut *state;
    match (verb, route) {
        (Verb::Get, Route::Vrfs) => ok(verb, path, Value::Array(state.vrfs.values().cloned().collect())),
        (Verb::Post, Route::Vrfs) => create_vrf(state, verb, path, payload),
        (Verb::Put, Route::Vrf(name)) => update_vrf(state, verb, path, &name, payload),
        (Verb::Delete, Route::Vrf(name)) => delete_vrf(state, verb, path, &name),
        (Verb::Get, Route::Attachments) => {
            let names = csv(query.get("vrf-names"));
            ok(verb, path, attachments(state, &fabric, &names))
        }
        (Verb::Post, Route::Attachments) => attach(state, verb, path, payload),
        (Verb::Post, Route::Deployments) => deploy(state, verb, path, payload),
        (Verb::Get, Route::Switches) => {
            let names = csv(query.get("vrf-names"));
            let serials = csv(query.get("serial-numbers"));
            ok(verb, path, switch_details(state, &names, &serials))
        }
        (Verb::Get, Route::VrfInfo) => ok(
            verb,
            path,
            json!({
                "l3vni": state.next_vrf_id,
                "partitionSegmentId": state.next_vrf_id,
                "vrf-name": format!("MyVRF_{}", state.next_vrf_id),
            }),
        ),
        (Verb::Get, Route::Vlan) => ok(verb, path, json!(next_free_vlan(state))),
        (Verb::Get, Route::ResourcePool) => ok(
            verb,
            path,
            Value::Array(
                state
                    .resources
                    .iter()
                    .map(|r| {
                        json!({
                            "id": r.id,
                            "entityName": r.entity_name,
                            "allocatedFlag": r.allocated,
                            "allocatedIp": r.vlan_id.to_string(),
                            "resourcePool": {"poolName": "TOP_DOWN_VRF_VLAN"},
                        })
                    })
                    .collect(),
            ),
        ),
        (Verb::Delete, Route::Resources) => {
            let ids: Vec<u64> = csv(query.get("id")).iter().filter_map(|s| s.parse().ok()).collect();
            state.resources.retain(|r| !ids.contains(&r.id));
            ok(verb, path, Value::Null)
        }
        (Verb::Get, Route::Fabric) => {
            let template = if state.fabric_type == "MFD" { "MSD_Fabric" } else { "Easy_Fabric" };
            ok(
                verb,
                path,
                json!({"fabricName": fabric, "fabricType": state.fabric_type, "templateName": template}),
            )
        }
        (Verb::Get, Route::Inventory) => ok(
            verb,
            path,
            Value::Array(
                state
                    .switches
                    .values()
                    .map(|s| {
                        json!({
                            "ipAddress": s.ip_address,
                            "serialNumber": s.serial_number,
                            "logicalName": s.name,
                            "switchRole": s.role,
                        })
                    })
                    .collect(),
            ),
        ),
        _ => not_found(verb, path),
    }
}

fn template_vlan(vrf: &Value) -> Option<u64> {
    let config: Value = serde_json::from_str(vrf.get("vrfTemplateConfig")?.as_str()?).ok()?;
    as_u64(config.get("vrfVlanId"))
}

fn next_free_vlan(state: &FabricState) -> u64 {
    let mut candidate = state.next_vlan_id;
    loop {
        let in_use = state.vrfs.values().any(|v| template_vlan(v) == Some(candidate))
            || state.attachments.values().any(|a| a.vlan_id == candidate)
            || state.resources.iter().any(|r| r.vlan_id == candidate);
        if !in_use {
            return candidate;
        }
        candidate += 1;
    }
}

fn create_vrf(state: &mut FabricState, verb: Verb, path: &str, payload: Option<&Value>) -> ControllerResponse {
    let Some(body) = payload.and_then(Value::as_object) else {
        return bad_request(verb, path, "Missing VRF payload");
    };
    let Some(name) = body.get("vrfName").and_then(Value::as_str) else {
        return bad_request(verb, path, "vrfName is required");
    };
    if state.vrfs.contains_key(name) {
        return bad_request(verb, path, &format!("VRF {name} already exists"));
    }
    let Some(vrf_id) = as_u64(body.get("vrfId")) else {
        return bad_request(verb, path, "vrfId is required");
    };

    let mut vrf = body.clone();
    vrf.insert("vrfStatus".to_string(), json!("NA"));
    let vrf = Value::Object(vrf);
    if let Some(vlan) = template_vlan(&vrf) {
        let id = state.next_resource_id;
        state.next_resource_id += 1;
        state.resources.push(super::MockResource {
            id,
            entity_name: name.to_string(),
            allocated: true,
            vlan_id: vlan,
        });
    }
    state.next_vrf_id = state.next_vrf_id.max(vrf_id + 1);
    state.vrfs.insert(name.to_string(), vrf.clone());
    ok(verb, path, vrf)
}

fn update_vrf(
    state: &mut FabricState,
    verb: Verb,
    path: &str,
    name: &str,
    payload: Option<&Value>,
) -> ControllerResponse {
    let Some(existing) = state.vrfs.get_mut(name).and_then(Value::as_object_mut) else {
        return not_found(verb, path);
    };
    let Some(body) = payload.and_then(Value::as_object) else {
        return bad_request(verb, path, "Missing VRF payload");
    };
    for (key, value) in body {
        existing.insert(key.clone(), value.clone());
    }
    ok(verb, path, Value::Object(existing.clone()))
}

fn delete_vrf(state: &mut FabricState, verb: Verb, path: &str, name: &str) -> ControllerResponse {
    if !state.vrfs.contains_key(name) {
        return not_found(verb, path);
    }
    let attached = state
        .attachments
        .iter()
        .any(|((vrf, _), a)| vrf == name && a.is_lan_attached);
    if attached {
        return bad_request(verb, path, &format!("VRF {name} has active attachments"));
    }
    state.vrfs.remove(name);
    state.attachments.retain(|(vrf, _), _| vrf != name);
    for resource in state.resources.iter_mut().filter(|r| r.entity_name == name) {
        resource.allocated = false;
    }
    ok(verb, path, Value::Null)
}

fn attachments(state: &FabricState, fabric: &str, names: &[String]) -> Value {
    let entries = names
        .iter()
        .filter_map(|name| state.vrfs.get(name).map(|vrf| (name, vrf)))
        .map(|(name, vrf)| {
            let lan_attach_list: Vec<Value> = state
                .attachments
                .iter()
                .filter(|((vrf_name, _), _)| vrf_name == name)
                .map(|((vrf_name, serial), a)| {
                    let switch = state.switches.get(serial);
                    json!({
                        "vrfName": vrf_name,
                        "fabricName": fabric,
                        "switchSerialNo": serial,
                        "switchName": switch.map(|s| s.name.clone()),
                        "switchRole": switch.map(|s| s.role.clone()),
                        "ipAddress": switch.map(|s| s.ip_address.clone()),
                        "vlanId": a.vlan_id,
                        "lanAttachState": a.lan_attach_state,
                        "isLanAttached": a.is_lan_attached,
                        "vrfId": vrf.get("vrfId").cloned().unwrap_or(Value::Null),
                        "instanceValues": a.instance_values,
                    })
                })
                .collect();
            json!({"vrfName": name, "lanAttachList": lan_attach_list})
        })
        .collect();
    Value::Array(entries)
}

fn attach(state: &mut FabricState, verb: Verb, path: &str, payload: Option<&Value>) -> ControllerResponse {
    let Some(groups) = payload.and_then(Value::as_array) else {
        return bad_request(verb, path, "Attachment payload must be a list");
    };
    let mut outcome = Map::new();
    for group in groups {
        let items = group.get("lanAttachList").and_then(Value::as_array).cloned().unwrap_or_default();
        for item in items {
            let vrf_name = item.get("vrfName").and_then(Value::as_str).unwrap_or_default().to_string();
            let serial = item.get("serialNumber").and_then(Value::as_str).unwrap_or_default().to_string();
            let key = format!("{vrf_name}-[{serial}]");
            let Some(vrf) = state.vrfs.get(&vrf_name) else {
                return bad_request(verb, path, &format!("VRF {vrf_name} not found"));
            };
            let deployment = item.get("deployment").and_then(Value::as_bool).unwrap_or(false);

            if !deployment {
                if let Some(existing) = state.attachments.get_mut(&(vrf_name.clone(), serial.clone())) {
                    existing.is_lan_attached = false;
                    existing.lan_attach_state = "PENDING".to_string();
                }
                outcome.insert(key, json!("SUCCESS"));
                continue;
            }

            let vlan = match as_u64(item.get("vlan")) {
                Some(0) | None => template_vlan(vrf).unwrap_or(0),
                Some(v) => v,
            };
            let conflict = state.attachments.iter().any(|((other_vrf, other_serial), a)| {
                other_vrf != &vrf_name && other_serial == &serial && a.vlan_id == vlan && a.is_lan_attached
            });
            if conflict {
                outcome.insert(key, json!(format!("VLAN {vlan} is in use already on switch {serial}")));
                continue;
            }

            state.attachments.insert(
                (vrf_name.clone(), serial.clone()),
                MockAttachment {
                    vlan_id: vlan,
                    is_lan_attached: true,
                    lan_attach_state: "PENDING".to_string(),
                    instance_values: item
                        .get("instanceValues")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| Some(helpers::default_instance_values().to_string())),
                    extension_values: item
                        .get("extensionValues")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    freeform_config: item
                        .get("freeformConfig")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                },
            );
            outcome.insert(key, json!("SUCCESS"));
        }
    }
    ok(verb, path, Value::Object(outcome))
}

fn deploy(state: &mut FabricState, verb: Verb, path: &str, payload: Option<&Value>) -> ControllerResponse {
    let names: Vec<String> = payload
        .and_then(|p| p.get("vrfNames"))
        .and_then(Value::as_str)
        .map(|s| s.split(',').filter(|n| !n.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let mut changed = false;
    for name in &names {
        let pending: Vec<(String, String)> = state
            .attachments
            .iter()
            .filter(|((vrf, _), a)| vrf == name && a.lan_attach_state == "PENDING")
            .map(|(k, _)| k.clone())
            .collect();
        for key in pending {
            changed = true;
            let attached = state.attachments.get(&key).is_some_and(|a| a.is_lan_attached);
            if attached {
                if let Some(a) = state.attachments.get_mut(&key) {
                    a.lan_attach_state = "DEPLOYED".to_string();
                }
            } else {
                state.attachments.remove(&key);
            }
        }
        if let Some(vrf) = state.vrfs.get_mut(name).and_then(Value::as_object_mut) {
            vrf.insert("vrfStatus".to_string(), json!("DEPLOYED"));
        }
    }

    if changed {
        ok(verb, path, json!({"status": "Deployment of VRF(s) has been initiated successfully"}))
    } else {
        ok(verb, path, json!("No switches PENDING for deployment"))
    }
}

fn switch_details(state: &FabricState, names: &[String], serials: &[String]) -> Value {
    let entries = names
        .iter()
        .map(|name| {
            let details: Vec<Value> = serials
                .iter()
                .map(|serial| {
                    let attachment = state.attachments.get(&(name.clone(), serial.clone()));
                    let prototypes: Vec<Value> = state
                        .lite_prototypes
                        .get(serial)
                        .map(|list| {
                            list.iter()
                                .map(|p| {
                                    json!({
                                        "interfaceName": p.interface_name,
                                        "extensionType": "VRF_LITE",
                                        "extensionValues": serde_json::to_string(&p.values).unwrap_or_default(),
                                        "destInterfaceName": "",
                                        "destSwitchName": "",
                                    })
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    json!({
                        "serialNumber": serial,
                        "switchName": state.switches.get(serial).map(|s| s.name.clone()),
                        "extensionValues": attachment.map(|a| a.extension_values.clone()).unwrap_or_default(),
                        "extensionPrototypeValues": prototypes,
                        "freeformConfig": attachment.map(|a| a.freeform_config.clone()).unwrap_or_default(),
                        "islanAttached": attachment.is_some_and(|a| a.is_lan_attached),
                        "lanAttachedState": attachment.map_or("NA".to_string(), |a| a.lan_attach_state.clone()),
                        "vlan": attachment.map(|a| a.vlan_id),
                    })
                })
                .collect();
            json!({"vrfName": name, "switchDetailsList": details})
        })
        .collect();
    Value::Array(entries)
}
