//! End-to-end tests for reconciler runs against the mock controller

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconciler::model::{ExtensionValues, as_u64};
    use crate::reconciler::{HIDDEN_STACK_TRACE, ROLLBACK_FAILED, ROLLBACK_SUCCEEDED, ReconcilerSettings};
    use crate::reconciler::inventory::Inventory;
    use crate::test_utils::*;
    use ndfc_client::{ControllerResponse, MockNdfcClient, Verb};
    use serde_json::{Value, json};
    use vrf_playbook::Playbook;

    const MERGED_V1: &str = r#"
fabric: fabric1
state: merged
config:
  - vrf_name: v1
    vrf_id: 9000
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.1
"#;

    fn playbook(yaml: &str) -> Playbook {
        Playbook::from_yaml_str(yaml).unwrap()
    }

    fn writes(client: &MockNdfcClient) -> usize {
        client.requests().iter().filter(|r| r.verb != Verb::Get).count()
    }

    fn position(client: &MockNdfcClient, verb: Verb, fragment: &str) -> usize {
        client
            .requests()
            .iter()
            .position(|r| r.verb == verb && r.path.contains(fragment))
            .unwrap_or_else(|| panic!("no {verb} request for {fragment}"))
    }

    fn attachments_response(vrf_name: &str, serial: &str, state: &str, lan_attached: bool) -> ControllerResponse {
        ControllerResponse::ok(
            Verb::Get,
            "attachments",
            json!([{
                "vrfName": vrf_name,
                "lanAttachList": [{
                    "vrfName": vrf_name,
                    "switchSerialNo": serial,
                    "switchName": format!("switch-{serial}"),
                    "lanAttachState": state,
                    "isLanAttached": lan_attached,
                    "vlanId": 2002,
                }],
            }]),
        )
    }

    /// v1 and v2 without attachments, so the attachment read of the whole
    /// fabric (`vrf-names=v1,v2`) never matches a `vrf-names=v2` injection
    fn two_idle_vrfs() -> MockNdfcClient {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_vrf("v2", 9001, 2002);
        client
    }

    #[tokio::test]
    async fn test_merged_creates_attaches_and_deploys() {
        // Setup: empty fabric
        let client = mock_fabric();
        let reconciler = create_test_reconciler(&client);

        // Execute
        let result = reconciler.run(&playbook(MERGED_V1)).await.unwrap();

        // Assert: VRF created, attached and deployed, in that order
        assert!(result.changed);
        assert_eq!(client.vrf("v1").unwrap()["vrfId"], json!(9000));
        let attachment = client.attachment("v1", "S1").unwrap();
        assert_eq!(attachment.lan_attach_state, "DEPLOYED");
        assert!(attachment.is_lan_attached);
        assert_eq!(attachment.vlan_id, 2001);

        let create = client
            .requests()
            .iter()
            .position(|r| r.verb == Verb::Post && r.path.ends_with("/vrfs"))
            .unwrap();
        let attach = position(&client, Verb::Post, "/vrfs/attachments");
        assert!(create < attach);
        assert!(attach < position(&client, Verb::Post, "/vrfs/deployments"));
        assert_eq!(writes(&client), 3);
        assert_eq!(result.response.len(), 3);

        assert_eq!(result.diff.len(), 1);
        assert_eq!(result.diff[0]["vrf_name"], json!("v1"));
        assert_eq!(result.diff[0]["vrf_id"], json!(9000));
        assert_eq!(result.diff[0]["attach"][0]["ip_address"], json!("10.0.0.1"));
        assert_eq!(result.diff[0]["attach"][0]["deploy"], json!(true));
    }

    #[tokio::test]
    async fn test_merged_is_idempotent() {
        let client = mock_fabric();
        create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap();
        client.clear_requests();

        let result = create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap();

        assert!(!result.changed);
        assert!(result.diff.is_empty());
        assert!(result.response.is_empty());
        assert_eq!(writes(&client), 0);
    }

    #[tokio::test]
    async fn test_merged_against_seeded_vrf_is_unchanged() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);

        let result = create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap();

        assert!(!result.changed);
        assert_eq!(writes(&client), 0);
    }

    #[tokio::test]
    async fn test_quick_create_allocates_segment_id_and_vlan() {
        let client = mock_fabric();
        let yaml = "fabric: fabric1\nconfig:\n  - vrf_name: v1\n";

        let result = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap();

        assert!(result.changed);
        let vrf = client.vrf("v1").unwrap();
        assert_eq!(vrf["vrfId"], json!(50000));
        let config: Value = serde_json::from_str(vrf["vrfTemplateConfig"].as_str().unwrap()).unwrap();
        assert_eq!(as_u64(config.get("vrfVlanId")), Some(2000));
        assert_eq!(as_u64(config.get("vrfSegmentId")), Some(50000));
        assert_eq!(client.requests_matching(Verb::Get, "/vrfinfo").len(), 1);

        assert_eq!(result.diff[0]["vrf_id"], json!(50000));
        assert_eq!(result.diff[0]["vlan_id"], json!(0));
    }

    #[tokio::test]
    async fn test_quick_create_gives_each_vrf_its_own_id() {
        let client = mock_fabric();
        let yaml = "fabric: fabric1\nconfig:\n  - vrf_name: v1\n  - vrf_name: v2\n";

        create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap();

        assert_eq!(client.vrf("v1").unwrap()["vrfId"], json!(50000));
        assert_eq!(client.vrf("v2").unwrap()["vrfId"], json!(50001));
    }

    #[tokio::test]
    async fn test_template_change_is_updated_in_place() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v1
    vrf_id: 9000
    vrf_description: core services
    attach:
      - ip_address: 10.0.0.1
"#;

        let result = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap();

        assert!(result.changed);
        let puts = client.requests_matching(Verb::Put, "/vrfs/v1");
        assert_eq!(puts.len(), 1);
        let config: Value = serde_json::from_str(client.vrf("v1").unwrap()["vrfTemplateConfig"].as_str().unwrap()).unwrap();
        assert_eq!(config["vrfDescription"], json!("core services"));
        assert_eq!(as_u64(config.get("vrfVlanId")), Some(2001));
        assert_eq!(client.requests_matching(Verb::Post, "/vrfs/deployments").len(), 1);
    }

    #[tokio::test]
    async fn test_changing_vrf_id_is_rejected() {
        let client = mock_fabric();
        client.add_vrf("v1", 9001, 2001);

        let err = create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap_err();

        assert!(matches!(err, ControllerError::VrfIdImmutable { have: 9001, want: 9000, .. }));
        assert_eq!(writes(&client), 0);
    }

    #[tokio::test]
    async fn test_replaced_detaches_unlisted_switch() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        client.add_deployed_attachment("v1", "S2", 2001);
        let yaml = MERGED_V1.replace("state: merged", "state: replaced");

        let result = create_test_reconciler(&client).run(&playbook(&yaml)).await.unwrap();

        assert!(result.changed);
        assert!(client.attachment("v1", "S2").is_none());
        assert_eq!(client.attachment("v1", "S1").unwrap().lan_attach_state, "DEPLOYED");
        assert_eq!(result.diff[0]["attach"][0]["ip_address"], json!("10.0.0.2"));
        assert_eq!(result.diff[0]["attach"][0]["deploy"], json!(false));
    }

    #[tokio::test]
    async fn test_overridden_removes_unlisted_vrf_in_order() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        client.add_vrf("v2", 9001, 2002);
        client.add_deployed_attachment("v2", "S2", 2002);
        client.add_resource("v2", true, 2002);
        let yaml = MERGED_V1.replace("state: merged", "state: overridden");

        let result = create_test_reconciler(&client).run(&playbook(&yaml)).await.unwrap();

        assert!(result.changed);
        assert_eq!(client.vrf_names(), vec!["v1".to_string()]);
        assert!(client.resources().iter().all(|r| r.entity_name != "v2"));

        let detach = position(&client, Verb::Post, "/vrfs/attachments");
        let undeploy = position(&client, Verb::Post, "/vrfs/deployments");
        let delete = position(&client, Verb::Delete, "/vrfs/v2");
        let release = position(&client, Verb::Delete, "/resource-manager/resources");
        assert!(detach < undeploy);
        assert!(undeploy < delete);
        assert!(delete < release);

        assert!(result.diff.iter().any(|d| d["vrf_name"] == json!("v2")));
    }

    #[tokio::test]
    async fn test_deleted_without_config_removes_every_vrf() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        client.add_vrf("v2", 9001, 2002);

        let result = create_test_reconciler(&client)
            .run(&playbook("fabric: fabric1\nstate: deleted\n"))
            .await
            .unwrap();

        assert!(result.changed);
        assert!(client.vrf_names().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_listed_vrf_only() {
        let client = two_idle_vrfs();

        create_test_reconciler(&client)
            .run(&playbook("fabric: fabric1\nstate: deleted\nconfig:\n  - vrf_name: v2\n"))
            .await
            .unwrap();

        assert_eq!(client.vrf_names(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_out_of_sync_vrf_is_not_deleted() {
        let client = two_idle_vrfs();
        client.inject(Verb::Get, "vrf-names=v2", attachments_response("v2", "S2", "OUT-OF-SYNC", false));

        let err = create_test_reconciler(&client)
            .run(&playbook("fabric: fabric1\nstate: deleted\n"))
            .await
            .unwrap_err();

        assert!(matches!(&err, ControllerError::DeleteFailed(names) if names == &vec!["v2".to_string()]));
        assert_eq!(client.vrf_names(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_deployed_network_blocks_delete() {
        let client = two_idle_vrfs();
        client.inject(Verb::Get, "vrf-names=v2", attachments_response("v2", "S2", "DEPLOYED", true));

        let err = create_test_reconciler(&client)
            .run(&playbook("fabric: fabric1\nstate: deleted\nconfig:\n  - vrf_name: v2\n"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControllerError::NetworkAttachmentsPresent { ref vrf, ref switch } if vrf == "v2" && switch == "switch-S2"
        ));
        assert!(client.requests_matching(Verb::Delete, "/vrfs/v2").is_empty());
    }

    #[tokio::test]
    async fn test_delete_wait_is_bounded() {
        let client = two_idle_vrfs();
        for _ in 0..10 {
            client.inject(Verb::Get, "vrf-names=v2", attachments_response("v2", "S2", "PENDING", false));
        }

        let err = create_test_reconciler(&client)
            .run(&playbook("fabric: fabric1\nstate: deleted\nconfig:\n  - vrf_name: v2\n"))
            .await
            .unwrap_err();

        assert!(matches!(err, ControllerError::DeleteWaitTimeout { seconds: 5, .. }));
        assert_eq!(client.requests_matching(Verb::Get, "vrf-names=v2").len(), 5);
    }

    #[tokio::test]
    async fn test_vlan_in_use_rolls_back() {
        // Setup: v1 holds VLAN 2001 on S1, v2 asks for the same VLAN there
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v2
    vrf_id: 9001
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.1
"#;

        // Execute
        let err = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap_err();

        // Assert: v2 was created then rolled back, v1 untouched
        let ControllerError::PushFailed { response, rollback } = err else {
            panic!("expected a push failure, got {err:?}");
        };
        assert_eq!(rollback.as_deref(), Some(ROLLBACK_SUCCEEDED));
        assert_eq!(response["ROLLBACK_RESULT"], json!(ROLLBACK_SUCCEEDED));
        assert!(response.to_string().contains("is in use already"));
        assert_eq!(client.vrf_names(), vec!["v1".to_string()]);
        assert!(client.resources().iter().all(|r| r.entity_name != "v2"));
        assert_eq!(client.attachment("v1", "S1").unwrap().lan_attach_state, "DEPLOYED");
        assert!(client.requests_matching(Verb::Post, "/vrfs/deployments").is_empty());
    }

    #[tokio::test]
    async fn test_failed_rollback_is_reported() {
        let client = mock_fabric();
        client.fail_next(Verb::Post, "/vrfs/attachments");
        client.fail_next(Verb::Delete, "/vrfs/v1");

        let err = create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap_err();

        let ControllerError::PushFailed { response, rollback } = err else {
            panic!("expected a push failure, got {err:?}");
        };
        assert_eq!(rollback.as_deref(), Some(ROLLBACK_FAILED));
        assert_eq!(response["ROLLBACK_RESULT"], json!(ROLLBACK_FAILED));
        assert_eq!(client.vrf_names(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_hides_stack_trace() {
        let client = mock_fabric();
        client.inject(
            Verb::Post,
            "/vrfs/attachments",
            ControllerResponse::error(
                Verb::Post,
                "/vrfs/attachments",
                500,
                "Internal Server Error",
                "NullPointerException",
                json!({"stackTrace": "at com.cisco.dcbu.vrf.attach(Unknown Source)"}),
            ),
        );

        let err = create_test_reconciler(&client).run(&playbook(MERGED_V1)).await.unwrap_err();

        let ControllerError::PushFailed { response, .. } = err else {
            panic!("expected a push failure, got {err:?}");
        };
        assert_eq!(response["DATA"]["stackTrace"], json!(HIDDEN_STACK_TRACE));
        assert!(client.vrf_names().is_empty());
    }

    #[tokio::test]
    async fn test_multisite_fabric_is_not_rolled_back() {
        let client = mock_fabric();
        client.set_fabric_type("MFD");
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v2
    vrf_id: 9001
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.1
"#;
        let reconciler =
            create_test_reconciler_with(&client, Inventory::from_switches(test_switches(), "MFD"), test_settings());

        let err = reconciler.run(&playbook(yaml)).await.unwrap_err();

        assert!(matches!(err, ControllerError::PushFailed { rollback: None, .. }));
        assert!(client.vrf("v2").is_some());
        assert!(client.requests_matching(Verb::Delete, "/vrfs/v2").is_empty());
    }

    #[tokio::test]
    async fn test_check_mode_sends_no_writes() {
        let client = mock_fabric();
        let settings = ReconcilerSettings {
            check_mode: true,
            ..test_settings()
        };
        let reconciler = create_test_reconciler_with(&client, test_inventory(), settings);
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v1
    vrf_id: 9000
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.1
  - vrf_name: v2
  - vrf_name: v3
    vrf_id: 9002
"#;

        let result = reconciler.run(&playbook(yaml)).await.unwrap();

        assert!(result.changed);
        assert_eq!(writes(&client), 0);
        assert!(client.vrf_names().is_empty());
        assert_eq!(result.diff.len(), 3);
        let v2 = result.diff.iter().find(|d| d["vrf_name"] == json!("v2")).unwrap();
        assert_eq!(v2["vrf_id"], json!(50000));
        let v3 = result.diff.iter().find(|d| d["vrf_name"] == json!("v3")).unwrap();
        assert_eq!(v3["vrf_id"], json!(9002));
        assert_eq!(v3["vlan_id"], json!(0));
        assert!(client.requests_matching(Verb::Get, "/resource-manager/vlan").is_empty());
        assert!(result.response.iter().all(|r| r["CHECK_MODE"] == json!(true)));
    }

    #[tokio::test]
    async fn test_check_mode_delete_skips_wait() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        let settings = ReconcilerSettings {
            check_mode: true,
            ..test_settings()
        };
        let reconciler = create_test_reconciler_with(&client, test_inventory(), settings);

        let result = reconciler
            .run(&playbook("fabric: fabric1\nstate: deleted\n"))
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(writes(&client), 0);
        assert_eq!(client.vrf_names(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_query_reports_listed_vrfs() {
        let client = mock_fabric();
        client.add_vrf("v1", 9000, 2001);
        client.add_deployed_attachment("v1", "S1", 2001);
        client.add_vrf("v2", 9001, 2002);
        let reconciler = create_test_reconciler(&client);

        let result = reconciler
            .run(&playbook("fabric: fabric1\nstate: query\nconfig:\n  - vrf_name: v1\n"))
            .await
            .unwrap();

        assert!(!result.changed);
        assert_eq!(result.query.len(), 1);
        assert_eq!(result.query[0]["parent"]["vrfName"], json!("v1"));
        assert_eq!(
            result.query[0]["attach"][0]["switchDetailsList"][0]["serialNumber"],
            json!("S1")
        );

        let result = reconciler
            .run(&playbook("fabric: fabric1\nstate: query\n"))
            .await
            .unwrap();
        assert_eq!(result.query.len(), 2);
        assert_eq!(writes(&client), 0);
    }

    #[tokio::test]
    async fn test_vrf_lite_is_completed_from_prototype() {
        let client = mock_fabric();
        client.add_lite_prototype(
            "S3",
            "Ethernet1/10",
            &[
                ("IF_NAME", "Ethernet1/10"),
                ("DOT1Q_ID", "2"),
                ("IP_MASK", "10.33.0.1/30"),
                ("NEIGHBOR_IP", "10.33.0.2"),
                ("NEIGHBOR_ASN", "65001"),
                ("PEER_VRF_NAME", ""),
            ],
        );
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v1
    vrf_id: 9000
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.3
        vrf_lite:
          - peer_vrf: ext1
            interface: Ethernet1/10
            dot1q: 3
"#;

        let result = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap();
        assert!(result.changed);

        let attachment = client.attachment("v1", "S3").unwrap();
        let extension = ExtensionValues::parse(&attachment.extension_values).unwrap();
        let conn = &extension.vrf_lite_conn[0];
        assert_eq!(conn["IF_NAME"], "Ethernet1/10");
        assert_eq!(conn["DOT1Q_ID"], "3");
        assert_eq!(conn["IP_MASK"], "10.33.0.1/30");
        assert_eq!(conn["NEIGHBOR_ASN"], "65001");
        assert_eq!(conn["PEER_VRF_NAME"], "ext1");
        assert_eq!(conn["AUTO_VRF_LITE_FLAG"], "false");

        // A second run sees the completed values as matching
        client.clear_requests();
        let result = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap();
        assert!(!result.changed);
        assert_eq!(writes(&client), 0);
    }

    #[tokio::test]
    async fn test_vrf_lite_without_capable_interface_fails() {
        let client = mock_fabric();
        let yaml = r#"
fabric: fabric1
config:
  - vrf_name: v1
    vrf_id: 9000
    vlan_id: 2001
    attach:
      - ip_address: 10.0.0.3
        vrf_lite:
          - interface: Ethernet1/10
"#;

        let err = create_test_reconciler(&client).run(&playbook(yaml)).await.unwrap_err();

        assert!(matches!(err, ControllerError::VrfLiteNotAllowed(_)));
        assert!(client.requests_matching(Verb::Post, "/vrfs/attachments").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_fabric_is_invalid_config() {
        let client = mock_fabric();
        let reconciler = create_test_reconciler(&client);

        let err = reconciler
            .run(&playbook(&MERGED_V1.replace("fabric1", "fabric9")))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));

        let missing = MockNdfcClient::new("http://ndfc.test").with_fabric("fabric9");
        let err = create_test_reconciler(&missing)
            .run(&playbook(MERGED_V1))
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(msg) if msg.contains("not present")));
    }
}
