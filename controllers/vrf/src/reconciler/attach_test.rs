//! Unit tests for per-switch attachment diffing

#[cfg(test)]
mod tests {
    use crate::reconciler::attach::diff_for_attach_deploy;
    use crate::reconciler::model::{AttachmentRecord, ExtensionValues, VrfLiteConn};
    use crate::reconciler::want::vrf_lite_extension;
    use crate::test_utils::*;
    use vrf_playbook::VrfLiteConfig;

    fn lite_want(peer_vrf: &str) -> AttachmentRecord {
        let intents = vec![VrfLiteConfig {
            peer_vrf: Some(peer_vrf.to_string()),
            interface: Some("Ethernet1/10".to_string()),
            ..Default::default()
        }];
        AttachmentRecord {
            extension_values: Some(vrf_lite_extension(&intents)),
            vrf_lite: intents,
            ..create_test_attachment("v1", "S3", 2001)
        }
    }

    fn lite_have(conns: &[(&str, &str)]) -> AttachmentRecord {
        let conns = conns
            .iter()
            .map(|(interface, peer)| {
                let mut conn = VrfLiteConn::new();
                conn.insert("IF_NAME".to_string(), (*interface).to_string());
                conn.insert("PEER_VRF_NAME".to_string(), (*peer).to_string());
                conn.insert("DOT1Q_ID".to_string(), "2".to_string());
                conn.insert("IP_MASK".to_string(), "10.33.0.1/30".to_string());
                conn.insert("NEIGHBOR_IP".to_string(), "10.33.0.2".to_string());
                conn.insert("NEIGHBOR_ASN".to_string(), "65001".to_string());
                conn
            })
            .collect();
        AttachmentRecord {
            extension_values: Some(ExtensionValues {
                vrf_lite_conn: conns,
                multisite_conn: Vec::new(),
            }),
            ..create_test_attachment("v1", "S3", 2001)
        }
    }

    #[test]
    fn test_identical_attachments_need_nothing() {
        let list = vec![create_test_attachment("v1", "S1", 2001)];
        let (attach, deploy) = diff_for_attach_deploy(&list, &list, false);
        assert!(attach.is_empty());
        assert!(!deploy);
    }

    #[test]
    fn test_new_switch_is_attached_and_deployed() {
        let want = vec![
            create_test_attachment("v1", "S1", 2001),
            create_test_attachment("v1", "S2", 2001),
        ];
        let have = vec![create_test_attachment("v1", "S1", 2001)];

        let (attach, deploy) = diff_for_attach_deploy(&want, &have, false);

        assert_eq!(attach.len(), 1);
        assert_eq!(attach[0].serial_number, "S2");
        assert!(attach[0].deployment);
        assert!(deploy);
    }

    #[test]
    fn test_new_switch_without_deploy_is_only_attached() {
        let mut new_switch = create_test_attachment("v1", "S2", 2001);
        new_switch.is_deploy = false;
        new_switch.deployment = false;

        let (attach, deploy) = diff_for_attach_deploy(&[new_switch], &[], false);

        assert_eq!(attach.len(), 1);
        assert!(attach[0].deployment);
        assert!(!deploy);
    }

    #[test]
    fn test_pending_attachment_only_needs_deploy() {
        let want = vec![create_test_attachment("v1", "S1", 2001)];
        let mut pending = create_test_attachment("v1", "S1", 2001);
        pending.is_deploy = false;

        let (attach, deploy) = diff_for_attach_deploy(&want, &[pending], false);

        assert!(attach.is_empty());
        assert!(deploy);
    }

    #[test]
    fn test_instance_value_change_resends_with_controller_loopbacks() {
        let mut want = create_test_attachment("v1", "S1", 2001);
        if let Some(values) = want.instance_values.as_mut() {
            values.insert("switchRouteTargetImportEvpn".to_string(), "65000:100".to_string());
        }
        let mut have = create_test_attachment("v1", "S1", 2001);
        have.freeform_config = "interface loopback100".to_string();
        if let Some(values) = have.instance_values.as_mut() {
            values.insert("loopbackId".to_string(), "100".to_string());
        }

        let (attach, deploy) = diff_for_attach_deploy(&[want], &[have], false);

        assert_eq!(attach.len(), 1);
        let values = attach[0].instance_values.as_ref().unwrap();
        assert_eq!(values["loopbackId"], "100");
        assert_eq!(values["switchRouteTargetImportEvpn"], "65000:100");
        assert_eq!(attach[0].freeform_config, "interface loopback100");
        assert!(deploy);
    }

    #[test]
    fn test_vrf_lite_with_unset_properties_matches_controller_values() {
        let (attach, deploy) = diff_for_attach_deploy(
            &[lite_want("ext1")],
            &[lite_have(&[("Ethernet1/10", "ext1")])],
            false,
        );
        assert!(attach.is_empty());
        assert!(!deploy);
    }

    #[test]
    fn test_vrf_lite_peer_change_resends() {
        let (attach, deploy) = diff_for_attach_deploy(
            &[lite_want("ext2")],
            &[lite_have(&[("Ethernet1/10", "ext1")])],
            false,
        );
        assert_eq!(attach.len(), 1);
        assert!(deploy);
    }

    #[test]
    fn test_vrf_lite_count_mismatch_resends_only_on_replace() {
        let have = [lite_have(&[("Ethernet1/10", "ext1"), ("Ethernet1/11", "ext1")])];

        let (attach, _) = diff_for_attach_deploy(&[lite_want("ext1")], &have, false);
        assert!(attach.is_empty());

        let (attach, _) = diff_for_attach_deploy(&[lite_want("ext1")], &have, true);
        assert_eq!(attach.len(), 1);
    }

    #[test]
    fn test_controller_only_vrf_lite_is_kept_on_merge() {
        let want = [create_test_attachment("v1", "S3", 2001)];
        let have = [lite_have(&[("Ethernet1/10", "ext1")])];

        let (attach, _) = diff_for_attach_deploy(&want, &have, false);
        assert!(attach.is_empty());

        let (attach, _) = diff_for_attach_deploy(&want, &have, true);
        assert_eq!(attach.len(), 1);
        assert!(attach[0].extension_values.is_none());
    }

    #[test]
    fn test_playbook_vrf_lite_missing_on_controller_resends() {
        let have = [create_test_attachment("v1", "S3", 2001)];
        let (attach, _) = diff_for_attach_deploy(&[lite_want("ext1")], &have, false);
        assert_eq!(attach.len(), 1);
        assert!(attach[0].has_vrf_lite());
    }
}
