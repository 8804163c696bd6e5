// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `webhook/types.rs`

#[cfg(test)]
mod tests {
    use super::super::{Changes, DomainFilter, Endpoint, ProviderSpecificProperty};
    use crate::constants::OVERWRITE_ANNOTATION_KEY;
    use crate::errors::SyncError;
    use crate::records::{ChangeSet, DesiredRecord, RecordKind};
    use serde_json::json;

    #[test]
    fn test_changes_accept_null_lists() {
        let changes: Changes = serde_json::from_value(json!({
            "Create": [{"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"}],
            "UpdateOld": null,
            "UpdateNew": null,
            "Delete": null
        }))
        .unwrap();

        assert_eq!(changes.create.len(), 1);
        assert!(changes.update_old.is_empty());
        assert!(changes.delete.is_empty());
    }

    #[test]
    fn test_changes_accept_missing_lists() {
        let changes: Changes = serde_json::from_value(json!({})).unwrap();
        assert_eq!(changes, Changes::default());
    }

    #[test]
    fn test_endpoint_decodes_external_dns_shape() {
        let endpoint: Endpoint = serde_json::from_value(json!({
            "dnsName": "app.example.com",
            "targets": ["10.0.0.1"],
            "recordType": "A",
            "setIdentifier": "",
            "recordTTL": 300,
            "labels": null,
            "providerSpecific": [
                {"name": format!("webhook/{OVERWRITE_ANNOTATION_KEY}"), "value": "true"}
            ]
        }))
        .unwrap();

        assert_eq!(endpoint.record_ttl, Some(300));
        assert!(endpoint.labels.is_empty());

        let record = DesiredRecord::from(endpoint);
        assert_eq!(record.kind, RecordKind::A);
        assert_eq!(record.ttl, Some(300));
        assert_eq!(record.set_identifier, None, "empty set identifier is dropped");
        assert_eq!(
            record.overwrite_marker(),
            Some("true"),
            "prefixed provider-specific property should be read as the overwrite marker"
        );
    }

    #[test]
    fn test_endpoint_serializes_camel_case_and_skips_empty() {
        let endpoint = Endpoint::from(DesiredRecord::new(
            "app.example.com",
            RecordKind::Aaaa,
            ["fd00::1"],
        ));

        let value = serde_json::to_value(&endpoint).unwrap();
        assert_eq!(
            value,
            json!({
                "dnsName": "app.example.com",
                "targets": ["fd00::1"],
                "recordType": "AAAA"
            })
        );
    }

    #[test]
    fn test_endpoint_keeps_ttl_and_labels() {
        let mut record = DesiredRecord::new("app.example.com", RecordKind::A, ["10.0.0.1"])
            .with_marker(OVERWRITE_ANNOTATION_KEY, "true");
        record.ttl = Some(60);
        record.labels.insert("owner".to_string(), "default".to_string());

        let value = serde_json::to_value(Endpoint::from(record)).unwrap();

        assert_eq!(value["recordTTL"], json!(60));
        assert_eq!(value["labels"]["owner"], json!("default"));
        assert_eq!(
            value["providerSpecific"],
            json!([{"name": OVERWRITE_ANNOTATION_KEY, "value": "true"}])
        );
    }

    #[test]
    fn test_unknown_record_type_is_preserved() {
        let endpoint = Endpoint {
            dns_name: "txt.example.com".to_string(),
            targets: vec!["\"heritage=external-dns\"".to_string()],
            record_type: "txt".to_string(),
            ..Endpoint::default()
        };

        let record = DesiredRecord::from(endpoint);
        assert_eq!(record.kind, RecordKind::Other("TXT".to_string()));
        assert_eq!(Endpoint::from(record).record_type, "TXT");
    }

    #[test]
    fn test_changes_pair_update_halves() {
        let old = Endpoint {
            dns_name: "app.example.com".to_string(),
            targets: vec!["10.0.0.1".to_string()],
            record_type: "A".to_string(),
            ..Endpoint::default()
        };
        let new = Endpoint {
            targets: vec!["10.0.0.2".to_string()],
            provider_specific: vec![ProviderSpecificProperty {
                name: OVERWRITE_ANNOTATION_KEY.to_string(),
                value: "true".to_string(),
            }],
            ..old.clone()
        };
        let changes = Changes {
            update_old: vec![old],
            update_new: vec![new],
            ..Changes::default()
        };

        let change_set = ChangeSet::try_from(changes).unwrap();

        assert_eq!(change_set.to_update.len(), 1);
        let (old, new) = &change_set.to_update[0];
        assert_eq!(old.targets, vec!["10.0.0.1"]);
        assert_eq!(new.targets, vec!["10.0.0.2"]);
        assert_eq!(new.overwrite_marker(), Some("true"));
    }

    #[test]
    fn test_changes_with_mismatched_update_halves_are_rejected() {
        let changes = Changes {
            update_old: vec![Endpoint::default(), Endpoint::default()],
            update_new: vec![Endpoint::default()],
            ..Changes::default()
        };

        let err = ChangeSet::try_from(changes).unwrap_err();
        assert!(
            matches!(err, SyncError::Precondition(ref msg) if msg.contains("2") && msg.contains("1")),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn test_domain_filter_omits_empty_include() {
        assert_eq!(
            serde_json::to_string(&DomainFilter::default()).unwrap(),
            "{}"
        );
        assert_eq!(
            serde_json::to_string(&DomainFilter {
                include: vec!["example.com".to_string()]
            })
            .unwrap(),
            r#"{"include":["example.com"]}"#
        );
    }
}
