// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `settings.rs`

#[cfg(test)]
mod tests {
    use super::super::{LogFormat, Settings};
    use crate::errors::ConfigError;
    use crate::records::RecordKind;
    use clap::Parser;
    use std::time::Duration;

    fn parse(extra: &[&str]) -> Settings {
        let mut args = vec!["nextdns-webhook", "--api-key", "key", "--profile-id", "abc123"];
        args.extend_from_slice(extra);
        Settings::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&[]).validate().unwrap();

        assert_eq!(settings.base_url, "https://api.nextdns.io");
        assert_eq!(settings.server_port, 8888);
        assert_eq!(settings.health_port, 8080);
        assert_eq!(settings.server_address(), "127.0.0.1:8888");
        assert_eq!(settings.health_address(), "0.0.0.0:8080");
        assert_eq!(
            settings.supported_kinds(),
            vec![RecordKind::A, RecordKind::Aaaa, RecordKind::Cname]
        );
        assert!(settings.domain_filter.is_empty());
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.log_format(), LogFormat::Text);
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        let settings = Settings::try_parse_from(["nextdns-webhook", "--profile-id", "abc"])
            .unwrap();
        assert_eq!(settings.validate().unwrap_err(), ConfigError::MissingApiKey);

        let settings =
            Settings::try_parse_from(["nextdns-webhook", "--api-key", "k", "--profile-id", "  "])
                .unwrap();
        assert_eq!(
            settings.validate().unwrap_err(),
            ConfigError::MissingProfileId
        );
    }

    #[test]
    fn test_lists_are_trimmed_and_empty_entries_dropped() {
        let settings = parse(&[
            "--supported-records",
            " a, cname ,,",
            "--domain-filter",
            "example.com, ,internal.lan ",
        ])
        .validate()
        .unwrap();

        assert_eq!(settings.supported_records, vec!["A", "CNAME"]);
        assert_eq!(settings.domain_filter, vec!["example.com", "internal.lan"]);
    }

    #[test]
    fn test_empty_supported_records_rejected() {
        let err = parse(&["--supported-records", " , "]).validate().unwrap_err();
        assert_eq!(err, ConfigError::NoSupportedRecords);
    }

    #[test]
    fn test_base_url_normalized() {
        let settings = parse(&["--base-url", "api.nextdns.io/"]).validate().unwrap();
        assert_eq!(settings.base_url, "https://api.nextdns.io");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = parse(&["--base-url", "http://exa mple.com"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_log_format() {
        let settings = parse(&["--log-format", "JSON"]).validate().unwrap();
        assert_eq!(settings.log_format(), LogFormat::Json);

        let err = parse(&["--log-format", "xml"]).validate().unwrap_err();
        assert_eq!(err, ConfigError::InvalidLogFormat("xml".to_string()));
    }

    #[test]
    fn test_dry_run_flag() {
        assert!(parse(&["--dry-run"]).dry_run);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let settings = Settings::try_parse_from([
            "nextdns-webhook",
            "--api-key",
            "super-secret",
            "--profile-id",
            "abc123",
        ])
        .unwrap();

        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
