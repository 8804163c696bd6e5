// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `webhook/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::{api_router, health_router, serve};
    use crate::constants::{OVERWRITE_ANNOTATION_KEY, WEBHOOK_MEDIA_TYPE};
    use crate::errors::RewriteApiError;
    use crate::provider::Provider;
    use crate::rewrites::{InMemoryRewriteStore, RewriteClient, StoreCall};
    use crate::settings::Settings;
    use axum::Router;
    use clap::Parser;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    struct TestServer {
        address: SocketAddr,
        shutdown: CancellationToken,
        handle: JoinHandle<std::io::Result<()>>,
    }

    impl TestServer {
        async fn start(router: Router, shutdown: CancellationToken) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            let handle = tokio::spawn(serve(listener, router, shutdown.clone()));
            Self {
                address,
                shutdown,
                handle,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("http://{}{path}", self.address)
        }
    }

    async fn api_server(store: &Arc<InMemoryRewriteStore>, extra: &[&str]) -> TestServer {
        let mut args = vec!["nextdns-webhook", "--api-key", "key", "--profile-id", "abc123"];
        args.extend_from_slice(extra);
        let settings = Settings::try_parse_from(args).unwrap().validate().unwrap();
        let provider = Arc::new(Provider::new(&settings, RewriteClient::new(store.clone())));

        let shutdown = CancellationToken::new();
        TestServer::start(api_router(provider, shutdown.clone()), shutdown).await
    }

    #[tokio::test]
    async fn test_negotiate_returns_domain_filter() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &["--domain-filter", "example.com,example.org"]).await;

        let response = reqwest::get(server.url("/")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], WEBHOOK_MEDIA_TYPE);
        assert_eq!(response.headers()["vary"], "Content-Type");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"include": ["example.com", "example.org"]}));
    }

    #[tokio::test]
    async fn test_negotiate_without_filter_returns_empty_object() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &[]).await;

        let body = reqwest::get(server.url("/")).await.unwrap().text().await.unwrap();

        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_get_records_returns_one_endpoint_per_row() {
        let store = Arc::new(InMemoryRewriteStore::with_records([
            ("app.example.com", "10.0.0.1"),
            ("alias.example.com", "app.example.com"),
        ]));
        let server = api_server(&store, &[]).await;

        let response = reqwest::get(server.url("/records")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], WEBHOOK_MEDIA_TYPE);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!([
                {"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"},
                {"dnsName": "alias.example.com", "targets": ["app.example.com"], "recordType": "CNAME"}
            ])
        );
    }

    #[tokio::test]
    async fn test_get_records_remote_failure_is_500() {
        let store = Arc::new(InMemoryRewriteStore::new());
        store.push_failure(
            StoreCall::List,
            RewriteApiError::Status {
                status: 401,
                message: "unauthorized".to_string(),
            },
        );
        let server = api_server(&store, &[]).await;

        let response = reqwest::get(server.url("/records")).await.unwrap();

        assert_eq!(response.status(), 500);
        assert!(response.text().await.unwrap().contains("unauthorized"));
    }

    #[tokio::test]
    async fn test_post_records_applies_changes() {
        let store = Arc::new(InMemoryRewriteStore::with_records([(
            "old.example.com",
            "10.0.0.9",
        )]));
        let server = api_server(&store, &[]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .header("content-type", WEBHOOK_MEDIA_TYPE)
            .json(&json!({
                "Create": [{"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"}],
                "UpdateOld": null,
                "UpdateNew": null,
                "Delete": [{"dnsName": "old.example.com", "targets": ["10.0.0.9"], "recordType": "A"}]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
        let rows = store.records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "app.example.com");
    }

    #[tokio::test]
    async fn test_post_records_honours_overwrite_marker() {
        let store = Arc::new(InMemoryRewriteStore::with_records([(
            "app.example.com",
            "10.0.0.1",
        )]));
        let server = api_server(&store, &[]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .json(&json!({
                "Create": [{
                    "dnsName": "app.example.com",
                    "targets": ["10.0.0.2"],
                    "recordType": "A",
                    "providerSpecific": [
                        {"name": format!("webhook/{OVERWRITE_ANNOTATION_KEY}"), "value": "true"}
                    ]
                }]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
        let rows = store.records();
        assert_eq!(rows.len(), 1, "overwrite must replace, not duplicate");
        assert_eq!(rows[0].target, "10.0.0.2");
    }

    #[tokio::test]
    async fn test_post_records_mismatched_updates_is_400() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &[]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .json(&json!({
                "UpdateOld": [{"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"}],
                "UpdateNew": []
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        assert!(store.operations().is_empty(), "nothing may reach the store");
    }

    #[tokio::test]
    async fn test_post_records_malformed_body_is_400() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &[]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .body("{not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_post_records_sync_failure_is_500() {
        let store = Arc::new(InMemoryRewriteStore::new());
        store.push_failure(
            StoreCall::Create,
            RewriteApiError::Status {
                status: 403,
                message: "forbidden".to_string(),
            },
        );
        let server = api_server(&store, &[]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .json(&json!({
                "Create": [{"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"}]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        assert!(response.text().await.unwrap().contains("app.example.com"));
    }

    #[tokio::test]
    async fn test_post_records_in_dry_run_does_not_mutate() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &["--dry-run"]).await;

        let response = reqwest::Client::new()
            .post(server.url("/records"))
            .json(&json!({
                "Create": [{"dnsName": "app.example.com", "targets": ["10.0.0.1"], "recordType": "A"}]
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_endpoints_filters_candidates() {
        let store = Arc::new(InMemoryRewriteStore::new());
        let server = api_server(&store, &["--domain-filter", "example.com"]).await;

        let response = reqwest::Client::new()
            .post(server.url("/adjustendpoints"))
            .json(&json!([
                {"dnsName": "b.example.com", "targets": ["10.0.0.2"], "recordType": "A"},
                {"dnsName": "txt.example.com", "targets": ["\"owner\""], "recordType": "TXT"},
                {"dnsName": "a.example.org", "targets": ["10.0.0.3"], "recordType": "A"},
                {"dnsName": "a.example.com", "targets": ["10.0.0.1"], "recordType": "A", "recordTTL": 300}
            ]))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!([
                {"dnsName": "b.example.com", "targets": ["10.0.0.2"], "recordType": "A"},
                {"dnsName": "a.example.com", "targets": ["10.0.0.1"], "recordType": "A", "recordTTL": 300}
            ])
        );
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let server = TestServer::start(health_router(), CancellationToken::new()).await;

        let healthz = reqwest::get(server.url("/healthz")).await.unwrap();
        assert_eq!(healthz.status(), 200);
        assert_eq!(healthz.text().await.unwrap(), "OK");

        let readyz = reqwest::get(server.url("/readyz")).await.unwrap();
        assert_eq!(readyz.status(), 200);
        assert_eq!(readyz.text().await.unwrap(), "Ready");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_changesets() {
        crate::metrics::record_changeset("success", std::time::Duration::from_millis(5));
        let server = TestServer::start(health_router(), CancellationToken::new()).await;

        let response = reqwest::get(server.url("/metrics")).await.unwrap();

        assert_eq!(response.status(), 200);
        let body = response.text().await.unwrap();
        assert!(
            body.contains("nextdns_webhook_changesets_total"),
            "metrics output missing change set counter: {body}"
        );
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let server = TestServer::start(health_router(), CancellationToken::new()).await;

        server.shutdown.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server.handle)
            .await
            .expect("server should stop after cancellation")
            .unwrap();

        assert!(result.is_ok());
    }
}
