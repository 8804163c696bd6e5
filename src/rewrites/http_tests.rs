// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `http.rs`

#[cfg(test)]
mod tests {
    use super::super::{build_api_url, NextDnsApi};
    use crate::errors::{ConfigError, RewriteApiError};
    use crate::records::RecordKind;
    use crate::rewrites::RewriteStore;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE: &str = "abc123";
    const KEY: &str = "test-key";
    const REWRITES_PATH: &str = "/profiles/abc123/rewrites";

    fn api(server: &MockServer) -> NextDnsApi {
        NextDnsApi::new(KEY, PROFILE, &server.uri(), Duration::from_secs(5))
            .expect("client should build")
    }

    #[test]
    fn test_build_api_url() {
        assert_eq!(build_api_url("api.nextdns.io"), "https://api.nextdns.io");
        assert_eq!(
            build_api_url("https://api.nextdns.io/"),
            "https://api.nextdns.io"
        );
        assert_eq!(
            build_api_url(" http://127.0.0.1:9000 "),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_new_rejects_blank_credentials() {
        let err = NextDnsApi::new("  ", PROFILE, "https://api.nextdns.io", Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);

        let err = NextDnsApi::new(KEY, "", "https://api.nextdns.io", Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingProfileId);
    }

    #[test]
    fn test_rewrites_url() {
        let api = NextDnsApi::new(KEY, PROFILE, "api.nextdns.io/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            api.rewrites_url(),
            "https://api.nextdns.io/profiles/abc123/rewrites"
        );
    }

    #[tokio::test]
    async fn test_list_decodes_rows_and_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REWRITES_PATH))
            .and(header("X-Api-Key", KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "r1", "name": "a.example.com", "type": "A", "content": "10.0.0.1"},
                    {"id": "r2", "name": "b.example.com", "type": "CNAME", "content": "a.example.com"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rows = api(&server).list().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "r1");
        assert_eq!(rows[0].kind, RecordKind::A);
        assert_eq!(rows[0].target, "10.0.0.1");
        assert_eq!(rows[1].kind, RecordKind::Cname);
    }

    #[tokio::test]
    async fn test_list_infers_missing_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REWRITES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "r1", "name": "v6.example.com", "content": "fd00::1"}]
            })))
            .mount(&server)
            .await;

        let rows = api(&server).list().await.unwrap();

        assert_eq!(rows[0].kind, RecordKind::Aaaa, "Kind should be inferred from content");
    }

    #[tokio::test]
    async fn test_list_empty_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REWRITES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        assert!(api(&server).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_posts_name_and_content_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REWRITES_PATH))
            .and(header("X-Api-Key", KEY))
            .and(body_json(json!({"name": "new.example.com", "content": "10.0.0.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "r9", "name": "new.example.com", "type": "A", "content": "10.0.0.1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = api(&server)
            .create("new.example.com", "10.0.0.1")
            .await
            .unwrap();

        assert_eq!(id, "r9");
    }

    #[tokio::test]
    async fn test_delete_targets_row_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/profiles/abc123/rewrites/r1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        api(&server).delete("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_envelope_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(REWRITES_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{"code": "invalid", "detail": "content is not valid"}]
            })))
            .mount(&server)
            .await;

        let err = api(&server).create("x.example.com", "").await.unwrap_err();

        assert_eq!(
            err,
            RewriteApiError::Status {
                status: 400,
                message: "invalid: content is not valid".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_plain_body_and_empty_body_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REWRITES_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/profiles/abc123/rewrites/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = api(&server);

        let err = api.list().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("upstream down"));

        let err = api.delete("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REWRITES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = api(&server).list().await.unwrap_err();

        assert!(
            matches!(err, RewriteApiError::Decode(_)),
            "Expected decode error, got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        // Bind and drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = NextDnsApi::new(
            KEY,
            PROFILE,
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = api.list().await.unwrap_err();

        assert!(
            matches!(err, RewriteApiError::Connection { .. }),
            "Expected connection error, got {err:?}"
        );
    }
}
