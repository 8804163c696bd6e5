// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

use clap::Parser;
use nextdns_webhook::provider::Provider;
use nextdns_webhook::rewrites::{NextDnsApi, RewriteClient};
use nextdns_webhook::settings::Settings;
use nextdns_webhook::webhook::{api_router, serve};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

pub const PROFILE_ID: &str = "abc123";
pub const API_KEY: &str = "integration-key";
pub const REWRITES_PATH: &str = "/profiles/abc123/rewrites";

/// A webhook API server bound to an ephemeral loopback port
pub struct WebhookServer {
    pub address: SocketAddr,
    pub shutdown: CancellationToken,
}

impl WebhookServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }
}

impl Drop for WebhookServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Start the full stack (router, provider, HTTP client) against a mocked NextDNS API
pub async fn start_webhook(remote: &MockServer, extra_args: &[&str]) -> WebhookServer {
    let base_url = remote.uri();
    let mut args = vec![
        "nextdns-webhook",
        "--api-key",
        API_KEY,
        "--profile-id",
        PROFILE_ID,
        "--base-url",
    ];
    args.push(base_url.as_str());
    args.extend_from_slice(extra_args);

    let settings = Settings::try_parse_from(args)
        .expect("test arguments should parse")
        .validate()
        .expect("test settings should be valid");

    let api = NextDnsApi::new(
        &settings.api_key,
        &settings.profile_id,
        &settings.base_url,
        settings.request_timeout(),
    )
    .expect("API client should build");
    let provider = Arc::new(Provider::new(&settings, RewriteClient::new(Arc::new(api))));

    let shutdown = CancellationToken::new();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("loopback bind should succeed");
    let address = listener.local_addr().expect("listener has an address");

    tokio::spawn(serve(
        listener,
        api_router(provider, shutdown.clone()),
        shutdown.clone(),
    ));

    WebhookServer { address, shutdown }
}
