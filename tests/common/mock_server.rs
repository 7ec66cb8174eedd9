//! Mock HTTP servers for testing network-facing code

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use balloonpop_sync::shared::config::SyncConfig;

pub const TEST_BUCKET: &str = "balloon-pop.appspot.com";

/// Start a fresh mock server
pub async fn start_server() -> MockServer {
    MockServer::start().await
}

/// Answer `DELETE` for one encoded object name with `status`
pub async fn mount_delete(server: &MockServer, encoded_object: &str, status: u16) {
    Mock::given(method("DELETE"))
        .and(path(format!("/v0/b/{}/o/{}", TEST_BUCKET, encoded_object)))
        .respond_with(ResponseTemplate::new(status).set_body_string("{}"))
        .mount(server)
        .await;
}

/// Serve `body` for `GET route`
pub async fn mount_asset(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Configuration pointing every remote endpoint at `server`
pub fn config_for(server: &MockServer) -> SyncConfig {
    SyncConfig::builder()
        .probe_url(format!("{}/favicon.ico", server.uri()))
        .storage_api_base(server.uri())
        .storage_bucket(TEST_BUCKET)
        .app_scope(format!("{}/", server.uri()))
        .build()
        .expect("valid test configuration")
}
