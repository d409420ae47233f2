//! Integration tests for the key exchange client against a mock server.

use pretty_assertions::assert_eq;
use sync_client::{RetryPolicy, SyncClient, SyncError, wire};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/v/query2018.php";

/// Install ring crypto provider for reqwest/rustls (idempotent)
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Frame a response body with the same codec the server uses.
fn framed(body: &str) -> Vec<u8> {
    wire::encode_frame(body).unwrap()
}

fn key_request() -> wiremock::MockBuilder {
    Mock::given(method("PUT"))
        .and(path(API_PATH))
        .and(query_param("soc", "steam"))
}

fn client_for(server: &MockServer) -> SyncClient {
    SyncClient::new()
        .unwrap()
        .with_api_url(format!("{}{API_PATH}", server.uri()))
        .with_retry_policy(RetryPolicy::new().with_initial_backoff_ms(1))
}

#[tokio::test]
async fn fetch_key_returns_and_caches_the_sync_key() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=0&sync=cafebabe")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let key = client.fetch_key("ak47").await.unwrap();
    assert_eq!(key.as_deref(), Some("cafebabe"));

    // Second lookup is served from the in-memory cache; the mock only
    // permits a single request.
    let again = client.fetch_key("ak47").await.unwrap();
    assert_eq!(again.as_deref(), Some("cafebabe"));
    assert_eq!(client.cached_key_count(), 1);

    server.verify().await;
}

#[tokio::test]
async fn auth_failure_aborts_without_any_retry() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=100")))
        .expect(1)
        .mount(&server)
        .await;

    // A generous retry budget must not be spent on an auth rejection.
    let client = client_for(&server)
        .with_retry_policy(RetryPolicy::new().with_max_retries(5).with_initial_backoff_ms(1));

    let err = client.fetch_key("x").await.unwrap_err();
    assert!(matches!(err, SyncError::Authentication));

    server.verify().await;
}

#[tokio::test]
async fn transient_http_status_is_retried() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=0&sync=deadbeef")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let key = client.fetch_key("famas").await.unwrap();
    assert_eq!(key.as_deref(), Some("deadbeef"));

    server.verify().await;
}

#[tokio::test]
async fn transient_result_code_is_retried() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=503")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=0&sync=feedface")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let key = client.fetch_key("uzi").await.unwrap();
    assert_eq!(key.as_deref(), Some("feedface"));

    server.verify().await;
}

#[tokio::test]
async fn unknown_result_code_is_a_soft_failure_without_retry() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=1000")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let key = client.fetch_key("glock").await.unwrap();
    assert_eq!(key, None);

    server.verify().await;
}

#[tokio::test]
async fn malformed_response_fails_without_retry() {
    install_crypto_provider();
    let server = MockServer::start().await;

    let mut body = 5u32.to_le_bytes().to_vec();
    body.extend_from_slice(b"junk!");
    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.fetch_key("m249").await.unwrap_err();
    assert!(matches!(err, SyncError::Decompression(_)));

    server.verify().await;
}

#[tokio::test]
async fn bulk_fetch_absorbs_auth_failures_without_retry() {
    install_crypto_provider();
    let server = MockServer::start().await;

    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=100")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let identifiers = vec!["x".to_string()];
    let (keys, failed) = client.fetch_keys(&identifiers).await;

    assert!(keys.is_empty());
    assert_eq!(failed, vec!["x".to_string()]);

    // Exactly one request reached the server.
    server.verify().await;
}

#[tokio::test]
async fn bulk_fetch_partitions_into_keys_and_misses() {
    install_crypto_provider();
    let server = MockServer::start().await;

    // With sequential requests, the first identifier consumes the
    // single-use mock and gets a key; the second falls through to the
    // keyless response.
    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=0&sync=key_a")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    key_request()
        .respond_with(ResponseTemplate::new(200).set_body_bytes(framed("result=0")))
        .mount(&server)
        .await;

    let client = client_for(&server).with_max_concurrent(1);

    let identifiers = vec!["ak47".to_string(), "m4a1".to_string()];
    let (keys, failed) = client.fetch_keys(&identifiers).await;

    assert_eq!(keys.len(), 1);
    assert_eq!(keys["ak47"], "key_a");
    assert_eq!(failed, vec!["m4a1".to_string()]);
}
