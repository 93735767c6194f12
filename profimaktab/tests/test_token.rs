mod common;

use common::mock_server::MaktabMock;
use profimaktab::Error;
use std::time::Duration;

#[tokio::test]
async fn test_authenticate_valid() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture("token/valid.json").await;

    let client = mock.client();
    client.authenticate().await.unwrap();
    assert!(client.token_cache().is_cached().await);
}

#[tokio::test]
async fn test_missing_access_field_is_auth_error() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture_expect("token/no_access.json", 2).await;

    let client = mock.client();
    let err = client.authenticate().await.unwrap_err();
    assert!(err.is_auth(), "expected Authentication error, got: {err:?}");
    assert!(!client.token_cache().is_cached().await);

    // nothing was cached, so the next attempt hits the endpoint again
    assert!(client.authenticate().await.is_err());
}

#[tokio::test]
async fn test_rejected_credentials() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture("token/invalid_credentials.json").await;

    let result = mock.client().authenticate().await;
    assert!(
        matches!(result, Err(Error::Authentication { status: Some(401), .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_token_reused_within_validity() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture_expect("token/valid.json", 1).await;
    mock.mount_fixture("profile/valid.json").await;

    let client = mock.client();
    client.get_profile().await.unwrap();
    client.get_profile().await.unwrap();
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once_per_call() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture_expect("token/valid.json", 2).await;
    mock.mount_fixture_expect("profile/valid.json", 2).await;

    let client = mock.client().with_token_validity(Duration::ZERO);
    client.get_profile().await.unwrap();
    client.get_profile().await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_call_drops_token() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture("token/valid.json").await;
    wiremock::Mock::given(wiremock::matchers::path("/api/profile/"))
        .respond_with(wiremock::ResponseTemplate::new(401))
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let result = client.get_profile().await;
    assert!(matches!(result, Err(Error::HttpStatus { status: 401, .. })));
    assert!(!client.token_cache().is_cached().await);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture_expect("token/valid.json", 1).await;
    mock.mount_fixture("profile/valid.json").await;

    let client = mock.client();
    let (a, b) = tokio::join!(client.get_profile(), client.get_profile());
    a.unwrap();
    b.unwrap();
}
