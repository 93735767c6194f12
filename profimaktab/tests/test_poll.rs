mod common;

use common::mock_server::{lesson, MaktabMock};
use profimaktab::types::{Grade, StudentId};
use profimaktab::{poll_all, Error};
use serde_json::json;

fn students(ids: &[&str]) -> Vec<StudentId> {
    ids.iter().map(|id| StudentId::new(id).unwrap()).collect()
}

#[tokio::test]
async fn test_poll_two_students() {
    let mock = MaktabMock::start().await;
    mock.mount_token().await;
    mock.mount_dairy(
        "1001",
        json!({"results": [lesson("Matematika", json!(5)), lesson("Fizika", json!(3))]}),
    )
    .await;
    mock.mount_dairy("1002", json!({"results": []})).await;

    let client = mock.client();
    let result = poll_all(&client, &students(&["1001", "1002"])).await.unwrap();
    assert_eq!(result.len(), 2);

    let first = &result[&StudentId::new("1001").unwrap()];
    assert!((first.daily_average - 4.0).abs() < f64::EPSILON);
    assert_eq!(first.lessons.len(), 9);
    assert_eq!(first.populated(), 2);
    assert_eq!(first.lesson(1).unwrap().name, "Matematika");
    assert_eq!(first.lesson(2).unwrap().grade, Grade::Numeric(3.into()));
    assert!(first.lesson(3).unwrap().is_blank());

    let second = &result[&StudentId::new("1002").unwrap()];
    assert!(second.daily_average.abs() < f64::EPSILON);
    assert_eq!(second.populated(), 0);
    assert_eq!(second.lessons.len(), 9);
}

#[tokio::test]
async fn test_poll_fails_as_a_whole() {
    let mock = MaktabMock::start().await;
    mock.mount_token().await;
    mock.mount_dairy("1001", json!({"results": [lesson("Matematika", json!(5))]}))
        .await;
    mock.mount_dairy_status("1002", 502, "bad gateway").await;

    let client = mock.client();
    let result = poll_all(&client, &students(&["1001", "1002"])).await;
    assert!(
        matches!(result, Err(Error::HttpStatus { status: 502, .. })),
        "expected HttpStatus error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_poll_stops_at_first_failure() {
    let mock = MaktabMock::start().await;
    mock.mount_token().await;
    mock.mount_dairy_status("1001", 500, "").await;
    wiremock::Mock::given(wiremock::matchers::query_param("student", "1002"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&mock.server)
        .await;

    let client = mock.client();
    assert!(poll_all(&client, &students(&["1001", "1002"])).await.is_err());
}

#[tokio::test]
async fn test_poll_reports_shape_errors() {
    let mock = MaktabMock::start().await;
    mock.mount_token().await;
    mock.mount_dairy("1001", json!({"results": {"unexpected": true}})).await;

    let client = mock.client();
    let result = poll_all(&client, &students(&["1001"])).await;
    assert!(matches!(result, Err(Error::Aggregation { .. })));
}

#[tokio::test]
async fn test_poll_authentication_failure() {
    let mock = MaktabMock::start().await;
    mock.mount_fixture("token/invalid_credentials.json").await;

    let client = mock.client();
    let err = poll_all(&client, &students(&["1001"])).await.unwrap_err();
    assert!(err.is_auth());
}
