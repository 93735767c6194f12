use profimaktab::types::Credentials;
use profimaktab::MaktabClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test_access_token";

#[derive(Deserialize)]
pub struct Fixture {
    #[serde(rename = "_meta")]
    pub meta: Option<FixtureMeta>,
    pub request: FixtureRequest,
    pub response: FixtureResponse,
}

#[derive(Deserialize)]
pub struct FixtureMeta {
    pub query: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path: String,
}

#[derive(Deserialize)]
pub struct FixtureResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

pub struct MaktabMock {
    pub server: MockServer,
}

impl MaktabMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    fn load_fixture(fixture_path: &str) -> Fixture {
        let full_path = Self::fixtures_dir().join(fixture_path);

        let content = fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", full_path.display(), e));

        serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", full_path.display(), e))
    }

    /// Mounts a recorded request/response pair. Query parameters listed in
    /// `_meta.query` must match exactly.
    #[allow(dead_code)]
    pub async fn mount_fixture(&self, fixture_path: &str) {
        self.fixture_mock(fixture_path).mount(&self.server).await;
    }

    /// Like `mount_fixture`, but the mock must be hit exactly `times` times.
    #[allow(dead_code)]
    pub async fn mount_fixture_expect(&self, fixture_path: &str, times: u64) {
        self.fixture_mock(fixture_path)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    fn fixture_mock(&self, fixture_path: &str) -> Mock {
        let fixture = Self::load_fixture(fixture_path);

        let mut mock = Mock::given(method(fixture.request.method.as_str()))
            .and(path(format!("/api/{}", fixture.request.path)));

        if let Some(query) = fixture.meta.and_then(|meta| meta.query) {
            for (key, value) in query {
                mock = mock.and(query_param(key, value));
            }
        }

        mock.respond_with(
            ResponseTemplate::new(fixture.response.status_code)
                .set_body_json(&fixture.response.body),
        )
    }

    /// Accepts the test credentials and hands out `TOKEN`.
    #[allow(dead_code)]
    pub async fn mount_token(&self) {
        Mock::given(method("POST"))
            .and(path("/api/token/"))
            .and(body_json(serde_json::json!({"username": "parent", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access": TOKEN, "refresh": "r"})),
            )
            .mount(&self.server)
            .await;
    }

    /// Serves `body` as the dairy of `student`, requiring the bearer token.
    #[allow(dead_code)]
    pub async fn mount_dairy(&self, student: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/dairy/"))
            .and(query_param("student", student))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    #[allow(dead_code)]
    pub async fn mount_dairy_status(&self, student: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path("/api/dairy/"))
            .and(query_param("student", student))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub fn base_url(&self) -> String {
        format!("{}/api/", self.server.uri())
    }

    pub fn client(&self) -> MaktabClient {
        MaktabClient::new(Credentials::new("parent", "secret"))
            .with_base_url(self.base_url())
            .with_timeout(Duration::from_secs(5))
    }
}

#[allow(dead_code)]
pub fn lesson(name: &str, grade: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "lesson_name": name,
        "theme": format!("{name} topic"),
        "balls": grade,
        "tasks": format!("{name} homework"),
    })
}
