pub mod account;
pub mod poll;
pub mod sensor;
pub mod summary;
pub mod token;
pub mod types;

pub use account::{validate_credentials, Account, SetupError, Sink, Snapshot, SCAN_INTERVAL};
pub use poll::poll_all;
pub use sensor::{SensorAttributes, SensorState, StudentSensor};
pub use summary::summarize;
pub use token::{TokenCache, DEFAULT_TOKEN_VALIDITY};

use crate::types::{format_date, today, Credentials, StudentId};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use time::Date;

pub const DEFAULT_BASE_URL: &str = "https://api.profimaktab.uz/api/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TOKEN_ENDPOINT: &str = "token/";
pub const PROFILE_ENDPOINT: &str = "profile/";
pub const SCHEDULE_ENDPOINT: &str = "lessons/";
pub const DAIRY_ENDPOINT: &str = "dairy/";

const SCHEDULE_PARAMS: [(&str, &str); 3] =
    [("schedule_view", "1"), ("page", "1"), ("page_size", "100")];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {reason}")]
    Authentication { reason: String, status: Option<u16> },
    #[error("connection error: {0}")]
    Connectivity(#[from] reqwest::Error),
    #[error("API call to {endpoint} failed: {status} {reason}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        reason: String,
        body: String,
    },
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected dairy response for student {student_id}: {source}")]
    Aggregation {
        student_id: StudentId,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// True when the stored credentials themselves are rejected.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// HTTP status attached to the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Connectivity(e) => e.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::Aggregation { .. } => None,
        }
    }
}

pub struct MaktabClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    token: TokenCache,
    timeout: Duration,
}

impl MaktabClient {
    async fn get<T, U>(&self, endpoint: &str, query: &U) -> Result<T, Error>
    where
        T: serde::de::DeserializeOwned,
        U: serde::ser::Serialize + ?Sized,
    {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(&token)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.token.invalidate().await;
            }
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                endpoint,
                status = status.as_u16(),
                body = %body,
                "API call failed"
            );
            return Err(Error::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn access_token(&self) -> Result<String, Error> {
        let url = format!("{}{}", self.base_url, TOKEN_ENDPOINT);
        self.token
            .get(&self.client, &url, &self.credentials, self.timeout)
            .await
    }

    /// Creates a new `MaktabClient` for the given account.
    /// Talks to the public ProfiMaktab API unless a base URL is set.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
            token: TokenCache::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Points the client at another deployment. A trailing slash is added
    /// when missing.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Bounds every request, including token fetches.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long a fetched token is trusted before it is replaced.
    #[must_use]
    pub fn with_token_validity(mut self, validity: Duration) -> Self {
        self.token = TokenCache::new(validity);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// The token cache backing this client.
    #[must_use]
    pub const fn token_cache(&self) -> &TokenCache {
        &self.token
    }

    /// Fetches a token, reusing a cached one while it is valid. Used to
    /// validate credentials.
    ///
    /// # Errors
    /// Returns `Error::Authentication` for rejected credentials and
    /// `Error::Connectivity` when the service cannot be reached.
    pub async fn authenticate(&self) -> Result<(), Error> {
        self.access_token().await.map(|_| ())
    }

    /// Performs an authenticated GET against `endpoint` and returns the JSON body.
    ///
    /// # Errors
    /// Returns an error if authentication fails, the request fails, the server
    /// answers with a non-success status or the body is not JSON.
    pub async fn call(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, Error> {
        self.get(endpoint, query).await
    }

    /// Retrieves the profile of the logged-in account.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn get_profile(&self) -> Result<serde_json::Value, Error> {
        self.call(PROFILE_ENDPOINT, &[]).await
    }

    /// Retrieves the lesson schedule (first page, up to 100 entries).
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn get_schedule(&self) -> Result<serde_json::Value, Error> {
        self.call(SCHEDULE_ENDPOINT, &SCHEDULE_PARAMS).await
    }

    /// Retrieves the dairy (lessons, grades, homework) of one student.
    ///
    /// # Arguments
    /// * `student_id` - The student to query
    /// * `date` - Day to fetch; defaults to today's local date
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn get_dairy(
        &self,
        student_id: &StudentId,
        date: Option<Date>,
    ) -> Result<serde_json::Value, Error> {
        let for_date = format_date(date.unwrap_or_else(today));
        let query = [("for_date", for_date.as_str()), ("student", student_id.as_str())];
        self.call(DAIRY_ENDPOINT, &query).await
    }
}
