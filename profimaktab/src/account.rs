//! Per-account context: setup, periodic refresh and publishing.

use crate::poll::poll_all;
use crate::sensor::{SensorState, StudentSensor};
use crate::types::{PollResult, StudentId};
use crate::{Error, MaktabClient};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Default interval between two refreshes.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Receives sensor states after every refresh.
pub trait Sink: Send + Sync {
    fn publish(&self, states: &[SensorState]);

    /// Called when a refresh fails. The previously published states remain
    /// the last known good ones.
    fn update_failed(&self, _error: &Error) {}
}

/// Last-known-good data plus refresh bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub data: Option<PollResult>,
    pub last_update_success: Option<OffsetDateTime>,
    pub last_update_ok: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The credentials were rejected; retrying will not help.
    #[error("reauthentication required: {0}")]
    AuthFailed(#[source] Error),
    /// The service could not be reached or answered with an error.
    #[error("service temporarily unavailable: {0}")]
    NotReady(#[source] Error),
}

impl From<Error> for SetupError {
    fn from(err: Error) -> Self {
        if err.is_auth() {
            Self::AuthFailed(err)
        } else {
            Self::NotReady(err)
        }
    }
}

/// Checks credentials with a single token fetch.
///
/// # Errors
/// Returns `SetupError::AuthFailed` for rejected credentials and
/// `SetupError::NotReady` when the service is unreachable.
pub async fn validate_credentials(client: &MaktabClient) -> Result<(), SetupError> {
    client.authenticate().await.map_err(|e| {
        if e.is_auth() {
            tracing::error!(error = %e, "error authenticating with ProfiMaktab API");
        } else {
            tracing::error!(error = %e, "error connecting to ProfiMaktab API");
        }
        SetupError::from(e)
    })
}

pub struct Account {
    client: MaktabClient,
    student_ids: Vec<StudentId>,
    sink: Arc<dyn Sink>,
    snapshot: Mutex<Snapshot>,
}

impl Account {
    /// Validates the credentials and performs the first refresh. The account
    /// is only returned once that refresh succeeded.
    ///
    /// # Errors
    /// Returns `SetupError::AuthFailed` if the credentials are rejected and
    /// `SetupError::NotReady` for any other failure.
    pub async fn setup(
        client: MaktabClient,
        student_ids: Vec<StudentId>,
        sink: Arc<dyn Sink>,
    ) -> Result<Self, SetupError> {
        validate_credentials(&client).await?;

        let account = Self {
            client,
            student_ids,
            sink,
            snapshot: Mutex::new(Snapshot::default()),
        };
        account.refresh().await?;
        Ok(account)
    }

    #[must_use]
    pub const fn client(&self) -> &MaktabClient {
        &self.client
    }

    #[must_use]
    pub fn student_ids(&self) -> &[StudentId] {
        &self.student_ids
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock_snapshot().clone()
    }

    #[must_use]
    pub fn sensors(&self) -> Vec<StudentSensor> {
        self.student_ids
            .iter()
            .cloned()
            .map(StudentSensor::new)
            .collect()
    }

    /// Runs one poll cycle and publishes the result.
    ///
    /// On failure the previous data is kept, the snapshot is marked failed
    /// and the sink is told about the error.
    ///
    /// # Errors
    /// Returns the error that aborted the poll cycle.
    pub async fn refresh(&self) -> Result<(), Error> {
        match poll_all(&self.client, &self.student_ids).await {
            Ok(data) => {
                let snapshot = {
                    let mut snapshot = self.lock_snapshot();
                    snapshot.data = Some(data);
                    snapshot.last_update_success = Some(OffsetDateTime::now_utc());
                    snapshot.last_update_ok = true;
                    snapshot.clone()
                };
                self.sink.publish(&self.render(&snapshot));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "error communicating with API");
                self.lock_snapshot().last_update_ok = false;
                self.sink.update_failed(&e);
                Err(e)
            }
        }
    }

    /// Refreshes every `interval` until `cancel` fires. Failed refreshes are
    /// logged and retried on the next tick.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // setup already refreshed

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "periodic refresh failed");
                    }
                }
            }
        }
        tracing::info!("refresh loop stopped");
    }

    fn render(&self, snapshot: &Snapshot) -> Vec<SensorState> {
        self.sensors()
            .iter()
            .map(|sensor| sensor.render(snapshot))
            .collect()
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
