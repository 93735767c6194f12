//! Per-student state objects derived from the latest snapshot.

use crate::account::Snapshot;
use crate::types::{LessonSlot, StudentId, StudentSummary, MAX_LESSONS};
use serde::Serialize;
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;

pub const DOMAIN: &str = "profimaktab";
pub const ICON: &str = "mdi:school";
pub const ATTR_LESSON_PREFIX: &str = "lesson_";

/// Attribute set published alongside the sensor state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttributes {
    pub student_id: StudentId,
    /// RFC 3339 time of the last successful refresh
    pub last_update: Option<String>,
    pub daily_average: f64,
    /// `lesson_1`..`lesson_9`, each a JSON object string. Empty until the
    /// student has data.
    #[serde(flatten)]
    pub lessons: BTreeMap<String, String>,
}

/// Everything a sink needs to render one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub name: String,
    pub unique_id: String,
    pub icon: &'static str,
    pub state: String,
    pub attributes: SensorAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentSensor {
    student_id: StudentId,
}

impl StudentSensor {
    #[must_use]
    pub const fn new(student_id: StudentId) -> Self {
        Self { student_id }
    }

    #[must_use]
    pub const fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    #[must_use]
    pub fn name(&self) -> String {
        format!("student_{}", self.student_id)
    }

    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{DOMAIN}_{}", self.student_id)
    }

    fn summary<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a StudentSummary> {
        snapshot.data.as_ref()?.get(&self.student_id)
    }

    /// The daily average as text, or `"0"` before any data arrived.
    #[must_use]
    pub fn state(&self, snapshot: &Snapshot) -> String {
        self.summary(snapshot)
            .map_or_else(|| "0".to_string(), |s| format!("{:.1}", s.daily_average))
    }

    #[must_use]
    pub fn attributes(&self, snapshot: &Snapshot) -> SensorAttributes {
        let last_update = snapshot
            .last_update_success
            .and_then(|at| at.format(&Rfc3339).ok());

        let mut attributes = SensorAttributes {
            student_id: self.student_id.clone(),
            last_update,
            daily_average: 0.0,
            lessons: BTreeMap::new(),
        };

        if let Some(summary) = self.summary(snapshot) {
            attributes.daily_average = summary.daily_average;
            for index in 1..=MAX_LESSONS {
                let blank = LessonSlot::blank();
                let slot = summary.lesson(index).unwrap_or(&blank);
                attributes.lessons.insert(
                    format!("{ATTR_LESSON_PREFIX}{index}"),
                    serde_json::to_string(slot).unwrap_or_default(),
                );
            }
        }

        attributes
    }

    #[must_use]
    pub fn render(&self, snapshot: &Snapshot) -> SensorState {
        SensorState {
            name: self.name(),
            unique_id: self.unique_id(),
            icon: ICON,
            state: self.state(snapshot),
            attributes: self.attributes(snapshot),
        }
    }
}
