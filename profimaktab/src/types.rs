use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

/// Number of fixed lesson slots exposed per student per day.
pub const MAX_LESSONS: usize = 9;

/// Placeholder used when the dairy entry carries no lesson name.
pub const UNKNOWN_LESSON: &str = "Unknown lesson";

// =============================================================================
// ACCOUNT
// =============================================================================

/// Login credentials for one configured account.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Identifier of a student as used by the `/dairy/` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    /// Wraps a trimmed, non-empty identifier. Returns `None` for blank input.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Bearer token; absent when the server rejects the credentials
    pub access: Option<String>,
    /// Refresh token, unused by this client
    pub refresh: Option<String>,
}

// =============================================================================
// DAIRY - raw records as returned by `/dairy/`
// =============================================================================

/// One day of dairy records for a student.
#[derive(Debug, Deserialize)]
pub struct Dairy {
    #[serde(default)]
    pub results: Option<Vec<DairyEntry>>,
}

/// A single lesson as reported by the dairy feed.
#[derive(Debug, Deserialize)]
pub struct DairyEntry {
    /// Subject name, e.g. "Matematika"
    #[serde(default)]
    pub lesson_name: Option<serde_json::Value>,
    /// Lesson topic
    #[serde(default)]
    pub theme: Option<serde_json::Value>,
    /// Grade; a number when graded, otherwise empty or null
    #[serde(default)]
    pub balls: Option<serde_json::Value>,
    /// Homework text
    #[serde(default)]
    pub tasks: Option<serde_json::Value>,
}

// =============================================================================
// SUMMARY - normalized per-student view
// =============================================================================

/// A lesson grade. Numbers keep the exact JSON representation the API sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grade {
    Numeric(serde_json::Number),
    Text(String),
}

impl Grade {
    #[must_use]
    pub fn blank() -> Self {
        Self::Text(String::new())
    }

    /// The value that feeds the daily average, if any.
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Numeric(n) => n.as_f64(),
            Self::Text(_) => None,
        }
    }

    pub(crate) fn from_raw(raw: Option<&serde_json::Value>) -> Self {
        match raw {
            None | Some(serde_json::Value::Null) => Self::blank(),
            Some(serde_json::Value::Number(n)) => Self::Numeric(n.clone()),
            Some(other) => Self::Text(text_of(Some(other))),
        }
    }
}

impl Default for Grade {
    fn default() -> Self {
        Self::blank()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// One of the fixed lesson positions of a student's day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonSlot {
    pub name: String,
    pub topic: String,
    pub grade: Grade,
    pub homework: String,
}

impl LessonSlot {
    /// The placeholder for a slot with no lesson.
    #[must_use]
    pub fn blank() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self == &Self::blank()
    }

    pub(crate) fn from_entry(entry: &DairyEntry) -> Self {
        Self {
            name: match &entry.lesson_name {
                None | Some(serde_json::Value::Null) => UNKNOWN_LESSON.to_string(),
                name => text_of(name.as_ref()),
            },
            topic: text_of(entry.theme.as_ref()),
            grade: Grade::from_raw(entry.balls.as_ref()),
            homework: text_of(entry.tasks.as_ref()),
        }
    }
}

/// Derived daily metrics for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student_id: StudentId,
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    /// Mean of the numeric grades, rounded to one decimal
    pub daily_average: f64,
    /// Slot 1 is at index 0
    pub lessons: [LessonSlot; MAX_LESSONS],
}

impl StudentSummary {
    /// Returns the slot at 1-based `index`.
    #[must_use]
    pub fn lesson(&self, index: usize) -> Option<&LessonSlot> {
        index.checked_sub(1).and_then(|i| self.lessons.get(i))
    }

    /// Iterates slots together with their 1-based index.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &LessonSlot)> {
        self.lessons.iter().enumerate().map(|(i, slot)| (i + 1, slot))
    }

    #[must_use]
    pub fn populated(&self) -> usize {
        self.lessons.iter().filter(|slot| !slot.is_blank()).count()
    }
}

/// Summaries for every configured student from a single poll cycle.
pub type PollResult = BTreeMap<StudentId, StudentSummary>;

/// Current calendar date in the local timezone, or UTC when the local
/// offset cannot be determined.
#[must_use]
pub fn today() -> Date {
    let now = OffsetDateTime::now_utc();
    UtcOffset::current_local_offset()
        .map_or_else(|_| now, |offset| now.to_offset(offset))
        .date()
}

/// Formats a date the way the API expects it (`YYYY-MM-DD`).
#[must_use]
pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(format).unwrap_or_else(|_| date.to_string())
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
/// Returns an error if the input is not a valid calendar date in that format.
pub fn parse_date(value: &str) -> Result<Date, time::error::Parse> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value.trim(), format)
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_date(*date))
}

fn text_of(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
