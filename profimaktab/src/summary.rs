//! Turns one day of raw dairy records into a fixed-shape summary.

use crate::types::{Dairy, LessonSlot, StudentId, StudentSummary, MAX_LESSONS};
use crate::Error;
use serde::Deserialize;
use time::Date;

/// Summarizes a raw `/dairy/` response for one student.
///
/// Only the first [`MAX_LESSONS`] results are used. Every slot is present in
/// the output; slots without a lesson hold the blank placeholder. Numeric
/// grades feed the daily average, anything else is shown but not counted.
///
/// # Errors
/// Returns `Error::Aggregation` if the response is not an object, its
/// `results` is not a list, or a result is not an object.
pub fn summarize(
    student_id: &StudentId,
    date: Date,
    raw: &serde_json::Value,
) -> Result<StudentSummary, Error> {
    let dairy = Dairy::deserialize(raw).map_err(|source| Error::Aggregation {
        student_id: student_id.clone(),
        source,
    })?;

    let mut lessons: [LessonSlot; MAX_LESSONS] = std::array::from_fn(|_| LessonSlot::blank());
    let mut sum = 0.0;
    let mut count = 0_u32;

    let entries = dairy.results.unwrap_or_default();
    for (slot, entry) in lessons.iter_mut().zip(&entries) {
        *slot = LessonSlot::from_entry(entry);
        if let Some(score) = slot.grade.score() {
            sum += score;
            count += 1;
        }
    }

    if entries.len() > MAX_LESSONS {
        tracing::debug!(
            student_id = %student_id,
            dropped = entries.len() - MAX_LESSONS,
            "dairy has more lessons than slots"
        );
    }

    Ok(StudentSummary {
        student_id: student_id.clone(),
        date,
        daily_average: average(sum, count),
        lessons,
    })
}

/// Mean rounded to one decimal, exact ties going to the even digit.
fn average(sum: f64, count: u32) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sum / f64::from(count) * 10.0).round_ties_even() / 10.0
}
