use crate::summary::summarize;
use crate::types::{today, PollResult, StudentId};
use crate::{Error, MaktabClient};

/// Fetches and summarizes today's dairy for every student, in order.
///
/// The cycle is all-or-nothing: the first failing student aborts it and no
/// partial result is returned.
///
/// # Errors
/// Returns the first error raised while fetching or summarizing a dairy.
pub async fn poll_all(client: &MaktabClient, student_ids: &[StudentId]) -> Result<PollResult, Error> {
    let date = today();
    let mut result = PollResult::new();

    for student_id in student_ids {
        tracing::debug!(student_id = %student_id, "fetching dairy");
        let raw = client.get_dairy(student_id, Some(date)).await.map_err(|e| {
            tracing::warn!(student_id = %student_id, error = %e, "dairy fetch failed");
            e
        })?;
        let summary = summarize(student_id, date, &raw)?;
        result.insert(student_id.clone(), summary);
    }

    tracing::info!(students = result.len(), "poll cycle complete");
    Ok(result)
}
