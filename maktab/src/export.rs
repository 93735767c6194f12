use anyhow::{Context, Result};
use profimaktab::types::{PollResult, StudentId};
use profimaktab::{poll_all, MaktabClient};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use time::OffsetDateTime;

#[derive(Serialize)]
pub struct ExportData {
    metadata: ExportMetadata,
    students: PollResult,
}

#[derive(Serialize)]
struct ExportMetadata {
    #[serde(with = "time::serde::rfc3339")]
    export_timestamp: OffsetDateTime,
    maktab_version: String,
    username: String,
}

pub async fn export_summaries(
    client: &MaktabClient,
    student_ids: &[StudentId],
    filename: &str,
) -> Result<()> {
    println!("Fetching today's dairy for {} students...", student_ids.len());
    let students = poll_all(client, student_ids)
        .await
        .with_context(|| "Failed to fetch student dairies")?;

    let export = ExportData {
        metadata: ExportMetadata {
            export_timestamp: OffsetDateTime::now_utc(),
            maktab_version: env!("CARGO_PKG_VERSION").to_string(),
            username: client.username().to_string(),
        },
        students,
    };

    println!("Writing export to file: {filename}");
    let json_data = serde_json::to_string_pretty(&export)
        .with_context(|| "Failed to serialize export data to JSON")?;
    let mut file = File::create(filename)
        .with_context(|| format!("Failed to create export file: {filename}"))?;
    file.write_all(json_data.as_bytes())
        .with_context(|| format!("Failed to write export data to file: {filename}"))?;

    println!("Export completed successfully! Saved to: {filename}");
    Ok(())
}
