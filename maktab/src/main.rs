#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use maktabconfig::MaktabConfig;
use profimaktab::types::{parse_date, today, Credentials, StudentId};
use profimaktab::{
    poll_all, summarize, validate_credentials, Account, Error as MaktabError, MaktabClient,
    SetupError,
};
use std::fmt::Write;
use std::io;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod export;
mod report;
mod sink;

const SETUP_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "maktab", about = "A CLI for ProfiMaktab student dairies")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll all students periodically and print sensor states as JSON lines
    Run,
    /// Check that the configured credentials are accepted
    Check,
    /// Show today's average for every configured student
    Status,
    /// Show one student's dairy
    Dairy {
        /// Student id
        student: String,
        /// Day to fetch (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Print the raw API response instead of the summary
        #[arg(long)]
        raw: bool,
    },
    /// Print the profile of the logged-in account
    Profile,
    /// Print the lesson schedule
    Schedule,
    /// Replace the configured student ids
    Students {
        /// Comma separated student ids, e.g. 12345,67890
        ids: String,
    },
    /// Export today's summaries of all students to a JSON file
    Export {
        /// Output file name
        #[arg(default_value = "maktab.json")]
        filename: String,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// The shell to generate completions for
        shell: Shell,
    },
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config() -> Result<MaktabConfig> {
    MaktabConfig::load_or_onboard().with_context(|| "Failed to load profimaktab config")
}

fn get_client(config: &MaktabConfig) -> Result<MaktabClient> {
    let username = config
        .username()
        .with_context(|| "Missing username in profimaktab config")?;
    let password = config
        .password()
        .with_context(|| "Missing password in profimaktab config")?;

    let mut client = MaktabClient::new(Credentials::new(username, password))
        .with_timeout(config.request_timeout()?)
        .with_token_validity(config.token_validity()?);
    if let Some(base_url) = &config.base_url {
        client = client.with_base_url(base_url);
    }
    Ok(client)
}

fn student_ids(config: &MaktabConfig) -> Result<Vec<StudentId>> {
    config
        .student_ids()?
        .iter()
        .map(|id| parse_student(id))
        .collect()
}

fn parse_student(value: &str) -> Result<StudentId> {
    StudentId::new(value).ok_or_else(|| anyhow::anyhow!("Student id must not be empty"))
}

fn format_http_error(status: u16, reason: &str, body: &str) -> String {
    let reason = if reason.is_empty() {
        "HTTP error"
    } else {
        reason
    };
    let mut output = format!("ProfiMaktab API error ({status} {reason}):");

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(fields) = value.as_object() {
            let mut lines = Vec::new();
            for (key, val) in fields {
                let messages: Vec<&serde_json::Value> = match val {
                    serde_json::Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                for item in messages {
                    let text = item
                        .as_str()
                        .map_or_else(|| item.to_string(), |s| s.replace('\n', " "));
                    if key == "detail" {
                        lines.push(text);
                    } else {
                        lines.push(format!("{key}: {text}"));
                    }
                }
            }
            if !lines.is_empty() {
                output.push('\n');
                for line in lines {
                    let _ = writeln!(output, "  - {line}");
                }
                return output;
            }
        }

        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            output.push('\n');
            output.push_str(&pretty);
            return output;
        }
    }

    if !body.trim().is_empty() {
        output.push('\n');
        output.push_str(body);
    }

    output
}

fn handle_error(err: &anyhow::Error) -> ! {
    let api_error = err.downcast_ref::<MaktabError>().or_else(|| {
        err.downcast_ref::<SetupError>().map(|e| match e {
            SetupError::AuthFailed(inner) | SetupError::NotReady(inner) => inner,
        })
    });

    if let Some(MaktabError::HttpStatus {
        status,
        reason,
        body,
        ..
    }) = api_error
    {
        eprintln!("{}", format_http_error(*status, reason, body));
        process::exit(1);
    }

    eprintln!("{err:#}");
    process::exit(1);
}

async fn setup_account(
    config: &MaktabConfig,
    cancel: &CancellationToken,
) -> Result<Option<Account>> {
    let ids = student_ids(config)?;
    loop {
        let client = get_client(config)?;
        match Account::setup(client, ids.clone(), Arc::new(sink::JsonLinesSink)).await {
            Ok(account) => return Ok(Some(account)),
            Err(SetupError::AuthFailed(e)) => {
                return Err(SetupError::AuthFailed(e))
                    .with_context(|| "Update credentials with the profimaktab config file");
            }
            Err(SetupError::NotReady(e)) => {
                tracing::warn!(
                    error = %e,
                    retry_in_secs = SETUP_RETRY_DELAY.as_secs(),
                    "ProfiMaktab not ready, retrying"
                );
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return Ok(None),
            () = tokio::time::sleep(SETUP_RETRY_DELAY) => {}
        }
    }
}

async fn run_daemon(config: &MaktabConfig) -> Result<()> {
    let interval = config.poll_interval()?;
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
        }
        shutdown.cancel();
    });

    let Some(account) = setup_account(config, &cancel).await? else {
        return Ok(());
    };
    tracing::info!(
        students = account.student_ids().len(),
        interval_secs = interval.as_secs(),
        "polling started"
    );
    account.run(interval, cancel).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        handle_error(&err);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "maktab", &mut io::stdout());
        }
        Command::Run => {
            let config = load_config()?;
            run_daemon(&config).await?;
        }
        Command::Check => {
            let config = load_config()?;
            let client = get_client(&config)?;
            validate_credentials(&client).await?;
            println!("Credentials accepted for {}", client.username());
        }
        Command::Status => {
            let config = load_config()?;
            let client = get_client(&config)?;
            let ids = student_ids(&config)?;
            let result = poll_all(&client, &ids).await?;
            for id in &ids {
                if let Some(summary) = result.get(id) {
                    println!("{}", report::format_status(summary));
                }
            }
        }
        Command::Dairy { student, date, raw } => {
            let config = load_config()?;
            let client = get_client(&config)?;
            let student = parse_student(&student)?;
            let date = date
                .as_deref()
                .map(parse_date)
                .transpose()
                .map_err(|err| anyhow::anyhow!("Invalid date, expected YYYY-MM-DD: {err}"))?
                .unwrap_or_else(today);
            let body = client.get_dairy(&student, Some(date)).await?;
            if raw {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                let summary = summarize(&student, date, &body)?;
                report::write_summary_tsv(&mut io::stdout().lock(), &summary)?;
            }
        }
        Command::Profile => {
            let config = load_config()?;
            let client = get_client(&config)?;
            let profile = client.get_profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Schedule => {
            let config = load_config()?;
            let client = get_client(&config)?;
            let schedule = client.get_schedule().await?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        Command::Students { ids } => {
            let mut config =
                MaktabConfig::load().with_context(|| "Failed to load profimaktab config")?;
            config.set_student_ids(&ids)?;
            config.store()?;
            println!("Stored {} student ids.", config.student_ids.len());
        }
        Command::Export { filename } => {
            let config = load_config()?;
            let client = get_client(&config)?;
            let ids = student_ids(&config)?;
            export::export_summaries(&client, &ids, &filename).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::format_http_error;

    #[test]
    fn http_error_lists_detail_and_field_messages() {
        let body = r#"{"detail": "Not found.", "student": ["Invalid pk \"9\"."]}"#;
        let output = format_http_error(404, "Not Found", body);
        assert_eq!(
            output,
            "ProfiMaktab API error (404 Not Found):\n  - Not found.\n  - student: Invalid pk \"9\".\n"
        );
    }

    #[test]
    fn http_error_keeps_plain_bodies() {
        let output = format_http_error(502, "", "<html>bad gateway</html>");
        assert_eq!(
            output,
            "ProfiMaktab API error (502 HTTP error):\n<html>bad gateway</html>"
        );
    }
}
