use profimaktab::summarize;
use profimaktab::types::{today, Credentials, StudentId};
use profimaktab::MaktabClient;
use std::env;

fn banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

fn show(result: Result<serde_json::Value, profimaktab::Error>) -> Option<serde_json::Value> {
    match result {
        Ok(body) => {
            let text = body.to_string();
            println!("Response length: {} bytes", text.len());
            Some(body)
        }
        Err(e) => {
            println!("Request failed: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    let username =
        env::var("PROFIMAKTAB_USERNAME").expect("PROFIMAKTAB_USERNAME environment variable not set");
    let password =
        env::var("PROFIMAKTAB_PASSWORD").expect("PROFIMAKTAB_PASSWORD environment variable not set");
    let student = env::var("PROFIMAKTAB_STUDENT").ok().and_then(StudentId::new);

    let client = MaktabClient::new(Credentials::new(username, password));

    banner("TEST 1: POST token/");
    match client.authenticate().await {
        Ok(()) => println!("SUCCESS: token acquired"),
        Err(e) => {
            println!("FAILED: {e}");
            return;
        }
    }

    banner("TEST 2: GET profile/");
    show(client.get_profile().await);

    banner("TEST 3: GET lessons/?schedule_view=1");
    show(client.get_schedule().await);

    let Some(student) = student else {
        println!("\nSet PROFIMAKTAB_STUDENT to also fetch a dairy");
        return;
    };

    banner(&format!("TEST 4: GET dairy/?student={student}"));
    let date = today();
    if let Some(body) = show(client.get_dairy(&student, Some(date)).await) {
        println!("\n>>> Attempting to summarize <<<");
        match summarize(&student, date, &body) {
            Ok(summary) => println!(
                "SUCCESS: {} lessons, average {:.1}",
                summary.populated(),
                summary.daily_average
            ),
            Err(e) => println!("FAILED: {e}"),
        }
    }
}
