use profimaktab::{Error, SensorState, Sink};
use serde::Serialize;
use std::io::{self, Write};

/// Writes every published state as one JSON object per line on stdout.
pub struct JsonLinesSink;

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Line<'a> {
    State(&'a SensorState),
    UpdateFailed { error: String },
}

impl JsonLinesSink {
    fn emit(line: &Line<'_>) {
        let mut stdout = io::stdout().lock();
        let written = serde_json::to_writer(&mut stdout, line)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(stdout))
            .and_then(|()| stdout.flush());
        if let Err(e) = written {
            tracing::error!(error = %e, "failed to write sensor state");
        }
    }
}

impl Sink for JsonLinesSink {
    fn publish(&self, states: &[SensorState]) {
        for state in states {
            Self::emit(&Line::State(state));
        }
    }

    fn update_failed(&self, error: &Error) {
        Self::emit(&Line::UpdateFailed {
            error: error.to_string(),
        });
    }
}
