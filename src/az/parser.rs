use crate::app::{Run, RunResult, RunStatus};
use crate::timeline::TimelineRecord;
use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, WrapErr};

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRun {
    id: u64,
    build_number: String,
    #[serde(default)]
    definition: Option<RawDefinition>,
    #[serde(default = "unknown_status")]
    status: RunStatus,
    #[serde(default)]
    result: Option<RunResult>,
    #[serde(default)]
    source_branch: String,
    #[serde(default)]
    queue_time: Option<DateTime<Utc>>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    finish_time: Option<DateTime<Utc>>,
}

#[derive(serde::Deserialize)]
struct RawDefinition {
    name: String,
}

fn unknown_status() -> RunStatus {
    RunStatus::Unknown
}

impl From<RawRun> for Run {
    fn from(raw: RawRun) -> Self {
        Run {
            id: raw.id,
            build_number: raw.build_number,
            definition_name: raw
                .definition
                .map_or_else(|| "(unknown pipeline)".to_string(), |d| d.name),
            status: raw.status,
            // The service reports "none" for runs that have not finished.
            result: raw.result.filter(|r| *r != RunResult::Unknown),
            source_branch: raw.source_branch,
            queue_time: raw.queue_time,
            start_time: raw.start_time,
            finish_time: raw.finish_time,
        }
    }
}

/// `az pipelines runs list -o json` output: a bare array of builds.
pub fn parse_runs(json: &str) -> Result<Vec<Run>> {
    let runs: Vec<RawRun> = serde_json::from_str(json).wrap_err("unexpected run list format")?;
    Ok(runs.into_iter().map(Run::from).collect())
}

#[derive(serde::Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    records: Option<Vec<TimelineRecord>>,
}

/// Build timeline response. A run that has not started yet has `records: null`.
pub fn parse_timeline(json: &str) -> Result<Vec<TimelineRecord>> {
    let resp: TimelineResponse =
        serde_json::from_str(json).wrap_err("unexpected timeline format")?;
    Ok(resp.records.unwrap_or_default())
}

#[derive(serde::Deserialize)]
struct LogLinesResponse {
    value: Vec<String>,
}

/// Log content comes back either as a JSON `{count, value: [lines]}` envelope or as
/// plain text, depending on the media type `az` negotiated.
pub fn parse_log(raw: &str) -> String {
    match serde_json::from_str::<LogLinesResponse>(raw) {
        Ok(resp) => resp.value.join("\n"),
        Err(_) => raw.to_string(),
    }
}

/// Takes the last `max_lines` lines from raw log output.
/// Returns `(text, was_truncated)`.
pub fn process_log_output(raw: &str, max_lines: usize) -> (String, bool) {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() > max_lines {
        (lines[lines.len() - max_lines..].join("\n"), true)
    } else {
        (raw.to_string(), false)
    }
}
