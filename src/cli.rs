use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pipewatch", version, about = "Azure Pipelines Watcher TUI")]
pub struct Cli {
    /// Organization name or URL (e.g. contoso or https://dev.azure.com/contoso)
    #[arg(short, long, env = "AZURE_DEVOPS_ORG")]
    pub org: String,

    /// Project name
    #[arg(short, long, env = "AZURE_DEVOPS_PROJECT")]
    pub project: String,

    /// Poll interval in seconds (0 = default 30, minimum 5)
    #[arg(short, long, default_value_t = 30, allow_negative_numbers = true)]
    pub interval: i64,

    /// Maximum number of runs to fetch per poll
    #[arg(short, long, default_value_t = 30)]
    pub limit: usize,

    /// Write debug logs to $XDG_STATE_HOME/pipewatch/debug.log
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// `--interval` as a signed duration. Values past what `chrono` can hold
    /// saturate, so the poller's clamping sees them instead of a panic.
    pub fn poll_interval(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.interval).unwrap_or(if self.interval < 0 {
            chrono::Duration::MIN
        } else {
            chrono::Duration::MAX
        })
    }
}
