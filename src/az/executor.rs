use super::parser;
use crate::app::{Run, LOG_MAX_LINES};
use crate::timeline::TimelineRecord;
use crate::traits::{RunSource, TimelineSource};
use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use tokio::process::Command;

const API_VERSION: &str = "7.1";

/// Azure DevOps access through the `az` CLI and its `azure-devops` extension.
/// Credentials stay with `az`; nothing here handles tokens.
#[derive(Debug, Clone)]
pub struct AzExecutor {
    org_url: String,
    project: String,
}

/// `contoso` -> `https://dev.azure.com/contoso`; full URLs pass through.
pub fn organization_url(organization: &str) -> String {
    let trimmed = organization.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://dev.azure.com/{trimmed}")
    }
}

pub async fn run_az(args: &[&str]) -> Result<String> {
    tracing::debug!(?args, "running az");
    let output = Command::new("az").args(args).output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            eyre!("az CLI not found. Install it from https://aka.ms/install-azure-cli")
        } else {
            eyre!("Failed to run az: {e}")
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(classify_failure(&stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn classify_failure(stderr: &str) -> color_eyre::Report {
    if stderr.contains("az login") || stderr.contains("not logged in") {
        eyre!("Not authenticated with az. Run `az login` first.")
    } else if stderr.contains("azure-devops") && stderr.contains("extension") {
        eyre!("The azure-devops extension is missing. Run `az extension add --name azure-devops`.")
    } else if stderr.contains("TF400813") || stderr.contains("401") {
        eyre!("Access denied by Azure DevOps. Check the organization and your permissions.")
    } else {
        eyre!("az command failed: {}", stderr.trim())
    }
}

impl AzExecutor {
    pub fn new(organization: &str, project: String) -> Self {
        Self {
            org_url: organization_url(organization),
            project,
        }
    }

    pub async fn check_available(&self) -> Result<()> {
        run_az(&["account", "show", "--output", "none"]).await.map(|_| ())
    }

    pub async fn fetch_runs_json(&self, limit: usize) -> Result<String> {
        let top = limit.to_string();
        run_az(&[
            "pipelines", "runs", "list",
            "--org", &self.org_url,
            "--project", &self.project,
            "--top", &top,
            "--output", "json",
        ])
        .await
    }

    async fn invoke_build(&self, resource: &str, route: &[String]) -> Result<String> {
        let mut args = vec![
            "devops", "invoke",
            "--org", &self.org_url,
            "--area", "build",
            "--resource", resource,
            "--api-version", API_VERSION,
            "--output", "json",
            "--route-parameters",
        ];
        args.extend(route.iter().map(String::as_str));
        run_az(&args).await
    }

    pub async fn fetch_timeline_json(&self, run_id: u64) -> Result<String> {
        let route = [
            format!("project={}", self.project),
            format!("buildId={run_id}"),
        ];
        self.invoke_build("timeline", &route).await
    }

    pub async fn fetch_log_raw(&self, run_id: u64, log_id: u64) -> Result<String> {
        let route = [
            format!("project={}", self.project),
            format!("buildId={run_id}"),
            format!("logId={log_id}"),
        ];
        self.invoke_build("logs", &route).await
    }
}

#[async_trait]
impl RunSource for AzExecutor {
    async fn list_runs(&self, limit: usize) -> Result<Vec<Run>> {
        let json = self.fetch_runs_json(limit).await?;
        parser::parse_runs(&json)
    }
}

#[async_trait]
impl TimelineSource for AzExecutor {
    async fn fetch_timeline(&self, run_id: u64) -> Result<Vec<TimelineRecord>> {
        let json = self.fetch_timeline_json(run_id).await?;
        parser::parse_timeline(&json)
    }

    async fn fetch_log(&self, run_id: u64, log_id: u64) -> Result<String> {
        let raw = self.fetch_log_raw(run_id, log_id).await?;
        let (content, truncated) =
            parser::process_log_output(&parser::parse_log(&raw), LOG_MAX_LINES);
        if truncated {
            tracing::debug!(run_id, log_id, "log truncated to last {LOG_MAX_LINES} lines");
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_org_name_expands() {
        assert_eq!(organization_url("contoso"), "https://dev.azure.com/contoso");
    }

    #[test]
    fn full_org_url_passes_through() {
        assert_eq!(
            organization_url("https://dev.azure.com/contoso/"),
            "https://dev.azure.com/contoso"
        );
        assert_eq!(
            organization_url("https://contoso.visualstudio.com"),
            "https://contoso.visualstudio.com"
        );
    }

    #[test]
    fn login_errors_are_explained() {
        let err = classify_failure("ERROR: Please run 'az login' to setup account.");
        assert!(err.to_string().contains("az login"));
    }

    #[test]
    fn missing_extension_is_explained() {
        let err = classify_failure("'pipelines' is misspelled or not recognized. The azure-devops extension is not installed");
        assert!(err.to_string().contains("az extension add"));
    }

    #[test]
    fn other_errors_keep_stderr() {
        let err = classify_failure("  boom  \n");
        assert_eq!(err.to_string(), "az command failed: boom");
    }
}
