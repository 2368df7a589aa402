//! Upstream refresh triggers: the custom collector endpoint and the GitHub
//! workflow that re-exports the snapshots.

use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::zone::fmt_ts;

const GITHUB_API: &str = "https://api.github.com";
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// The custom-only route waits just under a minute for slow collectors.
const CUSTOM_ONLY_TIMEOUT: Duration = Duration::from_secs(59);

#[derive(Clone, Debug, Default)]
pub struct RefreshSettings {
    pub custom_api_url: Option<String>,
    pub github_token: Option<String>,
    pub github_owner: Option<String>,
    pub github_repo: Option<String>,
    pub github_workflow_id: Option<String>,
    pub github_ref: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
    /// Custom endpoint first, then the workflow dispatch.
    Full,
    CustomOnly,
    GitHubOnly,
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),

    #[error("{service} request timed out after {seconds} seconds")]
    Timeout { service: &'static str, seconds: u64 },

    #[error("Failed to fetch data from custom URL: {0}")]
    CustomStatus(String),

    #[error("Failed to trigger GitHub action: {0}")]
    GitHubStatus(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// What the refresh routes answer, success or not.
#[derive(Clone, Debug, Serialize)]
pub struct RefreshOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

fn present(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Names of the settings `mode` needs but does not have, in a fixed order.
pub fn missing_settings(settings: &RefreshSettings, mode: RefreshMode) -> Vec<&'static str> {
    let custom = [("CUSTOM_API_URL", &settings.custom_api_url)];
    let github = [
        ("GITHUB_TOKEN", &settings.github_token),
        ("GITHUB_OWNER", &settings.github_owner),
        ("GITHUB_REPO", &settings.github_repo),
        ("GITHUB_WORKFLOW_ID", &settings.github_workflow_id),
    ];
    let required: Vec<(&'static str, &Option<String>)> = match mode {
        RefreshMode::Full => custom.into_iter().chain(github).collect(),
        RefreshMode::CustomOnly => custom.into_iter().collect(),
        RefreshMode::GitHubOnly => github.into_iter().collect(),
    };
    required
        .into_iter()
        .filter(|(_, v)| !present(v))
        .map(|(name, _)| name)
        .collect()
}

pub fn dispatch_url(owner: &str, repo: &str, workflow_id: &str) -> String {
    format!("{GITHUB_API}/repos/{owner}/{repo}/actions/workflows/{workflow_id}/dispatches")
}

fn status_text(res: &reqwest::Response) -> String {
    let status = res.status();
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

fn timed_out(err: reqwest::Error, service: &'static str, timeout: Duration) -> RefreshError {
    if err.is_timeout() {
        RefreshError::Timeout {
            service,
            seconds: timeout.as_secs(),
        }
    } else {
        RefreshError::Http(err)
    }
}

async fn call_custom(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<(), RefreshError> {
    info!("custom api: calling");
    let res = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| timed_out(e, "Custom API", timeout))?;
    if !res.status().is_success() {
        error!("custom api failed with status {}", res.status().as_u16());
        return Err(RefreshError::CustomStatus(status_text(&res)));
    }
    info!("custom api: ok");
    Ok(())
}

async fn dispatch_workflow(
    client: &reqwest::Client,
    settings: &RefreshSettings,
) -> Result<(), RefreshError> {
    let owner = settings.github_owner.as_deref().unwrap_or_default();
    let repo = settings.github_repo.as_deref().unwrap_or_default();
    let workflow = settings.github_workflow_id.as_deref().unwrap_or_default();
    let token = settings.github_token.as_deref().unwrap_or_default();
    info!("github: dispatching workflow {workflow} for {owner}/{repo}");

    let res = client
        .post(dispatch_url(owner, repo, workflow))
        .header(reqwest::header::ACCEPT, "application/vnd.github.v3+json")
        .header(reqwest::header::USER_AGENT, "dashboard_core")
        .bearer_auth(token)
        .json(&serde_json::json!({ "ref": settings.github_ref }))
        .timeout(CALL_TIMEOUT)
        .send()
        .await
        .map_err(|e| timed_out(e, "GitHub Action", CALL_TIMEOUT))?;
    if !res.status().is_success() {
        error!("github dispatch failed with status {}", res.status().as_u16());
        return Err(RefreshError::GitHubStatus(status_text(&res)));
    }
    info!("github: workflow triggered");
    Ok(())
}

async fn run(
    client: &reqwest::Client,
    settings: &RefreshSettings,
    mode: RefreshMode,
) -> Result<&'static str, RefreshError> {
    let missing = missing_settings(settings, mode);
    if !missing.is_empty() {
        return Err(RefreshError::MissingSettings(missing));
    }
    let custom_url = settings.custom_api_url.as_deref().unwrap_or_default();

    match mode {
        RefreshMode::Full => {
            call_custom(client, custom_url, CALL_TIMEOUT).await?;
            dispatch_workflow(client, settings).await?;
            Ok("Refresh operations completed successfully")
        }
        RefreshMode::CustomOnly => {
            call_custom(client, custom_url, CUSTOM_ONLY_TIMEOUT).await?;
            Ok("Custom API refresh completed")
        }
        RefreshMode::GitHubOnly => {
            dispatch_workflow(client, settings).await?;
            Ok("GitHub Action triggered successfully")
        }
    }
}

/// Runs the refresh and folds any failure into the outcome.
pub async fn run_refresh(
    client: &reqwest::Client,
    settings: &RefreshSettings,
    mode: RefreshMode,
) -> RefreshOutcome {
    match run(client, settings, mode).await {
        Ok(message) => RefreshOutcome {
            success: true,
            message: message.to_string(),
            timestamp: None,
        },
        Err(err) => {
            error!("refresh ({mode:?}) failed: {err}");
            RefreshOutcome {
                success: false,
                message: err.to_string(),
                timestamp: Some(fmt_ts(OffsetDateTime::now_utc())),
            }
        }
    }
}
