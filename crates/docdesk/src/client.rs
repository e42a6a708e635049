//! Async client for one tool's HTTP endpoints: upload a batch, poll until the
//! job settles, then fetch the archive and log.

use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ClientError;
use crate::jobs::{StatusResponse, UploadResponse};
use crate::tool::Tool;
use crate::validate::SourceFile;

/// Backoff used while waiting for a job to reach a terminal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub factor: f64,
    pub max_interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            factor: 1.5,
            max_interval: Duration::from_secs(15),
            max_duration: Duration::from_secs(30 * 60),
        }
    }
}

impl PollPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.factor).min(self.max_interval)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ToolClient {
    client: Client,
    base_url: String,
    tool: Tool,
}

impl ToolClient {
    pub fn new(base_url: impl Into<String>, tool: Tool) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tool,
        })
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.tool.slug(), path)
    }

    /// Sends every file under the `files` field.
    pub async fn upload(&self, files: Vec<SourceFile>) -> Result<UploadResponse, ClientError> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes).file_name(file.filename);
            if let Some(content_type) = file.content_type.as_deref() {
                part = part.mime_str(content_type)?;
            }
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        json_or_error(response, None).await
    }

    pub async fn status(&self, job_id: &str) -> Result<StatusResponse, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("status/{}", job_id)))
            .send()
            .await?;
        json_or_error(response, Some(job_id)).await
    }

    /// Polls until the job is `SUCCESS` or `FAILURE`, calling `on_progress`
    /// after every poll. A `FAILURE` status is returned, not turned into an error.
    pub async fn wait_for_completion<F>(
        &self,
        job_id: &str,
        policy: &PollPolicy,
        mut on_progress: F,
    ) -> Result<StatusResponse, ClientError>
    where
        F: FnMut(&StatusResponse),
    {
        let started = Instant::now();
        let mut interval = policy.initial_interval;

        loop {
            let status = self.status(job_id).await?;
            on_progress(&status);
            if status.state.is_terminal() {
                return Ok(status);
            }

            if started.elapsed() + interval > policy.max_duration {
                return Err(ClientError::Timeout {
                    job_id: job_id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            log::debug!(
                "Job {} at {}%, next poll in {:?}",
                job_id,
                status.progress,
                interval
            );
            tokio::time::sleep(interval).await;
            interval = policy.next_interval(interval);
        }
    }

    pub async fn download(&self, job_id: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("download/{}", job_id)))
            .send()
            .await?;
        let response = ok_or_error(response, Some(job_id)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn log(&self, job_id: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("log/{}", job_id)))
            .send()
            .await?;
        let response = ok_or_error(response, Some(job_id)).await?;
        Ok(response.text().await?)
    }
}

async fn json_or_error<T: DeserializeOwned>(
    response: Response,
    job_id: Option<&str>,
) -> Result<T, ClientError> {
    let response = ok_or_error(response, job_id).await?;
    Ok(response.json().await?)
}

async fn ok_or_error(response: Response, job_id: Option<&str>) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if let (StatusCode::NOT_FOUND, Some(id)) = (status, job_id) {
        return Err(ClientError::NotFound(id.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let (message, details) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.details),
        Err(_) if text.is_empty() => (status.to_string(), Vec::new()),
        Err(_) => (text, Vec::new()),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
        details,
    })
}
